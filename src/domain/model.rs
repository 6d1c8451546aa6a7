use crate::utils::error::EtlError;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Header layouts accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSchema {
    /// Rate period defaults to the current quarter.
    Undated,
    /// Rate period comes from each row's date.
    Dated,
}

impl InputSchema {
    pub const UNDATED_COLUMNS: [&'static str; 6] =
        ["client", "charge", "street address", "city", "State", "zip code"];
    pub const DATED_COLUMNS: [&'static str; 7] = [
        "client",
        "date",
        "charge",
        "street address",
        "city",
        "State",
        "zip code",
    ];

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            InputSchema::Undated => &Self::UNDATED_COLUMNS,
            InputSchema::Dated => &Self::DATED_COLUMNS,
        }
    }

    pub fn has_date(&self) -> bool {
        matches!(self, InputSchema::Dated)
    }
}

/// One raw data line. `position` is 1-based and excludes the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    pub position: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPeriod {
    pub quarter: u32,
    pub year: i32,
}

impl TaxPeriod {
    /// `month` must already be within 1-12.
    pub fn from_month(month: u32, year: i32) -> Self {
        Self {
            quarter: quarter_of(month),
            year,
        }
    }

    pub fn current() -> Self {
        let today = chrono::Local::now().date_naive();
        Self::from_month(today.month(), today.year())
    }
}

pub fn quarter_of(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

/// Calendar components as written. Day/month combinations such as Feb 30
/// are not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeDate {
    pub month: u32,
    pub day: u32,
    pub year: i32,
}

impl ChargeDate {
    pub fn period(&self) -> TaxPeriod {
        TaxPeriod::from_month(self.month, self.year)
    }
}

impl fmt::Display for ChargeDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:04}", self.month, self.day, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {} {}", self.street, self.city, self.state, self.zip)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRecord {
    pub client: String,
    pub date: Option<ChargeDate>,
    pub period: TaxPeriod,
    pub charge: f64,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JurisdictionKind {
    State,
    County,
    City,
    Other(String),
}

impl JurisdictionKind {
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        match tag.to_ascii_uppercase().as_str() {
            "STATE" => JurisdictionKind::State,
            "COUNTY" => JurisdictionKind::County,
            "CITY" => JurisdictionKind::City,
            _ => JurisdictionKind::Other(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JurisdictionKind::State => "STATE",
            JurisdictionKind::County => "COUNTY",
            JurisdictionKind::City => "CITY",
            JurisdictionKind::Other(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JurisdictionRate {
    pub name: String,
    pub kind: JurisdictionKind,
    pub rate: f64,
}

/// Rates resolved by a single lookup, keyed by jurisdiction name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<String, JurisdictionRate>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false and keeps the existing entry when the name is already present.
    pub fn insert(&mut self, rate: JurisdictionRate) -> bool {
        if self.rates.contains_key(&rate.name) {
            return false;
        }
        self.rates.insert(rate.name.clone(), rate);
        true
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.rates.get(name).map(|r| r.rate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JurisdictionRate> {
        self.rates.values()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rate_for_kind(&self, kind: &JurisdictionKind) -> f64 {
        self.iter()
            .filter(|r| &r.kind == kind)
            .fold(0.0, |total, r| total + r.rate)
    }
}

impl FromIterator<JurisdictionRate> for RateTable {
    fn from_iter<I: IntoIterator<Item = JurisdictionRate>>(iter: I) -> Self {
        let mut table = RateTable::new();
        for rate in iter {
            table.insert(rate);
        }
        table
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JurisdictionTax {
    pub kind: JurisdictionKind,
    pub amount: f64,
}

/// Owed amounts per jurisdiction name, unrounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxAmounts {
    amounts: BTreeMap<String, JurisdictionTax>,
}

impl TaxAmounts {
    pub fn insert(&mut self, name: String, tax: JurisdictionTax) {
        self.amounts.insert(name, tax);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.amounts.get(name).map(|t| t.amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JurisdictionTax)> {
        self.amounts.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.amounts.keys()
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn total_for_kind(&self, kind: &JurisdictionKind) -> f64 {
        // empty f64 sums are -0.0
        self.amounts
            .values()
            .filter(|t| &t.kind == kind)
            .fold(0.0, |total, t| total + t.amount)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub row: InputRow,
    pub record: ChargeRecord,
    pub taxes: TaxAmounts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Enriched(EnrichedRecord),
    /// `record` is kept when the row parsed and only its lookup failed.
    Failed {
        row: InputRow,
        record: Option<ChargeRecord>,
        error: String,
    },
}

impl RowOutcome {
    pub fn position(&self) -> usize {
        match self {
            RowOutcome::Enriched(enriched) => enriched.row.position,
            RowOutcome::Failed { row, .. } => row.position,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RowOutcome::Failed { .. })
    }
}

/// A data row together with its validation result.
#[derive(Debug)]
pub struct ParsedRow {
    pub row: InputRow,
    pub record: Result<ChargeRecord, EtlError>,
}

#[derive(Debug)]
pub struct ParsedTable {
    pub schema: InputSchema,
    pub rows: Vec<ParsedRow>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub schema: InputSchema,
    pub outcomes: Vec<RowOutcome>,
}

impl TransformResult {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn enriched_count(&self) -> usize {
        self.outcomes.len() - self.failed_count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutput {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    Sequential,
    Parallel,
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ProcessingMode::Sequential),
            "parallel" => Ok(ProcessingMode::Parallel),
            other => Err(format!(
                "unknown processing mode '{}', expected sequential or parallel",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportShape {
    /// city/county/state columns only.
    Fixed,
    /// One column per jurisdiction seen in the batch.
    Dynamic,
    /// Per-charge detail plus per-jurisdiction totals, zipped.
    Dual,
}

impl FromStr for ReportShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(ReportShape::Fixed),
            "dynamic" => Ok(ReportShape::Dynamic),
            "dual" => Ok(ReportShape::Dual),
            other => Err(format!(
                "unknown report shape '{}', expected fixed, dynamic or dual",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_derivation() {
        let cases = [
            (1, 1),
            (3, 1),
            (4, 2),
            (6, 2),
            (7, 3),
            (9, 3),
            (10, 4),
            (12, 4),
        ];
        for (month, quarter) in cases {
            assert_eq!(quarter_of(month), quarter, "month {}", month);
        }
    }

    #[test]
    fn test_charge_date_display_is_zero_padded() {
        let date = ChargeDate {
            month: 2,
            day: 5,
            year: 2025,
        };
        assert_eq!(date.to_string(), "02/05/2025");
        assert_eq!(date.period(), TaxPeriod { quarter: 1, year: 2025 });
    }

    #[test]
    fn test_jurisdiction_kind_from_tag() {
        assert_eq!(JurisdictionKind::from_tag("state"), JurisdictionKind::State);
        assert_eq!(JurisdictionKind::from_tag(" COUNTY "), JurisdictionKind::County);
        assert_eq!(
            JurisdictionKind::from_tag("SPD"),
            JurisdictionKind::Other("SPD".to_string())
        );
    }

    #[test]
    fn test_rate_table_keeps_first_duplicate() {
        let mut table = RateTable::new();
        assert!(table.insert(JurisdictionRate {
            name: "AUSTIN".to_string(),
            kind: JurisdictionKind::City,
            rate: 0.02,
        }));
        assert!(!table.insert(JurisdictionRate {
            name: "AUSTIN".to_string(),
            kind: JurisdictionKind::City,
            rate: 0.05,
        }));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("AUSTIN"), Some(0.02));
    }

    #[test]
    fn test_mode_and_shape_parse() {
        assert_eq!("Parallel".parse::<ProcessingMode>(), Ok(ProcessingMode::Parallel));
        assert_eq!("dual".parse::<ReportShape>(), Ok(ReportShape::Dual));
        assert!("zip".parse::<ReportShape>().is_err());
    }
}
