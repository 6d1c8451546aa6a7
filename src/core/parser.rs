use crate::domain::model::{
    Address, ChargeDate, ChargeRecord, InputRow, InputSchema, ParsedRow, ParsedTable, TaxPeriod,
};
use crate::utils::error::{EtlError, Result};

/// Turns an uploaded charge sheet into validated records.
#[derive(Debug, Clone, Copy)]
pub struct RowParser {
    default_period: TaxPeriod,
}

impl RowParser {
    /// `default_period` applies to sheets without a date column.
    pub fn new(default_period: TaxPeriod) -> Self {
        Self { default_period }
    }

    /// Validates every row and fails on the first bad one.
    pub fn parse_records(&self, input: &[u8]) -> Result<ParsedTable> {
        let mut table = self.parse_rows(input)?;
        let mut rows = Vec::with_capacity(table.rows.len());
        for parsed in table.rows.drain(..) {
            let record = parsed.record?;
            rows.push(ParsedRow {
                row: parsed.row,
                record: Ok(record),
            });
        }
        table.rows = rows;
        Ok(table)
    }

    /// Header and CSV syntax errors abort; field errors stay with their row.
    pub fn parse_rows(&self, input: &[u8]) -> Result<ParsedTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);
        let mut records = reader.records();

        let header = match records.next() {
            Some(header) => header?,
            None => csv::StringRecord::new(),
        };
        let schema = detect_schema(&header)?;
        tracing::debug!("Detected {:?} input schema", schema);

        let mut rows = Vec::new();
        for (index, raw) in records.enumerate() {
            let raw = raw?;
            let row = InputRow {
                position: index + 1,
                fields: raw.iter().map(str::to_string).collect(),
            };
            let record = self.parse_row(schema, &row);
            if let Err(e) = &record {
                tracing::debug!("Row {} rejected: {}", row.position, e);
            }
            rows.push(ParsedRow { row, record });
        }

        tracing::debug!("Parsed {} data rows", rows.len());
        Ok(ParsedTable { schema, rows })
    }

    fn parse_row(&self, schema: InputSchema, row: &InputRow) -> Result<ChargeRecord> {
        let expected = schema.columns().len();
        if row.fields.len() != expected {
            return Err(EtlError::RowShapeError {
                row: row.position,
                expected,
                found: row.fields.len(),
            });
        }

        let client = row.fields[0].clone();
        let (date, rest) = if schema.has_date() {
            (Some(parse_date(&client, &row.fields[1])?), &row.fields[2..])
        } else {
            (None, &row.fields[1..])
        };
        let charge = parse_charge(&client, &rest[0])?;

        Ok(ChargeRecord {
            period: date.map(|d| d.period()).unwrap_or(self.default_period),
            client,
            date,
            charge,
            address: Address {
                street: rest[1].clone(),
                city: rest[2].clone(),
                state: rest[3].clone(),
                zip: rest[4].clone(),
            },
        })
    }
}

impl Default for RowParser {
    fn default() -> Self {
        Self::new(TaxPeriod::current())
    }
}

fn detect_schema(header: &csv::StringRecord) -> Result<InputSchema> {
    for schema in [InputSchema::Undated, InputSchema::Dated] {
        if header.iter().eq(schema.columns().iter().copied()) {
            return Ok(schema);
        }
    }

    let expected = if header.len() == InputSchema::DATED_COLUMNS.len() {
        InputSchema::Dated
    } else {
        InputSchema::Undated
    };
    Err(EtlError::SchemaError {
        expected: expected.columns().join(", "),
        received: header.iter().collect::<Vec<_>>().join(", "),
    })
}

fn parse_date(client: &str, value: &str) -> Result<ChargeDate> {
    let date_error = |reason: String| EtlError::DateFormatError {
        client: client.to_string(),
        value: value.to_string(),
        reason,
    };

    let parts: Vec<&str> = value.split('/').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(date_error(format!(
            "expected MM/DD/YYYY, found {} part(s)",
            parts.len()
        )));
    }

    let month: u32 = parts[0]
        .parse()
        .map_err(|_| date_error(format!("month '{}' is not a number", parts[0])))?;
    let day: u32 = parts[1]
        .parse()
        .map_err(|_| date_error(format!("day '{}' is not a number", parts[1])))?;
    let year: i32 = parts[2]
        .parse()
        .map_err(|_| date_error(format!("year '{}' is not a number", parts[2])))?;

    if !(1..=12).contains(&month) {
        return Err(date_error(format!("month {} is outside 1-12", month)));
    }
    if !(1..=31).contains(&day) {
        return Err(date_error(format!("day {} is outside 1-31", day)));
    }
    if year < 2000 {
        return Err(date_error(format!("year {} is before 2000", year)));
    }

    Ok(ChargeDate { month, day, year })
}

fn parse_charge(client: &str, value: &str) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(charge) if charge.is_finite() && charge >= 0.0 => {
            // normalise -0
            Ok(if charge == 0.0 { 0.0 } else { charge })
        }
        _ => Err(EtlError::ChargeFormatError {
            client: client.to_string(),
            value: value.to_string(),
        }),
    }
}
