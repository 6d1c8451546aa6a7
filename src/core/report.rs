use crate::domain::model::{
    ChargeRecord, EnrichedRecord, InputRow, JurisdictionKind, ReportOutput, ReportShape, RowOutcome,
    TransformResult,
};
use crate::utils::error::{EtlError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const DETAIL_ENTRY: &str = "due_by_charge.csv";
pub const TOTALS_ENTRY: &str = "due_by_jurisdiction.csv";
pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

const FIXED_TAX_COLUMNS: [(&str, JurisdictionKind); 3] = [
    ("city tax", JurisdictionKind::City),
    ("county tax", JurisdictionKind::County),
    ("state tax", JurisdictionKind::State),
];
const ERROR_COLUMN: &str = "error";

/// Renders enriched rows into the requested report shape.
#[derive(Debug, Clone, Copy)]
pub struct ReportWriter {
    shape: ReportShape,
}

impl ReportWriter {
    pub fn new(shape: ReportShape) -> Self {
        Self { shape }
    }

    /// `stem` is the input file name without extension.
    pub fn render(&self, result: &TransformResult, stem: &str) -> Result<ReportOutput> {
        let output = match self.shape {
            ReportShape::Fixed => ReportOutput {
                filename: format!("{}_taxes.csv", stem),
                content_type: CSV_CONTENT_TYPE,
                bytes: fixed_table(result)?,
            },
            ReportShape::Dynamic => ReportOutput {
                filename: format!("{}_taxes.csv", stem),
                content_type: CSV_CONTENT_TYPE,
                bytes: dynamic_table(result)?,
            },
            ReportShape::Dual => ReportOutput {
                filename: format!("{}_taxes.zip", stem),
                content_type: ZIP_CONTENT_TYPE,
                bytes: bundle(&[
                    (DETAIL_ENTRY, dynamic_table(result)?),
                    (TOTALS_ENTRY, totals_table(result)?),
                ])?,
            },
        };

        tracing::debug!(
            "Rendered {:?} report {} ({} bytes)",
            self.shape,
            output.filename,
            output.bytes.len()
        );
        Ok(output)
    }
}

/// Sorted union of jurisdiction names across all enriched rows.
pub fn jurisdiction_columns(outcomes: &[RowOutcome]) -> Vec<String> {
    enriched(outcomes)
        .flat_map(|record| record.taxes.names().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn jurisdiction_totals(outcomes: &[RowOutcome]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for record in enriched(outcomes) {
        for (name, tax) in record.taxes.iter() {
            *totals.entry(name.clone()).or_insert(0.0) += tax.amount;
        }
    }
    totals
}

pub fn fixed_table(result: &TransformResult) -> Result<Vec<u8>> {
    let tax_columns: Vec<&str> = FIXED_TAX_COLUMNS.iter().map(|(name, _)| *name).collect();
    write_detail(result, &tax_columns, |record| {
        FIXED_TAX_COLUMNS
            .iter()
            .map(|(_, kind)| money(record.taxes.total_for_kind(kind)))
            .collect()
    })
}

pub fn dynamic_table(result: &TransformResult) -> Result<Vec<u8>> {
    let columns = jurisdiction_columns(&result.outcomes);
    let labels = header_labels(result.schema.columns(), &columns);
    let tax_columns: Vec<&str> = labels.iter().map(String::as_str).collect();
    write_detail(result, &tax_columns, |record| {
        columns
            .iter()
            .map(|name| money(record.taxes.get(name).unwrap_or(0.0)))
            .collect()
    })
}

/// Header label per jurisdiction. A name that clashes (ignoring case) with a
/// base column, the error column or an earlier label gets a " tax" suffix.
pub fn header_labels(base_columns: &[&str], jurisdictions: &[String]) -> Vec<String> {
    let mut taken: BTreeSet<String> = base_columns
        .iter()
        .chain(std::iter::once(&ERROR_COLUMN))
        .map(|column| column.to_lowercase())
        .collect();

    jurisdictions
        .iter()
        .map(|name| {
            let mut label = name.clone();
            while taken.contains(&label.to_lowercase()) {
                label.push_str(" tax");
            }
            taken.insert(label.to_lowercase());
            label
        })
        .collect()
}

pub fn totals_table(result: &TransformResult) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Jurisdiction", "total"])?;
    for (name, total) in jurisdiction_totals(&result.outcomes) {
        writer.write_record([name, money(total)])?;
    }
    finish(writer)
}

/// Zips named entries with a fixed timestamp so identical input gives identical bytes.
pub fn bundle(entries: &[(&str, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut archive = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for (name, bytes) in entries {
        let options = SimpleFileOptions::default().last_modified_time(zip::DateTime::default());
        archive.start_file(*name, options)?;
        archive.write_all(bytes)?;
    }

    let cursor = archive.finish()?;
    Ok(cursor.into_inner())
}

fn write_detail<F>(result: &TransformResult, tax_columns: &[&str], tax_cells: F) -> Result<Vec<u8>>
where
    F: Fn(&EnrichedRecord) -> Vec<String>,
{
    let base_columns = result.schema.columns();
    let with_errors = result.failed_count() > 0;

    let mut header: Vec<&str> = base_columns.to_vec();
    header.extend_from_slice(tax_columns);
    if with_errors {
        header.push(ERROR_COLUMN);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;

    for outcome in &result.outcomes {
        let mut cells = match outcome {
            RowOutcome::Enriched(enriched) => {
                let mut cells = record_cells(&enriched.record, result.schema.has_date());
                cells.extend(tax_cells(enriched));
                if with_errors {
                    cells.push(String::new());
                }
                cells
            }
            RowOutcome::Failed { row, record, error } => {
                let mut cells = match record {
                    Some(record) => record_cells(record, result.schema.has_date()),
                    None => raw_cells(row, base_columns.len()),
                };
                cells.extend(std::iter::repeat(String::new()).take(tax_columns.len()));
                cells.push(error.clone());
                cells
            }
        };
        cells.truncate(header.len());
        writer.write_record(&cells)?;
    }

    finish(writer)
}

fn record_cells(record: &ChargeRecord, with_date: bool) -> Vec<String> {
    let mut cells = vec![record.client.clone()];
    if with_date {
        cells.push(record.date.map(|d| d.to_string()).unwrap_or_default());
    }
    cells.extend([
        money(record.charge),
        record.address.street.clone(),
        record.address.city.clone(),
        record.address.state.clone(),
        record.address.zip.clone(),
    ]);
    cells
}

fn raw_cells(row: &InputRow, width: usize) -> Vec<String> {
    let mut cells: Vec<String> = row.fields.iter().take(width).cloned().collect();
    cells.resize(width, String::new());
    cells
}

fn enriched(outcomes: &[RowOutcome]) -> impl Iterator<Item = &EnrichedRecord> {
    outcomes.iter().filter_map(|outcome| match outcome {
        RowOutcome::Enriched(record) => Some(record),
        RowOutcome::Failed { .. } => None,
    })
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}
