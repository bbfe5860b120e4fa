use crate::error::PipelineError;
use crate::transaction::CsvRow;

use csv::ReaderBuilder;
use std::io::Read;
use tracing::{debug, warn};

pub const EXPECTED_COLUMNS: usize = 4;
pub const EXPECTED_HEADER: [&str; EXPECTED_COLUMNS] = ["id", "date", "transaction", "email"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSkipWarning {
    pub line: Option<u64>,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub rows_accepted: usize,
    pub skipped: Vec<RowSkipWarning>,
}

/// Splits a comma separated stream into four-field rows.
///
/// A missing or wrongly sized header is fatal. Any later line that cannot be
/// read or does not have exactly four fields is logged and dropped, so one bad
/// line never discards the rest of the file. No type checking happens here.
pub fn validate<R: Read>(input: R) -> Result<(Vec<CsvRow>, ValidationReport), PipelineError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let header = rdr.headers().map_err(|e| PipelineError::Schema {
        message: format!("cannot read header: {}", e),
    })?;
    if header.len() != EXPECTED_COLUMNS {
        return Err(PipelineError::Schema {
            message: format!(
                "expected {} columns, got {}",
                EXPECTED_COLUMNS,
                header.len()
            ),
        });
    }
    if !header.iter().eq(EXPECTED_HEADER) {
        debug!(header = ?header, "CSV header names differ from id,date,transaction,email");
    }

    let mut rows = Vec::new();
    let mut report = ValidationReport::default();
    for result in rdr.into_records() {
        match result {
            Ok(record) => match CsvRow::from_record(&record) {
                Some(row) => rows.push(row),
                None => {
                    let line = record.position().map(|p| p.line());
                    let reason =
                        format!("expected {} columns, got {}", EXPECTED_COLUMNS, record.len());
                    skip(&mut report, line, reason);
                }
            },
            Err(e) => {
                let line = e.position().map(|p| p.line());
                skip(&mut report, line, e.to_string());
            }
        }
    }

    report.rows_accepted = rows.len();
    debug!(
        rows = report.rows_accepted,
        skipped = report.skipped.len(),
        "CSV validation complete"
    );
    Ok((rows, report))
}

fn skip(report: &mut ValidationReport, line: Option<u64>, reason: String) {
    warn!(line = ?line, %reason, "Skipping invalid CSV line");
    report.skipped.push(RowSkipWarning { line, reason });
}
