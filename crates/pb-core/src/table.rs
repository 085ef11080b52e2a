//! Table input: CSV uploads and JSON row arrays.
//!
//! CSV headers are matched case-insensitively against a small alias list so
//! that both the historical `CONC,TOTAL,DEAD` layout and `dose,total,response`
//! are accepted.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::types::{DoseGroup, Trial};
use crate::{Error, Result};

const DOSE_ALIASES: &[&str] = &["conc", "dose", "concentration"];
const TOTAL_ALIASES: &[&str] = &["total", "n"];
const RESPONSE_ALIASES: &[&str] = &["dead", "response", "responders"];

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().to_ascii_lowercase();
        aliases.iter().any(|a| *a == h)
    })
}

fn parse_count(raw: &str, column: &str, line: usize) -> Result<u64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<u64>() {
        return Ok(v);
    }
    // Spreadsheet exports often write integer counts as `20.0`.
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(Error::Validation(format!(
            "line {}: column {} must be a non-negative integer, got '{}'",
            line, column, raw
        ))),
    }
}

/// Read a bioassay table from CSV.
pub fn read_csv<R: Read>(reader: R) -> Result<Trial> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let (dose_idx, total_idx, response_idx) = match (
        find_column(&headers, DOSE_ALIASES),
        find_column(&headers, TOTAL_ALIASES),
        find_column(&headers, RESPONSE_ALIASES),
    ) {
        (Some(d), Some(t), Some(r)) => (d, t, r),
        _ => {
            let found: Vec<&str> = headers.iter().collect();
            return Err(Error::Validation(format!(
                "Missing required columns. Found: {:?}, Required: [\"CONC\", \"TOTAL\", \"DEAD\"]",
                found
            )));
        }
    };

    let mut groups = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = i + 2;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let dose_raw = field(dose_idx);
        let dose: f64 = dose_raw.trim().parse().map_err(|_| {
            Error::Validation(format!("line {}: dose must be a number, got '{}'", line, dose_raw))
        })?;
        let total = parse_count(field(total_idx), "TOTAL", line)?;
        let response = parse_count(field(response_idx), "DEAD", line)?;
        groups.push(DoseGroup::new(dose, total, response));
    }

    Trial::new(groups)
}

/// Read a bioassay table from an in-memory CSV string.
pub fn parse_csv_str(s: &str) -> Result<Trial> {
    read_csv(s.as_bytes())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    Bare(Vec<DoseGroup>),
    Wrapped { rows: Vec<DoseGroup> },
}

/// Parse a JSON table: either `[{dose,total,response}, ...]` or `{"rows": [...]}`.
pub fn parse_json_str(s: &str) -> Result<Trial> {
    let doc: RowsDocument = serde_json::from_str(s)?;
    let rows = match doc {
        RowsDocument::Bare(rows) => rows,
        RowsDocument::Wrapped { rows } => rows,
    };
    Trial::new(rows)
}

/// Load a table from disk; `.json` files are parsed as JSON, anything else as CSV.
pub fn read_path(path: &Path) -> Result<Trial> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        let text = std::fs::read_to_string(path)?;
        parse_json_str(&text)
    } else {
        let file = std::fs::File::open(path)?;
        read_csv(file)
    }
}

impl Trial {
    /// Read a CSV table; see [`read_csv`].
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        read_csv(reader)
    }
}
