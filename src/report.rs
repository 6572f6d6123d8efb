//! Proquest dissertation report (CSV) handling.
//!
//! Reports exported from Excel carry a byte-order mark that ends up glued to
//! the first header, so the `ID` column arrives as `"\u{feff}ID"` (or its
//! mojibake form when the file was decoded as Latin-1).

use csv::ReaderBuilder;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{EtdError, Result};

pub const ID_KEY: &str = "ID";
pub const BOM_ID_KEY: &str = "\u{feff}ID";

const BOM_MARKERS: &[&str] = &["\u{feff}", "\u{ef}\u{bb}\u{bf}"];

/// One report row keyed by column name.
pub type ReportRow = BTreeMap<String, String>;

/// Strip any leading byte-order-mark artifact from a header name.
pub fn normalize_header(header: &str) -> &str {
    let mut header = header;
    while let Some(marker) = BOM_MARKERS.iter().find(|m| header.starts_with(**m)) {
        header = &header[marker.len()..];
    }
    header
}

/// Re-key a row whose `ID` column carries a byte-order-mark artifact.
pub fn fix_bom_key(row: &mut ReportRow) {
    let mangled: Vec<String> = row
        .keys()
        .filter(|k| normalize_header(k) != k.as_str())
        .cloned()
        .collect();
    for key in mangled {
        if let Some(value) = row.remove(&key) {
            row.insert(normalize_header(&key).to_string(), value);
        }
    }
}

/// Read every report row into a map keyed by its `ID` column.
pub fn read_report<R: Read>(reader: R) -> std::result::Result<BTreeMap<String, ReportRow>, csv::Error> {
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut rows = BTreeMap::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut row: ReportRow = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        fix_bom_key(&mut row);
        match row.get(ID_KEY).cloned() {
            Some(id) if !id.is_empty() => {
                rows.insert(id, row);
            }
            _ => debug!("Skipping report row without an {} value", ID_KEY),
        }
    }
    Ok(rows)
}

pub fn load_report(path: &Path) -> Result<BTreeMap<String, ReportRow>> {
    let file = File::open(path).map_err(|e| EtdError::io(path, e))?;
    let rows = read_report(file).map_err(|e| EtdError::csv_file(path, e))?;
    info!("Loaded {} report rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Identifier and Proquest publication number (first two columns) per row.
pub fn read_id_pairs<R: Read>(reader: R) -> std::result::Result<Vec<(String, String)>, csv::Error> {
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut pairs = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if let (Some(id), Some(pub_number)) = (record.get(0), record.get(1)) {
            pairs.push((id.trim().to_string(), pub_number.trim().to_string()));
        }
    }
    Ok(pairs)
}

pub fn load_id_pairs(path: &Path) -> Result<Vec<(String, String)>> {
    let file = File::open(path).map_err(|e| EtdError::io(path, e))?;
    read_id_pairs(file).map_err(|e| EtdError::csv_file(path, e))
}

pub fn load_pub_numbers(path: &Path) -> Result<Vec<String>> {
    Ok(load_id_pairs(path)?
        .into_iter()
        .map(|(_, pub_number)| pub_number)
        .collect())
}
