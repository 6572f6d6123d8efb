use csv::{ReaderBuilder, Writer};
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{EtdError, Result};
use crate::sources::list_entries;

/// Placeholder written when a submission has no known full-text location.
pub const NOT_AVAILABLE: &str = "NA";

/// Identifier to full-text URL lookup, built once per run.
#[derive(Debug, Default, Clone)]
pub struct UrlTable {
    urls: HashMap<String, String>,
}

impl UrlTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier for a listed path: base prefix and `.pdf` suffix removed.
    pub fn identifier_for(path: &str, base_prefix: &str) -> String {
        let rest = if base_prefix.is_empty() {
            path
        } else {
            path.strip_prefix(base_prefix).unwrap_or(path)
        };
        let rest = rest.trim_start_matches(['/', '\\']);
        rest.strip_suffix(".pdf").unwrap_or(rest).to_string()
    }

    /// Read a listing CSV: header skipped, first column holds the path.
    pub fn from_reader<R: Read>(reader: R, base_prefix: &str) -> std::result::Result<Self, csv::Error> {
        let mut table = Self::new();
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        for record in csv_reader.records() {
            let record = record?;
            let Some(path) = record.get(0).map(str::trim).filter(|p| !p.is_empty()) else {
                continue;
            };
            let identifier = Self::identifier_for(path, base_prefix);
            debug!("URL table: {} -> {}", identifier, path);
            table.insert(identifier, path.to_string());
        }
        Ok(table)
    }

    pub fn from_csv_path(path: &Path, base_prefix: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| EtdError::io(path, e))?;
        let table = Self::from_reader(file, base_prefix).map_err(|e| EtdError::csv_file(path, e))?;
        info!("Loaded {} full-text URLs from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn insert(&mut self, identifier: String, url: String) {
        self.urls.insert(identifier, url);
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.urls.get(identifier).map(String::as_str)
    }

    /// URL for `identifier`, or [`NOT_AVAILABLE`].
    pub fn resolve(&self, identifier: &str) -> &str {
        self.get(identifier).unwrap_or(NOT_AVAILABLE)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Write the listing CSV consumed by [`UrlTable::from_csv_path`]: one
/// `<base>/<name>` row per entry of `dir`.
pub fn write_url_listing(dir: &Path, base: &str, out_path: &Path) -> Result<usize> {
    let names: Vec<String> = list_entries(dir)?
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .collect();

    let mut writer = Writer::from_path(out_path).map_err(|e| EtdError::csv_file(out_path, e))?;
    writer.write_record(["url"])?;
    let base = base.trim_end_matches('/');
    for name in &names {
        writer.write_record([format!("{}/{}", base, name)])?;
    }
    writer.flush().map_err(|e| EtdError::io(out_path, e))?;

    info!("Listed {} files from {:?} into {:?}", names.len(), dir, out_path);
    Ok(names.len())
}
