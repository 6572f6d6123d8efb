use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EtdError, Result};
use crate::fields::{Field, FieldMapping, FieldRule};

pub const DEFAULT_SEASON: &str = "Spring";

/// Optional `config.json` holding the paths the staging commands and the
/// extraction run need. Command-line flags take precedence over these.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub report_path: Option<PathBuf>,
    pub marcxml_path: Option<PathBuf>,
    pub extracted_file_path: Option<PathBuf>,
    pub new_pdf_folder_path: Option<PathBuf>,
    pub all_pdf_folder_path: Option<PathBuf>,
    pub dissertation_path: Option<PathBuf>,
    pub staging_path: Option<PathBuf>,
    pub url_csv_path: Option<PathBuf>,
    pub url_base_prefix: Option<String>,
    pub output_path: Option<PathBuf>,
    pub season: Option<String>,
    pub accept_date_fallback: Option<bool>,
    pub fields: BTreeMap<Field, FieldRule>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| EtdError::io(path, e))?;
        let config: ConfigFile = serde_json::from_str(&content).map_err(|e| EtdError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn field_mapping(&self) -> FieldMapping {
        FieldMapping::default().with_overrides(&self.fields)
    }
}

/// Everything one extraction run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding one subdirectory per submission.
    pub submissions_dir: PathBuf,
    /// Listing CSV of known full-text paths; every URL is "NA" without it.
    pub url_csv: Option<PathBuf>,
    pub url_base_prefix: String,
    pub output: PathBuf,
    pub append: bool,
    pub season: String,
    pub mapping: FieldMapping,
    /// Use the accept date from the metadata when the sidecar has no date.
    pub accept_date_fallback: bool,
}

impl PipelineConfig {
    pub fn new(submissions_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            submissions_dir: submissions_dir.into(),
            url_csv: None,
            url_base_prefix: String::new(),
            output: output.into(),
            append: false,
            season: DEFAULT_SEASON.to_string(),
            mapping: FieldMapping::default(),
            accept_date_fallback: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.submissions_dir.is_dir() {
            return Err(EtdError::Config(format!(
                "submission directory {:?} does not exist",
                self.submissions_dir
            )));
        }
        if let Some(url_csv) = &self.url_csv {
            if !url_csv.is_file() {
                return Err(EtdError::Config(format!("URL listing {:?} does not exist", url_csv)));
            }
        }
        if self.season.trim().is_empty() {
            return Err(EtdError::Config("season must not be empty".to_string()));
        }
        Ok(())
    }
}
