//! Locating and loading the files of one submission directory.

use log::{debug, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{EtdError, Result};
use crate::report::ID_KEY;
use crate::urls::UrlTable;
use crate::xml::Element;

pub const METADATA_SUFFIX: &str = "_DATA.xml";
pub const SIDECAR_DATE_KEY: &str = "Date of last event";

const HOUSEKEEPING_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Filesystem artifacts that never belong to a submission.
pub fn is_housekeeping(name: &str) -> bool {
    name.starts_with('.') || HOUSEKEEPING_FILES.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Metadata,
    Sidecar,
    FullText,
}

pub fn classify(file_name: &str) -> Option<FileRole> {
    if file_name.ends_with(METADATA_SUFFIX) {
        Some(FileRole::Metadata)
    } else if file_name.ends_with(".json") {
        Some(FileRole::Sidecar)
    } else if file_name.ends_with(".xml") {
        Some(FileRole::FullText)
    } else {
        None
    }
}

/// Whether a directory or file name belongs to report ID `id`: the name is
/// the ID itself or ends with `_<id>`.
pub fn matches_identifier(name: &str, id: &str) -> bool {
    !id.is_empty()
        && (name == id || name.strip_suffix(id).is_some_and(|rest| rest.ends_with('_')))
}

/// Immediate children of `dir`, sorted by name, housekeeping entries removed.
pub fn list_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if is_housekeeping(&entry.file_name().to_string_lossy()) {
            continue;
        }
        entries.push(entry.into_path());
    }
    Ok(entries)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionFiles {
    pub metadata: Option<PathBuf>,
    /// Every `*.json` in the directory, in name order.
    pub sidecars: Vec<PathBuf>,
    pub full_text: Option<PathBuf>,
}

pub fn scan_submission(dir: &Path) -> Result<SubmissionFiles> {
    let mut files = SubmissionFiles::default();
    for path in list_entries(dir)? {
        let name = file_name(&path);
        let slot = match classify(&name) {
            Some(FileRole::Metadata) => &mut files.metadata,
            Some(FileRole::Sidecar) => {
                files.sidecars.push(path);
                continue;
            }
            Some(FileRole::FullText) => &mut files.full_text,
            None => {
                debug!("Ignoring {:?}", path);
                continue;
            }
        };
        if let Some(previous) = slot.as_ref() {
            warn!("{:?} has more than one {:?} file, keeping {:?}", dir, classify(&name), previous);
            continue;
        }
        *slot = Some(path);
    }
    Ok(files)
}

pub fn read_sidecar(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| EtdError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| EtdError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// `"Date of last event"` from a sidecar JSON file; empty if the key is absent.
pub fn read_sidecar_date(path: &Path) -> Result<String> {
    Ok(sidecar_date(&read_sidecar(path)?))
}

/// Date from the sidecar whose `ID` matches the directory name. With no
/// matching ID a lone sidecar is still used; among several, the first wins.
pub fn select_sidecar_date(dir: &Path, sidecars: &[PathBuf]) -> String {
    let dir_name = file_name(dir);
    let mut parsed = Vec::new();
    for path in sidecars {
        match read_sidecar(path) {
            Ok(data) => parsed.push((path, data)),
            Err(e) => warn!("Ignoring sidecar {:?}: {}", path, e),
        }
    }

    let matching = parsed.iter().find(|(_, data)| {
        data.get(ID_KEY)
            .and_then(Value::as_str)
            .is_some_and(|id| matches_identifier(&dir_name, id.trim()))
    });
    if let Some((path, data)) = matching {
        debug!("Using sidecar {:?}", path);
        return sidecar_date(data);
    }

    match parsed.as_slice() {
        [] => String::new(),
        [(_, data)] => sidecar_date(data),
        [(path, data), ..] => {
            warn!("No sidecar in {:?} has a matching {}, using {:?}", dir, ID_KEY, path);
            sidecar_date(data)
        }
    }
}

pub fn sidecar_date(data: &Value) -> String {
    match data.get(SIDECAR_DATE_KEY) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// One dissertation deposit as read from its directory.
#[derive(Debug, Clone)]
pub struct Submission {
    pub identifier: String,
    pub directory: PathBuf,
    pub metadata_document: Option<Element>,
    pub sidecar_date: String,
    pub fulltext_url: String,
}

/// Load a submission directory. Unreadable or malformed member files are
/// logged and treated as absent so one bad deposit cannot stop a batch.
pub fn load_submission(dir: &Path, urls: &UrlTable) -> Result<Submission> {
    let files = scan_submission(dir)?;
    let identifier = submission_identifier(dir, &files);

    let metadata_document = match &files.metadata {
        Some(path) => match Element::from_path(path) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!("Could not parse metadata {:?}: {}", path, e);
                None
            }
        },
        None => {
            warn!("No *{} file in {:?}", METADATA_SUFFIX, dir);
            None
        }
    };

    let sidecar_date = select_sidecar_date(dir, &files.sidecars);

    let fulltext_url = urls.resolve(&identifier).to_string();

    Ok(Submission {
        identifier,
        directory: dir.to_path_buf(),
        metadata_document,
        sidecar_date,
        fulltext_url,
    })
}

/// Stem of the full-text companion, else of the metadata file, else the
/// directory name.
pub fn submission_identifier(dir: &Path, files: &SubmissionFiles) -> String {
    if let Some(path) = &files.full_text {
        return file_name(path).trim_end_matches(".xml").to_string();
    }
    if let Some(path) = &files.metadata {
        return file_name(path).trim_end_matches(METADATA_SUFFIX).to_string();
    }
    file_name(dir)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
