use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::fields::{check_authorship, extract_fields, Extraction, Field};
use crate::progress::progress_bar;
use crate::record::{MetadataRecord, RecordWriter};
use crate::sources::{is_housekeeping, load_submission, Submission};
use crate::urls::UrlTable;

/// What happened to one submission during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub identifier: String,
    pub directory: PathBuf,
    pub has_metadata: bool,
    pub url_resolved: bool,
    pub unresolved: Vec<Field>,
    pub missing_required: Vec<Field>,
    /// Authors other than the primary one named in the metadata.
    pub secondary_authors: usize,
}

impl SubmissionOutcome {
    pub fn is_complete(&self) -> bool {
        self.has_metadata && self.missing_required.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<SubmissionOutcome>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn incomplete(&self) -> impl Iterator<Item = &SubmissionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_complete())
    }

    pub fn without_url(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.url_resolved).count()
    }

    /// Log the per-run warning digest.
    pub fn log(&self) {
        info!(
            "Processed {} submissions ({} without a full-text URL)",
            self.processed(),
            self.without_url()
        );
        for outcome in self.incomplete() {
            if !outcome.has_metadata {
                warn!("{}: no usable metadata document", outcome.identifier);
            } else {
                let names: Vec<&str> = outcome.missing_required.iter().map(|f| f.name()).collect();
                warn!("{}: missing {}", outcome.identifier, names.join(", "));
            }
        }
    }
}

/// Submission subdirectories of `root` in name order.
pub fn submission_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() && !is_housekeeping(&entry.file_name().to_string_lossy()) {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Turn one loaded submission into its output record.
pub fn process_submission(submission: &Submission, config: &PipelineConfig) -> (MetadataRecord, SubmissionOutcome) {
    let (extraction, secondary_authors) = match &submission.metadata_document {
        Some(doc) => (
            extract_fields(doc, &config.mapping),
            check_authorship(doc, &submission.identifier),
        ),
        None => (Extraction::unavailable(&config.mapping), 0),
    };

    let publication_date = if submission.sidecar_date.is_empty() && config.accept_date_fallback {
        extraction.fields.accept_date.as_str()
    } else {
        submission.sidecar_date.as_str()
    };

    let record = MetadataRecord::assemble(
        &extraction.fields,
        &submission.fulltext_url,
        publication_date,
        &config.season,
    );

    let outcome = SubmissionOutcome {
        identifier: submission.identifier.clone(),
        directory: submission.directory.clone(),
        has_metadata: submission.metadata_document.is_some(),
        url_resolved: submission.fulltext_url != crate::urls::NOT_AVAILABLE,
        missing_required: extraction.missing_required(&config.mapping),
        unresolved: extraction.unresolved,
        secondary_authors,
    };
    (record, outcome)
}

/// Load `dir`, or stand in an empty submission when the directory itself
/// cannot be read, so the batch still gets a row for it.
pub fn load_or_placeholder(dir: &Path, urls: &UrlTable) -> Submission {
    load_submission(dir, urls).unwrap_or_else(|e| {
        warn!("Could not read submission directory {:?}: {}", dir, e);
        let identifier = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Submission {
            fulltext_url: urls.resolve(&identifier).to_string(),
            identifier,
            directory: dir.to_path_buf(),
            metadata_document: None,
            sidecar_date: String::new(),
        }
    })
}

/// Process every submission under the configured directory into `writer`.
pub fn run_into<W: Write>(
    config: &PipelineConfig,
    urls: &UrlTable,
    writer: &mut RecordWriter<W>,
) -> Result<RunSummary> {
    let dirs = submission_dirs(&config.submissions_dir)?;
    let pb = progress_bar(dirs.len());
    let mut summary = RunSummary::default();
    for dir in &dirs {
        let submission = load_or_placeholder(dir, urls);
        debug!("Processing submission {}", submission.identifier);
        pb.set_message(submission.identifier.clone());

        let (record, outcome) = process_submission(&submission, config);
        if !outcome.missing_required.is_empty() {
            let names: Vec<&str> = outcome.missing_required.iter().map(|f| f.name()).collect();
            warn!("Submission {} is missing {}", outcome.identifier, names.join(", "));
        }
        writer.write(&record)?;
        summary.outcomes.push(outcome);
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} submission(s)", summary.processed()));
    Ok(summary)
}

/// Full extraction run: load the URL table, write the output CSV.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    let urls = match &config.url_csv {
        Some(path) => UrlTable::from_csv_path(path, &config.url_base_prefix)?,
        None => {
            warn!("No URL listing given; every fulltext_url will be NA");
            UrlTable::new()
        }
    };

    let mut writer = RecordWriter::create(&config.output, config.append)?;
    let summary = run_into(config, &urls, &mut writer)?;
    info!("Wrote {} rows to {:?}", writer.written(), config.output);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_directory_becomes_empty_row() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("upload_77");
        let mut urls = UrlTable::new();
        urls.insert("upload_77".to_string(), "https://example.org/etds/upload_77.pdf".to_string());

        let submission = load_or_placeholder(&gone, &urls);
        assert_eq!(submission.identifier, "upload_77");
        assert!(submission.metadata_document.is_none());

        let config = PipelineConfig::new(dir.path(), dir.path().join("out.csv"));
        let (record, outcome) = process_submission(&submission, &config);
        assert!(!outcome.has_metadata);
        assert!(!outcome.is_complete());
        assert_eq!(record.title, "");
        assert_eq!(record.fulltext_url, "https://example.org/etds/upload_77.pdf");
    }
}
