//! Output rows for the repository bulk-upload spreadsheet.

use csv::Writer;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{EtdError, Result};
use crate::fields::ExtractedFields;

pub const COLUMN_COUNT: usize = 20;

pub const HEADER: [&str; COLUMN_COUNT] = [
    "title",
    "fulltext_url",
    "keywords",
    "abstract",
    "author1_fname",
    "author1_mname",
    "author1_lname",
    "author1_suffix",
    "author1_email",
    "author1_institution",
    "advisor1",
    "advisor2",
    "advisor3",
    "disciplines",
    "comments",
    "degree_name",
    "department",
    "document_type",
    "publication_date",
    "season",
];

pub const DOCUMENT_TYPE: &str = "dissertation";

/// One normalized row. Reserved columns (advisor2, advisor3, disciplines,
/// comments) have no field and are always written empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    pub title: String,
    pub fulltext_url: String,
    pub keywords: String,
    pub abstract_text: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub suffix: String,
    pub email: String,
    pub institution: String,
    pub advisor: String,
    pub degree: String,
    pub department: String,
    pub publication_date: String,
    pub season: String,
}

impl MetadataRecord {
    pub fn assemble(fields: &ExtractedFields, fulltext_url: &str, publication_date: &str, season: &str) -> Self {
        Self {
            title: fields.title.clone(),
            fulltext_url: fulltext_url.to_string(),
            keywords: fields.keywords.clone(),
            abstract_text: fields.abstract_text.clone(),
            first_name: fields.first_name.clone(),
            middle_name: fields.middle_name.clone(),
            last_name: fields.last_name.clone(),
            suffix: fields.suffix.clone(),
            email: fields.email.clone(),
            institution: fields.institution.clone(),
            advisor: fields.advisor.clone(),
            degree: fields.degree.clone(),
            department: fields.department.clone(),
            publication_date: publication_date.to_string(),
            season: season.to_string(),
        }
    }

    /// Columns in [`HEADER`] order.
    pub fn to_row(&self) -> [&str; COLUMN_COUNT] {
        [
            self.title.as_str(),
            self.fulltext_url.as_str(),
            self.keywords.as_str(),
            self.abstract_text.as_str(),
            self.first_name.as_str(),
            self.middle_name.as_str(),
            self.last_name.as_str(),
            self.suffix.as_str(),
            self.email.as_str(),
            self.institution.as_str(),
            self.advisor.as_str(),
            "",
            "",
            "",
            "",
            self.degree.as_str(),
            self.department.as_str(),
            DOCUMENT_TYPE,
            self.publication_date.as_str(),
            self.season.as_str(),
        ]
    }
}

/// Writes records one at a time, flushing after each so an interrupted run
/// leaves every completed row on disk.
pub struct RecordWriter<W: Write> {
    inner: Writer<W>,
    written: usize,
}

impl RecordWriter<File> {
    /// Open `path` for output. In append mode the header is only written if
    /// the file is new or empty.
    pub fn create(path: &Path, append: bool) -> Result<Self> {
        let file = if append {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
        } else {
            File::create(path)
        }
        .map_err(|e| EtdError::io(path, e))?;

        let is_empty = file.metadata().map_err(|e| EtdError::io(path, e))?.len() == 0;
        Self::new(file, !append || is_empty)
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W, write_header: bool) -> Result<Self> {
        let mut writer = Self {
            inner: Writer::from_writer(inner),
            written: 0,
        };
        if write_header {
            writer.inner.write_record(HEADER)?;
        }
        Ok(writer)
    }

    pub fn write(&mut self, record: &MetadataRecord) -> Result<()> {
        self.inner.write_record(record.to_row())?;
        self.inner
            .flush()
            .map_err(EtdError::Output)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| EtdError::Output(e.into_error()))
    }
}
