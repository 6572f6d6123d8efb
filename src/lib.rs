pub mod config;
pub mod error;
pub mod fields;
pub mod marc;
pub mod pipeline;
mod progress;
pub mod record;
pub mod report;
pub mod sources;
pub mod staging;
pub mod urls;
pub mod xml;

pub use config::{ConfigFile, PipelineConfig};
pub use error::EtdError;
pub use fields::{extract_fields, Field, FieldMapping, FieldRule};
pub use pipeline::{run, RunSummary};
pub use record::{MetadataRecord, RecordWriter, HEADER};
pub use urls::{UrlTable, NOT_AVAILABLE};
