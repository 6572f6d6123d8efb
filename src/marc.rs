//! Splitting a combined MARC-XML export into one file per record.
//!
//! The export is streamed so large collections never sit in memory. Element
//! prefixes and namespace declarations are dropped from each record; the
//! MARC21 slim namespace is declared once on the wrapping `collection`.

use anyhow::{Context, Result};
use log::{info, warn};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const MARC_NAMESPACE: &str = "http://www.loc.gov/MARC21/slim";
pub const COMBINED_FILE_NAME: &str = "etd_marc.xml";
pub const SPLIT_DIR_NAME: &str = "split_xml_files";

const CONTROL_NUMBER_TAG: &str = "001";
const CONTROL_NUMBER_PREFIX: &str = "AAI";

/// One record pulled from the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct MarcRecord {
    /// Control number (field 001) with the `AAI` prefix removed.
    pub control_number: Option<String>,
    /// Serialized `record` element without namespace declarations.
    pub xml: Vec<u8>,
}

impl MarcRecord {
    /// Complete standalone document for this record.
    pub fn to_document(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.xml.len() + 128);
        out.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.extend_from_slice(format!("<collection xmlns=\"{}\">\n", MARC_NAMESPACE).as_bytes());
        out.extend_from_slice(&self.xml);
        out.extend_from_slice(b"</collection>");
        out
    }
}

fn local_name(name: &[u8]) -> String {
    let local = match name.iter().position(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };
    String::from_utf8_lossy(local).to_string()
}

fn strip_namespaces(start: &BytesStart<'_>) -> BytesStart<'static> {
    let mut stripped = BytesStart::new(local_name(start.name().as_ref()));
    for attr in start.attributes().flatten() {
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        stripped.push_attribute((key, attr.value.as_ref()));
    }
    stripped
}

/// Read every `record` element from a MARC-XML stream, calling `on_record`
/// as each one closes.
pub fn read_records<R: BufRead>(reader: R, mut on_record: impl FnMut(MarcRecord) -> Result<()>) -> Result<usize> {
    let mut xml_reader = Reader::from_reader(reader);
    let mut buf = Vec::new();

    let mut writer: Option<Writer<Vec<u8>>> = None;
    let mut depth = 0usize;
    let mut in_control_number = false;
    let mut control_number: Option<String> = None;
    let mut count = 0usize;

    loop {
        let event = xml_reader
            .read_event_into(&mut buf)
            .with_context(|| format!("Malformed MARC-XML at byte {}", xml_reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                let name = local_name(e.name().as_ref());
                if writer.is_none() && name == "record" {
                    writer = Some(Writer::new(Vec::new()));
                    depth = 0;
                    control_number = None;
                }
                if let Some(w) = writer.as_mut() {
                    depth += 1;
                    if name == "controlfield" {
                        in_control_number = e
                            .attributes()
                            .flatten()
                            .any(|a| a.key.as_ref() == b"tag" && a.value.as_ref() == CONTROL_NUMBER_TAG.as_bytes());
                    }
                    w.write_event(Event::Start(strip_namespaces(&e)))?;
                }
            }
            Event::Empty(e) => {
                if let Some(w) = writer.as_mut() {
                    w.write_event(Event::Empty(strip_namespaces(&e)))?;
                }
            }
            Event::Text(t) => {
                if let Some(w) = writer.as_mut() {
                    if in_control_number {
                        let text = t.unescape()?.trim().to_string();
                        control_number = Some(text.replace(CONTROL_NUMBER_PREFIX, ""));
                    }
                    w.write_event(Event::Text(t))?;
                }
            }
            Event::CData(c) => {
                if let Some(w) = writer.as_mut() {
                    w.write_event(Event::CData(c))?;
                }
            }
            Event::End(e) => {
                if let Some(w) = writer.as_mut() {
                    in_control_number = false;
                    let name = local_name(e.name().as_ref());
                    w.write_event(Event::End(BytesEnd::new(name)))?;
                    depth -= 1;
                    if depth == 0 {
                        if let Some(done) = writer.take() {
                            count += 1;
                            on_record(MarcRecord {
                                control_number: control_number.take(),
                                xml: done.into_inner(),
                            })?;
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if writer.is_some() {
        anyhow::bail!("MARC-XML ended inside an unterminated record");
    }
    Ok(count)
}

/// Write each record of `combined` to `<out_dir>/<control number>.xml`.
/// Records without a control number are skipped with a warning.
pub fn split_collection(combined: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(combined).with_context(|| format!("Failed to open {:?}", combined))?;
    fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {:?}", out_dir))?;

    let mut written = Vec::new();
    let total = read_records(BufReader::new(file), |record| {
        let Some(id) = record.control_number.as_deref().filter(|id| !id.is_empty()) else {
            warn!("Skipping MARC record without a {} control number", CONTROL_NUMBER_TAG);
            return Ok(());
        };
        let path = out_dir.join(format!("{}.xml", id));
        fs::write(&path, record.to_document()).with_context(|| format!("Failed to write {:?}", path))?;
        written.push(path);
        Ok(())
    })?;

    info!("Split {} of {} MARC records from {:?} into {:?}", written.len(), total, combined, out_dir);
    Ok(written)
}
