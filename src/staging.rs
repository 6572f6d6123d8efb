//! Moving deposits from the share into the per-submission layout the
//! extraction run reads.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tar::Archive;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::progress::progress_bar;
use crate::report::{load_id_pairs, load_report};
use crate::sources::{is_housekeeping, matches_identifier};

pub const ZIP_DIR_NAME: &str = "zip_files";
pub const EXTRACTED_DIR_NAME: &str = "extracted_files";

// Proquest delivers `<name>_DATA.xml` next to `<name>.pdf`.
static SUBMISSION_FILE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)(?:_DATA\.xml|\.pdf)$").expect("Invalid submission file regex pattern")
});

/// Names of the immediate, non-housekeeping entries of `dir`.
fn entry_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_housekeeping(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

fn is_archive(name: &str) -> bool {
    name.ends_with(".zip") || name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Extract archive (supports ZIP and TAR.GZ)
pub fn extract_archive<R: Read + Seek>(mut archive: R, output_dir: &Path) -> Result<()> {
    match ZipArchive::new(&mut archive) {
        Ok(mut zip) => {
            debug!("Extracting ZIP archive into {:?}", output_dir);
            for i in 0..zip.len() {
                let mut file = zip.by_index(i)?;
                let outpath = match file.enclosed_name() {
                    Some(path) => output_dir.join(path),
                    None => {
                        warn!("Skipping unsafe archive entry {}", file.name());
                        continue;
                    }
                };

                if file.is_dir() {
                    fs::create_dir_all(&outpath)?;
                } else {
                    if let Some(p) = outpath.parent() {
                        fs::create_dir_all(p)?;
                    }
                    let mut outfile = File::create(&outpath)
                        .with_context(|| format!("Failed to create {:?}", outpath))?;
                    io::copy(&mut file, &mut outfile)?;
                }
            }
            Ok(())
        }
        Err(_) => {
            archive.seek(SeekFrom::Start(0))?;
            debug!("Trying to extract as TAR.GZ archive");
            let gz = GzDecoder::new(archive);
            let mut tar = Archive::new(gz);
            tar.unpack(output_dir)
                .with_context(|| format!("Not a ZIP or TAR.GZ archive, unpacking into {:?}", output_dir))?;
            Ok(())
        }
    }
}

pub fn extract_archive_file(archive: &Path, output_dir: &Path) -> Result<()> {
    let file = File::open(archive).with_context(|| format!("Failed to open archive {:?}", archive))?;
    extract_archive(file, output_dir).with_context(|| format!("Failed to extract {:?}", archive))
}

/// Stems of `*.zip` archives on the share with no staging directory yet.
pub fn find_new_archives(share: &Path, staging: &Path) -> Result<Vec<String>> {
    let staged: HashSet<String> = entry_names(staging)?.into_iter().collect();
    let new: Vec<String> = entry_names(share)?
        .into_iter()
        .filter_map(|name| name.strip_suffix(".zip").map(str::to_string))
        .filter(|stem| !staged.contains(stem))
        .collect();
    Ok(new)
}

/// Unpack each new archive into its own directory in the staging area.
pub fn stage_new_archives(share: &Path, staging: &Path) -> Result<Vec<PathBuf>> {
    let stems = find_new_archives(share, staging)?;
    let pb = progress_bar(stems.len());
    let mut staged = Vec::new();
    for stem in stems {
        debug!("Working on {}", stem);
        pb.set_message(stem.clone());
        let archive = share.join(format!("{}.zip", stem));
        let dest = staging.join(&stem);
        fs::create_dir(&dest).with_context(|| format!("Failed to create {:?}", dest))?;
        extract_archive_file(&archive, &dest)?;
        staged.push(dest);
        pb.inc(1);
    }
    pb.finish_with_message(format!("staged {} archive(s)", staged.len()));
    info!("Staged {} new archive(s) into {:?}", staged.len(), staging);
    Ok(staged)
}

/// Unpack every archive in `<root>/zip_files` into `<root>/extracted_files`.
pub fn unpack_all(root: &Path) -> Result<usize> {
    let zip_dir = root.join(ZIP_DIR_NAME);
    let dest = root.join(EXTRACTED_DIR_NAME);
    fs::create_dir_all(&dest).with_context(|| format!("Failed to create {:?}", dest))?;

    let archives: Vec<String> = entry_names(&zip_dir)?.into_iter().filter(|n| is_archive(n)).collect();
    let pb = progress_bar(archives.len());
    for name in &archives {
        debug!("Unpacking {}", name);
        pb.set_message(name.clone());
        extract_archive_file(&zip_dir.join(name), &dest)?;
        pb.inc(1);
    }
    pb.finish_with_message(format!("unpacked {} archive(s)", archives.len()));
    Ok(archives.len())
}

/// Submission name for a Proquest file, if it is one.
pub fn submission_name(file_name: &str) -> Option<&str> {
    SUBMISSION_FILE_REGEX
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Longest submission name `entry` starts with. An entry named exactly like
/// a submission is its directory, not a member.
fn owning_submission<'a>(entry: &str, submissions: &BTreeSet<&'a str>) -> Option<&'a str> {
    submissions
        .iter()
        .copied()
        .filter(|s| entry != *s && entry.starts_with(*s))
        .max_by_key(|s| s.len())
}

/// Group a flat directory of extracted files into one directory per
/// submission. Besides `<name>_DATA.xml` and `<name>.pdf`, every entry whose
/// name starts with `<name>` (supplementary files) moves with it.
pub fn organize_submissions(extracted: &Path) -> Result<Vec<PathBuf>> {
    let names = entry_names(extracted)?;
    let unique: BTreeSet<&str> = names.iter().filter_map(|n| submission_name(n)).collect();

    let mut dirs = Vec::new();
    for submission in &unique {
        let dir = extracted.join(submission);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        dirs.push(dir);
    }
    for name in &names {
        let Some(submission) = owning_submission(name, &unique) else {
            continue;
        };
        let from = extracted.join(name);
        let to = extracted.join(submission).join(name);
        fs::rename(&from, &to).with_context(|| format!("Failed to move {:?} to {:?}", from, to))?;
    }
    info!("Organized {} submission directories in {:?}", dirs.len(), extracted);
    Ok(dirs)
}

/// Submission directories named `id` or ending in `_<id>`.
fn dirs_matching<'a>(dirs: &'a [String], id: &'a str) -> impl Iterator<Item = &'a String> {
    dirs.iter().filter(move |d| matches_identifier(d, id))
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    fs::write(path, out).with_context(|| format!("Failed to write {:?}", path))
}

/// Write `<ID>.json` for each report row into the matching submission
/// directories. Returns the number of files written.
pub fn write_sidecars(report_path: &Path, extracted: &Path) -> Result<usize> {
    let report = load_report(report_path)?;
    let dirs = entry_names(extracted)?;

    let mut written = 0;
    for (id, row) in &report {
        let mut matched = false;
        for dir in dirs_matching(&dirs, id) {
            let path = extracted.join(dir).join(format!("{}.json", id));
            write_pretty_json(&path, row)?;
            debug!("Wrote sidecar {:?}", path);
            matched = true;
            written += 1;
        }
        if !matched {
            warn!("No submission directory matches report ID {}", id);
        }
    }
    info!("Wrote {} sidecar file(s)", written);
    Ok(written)
}

/// Move `<marc_dir>/<pub number>.xml` into every submission directory whose
/// name ends with the report ID of that pub number.
pub fn match_marc_files(extracted: &Path, marc_dir: &Path, report_path: &Path) -> Result<usize> {
    let pairs = load_id_pairs(report_path)?;
    let dirs = entry_names(extracted)?;

    let mut moved = 0;
    for (id, pub_number) in &pairs {
        for dir in dirs_matching(&dirs, id) {
            let from = marc_dir.join(format!("{}.xml", pub_number));
            if !from.exists() {
                warn!("No MARC record {:?} for submission {}", from, dir);
                continue;
            }
            let to = extracted.join(dir).join(format!("{}.xml", pub_number));
            fs::rename(&from, &to).with_context(|| format!("Failed to move {:?} to {:?}", from, to))?;
            moved += 1;
        }
    }
    info!("Moved {} MARC record(s) into submission directories", moved);
    Ok(moved)
}

/// Copy `<pub number>.pdf` for each report row from `all_pdfs` to `new_pdfs`.
pub fn copy_select_files(new_pdfs: &Path, all_pdfs: &Path, report_path: &Path) -> Result<usize> {
    let available: HashSet<String> = entry_names(all_pdfs)?
        .into_iter()
        .filter_map(|name| name.strip_suffix(".pdf").map(str::to_string))
        .collect();
    fs::create_dir_all(new_pdfs).with_context(|| format!("Failed to create {:?}", new_pdfs))?;

    let mut copied = 0;
    for (_, pub_number) in load_id_pairs(report_path)? {
        if !available.contains(&pub_number) {
            debug!("No PDF for pub number {}", pub_number);
            continue;
        }
        let file_name = format!("{}.pdf", pub_number);
        let from = all_pdfs.join(&file_name);
        let to = new_pdfs.join(&file_name);
        fs::copy(&from, &to).with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
        info!("Copied {}", file_name);
        copied += 1;
    }
    Ok(copied)
}
