use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use etdprep::config::{ConfigFile, PipelineConfig};
use etdprep::{marc, pipeline, staging, urls};
use log::info;
use std::path::PathBuf;

/// CLI app for preparing Proquest dissertation deposits for repository upload
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file supplying defaults for every path option
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract metadata from submission directories into the upload CSV
    Extract {
        /// Directory with one subdirectory per submission
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// CSV listing the full-text paths (see `list-files`)
        #[arg(short, long)]
        urls: Option<PathBuf>,
        /// Prefix removed from listed paths to recover identifiers
        #[arg(long)]
        url_base: Option<String>,
        /// Season column value
        #[arg(long)]
        season: Option<String>,
        /// Append to the output instead of replacing it
        #[arg(long)]
        append: bool,
        /// Fall back to the metadata accept date when a sidecar has no date
        #[arg(long)]
        accept_date_fallback: bool,
    },
    /// Unpack archives on the share that have no staging directory yet
    Stage {
        #[arg(long)]
        share: Option<PathBuf>,
        #[arg(long)]
        staging: Option<PathBuf>,
    },
    /// Unpack <root>/zip_files into <root>/extracted_files
    Unpack {
        #[arg(long)]
        root: PathBuf,
    },
    /// Group extracted Proquest files into one directory per submission
    Organize {
        #[arg(long)]
        extracted: Option<PathBuf>,
    },
    /// Write a JSON sidecar per report row into its submission directory
    Sidecars {
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        extracted: Option<PathBuf>,
    },
    /// Move per-record MARC-XML files into their submission directories
    MatchMarc {
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        marc: Option<PathBuf>,
        #[arg(long)]
        extracted: Option<PathBuf>,
    },
    /// Split a combined MARC-XML export into one file per record
    SplitMarc {
        /// Combined export (defaults to <marcxml_path>/etd_marc.xml)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output directory (defaults to <marcxml_path>/split_xml_files)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a full-text URL listing for the files in a directory
    ListFiles {
        #[arg(long)]
        dir: PathBuf,
        /// Base path or URL each file name is appended to
        #[arg(long)]
        base: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Copy the PDFs named in the report into a new folder
    CopySelect {
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        from: Option<PathBuf>,
        #[arg(long)]
        to: Option<PathBuf>,
    },
}

fn require(flag: Option<PathBuf>, configured: &Option<PathBuf>, name: &str) -> Result<PathBuf> {
    flag.or_else(|| configured.clone())
        .with_context(|| format!("No {} given; pass it as a flag or set it in the config file", name))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Configure logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let cfg = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    match args.command {
        Command::Extract { input, output, urls, url_base, season, append, accept_date_fallback } => {
            let input = require(input, &cfg.extracted_file_path, "submission directory")?;
            let output = require(output, &cfg.output_path, "output path")?;
            let mut config = PipelineConfig::new(input, output);
            config.url_csv = urls.or_else(|| cfg.url_csv_path.clone());
            config.url_base_prefix = url_base.or_else(|| cfg.url_base_prefix.clone()).unwrap_or_default();
            if let Some(season) = season.or_else(|| cfg.season.clone()) {
                config.season = season;
            }
            config.append = append;
            config.accept_date_fallback = accept_date_fallback || cfg.accept_date_fallback.unwrap_or(false);
            config.mapping = cfg.field_mapping();

            let summary = pipeline::run(&config)?;
            summary.log();
        }
        Command::Stage { share, staging: staging_dir } => {
            let share = require(share, &cfg.dissertation_path, "dissertation share")?;
            let staging_dir = require(staging_dir, &cfg.staging_path, "staging directory")?;
            staging::stage_new_archives(&share, &staging_dir)?;
        }
        Command::Unpack { root } => {
            let count = staging::unpack_all(&root)?;
            info!("Unpacked {} archive(s)", count);
        }
        Command::Organize { extracted } => {
            let extracted = require(extracted, &cfg.extracted_file_path, "extracted file directory")?;
            staging::organize_submissions(&extracted)?;
        }
        Command::Sidecars { report, extracted } => {
            let report = require(report, &cfg.report_path, "report path")?;
            let extracted = require(extracted, &cfg.extracted_file_path, "extracted file directory")?;
            staging::write_sidecars(&report, &extracted)?;
        }
        Command::MatchMarc { report, marc: marc_dir, extracted } => {
            let report = require(report, &cfg.report_path, "report path")?;
            let marc_dir = require(marc_dir, &cfg.marcxml_path, "MARC-XML directory")?;
            let extracted = require(extracted, &cfg.extracted_file_path, "extracted file directory")?;
            staging::match_marc_files(&extracted, &marc_dir, &report)?;
        }
        Command::SplitMarc { input, output } => {
            let input = match input {
                Some(path) => path,
                None => require(None, &cfg.marcxml_path, "MARC-XML directory")?.join(marc::COMBINED_FILE_NAME),
            };
            let output = match output {
                Some(path) => path,
                None => require(None, &cfg.marcxml_path, "MARC-XML directory")?.join(marc::SPLIT_DIR_NAME),
            };
            marc::split_collection(&input, &output)?;
        }
        Command::ListFiles { dir, base, output } => {
            let output = require(output, &cfg.url_csv_path, "URL listing output")?;
            urls::write_url_listing(&dir, &base, &output)?;
        }
        Command::CopySelect { report, from, to } => {
            let report = require(report, &cfg.report_path, "report path")?;
            let from = require(from, &cfg.all_pdf_folder_path, "source PDF folder")?;
            let to = require(to, &cfg.new_pdf_folder_path, "destination PDF folder")?;
            let copied = staging::copy_select_files(&to, &from, &report)?;
            info!("Copied {} PDF(s) into {:?}", copied, to);
        }
    }

    Ok(())
}
