use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use fileprint::config::Config;
use fileprint::fingerprint::{FileFingerprint, SamplingParams, SparseChecksum};
use fileprint::scan::{self, ScanOptions, ScanReport};

#[derive(Parser)]
#[command(name = "fileprint", version, about = "Fast identity fingerprints for files")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory whose .fileprint/config.toml is used (default: current dir)
    #[arg(long, global = true)]
    config_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full-content checksum and media type
    Full {
        path: PathBuf,
        /// Logical file name used for media type detection
        #[arg(long)]
        label: Option<String>,
    },
    /// Checksum over a bounded number of sampled windows
    Sparse {
        path: PathBuf,
        /// Bytes per window
        #[arg(long)]
        window_size: Option<usize>,
        /// Maximum number of windows
        #[arg(long)]
        max_windows: Option<u64>,
        /// Minimum distance between window starts, in bytes
        #[arg(long)]
        min_stride: Option<u64>,
    },
    /// Media type only, without checksumming
    Mime {
        path: PathBuf,
        #[arg(long)]
        label: Option<String>,
    },
    /// Fingerprint every file in a directory
    Scan {
        path: PathBuf,
        /// Also compute full fingerprints for every file
        #[arg(long)]
        full: bool,
        /// Report groups of files with identical content
        #[arg(long)]
        duplicates: bool,
    },
    /// Write a default .fileprint/config.toml
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with_writer(std::io::stderr)
        .init();

    let config_root = match &cli.config_root {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("resolving current directory")?,
    };

    match cli.command {
        Commands::Full { path, label } => {
            let config = Config::load(&config_root)?;
            let fp = config.full_fingerprinter().fingerprint(&path, label.as_deref());
            emit(cli.json, &fp, print_full)
        }
        Commands::Sparse {
            path,
            window_size,
            max_windows,
            min_stride,
        } => {
            let config = Config::load(&config_root)?;
            let base = config.sampling_params()?;
            let params = SamplingParams::new(
                window_size.unwrap_or(base.window_size()),
                max_windows.unwrap_or(base.max_windows()),
                min_stride.unwrap_or(base.minimum_stride()),
            )
            .context("invalid sampling arguments")?;
            let sum = fileprint::compute_sparse_fingerprint(&path, &params);
            let out = SparseOutput {
                path: &path,
                sparse: sum,
                params,
            };
            emit(cli.json, &out, print_sparse)
        }
        Commands::Mime { path, label } => {
            let config = Config::load(&config_root)?;
            let media_type = config
                .full_fingerprinter()
                .detect_media_type(&path, label.as_deref());
            let out = MimeOutput {
                path: &path,
                media_type,
            };
            emit(cli.json, &out, |o| {
                println!("{}\t{}", o.media_type.as_deref().unwrap_or("-"), o.path.display())
            })
        }
        Commands::Scan {
            path,
            full,
            duplicates,
        } => {
            let config = Config::load(&path)?;
            let report = scan::scan_directory(&path, &config, ScanOptions { full, duplicates })?;
            emit(cli.json, &report, print_scan)
        }
        Commands::Init { path } => {
            let written = Config::default().save(&path)?;
            println!("Wrote {}", written.display());
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct SparseOutput<'a> {
    path: &'a Path,
    sparse: SparseChecksum,
    params: SamplingParams,
}

#[derive(Serialize)]
struct MimeOutput<'a> {
    path: &'a Path,
    media_type: Option<String>,
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl Fn(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn print_full(fp: &FileFingerprint) {
    println!(
        "{}\t{}\t{}\t{}",
        fp.checksum_hex().as_deref().unwrap_or("-"),
        fp.media_type().unwrap_or("-"),
        fp.size_bytes(),
        fp.label()
    );
}

fn print_sparse(out: &SparseOutput<'_>) {
    let value = match out.sparse.get() {
        Some(v) => format!("{v:x}"),
        None => "undetermined".to_string(),
    };
    println!("{value}\t{}", out.path.display());
}

fn print_scan(report: &ScanReport) {
    for entry in &report.entries {
        let sparse = match entry.sparse.get() {
            Some(v) => format!("{v:x}"),
            None => "undetermined".to_string(),
        };
        match &entry.full {
            Some(fp) => println!(
                "{sparse}\t{}\t{}\t{}\t{}",
                fp.checksum_hex().as_deref().unwrap_or("-"),
                fp.media_type().unwrap_or("-"),
                entry.size_bytes,
                entry.path
            ),
            None => println!("{sparse}\t{}\t{}", entry.size_bytes, entry.path),
        }
    }
    for group in &report.duplicates {
        println!();
        println!("duplicates ({} bytes, crc {}):", group.size_bytes, group.checksum);
        for path in &group.paths {
            println!("  {path}");
        }
    }
    println!();
    println!(
        "{} files scanned in {}, {} undetermined, {} duplicate groups",
        report.files_scanned,
        report.root.display(),
        report.files_undetermined,
        report.duplicates.len()
    );
}
