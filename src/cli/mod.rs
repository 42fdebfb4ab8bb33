//! Command-line interface for treescan
//!
//! Scans a local directory with `FsTree` and prints matching paths, one per
//! line or as a JSON document.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::scan::{FileScanner, sink};
use crate::tree::FsTree;
use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam::queue::SegQueue;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// treescan - find paths matching glob, wildcard and regex patterns
#[derive(Parser, Debug)]
#[command(name = "treescan", version, about, long_about = None)]
pub struct Cli {
    /// Glob patterns, e.g. "**/*.rs" or "src/*.toml"
    pub globs: Vec<String>,

    /// Directory to scan
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Wildcard pattern (`*` and `?` only, repeatable)
    #[arg(short, long = "wildcard", value_name = "PATTERN")]
    pub wildcards: Vec<String>,

    /// Regular expression below an anchor directory (repeatable)
    #[arg(short = 'e', long = "regex", value_name = "ANCHOR=REGEX")]
    pub regexes: Vec<String>,

    /// String prepended to every printed path
    #[arg(long)]
    pub prefix: Option<String>,

    /// Also print matching directories
    #[arg(long)]
    pub dirs: bool,

    /// Do not print matching files
    #[arg(long)]
    pub no_files: bool,

    /// Maximum number of scan workers
    #[arg(short = 'j', long, value_name = "N")]
    pub max_threads: Option<usize>,

    /// Use custom configuration file
    #[arg(long, value_name = "FILE", env = "TREESCAN_CONFIG")]
    pub config: Option<String>,

    /// Print a JSON document instead of plain lines
    #[arg(long)]
    pub json: bool,

    /// Sort results before printing
    #[arg(long)]
    pub sort: bool,

    /// Exit with an error if any directory could not be listed
    #[arg(long)]
    pub strict: bool,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    matches: &'a [String],
    errors: Vec<String>,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);

        if self.globs.is_empty() && self.wildcards.is_empty() && self.regexes.is_empty() {
            bail!("no patterns given; pass a glob, --wildcard or --regex");
        }

        let config = ScanConfig::load_with_custom_config(self.config.as_deref())
            .context("failed to load configuration")?;
        let errors = Arc::new(SegQueue::new());
        let scanner = self.build_scanner(&config, errors.clone())?;

        tracing::info!(
            root = %self.root.display(),
            anchors = scanner.pattern_sets().len(),
            max_workers = scanner.max_workers(),
            "scanning"
        );

        let mut matches: Vec<String> = scanner.scan().collect();
        if self.sort {
            matches.sort();
        }
        let errors = sink::drain(&errors);

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if self.json {
            let report = Report {
                matches: &matches,
                errors: errors.iter().map(ToString::to_string).collect(),
            };
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        } else {
            // listing failures already went to the log as warnings
            for path in &matches {
                writeln!(out, "{path}")?;
            }
        }

        if self.strict && !errors.is_empty() {
            bail!("{} directories could not be listed", errors.len());
        }
        Ok(())
    }

    fn build_scanner(
        &self,
        config: &ScanConfig,
        errors: Arc<SegQueue<ScanError>>,
    ) -> Result<FileScanner> {
        let mut scanner = FileScanner::from_config(FsTree::new(&self.root), config)
            .with_error_sink(errors);

        if let Some(prefix) = &self.prefix {
            scanner = scanner.with_root_prefix(prefix.clone());
        }
        if self.dirs {
            scanner = scanner.with_directories(true);
        }
        if self.no_files {
            scanner = scanner.with_files(false);
        }
        if let Some(n) = self.max_threads {
            scanner = scanner.with_max_workers(n);
        }

        for glob in &self.globs {
            scanner = scanner.add_glob(glob)?;
        }
        for wildcard in &self.wildcards {
            scanner = scanner.add_wildcard(wildcard)?;
        }
        for arg in &self.regexes {
            let Some((anchor, regex)) = arg.split_once('=') else {
                bail!("--regex expects ANCHOR=REGEX, got '{arg}'");
            };
            scanner = scanner.add_regex(anchor, regex)?;
        }
        Ok(scanner)
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
