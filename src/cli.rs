//! CLI front end.
//!
//! Parses arguments into a `Config`, runs the pipeline, and writes the
//! resulting envelope to stdout or to the path given by `--json`. The
//! process exit code is `0` iff the envelope is `{ok:true,...}`.

use std::io::Write;

use clap::Parser;

use crate::config::{self, Config};
use crate::model::Envelope;
use crate::pipeline;

/// RepoDiff: deterministic, bounded git diff ingestion for LLM-facing
/// code review pipelines.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URL of the repository to clone.
    #[arg(long)]
    pub repo_url: String,

    /// The known-good commit (the diff's base).
    #[arg(long)]
    pub commit_good: String,

    /// The candidate commit (the diff's target).
    #[arg(long)]
    pub commit_candidate: String,

    /// Branch to fetch as a hint before resolving commits, for repositories
    /// where the default remote refs don't already cover them.
    #[arg(long)]
    pub branch: Option<String>,

    /// Total diff-body byte budget across all files.
    #[arg(long, default_value_t = config::DEFAULT_CAP_TOTAL)]
    pub cap_total: u64,

    /// Per-file diff-body byte budget.
    #[arg(long, default_value_t = config::DEFAULT_CAP_FILE)]
    pub cap_file: u64,

    /// Unified-diff context window, in lines.
    #[arg(long, default_value_t = config::DEFAULT_CONTEXT_LINES)]
    pub context_lines: u32,

    /// Minimum similarity percent for rename/copy detection.
    #[arg(long, default_value_t = config::DEFAULT_FIND_RENAMES_THRESHOLD)]
    pub find_renames_threshold: u8,

    /// Keep the cloned workspace directory after the run completes.
    #[arg(long)]
    pub keep_workdir: bool,

    /// Keep the cloned workspace directory if the run fails.
    #[arg(long)]
    pub keep_on_error: bool,

    /// Write the envelope JSON to this path instead of stdout.
    #[arg(long)]
    pub json: Option<String>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Config {
        let mut config = Config::new(args.repo_url, args.commit_good, args.commit_candidate);
        config.branch_name = args.branch;
        config.cap_total = args.cap_total;
        config.cap_file = args.cap_file;
        config.context_lines = args.context_lines;
        config.find_renames_threshold = args.find_renames_threshold;
        config.keep_workdir = args.keep_workdir;
        config.keep_on_error = args.keep_on_error;
        config
    }
}

/// Initialize `tracing-subscriber` once at process start, honoring
/// `LOG_LEVEL`. Safe to call exactly once; a second call is a programmer
/// error, not handled here.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();
}

/// Parse arguments, run the pipeline, and write the envelope out.
/// Returns the process exit code to use on failure, or `Ok(())` on
/// success (exit code 0).
pub fn run() -> Result<(), i32> {
    let args = Args::parse();
    let json_path = args.json.clone();

    let config = match Config::from(args).validated() {
        Ok(c) => c,
        Err(e) => {
            emit(&e.into_envelope(), json_path.as_deref());
            return Err(1);
        }
    };

    let envelope = pipeline::run(config);
    let ok = envelope.is_ok();
    emit(&envelope, json_path.as_deref());
    if ok {
        Ok(())
    } else {
        Err(1)
    }
}

fn emit(envelope: &Envelope, json_path: Option<&str>) {
    let text = match crate::utils::serializer::serialize_canonical(envelope) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to serialize envelope: {e}");
            return;
        }
    };

    match json_path {
        Some(path) => {
            if let Err(e) = std::fs::File::create(path).and_then(|mut f| f.write_all(text.as_bytes())) {
                eprintln!("failed to write {path}: {e}");
            }
        }
        None => println!("{text}"),
    }
}
