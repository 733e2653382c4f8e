//! Command-line argument surface (§6 ambient CLI entry point), in the
//! manner of the teacher's `Args`.

use chrono::{DateTime, Utc};
use clap::Parser;

/// Analyzes a window of git history and writes `NEWS.md`, `CHANGELOG.md`,
/// and `DAILY_LOG.md`.
#[derive(Parser, Debug)]
#[command(name = "repo-analysis-pipeline", version, about)]
pub struct Args {
   /// Start of the analysis window (RFC 3339), inclusive.
   #[arg(long)]
   pub start: Option<DateTime<Utc>>,

   /// End of the analysis window (RFC 3339), inclusive. Defaults to now.
   #[arg(long)]
   pub end: Option<DateTime<Utc>>,

   /// Path to the repository to analyze.
   #[arg(long, default_value = ".")]
   pub repo: String,

   /// Path to a TOML config file. Defaults to the platform config dir.
   #[arg(long)]
   pub config: Option<String>,

   /// Deletes the entire cache tree and exits without analyzing anything.
   #[arg(long)]
   pub clear_cache: bool,

   /// Promotes the changelog's `[Unreleased]` section to this version on
   /// completion (e.g. `v1.4.0`), dated with the run's completion date.
   #[arg(long)]
   pub release: Option<String>,

   /// Overrides the configured maximum concurrent LLM calls.
   #[arg(long)]
   pub max_concurrent: Option<usize>,

   /// Prior narrative history to feed the period narrative prompt, if any.
   #[arg(long)]
   pub history: Option<String>,

   /// Directory artifacts are written to.
   #[arg(long, default_value = ".")]
   pub out_dir: String,

   /// Logs the prompt, token count, and retry count for every LLM call.
   #[arg(long)]
   pub debug: bool,
}
