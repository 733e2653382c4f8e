use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use repo_analysis_pipeline::cli::Args;
use repo_analysis_pipeline::git_reader::ProcessGitReader;
use repo_analysis_pipeline::llm::HttpLlmClient;
use repo_analysis_pipeline::orchestrator::{ProgressSink, Stage};
use repo_analysis_pipeline::{artifacts, style, CacheStore, Outcome, PipelineConfig};
use tokio_util::sync::CancellationToken;

/// Prints `(stage, completed, total)` updates to stderr, in the manner of
/// the teacher's spinner-based progress output, minus the spinner itself
/// (a long-running batch pipeline reports discrete counts, not a single
/// in-flight spinner).
struct CliProgressSink;

impl ProgressSink for CliProgressSink {
   fn on_progress(&self, stage: Stage, completed: usize, total: usize) {
      let label = match stage {
         Stage::CommitAnalysis => "commit analysis",
         Stage::DailySynthesis => "daily synthesis",
         Stage::WeeklySynthesis => "weekly synthesis",
         Stage::Narrative => "narrative",
         Stage::Changelog => "changelog",
      };
      style::print_info(&format!("{label}: {completed}/{total}"));
   }
}

fn init_logging(debug: bool) {
   let filter = if debug { "debug" } else { "info" };
   tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::new(
         std::env::var("RUST_LOG").unwrap_or_else(|_| filter.to_string()),
      ))
      .with_writer(std::io::stderr)
      .init();
}

fn load_config_from_args(args: &Args) -> repo_analysis_pipeline::Result<PipelineConfig> {
   let mut config = if let Some(ref path) = args.config {
      PipelineConfig::from_file(std::path::Path::new(path))?
   } else {
      PipelineConfig::load()?
   };
   if let Some(max_concurrent) = args.max_concurrent {
      config.max_concurrent = max_concurrent;
   }
   Ok(config)
}

async fn run_pipeline(args: Args) -> repo_analysis_pipeline::Result<()> {
   let config = load_config_from_args(&args)?;
   let cache = Arc::new(CacheStore::new(config.cache_dir.clone()));

   if args.clear_cache {
      repo_analysis_pipeline::clear_cache(&cache).await?;
      style::print_info("cache cleared");
      return Ok(());
   }

   if config.api_key.is_none() {
      return Err(repo_analysis_pipeline::PipelineError::Config(
         "no API key configured (set PIPELINE_API_KEY or api_key in the config file)".to_string(),
      ));
   }

   let repo = Arc::new(ProcessGitReader::new(args.repo.clone()));
   let llm = Arc::new(HttpLlmClient::new(config.clone()));
   let sink: Arc<dyn ProgressSink> = Arc::new(CliProgressSink);
   let cancel = CancellationToken::new();

   {
      let cancel = cancel.clone();
      tokio::spawn(async move {
         let _ = tokio::signal::ctrl_c().await;
         cancel.cancel();
      });
   }

   let end = args.end.unwrap_or_else(Utc::now);
   let start = args.start.unwrap_or_else(|| end - chrono::Duration::days(7));

   let outcome = repo_analysis_pipeline::run(
      repo,
      Arc::clone(&cache),
      llm,
      start,
      end,
      cancel,
      sink,
      config.max_concurrent,
      args.history.as_deref(),
   )
   .await?;

   match outcome {
      Outcome::Cancelled => {
         style::warn("run cancelled, no artifacts written");
      },
      Outcome::Completed(bundle) if bundle.is_empty() => {
         style::print_info("empty window, nothing to write");
      },
      Outcome::Completed(bundle) => {
         let out_dir = std::path::Path::new(&args.out_dir);
         artifacts::write_news(&out_dir.join("NEWS.md"), &bundle, start.date_naive(), end.date_naive())?;
         artifacts::write_daily_log(&out_dir.join("DAILY_LOG.md"), &bundle)?;
         let release = args.release.as_deref().map(|v| (v, end.date_naive()));
         artifacts::write_changelog(&out_dir.join("CHANGELOG.md"), &bundle, release)?;
         style::print_info(&style::success("artifacts written"));
      },
   }

   Ok(())
}

fn main() -> ExitCode {
   let args = Args::parse();
   init_logging(args.debug);

   let runtime = match tokio::runtime::Runtime::new() {
      Ok(rt) => rt,
      Err(e) => {
         eprintln!("{} failed to start async runtime: {e}", style::error("error:"));
         return ExitCode::FAILURE;
      },
   };

   match runtime.block_on(run_pipeline(args)) {
      Ok(()) => ExitCode::SUCCESS,
      Err(e) => {
         eprintln!("{} [{}] {e}", style::error("error:"), e.kind());
         ExitCode::FAILURE
      },
   }
}
