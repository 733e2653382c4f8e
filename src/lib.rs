//! Repository analysis pipeline.
//!
//! Turns a window of commits into three narrative artifacts — `NEWS.md`,
//! `CHANGELOG.md`, `DAILY_LOG.md` — via a four-tier LLM analysis pipeline
//! (per-commit → per-day → per-week → period-wide), mediated throughout by
//! a content-addressed cache so repeated runs over an overlapping window
//! only pay for what changed.

pub mod artifacts;
pub mod cache;
pub mod category;
pub mod cli;
pub mod config;
pub mod error;
pub mod fitter;
pub mod git_reader;
pub mod llm;
pub mod orchestrator;
pub mod style;
pub mod templates;
pub mod tiers;
pub mod types;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

pub use cache::CacheStore;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use git_reader::GitReader;
pub use llm::LlmClient;
pub use orchestrator::{NullProgressSink, Orchestrator, ProgressSink, Stage};
pub use types::{Artifacts, CommitAnalysis, CommitRef, Outcome};

/// Runs the full pipeline over `[start, end)`, returning the assembled
/// artifacts or `Outcome::Cancelled` if `cancel` fired before completion.
///
/// This is the crate's single entry point (§6): it resolves the commit
/// window via `repo.commits_in_range`, then delegates scheduling to an
/// internal [`Orchestrator`]. Collaborators are taken as `Arc`s rather than
/// borrows — the orchestrator's per-unit `tokio::spawn` fan-out (§4.5)
/// needs to clone each one into a `'static` task, so an owned, cheaply
/// shared handle is what every caller ends up needing anyway.
pub async fn run(
   repo: Arc<dyn GitReader>,
   cache: Arc<CacheStore>,
   llm: Arc<dyn LlmClient>,
   start: DateTime<Utc>,
   end: DateTime<Utc>,
   cancel: CancellationToken,
   progress: Arc<dyn ProgressSink>,
   max_concurrent: usize,
   history: Option<&str>,
) -> Result<Outcome> {
   let commits = repo.commits_in_range(start, end).await?;
   // S1 (spec §8): an empty window is a no-op for the external artifact
   // writer — short-circuit before any tier runs rather than generating a
   // narrative/changelog for zero commits.
   if commits.is_empty() {
      return Ok(Outcome::Completed(Artifacts::empty()));
   }
   let orchestrator = Orchestrator::new(cache, repo, llm, progress, cancel, max_concurrent);
   orchestrator.run(commits, history).await
}

/// Deletes every cached entry across all tiers (§6).
pub async fn clear_cache(cache: &CacheStore) -> Result<()> {
   cache.clear().await
}
