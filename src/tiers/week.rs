//! T3 — per-week summary (§4.4). Reuses `synthesize_daily` verbatim, per
//! the spec's explicit instruction that per-week synthesis is the same LLM
//! operation applied to a wider window.

use crate::cache::{CacheStore, Namespace, TextValue};
use crate::error::Result;
use crate::git_reader::{iso_week_label, GitReader};
use crate::llm::client::LlmClient;
use crate::tiers::day::compose_log_text;
use crate::types::{CommitAnalysis, CommitRef, IsoWeek};

pub async fn synthesize(
   week: IsoWeek,
   commits: &[CommitRef],
   analyses: &[(CommitRef, CommitAnalysis)],
   cache: &CacheStore,
   git: &dyn GitReader,
   llm: &dyn LlmClient,
) -> Result<String> {
   let label = iso_week_label(week);
   let mut hashes: Vec<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
   hashes.push(&label);
   let key = CacheStore::key_sorted(hashes);

   if let Some(cached) = cache.get::<TextValue>(Namespace::WeeklySummaries, &key).await {
      return Ok(cached.0);
   }

   let log_text = compose_log_text(commits, analyses);
   let diff_text = git.aggregate_diff(commits).await?;
   let summary = llm.synthesize_daily(&log_text, &diff_text).await?;

   if let Err(e) = cache.put(Namespace::WeeklySummaries, &key, &TextValue(summary.clone())).await {
      tracing::warn!(week = %label, error = %e, "failed to cache weekly summary");
   }
   Ok(summary)
}
