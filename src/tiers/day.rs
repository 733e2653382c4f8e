//! T2 — per-day synthesis (§4.4).

use chrono::NaiveDate;

use crate::cache::{CacheStore, Namespace, TextValue};
use crate::error::Result;
use crate::git_reader::{day_label, GitReader};
use crate::llm::client::LlmClient;
use crate::types::{CommitAnalysis, CommitRef};

/// Synthesizes one day's worth of commits into a single summary string. A
/// T2 failure aborts the whole run (§4.4 failure semantics) — the caller is
/// expected to propagate the error rather than skip the day.
pub async fn synthesize(
   date: NaiveDate,
   commits: &[CommitRef],
   analyses: &[(CommitRef, CommitAnalysis)],
   cache: &CacheStore,
   git: &dyn GitReader,
   llm: &dyn LlmClient,
) -> Result<String> {
   let label = day_label(date);
   let mut hashes: Vec<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
   hashes.push(&label);
   let key = CacheStore::key_sorted(hashes);

   if let Some(cached) = cache.get::<TextValue>(Namespace::DailySummaries, &key).await {
      return Ok(cached.0);
   }

   let log_text = compose_log_text(commits, analyses);
   let diff_text = git.aggregate_diff(commits).await?;
   let summary = llm.synthesize_daily(&log_text, &diff_text).await?;

   if let Err(e) = cache.put(Namespace::DailySummaries, &key, &TextValue(summary.clone())).await {
      tracing::warn!(date = %label, error = %e, "failed to cache daily summary");
   }
   Ok(summary)
}

/// Concatenates commit messages with their T1 summaries, in commit order
/// (§4.4: "concatenation of commit messages and T1 summaries").
pub fn compose_log_text(commits: &[CommitRef], analyses: &[(CommitRef, CommitAnalysis)]) -> String {
   use std::fmt::Write as _;

   let mut out = String::new();
   for commit in commits {
      let _ = writeln!(out, "commit {}", commit.hash);
      let _ = writeln!(out, "{}\n", commit.message.trim());

      if let Some((_, analysis)) = analyses.iter().find(|(c, _)| c.hash == commit.hash) {
         for change in &analysis.changes {
            let _ = writeln!(out, "  - [{}] {}", change.category.label(), change.summary);
         }
      }
      out.push('\n');
   }
   out
}
