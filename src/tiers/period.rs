//! T4 — period-wide narrative and changelog (§4.4). The two sub-operations
//! are computed concurrently; each has its own cache namespace and key.

use std::fmt::Write as _;

use crate::cache::{CacheStore, Namespace, TextValue};
use crate::error::Result;
use crate::llm::client::LlmClient;
use crate::types::{CommitAnalysis, PeriodAnalysis};

/// Renders a `CommitAnalysis` as the flattened "categorized changes" text
/// the changelog prompt and narrative prompt both consume, one line per
/// change, tagged with its category for the LLM to group by.
fn render_changes(entries: &[CommitAnalysis]) -> String {
   let mut out = String::new();
   for analysis in entries {
      for change in &analysis.changes {
         let _ = writeln!(out, "[{}] {}", change.category.label(), change.summary);
      }
   }
   out
}

/// Generates the period narrative. Cache key: hash of the period analysis
/// result's sorted inputs (§4.4).
pub async fn narrative(
   period: &PeriodAnalysis,
   history: Option<&str>,
   cache: &CacheStore,
   llm: &dyn LlmClient,
) -> Result<String> {
   let commit_summaries = render_changes(&period.changelog_entries);
   let mut inputs: Vec<&str> = period.daily_summaries.iter().map(String::as_str).collect();
   inputs.extend(period.period_summaries.iter().map(String::as_str));
   inputs.push(&commit_summaries);
   let key = CacheStore::key_sorted(inputs);

   if let Some(cached) = cache.get::<TextValue>(Namespace::Narratives, &key).await {
      return Ok(cached.0);
   }

   let daily_summaries = period.daily_summaries.join("\n\n");
   let weekly_diff = period.period_summaries.join("\n\n");
   let text = llm.generate_narrative(&commit_summaries, &daily_summaries, &weekly_diff, history).await?;

   if let Err(e) = cache.put(Namespace::Narratives, &key, &TextValue(text.clone())).await {
      tracing::warn!(error = %e, "failed to cache period narrative");
   }
   Ok(text)
}

/// Generates the period changelog. Cache key: hash of the changelog
/// entries list (sorted by rendered text, §4.4).
pub async fn changelog(period: &PeriodAnalysis, cache: &CacheStore, llm: &dyn LlmClient) -> Result<String> {
   let mut ranked: Vec<(usize, String)> = period
      .changelog_entries
      .iter()
      .flat_map(|a| a.changes.iter())
      .map(|c| (c.category.render_rank(), format!("[{}] {}", c.category.label(), c.summary)))
      .collect();

   let key_lines: Vec<&str> = ranked.iter().map(|(_, line)| line.as_str()).collect();
   let key = CacheStore::key_sorted(key_lines);

   if let Some(cached) = cache.get::<TextValue>(Namespace::Changelogs, &key).await {
      return Ok(cached.0);
   }

   // Category order is fixed by the category-to-glyph table's declared
   // order (§4.4 tie-break); sort is stable so within-category order
   // follows commit order.
   ranked.sort_by_key(|(rank, _)| *rank);
   let categorized_changes = ranked.into_iter().map(|(_, line)| line).collect::<Vec<_>>().join("\n");

   let text = llm.generate_changelog(&categorized_changes).await?;

   if let Err(e) = cache.put(Namespace::Changelogs, &key, &TextValue(text.clone())).await {
      tracing::warn!(error = %e, "failed to cache period changelog");
   }
   Ok(text)
}
