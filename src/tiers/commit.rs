//! T1 — per-commit analysis (§4.4).

use crate::cache::{CacheStore, Namespace};
use crate::error::Result;
use crate::git_reader::GitReader;
use crate::llm::client::LlmClient;
use crate::types::{CommitAnalysis, CommitRef};

/// Analyzes a single commit, consulting and populating the cache. A T1
/// failure is fatal to the run (§4.4 failure semantics) — callers propagate
/// the error rather than substituting a placeholder analysis.
pub async fn analyze(
   commit: &CommitRef,
   cache: &CacheStore,
   git: &dyn GitReader,
   llm: &dyn LlmClient,
) -> Result<CommitAnalysis> {
   let key = CacheStore::key(&[&commit.hash]);
   if let Some(cached) = cache.get::<CommitAnalysis>(Namespace::Commits, &key).await {
      return Ok(cached);
   }

   let diff = git.commit_diff(&commit.hash).await?;
   let analysis = llm.analyze_commit(&diff).await?;

   if let Err(e) = cache.put(Namespace::Commits, &key, &analysis).await {
      tracing::warn!(commit = %commit.hash, error = %e, "failed to cache commit analysis");
   }
   Ok(analysis)
}
