//! Orchestrator (§4.5, C5).
//!
//! Schedules the four tiers against one shared concurrency budget and feeds
//! progress to an optional sink. Fan-out follows the pack's
//! `Orchestrator::fan_out` (`zircote-rlm`): one `Arc<Semaphore>`, a
//! `tokio::spawn`'d task per unit of work that acquires its permit *inside*
//! the task body (so queued tasks never block the scheduler from dispatching
//! work that has a free permit), and a `JoinHandle` collection barrier
//! between stages.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::error::{PipelineError, Result};
use crate::git_reader::GitReader;
use crate::llm::client::LlmClient;
use crate::tiers::{commit, day, period, week};
use crate::types::{CommitAnalysis, CommitRef, DayGroup, Outcome, PeriodAnalysis, WeekGroup};

/// A pipeline stage, for progress reporting (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
   CommitAnalysis,
   DailySynthesis,
   WeeklySynthesis,
   Narrative,
   Changelog,
}

/// Receives `(stage, completed, total)` progress updates. Implementations
/// must not block — the orchestrator awaits every call.
pub trait ProgressSink: Send + Sync {
   fn on_progress(&self, stage: Stage, completed: usize, total: usize);
}

/// A no-op sink for non-interactive runs (§4.5).
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
   fn on_progress(&self, _stage: Stage, _completed: usize, _total: usize) {}
}

pub struct Orchestrator {
   cache:     Arc<CacheStore>,
   git:       Arc<dyn GitReader>,
   llm:       Arc<dyn LlmClient>,
   sink:      Arc<dyn ProgressSink>,
   cancel:    CancellationToken,
   /// One semaphore shared across every stage (T1, T2, T3, and the two T4
   /// sub-calls) — §5 is explicit that this bound must stay global rather
   /// than being split per-stage.
   semaphore: Arc<Semaphore>,
}

impl Orchestrator {
   pub fn new(
      cache: Arc<CacheStore>,
      git: Arc<dyn GitReader>,
      llm: Arc<dyn LlmClient>,
      sink: Arc<dyn ProgressSink>,
      cancel: CancellationToken,
      max_concurrent: usize,
   ) -> Self {
      Self { cache, git, llm, sink, cancel, semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))) }
   }

   /// Runs the full pipeline over `commits` (already date-filtered by the
   /// caller), returning the assembled [`PeriodAnalysis`] or
   /// [`Outcome::Cancelled`] if cancellation was observed at a barrier.
   pub async fn run(&self, commits: Vec<CommitRef>, history: Option<&str>) -> Result<Outcome> {
      if self.cancel.is_cancelled() {
         return Ok(Outcome::Cancelled);
      }

      // T1: fan out per-commit analysis.
      let commit_analyses = match self.run_commit_tier(&commits).await? {
         Some(v) => v,
         None => return Ok(Outcome::Cancelled),
      };

      if self.cancel.is_cancelled() {
         return Ok(Outcome::Cancelled);
      }

      // T2: group by day, fan out per-day synthesis.
      let day_groups = self.git.daily_commit_groups(&commits);
      let daily_summaries = match self.run_day_tier(&day_groups, &commit_analyses).await? {
         Some(v) => v,
         None => return Ok(Outcome::Cancelled),
      };

      if self.cancel.is_cancelled() {
         return Ok(Outcome::Cancelled);
      }

      // T3: group by ISO week, fan out per-week synthesis.
      let week_groups = self.git.weekly_commit_groups(&commits);
      let weekly_summaries = match self.run_week_tier(&week_groups, &commit_analyses).await? {
         Some(v) => v,
         None => return Ok(Outcome::Cancelled),
      };

      let changelog_entries: Vec<CommitAnalysis> = commits
         .iter()
         .filter_map(|c| commit_analyses.iter().find(|(cr, _)| cr.hash == c.hash))
         .map(|(_, a)| a.clone())
         .filter(|a| !a.trivial)
         .collect();

      let period = PeriodAnalysis {
         period_summaries:  weekly_summaries,
         daily_summaries:   daily_summaries,
         changelog_entries,
      };

      if self.cancel.is_cancelled() {
         return Ok(Outcome::Cancelled);
      }

      // T4: narrative and changelog run concurrently, each still gated by
      // the same global semaphore as every earlier stage.
      let (narrative, changelog) = tokio::join!(
         self.run_under_semaphore(period::narrative(&period, history, &self.cache, self.llm.as_ref())),
         self.run_under_semaphore(period::changelog(&period, &self.cache, self.llm.as_ref())),
      );
      let news = match narrative {
         Some(r) => r?,
         None => return Ok(Outcome::Cancelled),
      };
      let changelog_text = match changelog {
         Some(r) => r?,
         None => return Ok(Outcome::Cancelled),
      };
      self.sink.on_progress(Stage::Narrative, 1, 1);
      self.sink.on_progress(Stage::Changelog, 1, 1);

      Ok(Outcome::Completed(crate::types::Artifacts {
         news,
         changelog: changelog_text,
         daily_log: crate::artifacts::format_daily_log(&day_groups, &period.daily_summaries),
      }))
   }

   /// Awaits `fut` behind the shared semaphore, returning `None` if
   /// cancellation is observed before or during the wait.
   async fn run_under_semaphore<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Option<Result<T>> {
      let _permit = tokio::select! {
         permit = self.semaphore.acquire() => permit.ok()?,
         () = self.cancel.cancelled() => return None,
      };
      Some(fut.await)
   }

   async fn run_commit_tier(&self, commits: &[CommitRef]) -> Result<Option<Vec<(CommitRef, CommitAnalysis)>>> {
      let total = commits.len();
      let mut handles = Vec::with_capacity(total);

      for commit_ref in commits {
         let sem = Arc::clone(&self.semaphore);
         let cache = Arc::clone(&self.cache);
         let git = Arc::clone(&self.git);
         let llm = Arc::clone(&self.llm);
         let cancel = self.cancel.clone();
         let commit_ref = commit_ref.clone();

         handles.push(tokio::spawn(async move {
            let _permit = tokio::select! {
               permit = sem.acquire() => permit.map_err(|e| PipelineError::Other(format!("semaphore closed: {e}")))?,
               () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            };
            commit::analyze(&commit_ref, cache.as_ref(), git.as_ref(), llm.as_ref())
               .await
               .map(|analysis| (commit_ref, analysis))
         }));
      }

      let mut results = Vec::with_capacity(total);
      for (i, handle) in handles.into_iter().enumerate() {
         match handle.await {
            Ok(Ok(pair)) => results.push(pair),
            Ok(Err(PipelineError::Cancelled)) => return Ok(None),
            Ok(Err(e)) => return Err(e),
            Err(join_err) => return Err(PipelineError::Other(format!("commit analysis task panicked: {join_err}"))),
         }
         self.sink.on_progress(Stage::CommitAnalysis, i + 1, total);
      }
      Ok(Some(results))
   }

   async fn run_day_tier(
      &self,
      groups: &[DayGroup],
      analyses: &[(CommitRef, CommitAnalysis)],
   ) -> Result<Option<Vec<String>>> {
      let total = groups.len();
      let mut handles = Vec::with_capacity(total);

      for group in groups {
         let sem = Arc::clone(&self.semaphore);
         let cache = Arc::clone(&self.cache);
         let git = Arc::clone(&self.git);
         let llm = Arc::clone(&self.llm);
         let cancel = self.cancel.clone();
         let date = group.date;
         let commits = group.commits.clone();
         let analyses_for_group: Vec<(CommitRef, CommitAnalysis)> = commits
            .iter()
            .filter_map(|c| analyses.iter().find(|(cr, _)| cr.hash == c.hash).cloned())
            .collect();

         handles.push(tokio::spawn(async move {
            let _permit = tokio::select! {
               permit = sem.acquire() => permit.map_err(|e| PipelineError::Other(format!("semaphore closed: {e}")))?,
               () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            };
            day::synthesize(date, &commits, &analyses_for_group, cache.as_ref(), git.as_ref(), llm.as_ref()).await
         }));
      }

      let mut results = Vec::with_capacity(total);
      for (i, handle) in handles.into_iter().enumerate() {
         match handle.await {
            Ok(Ok(summary)) => results.push(summary),
            Ok(Err(PipelineError::Cancelled)) => return Ok(None),
            Ok(Err(e)) => return Err(e),
            Err(join_err) => return Err(PipelineError::Other(format!("daily synthesis task panicked: {join_err}"))),
         }
         self.sink.on_progress(Stage::DailySynthesis, i + 1, total);
      }
      Ok(Some(results))
   }

   async fn run_week_tier(
      &self,
      groups: &[WeekGroup],
      analyses: &[(CommitRef, CommitAnalysis)],
   ) -> Result<Option<Vec<String>>> {
      let total = groups.len();
      let mut handles = Vec::with_capacity(total);

      for group in groups {
         let sem = Arc::clone(&self.semaphore);
         let cache = Arc::clone(&self.cache);
         let git = Arc::clone(&self.git);
         let llm = Arc::clone(&self.llm);
         let cancel = self.cancel.clone();
         let week = group.week;
         let commits = group.commits.clone();
         let analyses_for_group: Vec<(CommitRef, CommitAnalysis)> = commits
            .iter()
            .filter_map(|c| analyses.iter().find(|(cr, _)| cr.hash == c.hash).cloned())
            .collect();

         handles.push(tokio::spawn(async move {
            let _permit = tokio::select! {
               permit = sem.acquire() => permit.map_err(|e| PipelineError::Other(format!("semaphore closed: {e}")))?,
               () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            };
            week::synthesize(week, &commits, &analyses_for_group, cache.as_ref(), git.as_ref(), llm.as_ref()).await
         }));
      }

      let mut results = Vec::with_capacity(total);
      for (i, handle) in handles.into_iter().enumerate() {
         match handle.await {
            Ok(Ok(summary)) => results.push(summary),
            Ok(Err(PipelineError::Cancelled)) => return Ok(None),
            Ok(Err(e)) => return Err(e),
            Err(join_err) => return Err(PipelineError::Other(format!("weekly synthesis task panicked: {join_err}"))),
         }
         self.sink.on_progress(Stage::WeeklySynthesis, i + 1, total);
      }
      Ok(Some(results))
   }
}
