//! Git repository reader (§6, "Consumed: Git repository reader").
//!
//! Shells out to the `git` binary the same way the teacher's `git.rs` does,
//! generalized from single-commit/single-diff operations to range queries
//! and date/week grouping, and ported to `tokio::process::Command` so it
//! never blocks the async runtime the orchestrator drives everything from.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::process::Command;

use crate::error::{PipelineError, Result};
use crate::types::{CommitRef, DayGroup, IsoWeek, WeekGroup};

/// The git operations the orchestrator and tier engine depend on. A trait so
/// tests can substitute an in-memory fixture instead of a real repository.
#[async_trait]
pub trait GitReader: Send + Sync {
   /// All commits in `[start, end]` (inclusive), oldest first.
   async fn commits_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CommitRef>>;

   /// The full diff for a single commit.
   async fn commit_diff(&self, hash: &str) -> Result<String>;

   /// The aggregate diff across `commits` (T2/T3 `diff_text` per §4.4),
   /// concatenated in the given order — never sampled or truncated.
   async fn aggregate_diff(&self, commits: &[CommitRef]) -> Result<String>;

   /// `commits`, grouped by calendar day (UTC), ascending by date.
   fn daily_commit_groups(&self, commits: &[CommitRef]) -> Vec<DayGroup>;

   /// `commits`, grouped by ISO (year, week), ascending.
   fn weekly_commit_groups(&self, commits: &[CommitRef]) -> Vec<WeekGroup>;
}

pub struct ProcessGitReader {
   repo_dir: String,
}

impl ProcessGitReader {
   pub fn new(repo_dir: impl Into<String>) -> Self {
      Self { repo_dir: repo_dir.into() }
   }

   async fn run(&self, args: &[&str]) -> Result<String> {
      let output = Command::new("git")
         .args(args)
         .current_dir(&self.repo_dir)
         .output()
         .await
         .map_err(|e| PipelineError::Repo(format!("failed to run git {}: {e}", args.join(" "))))?;

      if !output.status.success() {
         let stderr = String::from_utf8_lossy(&output.stderr);
         return Err(PipelineError::Repo(format!("git {} failed: {stderr}", args.join(" "))));
      }
      Ok(String::from_utf8_lossy(&output.stdout).into_owned())
   }
}

#[async_trait]
impl GitReader for ProcessGitReader {
   async fn commits_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CommitRef>> {
      // %x00-separated fields, one commit per line via %x01 record separator.
      let format_str = "%H%x00%aI%x00%P%x00%B%x01";
      let since = format!("--since={}", start.to_rfc3339());
      let until = format!("--until={}", end.to_rfc3339());
      let format_arg = format!("--format={format_str}");

      let stdout = self
         .run(&["log", "--reverse", &since, &until, &format_arg, "HEAD"])
         .await?;

      let mut commits = Vec::new();
      for record in stdout.split('\u{1}') {
         let record = record.trim_start_matches('\n');
         if record.trim().is_empty() {
            continue;
         }
         let mut fields = record.splitn(4, '\u{0}');
         let hash = fields.next().unwrap_or_default().to_string();
         let timestamp_raw = fields.next().unwrap_or_default();
         let parents_raw = fields.next().unwrap_or_default();
         let message = fields.next().unwrap_or_default().trim().to_string();

         let timestamp = DateTime::parse_from_rfc3339(timestamp_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| PipelineError::Repo(format!("malformed commit timestamp '{timestamp_raw}': {e}")))?;
         let parents = parents_raw.split_whitespace().map(str::to_string).collect();

         commits.push(CommitRef { hash, timestamp, message, parents });
      }
      Ok(commits)
   }

   /// Full `git show` output: commit message header followed by the diff,
   /// so a single string carries everything `analyze_commit` needs (§4.3).
   async fn commit_diff(&self, hash: &str) -> Result<String> {
      self.run(&["show", hash]).await
   }

   async fn aggregate_diff(&self, commits: &[CommitRef]) -> Result<String> {
      let mut out = String::new();
      for commit in commits {
         out.push_str(&self.commit_diff(&commit.hash).await?);
         out.push('\n');
      }
      Ok(out)
   }

   fn daily_commit_groups(&self, commits: &[CommitRef]) -> Vec<DayGroup> {
      group_by(commits, |c| c.timestamp.date_naive())
         .into_iter()
         .map(|(date, commits)| DayGroup { date, commits })
         .collect()
   }

   fn weekly_commit_groups(&self, commits: &[CommitRef]) -> Vec<WeekGroup> {
      group_by(commits, |c| {
         let iso = c.timestamp.iso_week();
         (iso.year(), iso.week())
      })
      .into_iter()
      .map(|(week, commits)| WeekGroup { week, commits })
      .collect()
   }
}

/// Groups `commits` by `key_fn`, preserving first-seen key order (the input
/// is already chronological, so this yields ascending groups for free).
fn group_by<K, F>(commits: &[CommitRef], key_fn: F) -> Vec<(K, Vec<CommitRef>)>
where
   K: PartialEq,
   F: Fn(&CommitRef) -> K,
{
   let mut groups: Vec<(K, Vec<CommitRef>)> = Vec::new();
   for commit in commits {
      let key = key_fn(commit);
      if let Some((_, bucket)) = groups.iter_mut().find(|(k, _)| *k == key) {
         bucket.push(commit.clone());
      } else {
         groups.push((key, vec![commit.clone()]));
      }
   }
   groups
}

/// Formats `(year, week)` for cache keys and prompt labels (§3, §4.4).
pub fn iso_week_label(week: IsoWeek) -> String {
   format!("{}-W{:02}", week.0, week.1)
}

/// Formats a calendar day for cache keys and prompt labels.
pub fn day_label(date: NaiveDate) -> String {
   date.format("%Y-%m-%d").to_string()
}
