//! Core data model: commit references, tier outputs, and the period-wide
//! aggregate the orchestrator assembles from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::category::ChangeCategory;

/// A single commit, as produced by the external git reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
   pub hash:      String,
   pub timestamp: DateTime<Utc>,
   pub message:   String,
   pub parents:   Vec<String>,
}

/// One observed change within a commit's analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeItem {
   pub summary:  String,
   pub category: ChangeCategory,
}

/// Tier-1 output for a single commit.
///
/// Invariant (spec §3): `trivial ⇒ changes may be empty`; `!trivial ⇒
/// changes non-empty`. Triviality itself is derived (§3a) from the category
/// set, not stored independently of it — `CommitAnalysis::new` is the only
/// constructor and enforces this.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommitAnalysis {
   pub changes: Vec<ChangeItem>,
   pub trivial: bool,
}

impl CommitAnalysis {
   /// Build an analysis from raw changes, deriving `trivial` per §3a: every
   /// change is in a trivial category and none mentions a breaking change.
   pub fn new(changes: Vec<ChangeItem>) -> Self {
      let trivial = changes
         .iter()
         .all(|c| c.category.is_trivial_category() && !mentions_breaking_change(&c.summary));
      Self { changes, trivial }
   }
}

fn mentions_breaking_change(summary: &str) -> bool {
   let lower = summary.to_lowercase();
   lower.contains("breaking") || lower.contains("incompatible")
}

/// Tier-2/3 output: free-form synthesis text keyed by a date or ISO week.
pub type DailySummary = String;
pub type WeeklySummary = String;

/// ISO (year, week) identifier used to key weekly grouping (§3, §4.4).
pub type IsoWeek = (i32, u32);

/// The T1-T3 aggregate handed to T4 (§3, "Period analysis result").
///
/// Ordering invariants (§4.4):
/// - `daily_summaries` ascending by date
/// - `period_summaries` ascending by `(iso_year, iso_week)`
/// - `changelog_entries` preserves commit order within the window
#[derive(Debug, Clone, Default)]
pub struct PeriodAnalysis {
   pub period_summaries:  Vec<WeeklySummary>,
   pub daily_summaries:   Vec<DailySummary>,
   pub changelog_entries: Vec<CommitAnalysis>,
}

/// A day's worth of commits, grouped for T2.
#[derive(Debug, Clone)]
pub struct DayGroup {
   pub date:    NaiveDate,
   pub commits: Vec<CommitRef>,
}

/// A week's worth of commits, grouped for T3.
#[derive(Debug, Clone)]
pub struct WeekGroup {
   pub week:    IsoWeek,
   pub commits: Vec<CommitRef>,
}

/// The three rendered artifacts handed to the external artifact writer.
#[derive(Debug, Clone)]
pub struct Artifacts {
   pub news:      String,
   pub changelog: String,
   pub daily_log: String,
}

impl Artifacts {
   /// The S1 sentinel (spec §8): an empty window produces no text in any of
   /// the three artifacts, signalling the external writer should not run.
   pub fn empty() -> Self {
      Self { news: String::new(), changelog: String::new(), daily_log: String::new() }
   }

   pub fn is_empty(&self) -> bool {
      self.news.is_empty() && self.changelog.is_empty() && self.daily_log.is_empty()
   }
}

/// Result of a full `run()` invocation.
#[derive(Debug, Clone)]
pub enum Outcome {
   /// The window was analyzed and artifacts produced (possibly empty, for
   /// S1's zero-commit window — see `Artifacts::is_empty`).
   Completed(Artifacts),
   /// Cancellation was observed before artifacts were written.
   Cancelled,
}
