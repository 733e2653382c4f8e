//! Prompt template loading and rendering (supporting role for §4.3's
//! `analyze_commit` / `synthesize_daily` / `synthesize_weekly` /
//! `generate_narrative` / `generate_changelog`).
//!
//! Templates are embedded at compile time and unpacked to a user override
//! directory on first use, the same two-tier scheme the teacher uses: a
//! file under the user's prompts directory always wins over the embedded
//! default, so operators can tune prompt wording without a rebuild.

use std::{
   path::{Path, PathBuf},
   sync::LazyLock,
};

use parking_lot::Mutex;
use rust_embed::RustEmbed;
use tera::{Context, Tera};

use crate::error::{PipelineError, Result};

#[derive(RustEmbed)]
#[folder = "prompts/"]
struct Prompts;

static TERA: LazyLock<Mutex<Tera>> = LazyLock::new(|| {
   if let Err(e) = ensure_prompts_dir() {
      tracing::warn!(error = %e, "failed to initialize prompts directory");
   }

   // Templates are loaded and rendered fresh per call via `render_str` (see
   // `render` below) rather than pre-registered, so a user override edited
   // after startup takes effect without a restart. This instance only holds
   // Tera's shared engine state (no filters/functions registered yet).
   let mut tera = Tera::default();
   tera.autoescape_on(vec![]);
   Mutex::new(tera)
});

fn get_user_prompts_dir() -> Option<PathBuf> {
   std::env::var("HOME")
      .or_else(|_| std::env::var("USERPROFILE"))
      .ok()
      .map(|home| PathBuf::from(home).join(".repo-analysis-pipeline").join("prompts"))
}

/// Unpacks embedded prompts to the user override directory, updating any
/// file whose content has drifted from the embedded default.
pub fn ensure_prompts_dir() -> Result<()> {
   let Some(user_prompts_dir) = get_user_prompts_dir() else {
      return Ok(());
   };
   std::fs::create_dir_all(&user_prompts_dir)?;

   for file in Prompts::iter() {
      let file_path = user_prompts_dir.join(file.as_ref());
      let Some(embedded_file) = Prompts::get(file.as_ref()) else { continue };
      let embedded_content = embedded_file.data;

      let should_write = match std::fs::read(&file_path) {
         Ok(existing) => existing != embedded_content.as_ref(),
         Err(_) => true,
      };
      if should_write {
         std::fs::write(&file_path, embedded_content.as_ref())?;
      }
   }
   Ok(())
}

fn load_template(name: &str) -> Result<String> {
   if let Some(prompts_dir) = get_user_prompts_dir() {
      let path = prompts_dir.join(name);
      if path.exists() {
         return std::fs::read_to_string(&path).map_err(PipelineError::from);
      }
   }

   let embedded_key = name;
   Prompts::get(embedded_key)
      .and_then(|bytes| std::str::from_utf8(bytes.data.as_ref()).ok().map(str::to_string))
      .ok_or_else(|| PipelineError::Config(format!("template '{name}' not found as override or embedded default")))
}

fn render(name: &str, context: &Context) -> Result<String> {
   let template_content = load_template(name)?;
   let mut tera = TERA.lock();
   tera
      .render_str(&template_content, context)
      .map_err(|e| PipelineError::Config(format!("failed to render template '{name}': {e}")))
}

fn render_path(path: &Path, context: &Context) -> Result<String> {
   render(path.to_str().unwrap_or_default(), context)
}

/// Renders the T1 commit-analysis prompt.
pub fn render_commit_analysis(diff: &str) -> Result<String> {
   let mut context = Context::new();
   context.insert("diff", diff);
   render_path(Path::new("commit_analysis.md"), &context)
}

/// Renders the T2/T3 synthesis prompt (reused for both per-day and per-week
/// synthesis, per §4.4).
pub fn render_daily_synthesis(log_text: &str, diff_text: &str) -> Result<String> {
   let mut context = Context::new();
   context.insert("log_text", log_text);
   context.insert("diff_text", diff_text);
   render_path(Path::new("daily_synthesis.md"), &context)
}

/// Renders the T4 narrative prompt.
pub fn render_narrative(
   commit_summaries: &str,
   daily_summaries: &str,
   weekly_diff: &str,
   history: Option<&str>,
) -> Result<String> {
   let mut context = Context::new();
   context.insert("commit_summaries", commit_summaries);
   context.insert("daily_summaries", daily_summaries);
   context.insert("weekly_diff", weekly_diff);
   if let Some(history) = history {
      context.insert("history", history);
   }
   render_path(Path::new("narrative.md"), &context)
}

/// Renders the T4 changelog-generation prompt.
pub fn render_changelog(categorized_changes: &str) -> Result<String> {
   let mut context = Context::new();
   context.insert("categorized_changes", categorized_changes);
   render_path(Path::new("changelog.md"), &context)
}
