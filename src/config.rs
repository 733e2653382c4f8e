//! Pipeline configuration (§6, "Configuration" consumed interface).
//!
//! Loaded from TOML with environment-variable overrides, following the
//! teacher's `CommitConfig::load` layering: defaults, then a config file if
//! one exists, then env vars, applied in that order so env vars always win.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Which wire format a model endpoint speaks. Some backends proxy both
/// Anthropic- and OpenAI-shaped models behind one `api_base_url`; the mode
/// is resolved per model name rather than fixed per config (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
   ChatCompletions,
   AnthropicMessages,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
   pub api_base_url: String,

   /// Overridden by `PIPELINE_API_KEY`.
   pub api_key: Option<String>,

   pub request_timeout_secs: u64,
   pub connect_timeout_secs: u64,

   /// Model used for T1 per-commit analysis.
   pub commit_model:   String,
   /// Model used for T2/T3 daily and weekly synthesis.
   pub synthesis_model: String,
   /// Model used for T4 narrative and changelog generation.
   pub narrative_model: String,

   /// Input token budget handed to the fitter for each tier (§4.2).
   pub commit_token_budget:    usize,
   pub synthesis_token_budget: usize,
   pub narrative_token_budget: usize,

   pub max_output_tokens: u32,
   pub temperature:       f32,

   pub max_retries:        u32,
   pub initial_backoff_ms: u64,

   /// Size of the single semaphore shared by every pipeline stage (§5).
   pub max_concurrent: usize,

   pub cache_dir: PathBuf,
}

impl Default for PipelineConfig {
   fn default() -> Self {
      Self {
         api_base_url:           "http://localhost:4000".to_string(),
         api_key:                None,
         request_timeout_secs:   120,
         connect_timeout_secs:   30,
         commit_model:           "claude-haiku-4-5".to_string(),
         synthesis_model:        "claude-sonnet-4.5".to_string(),
         narrative_model:        "claude-sonnet-4.5".to_string(),
         commit_token_budget:    6_000,
         synthesis_token_budget: 12_000,
         narrative_token_budget: 16_000,
         max_output_tokens:      4_096,
         temperature:            0.2,
         max_retries:            3,
         initial_backoff_ms:     1_000,
         max_concurrent:         8,
         cache_dir:              PathBuf::from(".pipeline-cache"),
      }
   }
}

impl PipelineConfig {
   /// Loads from `PIPELINE_CONFIG` (if set), else the default search path,
   /// else built-in defaults; env vars override whichever was loaded.
   pub fn load() -> Result<Self> {
      let config_path = if let Ok(custom_path) = std::env::var("PIPELINE_CONFIG") {
         PathBuf::from(custom_path)
      } else {
         Self::default_config_path().unwrap_or_default()
      };

      let mut config =
         if config_path.as_os_str().is_empty() || !config_path.exists() {
            Self::default()
         } else {
            Self::from_file(&config_path)?
         };

      Self::apply_env_overrides(&mut config);
      Ok(config)
   }

   pub fn from_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path)
         .map_err(|e| PipelineError::Config(format!("failed to read config at {}: {e}", path.display())))?;
      let mut config: Self = toml::from_str(&contents)
         .map_err(|e| PipelineError::Config(format!("failed to parse config: {e}")))?;
      Self::apply_env_overrides(&mut config);
      Ok(config)
   }

   fn apply_env_overrides(config: &mut Self) {
      if let Ok(url) = std::env::var("PIPELINE_API_URL") {
         config.api_base_url = url;
      }
      if let Ok(key) = std::env::var("PIPELINE_API_KEY") {
         config.api_key = Some(key);
      }
      if let Ok(n) = std::env::var("PIPELINE_MAX_CONCURRENT")
         && let Ok(n) = n.parse()
      {
         config.max_concurrent = n;
      }
   }

   pub fn default_config_path() -> Result<PathBuf> {
      if let Ok(home) = std::env::var("HOME") {
         return Ok(PathBuf::from(home).join(".config/repo-analysis-pipeline/config.toml"));
      }
      if let Ok(home) = std::env::var("USERPROFILE") {
         return Ok(PathBuf::from(home).join(".config/repo-analysis-pipeline/config.toml"));
      }
      Err(PipelineError::Config("no home directory found (tried HOME and USERPROFILE)".to_string()))
   }

   /// Resolves which wire format `model` speaks. Anthropic model names carry
   /// a `claude-` prefix; everything else is assumed OpenAI-compatible.
   pub fn resolved_api_mode(&self, model: &str) -> ApiMode {
      if model.starts_with("claude-") {
         ApiMode::AnthropicMessages
      } else {
         ApiMode::ChatCompletions
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn defaults_resolve_anthropic_mode_for_claude_models() {
      let config = PipelineConfig::default();
      assert_eq!(config.resolved_api_mode("claude-sonnet-4.5"), ApiMode::AnthropicMessages);
   }

   #[test]
   fn non_claude_model_resolves_to_chat_completions() {
      let config = PipelineConfig::default();
      assert_eq!(config.resolved_api_mode("gpt-4o"), ApiMode::ChatCompletions);
   }
}
