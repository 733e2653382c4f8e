use thiserror::Error;

/// Error taxonomy for the analysis pipeline.
///
/// Variants map directly onto the propagation policy: `Config`/`Repo` abort
/// the run immediately, `Fitting`/`LlmClient` are fatal to the tier call that
/// raised them (and therefore to the run, since no tier may substitute a
/// fabricated result), `Cache` is logged and swallowed, and `Cancelled` is
/// the outcome of an observed cancellation signal.
#[derive(Debug, Error)]
pub enum PipelineError {
   #[error("configuration error: {0}")]
   Config(String),

   #[error("repository read failed: {0}")]
   Repo(String),

   #[error("prompt fitting failed: input needs {actual} tokens, budget is {target}")]
   Fitting { actual: usize, target: usize },

   #[error("LLM call failed after retries: {source}")]
   LlmClient {
      #[source]
      source: Box<Self>,
      /// The final prompt sent, kept for diagnostics (not displayed by
      /// `Display` to avoid flooding terminal output with prompt bodies).
      prompt: String,
   },

   #[error("LLM request failed (HTTP {status}): {body}")]
   ApiError { status: u16, body: String },

   #[error("cache I/O error: {0}")]
   Cache(String),

   #[error("run was cancelled")]
   Cancelled,

   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   #[error("JSON error: {0}")]
   Json(#[from] serde_json::Error),

   #[error("HTTP error: {0}")]
   Http(#[from] reqwest::Error),

   #[error("{0}")]
   Other(String),
}

impl PipelineError {
   /// The final prompt sent before an `LlmClient` failure, if this is one.
   pub fn failed_prompt(&self) -> Option<&str> {
      match self {
         Self::LlmClient { prompt, .. } => Some(prompt),
         _ => None,
      }
   }

   /// Short stage-tagged name for the single-line diagnostic in §7.
   pub const fn kind(&self) -> &'static str {
      match self {
         Self::Config(_) => "config",
         Self::Repo(_) => "repo",
         Self::Fitting { .. } => "fitting",
         Self::LlmClient { .. } | Self::ApiError { .. } => "llm",
         Self::Cache(_) => "cache",
         Self::Cancelled => "cancelled",
         Self::Io(_) => "io",
         Self::Json(_) => "json",
         Self::Http(_) => "http",
         Self::Other(_) => "other",
      }
   }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
