//! LLM client (§4.3, C3).
//!
//! Wires together prompt fitting, the tolerant JSON decode pipeline, and the
//! retry loop behind one async trait so the tier engine never deals with
//! chunking, backoff, or wire formats directly. Request building follows the
//! teacher's dual-mode split (`api.rs`): `ChatCompletions` for
//! OpenAI-compatible endpoints, `AnthropicMessages` for native Claude tool
//! calls, chosen per model via [`PipelineConfig::resolved_api_mode`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{ApiMode, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::fitter::{self, FitInput, FitPlan, Section};
use crate::llm::retry::{retry_call, Attempt};
use crate::llm::schema;
use crate::llm::tokens::{HttpTokenCounter, TokenCounter};
use crate::types::{ChangeItem, CommitAnalysis};

/// The LLM-backed operations the tier engine calls (§4.3). A trait so tests
/// can substitute a fake implementation that never makes a network call.
#[async_trait]
pub trait LlmClient: Send + Sync {
   async fn analyze_commit(&self, diff: &str) -> Result<CommitAnalysis>;
   /// Synthesizes a free-form summary from a log of commit messages/T1
   /// summaries (`log_text`) plus an aggregate diff (`diff_text`). Reused
   /// verbatim for T3 per-week summaries (§4.4: "the same operation is
   /// re-used for per-week synthesis").
   async fn synthesize_daily(&self, log_text: &str, diff_text: &str) -> Result<String>;
   async fn generate_narrative(
      &self,
      commit_summaries: &str,
      daily_summaries: &str,
      weekly_diff: &str,
      history: Option<&str>,
   ) -> Result<String>;
   async fn generate_changelog(&self, categorized_changes: &str) -> Result<String>;
   async fn count_tokens(&self, text: &str) -> usize;
}

#[derive(Debug, Serialize)]
struct ChatMessage {
   role:    &'static str,
   content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
   model:       String,
   max_tokens:  u32,
   temperature: f32,
   messages:    Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
   message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
   #[serde(default)]
   content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
   choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
struct AnthropicContent {
   #[serde(rename = "type")]
   content_type: &'static str,
   text:         String,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
   role:    &'static str,
   content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
   model:       String,
   max_tokens:  u32,
   temperature: f32,
   messages:    Vec<AnthropicMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponseContent {
   #[serde(rename = "type")]
   content_type: String,
   #[serde(default)]
   text:         String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
   content: Vec<AnthropicResponseContent>,
}

/// Default HTTP-backed [`LlmClient`], speaking either wire format depending
/// on the model configured for the call site.
pub struct HttpLlmClient {
   client: reqwest::Client,
   config: PipelineConfig,
   tokens: HttpTokenCounter,
}

impl HttpLlmClient {
   pub fn new(config: PipelineConfig) -> Self {
      let client = reqwest::Client::builder()
         .timeout(Duration::from_secs(config.request_timeout_secs))
         .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
         .build()
         .expect("failed to build HTTP client");
      let tokens = HttpTokenCounter::new(&config.api_base_url, config.api_key.as_deref(), &config.commit_model);
      Self { client, config, tokens }
   }

   /// Sends `prompt` to `model` and returns the raw text response, retrying
   /// per §4.3's retryable/fatal classification. Network/wire-level failures
   /// only — callers that additionally require a structured decode use
   /// [`Self::call_json`], which folds the decode into the same retry loop.
   async fn call_raw(&self, model: &str, prompt: &str) -> Result<String> {
      let mode = self.config.resolved_api_mode(model);
      let max_retries = self.config.max_retries;
      let backoff = self.config.initial_backoff_ms;

      self.log_outgoing(model, prompt);

      retry_call(max_retries, backoff, |attempt| async move {
         if attempt > 1 {
            tracing::debug!(model, attempt, "retrying LLM call");
         }
         classify_send(self.send(mode, model, prompt).await)
      })
      .await
      .map_err(|e| reattach_prompt(e, prompt))
   }

   /// Like [`Self::call_raw`], but additionally decodes the response into
   /// `T` through the tolerant JSON pipeline (§4.3 step 4) and folds a
   /// schema-validation failure back into the retry loop rather than
   /// surfacing it as a fatal error on the first bad response. Per §4.3 step
   /// 3, a decode failure is only fatal once retries are exhausted.
   async fn call_json<T: DeserializeOwned>(&self, model: &str, prompt: &str) -> Result<T> {
      let mode = self.config.resolved_api_mode(model);
      let max_retries = self.config.max_retries;
      let backoff = self.config.initial_backoff_ms;

      self.log_outgoing(model, prompt);

      retry_call(max_retries, backoff, |attempt| async move {
         if attempt > 1 {
            tracing::debug!(model, attempt, "retrying LLM call");
         }
         match classify_send(self.send(mode, model, prompt).await) {
            Attempt::Succeeded(text) => match schema::decode::<T>(&text) {
               Some(value) => Attempt::Succeeded(value),
               None => Attempt::Retryable(PipelineError::Other(format!(
                  "response failed schema validation: {text}"
               ))),
            },
            Attempt::Retryable(e) => Attempt::Retryable(e),
            Attempt::Fatal(e) => Attempt::Fatal(e),
         }
      })
      .await
      .map_err(|e| reattach_prompt(e, prompt))
   }

   async fn send(&self, mode: ApiMode, model: &str, prompt: &str) -> Result<String> {
      match mode {
         ApiMode::ChatCompletions => self.send_chat(model, prompt).await,
         ApiMode::AnthropicMessages => self.send_anthropic(model, prompt).await,
      }
   }

   // §7 debug mode: the prompt, its token count, and the attempt number are
   // logged at `debug` level for every call; `--debug` raises the
   // subscriber's filter to `debug` in `main.rs::init_logging`.
   fn log_outgoing(&self, model: &str, prompt: &str) {
      tracing::debug!(
         model,
         tokens = self.tokens.count_sync(prompt),
         prompt,
         "sending LLM call"
      );
   }

   async fn send_chat(&self, model: &str, prompt: &str) -> Result<String> {
      let request = ChatRequest {
         model: model.to_string(),
         max_tokens: self.config.max_output_tokens,
         temperature: self.config.temperature,
         messages: vec![ChatMessage { role: "user", content: prompt.to_string() }],
      };

      let mut builder = self
         .client
         .post(format!("{}/chat/completions", self.config.api_base_url))
         .header("content-type", "application/json");
      if let Some(api_key) = &self.config.api_key {
         builder = builder.header("Authorization", format!("Bearer {api_key}"));
      }

      let response = builder.json(&request).send().await?;
      let status = response.status();
      let body = response.text().await?;
      if !status.is_success() {
         return Err(PipelineError::ApiError { status: status.as_u16(), body });
      }

      let parsed: ChatResponse =
         serde_json::from_str(&body).map_err(|e| PipelineError::Other(format!("malformed chat response: {e}")))?;
      Ok(parsed.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default())
   }

   async fn send_anthropic(&self, model: &str, prompt: &str) -> Result<String> {
      let request = AnthropicRequest {
         model: model.to_string(),
         max_tokens: self.config.max_output_tokens,
         temperature: self.config.temperature,
         messages: vec![AnthropicMessage {
            role:    "user",
            content: vec![AnthropicContent { content_type: "text", text: prompt.to_string() }],
         }],
      };

      let mut builder = self
         .client
         .post(anthropic_messages_url(&self.config.api_base_url))
         .header("content-type", "application/json")
         .header("anthropic-version", "2023-06-01");
      if let Some(api_key) = &self.config.api_key {
         builder = builder.header("x-api-key", api_key);
      }

      let response = builder.json(&request).send().await?;
      let status = response.status();
      let body = response.text().await?;
      if !status.is_success() {
         return Err(PipelineError::ApiError { status: status.as_u16(), body });
      }

      let parsed: AnthropicResponse = serde_json::from_str(&body)
         .map_err(|e| PipelineError::Other(format!("malformed anthropic response: {e}")))?;
      let text = parsed
         .content
         .into_iter()
         .filter(|c| c.content_type == "text")
         .map(|c| c.text)
         .collect::<Vec<_>>()
         .join("\n");
      Ok(text)
   }

   /// Fits `sections` to `budget`, runs every resulting call through
   /// `call_raw`, and combines partial results per §4.2's deterministic
   /// template. For free-text operations only — a structured decode cannot
   /// go through the text combine template, see
   /// [`Self::fit_and_call_commit_analysis`].
   async fn fit_and_call(&self, model: &str, sections: Vec<Section>, budget: usize) -> Result<String> {
      let input = FitInput::new(sections);
      let plan = fitter::fit(&input, budget, &self.tokens)
         .map_err(|e| PipelineError::Fitting { actual: e.actual, target: e.target })?;

      match plan {
         FitPlan::Single(prompt) => self.call_raw(model, &prompt).await,
         FitPlan::Chunked(calls) => {
            let mut partials = Vec::with_capacity(calls.len());
            for call in calls {
               partials.push(self.call_raw(model, &call.prompt).await?);
            }
            Ok(fitter::combine(&partials))
         },
      }
   }

   /// Fits `sections` to `budget` and runs every resulting call through
   /// `call_json`, merging each chunk's decoded `changes` into one payload
   /// rather than concatenating raw text (a diff chunked across N calls
   /// still describes one commit, not N commits to narrate separately).
   async fn fit_and_call_commit_analysis(
      &self,
      model: &str,
      sections: Vec<Section>,
      budget: usize,
   ) -> Result<CommitAnalysisPayload> {
      let input = FitInput::new(sections);
      let plan = fitter::fit(&input, budget, &self.tokens)
         .map_err(|e| PipelineError::Fitting { actual: e.actual, target: e.target })?;

      match plan {
         FitPlan::Single(prompt) => self.call_json(model, &prompt).await,
         FitPlan::Chunked(calls) => {
            let mut payloads = Vec::with_capacity(calls.len());
            for call in calls {
               payloads.push(self.call_json(model, &call.prompt).await?);
            }
            Ok(merge_commit_payloads(payloads))
         },
      }
   }
}

/// Merges the decoded payload of each overlapping chunk call into one: a
/// diff chunked across N calls still describes one commit, so its changes
/// are concatenated rather than narrated as N separate commits.
fn merge_commit_payloads(payloads: Vec<CommitAnalysisPayload>) -> CommitAnalysisPayload {
   CommitAnalysisPayload { changes: payloads.into_iter().flat_map(|p| p.changes).collect() }
}

/// Classifies a wire-level send result per §4.3 step 3: connect/IO errors,
/// 429/5xx, empty bodies, and malformed envelopes all retry; any other
/// status (4xx-other-than-429) is fatal immediately.
fn classify_send(outcome: Result<String>) -> Attempt<String> {
   match outcome {
      Ok(text) if text.trim().is_empty() => {
         Attempt::Retryable(PipelineError::Other("empty response body".to_string()))
      },
      Ok(text) => Attempt::Succeeded(text),
      Err(e @ PipelineError::ApiError { status, .. }) => {
         if status == 429 || (500..600).contains(&status) {
            Attempt::Retryable(e)
         } else {
            Attempt::Fatal(e)
         }
      },
      // `Other` covers a malformed response envelope (bad JSON from the
      // provider) as well as the empty-body case constructed above — both
      // are wire hiccups worth a retry, not a permanent failure.
      Err(e @ (PipelineError::Http(_) | PipelineError::Io(_) | PipelineError::Other(_))) => {
         Attempt::Retryable(e)
      },
      Err(e) => Attempt::Fatal(e),
   }
}

fn reattach_prompt(e: PipelineError, prompt: &str) -> PipelineError {
   match e {
      PipelineError::LlmClient { source, .. } => {
         PipelineError::LlmClient { source, prompt: prompt.to_string() }
      },
      other => other,
   }
}

fn anthropic_messages_url(base_url: &str) -> String {
   let trimmed = base_url.trim_end_matches('/');
   if trimmed.ends_with("/v1") {
      format!("{trimmed}/messages")
   } else {
      format!("{trimmed}/v1/messages")
   }
}

#[derive(Debug, Deserialize)]
struct CommitAnalysisPayload {
   changes: Vec<ChangeItem>,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
   async fn analyze_commit(&self, diff: &str) -> Result<CommitAnalysis> {
      let prompt = crate::templates::render_commit_analysis(diff)?;
      let sections = vec![Section { label: "diff".to_string(), body: prompt }];
      let payload = self
         .fit_and_call_commit_analysis(&self.config.commit_model, sections, self.config.commit_token_budget)
         .await?;
      Ok(CommitAnalysis::new(payload.changes))
   }

   async fn synthesize_daily(&self, log_text: &str, diff_text: &str) -> Result<String> {
      let prompt = crate::templates::render_daily_synthesis(log_text, diff_text)?;
      let sections = vec![Section { label: "synthesis".to_string(), body: prompt }];
      self.fit_and_call(&self.config.synthesis_model, sections, self.config.synthesis_token_budget).await
   }

   async fn generate_narrative(
      &self,
      commit_summaries: &str,
      daily_summaries: &str,
      weekly_diff: &str,
      history: Option<&str>,
   ) -> Result<String> {
      let prompt = crate::templates::render_narrative(commit_summaries, daily_summaries, weekly_diff, history)?;
      let sections = vec![Section { label: "narrative".to_string(), body: prompt }];
      self.fit_and_call(&self.config.narrative_model, sections, self.config.narrative_token_budget).await
   }

   async fn generate_changelog(&self, categorized_changes: &str) -> Result<String> {
      let prompt = crate::templates::render_changelog(categorized_changes)?;
      let sections = vec![Section { label: "changelog".to_string(), body: prompt }];
      self.fit_and_call(&self.config.narrative_model, sections, self.config.narrative_token_budget).await
   }

   async fn count_tokens(&self, text: &str) -> usize {
      self.tokens.count(text).await
   }
}

#[cfg(test)]
mod tests {
   use std::sync::atomic::{AtomicU32, Ordering};

   use super::*;
   use crate::category::ChangeCategory;

   #[test]
   fn anthropic_url_appends_messages_path() {
      assert_eq!(anthropic_messages_url("https://api.example.com"), "https://api.example.com/v1/messages");
      assert_eq!(anthropic_messages_url("https://api.example.com/v1"), "https://api.example.com/v1/messages");
      assert_eq!(anthropic_messages_url("https://api.example.com/"), "https://api.example.com/v1/messages");
   }

   #[test]
   fn malformed_envelope_is_retryable_not_fatal() {
      let bad_envelope = classify_send(Err(PipelineError::Other("malformed chat response: EOF".to_string())));
      assert!(matches!(bad_envelope, Attempt::Retryable(_)));

      let server_error = classify_send(Err(PipelineError::ApiError { status: 503, body: String::new() }));
      assert!(matches!(server_error, Attempt::Retryable(_)));

      let client_error = classify_send(Err(PipelineError::ApiError { status: 400, body: String::new() }));
      assert!(matches!(client_error, Attempt::Fatal(_)));
   }

   #[test]
   fn merge_commit_payloads_concatenates_changes_across_chunks() {
      let first = CommitAnalysisPayload {
         changes: vec![ChangeItem { summary: "split part one".to_string(), category: ChangeCategory::Chore }],
      };
      let second = CommitAnalysisPayload {
         changes: vec![ChangeItem {
            summary:  "split part two".to_string(),
            category: ChangeCategory::NewFeature,
         }],
      };

      let merged = merge_commit_payloads(vec![first, second]);
      assert_eq!(merged.changes.len(), 2);
      assert_eq!(merged.changes[0].summary, "split part one");
      assert_eq!(merged.changes[1].summary, "split part two");
   }

   /// Reproduces the composition `call_json` relies on: a schema-validation
   /// failure on the first attempt must retry rather than surface as a
   /// fatal error, the same way `analyze_commit` needs a malformed first
   /// reply to retry instead of aborting the whole run (§4.3 step 3).
   #[tokio::test]
   async fn schema_decode_failure_retries_then_succeeds() {
      let attempts = AtomicU32::new(0);
      let result: Result<CommitAnalysisPayload> = retry_call(3, 1, |_n| {
         let seen = attempts.fetch_add(1, Ordering::SeqCst);
         async move {
            let raw = if seen == 0 { "not json at all" } else { r#"{"changes": []}"# };
            match schema::decode::<CommitAnalysisPayload>(raw) {
               Some(value) => Attempt::Succeeded(value),
               None => {
                  Attempt::Retryable(PipelineError::Other(format!("response failed schema validation: {raw}")))
               },
            }
         }
      })
      .await;

      assert!(result.is_ok());
      assert_eq!(attempts.load(Ordering::SeqCst), 2);
   }

   #[tokio::test]
   async fn schema_decode_failure_is_fatal_only_once_retries_are_exhausted() {
      let attempts = AtomicU32::new(0);
      let result: Result<CommitAnalysisPayload> = retry_call(2, 1, |_n| {
         attempts.fetch_add(1, Ordering::SeqCst);
         async move {
            match schema::decode::<CommitAnalysisPayload>("still not json") {
               Some(value) => Attempt::Succeeded(value),
               None => Attempt::Retryable(PipelineError::Other("bad schema".to_string())),
            }
         }
      })
      .await;

      assert!(matches!(result, Err(PipelineError::LlmClient { .. })));
      assert_eq!(attempts.load(Ordering::SeqCst), 3);
   }
}
