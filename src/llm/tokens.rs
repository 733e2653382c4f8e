//! Token counting with cascading fallback (used by both the fitter, which
//! needs a synchronous estimate while composing prompts, and the LLM
//! client's `count_tokens` operation).
//!
//! Attempts, in order:
//! 1. API `count_tokens` (Anthropic-compatible endpoints) — async only.
//! 2. tiktoken (OpenAI/GPT-family models).
//! 3. Character estimate (4 chars ≈ 1 token).

use std::fmt;

use tiktoken_rs::{CoreBPE, get_bpe_from_model};

/// A synchronous token estimate, used by the prompt fitter while it composes
/// and re-composes candidate prompts (fitting must not be async-blocked on
/// every trial split).
pub trait TokenCounter: Send + Sync {
   fn count_sync(&self, text: &str) -> usize;
}

/// Token counter backed by tiktoken where available, falling back to a
/// 4-chars-per-token estimate, with an optional API round-trip for the
/// async `count` path.
pub struct HttpTokenCounter {
   client:       reqwest::Client,
   api_base_url: String,
   api_key:      Option<String>,
   model:        String,
   tiktoken:     Option<CoreBPE>,
}

impl fmt::Debug for HttpTokenCounter {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("HttpTokenCounter")
         .field("model", &self.model)
         .field("has_tiktoken", &self.tiktoken.is_some())
         .finish_non_exhaustive()
   }
}

impl HttpTokenCounter {
   pub fn new(api_base_url: &str, api_key: Option<&str>, model: &str) -> Self {
      Self {
         client: reqwest::Client::new(),
         api_base_url: api_base_url.to_string(),
         api_key: api_key.map(String::from),
         model: model.to_string(),
         tiktoken: get_bpe_from_model(model).ok(),
      }
   }

   /// Count tokens, preferring the backend's own `count_tokens` endpoint
   /// when one is configured and reachable.
   pub async fn count(&self, text: &str) -> usize {
      if let Some(count) = self.try_api_count(text).await {
         return count;
      }
      self.count_sync(text)
   }

   async fn try_api_count(&self, text: &str) -> Option<usize> {
      let api_key = self.api_key.as_ref()?;
      if self.api_base_url.contains("openai.com") {
         // OpenAI has no count_tokens endpoint; tiktoken covers it instead.
         return None;
      }

      let resp = self
         .client
         .post(format!("{}/messages/count_tokens", self.api_base_url))
         .header("x-api-key", api_key)
         .header("anthropic-version", "2023-06-01")
         .header("content-type", "application/json")
         .json(&serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": text}],
         }))
         .send()
         .await
         .ok()?;

      let body: serde_json::Value = resp.json().await.ok()?;
      body["input_tokens"].as_u64().map(|n| n as usize)
   }
}

impl TokenCounter for HttpTokenCounter {
   fn count_sync(&self, text: &str) -> usize {
      if let Some(ref encoder) = self.tiktoken {
         encoder.encode_with_special_tokens(text).len()
      } else {
         text.len() / 4
      }
   }
}
