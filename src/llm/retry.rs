//! Retry/backoff loop shared by every LLM client operation (§4.3, step 3).
//!
//! Generalizes the teacher's blocking `retry_api_call` (`api.rs`) into an
//! async helper: at most `max_retries` additional attempts, exponential
//! backoff from `initial_backoff_ms`, retryable vs. fatal distinguished by
//! the closure's return value rather than by error type, so callers decide
//! retryability per the §4.3 rules (connect errors, 5xx, timeouts, empty
//! responses, and schema failures retry; 4xx-other-than-429 and
//! malformed-on-final-attempt JSON do not).

use std::future::Future;
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Outcome of one attempt, as decided by the caller.
pub enum Attempt<T> {
   /// The call succeeded; stop retrying.
   Succeeded(T),
   /// The call failed in a way that's worth retrying.
   Retryable(PipelineError),
   /// The call failed fatally; stop retrying immediately.
   Fatal(PipelineError),
}

/// Runs `attempt` up to `1 + max_retries` times with exponential backoff,
/// sleeping `initial_backoff_ms * 2^(n-1)` between attempts.
pub async fn retry_call<T, F, Fut>(
   max_retries: u32,
   initial_backoff_ms: u64,
   mut attempt: F,
) -> Result<T>
where
   F: FnMut(u32) -> Fut,
   Fut: Future<Output = Attempt<T>>,
{
   let mut last_err: Option<PipelineError> = None;

   for n in 1..=(max_retries + 1) {
      match attempt(n).await {
         Attempt::Succeeded(value) => return Ok(value),
         Attempt::Fatal(e) => return Err(e),
         Attempt::Retryable(e) => {
            if n > max_retries {
               last_err = Some(e);
               break;
            }
            let backoff_ms = initial_backoff_ms.saturating_mul(1u64 << (n - 1));
            tracing::warn!(attempt = n, max_retries, backoff_ms, error = %e, "retrying LLM call");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            last_err = Some(e);
         },
      }
   }

   let source = last_err.unwrap_or_else(|| PipelineError::Other("retries exhausted".to_string()));
   Err(PipelineError::LlmClient { source: Box::new(source), prompt: String::new() })
}

#[cfg(test)]
mod tests {
   use std::sync::atomic::{AtomicU32, Ordering};

   use super::*;

   #[tokio::test]
   async fn succeeds_on_first_try() {
      let result: Result<u32> =
         retry_call(3, 1, |_| async { Attempt::Succeeded(42) }).await;
      assert_eq!(result.unwrap(), 42);
   }

   #[tokio::test]
   async fn retries_twice_then_succeeds() {
      let calls = AtomicU32::new(0);
      let result: Result<u32> = retry_call(3, 1, |n| {
         calls.fetch_add(1, Ordering::SeqCst);
         async move {
            if n < 3 {
               Attempt::Retryable(PipelineError::Other("connect error".to_string()))
            } else {
               Attempt::Succeeded(7)
            }
         }
      })
      .await;
      assert_eq!(result.unwrap(), 7);
      assert_eq!(calls.load(Ordering::SeqCst), 3);
   }

   #[tokio::test]
   async fn exhausts_retries_and_surfaces_llm_client_error() {
      let calls = AtomicU32::new(0);
      let result: Result<u32> = retry_call(3, 1, |_| {
         calls.fetch_add(1, Ordering::SeqCst);
         async { Attempt::Retryable(PipelineError::Other("connect error".to_string())) }
      })
      .await;
      assert!(matches!(result, Err(PipelineError::LlmClient { .. })));
      assert_eq!(calls.load(Ordering::SeqCst), 4);
   }

   #[tokio::test]
   async fn fatal_error_stops_immediately() {
      let calls = AtomicU32::new(0);
      let result: Result<u32> = retry_call(3, 1, |_| {
         calls.fetch_add(1, Ordering::SeqCst);
         async { Attempt::<u32>::Fatal(PipelineError::ApiError { status: 400, body: "bad".into() }) }
      })
      .await;
      assert!(matches!(result, Err(PipelineError::ApiError { .. })));
      assert_eq!(calls.load(Ordering::SeqCst), 1);
   }
}
