//! LLM client (C3): request building, retry/backoff, tolerant JSON decode,
//! and token counting, behind the [`client::LlmClient`] trait the tier
//! engine depends on.

pub mod client;
pub mod retry;
pub mod schema;
pub mod tokens;

pub use client::{HttpLlmClient, LlmClient};
