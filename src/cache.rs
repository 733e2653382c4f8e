//! Content-addressed cache store (§4.1, C1).
//!
//! Every tier namespace gets its own directory; entries are written
//! atomically (temp-file + rename) and read back as either a miss or a
//! fully-formed value — never a partial write, never a raised error for
//! corruption. `get` swallows every I/O or deserialization failure into a
//! miss; `put` swallows write failures into a logged, non-fatal
//! `PipelineError::Cache`.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::{PipelineError, Result};

/// Tier-specific cache namespace; each maps to one subdirectory (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
   Commits,
   DailySummaries,
   WeeklySummaries,
   Narratives,
   Changelogs,
}

impl Namespace {
   const fn dir_name(self) -> &'static str {
      match self {
         Self::Commits => "commits",
         Self::DailySummaries => "daily_summaries",
         Self::WeeklySummaries => "weekly_summaries",
         Self::Narratives => "narratives",
         Self::Changelogs => "changelogs",
      }
   }
}

/// A value that can be stored in the cache, tagged with its on-disk
/// extension (`.json` for structured values, `.txt` for free-form text).
pub trait CacheValue: Sized {
   const EXT: &'static str;

   fn to_bytes(&self) -> Result<Vec<u8>>;
   fn from_bytes(bytes: &[u8]) -> Option<Self>;
}

/// Implements [`CacheValue`] for a JSON-serializable structured type.
macro_rules! impl_json_cache_value {
   ($ty:ty) => {
      impl CacheValue for $ty {
         const EXT: &'static str = "json";

         fn to_bytes(&self) -> Result<Vec<u8>> {
            serde_json::to_vec(self).map_err(PipelineError::from)
         }

         fn from_bytes(bytes: &[u8]) -> Option<Self> {
            serde_json::from_slice(bytes).ok()
         }
      }
   };
}

impl_json_cache_value!(crate::types::CommitAnalysis);

/// Free-form text values, stored raw (no JSON envelope) so Unicode payloads
/// round-trip byte-for-byte (Testable Property 4). Tiers that produce free
/// text (daily/weekly synthesis, narrative, changelog) construct a
/// `TextValue` at the cache boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextValue(pub String);

impl CacheValue for TextValue {
   const EXT: &'static str = "txt";

   fn to_bytes(&self) -> Result<Vec<u8>> {
      Ok(self.0.clone().into_bytes())
   }

   fn from_bytes(bytes: &[u8]) -> Option<Self> {
      String::from_utf8(bytes.to_vec()).ok().map(Self)
   }
}

/// File-backed, content-addressed, tier-namespaced key-value store.
pub struct CacheStore {
   root: PathBuf,
}

impl CacheStore {
   pub fn new(root: impl Into<PathBuf>) -> Self {
      Self { root: root.into() }
   }

   /// Stable 16-hex-character digest over `inputs`. List-valued inputs must
   /// be sorted by the caller *before* calling `key` so permutations of the
   /// same set collide (spec §3, Testable Property 3).
   pub fn key(inputs: &[&str]) -> String {
      let mut hasher = Sha256::new();
      for input in inputs {
         hasher.update(input.as_bytes());
         hasher.update(b"\0");
      }
      let digest = hasher.finalize();
      let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
      hex[..16].to_string()
   }

   /// Stable key over a list input: sorts a copy, then hashes (spec §3's
   /// explicit order-insensitive keying invariant for unordered inputs).
   pub fn key_sorted(mut inputs: Vec<&str>) -> String {
      inputs.sort_unstable();
      Self::key(&inputs)
   }

   fn entry_path(&self, ns: Namespace, key: &str, ext: &str) -> PathBuf {
      self.root.join(ns.dir_name()).join(format!("{key}.{ext}"))
   }

   /// Returns `None` on a missing file, an unreadable file, or a
   /// schema-mismatched payload — all three are an implicit cache miss, never
   /// a propagated error.
   pub async fn get<V: CacheValue>(&self, ns: Namespace, key: &str) -> Option<V> {
      let path = self.entry_path(ns, key, V::EXT);
      let bytes = match fs::read(&path).await {
         Ok(bytes) => bytes,
         Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cache miss (read failed)");
            return None;
         },
      };
      let value = V::from_bytes(&bytes);
      if value.is_none() {
         tracing::debug!(path = %path.display(), "cache miss (schema mismatch)");
      }
      value
   }

   /// Writes atomically: a temp file in the same directory, then an
   /// OS-level rename. Concurrent `put`s under the same key are safe — the
   /// last rename wins and readers never observe a partial file.
   pub async fn put<V: CacheValue>(&self, ns: Namespace, key: &str, value: &V) -> Result<()> {
      let dir = self.root.join(ns.dir_name());
      if let Err(e) = fs::create_dir_all(&dir).await {
         tracing::warn!(dir = %dir.display(), error = %e, "cache directory creation failed, not caching");
         return Err(PipelineError::Cache(e.to_string()));
      }

      let bytes = value.to_bytes()?;
      let final_path = self.entry_path(ns, key, V::EXT);
      let tmp_path = dir.join(format!(".{key}.{}.tmp-{}", V::EXT, std::process::id()));

      if let Err(e) = fs::write(&tmp_path, &bytes).await {
         tracing::warn!(path = %tmp_path.display(), error = %e, "cache write failed, not caching");
         return Err(PipelineError::Cache(e.to_string()));
      }
      if let Err(e) = fs::rename(&tmp_path, &final_path).await {
         tracing::warn!(path = %final_path.display(), error = %e, "cache rename failed, not caching");
         let _ = fs::remove_file(&tmp_path).await;
         return Err(PipelineError::Cache(e.to_string()));
      }
      Ok(())
   }

   /// Deletes the entire cache tree (exposed as `clear_cache()`, §6).
   pub async fn clear(&self) -> Result<()> {
      if !self.root.exists() {
         return Ok(());
      }
      fs::remove_dir_all(&self.root)
         .await
         .map_err(|e| PipelineError::Cache(e.to_string()))
   }

   pub fn root(&self) -> &Path {
      &self.root
   }
}
