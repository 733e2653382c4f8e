//! Tolerant JSON decoding (§4.3 step 4, §9 DESIGN NOTES).
//!
//! A two-stage pipeline: (a) normalize raw model output to canonical JSON
//! text — strip markdown code fences, drop trailing commas; (b) parse and
//! validate against the declared schema via `serde`. Stage (b) failures are
//! what the retry loop treats as retryable "schema-validation failures".

use serde::de::DeserializeOwned;

/// Strips surrounding ` ```json ... ``` ` / ` ``` ... ``` ` fences and
/// removes trailing commas before a closing `}` or `]`, without altering
/// any other content.
pub fn normalize(raw: &str) -> String {
   let trimmed = strip_code_fences(raw.trim());
   strip_trailing_commas(trimmed.trim())
}

fn strip_code_fences(text: &str) -> String {
   let text = text.trim();
   let Some(rest) = text.strip_prefix("```") else {
      return text.to_string();
   };
   // Drop an optional language tag on the fence's first line (e.g. "json").
   let rest = rest.strip_prefix("json").unwrap_or(rest);
   let rest = rest.strip_prefix('\n').unwrap_or(rest);
   rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
}

/// Removes a trailing comma that immediately precedes a `}` or `]`,
/// ignoring commas inside string literals.
fn strip_trailing_commas(text: &str) -> String {
   let mut out = String::with_capacity(text.len());
   let mut in_string = false;
   let mut escape = false;
   let chars: Vec<char> = text.chars().collect();

   let mut i = 0;
   while i < chars.len() {
      let c = chars[i];

      if in_string {
         out.push(c);
         if escape {
            escape = false;
         } else if c == '\\' {
            escape = true;
         } else if c == '"' {
            in_string = false;
         }
         i += 1;
         continue;
      }

      if c == '"' {
         in_string = true;
         out.push(c);
         i += 1;
         continue;
      }

      if c == ',' {
         // Look ahead past whitespace for a closing bracket.
         let mut j = i + 1;
         while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
         }
         if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
            i += 1;
            continue;
         }
      }

      out.push(c);
      i += 1;
   }
   out
}

/// Normalizes and parses `raw` into `T`. Returns `None` on any failure — the
/// caller treats this as a retryable schema-validation failure per §4.3.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Option<T> {
   let normalized = normalize(raw);
   serde_json::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
   use serde::Deserialize;

   use super::*;

   #[derive(Debug, Deserialize, PartialEq)]
   struct Sample {
      name: String,
      tags: Vec<String>,
   }

   #[test]
   fn strips_json_code_fence() {
      let raw = "```json\n{\"name\": \"a\", \"tags\": []}\n```";
      let sample: Sample = decode(raw).unwrap();
      assert_eq!(sample, Sample { name: "a".to_string(), tags: vec![] });
   }

   #[test]
   fn strips_plain_code_fence() {
      let raw = "```\n{\"name\": \"a\", \"tags\": []}\n```";
      let sample: Sample = decode(raw).unwrap();
      assert_eq!(sample.name, "a");
   }

   #[test]
   fn tolerates_trailing_comma_in_array() {
      let raw = r#"{"name": "a", "tags": ["x", "y",]}"#;
      let sample: Sample = decode(raw).unwrap();
      assert_eq!(sample.tags, vec!["x", "y"]);
   }

   #[test]
   fn tolerates_trailing_comma_in_object() {
      let raw = r#"{"name": "a", "tags": [],}"#;
      let sample: Sample = decode(raw).unwrap();
      assert_eq!(sample.name, "a");
   }

   #[test]
   fn does_not_touch_commas_inside_strings() {
      let raw = r#"{"name": "a, b, c", "tags": []}"#;
      let sample: Sample = decode(raw).unwrap();
      assert_eq!(sample.name, "a, b, c");
   }

   #[test]
   fn structurally_invalid_content_is_rejected() {
      let raw = "not json at all";
      let sample: Option<Sample> = decode(raw);
      assert!(sample.is_none());
   }
}
