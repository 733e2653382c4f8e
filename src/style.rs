//! Terminal styling utilities for the CLI-facing summary line (§7
//! "user-visible failure behavior").
//!
//! This is deliberately the only place in the crate that prints with
//! `eprintln!`/`println!` directly — the async core (orchestrator, LLM
//! client, cache) logs through `tracing` instead, since `tracing`'s
//! span/level machinery is what lets concurrent tasks be told apart in the
//! log stream; plain terminal styling has no such need and stays simple.
//! Respects `NO_COLOR` (https://no-color.org/) and terminal capabilities.

use std::io::{self, Write};
use std::sync::OnceLock;

use owo_colors::OwoColorize;

static COLOR_ENABLED: OnceLock<bool> = OnceLock::new();

/// Whether color output is enabled (cached on first call).
pub fn colors_enabled() -> bool {
   *COLOR_ENABLED.get_or_init(|| {
      if std::env::var("NO_COLOR").is_ok() {
         return false;
      }
      supports_color::on(supports_color::Stream::Stdout).is_some_and(|level| level.has_basic)
   })
}

/// Success: completed runs (green + bold).
pub fn success(s: &str) -> String {
   if colors_enabled() { s.green().bold().to_string() } else { s.to_string() }
}

/// Warning: non-fatal issues, e.g. a cache write failure (yellow).
pub fn warning(s: &str) -> String {
   if colors_enabled() { s.yellow().to_string() } else { s.to_string() }
}

/// Error: the single diagnostic line printed on a fatal run failure (red + bold).
pub fn error(s: &str) -> String {
   if colors_enabled() { s.red().bold().to_string() } else { s.to_string() }
}

/// Info: progress lines (cyan).
pub fn info(s: &str) -> String {
   if colors_enabled() { s.cyan().to_string() } else { s.to_string() }
}

/// Dim: less important details, e.g. file paths.
pub fn dim(s: &str) -> String {
   if colors_enabled() { s.dimmed().to_string() } else { s.to_string() }
}

/// Bold: headers, key values.
pub fn bold(s: &str) -> String {
   if colors_enabled() { s.bold().to_string() } else { s.to_string() }
}

pub mod icons {
   pub const SUCCESS: &str = "\u{2713}";
   pub const WARNING: &str = "\u{26A0}";
   pub const ERROR: &str = "\u{2717}";
   pub const INFO: &str = "\u{2139}";
}

/// Prints a warning to stderr.
pub fn warn(msg: &str) {
   print!("\r\x1b[K");
   io::stdout().flush().ok();
   eprintln!("{} {}", warning(icons::WARNING), warning(msg));
}

/// Prints a progress/info line to stderr.
pub fn print_info(msg: &str) {
   use std::io::IsTerminal;
   if std::io::stderr().is_terminal() && colors_enabled() {
      eprintln!("\r\x1b[K{} {msg}", icons::INFO.cyan());
   } else {
      eprintln!("{} {msg}", icons::INFO);
   }
}
