//! Tier engine (C4): four progressively coarser analysis levels, each a
//! pure function of (inputs, cache, LLM client) per §4.4.

pub mod commit;
pub mod day;
pub mod period;
pub mod week;
