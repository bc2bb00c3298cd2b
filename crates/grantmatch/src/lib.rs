//! Grant discovery pipeline: deterministic eligibility filtering and
//! relevance scoring, a versioned enrichment cache, AI enrichment with
//! degradation, and score fusion into a ranked result set.

pub mod config;
pub mod error;
pub mod matching;
pub mod telemetry;
