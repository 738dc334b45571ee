//! Centralized error handling for the digest job
//!
//! Expected outcomes (lock contention, a disabled job, per-entity skips)
//! are not errors here; they are reported as successful no-op or partial
//! summaries. This module only models conditions that fail a run.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using DigestJobError
pub type DigestJobResult<T> = Result<T, DigestJobError>;
