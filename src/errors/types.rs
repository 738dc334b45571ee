//! Error type definitions for the digest job

use thiserror::Error;

/// Errors that fail a digest run.
///
/// Anything not listed here is either benign (lock contention, disabled
/// job) or deliberately swallowed (per-recipient send failures).
#[derive(Debug, Error)]
pub enum DigestJobError {
    /// The throttling lock could not be renewed mid-run. Fatal: a second
    /// instance may start once the TTL lapses, so the run aborts and the
    /// next scheduled invocation resumes from wherever the pointers are.
    #[error("digest lock '{name}' lost before renewal; aborting run")]
    LockRenewalLost { name: String },

    /// The lock provider itself failed (transport error on acquire,
    /// renew or release), as opposed to clean contention or renewal
    /// loss.
    #[error("lock provider operation failed: {source}")]
    Lock { source: anyhow::Error },

    /// A collaborator call failed (page fetch, pointer advance, member or
    /// organization lookup, metrics query). Not locally recovered.
    #[error("repository operation failed: {source}")]
    Repository {
        #[from]
        source: anyhow::Error,
    },

    /// A policy duration in the configuration could not be parsed.
    #[error("invalid duration for '{field}': {message}")]
    Configuration { field: String, message: String },
}
