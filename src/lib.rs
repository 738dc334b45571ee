//! Daily activity digest job
//!
//! A recurring, cluster-wide-singleton background job: scan projects
//! whose digest schedule is due, aggregate a trailing one-day activity
//! window, mail each eligible recipient, and durably advance each
//! project's schedule pointer, all under a TTL-bounded throttling lock,
//! cooperative cancellation and fixed backpressure sleeps.
//!
//! Storage, analytics aggregation, mail delivery and billing
//! classification are external collaborators consumed through the traits
//! in [`repositories`] and [`services::traits`].

pub mod config;
pub mod errors;
pub mod locking;
pub mod models;
pub mod repositories;
pub mod services;
