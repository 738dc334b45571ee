//! Service layer for the digest job
//!
//! Services orchestrate the collaborator traits: the dispatcher evaluates
//! one due project end to end, and the runner drives the lock, the page
//! loop, and pointer advancement around it. Services depend on traits,
//! never on concrete backends.

pub mod dispatcher;
pub mod runner;
pub mod traits;
pub mod types;

pub use dispatcher::NotificationDispatcher;
pub use runner::DigestJobRunner;
pub use traits::{AnalyticsProvider, BillingClassifier, DigestEmail, DigestNotifier, WindowCounts};
pub use types::{DigestRunSummary, DispatchOutcome};
