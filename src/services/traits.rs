//! External collaborator traits consumed by the digest services
//!
//! Analytics, notification delivery and billing classification are
//! separate systems; the job consumes them as opaque seams.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{DigestMetrics, DigestWindow, Member, Organization};

/// Windowed aggregation counts returned by the analytics backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub total: u64,
    pub unique_count: u64,
    pub new_count: u64,
}

#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    /// Aggregate activity for one project over one digest window.
    async fn count_in_window(
        &self,
        organization_id: Uuid,
        project_id: Uuid,
        window: &DigestWindow,
    ) -> Result<WindowCounts>;

    /// Fallback activity check: whether the project has ever recorded an
    /// event at all. Only consulted when the windowed count is zero.
    async fn has_any_event_ever(&self, project_id: Uuid) -> Result<bool>;
}

/// One digest send request, issued once per eligible recipient.
#[derive(Debug, Clone)]
pub struct DigestEmail {
    pub recipient: Member,
    pub project_name: String,
    pub window: DigestWindow,
    pub metrics: DigestMetrics,
    pub is_free_plan: bool,
}

#[async_trait]
pub trait DigestNotifier: Send + Sync {
    /// Deliver a digest to one recipient. Callers treat this as
    /// fire-and-forget: a failure is logged and the remaining recipients
    /// are still attempted.
    async fn send_digest(&self, email: DigestEmail) -> Result<()>;
}

#[async_trait]
pub trait BillingClassifier: Send + Sync {
    async fn is_free_plan(&self, organization: &Organization) -> Result<bool>;
}
