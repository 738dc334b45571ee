//! Per-project digest dispatch
//!
//! Evaluates one due project: derives the digest window from the schedule
//! pointer, applies the stale-window skip policy, resolves and filters
//! recipients, queries activity metrics and fans out one send per
//! eligible recipient. The dispatcher never mutates the project; pointer
//! advancement is the runner's job.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{DigestMetrics, DigestWindow, Member, Project};
use crate::repositories::DigestRepository;
use crate::services::traits::{AnalyticsProvider, BillingClassifier, DigestEmail, DigestNotifier};
use crate::services::types::DispatchOutcome;

pub struct NotificationDispatcher {
    repository: Arc<dyn DigestRepository>,
    analytics: Arc<dyn AnalyticsProvider>,
    notifier: Arc<dyn DigestNotifier>,
    billing: Arc<dyn BillingClassifier>,
    stale_after: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        repository: Arc<dyn DigestRepository>,
        analytics: Arc<dyn AnalyticsProvider>,
        notifier: Arc<dyn DigestNotifier>,
        billing: Arc<dyn BillingClassifier>,
        stale_after: Duration,
    ) -> Self {
        Self {
            repository,
            analytics,
            notifier,
            billing,
            stale_after,
        }
    }

    /// Evaluate one due project and, when a digest is warranted, send it
    /// to every eligible recipient.
    pub async fn process(&self, project: &Project, now: DateTime<Utc>) -> Result<DispatchOutcome> {
        let window = DigestWindow::preceding(project.next_window_end);

        // Catching up a backlog of old windows is not worth the query
        // cost; skip before touching recipients or metrics.
        if window.is_stale(now, self.stale_after) {
            debug!(
                "Skipping stale digest window for project '{}' (window start {})",
                project.name, window.start
            );
            return Ok(DispatchOutcome::SkippedStale);
        }

        let recipients = self.eligible_recipients(project).await?;
        if recipients.is_empty() {
            debug!(
                "No eligible digest recipients for project '{}'",
                project.name
            );
            return Ok(DispatchOutcome::SkippedNoRecipients);
        }

        // The organization may have been deleted while this project was
        // waiting in the due queue.
        let Some(organization) = self
            .repository
            .resolve_organization(project.organization_id)
            .await?
        else {
            info!(
                "Organization {} for project '{}' no longer exists; skipping digest",
                project.organization_id, project.name
            );
            return Ok(DispatchOutcome::SkippedNoOrganization);
        };

        let counts = self
            .analytics
            .count_in_window(organization.id, project.id, &window)
            .await?;
        let has_activity =
            counts.total > 0 || self.analytics.has_any_event_ever(project.id).await?;
        let metrics = DigestMetrics {
            total: counts.total,
            unique_count: counts.unique_count,
            new_count: counts.new_count,
            has_activity,
        };

        let is_free_plan = self.billing.is_free_plan(&organization).await?;

        for recipient in recipients {
            let address = recipient.email.clone();
            let email = DigestEmail {
                recipient,
                project_name: project.name.clone(),
                window,
                metrics,
                is_free_plan,
            };
            // Fire-and-forget per recipient: one failed send does not
            // abort the others and is not retried.
            if let Err(e) = self.notifier.send_digest(email).await {
                warn!(
                    "Failed to send digest for project '{}' to {}: {}",
                    project.name, address, e
                );
            }
        }

        Ok(DispatchOutcome::Sent)
    }

    /// Members opted into this project's digest who pass the eligibility
    /// filter (verified email, notifications enabled, org membership).
    async fn eligible_recipients(&self, project: &Project) -> Result<Vec<Member>> {
        let subscriber_ids = project.digest_subscribers();
        if subscriber_ids.is_empty() {
            return Ok(Vec::new());
        }

        let members = self.repository.resolve_members(&subscriber_ids).await?;
        Ok(members
            .into_iter()
            .filter(|member| member.can_receive_digest(project.organization_id))
            .collect())
    }
}
