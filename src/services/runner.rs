//! Digest run orchestration
//!
//! One run: take the cluster-wide throttling lock, walk the due-project
//! cursor page by page, dispatch each project, advance schedule pointers
//! (immediately for sends, batched per page for skips), sleep between
//! steps to spare the backend, renew the lock between pages, and honor
//! cancellation at page boundaries. The host loop repeats runs on a
//! fixed interval.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DigestJobConfig;
use crate::errors::{DigestJobError, DigestJobResult};
use crate::locking::{DistributedLock, LockToken};
use crate::repositories::{DigestRepository, ScheduleCursor};
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::traits::{AnalyticsProvider, BillingClassifier, DigestNotifier};
use crate::services::types::DigestRunSummary;

pub struct DigestJobRunner {
    config: DigestJobConfig,
    lock: Arc<dyn DistributedLock>,
    repository: Arc<dyn DigestRepository>,
    /// Absent when no notification backend is configured, which disables
    /// the whole feature. Checked once at run entry.
    dispatcher: Option<NotificationDispatcher>,
}

impl DigestJobRunner {
    pub fn new(
        config: DigestJobConfig,
        lock: Arc<dyn DistributedLock>,
        repository: Arc<dyn DigestRepository>,
        analytics: Arc<dyn AnalyticsProvider>,
        billing: Arc<dyn BillingClassifier>,
        notifier: Option<Arc<dyn DigestNotifier>>,
    ) -> DigestJobResult<Self> {
        let stale_after = chrono::Duration::from_std(config.stale_after).map_err(|e| {
            DigestJobError::Configuration {
                field: "stale_after".to_string(),
                message: e.to_string(),
            }
        })?;

        let dispatcher = notifier.map(|notifier| {
            NotificationDispatcher::new(
                repository.clone(),
                analytics,
                notifier,
                billing,
                stale_after,
            )
        });

        Ok(Self {
            config,
            lock,
            repository,
            dispatcher,
        })
    }

    /// Execute one digest run.
    ///
    /// A disabled job, an absent notifier and lock contention are all
    /// expected and return a successful no-op summary without touching
    /// the repository. Collaborator failures and renewal loss fail the
    /// run; the next scheduled invocation resumes from wherever the
    /// pointers are.
    pub async fn run(
        &self,
        cancellation_token: CancellationToken,
    ) -> DigestJobResult<DigestRunSummary> {
        if !self.config.enabled {
            info!("Daily digest job is disabled; skipping run");
            return Ok(DigestRunSummary::noop("daily digest job is disabled"));
        }

        let Some(dispatcher) = &self.dispatcher else {
            info!("No notification backend configured; skipping digest run");
            return Ok(DigestRunSummary::noop("no notification backend configured"));
        };

        let Some(token) = self
            .lock
            .acquire(&self.config.lock_name, self.config.lock_ttl)
            .await
            .map_err(|source| DigestJobError::Lock { source })?
        else {
            // Contention is benign: another instance is already running.
            info!(
                "Digest lock '{}' already held; skipping this run",
                self.config.lock_name
            );
            return Ok(DigestRunSummary::noop(
                "digest lock held by another instance",
            ));
        };

        let result = self
            .run_locked(dispatcher, &token, &cancellation_token)
            .await;

        if let Err(e) = self.lock.release(&token).await {
            warn!("Failed to release digest lock '{}': {}", token.name, e);
        }

        result
    }

    async fn run_locked(
        &self,
        dispatcher: &NotificationDispatcher,
        token: &LockToken,
        cancellation_token: &CancellationToken,
    ) -> DigestJobResult<DigestRunSummary> {
        let started_at = Utc::now();
        let mut summary = DigestRunSummary::noop("digest run completed");
        let mut cursor = ScheduleCursor::new(self.repository.clone(), self.config.max_age_hours);

        loop {
            // Cancellation is cooperative and only observed at page
            // boundaries; already-advanced pointers are kept.
            if cancellation_token.is_cancelled() {
                info!(
                    "Digest run cancelled; keeping {} already-advanced pointer(s)",
                    summary.advanced
                );
                summary.cancelled = true;
                summary.message = "digest run cancelled; partial progress kept".to_string();
                break;
            }

            let Some(projects) = cursor.next_page().await? else {
                break;
            };
            summary.pages += 1;
            debug!(
                "Processing digest page {} with {} project(s)",
                summary.pages,
                projects.len()
            );

            let mut skip_batch: Vec<Uuid> = Vec::new();
            for project in &projects {
                let outcome = dispatcher.process(project, Utc::now()).await?;
                summary.record(outcome);

                if outcome.is_sent() {
                    // Advance immediately so a cancellation right after
                    // the send can never replay this window.
                    self.repository.advance_schedule(&[project.id]).await?;
                    summary.advanced += 1;
                    // The send just triggered a downstream aggregation;
                    // give the backend room before the next project.
                    sleep(self.config.send_backoff).await;
                } else {
                    debug!(
                        "Digest for project '{}' skipped: {}",
                        project.name,
                        outcome.label()
                    );
                    skip_batch.push(project.id);
                }
            }

            if !skip_batch.is_empty() {
                self.repository.advance_schedule(&skip_batch).await?;
                summary.advanced += skip_batch.len() as u64;
                sleep(self.config.advance_backoff).await;
            }

            if cursor.has_more()
                && !self
                    .lock
                    .renew(token, self.config.lock_ttl)
                    .await
                    .map_err(|source| DigestJobError::Lock { source })?
            {
                error!(
                    "Digest lock '{}' could not be renewed; aborting run",
                    token.name
                );
                return Err(DigestJobError::LockRenewalLost {
                    name: token.name.clone(),
                });
            }
        }

        let elapsed_ms = Utc::now().signed_duration_since(started_at).num_milliseconds();
        info!(
            "Digest run finished in {}ms: {} page(s), {} sent, {} stale, {} without recipients, {} without organization, {} pointer(s) advanced",
            elapsed_ms,
            summary.pages,
            summary.sent,
            summary.skipped_stale,
            summary.skipped_no_recipients,
            summary.skipped_no_organization,
            summary.advanced
        );

        Ok(summary)
    }

    /// Host loop: fixed initial delay, then one run per fixed interval
    /// until cancelled. A failed run is logged and the next tick retries
    /// from wherever the pointers are.
    pub async fn start(&self, cancellation_token: CancellationToken) -> Result<()> {
        info!(
            "Starting daily digest job (interval: {:?}, initial delay: {:?})",
            self.config.run_interval, self.config.initial_delay
        );

        tokio::select! {
            _ = sleep(self.config.initial_delay) => {}
            _ = cancellation_token.cancelled() => {
                info!("Daily digest job stopped before its first run");
                return Ok(());
            }
        }

        let mut ticker = interval(self.config.run_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run(cancellation_token.child_token()).await {
                        Ok(summary) => info!("Scheduled digest run: {}", summary.message),
                        Err(e) => error!("Scheduled digest run failed: {}", e),
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("Daily digest job received cancellation signal");
                    break;
                }
            }
        }

        info!("Daily digest job stopped");
        Ok(())
    }
}
