//! Repository seam for the digest job
//!
//! The job never talks to a storage engine directly. Everything it needs
//! from persistence (the due-project scan, the bulk pointer advance, and
//! the member/organization lookups) goes through [`DigestRepository`].
//! [`ScheduleCursor`] layers pull-based pagination on top of the trait.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Member, Organization, Project};

/// Opaque server-side pagination token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(pub String);

/// One bounded batch of due projects.
#[derive(Debug, Clone)]
pub struct DuePage {
    pub projects: Vec<Project>,
    /// Continuation token for the following page, if any.
    pub next: Option<PageToken>,
}

/// Persistence operations consumed by the digest job.
///
/// Contract notes: `advance_schedule` moves each pointer forward by
/// exactly one day and must be atomic per project at the storage layer.
/// The due scan must not reissue a project whose pointer was advanced
/// earlier in the same run; otherwise that project is double-processed.
#[async_trait]
pub trait DigestRepository: Send + Sync {
    /// Fetch one page of projects whose schedule pointer is due. The due
    /// threshold is derived from `max_age_hours` by the repository.
    async fn fetch_due_projects(
        &self,
        max_age_hours: i64,
        cursor: Option<PageToken>,
    ) -> Result<DuePage>;

    /// Bulk-advance the schedule pointer of every listed project by one
    /// day, in a single call.
    async fn advance_schedule(&self, project_ids: &[Uuid]) -> Result<()>;

    async fn resolve_members(&self, member_ids: &[Uuid]) -> Result<Vec<Member>>;

    async fn resolve_organization(&self, organization_id: Uuid) -> Result<Option<Organization>>;
}

/// Pull-based cursor over the due-project scan.
///
/// Pages advance only through explicit [`next_page`](Self::next_page)
/// calls. The scan terminates on an exhausted continuation token or on a
/// page with zero due projects, whichever comes first.
pub struct ScheduleCursor {
    repository: Arc<dyn DigestRepository>,
    max_age_hours: i64,
    next_token: Option<PageToken>,
    started: bool,
    exhausted: bool,
}

impl ScheduleCursor {
    pub fn new(repository: Arc<dyn DigestRepository>, max_age_hours: i64) -> Self {
        Self {
            repository,
            max_age_hours,
            next_token: None,
            started: false,
            exhausted: false,
        }
    }

    /// Fetch the next page of due projects, or `None` once the scan is
    /// exhausted. An empty page ends the scan even when the repository
    /// offered a continuation token.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Project>>> {
        if self.exhausted {
            return Ok(None);
        }

        let cursor = if self.started {
            match self.next_token.take() {
                Some(token) => Some(token),
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            }
        } else {
            self.started = true;
            None
        };

        let page = self
            .repository
            .fetch_due_projects(self.max_age_hours, cursor)
            .await?;

        if page.projects.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.next_token = page.next;
        Ok(Some(page.projects))
    }

    /// Whether another `next_page` call would hit the repository. Drives
    /// lock renewal between pages during long scans.
    pub fn has_more(&self) -> bool {
        !self.exhausted && self.next_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    fn project(name: &str) -> Project {
        Project {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: name.to_string(),
            next_window_end: Utc::now(),
            notification_settings: HashMap::new(),
        }
    }

    /// Serves a fixed sequence of pages and records the cursors it saw.
    struct PagedRepository {
        pages: Mutex<Vec<DuePage>>,
        seen_cursors: Mutex<Vec<Option<PageToken>>>,
    }

    impl PagedRepository {
        fn new(pages: Vec<DuePage>) -> Self {
            Self {
                pages: Mutex::new(pages),
                seen_cursors: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DigestRepository for PagedRepository {
        async fn fetch_due_projects(
            &self,
            _max_age_hours: i64,
            cursor: Option<PageToken>,
        ) -> Result<DuePage> {
            self.seen_cursors.lock().await.push(cursor);
            let mut pages = self.pages.lock().await;
            if pages.is_empty() {
                return Ok(DuePage {
                    projects: Vec::new(),
                    next: None,
                });
            }
            Ok(pages.remove(0))
        }

        async fn advance_schedule(&self, _project_ids: &[Uuid]) -> Result<()> {
            Ok(())
        }

        async fn resolve_members(&self, _member_ids: &[Uuid]) -> Result<Vec<Member>> {
            Ok(Vec::new())
        }

        async fn resolve_organization(
            &self,
            _organization_id: Uuid,
        ) -> Result<Option<Organization>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn walks_pages_until_the_token_runs_out() {
        let repository = Arc::new(PagedRepository::new(vec![
            DuePage {
                projects: vec![project("a"), project("b")],
                next: Some(PageToken("p2".to_string())),
            },
            DuePage {
                projects: vec![project("c")],
                next: None,
            },
        ]));
        let mut cursor = ScheduleCursor::new(repository.clone(), 24);

        let first = cursor.next_page().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert!(cursor.has_more());

        let second = cursor.next_page().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(!cursor.has_more());

        assert!(cursor.next_page().await.unwrap().is_none());
        // Exhaustion is sticky and issues no further fetches.
        assert!(cursor.next_page().await.unwrap().is_none());

        let cursors = repository.seen_cursors.lock().await;
        assert_eq!(*cursors, vec![None, Some(PageToken("p2".to_string()))]);
    }

    #[tokio::test]
    async fn empty_page_terminates_even_with_a_continuation_token() {
        let repository = Arc::new(PagedRepository::new(vec![DuePage {
            projects: Vec::new(),
            next: Some(PageToken("dangling".to_string())),
        }]));
        let mut cursor = ScheduleCursor::new(repository.clone(), 24);

        assert!(cursor.next_page().await.unwrap().is_none());
        assert!(!cursor.has_more());
        assert_eq!(repository.seen_cursors.lock().await.len(), 1);
    }
}
