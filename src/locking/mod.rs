//! Cluster-wide throttling lock
//!
//! At most one digest run may hold the named lock at any instant,
//! cluster-wide. Acquisition is non-blocking and the hold is TTL-bounded,
//! so a crashed holder blocks contenders for at most one TTL.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Token proving a successful acquisition.
///
/// The holder id fences renew and release: a token left over from an
/// expired acquisition cannot touch a lock that has since been re-taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub name: String,
    pub holder: Uuid,
}

/// TTL-bounded, non-blocking mutual exclusion.
///
/// Implementations back this with an atomic compare-and-set store shared
/// by the whole cluster. In-process locking is not a valid implementation
/// of this trait; the invariant spans processes.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take the named lock. Returns `None` immediately when the
    /// lock is held by any live holder, including a crashed run whose TTL
    /// has not yet lapsed.
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>>;

    /// Extend the TTL of a held lock. Returns `false` when the token no
    /// longer holds the lock (expired or re-acquired elsewhere).
    async fn renew(&self, token: &LockToken, ttl: Duration) -> Result<bool>;

    /// Drop the lock if the token still holds it. Best-effort; TTL expiry
    /// covers holders that never release.
    async fn release(&self, token: &LockToken) -> Result<()>;
}

struct HeldLock {
    holder: Uuid,
    expires_at: Instant,
}

/// Compare-and-set lock map for tests and single-node deployments.
///
/// Multi-node deployments must substitute a shared store; this provider
/// only upholds the invariant within one process.
#[derive(Default)]
pub struct MemoryLockProvider {
    locks: Mutex<HashMap<String, HeldLock>>,
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for MemoryLockProvider {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();

        if let Some(held) = locks.get(name) {
            if held.expires_at > now {
                return Ok(None);
            }
        }

        let holder = Uuid::new_v4();
        locks.insert(
            name.to_string(),
            HeldLock {
                holder,
                expires_at: now + ttl,
            },
        );

        Ok(Some(LockToken {
            name: name.to_string(),
            holder,
        }))
    }

    async fn renew(&self, token: &LockToken, ttl: Duration) -> Result<bool> {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();

        match locks.get_mut(&token.name) {
            Some(held) if held.holder == token.holder && held.expires_at > now => {
                held.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, token: &LockToken) -> Result<()> {
        let mut locks = self.locks.lock().await;

        if let Some(held) = locks.get(&token.name) {
            if held.holder == token.holder {
                locks.remove(&token.name);
            }
        }

        Ok(())
    }
}
