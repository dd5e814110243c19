//! Exclusive sections for institution-level mutations.
//!
//! Merge, reconcile and relink all rewrite the set of accounts belonging to one
//! (user, institution) pair. They take the same async lock so two of them never
//! interleave.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::context::UserContext;
use crate::errors::{Error, Result};

#[derive(Debug, Default)]
pub struct InstitutionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Proof that the holder owns the institution's exclusive section.
///
/// Released on drop.
#[derive(Debug)]
pub struct InstitutionGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl InstitutionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(ctx: &UserContext, institution_id: &str) -> String {
        format!("{}:{}", ctx.user_id(), institution_id)
    }

    /// Waits for the exclusive section of `(user, institution_id)`.
    pub async fn acquire(&self, ctx: &UserContext, institution_id: &str) -> InstitutionGuard {
        let key = Self::key(ctx, institution_id);
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        InstitutionGuard { key, _guard: guard }
    }

    /// Non-blocking variant; `None` when another operation holds the section.
    pub fn try_acquire(&self, ctx: &UserContext, institution_id: &str) -> Option<InstitutionGuard> {
        let key = Self::key(ctx, institution_id);
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.try_lock_owned()
            .ok()
            .map(|guard| InstitutionGuard { key, _guard: guard })
    }
}

impl InstitutionGuard {
    /// Fails unless this guard covers `(ctx.user, institution_id)`.
    pub fn ensure_covers(&self, ctx: &UserContext, institution_id: &str) -> Result<()> {
        if self.key == InstitutionLocks::key(ctx, institution_id) {
            Ok(())
        } else {
            Err(Error::Unexpected(format!(
                "institution guard '{}' does not cover {}:{}",
                self.key,
                ctx.user_id(),
                institution_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let locks = InstitutionLocks::new();
        let ctx = UserContext::new("user-1");

        let guard = locks.acquire(&ctx, "ins_1").await;
        assert!(locks.try_acquire(&ctx, "ins_1").is_none());
        // Other institutions and other users are independent.
        assert!(locks.try_acquire(&ctx, "ins_2").is_some());
        assert!(locks
            .try_acquire(&UserContext::new("user-2"), "ins_1")
            .is_some());

        drop(guard);
        assert!(locks.try_acquire(&ctx, "ins_1").is_some());
    }

    #[tokio::test]
    async fn guard_only_covers_its_own_key() {
        let locks = InstitutionLocks::new();
        let ctx = UserContext::new("user-1");
        let guard = locks.acquire(&ctx, "ins_1").await;

        assert!(guard.ensure_covers(&ctx, "ins_1").is_ok());
        assert!(guard.ensure_covers(&ctx, "ins_2").is_err());
        assert!(guard
            .ensure_covers(&UserContext::new("user-2"), "ins_1")
            .is_err());
    }
}
