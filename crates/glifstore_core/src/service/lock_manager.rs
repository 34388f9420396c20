//! Exclusive edit locks.
//!
//! # Responsibility
//! - Decide who may lock, unlock and write a glif at a given instant.
//!
//! # Invariants
//! - Holder and timestamp change together (`Glif::lock` is one value).
//! - A lock older than the configured TTL is stale: it no longer blocks
//!   other actors, but stays recorded until replaced or swept.

use crate::model::actor::Actor;
use crate::model::glif::{Glif, LockHolder};
use crate::service::error::{GlifError, GlifResult};

/// Pure lock rules; persistence happens in `GlifService`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockManager {
    /// Staleness window in ms, `None` when locks never expire.
    ttl_ms: Option<i64>,
}

impl LockManager {
    pub fn new(ttl_ms: Option<i64>) -> Self {
        Self { ttl_ms }
    }

    /// Cutoff below which `locked_at` is stale, `None` without expiry.
    pub fn stale_cutoff(&self, now: i64) -> Option<i64> {
        self.ttl_ms.map(|ttl| now.saturating_sub(ttl))
    }

    pub fn is_stale(&self, holder: &LockHolder, now: i64) -> bool {
        self.stale_cutoff(now)
            .is_some_and(|cutoff| holder.at < cutoff)
    }

    /// Held and not stale.
    pub fn is_locked(&self, glif: &Glif, now: i64) -> bool {
        glif.lock
            .as_ref()
            .is_some_and(|holder| !self.is_stale(holder, now))
    }

    /// Takes or refreshes the lock for `actor`.
    ///
    /// # Errors
    /// - `LockConflict` when another actor holds a live lock.
    pub fn acquire(&self, glif: &mut Glif, actor: &Actor, now: i64) -> GlifResult<()> {
        if let Some(holder) = glif.lock.as_ref() {
            if holder.actor != actor.id && !self.is_stale(holder, now) {
                return Err(GlifError::LockConflict {
                    holder: holder.actor.clone(),
                });
            }
        }
        glif.lock = Some(LockHolder {
            actor: actor.id.clone(),
            at: now,
        });
        Ok(())
    }

    /// Clears the lock when `actor` holds it or `force` is set.
    /// Returns whether a lock was cleared; other actors' locks, stale or
    /// not, are left in place without `force`.
    pub fn release(&self, glif: &mut Glif, actor: &Actor, force: bool) -> bool {
        match glif.lock.as_ref() {
            Some(holder) if force || holder.actor == actor.id => {
                glif.lock = None;
                true
            }
            _ => false,
        }
    }

    /// Write gate. Administrators take the lock over; others must hold it.
    /// Returns whether the lock changed hands.
    ///
    /// # Errors
    /// - `LockConflict` when another actor holds a live lock.
    /// - `NotLocked` when the caller does not hold the lock.
    pub fn require_write(&self, glif: &mut Glif, actor: &Actor, now: i64) -> GlifResult<bool> {
        if glif.locked_by() == Some(actor.id.as_str()) {
            return Ok(false);
        }
        if actor.is_admin {
            glif.lock = Some(LockHolder {
                actor: actor.id.clone(),
                at: now,
            });
            return Ok(true);
        }
        match glif.lock.as_ref() {
            Some(holder) if !self.is_stale(holder, now) => Err(GlifError::LockConflict {
                holder: holder.actor.clone(),
            }),
            _ => Err(GlifError::NotLocked),
        }
    }
}
