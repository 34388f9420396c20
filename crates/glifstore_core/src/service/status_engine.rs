//! Review status transitions.
//!
//! # Responsibility
//! - Validate and apply forward (`advance`) and backward (`downgrade`)
//!   status transitions on a glif's status fields.
//!
//! # Invariants
//! - `advance` always clears the downgrade marker.
//! - `downgrade` always sets the downgrade marker together with `previous`.
//! - A rejected transition leaves the fields untouched.

use crate::config::TransitionPolicy;
use crate::model::status::{GlifStatus, StatusFields};
use crate::service::error::{GlifError, GlifResult};

/// Pure transition rules; persistence and locking happen in `GlifService`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusEngine {
    policy: TransitionPolicy,
}

impl StatusEngine {
    pub fn new(policy: TransitionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Moves to a higher review tier.
    ///
    /// # Errors
    /// - `InvalidTransition` when `to` does not rank above the current
    ///   status, or skips a tier under `TransitionPolicy::Sequential`.
    pub fn advance(
        &self,
        fields: &mut StatusFields,
        to: GlifStatus,
        actor: &str,
        now: i64,
    ) -> GlifResult<()> {
        let from = fields.status;
        let allowed = match self.policy {
            TransitionPolicy::AllowSkip => to > from,
            TransitionPolicy::Sequential => from.next() == Some(to),
        };
        if !allowed {
            return Err(GlifError::InvalidTransition { from, to });
        }

        fields.previous = Some(from);
        fields.status = to;
        fields.changed_at = Some(now);
        fields.changed_by = Some(actor.to_string());
        fields.downgraded = false;
        fields.downgraded_at = None;
        Ok(())
    }

    /// Moves to a lower review tier and marks the record as downgraded.
    ///
    /// # Errors
    /// - `InvalidTransition` when `to` does not rank below the current status.
    pub fn downgrade(
        &self,
        fields: &mut StatusFields,
        to: GlifStatus,
        actor: &str,
        now: i64,
    ) -> GlifResult<()> {
        let from = fields.status;
        if to >= from {
            return Err(GlifError::InvalidTransition { from, to });
        }

        fields.previous = Some(from);
        fields.status = to;
        fields.changed_at = Some(now);
        fields.changed_by = Some(actor.to_string());
        fields.downgraded = true;
        fields.downgraded_at = Some(now);
        Ok(())
    }

    /// Dispatches to `advance` or `downgrade` by rank.
    pub fn transition(
        &self,
        fields: &mut StatusFields,
        to: GlifStatus,
        actor: &str,
        now: i64,
    ) -> GlifResult<()> {
        if to > fields.status {
            self.advance(fields, to, actor, now)
        } else if to < fields.status {
            self.downgrade(fields, to, actor, now)
        } else {
            Err(GlifError::InvalidTransition {
                from: fields.status,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StatusEngine;
    use crate::config::TransitionPolicy;
    use crate::model::status::{GlifStatus, StatusFields};
    use crate::service::error::GlifError;

    fn at(status: GlifStatus) -> StatusFields {
        StatusFields {
            status,
            ..StatusFields::default()
        }
    }

    #[test]
    fn advance_records_previous_and_clears_downgrade() {
        let engine = StatusEngine::default();
        let mut fields = at(GlifStatus::Checking1);
        fields.downgraded = true;
        fields.previous = Some(GlifStatus::Checking3);
        fields.downgraded_at = Some(5);

        engine
            .advance(&mut fields, GlifStatus::Checking2, "u1", 10)
            .unwrap();
        assert_eq!(fields.status, GlifStatus::Checking2);
        assert_eq!(fields.previous, Some(GlifStatus::Checking1));
        assert!(!fields.downgraded);
        assert_eq!(fields.downgraded_at, None);
        assert_eq!(fields.changed_at, Some(10));
        assert_eq!(fields.changed_by.as_deref(), Some("u1"));
    }

    #[test]
    fn default_policy_allows_skipping_tiers() {
        let engine = StatusEngine::default();
        let mut fields = at(GlifStatus::Wip);
        engine.advance(&mut fields, GlifStatus::Done, "u1", 1).unwrap();
        assert_eq!(fields.status, GlifStatus::Done);
    }

    #[test]
    fn sequential_policy_rejects_skips() {
        let engine = StatusEngine::new(TransitionPolicy::Sequential);
        let mut fields = at(GlifStatus::Wip);
        let err = engine
            .advance(&mut fields, GlifStatus::Checking2, "u1", 1)
            .unwrap_err();
        assert!(matches!(
            err,
            GlifError::InvalidTransition {
                from: GlifStatus::Wip,
                to: GlifStatus::Checking2
            }
        ));
        assert_eq!(fields, at(GlifStatus::Wip));

        engine
            .advance(&mut fields, GlifStatus::Checking1, "u1", 2)
            .unwrap();
        assert_eq!(fields.status, GlifStatus::Checking1);
    }

    #[test]
    fn downgrade_sets_marker_and_previous() {
        let engine = StatusEngine::default();
        let mut fields = at(GlifStatus::Checking2);
        engine
            .downgrade(&mut fields, GlifStatus::Wip, "admin", 42)
            .unwrap();
        assert_eq!(fields.status, GlifStatus::Wip);
        assert_eq!(fields.previous, Some(GlifStatus::Checking2));
        assert!(fields.downgraded);
        assert_eq!(fields.downgraded_at, Some(42));
    }

    #[test]
    fn wrong_direction_is_rejected() {
        let engine = StatusEngine::default();
        let mut fields = at(GlifStatus::Checking2);
        assert!(engine
            .advance(&mut fields, GlifStatus::Checking1, "u1", 1)
            .is_err());
        assert!(engine
            .downgrade(&mut fields, GlifStatus::Done, "u1", 1)
            .is_err());
        assert!(engine
            .transition(&mut fields, GlifStatus::Checking2, "u1", 1)
            .is_err());
        assert_eq!(fields, at(GlifStatus::Checking2));
    }

    #[test]
    fn transition_dispatches_by_rank() {
        let engine = StatusEngine::default();
        let mut fields = at(GlifStatus::Checking3);
        engine
            .transition(&mut fields, GlifStatus::Checking1, "u1", 1)
            .unwrap();
        assert!(fields.downgraded);
        engine
            .transition(&mut fields, GlifStatus::Done, "u1", 2)
            .unwrap();
        assert!(!fields.downgraded);
        assert_eq!(fields.previous, Some(GlifStatus::Checking1));
    }
}
