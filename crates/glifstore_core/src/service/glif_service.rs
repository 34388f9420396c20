//! Glif use-case service.
//!
//! # Responsibility
//! - Run every glif mutation as one `IMMEDIATE` transaction: load, gate on
//!   the lock, apply status/graph rules, record the editor, write with a
//!   compare-and-swap on `version`, commit.
//! - Expose read paths for records, audit history and per-font summaries.
//!
//! # Invariants
//! - A failed mutation leaves no partial state (the transaction rolls back
//!   on drop).
//! - `set_data` never commits a payload that closes a reference cycle.
//! - Data and status mutations always append to the editor history.

use crate::config::StoreConfig;
use crate::model::actor::Actor;
use crate::model::container::FontId;
use crate::model::glif::{ComponentRef, Glif, GlifKey, GlifKind};
use crate::model::payload::{derive, GlifPayload};
use crate::model::status::GlifStatus;
use crate::repo::audit_repo::{AuditRepository, EditorEntry, SqliteAuditRepository};
use crate::repo::container_repo::{ContainerRepository, SqliteContainerRepository};
use crate::repo::glif_repo::{GlifListQuery, GlifRepository, RepoResult, SqliteGlifRepository};
use crate::service::composition::CompositionGraph;
use crate::service::error::{GlifError, GlifResult};
use crate::service::lock_manager::LockManager;
use crate::service::status_engine::StatusEngine;
use crate::time::now_epoch_ms;
use log::{info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::BTreeMap;
use std::time::Instant;

/// Glif lock/status/composition/audit facade over one connection.
///
/// Each concurrent session should own its own connection; SQLite serializes
/// the `IMMEDIATE` transactions across them.
pub struct GlifService<'conn> {
    pub(super) conn: &'conn mut Connection,
    pub(super) locks: LockManager,
    pub(super) statuses: StatusEngine,
}

/// Result of one mutation step: the value handed back to the caller and
/// whether the glif row must be written.
pub(super) struct Mutation<T> {
    value: T,
    changed: bool,
}

impl<T> Mutation<T> {
    pub(super) fn changed(value: T) -> Self {
        Self {
            value,
            changed: true,
        }
    }

    pub(super) fn unchanged(value: T) -> Self {
        Self {
            value,
            changed: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StatusOp {
    Advance,
    Downgrade,
    Transition,
}

/// Per-kind, per-status counts of active glifs in one font.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    counts: BTreeMap<(GlifKind, GlifStatus), u64>,
}

impl StatusSummary {
    pub fn count(&self, kind: GlifKind, status: GlifStatus) -> u64 {
        self.counts.get(&(kind, status)).copied().unwrap_or(0)
    }

    /// Count of one status across all kinds.
    pub fn total(&self, status: GlifStatus) -> u64 {
        GlifKind::ALL
            .into_iter()
            .map(|kind| self.count(kind, status))
            .sum()
    }

    pub fn kind_total(&self, kind: GlifKind) -> u64 {
        GlifStatus::ALL
            .into_iter()
            .map(|status| self.count(kind, status))
            .sum()
    }

    pub fn total_glifs(&self) -> u64 {
        self.counts.values().sum()
    }
}

impl<'conn> GlifService<'conn> {
    pub fn new(conn: &'conn mut Connection, config: &StoreConfig) -> Self {
        Self {
            conn,
            locks: LockManager::new(config.lock_ttl_ms()),
            statuses: StatusEngine::new(config.transition_policy),
        }
    }

    pub fn with_defaults(conn: &'conn mut Connection) -> Self {
        Self::new(conn, &StoreConfig::default())
    }

    /// Creates an unlocked `wip` glif from an import payload.
    ///
    /// # Errors
    /// - `FontNotFound`, `InvalidPayload`, `NameConflict`, `CycleDetected`.
    pub fn create_glif(
        &mut self,
        kind: GlifKind,
        font_id: FontId,
        data: GlifPayload,
    ) -> GlifResult<Glif> {
        let started_at = Instant::now();
        let result = self.run_create(kind, font_id, data);
        let target = match &result {
            Ok(glif) => glif.key().to_string(),
            Err(_) => format!("{kind}/-"),
        };
        log_outcome("glif_create", &target, started_at, &result);
        result
    }

    fn run_create(
        &mut self,
        kind: GlifKind,
        font_id: FontId,
        data: GlifPayload,
    ) -> GlifResult<Glif> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_epoch_ms();
        if SqliteContainerRepository::new(&tx)
            .get_font(font_id)?
            .is_none()
        {
            return Err(GlifError::FontNotFound(font_id));
        }

        let mut glif = Glif::new(kind, font_id, data)?;
        glif.created_at = now;
        glif.updated_at = now;

        let repo = SqliteGlifRepository::new(&tx);
        ensure_name_free(&repo, &glif)?;
        ensure_acyclic(&repo, None, &glif)?;
        repo.create_glif(&glif)?;
        tx.commit()?;
        Ok(glif)
    }

    pub fn get_glif(&self, key: GlifKey, include_deleted: bool) -> GlifResult<Option<Glif>> {
        Ok(self.glifs().get_glif(key, include_deleted)?)
    }

    pub fn find_by_name(
        &self,
        font_id: FontId,
        kind: GlifKind,
        name: &str,
    ) -> GlifResult<Option<Glif>> {
        Ok(self.glifs().find_active_by_name(font_id, kind, name)?)
    }

    pub fn list_glifs(&self, kind: GlifKind, query: &GlifListQuery) -> GlifResult<Vec<Glif>> {
        Ok(self.glifs().list_glifs(kind, query)?)
    }

    /// Takes or refreshes the caller's lock.
    ///
    /// # Errors
    /// - `LockConflict` when another actor holds a live lock.
    pub fn acquire(&mut self, key: GlifKey, actor: &Actor) -> GlifResult<Glif> {
        ensure_actor(actor)?;
        let locks = self.locks;
        let ((), glif) = self.mutate("glif_acquire", key, None, |_, glif, now| {
            locks.acquire(glif, actor, now)?;
            Ok(Mutation::changed(()))
        })?;
        Ok(glif)
    }

    /// Clears the lock if held by `actor`, or unconditionally with `force`.
    /// Returns whether a lock was cleared.
    pub fn release(&mut self, key: GlifKey, actor: &Actor, force: bool) -> GlifResult<bool> {
        ensure_actor(actor)?;
        let locks = self.locks;
        let (cleared, _) = self.mutate("glif_release", key, None, |_, glif, _| {
            if locks.release(glif, actor, force) {
                Ok(Mutation::changed(true))
            } else {
                Ok(Mutation::unchanged(false))
            }
        })?;
        Ok(cleared)
    }

    /// Whether the glif carries a live (non-stale) lock.
    pub fn is_locked(&self, key: GlifKey) -> GlifResult<bool> {
        let glif = self.load(key)?;
        Ok(self.locks.is_locked(&glif, now_epoch_ms()))
    }

    /// Force-clears every stale lock, optionally within one font.
    /// Returns the glifs that were unlocked.
    pub fn sweep_stale_locks(&mut self, font_id: Option<FontId>) -> GlifResult<Vec<GlifKey>> {
        let started_at = Instant::now();
        let result = self.run_sweep(font_id);
        match &result {
            Ok(swept) => info!(
                "event=lock_sweep module=service status=ok count={} duration_ms={}",
                swept.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=lock_sweep module=service status=error duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    fn run_sweep(&mut self, font_id: Option<FontId>) -> GlifResult<Vec<GlifKey>> {
        let now = now_epoch_ms();
        let Some(cutoff) = self.locks.stale_cutoff(now) else {
            return Ok(Vec::new());
        };

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let repo = SqliteGlifRepository::new(&tx);
        let mut swept = Vec::new();
        for kind in GlifKind::ALL {
            for id in repo.stale_locks(kind, font_id, cutoff)? {
                let key = GlifKey::new(kind, id);
                if clear_lock(&repo, key, now)? {
                    swept.push(key);
                }
            }
        }
        tx.commit()?;
        Ok(swept)
    }

    /// Force-clears the locks of the given glifs. Returns how many were held.
    pub fn unlock_all(&mut self, keys: &[GlifKey]) -> GlifResult<usize> {
        let started_at = Instant::now();
        let result = self.run_unlock_all(keys);
        match &result {
            Ok(count) => info!(
                "event=lock_unlock_all module=service status=ok count={} duration_ms={}",
                count,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=lock_unlock_all module=service status=error duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    fn run_unlock_all(&mut self, keys: &[GlifKey]) -> GlifResult<usize> {
        let now = now_epoch_ms();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let repo = SqliteGlifRepository::new(&tx);
        let mut count = 0;
        for key in keys {
            if clear_lock(&repo, *key, now)? {
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Moves the glif to a higher review tier.
    ///
    /// # Errors
    /// - `NotLocked`/`LockConflict` from the write gate.
    /// - `InvalidTransition` per the configured `TransitionPolicy`.
    pub fn advance(&mut self, key: GlifKey, to: GlifStatus, actor: &Actor) -> GlifResult<Glif> {
        self.change_status("glif_advance", StatusOp::Advance, key, to, actor)
    }

    /// Moves the glif to a lower review tier and flags it as downgraded.
    pub fn downgrade(&mut self, key: GlifKey, to: GlifStatus, actor: &Actor) -> GlifResult<Glif> {
        self.change_status("glif_downgrade", StatusOp::Downgrade, key, to, actor)
    }

    /// Advances or downgrades depending on the target rank.
    pub fn transition(&mut self, key: GlifKey, to: GlifStatus, actor: &Actor) -> GlifResult<Glif> {
        self.change_status("glif_transition", StatusOp::Transition, key, to, actor)
    }

    fn change_status(
        &mut self,
        event: &'static str,
        op: StatusOp,
        key: GlifKey,
        to: GlifStatus,
        actor: &Actor,
    ) -> GlifResult<Glif> {
        ensure_actor(actor)?;
        let locks = self.locks;
        let statuses = self.statuses;
        let ((), glif) = self.mutate(event, key, None, |conn, glif, now| {
            locks.require_write(glif, actor, now)?;
            match op {
                StatusOp::Advance => statuses.advance(&mut glif.status, to, &actor.id, now)?,
                StatusOp::Downgrade => statuses.downgrade(&mut glif.status, to, &actor.id, now)?,
                StatusOp::Transition => {
                    statuses.transition(&mut glif.status, to, &actor.id, now)?
                }
            }
            note_edit(conn, glif, &actor.id, now)?;
            Ok(Mutation::changed(()))
        })?;
        Ok(glif)
    }

    /// Replaces the outline payload and every field derived from it.
    ///
    /// # Errors
    /// - `NotLocked`/`LockConflict` from the write gate.
    /// - `InvalidPayload`, `NameConflict`.
    /// - `CycleDetected` when the new references close a cycle in the font.
    pub fn set_data(&mut self, key: GlifKey, data: GlifPayload, actor: &Actor) -> GlifResult<Glif> {
        self.write_data(key, data, actor, None)
    }

    /// `set_data` for read-modify-write across requests: fails with
    /// `WriteConflict` unless the stored version still equals `expected_version`.
    pub fn set_data_at_version(
        &mut self,
        key: GlifKey,
        data: GlifPayload,
        actor: &Actor,
        expected_version: i64,
    ) -> GlifResult<Glif> {
        self.write_data(key, data, actor, Some(expected_version))
    }

    fn write_data(
        &mut self,
        key: GlifKey,
        data: GlifPayload,
        actor: &Actor,
        expected_version: Option<i64>,
    ) -> GlifResult<Glif> {
        ensure_actor(actor)?;
        let locks = self.locks;
        let ((), glif) = self.mutate("glif_set_data", key, expected_version, |conn, glif, now| {
            locks.require_write(glif, actor, now)?;
            let derived = derive(&data)?;
            let previous = glif.node();
            glif.apply_derived(data, derived);

            let repo = SqliteGlifRepository::new(conn);
            ensure_name_free(&repo, glif)?;
            ensure_acyclic(&repo, Some(&previous), glif)?;
            note_edit(conn, glif, &actor.id, now)?;
            Ok(Mutation::changed(()))
        })?;
        Ok(glif)
    }

    /// Fails with the first reference that does not resolve to an active glif
    /// of a permitted kind in the same font.
    pub fn validate_references(&self, key: GlifKey) -> GlifResult<()> {
        match self.dangling_references(key)?.into_iter().next() {
            Some(reference) => Err(GlifError::DanglingReference { reference }),
            None => Ok(()),
        }
    }

    /// Every unresolved reference of the glif, in declaration order.
    pub fn dangling_references(&self, key: GlifKey) -> GlifResult<Vec<ComponentRef>> {
        let glif = self.load(key)?;
        let graph = CompositionGraph::from_nodes(self.glifs().font_graph(glif.font_id)?);
        Ok(graph.dangling_from(&glif.node()))
    }

    /// Active glifs that reference this glif.
    pub fn dependents(&self, key: GlifKey) -> GlifResult<Vec<ComponentRef>> {
        let glif = self.load(key)?;
        let graph = CompositionGraph::from_nodes(self.glifs().font_graph(glif.font_id)?);
        Ok(graph.dependents_of(&glif.node()))
    }

    /// Appends an edit by `actor`. Returns whether `actor` is a new editor.
    pub fn record_edit(&mut self, key: GlifKey, actor: &Actor) -> GlifResult<bool> {
        ensure_actor(actor)?;
        let started_at = Instant::now();
        let result = self.run_audit(key, |audit, glif, now| {
            audit.record_edit(key, glif.font_id, &actor.id, now)
        });
        log_outcome("audit_record_edit", &key.to_string(), started_at, &result);
        result
    }

    /// Drops `actor_id` from the current editor set; history is kept.
    pub fn remove_editor(&mut self, key: GlifKey, actor_id: &str) -> GlifResult<bool> {
        let started_at = Instant::now();
        let result = self.run_audit(key, |audit, _, _| audit.remove_editor(key, actor_id));
        log_outcome("audit_remove_editor", &key.to_string(), started_at, &result);
        result
    }

    fn run_audit(
        &mut self,
        key: GlifKey,
        op: impl FnOnce(&SqliteAuditRepository<'_>, &Glif, i64) -> RepoResult<bool>,
    ) -> GlifResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let glif = SqliteGlifRepository::new(&tx)
            .get_glif(key, false)?
            .ok_or(GlifError::NotFound(key))?;
        let changed = op(&SqliteAuditRepository::new(&tx), &glif, now_epoch_ms())?;
        tx.commit()?;
        Ok(changed)
    }

    /// Full edit history of a glif, oldest first.
    pub fn editors_history(&self, key: GlifKey) -> GlifResult<Vec<EditorEntry>> {
        if self.glifs().get_glif(key, true)?.is_none() {
            return Err(GlifError::NotFound(key));
        }
        Ok(SqliteAuditRepository::new(&*self.conn).editors_history(key)?)
    }

    /// Distinct actors who edited any glif of the font after `since`.
    pub fn font_editors_since(&self, font_id: FontId, since: i64) -> GlifResult<Vec<String>> {
        Ok(SqliteAuditRepository::new(&*self.conn).actors_since(font_id, since)?)
    }

    /// Commit message for an export of the font's changes since `since`.
    pub fn commit_message(&self, font_id: FontId, since: i64) -> GlifResult<String> {
        let font = SqliteContainerRepository::new(&*self.conn)
            .get_font(font_id)?
            .ok_or(GlifError::FontNotFound(font_id))?;
        let actors = self.font_editors_since(font_id, since)?;
        if actors.is_empty() {
            return Ok(format!("Updated {}.", font.name));
        }
        Ok(format!("Updated {} by: {}.", font.name, actors.join(", ")))
    }

    /// Per-status counts of active glifs of every kind in one font.
    pub fn status_summary(&self, font_id: FontId) -> GlifResult<StatusSummary> {
        if SqliteContainerRepository::new(&*self.conn)
            .get_font(font_id)?
            .is_none()
        {
            return Err(GlifError::FontNotFound(font_id));
        }
        let repo = self.glifs();
        let mut summary = StatusSummary::default();
        for kind in GlifKind::ALL {
            for (status, count) in repo.status_counts(kind, font_id)? {
                summary.counts.insert((kind, status), count);
            }
        }
        Ok(summary)
    }

    /// Runs `op` on the active glif inside one `IMMEDIATE` transaction and
    /// writes it back with a compare-and-swap when the step reports a change.
    pub(super) fn mutate<T>(
        &mut self,
        event: &'static str,
        key: GlifKey,
        expected_version: Option<i64>,
        op: impl FnOnce(&Connection, &mut Glif, i64) -> GlifResult<Mutation<T>>,
    ) -> GlifResult<(T, Glif)> {
        let started_at = Instant::now();
        let result = self.run_mutation(key, expected_version, op);
        log_outcome(event, &key.to_string(), started_at, &result);
        result
    }

    fn run_mutation<T>(
        &mut self,
        key: GlifKey,
        expected_version: Option<i64>,
        op: impl FnOnce(&Connection, &mut Glif, i64) -> GlifResult<Mutation<T>>,
    ) -> GlifResult<(T, Glif)> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_epoch_ms();
        let repo = SqliteGlifRepository::new(&tx);
        let mut glif = repo
            .get_glif(key, false)?
            .ok_or(GlifError::NotFound(key))?;

        let read_version = glif.version;
        if let Some(expected) = expected_version {
            if expected != read_version {
                return Err(GlifError::WriteConflict {
                    expected,
                    actual: read_version,
                });
            }
        }

        let Mutation { value, changed } = op(&*tx, &mut glif, now)?;
        if changed {
            glif.updated_at = now;
            glif.version = repo.update_glif(&glif, read_version)?;
        }
        tx.commit()?;
        Ok((value, glif))
    }

    pub(super) fn glifs(&self) -> SqliteGlifRepository<'_> {
        SqliteGlifRepository::new(&*self.conn)
    }

    pub(super) fn load(&self, key: GlifKey) -> GlifResult<Glif> {
        self.glifs()
            .get_glif(key, false)?
            .ok_or(GlifError::NotFound(key))
    }
}

pub(super) fn ensure_actor(actor: &Actor) -> GlifResult<()> {
    if actor.is_valid() {
        Ok(())
    } else {
        Err(GlifError::InvalidActor)
    }
}

/// Appends history and mirrors a new editor into the in-memory record.
pub(super) fn note_edit(conn: &Connection, glif: &mut Glif, actor: &str, now: i64) -> GlifResult<()> {
    let added = SqliteAuditRepository::new(conn).record_edit(glif.key(), glif.font_id, actor, now)?;
    if added {
        glif.editors.push(actor.to_string());
        glif.editors.sort();
    }
    Ok(())
}

fn ensure_name_free(repo: &impl GlifRepository, glif: &Glif) -> GlifResult<()> {
    match repo.find_active_by_name(glif.font_id, glif.kind, &glif.name)? {
        Some(existing) if existing.id != glif.id => Err(GlifError::NameConflict {
            kind: glif.kind,
            name: glif.name.clone(),
        }),
        _ => Ok(()),
    }
}

/// Checks the font graph with `glif`'s current edges in place of `previous`.
fn ensure_acyclic(
    repo: &impl GlifRepository,
    previous: Option<&ComponentRef>,
    glif: &Glif,
) -> GlifResult<()> {
    let mut graph = CompositionGraph::from_nodes(repo.font_graph(glif.font_id)?);
    let node = glif.node();
    graph.replace_node(previous, node.clone(), glif.components.clone());
    match graph.cycle_through(&node) {
        Some(path) => Err(GlifError::CycleDetected { path }),
        None => Ok(()),
    }
}

fn clear_lock(repo: &impl GlifRepository, key: GlifKey, now: i64) -> GlifResult<bool> {
    let Some(mut glif) = repo.get_glif(key, true)? else {
        return Ok(false);
    };
    if glif.lock.is_none() {
        return Ok(false);
    }
    glif.lock = None;
    glif.updated_at = now;
    repo.update_glif(&glif, glif.version)?;
    Ok(true)
}

pub(super) fn log_outcome<T>(
    event: &str,
    target: &str,
    started_at: Instant,
    result: &GlifResult<T>,
) {
    match result {
        Ok(_) => info!(
            "event={} module=service status=ok target={} duration_ms={}",
            event,
            target,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={} module=service status=error target={} duration_ms={} error_code={}",
            event,
            target,
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
}
