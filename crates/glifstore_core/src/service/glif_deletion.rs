//! Soft deletion, tombstones and purge.
//!
//! # Invariants
//! - The tombstone is inserted in the same transaction that flags the record
//!   deleted, and before it.
//! - Physical removal is refused for records without a tombstone.

use crate::model::actor::Actor;
use crate::model::container::FontId;
use crate::model::glif::{GlifKey, GlifKind};
use crate::model::layer::GlifLayer;
use crate::model::tombstone::{rcjk_path, DeletedGlifType, NewTombstone, Tombstone};
use crate::repo::audit_repo::{AuditRepository, SqliteAuditRepository};
use crate::repo::container_repo::{ContainerRepository, SqliteContainerRepository};
use crate::repo::glif_repo::{GlifRepository, RepoError, SqliteGlifRepository};
use crate::repo::layer_repo::{LayerRepository, SqliteLayerRepository};
use crate::repo::tombstone_repo::{SqliteTombstoneRepository, TombstoneRepository};
use crate::service::error::{GlifError, GlifResult};
use crate::service::glif_service::{ensure_actor, log_outcome, GlifService};
use crate::time::now_epoch_ms;
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;

/// Outcome of `soft_delete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub tombstone: Tombstone,
    /// The record was already deleted; `tombstone` is the first entry.
    pub already_deleted: bool,
}

impl GlifService<'_> {
    /// Writes a tombstone and flags the glif deleted. Active layers of the
    /// glif are tombstoned and flagged with it.
    ///
    /// Deleting an already deleted glif returns its existing tombstone.
    ///
    /// # Errors
    /// - `NotLocked`/`LockConflict` from the write gate.
    pub fn soft_delete(&mut self, key: GlifKey, actor: &Actor) -> GlifResult<Deletion> {
        ensure_actor(actor)?;
        let started_at = Instant::now();
        let result = self.run_soft_delete(key, actor);
        log_outcome("glif_soft_delete", &key.to_string(), started_at, &result);
        result
    }

    fn run_soft_delete(&mut self, key: GlifKey, actor: &Actor) -> GlifResult<Deletion> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_epoch_ms();
        let glifs = SqliteGlifRepository::new(&tx);
        let tombstones = SqliteTombstoneRepository::new(&tx);

        let mut glif = glifs
            .get_glif(key, true)?
            .ok_or(GlifError::NotFound(key))?;
        if glif.deleted {
            let tombstone = tombstones
                .find_for_record(DeletedGlifType::Glif(key.kind), glif.id)?
                .ok_or(GlifError::MissingTombstone(key))?;
            return Ok(Deletion {
                tombstone,
                already_deleted: true,
            });
        }

        self.locks.require_write(&mut glif, actor, now)?;

        if let Some(layer_kind) = key.kind.layer_kind() {
            let layers = SqliteLayerRepository::new(&tx);
            for mut layer in layers.list_layers(layer_kind, glif.id, false)? {
                tombstone_layer(&tx, glif.font_id, &layer, Some(&actor.id), now)?;
                layer.deleted = true;
                layer.updated_at = now;
                layers.update_layer(&layer)?;
                glif.layers_updated_at = Some(now);
            }
        }

        let filepath = package_path(&tx, glif.font_id, glif.kind, None, &glif.filename)?;
        let tombstone = tombstones.insert_tombstone(
            &NewTombstone {
                deleted_at: now,
                deleted_by: Some(actor.id.clone()),
                font_id: glif.font_id,
                glif_type: DeletedGlifType::Glif(glif.kind),
                glif_id: glif.id,
                group_name: String::new(),
                name: glif.name.clone(),
                filename: glif.filename.clone(),
                filepath,
            },
            glif.id,
        )?;

        glif.deleted = true;
        glif.lock = None;
        glif.updated_at = now;
        glifs.update_glif(&glif, glif.version)?;
        tx.commit()?;

        Ok(Deletion {
            tombstone,
            already_deleted: false,
        })
    }

    /// Physically removes a soft-deleted glif and its layers.
    /// Returns `false` when the glif is already gone.
    ///
    /// # Errors
    /// - `MissingTombstone` when the glif is active or was never tombstoned.
    pub fn purge(&mut self, key: GlifKey) -> GlifResult<bool> {
        let started_at = Instant::now();
        let result = self.run_purge(key);
        log_outcome("glif_purge", &key.to_string(), started_at, &result);
        result
    }

    fn run_purge(&mut self, key: GlifKey) -> GlifResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let glifs = SqliteGlifRepository::new(&tx);
        let Some(glif) = glifs.get_glif(key, true)? else {
            return Ok(false);
        };

        let tombstone = SqliteTombstoneRepository::new(&tx)
            .find_for_record(DeletedGlifType::Glif(key.kind), glif.id)?;
        if !glif.deleted || tombstone.is_none() {
            return Err(GlifError::MissingTombstone(key));
        }

        let removed = glifs.purge_glif(key)?;
        SqliteAuditRepository::new(&tx).clear_editors(key)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Tombstones of one font, newest first.
    pub fn tombstones(&self, font_id: FontId, limit: Option<u32>) -> GlifResult<Vec<Tombstone>> {
        Ok(SqliteTombstoneRepository::new(&*self.conn).list_for_font(font_id, limit)?)
    }
}

pub(super) fn tombstone_layer(
    conn: &Connection,
    font_id: FontId,
    layer: &GlifLayer,
    deleted_by: Option<&str>,
    now: i64,
) -> GlifResult<Tombstone> {
    let filepath = package_path(
        conn,
        font_id,
        layer.kind.parent_kind(),
        Some(&layer.group_name),
        &layer.filename,
    )?;
    let tombstone = SqliteTombstoneRepository::new(conn).insert_tombstone(
        &NewTombstone {
            deleted_at: now,
            deleted_by: deleted_by.map(str::to_string),
            font_id,
            glif_type: DeletedGlifType::Layer(layer.kind),
            glif_id: layer.glif_id,
            group_name: layer.group_name.clone(),
            name: layer.name.clone(),
            filename: layer.filename.clone(),
            filepath,
        },
        layer.id,
    )?;
    Ok(tombstone)
}

fn package_path(
    conn: &Connection,
    font_id: FontId,
    kind: GlifKind,
    group_name: Option<&str>,
    filename: &str,
) -> GlifResult<String> {
    let containers = SqliteContainerRepository::new(conn);
    let font = containers
        .get_font(font_id)?
        .ok_or(GlifError::FontNotFound(font_id))?;
    let project = containers
        .get_project(font.project_id)?
        .ok_or(GlifError::Repo(RepoError::NotFound(font.project_id)))?;
    Ok(rcjk_path(
        &project.slug,
        &font.slug,
        kind,
        group_name,
        filename,
    ))
}
