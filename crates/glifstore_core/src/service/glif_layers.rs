//! Layer operations on character glyphs and atomic elements.
//!
//! Layers have no lock of their own; every write goes through the parent
//! glif's write gate and refreshes the parent's `layers_updated_at`.

use crate::model::actor::Actor;
use crate::model::glif::{Glif, GlifKey};
use crate::model::layer::{GlifLayer, LayerKind};
use crate::model::payload::{derive, GlifPayload};
use crate::model::tombstone::Tombstone;
use crate::repo::glif_repo::GlifRepository;
use crate::repo::layer_repo::{LayerRepository, SqliteLayerRepository};
use crate::service::error::{GlifError, GlifResult};
use crate::service::glif_deletion::tombstone_layer;
use crate::service::glif_service::{ensure_actor, note_edit, GlifService, Mutation};
use rusqlite::Connection;

impl GlifService<'_> {
    /// Adds a layer under `group_name`.
    ///
    /// # Errors
    /// - `LayersUnsupported` for deep components.
    /// - `LayerConflict` when the group already has an active layer.
    pub fn create_layer(
        &mut self,
        key: GlifKey,
        group_name: &str,
        data: GlifPayload,
        actor: &Actor,
    ) -> GlifResult<GlifLayer> {
        ensure_actor(actor)?;
        let layer_kind = layer_kind_of(key)?;
        let group_name = normalize_group_name(group_name)?;
        let locks = self.locks;
        let (layer, _) = self.mutate("layer_create", key, None, |conn, glif, now| {
            locks.require_write(glif, actor, now)?;
            let layers = SqliteLayerRepository::new(conn);
            ensure_group_free(&layers, layer_kind, glif, &group_name)?;

            let mut layer = GlifLayer::new(layer_kind, glif.id, group_name, data)?;
            layer.created_at = now;
            layer.updated_at = now;
            layers.create_layer(&layer)?;

            glif.layers_updated_at = Some(now);
            note_edit(conn, glif, &actor.id, now)?;
            Ok(Mutation::changed(layer))
        })?;
        Ok(layer)
    }

    /// Replaces a layer payload and its derived fields.
    pub fn set_layer_data(
        &mut self,
        key: GlifKey,
        group_name: &str,
        data: GlifPayload,
        actor: &Actor,
    ) -> GlifResult<GlifLayer> {
        ensure_actor(actor)?;
        let layer_kind = layer_kind_of(key)?;
        let locks = self.locks;
        let (layer, _) = self.mutate("layer_set_data", key, None, |conn, glif, now| {
            locks.require_write(glif, actor, now)?;
            let layers = SqliteLayerRepository::new(conn);
            let mut layer = active_layer(&layers, layer_kind, glif, group_name)?;

            let derived = derive(&data)?;
            layer.apply_derived(data, derived);
            layer.updated_at = now;
            layers.update_layer(&layer)?;

            glif.layers_updated_at = Some(now);
            note_edit(conn, glif, &actor.id, now)?;
            Ok(Mutation::changed(layer))
        })?;
        Ok(layer)
    }

    /// Moves a layer to another group name.
    pub fn rename_layer(
        &mut self,
        key: GlifKey,
        group_name: &str,
        new_group_name: &str,
        actor: &Actor,
    ) -> GlifResult<GlifLayer> {
        ensure_actor(actor)?;
        let layer_kind = layer_kind_of(key)?;
        let new_group_name = normalize_group_name(new_group_name)?;
        let locks = self.locks;
        let (layer, _) = self.mutate("layer_rename", key, None, |conn, glif, now| {
            locks.require_write(glif, actor, now)?;
            let layers = SqliteLayerRepository::new(conn);
            let mut layer = active_layer(&layers, layer_kind, glif, group_name)?;
            if layer.group_name == new_group_name {
                return Ok(Mutation::unchanged(layer));
            }
            ensure_group_free(&layers, layer_kind, glif, &new_group_name)?;

            layer.group_name = new_group_name;
            layer.updated_at = now;
            layers.update_layer(&layer)?;

            glif.layers_updated_at = Some(now);
            note_edit(conn, glif, &actor.id, now)?;
            Ok(Mutation::changed(layer))
        })?;
        Ok(layer)
    }

    /// Writes a layer tombstone and flags the layer deleted.
    pub fn delete_layer(
        &mut self,
        key: GlifKey,
        group_name: &str,
        actor: &Actor,
    ) -> GlifResult<Tombstone> {
        ensure_actor(actor)?;
        let layer_kind = layer_kind_of(key)?;
        let locks = self.locks;
        let (tombstone, _) = self.mutate("layer_delete", key, None, |conn, glif, now| {
            locks.require_write(glif, actor, now)?;
            let layers = SqliteLayerRepository::new(conn);
            let mut layer = active_layer(&layers, layer_kind, glif, group_name)?;

            let tombstone = tombstone_layer(conn, glif.font_id, &layer, Some(&actor.id), now)?;
            layer.deleted = true;
            layer.updated_at = now;
            layers.update_layer(&layer)?;

            glif.layers_updated_at = Some(now);
            Ok(Mutation::changed(tombstone))
        })?;
        Ok(tombstone)
    }

    pub fn get_layer(&self, key: GlifKey, group_name: &str) -> GlifResult<Option<GlifLayer>> {
        let layer_kind = layer_kind_of(key)?;
        Ok(layers(&*self.conn).get_active_layer(layer_kind, key.id, group_name)?)
    }

    /// Layers of one glif ordered by group name.
    pub fn list_layers(&self, key: GlifKey, include_deleted: bool) -> GlifResult<Vec<GlifLayer>> {
        let layer_kind = layer_kind_of(key)?;
        if self.glifs().get_glif(key, true)?.is_none() {
            return Err(GlifError::NotFound(key));
        }
        Ok(layers(&*self.conn).list_layers(layer_kind, key.id, include_deleted)?)
    }
}

fn layers(conn: &Connection) -> SqliteLayerRepository<'_> {
    SqliteLayerRepository::new(conn)
}

fn layer_kind_of(key: GlifKey) -> GlifResult<LayerKind> {
    key.kind
        .layer_kind()
        .ok_or(GlifError::LayersUnsupported(key.kind))
}

fn normalize_group_name(value: &str) -> GlifResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GlifError::InvalidGroupName);
    }
    Ok(trimmed.to_string())
}

fn active_layer(
    layers: &impl LayerRepository,
    kind: LayerKind,
    glif: &Glif,
    group_name: &str,
) -> GlifResult<GlifLayer> {
    layers
        .get_active_layer(kind, glif.id, group_name)?
        .ok_or_else(|| GlifError::LayerNotFound {
            glif: glif.key(),
            group_name: group_name.to_string(),
        })
}

fn ensure_group_free(
    layers: &impl LayerRepository,
    kind: LayerKind,
    glif: &Glif,
    group_name: &str,
) -> GlifResult<()> {
    if layers.get_active_layer(kind, glif.id, group_name)?.is_some() {
        return Err(GlifError::LayerConflict {
            kind,
            group_name: group_name.to_string(),
        });
    }
    Ok(())
}
