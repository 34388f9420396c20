//! Layer repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist layers keyed by `(glif_id, group_name)` for both layer kinds.
//!
//! # Invariants
//! - At most one active layer per `(glif_id, group_name)`.
//! - Active queries never return soft-deleted layers.

use crate::model::glif::GlifId;
use crate::model::layer::{GlifLayer, LayerKind};
use crate::model::payload::{DerivedFlags, GlifPayload};
use crate::repo::glif_repo::{RepoError, RepoResult};
use crate::repo::row::{bool_to_int, from_json, int_to_bool, parse_uuid, to_json};
use rusqlite::{params, Connection, Row};

const LAYER_COLUMNS: &str = "id,
    glif_id,
    group_name,
    name,
    filename,
    data,
    unicode_hex,
    components,
    is_empty,
    has_unicode,
    has_variation_axis,
    has_outlines,
    has_components,
    deleted,
    created_at,
    updated_at";

/// Repository interface for layer persistence.
pub trait LayerRepository {
    fn create_layer(&self, layer: &GlifLayer) -> RepoResult<()>;
    fn update_layer(&self, layer: &GlifLayer) -> RepoResult<()>;
    fn get_active_layer(
        &self,
        kind: LayerKind,
        glif_id: GlifId,
        group_name: &str,
    ) -> RepoResult<Option<GlifLayer>>;
    fn list_layers(
        &self,
        kind: LayerKind,
        glif_id: GlifId,
        include_deleted: bool,
    ) -> RepoResult<Vec<GlifLayer>>;
    /// Most recent `updated_at` among active layers of one glif.
    fn max_layer_updated_at(&self, kind: LayerKind, glif_id: GlifId) -> RepoResult<Option<i64>>;
}

/// SQLite-backed layer repository.
pub struct SqliteLayerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLayerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LayerRepository for SqliteLayerRepository<'_> {
    fn create_layer(&self, layer: &GlifLayer) -> RepoResult<()> {
        let table = layer.kind.table();
        self.conn.execute(
            &format!(
                "INSERT INTO {table} ({LAYER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);"
            ),
            params![
                layer.id.to_string(),
                layer.glif_id.to_string(),
                layer.group_name.as_str(),
                layer.name.as_str(),
                layer.filename.as_str(),
                to_json(table, "data", &layer.data)?,
                layer.unicode_hex.as_str(),
                to_json(table, "components", &layer.components)?,
                bool_to_int(layer.flags.is_empty),
                bool_to_int(layer.flags.has_unicode),
                bool_to_int(layer.flags.has_variation_axis),
                bool_to_int(layer.flags.has_outlines),
                bool_to_int(layer.flags.has_components),
                bool_to_int(layer.deleted),
                layer.created_at,
                layer.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update_layer(&self, layer: &GlifLayer) -> RepoResult<()> {
        let table = layer.kind.table();
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET
                    group_name = ?1,
                    name = ?2,
                    filename = ?3,
                    data = ?4,
                    unicode_hex = ?5,
                    components = ?6,
                    is_empty = ?7,
                    has_unicode = ?8,
                    has_variation_axis = ?9,
                    has_outlines = ?10,
                    has_components = ?11,
                    deleted = ?12,
                    updated_at = ?13
                 WHERE id = ?14;"
            ),
            params![
                layer.group_name.as_str(),
                layer.name.as_str(),
                layer.filename.as_str(),
                to_json(table, "data", &layer.data)?,
                layer.unicode_hex.as_str(),
                to_json(table, "components", &layer.components)?,
                bool_to_int(layer.flags.is_empty),
                bool_to_int(layer.flags.has_unicode),
                bool_to_int(layer.flags.has_variation_axis),
                bool_to_int(layer.flags.has_outlines),
                bool_to_int(layer.flags.has_components),
                bool_to_int(layer.deleted),
                layer.updated_at,
                layer.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(layer.id));
        }
        Ok(())
    }

    fn get_active_layer(
        &self,
        kind: LayerKind,
        glif_id: GlifId,
        group_name: &str,
    ) -> RepoResult<Option<GlifLayer>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LAYER_COLUMNS}
             FROM {}
             WHERE glif_id = ?1
               AND group_name = ?2
               AND deleted = 0;",
            kind.table()
        ))?;
        let mut rows = stmt.query(params![glif_id.to_string(), group_name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_layer_row(kind, row)?));
        }
        Ok(None)
    }

    fn list_layers(
        &self,
        kind: LayerKind,
        glif_id: GlifId,
        include_deleted: bool,
    ) -> RepoResult<Vec<GlifLayer>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LAYER_COLUMNS}
             FROM {}
             WHERE glif_id = ?1
               AND (?2 = 1 OR deleted = 0)
             ORDER BY group_name ASC, id ASC;",
            kind.table()
        ))?;
        let mut rows = stmt.query(params![glif_id.to_string(), bool_to_int(include_deleted)])?;
        let mut layers = Vec::new();
        while let Some(row) = rows.next()? {
            layers.push(parse_layer_row(kind, row)?);
        }
        Ok(layers)
    }

    fn max_layer_updated_at(&self, kind: LayerKind, glif_id: GlifId) -> RepoResult<Option<i64>> {
        let value = self.conn.query_row(
            &format!(
                "SELECT MAX(updated_at)
                 FROM {}
                 WHERE glif_id = ?1
                   AND deleted = 0;",
                kind.table()
            ),
            [glif_id.to_string()],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(value)
    }
}

fn parse_layer_row(kind: LayerKind, row: &Row<'_>) -> RepoResult<GlifLayer> {
    let table = kind.table();
    let id_text: String = row.get("id")?;
    let glif_text: String = row.get("glif_id")?;
    let data_text: String = row.get("data")?;
    let components_text: String = row.get("components")?;

    Ok(GlifLayer {
        id: parse_uuid(table, "id", &id_text)?,
        kind,
        glif_id: parse_uuid(table, "glif_id", &glif_text)?,
        group_name: row.get("group_name")?,
        name: row.get("name")?,
        filename: row.get("filename")?,
        data: from_json::<GlifPayload>(table, "data", &data_text)?,
        unicode_hex: row.get("unicode_hex")?,
        flags: DerivedFlags {
            is_empty: int_to_bool(table, "is_empty", row.get("is_empty")?)?,
            has_unicode: int_to_bool(table, "has_unicode", row.get("has_unicode")?)?,
            has_variation_axis: int_to_bool(
                table,
                "has_variation_axis",
                row.get("has_variation_axis")?,
            )?,
            has_outlines: int_to_bool(table, "has_outlines", row.get("has_outlines")?)?,
            has_components: int_to_bool(table, "has_components", row.get("has_components")?)?,
        },
        components: from_json(table, "components", &components_text)?,
        deleted: int_to_bool(table, "deleted", row.get("deleted")?)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
