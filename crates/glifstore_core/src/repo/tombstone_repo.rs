//! Tombstone ledger repository.
//!
//! # Responsibility
//! - Insert and query `deleted_glifs` entries for glifs and layers.
//!
//! # Invariants
//! - At most one tombstone per deleted row (`UNIQUE (glif_type, record_id)`).
//! - Rows are immutable after insert (update trigger aborts).

use crate::model::container::FontId;
use crate::model::tombstone::{DeletedGlifType, NewTombstone, Tombstone};
use crate::repo::glif_repo::{RepoError, RepoResult};
use crate::repo::row::parse_uuid;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const TOMBSTONE_COLUMNS: &str = "id,
    deleted_at,
    deleted_by,
    font_id,
    glif_type,
    glif_id,
    group_name,
    name,
    filename,
    filepath";

/// Repository interface for the tombstone ledger.
pub trait TombstoneRepository {
    /// Writes a tombstone for the row `record_id` (glif or layer id).
    fn insert_tombstone(&self, entry: &NewTombstone, record_id: Uuid) -> RepoResult<Tombstone>;
    fn find_for_record(
        &self,
        glif_type: DeletedGlifType,
        record_id: Uuid,
    ) -> RepoResult<Option<Tombstone>>;
    /// Tombstones of one font, newest first.
    fn list_for_font(&self, font_id: FontId, limit: Option<u32>) -> RepoResult<Vec<Tombstone>>;
}

/// SQLite-backed tombstone repository.
pub struct SqliteTombstoneRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTombstoneRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TombstoneRepository for SqliteTombstoneRepository<'_> {
    fn insert_tombstone(&self, entry: &NewTombstone, record_id: Uuid) -> RepoResult<Tombstone> {
        self.conn.execute(
            "INSERT INTO deleted_glifs (
                deleted_at,
                deleted_by,
                font_id,
                glif_type,
                glif_id,
                record_id,
                group_name,
                name,
                filename,
                filepath
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                entry.deleted_at,
                entry.deleted_by.as_deref(),
                entry.font_id.to_string(),
                entry.glif_type.as_str(),
                entry.glif_id.to_string(),
                record_id.to_string(),
                entry.group_name.as_str(),
                entry.name.as_str(),
                entry.filename.as_str(),
                entry.filepath.as_str(),
            ],
        )?;

        Ok(Tombstone {
            id: self.conn.last_insert_rowid(),
            deleted_at: entry.deleted_at,
            deleted_by: entry.deleted_by.clone(),
            font_id: entry.font_id,
            glif_type: entry.glif_type,
            glif_id: entry.glif_id,
            group_name: entry.group_name.clone(),
            name: entry.name.clone(),
            filename: entry.filename.clone(),
            filepath: entry.filepath.clone(),
        })
    }

    fn find_for_record(
        &self,
        glif_type: DeletedGlifType,
        record_id: Uuid,
    ) -> RepoResult<Option<Tombstone>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TOMBSTONE_COLUMNS}
             FROM deleted_glifs
             WHERE glif_type = ?1
               AND record_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![glif_type.as_str(), record_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_tombstone_row(row)?));
        }
        Ok(None)
    }

    fn list_for_font(&self, font_id: FontId, limit: Option<u32>) -> RepoResult<Vec<Tombstone>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TOMBSTONE_COLUMNS}
             FROM deleted_glifs
             WHERE font_id = ?1
             ORDER BY deleted_at DESC, id DESC
             LIMIT ?2;"
        ))?;
        let limit = limit.map_or(-1, i64::from);
        let mut rows = stmt.query(params![font_id.to_string(), limit])?;
        let mut tombstones = Vec::new();
        while let Some(row) = rows.next()? {
            tombstones.push(parse_tombstone_row(row)?);
        }
        Ok(tombstones)
    }
}

fn parse_tombstone_row(row: &Row<'_>) -> RepoResult<Tombstone> {
    let font_text: String = row.get("font_id")?;
    let glif_text: String = row.get("glif_id")?;
    let type_text: String = row.get("glif_type")?;
    let glif_type = DeletedGlifType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid glif type `{type_text}` in deleted_glifs.glif_type"
        ))
    })?;

    Ok(Tombstone {
        id: row.get("id")?,
        deleted_at: row.get("deleted_at")?,
        deleted_by: row.get("deleted_by")?,
        font_id: parse_uuid("deleted_glifs", "font_id", &font_text)?,
        glif_type,
        glif_id: parse_uuid("deleted_glifs", "glif_id", &glif_text)?,
        group_name: row.get("group_name")?,
        name: row.get("name")?,
        filename: row.get("filename")?,
        filepath: row.get("filepath")?,
    })
}
