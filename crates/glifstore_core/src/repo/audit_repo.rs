//! Editor audit trail repository.
//!
//! # Responsibility
//! - Maintain the current editor set and the append-only edit history of
//!   every glif.
//!
//! # Invariants
//! - `glif_editor_history` rows are never updated or deleted (enforced by
//!   triggers in the schema).
//! - Every actor in `glif_editors` has at least one history row.

use crate::model::container::FontId;
use crate::model::glif::GlifKey;
use crate::repo::glif_repo::RepoResult;
use rusqlite::{params, Connection};

/// One append-only history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorEntry {
    pub seq: i64,
    pub actor: String,
    /// Epoch ms.
    pub edited_at: i64,
}

/// Repository interface for editor bookkeeping.
pub trait AuditRepository {
    /// Appends history and adds the actor to the editor set.
    /// Returns whether the editor set changed.
    fn record_edit(&self, key: GlifKey, font_id: FontId, actor: &str, at: i64) -> RepoResult<bool>;
    /// Removes the actor from the editor set only. Returns whether it was present.
    fn remove_editor(&self, key: GlifKey, actor: &str) -> RepoResult<bool>;
    fn editors_history(&self, key: GlifKey) -> RepoResult<Vec<EditorEntry>>;
    /// Distinct actors with history rows in `font_id` after `since`, sorted.
    fn actors_since(&self, font_id: FontId, since: i64) -> RepoResult<Vec<String>>;
    /// Drops the editor set of a purged glif; history is kept.
    fn clear_editors(&self, key: GlifKey) -> RepoResult<()>;
}

/// SQLite-backed audit repository.
pub struct SqliteAuditRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AuditRepository for SqliteAuditRepository<'_> {
    fn record_edit(&self, key: GlifKey, font_id: FontId, actor: &str, at: i64) -> RepoResult<bool> {
        let glif_id = key.id.to_string();
        self.conn.execute(
            "INSERT INTO glif_editor_history (glif_type, glif_id, font_id, actor_id, edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                key.kind.as_str(),
                glif_id.as_str(),
                font_id.to_string(),
                actor,
                at
            ],
        )?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO glif_editors (glif_type, glif_id, actor_id)
             VALUES (?1, ?2, ?3);",
            params![key.kind.as_str(), glif_id.as_str(), actor],
        )?;
        Ok(inserted > 0)
    }

    fn remove_editor(&self, key: GlifKey, actor: &str) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM glif_editors
             WHERE glif_type = ?1
               AND glif_id = ?2
               AND actor_id = ?3;",
            params![key.kind.as_str(), key.id.to_string(), actor],
        )?;
        Ok(removed > 0)
    }

    fn editors_history(&self, key: GlifKey) -> RepoResult<Vec<EditorEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, actor_id, edited_at
             FROM glif_editor_history
             WHERE glif_type = ?1
               AND glif_id = ?2
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query(params![key.kind.as_str(), key.id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(EditorEntry {
                seq: row.get("seq")?,
                actor: row.get("actor_id")?,
                edited_at: row.get("edited_at")?,
            });
        }
        Ok(entries)
    }

    fn actors_since(&self, font_id: FontId, since: i64) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT actor_id
             FROM glif_editor_history
             WHERE font_id = ?1
               AND edited_at > ?2
             ORDER BY actor_id ASC;",
        )?;
        let mut rows = stmt.query(params![font_id.to_string(), since])?;
        let mut actors = Vec::new();
        while let Some(row) = rows.next()? {
            actors.push(row.get(0)?);
        }
        Ok(actors)
    }

    fn clear_editors(&self, key: GlifKey) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM glif_editors
             WHERE glif_type = ?1
               AND glif_id = ?2;",
            params![key.kind.as_str(), key.id.to_string()],
        )?;
        Ok(())
    }
}
