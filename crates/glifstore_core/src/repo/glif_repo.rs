//! Glif repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and graph queries over the three glif kind tables.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Updates are compare-and-swap on `version`; a stale version never
//!   overwrites a newer row.
//! - `font_id` is written on insert only.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::container::FontId;
use crate::model::glif::{ComponentRef, Glif, GlifId, GlifKey, GlifKind, LockHolder};
use crate::model::payload::{DerivedFlags, GlifPayload};
use crate::model::status::{GlifStatus, StatusFields};
use crate::repo::row::{bool_to_int, from_json, int_to_bool, parse_uuid, to_json};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const GLIF_COLUMNS: &str = "id,
    font_id,
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
    status,
    status_changed_at,
    status_changed_by,
    previous_status,
    status_downgraded,
    status_downgraded_at,
    locked_by,
    locked_at,
    deleted,
    version,
    layers_updated_at,
    created_at,
    updated_at";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(Uuid),
    /// Compare-and-swap update lost against a newer row version.
    StaleVersion {
        id: Uuid,
        expected: i64,
        actual: i64,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::StaleVersion {
                id,
                expected,
                actual,
            } => write!(
                f,
                "stale write on {id}: expected version {expected}, found {actual}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::StaleVersion { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing glifs of one kind.
#[derive(Debug, Clone, Default)]
pub struct GlifListQuery {
    pub font_id: Option<FontId>,
    pub status: Option<GlifStatus>,
    pub is_empty: Option<bool>,
    pub locked_only: bool,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Outgoing references of one glif, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub node: ComponentRef,
    pub targets: Vec<ComponentRef>,
}

/// Repository interface for glif persistence.
pub trait GlifRepository {
    fn create_glif(&self, glif: &Glif) -> RepoResult<GlifId>;
    /// Writes `glif` if the stored version equals `expected_version`.
    /// Returns the new version.
    fn update_glif(&self, glif: &Glif, expected_version: i64) -> RepoResult<i64>;
    fn get_glif(&self, key: GlifKey, include_deleted: bool) -> RepoResult<Option<Glif>>;
    fn find_active_by_name(
        &self,
        font_id: FontId,
        kind: GlifKind,
        name: &str,
    ) -> RepoResult<Option<Glif>>;
    fn list_glifs(&self, kind: GlifKind, query: &GlifListQuery) -> RepoResult<Vec<Glif>>;
    /// Active composition edges of every kind within one font.
    fn font_graph(&self, font_id: FontId) -> RepoResult<Vec<GraphNode>>;
    /// Ids of glifs whose lock was taken before `cutoff`.
    fn stale_locks(
        &self,
        kind: GlifKind,
        font_id: Option<FontId>,
        cutoff: i64,
    ) -> RepoResult<Vec<GlifId>>;
    fn status_counts(&self, kind: GlifKind, font_id: FontId) -> RepoResult<Vec<(GlifStatus, u64)>>;
    /// Physically removes a soft-deleted glif. Returns whether a row was removed.
    fn purge_glif(&self, key: GlifKey) -> RepoResult<bool>;
}

/// SQLite-backed glif repository.
pub struct SqliteGlifRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGlifRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl GlifRepository for SqliteGlifRepository<'_> {
    fn create_glif(&self, glif: &Glif) -> RepoResult<GlifId> {
        let table = glif.kind.table();
        self.conn.execute(
            &format!(
                "INSERT INTO {table} ({GLIF_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25);"
            ),
            params![
                glif.id.to_string(),
                glif.font_id.to_string(),
                glif.name.as_str(),
                glif.filename.as_str(),
                to_json(table, "data", &glif.data)?,
                glif.unicode_hex.as_str(),
                to_json(table, "components", &glif.components)?,
                bool_to_int(glif.flags.is_empty),
                bool_to_int(glif.flags.has_unicode),
                bool_to_int(glif.flags.has_variation_axis),
                bool_to_int(glif.flags.has_outlines),
                bool_to_int(glif.flags.has_components),
                glif.status.status.as_str(),
                glif.status.changed_at,
                glif.status.changed_by.as_deref(),
                glif.status.previous.map(GlifStatus::as_str),
                bool_to_int(glif.status.downgraded),
                glif.status.downgraded_at,
                glif.locked_by(),
                glif.locked_at(),
                bool_to_int(glif.deleted),
                glif.version,
                glif.layers_updated_at,
                glif.created_at,
                glif.updated_at,
            ],
        )?;

        Ok(glif.id)
    }

    fn update_glif(&self, glif: &Glif, expected_version: i64) -> RepoResult<i64> {
        let table = glif.kind.table();
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET
                    name = ?1,
                    filename = ?2,
                    data = ?3,
                    unicode_hex = ?4,
                    components = ?5,
                    is_empty = ?6,
                    has_unicode = ?7,
                    has_variation_axis = ?8,
                    has_outlines = ?9,
                    has_components = ?10,
                    status = ?11,
                    status_changed_at = ?12,
                    status_changed_by = ?13,
                    previous_status = ?14,
                    status_downgraded = ?15,
                    status_downgraded_at = ?16,
                    locked_by = ?17,
                    locked_at = ?18,
                    deleted = ?19,
                    layers_updated_at = ?20,
                    updated_at = ?21,
                    version = version + 1
                 WHERE id = ?22
                   AND version = ?23;"
            ),
            params![
                glif.name.as_str(),
                glif.filename.as_str(),
                to_json(table, "data", &glif.data)?,
                glif.unicode_hex.as_str(),
                to_json(table, "components", &glif.components)?,
                bool_to_int(glif.flags.is_empty),
                bool_to_int(glif.flags.has_unicode),
                bool_to_int(glif.flags.has_variation_axis),
                bool_to_int(glif.flags.has_outlines),
                bool_to_int(glif.flags.has_components),
                glif.status.status.as_str(),
                glif.status.changed_at,
                glif.status.changed_by.as_deref(),
                glif.status.previous.map(GlifStatus::as_str),
                bool_to_int(glif.status.downgraded),
                glif.status.downgraded_at,
                glif.locked_by(),
                glif.locked_at(),
                bool_to_int(glif.deleted),
                glif.layers_updated_at,
                glif.updated_at,
                glif.id.to_string(),
                expected_version,
            ],
        )?;

        if changed == 1 {
            return Ok(expected_version + 1);
        }

        let actual: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT version FROM {table} WHERE id = ?1;"),
                [glif.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match actual {
            Some(actual) => Err(RepoError::StaleVersion {
                id: glif.id,
                expected: expected_version,
                actual,
            }),
            None => Err(RepoError::NotFound(glif.id)),
        }
    }

    fn get_glif(&self, key: GlifKey, include_deleted: bool) -> RepoResult<Option<Glif>> {
        let table = key.kind.table();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GLIF_COLUMNS}
             FROM {table}
             WHERE id = ?1
               AND (?2 = 1 OR deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![key.id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            let mut glif = parse_glif_row(key.kind, row)?;
            glif.editors = load_editors(self.conn, key)?;
            return Ok(Some(glif));
        }

        Ok(None)
    }

    fn find_active_by_name(
        &self,
        font_id: FontId,
        kind: GlifKind,
        name: &str,
    ) -> RepoResult<Option<Glif>> {
        let table = kind.table();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GLIF_COLUMNS}
             FROM {table}
             WHERE font_id = ?1
               AND name = ?2
               AND deleted = 0;"
        ))?;

        let mut rows = stmt.query(params![font_id.to_string(), name])?;
        if let Some(row) = rows.next()? {
            let mut glif = parse_glif_row(kind, row)?;
            glif.editors = load_editors(self.conn, glif.key())?;
            return Ok(Some(glif));
        }

        Ok(None)
    }

    fn list_glifs(&self, kind: GlifKind, query: &GlifListQuery) -> RepoResult<Vec<Glif>> {
        let table = kind.table();
        let mut sql = format!("SELECT {GLIF_COLUMNS} FROM {table} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND deleted = 0");
        }
        if let Some(font_id) = query.font_id {
            sql.push_str(" AND font_id = ?");
            bind_values.push(Value::Text(font_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(is_empty) = query.is_empty {
            sql.push_str(" AND is_empty = ?");
            bind_values.push(Value::Integer(bool_to_int(is_empty)));
        }
        if query.locked_only {
            sql.push_str(" AND locked_by IS NOT NULL");
        }

        sql.push_str(" ORDER BY name ASC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut glifs = Vec::new();
        while let Some(row) = rows.next()? {
            let mut glif = parse_glif_row(kind, row)?;
            glif.editors = load_editors(self.conn, glif.key())?;
            glifs.push(glif);
        }

        Ok(glifs)
    }

    fn font_graph(&self, font_id: FontId) -> RepoResult<Vec<GraphNode>> {
        let mut nodes = Vec::new();
        for kind in GlifKind::ALL {
            let table = kind.table();
            let mut stmt = self.conn.prepare(&format!(
                "SELECT name, components
                 FROM {table}
                 WHERE font_id = ?1
                   AND deleted = 0;"
            ))?;
            let mut rows = stmt.query([font_id.to_string()])?;
            while let Some(row) = rows.next()? {
                let name: String = row.get("name")?;
                let components: String = row.get("components")?;
                nodes.push(GraphNode {
                    node: ComponentRef::new(kind, name),
                    targets: from_json(table, "components", &components)?,
                });
            }
        }
        Ok(nodes)
    }

    fn stale_locks(
        &self,
        kind: GlifKind,
        font_id: Option<FontId>,
        cutoff: i64,
    ) -> RepoResult<Vec<GlifId>> {
        let table = kind.table();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id
             FROM {table}
             WHERE locked_by IS NOT NULL
               AND locked_at < ?1
               AND (?2 IS NULL OR font_id = ?2)
             ORDER BY locked_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![cutoff, font_id.map(|id| id.to_string())])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            ids.push(parse_uuid(table, "id", &id_text)?);
        }
        Ok(ids)
    }

    fn status_counts(&self, kind: GlifKind, font_id: FontId) -> RepoResult<Vec<(GlifStatus, u64)>> {
        let table = kind.table();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT status, COUNT(*)
             FROM {table}
             WHERE font_id = ?1
               AND deleted = 0
             GROUP BY status;"
        ))?;
        let mut rows = stmt.query([font_id.to_string()])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            let status_text: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let status = parse_status(table, "status", &status_text)?;
            counts.push((status, u64::try_from(count).unwrap_or(0)));
        }
        Ok(counts)
    }

    fn purge_glif(&self, key: GlifKey) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "DELETE FROM {}
                 WHERE id = ?1
                   AND deleted = 1;",
                key.kind.table()
            ),
            [key.id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

fn parse_glif_row(kind: GlifKind, row: &Row<'_>) -> RepoResult<Glif> {
    let table = kind.table();

    let id_text: String = row.get("id")?;
    let font_text: String = row.get("font_id")?;
    let data_text: String = row.get("data")?;
    let components_text: String = row.get("components")?;
    let status_text: String = row.get("status")?;

    let previous = match row.get::<_, Option<String>>("previous_status")? {
        Some(value) => Some(parse_status(table, "previous_status", &value)?),
        None => None,
    };

    let lock = match (
        row.get::<_, Option<String>>("locked_by")?,
        row.get::<_, Option<i64>>("locked_at")?,
    ) {
        (Some(actor), Some(at)) => Some(LockHolder { actor, at }),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "locked_by/locked_at must be set together in {table}"
            )));
        }
    };

    let downgraded = int_to_bool(table, "status_downgraded", row.get("status_downgraded")?)?;
    if downgraded && previous.is_none() {
        return Err(RepoError::InvalidData(format!(
            "downgraded glif without previous_status in {table}"
        )));
    }

    Ok(Glif {
        id: parse_uuid(table, "id", &id_text)?,
        kind,
        font_id: parse_uuid(table, "font_id", &font_text)?,
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
        status: StatusFields {
            status: parse_status(table, "status", &status_text)?,
            changed_at: row.get("status_changed_at")?,
            changed_by: row.get("status_changed_by")?,
            previous,
            downgraded,
            downgraded_at: row.get("status_downgraded_at")?,
        },
        lock,
        editors: Vec::new(),
        deleted: int_to_bool(table, "deleted", row.get("deleted")?)?,
        version: row.get("version")?,
        layers_updated_at: row.get("layers_updated_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_status(table: &str, column: &str, value: &str) -> RepoResult<GlifStatus> {
    GlifStatus::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{value}` in {table}.{column}"))
    })
}

fn load_editors(conn: &Connection, key: GlifKey) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT actor_id
         FROM glif_editors
         WHERE glif_type = ?1
           AND glif_id = ?2
         ORDER BY actor_id ASC;",
    )?;
    let mut rows = stmt.query(params![key.kind.as_str(), key.id.to_string()])?;
    let mut editors = Vec::new();
    while let Some(row) = rows.next()? {
        editors.push(row.get(0)?);
    }
    Ok(editors)
}
