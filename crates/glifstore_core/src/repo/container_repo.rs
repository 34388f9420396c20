//! Project/font container repository.
//!
//! # Responsibility
//! - Persist projects, fonts, project designers and export flags.
//!
//! # Invariants
//! - `fonts.project_id` is written on insert only.
//! - Export stamps are written as one unit so the monotonicity CHECK sees
//!   the complete new state.
//! - Updates compare-and-swap on `updated_at`; a row touched since it was
//!   read fails with `StaleVersion`.

use crate::model::container::{ExportState, Font, FontId, Project, ProjectId};
use crate::repo::glif_repo::{RepoError, RepoResult};
use crate::repo::row::{bool_to_int, from_json, int_to_bool, parse_uuid, to_json};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "id,
    hashid,
    name,
    slug,
    repo_url,
    repo_branch,
    export_enabled,
    export_running,
    export_started_at,
    export_completed_at,
    last_full_export_at,
    created_at,
    updated_at";

const FONT_COLUMNS: &str = "id,
    project_id,
    hashid,
    name,
    slug,
    available,
    fontlib,
    features,
    designspace,
    export_enabled,
    export_running,
    export_started_at,
    export_completed_at,
    last_full_export_at,
    created_at,
    updated_at";

/// Repository interface for the container hierarchy.
pub trait ContainerRepository {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn find_project_by_slug(&self, slug: &str) -> RepoResult<Option<Project>>;
    fn find_project_by_repo_url(&self, repo_url: &str) -> RepoResult<Option<Project>>;
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
    /// Writes branch, export flags and `updated_at`.
    /// Writes when the stored `updated_at` still equals `expected_updated_at`.
    fn update_project(&self, project: &Project, expected_updated_at: i64) -> RepoResult<()>;
    /// Returns whether the designer set changed.
    fn add_designer(&self, project_id: ProjectId, actor: &str) -> RepoResult<bool>;
    fn remove_designer(&self, project_id: ProjectId, actor: &str) -> RepoResult<bool>;

    fn create_font(&self, font: &Font) -> RepoResult<FontId>;
    fn get_font(&self, id: FontId) -> RepoResult<Option<Font>>;
    fn find_font_by_slug(&self, project_id: ProjectId, slug: &str) -> RepoResult<Option<Font>>;
    fn list_fonts(&self, project_id: ProjectId) -> RepoResult<Vec<Font>>;
    /// Writes availability, metadata, export flags and `updated_at`.
    fn update_font(&self, font: &Font, expected_updated_at: i64) -> RepoResult<()>;
}

/// SQLite-backed container repository.
pub struct SqliteContainerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContainerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_projects(&self, sql_filter: &str, values: &[&str]) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS}
             FROM projects
             WHERE {sql_filter}
             ORDER BY name ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        for project in &mut projects {
            project.designers = load_designers(self.conn, project.id)?;
        }
        Ok(projects)
    }

    fn query_fonts(&self, sql_filter: &str, values: &[&str]) -> RepoResult<Vec<Font>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FONT_COLUMNS}
             FROM fonts
             WHERE {sql_filter}
             ORDER BY name ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut fonts = Vec::new();
        while let Some(row) = rows.next()? {
            fonts.push(parse_font_row(row)?);
        }
        Ok(fonts)
    }
}

impl ContainerRepository for SqliteContainerRepository<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        self.conn.execute(
            &format!(
                "INSERT INTO projects ({PROJECT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);"
            ),
            params![
                project.id.to_string(),
                project.hashid.as_str(),
                project.name.as_str(),
                project.slug.as_str(),
                project.repo_url.as_str(),
                project.repo_branch.as_str(),
                bool_to_int(project.export.export_enabled),
                bool_to_int(project.export.export_running),
                project.export.export_started_at,
                project.export.export_completed_at,
                project.export.last_full_export_at,
                project.created_at,
                project.updated_at,
            ],
        )?;
        for actor in &project.designers {
            self.add_designer(project.id, actor)?;
        }
        Ok(project.id)
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let id = id.to_string();
        Ok(self.query_projects("id = ?1", &[id.as_str()])?.into_iter().next())
    }

    fn find_project_by_slug(&self, slug: &str) -> RepoResult<Option<Project>> {
        Ok(self.query_projects("slug = ?1", &[slug])?.into_iter().next())
    }

    fn find_project_by_repo_url(&self, repo_url: &str) -> RepoResult<Option<Project>> {
        Ok(self.query_projects("repo_url = ?1", &[repo_url])?.into_iter().next())
    }

    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        self.query_projects("1 = 1", &[])
    }

    fn update_project(&self, project: &Project, expected_updated_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET
                repo_branch = ?1,
                export_enabled = ?2,
                export_running = ?3,
                export_started_at = ?4,
                export_completed_at = ?5,
                last_full_export_at = ?6,
                updated_at = ?7
             WHERE id = ?8
               AND updated_at = ?9;",
            params![
                project.repo_branch.as_str(),
                bool_to_int(project.export.export_enabled),
                bool_to_int(project.export.export_running),
                project.export.export_started_at,
                project.export.export_completed_at,
                project.export.last_full_export_at,
                project.updated_at,
                project.id.to_string(),
                expected_updated_at,
            ],
        )?;
        if changed == 1 {
            return Ok(());
        }
        Err(stale_or_missing(self.conn, "projects", project.id, expected_updated_at)?)
    }

    fn add_designer(&self, project_id: ProjectId, actor: &str) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO project_designers (project_id, actor_id)
             VALUES (?1, ?2);",
            params![project_id.to_string(), actor],
        )?;
        Ok(inserted > 0)
    }

    fn remove_designer(&self, project_id: ProjectId, actor: &str) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM project_designers
             WHERE project_id = ?1
               AND actor_id = ?2;",
            params![project_id.to_string(), actor],
        )?;
        Ok(removed > 0)
    }

    fn create_font(&self, font: &Font) -> RepoResult<FontId> {
        self.conn.execute(
            &format!(
                "INSERT INTO fonts ({FONT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);"
            ),
            params![
                font.id.to_string(),
                font.project_id.to_string(),
                font.hashid.as_str(),
                font.name.as_str(),
                font.slug.as_str(),
                bool_to_int(font.available),
                to_json("fonts", "fontlib", &font.fontlib)?,
                font.features.as_str(),
                to_json("fonts", "designspace", &font.designspace)?,
                bool_to_int(font.export.export_enabled),
                bool_to_int(font.export.export_running),
                font.export.export_started_at,
                font.export.export_completed_at,
                font.export.last_full_export_at,
                font.created_at,
                font.updated_at,
            ],
        )?;
        Ok(font.id)
    }

    fn get_font(&self, id: FontId) -> RepoResult<Option<Font>> {
        let id = id.to_string();
        Ok(self.query_fonts("id = ?1", &[id.as_str()])?.into_iter().next())
    }

    fn find_font_by_slug(&self, project_id: ProjectId, slug: &str) -> RepoResult<Option<Font>> {
        let project_id = project_id.to_string();
        Ok(self
            .query_fonts("project_id = ?1 AND slug = ?2", &[project_id.as_str(), slug])?
            .into_iter()
            .next())
    }

    fn list_fonts(&self, project_id: ProjectId) -> RepoResult<Vec<Font>> {
        let project_id = project_id.to_string();
        self.query_fonts("project_id = ?1", &[project_id.as_str()])
    }

    fn update_font(&self, font: &Font, expected_updated_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE fonts
             SET
                available = ?1,
                fontlib = ?2,
                features = ?3,
                designspace = ?4,
                export_enabled = ?5,
                export_running = ?6,
                export_started_at = ?7,
                export_completed_at = ?8,
                last_full_export_at = ?9,
                updated_at = ?10
             WHERE id = ?11
               AND updated_at = ?12;",
            params![
                bool_to_int(font.available),
                to_json("fonts", "fontlib", &font.fontlib)?,
                font.features.as_str(),
                to_json("fonts", "designspace", &font.designspace)?,
                bool_to_int(font.export.export_enabled),
                bool_to_int(font.export.export_running),
                font.export.export_started_at,
                font.export.export_completed_at,
                font.export.last_full_export_at,
                font.updated_at,
                font.id.to_string(),
                expected_updated_at,
            ],
        )?;
        if changed == 1 {
            return Ok(());
        }
        Err(stale_or_missing(self.conn, "fonts", font.id, expected_updated_at)?)
    }
}

/// Explains a failed CAS update: the row moved on, or it is gone.
fn stale_or_missing(
    conn: &Connection,
    table: &str,
    id: Uuid,
    expected: i64,
) -> RepoResult<RepoError> {
    let actual: Option<i64> = conn
        .query_row(
            &format!("SELECT updated_at FROM {table} WHERE id = ?1;"),
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match actual {
        Some(actual) => RepoError::StaleVersion {
            id,
            expected,
            actual,
        },
        None => RepoError::NotFound(id),
    })
}

fn parse_export(table: &str, row: &Row<'_>) -> RepoResult<ExportState> {
    Ok(ExportState {
        export_enabled: int_to_bool(table, "export_enabled", row.get("export_enabled")?)?,
        export_running: int_to_bool(table, "export_running", row.get("export_running")?)?,
        export_started_at: row.get("export_started_at")?,
        export_completed_at: row.get("export_completed_at")?,
        last_full_export_at: row.get("last_full_export_at")?,
    })
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let id_text: String = row.get("id")?;
    Ok(Project {
        id: parse_uuid("projects", "id", &id_text)?,
        hashid: row.get("hashid")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        repo_url: row.get("repo_url")?,
        repo_branch: row.get("repo_branch")?,
        designers: Vec::new(),
        export: parse_export("projects", row)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_font_row(row: &Row<'_>) -> RepoResult<Font> {
    let id_text: String = row.get("id")?;
    let project_text: String = row.get("project_id")?;
    let fontlib_text: String = row.get("fontlib")?;
    let designspace_text: String = row.get("designspace")?;
    Ok(Font {
        id: parse_uuid("fonts", "id", &id_text)?,
        project_id: parse_uuid("fonts", "project_id", &project_text)?,
        hashid: row.get("hashid")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        available: int_to_bool("fonts", "available", row.get("available")?)?,
        fontlib: from_json("fonts", "fontlib", &fontlib_text)?,
        features: row.get("features")?,
        designspace: from_json("fonts", "designspace", &designspace_text)?,
        export: parse_export("fonts", row)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn load_designers(conn: &Connection, project_id: ProjectId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT actor_id
         FROM project_designers
         WHERE project_id = ?1
         ORDER BY actor_id ASC;",
    )?;
    let mut rows = stmt.query([project_id.to_string()])?;
    let mut designers = Vec::new();
    while let Some(row) = rows.next()? {
        designers.push(row.get(0)?);
    }
    Ok(designers)
}
