//! Project/font container model.
//!
//! # Responsibility
//! - Define the `Project -> Font` hierarchy that scopes every glif.
//! - Hold export scheduling flags written by the external build scheduler.
//!
//! # Invariants
//! - A font belongs to exactly one project for its whole lifetime.
//! - `export_completed_at` never precedes `export_started_at` once an export
//!   has completed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ProjectId = Uuid;
pub type FontId = Uuid;

const HASHID_CHARS: usize = 10;

static SLUG_INVALID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// Export flags shared by projects and fonts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportState {
    pub export_enabled: bool,
    pub export_running: bool,
    pub export_started_at: Option<i64>,
    pub export_completed_at: Option<i64>,
    pub last_full_export_at: Option<i64>,
}

/// Export flag update rejected by the monotonicity rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Completion stamp would precede the start stamp.
    NonMonotonic { started_at: i64, completed_at: i64 },
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonMonotonic {
                started_at,
                completed_at,
            } => write!(
                f,
                "export completion {completed_at} precedes export start {started_at}"
            ),
        }
    }
}

impl Error for ExportError {}

impl ExportState {
    /// Marks an export run as started.
    pub fn mark_started(&mut self, at: i64) {
        self.export_running = true;
        self.export_started_at = Some(at);
    }

    /// Marks the current export run as completed.
    ///
    /// # Errors
    /// - `NonMonotonic` when `at` is earlier than `export_started_at`; the
    ///   state is left unchanged.
    pub fn mark_completed(&mut self, at: i64, full: bool) -> Result<(), ExportError> {
        if let Some(started_at) = self.export_started_at {
            if at < started_at {
                return Err(ExportError::NonMonotonic {
                    started_at,
                    completed_at: at,
                });
            }
        }
        self.export_running = false;
        self.export_completed_at = Some(at);
        if full {
            self.last_full_export_at = Some(at);
        }
        Ok(())
    }

    /// Returns whether the stored stamps satisfy the monotonicity rule.
    pub fn is_consistent(&self) -> bool {
        match (self.export_started_at, self.export_completed_at) {
            (Some(started), Some(completed)) => self.export_running || completed >= started,
            _ => true,
        }
    }
}

/// Top-level container: one source repository, many fonts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub hashid: String,
    pub name: String,
    pub slug: String,
    /// Source-of-truth repository; opaque to the core.
    pub repo_url: String,
    pub repo_branch: String,
    /// Actors permitted to edit, sorted.
    pub designers: Vec<String>,
    pub export: ExportState,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    pub fn new(name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let name = name.into();
        Self {
            id,
            hashid: hashid(id),
            slug: slugify(&name),
            name,
            repo_url: repo_url.into(),
            repo_branch: "master".to_string(),
            designers: Vec::new(),
            export: ExportState::default(),
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Font inside a project; owns every glif record.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub id: FontId,
    pub project_id: ProjectId,
    pub hashid: String,
    pub name: String,
    pub slug: String,
    pub available: bool,
    /// Opaque font lib payload.
    pub fontlib: serde_json::Value,
    /// Opaque feature source text.
    pub features: String,
    /// Opaque designspace payload.
    pub designspace: serde_json::Value,
    pub export: ExportState,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Font {
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let name = name.into();
        Self {
            id,
            project_id,
            hashid: hashid(id),
            slug: slugify(&name),
            name,
            available: true,
            fontlib: serde_json::Value::Object(Default::default()),
            features: String::new(),
            designspace: serde_json::Value::Object(Default::default()),
            export: ExportState::default(),
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Lowercase ASCII slug with `-` separators.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    SLUG_INVALID_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Short public identifier derived from a uuid.
pub fn hashid(id: Uuid) -> String {
    id.simple().to_string().chars().take(HASHID_CHARS).collect()
}
