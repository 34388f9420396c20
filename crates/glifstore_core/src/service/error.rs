//! Service-level error types.
//!
//! # Responsibility
//! - Give callers semantic failures for lock, status, graph and container
//!   rules, separate from storage transport errors.
//!
//! # Invariants
//! - A returned error means the mutation was rolled back in full.

use crate::model::container::{ExportError, FontId, ProjectId};
use crate::model::glif::{ComponentRef, GlifKey, GlifKind};
use crate::model::layer::LayerKind;
use crate::model::payload::PayloadError;
use crate::model::status::GlifStatus;
use crate::repo::glif_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GlifResult<T> = Result<T, GlifError>;
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors from glif lock, status, composition and deletion operations.
#[derive(Debug)]
pub enum GlifError {
    /// Another actor holds a live lock.
    LockConflict { holder: String },
    /// The caller does not hold the lock required for this mutation.
    NotLocked,
    InvalidTransition { from: GlifStatus, to: GlifStatus },
    /// The write would close a reference cycle; `path` starts and ends at
    /// the same node.
    CycleDetected { path: Vec<ComponentRef> },
    /// Reference to a missing glif or to a kind the edge rules forbid.
    DanglingReference { reference: ComponentRef },
    /// Version read by the caller is no longer current.
    WriteConflict { expected: i64, actual: i64 },
    NotFound(GlifKey),
    FontNotFound(FontId),
    LayerNotFound { glif: GlifKey, group_name: String },
    /// Another active glif of the same kind already uses this name in the font.
    NameConflict { kind: GlifKind, name: String },
    /// Another active layer of the same glif already uses this group name.
    LayerConflict { kind: LayerKind, group_name: String },
    InvalidActor,
    InvalidGroupName,
    InvalidPayload(PayloadError),
    /// Deep components have no layers.
    LayersUnsupported(GlifKind),
    /// Physical removal requested for a record without a tombstone.
    MissingTombstone(GlifKey),
    Repo(RepoError),
}

impl GlifError {
    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LockConflict { .. } => "lock_conflict",
            Self::NotLocked => "not_locked",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::WriteConflict { .. } => "write_conflict",
            Self::NotFound(_) => "not_found",
            Self::FontNotFound(_) => "font_not_found",
            Self::LayerNotFound { .. } => "layer_not_found",
            Self::NameConflict { .. } => "name_conflict",
            Self::LayerConflict { .. } => "layer_conflict",
            Self::InvalidActor => "invalid_actor",
            Self::InvalidGroupName => "invalid_group_name",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::LayersUnsupported(_) => "layers_unsupported",
            Self::MissingTombstone(_) => "missing_tombstone",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for GlifError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockConflict { holder } => write!(f, "glif is locked by `{holder}`"),
            Self::NotLocked => write!(f, "glif must be locked by the caller before mutation"),
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {from} -> {to}")
            }
            Self::CycleDetected { path } => {
                let rendered = path
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ");
                write!(f, "composition cycle detected: {rendered}")
            }
            Self::DanglingReference { reference } => {
                write!(f, "component reference does not resolve: {reference}")
            }
            Self::WriteConflict { expected, actual } => write!(
                f,
                "write conflict: expected version {expected}, current version {actual}"
            ),
            Self::NotFound(key) => write!(f, "glif not found: {key}"),
            Self::FontNotFound(id) => write!(f, "font not found: {id}"),
            Self::LayerNotFound { glif, group_name } => {
                write!(f, "layer `{group_name}` not found on {glif}")
            }
            Self::NameConflict { kind, name } => {
                write!(f, "active {kind} named `{name}` already exists in font")
            }
            Self::LayerConflict { kind, group_name } => {
                write!(f, "active {} `{group_name}` already exists", kind.as_str())
            }
            Self::InvalidActor => write!(f, "actor id must not be blank"),
            Self::InvalidGroupName => write!(f, "layer group name must not be blank"),
            Self::InvalidPayload(err) => write!(f, "{err}"),
            Self::LayersUnsupported(kind) => write!(f, "{kind} records have no layers"),
            Self::MissingTombstone(key) => {
                write!(f, "refusing to purge {key}: no tombstone recorded")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GlifError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPayload(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GlifError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::StaleVersion {
                expected, actual, ..
            } => Self::WriteConflict { expected, actual },
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for GlifError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<PayloadError> for GlifError {
    fn from(value: PayloadError) -> Self {
        Self::InvalidPayload(value)
    }
}

/// Errors from project/font registry operations.
#[derive(Debug)]
pub enum ContainerError {
    ProjectNotFound(ProjectId),
    FontNotFound(FontId),
    /// Name is blank or slugifies to nothing.
    InvalidName,
    /// Slug or repository url is already taken.
    NameTaken(String),
    InvalidActor,
    NonMonotonicExport { started_at: i64, completed_at: i64 },
    /// The row changed between read and write; `expected` and `actual` are
    /// `updated_at` stamps.
    WriteConflict { expected: i64, actual: i64 },
    Repo(RepoError),
}

impl Display for ContainerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::FontNotFound(id) => write!(f, "font not found: {id}"),
            Self::InvalidName => write!(f, "name must contain at least one letter or digit"),
            Self::NameTaken(value) => write!(f, "`{value}` is already in use"),
            Self::InvalidActor => write!(f, "actor id must not be blank"),
            Self::NonMonotonicExport {
                started_at,
                completed_at,
            } => write!(
                f,
                "export completion {completed_at} precedes export start {started_at}"
            ),
            Self::WriteConflict { expected, actual } => write!(
                f,
                "record changed concurrently (read at {expected}, now {actual})"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContainerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ContainerError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::StaleVersion {
                expected, actual, ..
            } => Self::WriteConflict { expected, actual },
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for ContainerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<ExportError> for ContainerError {
    fn from(value: ExportError) -> Self {
        match value {
            ExportError::NonMonotonic {
                started_at,
                completed_at,
            } => Self::NonMonotonicExport {
                started_at,
                completed_at,
            },
        }
    }
}
