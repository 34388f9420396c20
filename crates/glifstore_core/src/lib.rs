//! Core revision, lock and status engine for collaborative glif editing.
//! This crate is the single source of truth for glif invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod time;

pub use config::{ConfigError, StoreConfig, TransitionPolicy};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::actor::Actor;
pub use model::container::{ExportState, Font, FontId, Project, ProjectId};
pub use model::glif::{ComponentRef, Glif, GlifId, GlifKey, GlifKind, LockHolder};
pub use model::layer::{GlifLayer, LayerKind};
pub use model::payload::{parse_payload, DerivedFlags, GlifPayload, PayloadError};
pub use model::status::{GlifStatus, StatusFields};
pub use model::tombstone::{DeletedGlifType, Tombstone};
pub use repo::audit_repo::EditorEntry;
pub use repo::container_repo::{ContainerRepository, SqliteContainerRepository};
pub use repo::glif_repo::{GlifListQuery, RepoError, RepoResult};
pub use service::container_service::{ContainerService, ExportTarget, FontMetadataUpdate};
pub use service::error::{ContainerError, ContainerResult, GlifError, GlifResult};
pub use service::glif_service::{GlifService, StatusSummary};
pub use service::Deletion;

pub use rusqlite::Connection;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
