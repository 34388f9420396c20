//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own lock, status and composition rules; repositories only persist.
//!
//! # Invariants
//! - Every glif mutation runs in one `IMMEDIATE` transaction.

pub mod composition;
pub mod container_service;
pub mod error;
mod glif_deletion;
mod glif_layers;
pub mod glif_service;
pub mod lock_manager;
pub mod status_engine;

pub use glif_deletion::Deletion;
