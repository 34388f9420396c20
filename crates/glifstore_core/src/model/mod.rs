//! Domain model for glif records and their containers.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one generic glif shape for character glyphs, deep components and
//!   atomic elements, distinguished by an edge-rule table.
//!
//! # Invariants
//! - Every glif belongs to exactly one font, every font to one project.
//! - Deletion is represented by tombstones, written before any removal.

pub mod actor;
pub mod container;
pub mod glif;
pub mod layer;
pub mod payload;
pub mod status;
pub mod tombstone;
