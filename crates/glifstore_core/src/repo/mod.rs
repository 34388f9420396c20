//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repositories never decide policy (locks, transitions, cycles); they
//!   persist exactly what the service layer hands them.
//! - Repository APIs return semantic errors (`NotFound`, `StaleVersion`) in
//!   addition to DB transport errors.

pub mod audit_repo;
pub mod container_repo;
pub mod glif_repo;
pub mod layer_repo;
pub(crate) mod row;
pub mod tombstone_repo;
