//! Database module: entity mapping and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: view models returned by repositories.
//! - `repo`: SQL-only functions that map rows into domain entities.
//!
//! Callers should import from `idloom_review::db` — the repository API and
//! the view models are re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::PendingPage;
