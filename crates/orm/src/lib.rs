//! # arbor-orm: Repository Layer for arbor
//!
//! Typed entities, relation metadata with resolution and inference,
//! constrained repositories scoped to an owning instance, and eager loading
//! of related entities, all on top of the loosely-typed `arbor-dao`
//! connector abstraction.
//!
//! The relation machinery is synchronous CPU work; the only suspension
//! points are the connector calls issued by repositories.

pub mod error;
pub mod model;
pub mod relations;
pub mod repository;

// Re-export core traits and types
pub use error::*;
pub use model::*;
pub use relations::*;
pub use repository::*;

// The datasource layer is part of this crate's public contract
pub use arbor_dao as dao;
