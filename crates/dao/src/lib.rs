//! # arbor-dao: Datasource Layer for arbor
//!
//! The legacy database abstraction the arbor repository layer is built on:
//! loosely-typed persisted records, the query filter object model, the
//! `Connector` CRUD contract, and an in-memory connector implementation.
//!
//! Everything above this crate treats the backing store as an opaque
//! create/find/update-all/delete-all/count backend. Connectors own their own
//! concurrency and durability semantics; this crate makes no attempt to add
//! locking or transactions on top of them.

pub mod connector;
pub mod datasource;
pub mod error;
pub mod filter;
pub mod memory;
pub mod value;

// Re-export core types
pub use connector::*;
pub use datasource::*;
pub use error::*;
pub use filter::*;
pub use memory::*;
pub use value::*;
