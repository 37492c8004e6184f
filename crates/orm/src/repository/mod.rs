//! Repository Layer - lazy repository handles, the CRUD contract, and the
//! default repository bridge over a datasource

pub mod crud;
pub mod getter;
pub mod traits;

pub use crud::*;
pub use getter::*;
pub use traits::*;
