//! Relations Module - relation metadata, resolution, constraints, lookup
//! maps, constrained repositories and eager loading

pub mod belongs_to;
pub mod constraint;
pub mod has_and_belongs_to_many;
pub mod has_many;
pub mod has_many_through;
pub mod has_one;
pub mod include;
pub mod lookup;
pub mod metadata;
pub mod resolution;


// Re-export main types
pub use belongs_to::*;
pub use constraint::*;
pub use has_and_belongs_to_many::*;
pub use has_many::*;
pub use has_many_through::*;
pub use has_one::*;
pub use include::*;
pub use lookup::*;
pub use metadata::*;
pub use resolution::*;
