//! Action Catalog and Resource Typing: immutable reference data
//! consumed read-only by the policy resolver and the attack-pattern search
//! engine.

pub mod actions;
pub mod resources;

pub use actions::{ActionDef, Access, ACTIONS};
pub use resources::{type_of, RESOURCE_TYPES};
