//! Attack Template Schema: the declarative table the Pattern
//! Compiler turns into graph queries.

pub mod definitions;
pub mod placeholder;
pub mod schema;

pub use definitions::{get, TEMPLATES};
pub use placeholder::{parse_command, CommandPlaceholder, Placeholder};
pub use schema::AttackTemplate;
