//! Pattern Compiler: turns a declarative [`crate::templates::AttackTemplate`]
//! into the ten-stage query that discovers every (source, target,
//! intermediate-options, granted-capability, command-sequence) tuple
//! satisfying the template's preconditions.
//!
//! Two cooperating halves, both built from the same template/placeholder
//! inputs so they can never drift apart: [`query::PatternCompiler`] renders
//! the stage pipeline as a [`query::CypherQuery`] for a real Cypher-speaking
//! graph database; [`engine::NativeEngine`] evaluates the identical stages
//! directly against an in-process [`crate::graph::GraphStore`], which is what
//! this crate's own tests and [`crate::fixpoint::FixpointDriver`] run against.

pub mod constraint;
pub mod engine;
pub mod error;
pub mod query;

pub use engine::NativeEngine;
pub use error::EngineError;
pub use query::{Clause, CypherQuery, PatternCompiler};
