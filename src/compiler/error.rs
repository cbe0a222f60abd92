//! Errors a `GraphStore` backend's query execution can raise while the
//! native engine runs a single template. The
//! in-process [`crate::graph::InMemoryGraph`] never actually fails a query;
//! this type exists so a real Cypher-speaking backend has somewhere to
//! report a failure without the fixpoint driver depending on that backend's
//! error type directly.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineError {
    pub template: String,
    pub detail: String,
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "query for template {:?} failed: {}", self.template, self.detail)
    }
}

impl Error for EngineError {}
