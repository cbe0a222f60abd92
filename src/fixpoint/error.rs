//! Errors the fixpoint driver surfaces: both
//! are propagated to the caller rather than locally recovered, unlike the
//! policy resolver's [`crate::policy::PolicyError`].

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SearchError {
    /// A template's query failed mid-loop. Raised only after post-unification
    /// has run to completion against whatever patterns were discovered before
    /// the failure.
    TemplateFailed { name: String, detail: String },
    /// Post-unification itself failed; the analysis result is considered
    /// invalid.
    PostUnificationFailed(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::TemplateFailed { name, detail } => write!(f, "query for template {:?} failed: {}", name, detail),
            Self::PostUnificationFailed(detail) => write!(f, "post-unification failed: {}", detail),
        }
    }
}

impl Error for SearchError {}
