//! Errors the Policy Resolver can raise; all are locally recovered: the
//! offending statement is dropped and resolution continues with the
//! remainder of the document.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PolicyError {
    /// Missing required keys, wrong types, or present-but-unsupported keys
    /// (e.g. `NotPrincipal`) in a statement.
    MalformedStatement(String),
    /// A `Principal`/`NotPrincipal` shape that does not match any of the
    /// documented variants (`AWS`, `Service`, `Federated`, `CanonicalUser`).
    UnknownPrincipalShape(String),
    /// The document's `Version` was missing or not `"2012-10-17"`.
    UnsupportedVersion(String),
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::MalformedStatement(detail) => write!(f, "malformed statement: {}", detail),
            Self::UnknownPrincipalShape(detail) => write!(f, "unknown principal shape: {}", detail),
            Self::UnsupportedVersion(version) => write!(f, "unsupported policy version: {}", version),
        }
    }
}

impl Error for PolicyError {}
