//! Policy Resolver: turns IAM policy documents attached to a
//! resource into conditioned `ACTION` edges in the resource graph.

pub mod condition;
pub mod document;
pub mod error;
pub mod policy;
pub mod principal;
pub mod statement;

pub use document::Document;
pub use error::PolicyError;
pub use policy::{
    grantee_from_group_uri, AclGrant, AclPermission, BucketACL, GranteeKind, IdentityBasedPolicy, Policy,
    ResourceBasedPolicy,
};
pub use principal::{PrincipalMapping, PrincipalSpec};
pub use statement::{Statement, StatementBuilder, StatementResolver};
