//! `Policy` and its three shapes: identity-based, resource-based, and S3
//! Bucket ACLs translated into an equivalent resource-based policy.

use super::document::Document;
use crate::graph::{Edge, GraphStore, NodeId};
use log::warn;
use std::collections::BTreeMap;

/// Common behavior over a policy's documents: resolve every document against
/// the resource the policy is attached to and concatenate the resulting
/// `ACTION` edges.
pub trait Policy {
    fn documents(&self) -> &BTreeMap<String, Document>;

    fn len(&self) -> usize {
        self.documents().len()
    }

    fn is_empty(&self) -> bool {
        self.documents().is_empty()
    }

    fn resolve(&self, context_resource: NodeId, graph: &mut dyn GraphStore) -> Vec<Edge> {
        let mut edges = Vec::new();
        for document in self.documents().values() {
            edges.extend(document.resolve(context_resource, graph));
        }
        edges
    }
}

fn parse_raw_documents(raw: &BTreeMap<String, serde_json::Value>, keys: &[&str]) -> BTreeMap<String, Document> {
    let mut documents = BTreeMap::new();
    for (name, value) in raw {
        if !keys.is_empty() && !keys.contains(&name.as_str()) {
            continue;
        }
        match Document::parse(value) {
            Ok(doc) if !doc.statements.is_empty() => {
                documents.insert(name.clone(), doc);
            }
            Ok(_) => {}
            Err(e) => warn!("dropping policy document {:?}: {}", name, e),
        }
    }
    documents
}

/// Inline and managed policies attached to a user/group/role
/// (`AssumeRolePolicyDocument`, `Policies`, `AttachedManagedPolicies`, ...).
#[derive(Clone, Debug, Default)]
pub struct IdentityBasedPolicy {
    documents: BTreeMap<String, Document>,
}

impl IdentityBasedPolicy {
    /// `raw` maps a document name (e.g. a managed policy's arn, or
    /// `"AssumeRolePolicyDocument"`) to its parsed JSON body.
    pub fn new(raw: &BTreeMap<String, serde_json::Value>) -> Self {
        Self { documents: parse_raw_documents(raw, &[]) }
    }
}

impl Policy for IdentityBasedPolicy {
    fn documents(&self) -> &BTreeMap<String, Document> {
        &self.documents
    }
}

/// Policies attached directly to a resource (S3 bucket policy, KMS key
/// policy, SNS topic policy, ...). `keys` restricts which of the resource's
/// raw properties are interpreted as policy documents; empty means "all of
/// them, if they parse".
#[derive(Clone, Debug, Default)]
pub struct ResourceBasedPolicy {
    documents: BTreeMap<String, Document>,
}

impl ResourceBasedPolicy {
    pub fn new(raw: &BTreeMap<String, serde_json::Value>, keys: &[&str]) -> Self {
        Self { documents: parse_raw_documents(raw, keys) }
    }
}

impl Policy for ResourceBasedPolicy {
    fn documents(&self) -> &BTreeMap<String, Document> {
        &self.documents
    }
}

/// S3 bucket/object ACL grantee, narrowed to the shapes `Grantee.Type`
/// actually takes. `AuthenticatedUsers` and `AllUsers` both resolve to the
/// same `{"AWS": "*"}` principal today, but are kept as distinct variants so
/// a caller inspecting a `BucketACL`'s grants can still tell "any AWS
/// account" apart from "the public internet".
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GranteeKind {
    CanonicalUser(String),
    /// The predefined group URI ending in `AuthenticatedUsers`: any AWS account.
    AuthenticatedUsers,
    /// The predefined group URI ending in `AllUsers`: unauthenticated, public internet.
    AllUsers,
    /// The predefined group URI ending in `LogDelivery`.
    LogDelivery,
    /// A specific account/canonical-user URI that doesn't match a known group.
    Other(String),
}

impl GranteeKind {
    fn from_group_uri(uri: &str) -> Self {
        match uri.rsplit('/').next().unwrap_or(uri) {
            "AuthenticatedUsers" => Self::AuthenticatedUsers,
            "AllUsers" => Self::AllUsers,
            "LogDelivery" => Self::LogDelivery,
            _ => Self::Other(uri.to_string()),
        }
    }

    fn principal_json(&self) -> serde_json::Value {
        match self {
            Self::CanonicalUser(id) => serde_json::json!({"CanonicalUser": id}),
            Self::AuthenticatedUsers | Self::AllUsers => serde_json::json!({"AWS": "*"}),
            Self::LogDelivery => serde_json::json!({"Service": "logging.s3.amazonaws.com"}),
            Self::Other(uri) => serde_json::json!({"AWS": uri}),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AclPermission {
    Read,
    Write,
    ReadAcp,
    WriteAcp,
    FullControl,
}

impl AclPermission {
    fn actions(&self) -> &'static [&'static str] {
        match self {
            Self::Read => &["s3:ListBucket", "s3:ListBucketVersions", "s3:ListBucketMultipartUploads"],
            Self::Write => &["s3:PutObject", "s3:DeleteObject"],
            Self::ReadAcp => &["s3:GetBucketAcl"],
            Self::WriteAcp => &["s3:PutBucketAcl"],
            Self::FullControl => &[
                "s3:DeleteObject",
                "s3:GetBucketAcl",
                "s3:ListBucket",
                "s3:ListBucketMultipartUploads",
                "s3:ListBucketVersions",
                "s3:PutBucketAcl",
                "s3:PutObject",
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct AclGrant {
    pub grantee: GranteeKind,
    pub permission: AclPermission,
}

/// A bucket or object Access Control List, re-expressed as an equivalent
/// resource-based policy so it resolves through the same `Document`/`Statement`
/// machinery as every other policy shape.
#[derive(Clone, Debug, Default)]
pub struct BucketACL {
    documents: BTreeMap<String, Document>,
}

impl BucketACL {
    pub fn new(bucket_arn: &str, grants: &[AclGrant]) -> Self {
        if grants.is_empty() {
            return Self::default();
        }

        let statements: Vec<serde_json::Value> = grants
            .iter()
            .map(|grant| {
                serde_json::json!({
                    "Effect": "Allow",
                    "Principal": grant.grantee.principal_json(),
                    "Action": grant.permission.actions(),
                    "Resource": [bucket_arn.to_string(), format!("{}/*", bucket_arn)],
                })
            })
            .collect();

        let synthetic = serde_json::json!({
            "Version": "2012-10-17",
            "Statement": statements,
        });

        match Document::parse(&synthetic) {
            Ok(doc) => {
                let mut documents = BTreeMap::new();
                documents.insert("_".to_string(), doc);
                Self { documents }
            }
            Err(e) => {
                warn!("failed to synthesize bucket ACL policy for {}: {}", bucket_arn, e);
                Self::default()
            }
        }
    }
}

impl Policy for BucketACL {
    fn documents(&self) -> &BTreeMap<String, Document> {
        &self.documents
    }
}

pub fn grantee_from_group_uri(uri: &str) -> GranteeKind {
    GranteeKind::from_group_uri(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InMemoryGraph, Node, NodeKind};
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn test_grantee_from_group_uri_distinguishes_public_groups() {
        assert_eq!(
            grantee_from_group_uri("http://acs.amazonaws.com/groups/global/AllUsers"),
            GranteeKind::AllUsers
        );
        assert_eq!(
            grantee_from_group_uri("http://acs.amazonaws.com/groups/global/AuthenticatedUsers"),
            GranteeKind::AuthenticatedUsers
        );
    }

    #[test_log::test]
    fn test_bucket_acl_all_users_read_resolves_to_wildcard_principal() {
        let mut g = InMemoryGraph::new();
        let bucket = g.insert_node(
            Node::new(NodeId(0), NodeKind::Resource, "my-bucket")
                .with_arn("arn:aws:s3:::my-bucket")
                .with_label("AWS::S3::Bucket"),
        );

        let acl = BucketACL::new(
            "arn:aws:s3:::my-bucket",
            &[AclGrant { grantee: GranteeKind::AllUsers, permission: AclPermission::Read }],
        );
        assert_eq!(acl.len(), 1);

        let edges = acl.resolve(bucket, &mut g);
        assert!(edges.iter().any(|e| matches!(&e.kind,
            crate::graph::EdgeKind::Action { name, .. } if name == "s3:ListBucket")));
    }

    #[test_log::test]
    fn test_identity_based_policy_skips_malformed_document() {
        let mut raw = BTreeMap::new();
        raw.insert("bad".to_string(), serde_json::json!({"Version": "2008-10-17", "Statement": []}));
        let policy = IdentityBasedPolicy::new(&raw);
        assert!(policy.is_empty());
    }
}
