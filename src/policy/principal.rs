//! `Principal`/`NotPrincipal` shapes and their resolution against
//! the resource graph.
//!
//! `NotPrincipal` is deliberately unsupported: AWS itself discourages it
//! ("Principal" combined with "Deny" is almost always what a document author
//! meant), and guessing at its intended scope risks silently widening an
//! attacker's reach. [`PolicyError::MalformedStatement`] identifies it for
//! the caller, who drops the statement and moves on.

use super::error::PolicyError;
use crate::catalog;
use crate::graph::{GraphStore, Node, NodeId, NodeKind};
use crate::serutil::OneOrMany;
use serde::{Deserialize, Serialize};

/// The raw shape of a `Principal`/`NotPrincipal` block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrincipalSpec {
    /// The bare string form, `"Principal": "*"`.
    Wildcard(String),
    Mapping(PrincipalMapping),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrincipalMapping {
    #[serde(rename = "AWS", skip_serializing_if = "Option::is_none")]
    pub aws: Option<OneOrMany<String>>,
    #[serde(rename = "Service", skip_serializing_if = "Option::is_none")]
    pub service: Option<OneOrMany<String>>,
    #[serde(rename = "Federated", skip_serializing_if = "Option::is_none")]
    pub federated: Option<String>,
    #[serde(rename = "CanonicalUser", skip_serializing_if = "Option::is_none")]
    pub canonical_user: Option<String>,
}

const ACCOUNT_ROOT_TEMPLATE: &str = "arn:aws:iam::{}:root";

/// Resolve a `Principal` block into the node ids it denotes, creating
/// `External` nodes for arns the graph has never seen. `Service`
/// principals are intentionally not materialized as nodes — a service isn't a
/// principal that can itself be escalated into, so it contributes nothing to
/// the search space.
pub fn resolve(spec: &PrincipalSpec, graph: &mut dyn GraphStore) -> Result<Vec<NodeId>, PolicyError> {
    let mapping = match spec {
        PrincipalSpec::Wildcard(s) if s == "*" => {
            return Ok(resolve_wildcard(graph));
        }
        PrincipalSpec::Wildcard(other) => {
            return Err(PolicyError::UnknownPrincipalShape(format!("bare principal string {:?}", other)));
        }
        PrincipalSpec::Mapping(m) => m,
    };

    if let Some(aws) = &mapping.aws {
        return Ok(resolve_aws(aws, graph));
    }
    if mapping.service.is_some() {
        return Ok(Vec::new());
    }
    if let Some(federated) = &mapping.federated {
        return Ok(vec![resolve_federated(federated, graph)]);
    }
    if let Some(canonical_user) = &mapping.canonical_user {
        return Ok(vec![resolve_canonical_user(canonical_user, graph)]);
    }

    Err(PolicyError::UnknownPrincipalShape("empty Principal mapping".to_string()))
}

fn resolve_wildcard(graph: &mut dyn GraphStore) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = graph
        .nodes()
        .iter()
        .filter(|n| n.has_label("AWS::Iam::User") || n.has_label("AWS::Iam::Role"))
        .map(|n| n.id)
        .collect();

    let account_root = Node::new(NodeId(0), NodeKind::External, "All AWS Accounts")
        .with_arn("arn:aws:iam::{Account}:root")
        .with_label("AWS::Account");
    let (id, _) = graph.merge_node(account_root);
    ids.push(id);
    ids
}

fn resolve_aws(aws: &OneOrMany<String>, graph: &mut dyn GraphStore) -> Vec<NodeId> {
    let arns = aws.to_vec();
    if arns.iter().any(|a| a.as_str() == "*") {
        return resolve_wildcard(graph);
    }

    let mut ids = Vec::new();
    for arn in arns {
        if arn.contains('*') {
            continue;
        }
        if let Some(node) = graph.find_by_arn(arn) {
            ids.push(node.id);
            continue;
        }
        ids.push(materialize_unseen_principal(arn, graph));
    }
    ids
}

/// The account id or full root-arn shape is special-cased because it denotes
/// "every principal in that account", which the resolved graph cannot
/// enumerate on its own.
fn materialize_unseen_principal(arn: &str, graph: &mut dyn GraphStore) -> NodeId {
    if let Some(account) = catalog::RESOURCE_TYPES.get("AWS::Account") {
        if account.is_match(arn) {
            let node = Node::new(NodeId(0), NodeKind::External, arn)
                .with_arn(ACCOUNT_ROOT_TEMPLATE.replace("{}", arn))
                .with_label("AWS::Account");
            return graph.merge_node(node).0;
        }
    }

    let root_regex = format!("^arn:aws:iam::{}:root$", r"\d{12}");
    if regex::Regex::new(&root_regex).map(|r| r.is_match(arn)).unwrap_or(false) {
        let account = arn.split(':').nth(4).unwrap_or(arn);
        let node = Node::new(NodeId(0), NodeKind::External, account).with_arn(arn).with_label("AWS::Account");
        return graph.merge_node(node).0;
    }

    let label = catalog::resources::type_of(arn);
    let name = arn.replace('/', ":").rsplit(':').next().unwrap_or(arn).to_string();
    let mut node = Node::new(NodeId(0), NodeKind::External, name).with_arn(arn);
    if let Some(label) = label {
        node = node.with_label(label);
    }
    graph.merge_node(node).0
}

fn resolve_federated(federated: &str, graph: &mut dyn GraphStore) -> NodeId {
    if let Some(saml) = catalog::RESOURCE_TYPES.get("AWS::Iam::SamlProvider") {
        if saml.is_match(federated) {
            let name = federated.rsplit('/').next().unwrap_or(federated);
            let node = Node::new(NodeId(0), NodeKind::External, name)
                .with_arn(federated)
                .with_label("AWS::Iam::SamlProvider");
            return graph.merge_node(node).0;
        }
    }
    let node = Node::new(NodeId(0), NodeKind::External, federated).with_label("Internet::Domain");
    graph.merge_node(node).0
}

fn resolve_canonical_user(canonical_user: &str, graph: &mut dyn GraphStore) -> NodeId {
    let node = Node::new(NodeId(0), NodeKind::External, canonical_user)
        .with_label("AWS::Account")
        .with_property("CanonicalUser", canonical_user);
    graph.merge_node(node).0
}
