//! A policy `Document`: a `Version` plus one or more [`Statement`]s.

use super::error::PolicyError;
use super::statement::Statement;
use crate::graph::{Edge, GraphStore, NodeId};
use crate::serutil::OneOrMany;
use log::warn;
use serde::Deserialize;

const SUPPORTED_VERSION: &str = "2012-10-17";

#[derive(Clone, Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Statement")]
    statement: OneOrMany<Statement>,
}

#[derive(Clone, Debug)]
pub struct Document {
    pub statements: Vec<Statement>,
}

impl Document {
    /// Parse a raw policy document value. An unsupported or missing
    /// `Version` is rejected outright rather than partially resolved — a
    /// silent no-op here would just defer the failure to every statement
    /// lookup; we surface it once, here.
    pub fn parse(value: &serde_json::Value) -> Result<Self, PolicyError> {
        let raw: RawDocument = serde_json::from_value(value.clone())
            .map_err(|e| PolicyError::MalformedStatement(format!("not a policy document: {}", e)))?;

        if raw.version != SUPPORTED_VERSION {
            return Err(PolicyError::UnsupportedVersion(raw.version));
        }

        Ok(Self { statements: raw.statement.into_vec() })
    }

    /// Resolve every statement against `context_resource`, dropping (and
    /// logging) any statement that fails to resolve rather than aborting the
    /// whole document.
    pub fn resolve(&self, context_resource: NodeId, graph: &mut dyn GraphStore) -> Vec<Edge> {
        let mut edges = Vec::new();
        for statement in &self.statements {
            let resolver = statement.resolver(context_resource);
            match resolver.resolve(graph) {
                Ok(mut resolved) => edges.append(&mut resolved),
                Err(e) => warn!("dropping unresolvable statement: {}", e),
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InMemoryGraph, Node, NodeKind};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse_str(json: &str) -> Result<Document, PolicyError> {
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        Document::parse(&value)
    }

    #[test_log::test]
    fn test_parse_rejects_unsupported_version() {
        let json = indoc! { r#"
        {
            "Version": "2008-10-17",
            "Statement": [{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}]
        }
        "# };
        assert!(matches!(parse_str(json), Err(PolicyError::UnsupportedVersion(_))));
    }

    #[test_log::test]
    fn test_parse_and_resolve_single_statement() {
        let json = indoc! { r#"
        {
            "Version": "2012-10-17",
            "Statement": {
                "Effect": "Allow",
                "Action": "sts:AssumeRole",
                "Resource": "arn:aws:iam::1:role/target"
            }
        }
        "# };
        let doc = parse_str(json).unwrap();
        assert_eq!(doc.statements.len(), 1);

        let mut g = InMemoryGraph::new();
        let bob = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "bob").with_arn("arn:aws:iam::1:user/bob"));
        g.insert_node(
            Node::new(NodeId(0), NodeKind::Resource, "target")
                .with_arn("arn:aws:iam::1:role/target")
                .with_label("AWS::Iam::Role"),
        );

        let edges = doc.resolve(bob, &mut g);
        assert_eq!(edges.len(), 1);
    }

    #[test_log::test]
    fn test_malformed_statement_is_dropped_not_fatal() {
        let value = serde_json::json!({
            "Version": "2012-10-17",
            "Statement": [
                {"Effect": "Allow", "NotPrincipal": {"AWS": "*"}, "Action": "sts:AssumeRole", "Resource": "*"},
                {"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}
            ]
        });
        let doc = Document::parse(&value).unwrap();
        assert_eq!(doc.statements.len(), 2);

        let mut g = InMemoryGraph::new();
        let bucket = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "b"));
        let edges = doc.resolve(bucket, &mut g);
        assert!(edges.iter().all(|e| matches!(&e.kind, crate::graph::EdgeKind::Action { name, .. } if name == "s3:GetObject")));
    }
}
