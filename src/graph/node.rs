//! Node model: `Resource`, `Generic`, and `External` nodes.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Opaque identity for a node within a [`super::store::GraphStore`]. Backends that
/// talk to a real graph database would use the database's internal node id here;
/// [`super::store::InMemoryGraph`] hands out sequential ids.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(pub u64);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// The three node kinds the resource graph distinguishes. `Resource` and `External` are
/// addressable (carry an arn); `Generic` is a placeholder for an
/// as-yet-uncreated instance of a resource type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeKind {
    /// A concrete, account-scoped object discovered by the ingester.
    Resource,
    /// A placeholder standing for any instance of a type that could be created.
    Generic,
    /// A principal outside the analyzed account.
    External,
}

/// The distinguished label granting effective administrator authority.
pub const ADMIN_LABEL: &str = "Admin";

/// Label prefix every concrete AWS resource-type label uses, e.g. `AWS::Iam::Role`.
pub const AWS_LABEL_PREFIX: &str = "AWS::";

/// A node in the resource graph.
///
/// `labels` always contains zero or more `AWS::<Service>::<Kind>` type labels
/// plus, where applicable, the bookkeeping labels `Admin`, `Pattern:<Name>`,
/// and the node-kind label (`Resource`/`Generic`/`External`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub arn: Option<String>,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            arn: None,
            labels: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for label in labels {
            self = self.with_label(label);
        }
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the node's primary type label (`AWS::<Service>::<Kind>`), if any.
    pub fn type_label(&self) -> Option<&str> {
        self.labels.iter().map(String::as_str).find(|l| l.starts_with(AWS_LABEL_PREFIX))
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn is_admin(&self) -> bool {
        self.has_label(ADMIN_LABEL)
    }

    /// The identifier used for cross-referencing during policy resolution:
    /// the arn when present, otherwise the bare name.
    pub fn id_str(&self) -> &str {
        self.arn.as_deref().unwrap_or(&self.name)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.id_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn test_type_label() {
        let n = Node::new(NodeId(1), NodeKind::Resource, "bob")
            .with_arn("arn:aws:iam::123456789012:user/bob")
            .with_label("AWS::Iam::User");
        assert_eq!(n.type_label(), Some("AWS::Iam::User"));
        assert_eq!(n.id_str(), "arn:aws:iam::123456789012:user/bob");
    }

    #[test_log::test]
    fn test_admin_label() {
        let n = Node::new(NodeId(2), NodeKind::Generic, "Effective Admin").with_label(ADMIN_LABEL);
        assert!(n.is_admin());
    }
}
