//! Edge model: `ACTION`, `TRUSTS`, `TRANSITIVE`, `ATTACK`, `CREATE`, `OPTION`,
//! `ADMIN`.

use super::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Effect of an `ACTION` edge.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Display for Effect {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Deny => f.write_str("Deny"),
        }
    }
}

/// A single condition-block variant, e.g. `{"StringEquals": {"aws:username":
/// "bob"}}`. Preserved verbatim and treated opaquely by the search engine;
/// the resolver only ever merges and serializes these. The inner value is
/// `serde_json::Value` rather than `String` because an explicit `Condition`
/// block may bind a key to a list of values.
pub type ConditionVariant = BTreeMap<String, serde_json::Value>;

/// The `Condition` list attached to an `ACTION` edge: zero or more OR-combined
/// variants. `is_empty()` corresponds to the `"[]"` JSON sentinel stored on
/// an `ACTION` edge when a statement carried no `Condition`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConditionSet(pub Vec<ConditionVariant>);

impl ConditionSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize the way statement resolution's `resolve()` expects: `"[]"`
    /// when empty, otherwise the JSON array of variants.
    pub fn to_json(&self) -> String {
        if self.0.is_empty() {
            "[]".to_string()
        } else {
            serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
        }
    }

    pub fn from_json(s: &str) -> Self {
        match serde_json::from_str::<Vec<ConditionVariant>>(s) {
            Ok(variants) => Self(variants),
            Err(_) => Self::empty(),
        }
    }
}

/// The different edge kinds carried in the resource graph.
#[derive(Clone, Debug, PartialEq)]
pub enum EdgeKind {
    /// Principal may invoke `name` on the target.
    Action { name: String, effect: Effect, access: String, condition: ConditionSet },
    /// Role trust-policy edge.
    Trusts { name: String },
    /// Structural edge placed by the ingester (Attached, MemberOf, Contains, ...).
    Transitive { name: String },
    /// Source can execute attack pattern `name`.
    Attack { name: String, admin: bool },
    /// Variant of `Attack` whose outcome instantiates a `Generic`.
    Create { name: String },
    /// Pattern requires this dependency node.
    Option { weight: usize, commands: Vec<String> },
    /// Post-unification rewrite of an `Attack` edge ending at the admin pseudo-node.
    Admin,
}

impl EdgeKind {
    /// The discriminant name, as it would appear in a Cypher `[:NAME]` pattern.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Action { .. } => "ACTION",
            Self::Trusts { .. } => "TRUSTS",
            Self::Transitive { .. } => "TRANSITIVE",
            Self::Attack { .. } => "ATTACK",
            Self::Create { .. } => "CREATE",
            Self::Option { .. } => "OPTION",
            Self::Admin => "ADMIN",
        }
    }
}

/// A directed edge between two nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    /// `Description`/`Descriptions`, `Commands`, `Weight`, `Option` (node id),
    /// and any other edge properties that don't warrant their own field.
    pub properties: BTreeMap<String, String>,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, kind: EdgeKind) -> Self {
        Self { source, target, kind, properties: BTreeMap::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn test_condition_set_empty_sentinel() {
        assert_eq!(ConditionSet::empty().to_json(), "[]");
    }

    #[test_log::test]
    fn test_condition_set_round_trip() {
        let mut variant = ConditionVariant::new();
        variant.insert("StringEquals".to_string(), serde_json::json!({"aws:username": "bob"}));
        let set = ConditionSet(vec![variant]);
        let json = set.to_json();
        let round_tripped = ConditionSet::from_json(&json);
        assert_eq!(set, round_tripped);
    }

    #[test_log::test]
    fn test_edge_label() {
        let e = Edge::new(
            NodeId(1),
            NodeId(2),
            EdgeKind::Action {
                name: "iam:CreatePolicyVersion".into(),
                effect: Effect::Allow,
                access: "Write".into(),
                condition: ConditionSet::empty(),
            },
        );
        assert_eq!(e.kind.label(), "ACTION");
    }
}
