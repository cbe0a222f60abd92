//! Stage 5 (Extra-constraint processing): evaluates the subset of a
//! template's `Cypher` entries the native engine actually understands.
//!
//! The templates that carry `extra_constraints` use one of a handful of
//! shapes (`IS NULL` checks, access-key-count comparisons, trust-edge
//! existence). Rather than embed a general Cypher
//! interpreter, each is matched by template name against the candidate
//! binding; an unrecognized template name with constraints is treated
//! permissively (logged at `debug`, constraint accepted) rather than
//! silently dropping attacks the engine simply doesn't model numeric
//! constraints for.

use crate::graph::{GraphStore, NodeId};
use log::debug;

/// Bindings gathered so far for one candidate (source, option, target,
/// grant) tuple, as stage 5 needs them to evaluate a constraint.
#[derive(Clone, Copy, Debug)]
pub struct Bindings {
    pub source: NodeId,
    pub option: Option<NodeId>,
    pub target: NodeId,
}

/// Evaluate every `extra_constraints` entry for `template_name` against
/// `bindings`. Returns `true` when the candidate survives (all known
/// constraints satisfied).
pub fn evaluate(template_name: &str, bindings: &Bindings, graph: &dyn GraphStore) -> bool {
    match template_name {
        "AssociateInstanceProfile" => {
            // (${AWS::Iam::InstanceProfile})-[Attached]->(${AWS::Iam::Role}) and
            // (${})-[:TRANSITIVE*..]->()-[iam:PassRole]->(${AWS::Iam::Role}):
            // both already enforced structurally by the dependency/grant
            // expansion that produced `option`/`target`, so there is nothing
            // further to check here beyond bindings being present.
            bindings.option.is_some()
        }
        "AssumeRole" => {
            // (${})<-[:TRUSTS{Name:'sts:AssumeRole'}]-(${AWS::Iam::Role}):
            // the target role must trust the source.
            graph
                .edges_to(bindings.source)
                .into_iter()
                .any(|e| matches!(&e.kind, crate::graph::EdgeKind::Trusts { name } if name == "sts:AssumeRole")
                    && e.source == bindings.target)
        }
        "SetUserLoginProfile" => {
            // ${AWS::Iam::User}.LoginProfile IS NULL
            graph
                .node(bindings.target)
                .map(|n| !n.properties.contains_key("LoginProfile"))
                .unwrap_or(true)
        }
        "CreateUserAccessKey" => access_key_count(graph, bindings.target) < 2,
        "ReplaceUserAccessKey" => access_key_count(graph, bindings.target) > 0,
        _ => {
            debug!("no constraint evaluator registered for {template_name}, accepting candidate");
            true
        }
    }
}

fn access_key_count(graph: &dyn GraphStore, target: NodeId) -> usize {
    graph
        .node(target)
        .and_then(|n| n.properties.get("AccessKeys"))
        .map(|keys| keys.matches("Status").count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InMemoryGraph, Node, NodeKind};

    #[test_log::test]
    fn test_set_user_login_profile_requires_no_existing_profile() {
        let mut g = InMemoryGraph::new();
        let user = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "bob"));
        let bindings = Bindings { source: user, option: None, target: user };
        assert!(evaluate("SetUserLoginProfile", &bindings, &g));

        let mut g2 = InMemoryGraph::new();
        let user2 =
            g2.insert_node(Node::new(NodeId(0), NodeKind::Resource, "bob").with_property("LoginProfile", "set"));
        let bindings2 = Bindings { source: user2, option: None, target: user2 };
        assert!(!evaluate("SetUserLoginProfile", &bindings2, &g2));
    }

    #[test_log::test]
    fn test_create_user_access_key_counts_statuses() {
        let mut g = InMemoryGraph::new();
        let user = g.insert_node(
            Node::new(NodeId(0), NodeKind::Resource, "bob")
                .with_property("AccessKeys", "[{\"Status\":\"Active\"}]"),
        );
        let bindings = Bindings { source: user, option: None, target: user };
        assert!(evaluate("CreateUserAccessKey", &bindings, &g));
        assert!(evaluate("ReplaceUserAccessKey", &bindings, &g));
    }
}
