//! A single policy `Statement` and its resolution into `ACTION` edges.
//!
//! Resolution is split into three lazily-memoized projections —
//! `principals()`, `actions()`, `resources()` — plus `resolve()`, which
//! combines all three into edges. Each is cached in a
//! [`OnceCell`] the first time it's asked for, since a [`Statement`] is
//! resolved against exactly one context (the resource its document is
//! attached to, and the graph as ingested so far) and re-deriving the same
//! projection on every call would otherwise re-walk the whole node set.

use super::condition;
use super::error::PolicyError;
use super::principal::{self, PrincipalSpec};
use crate::catalog;
use crate::graph::{ConditionSet, ConditionVariant, Edge, EdgeKind, Effect, GraphStore, NodeId};
use crate::serutil::OneOrMany;
use derive_builder::Builder;
use once_cell::unsync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Statement {
    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Sid", skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(rename = "Effect")]
    pub effect: Effect,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Action", skip_serializing_if = "Option::is_none")]
    pub action: Option<OneOrMany<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "NotAction", skip_serializing_if = "Option::is_none")]
    pub not_action: Option<OneOrMany<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Resource", skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "NotResource", skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<OneOrMany<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalSpec>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "NotPrincipal", skip_serializing_if = "Option::is_none")]
    pub not_principal: Option<PrincipalSpec>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Condition", skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

impl StatementBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.effect.is_none() {
            return Err("missing 'Effect'".to_string());
        }
        if self.action.is_none() && self.not_action.is_none() {
            return Err("missing 'Action'".to_string());
        }
        Ok(())
    }
}

impl Statement {
    pub fn builder() -> StatementBuilder {
        StatementBuilder::default()
    }

    /// Build a resolver bound to the resource this statement's document is
    /// attached to. `context_resource` is the default `Resource` when the
    /// statement omits it.
    pub fn resolver(&self, context_resource: NodeId) -> StatementResolver<'_> {
        StatementResolver {
            statement: self,
            context_resource,
            principals: OnceCell::new(),
            actions: OnceCell::new(),
            resources: OnceCell::new(),
        }
    }
}

fn glob_to_regex(pattern: &str) -> String {
    pattern.split('*').map(regex::escape).collect::<Vec<_>>().join("(?:.*)")
}

/// Converts a resource pattern containing `${aws:...}`-style policy variables
/// into a regex plus the ordered list of variable names it captures.
fn resource_pattern_to_regex(pattern: &str) -> (Regex, Vec<String>) {
    lazy_static::lazy_static! {
        static ref VAR: Regex = Regex::new(r"\$\{[0-9a-zA-Z:]+\}").unwrap();
    }
    let variables: Vec<String> = VAR.find_iter(pattern).map(|m| m.as_str().to_string()).collect();

    let mut rewritten = String::new();
    let mut last = 0;
    for m in VAR.find_iter(pattern) {
        rewritten.push_str(&regex::escape(&pattern[last..m.start()]));
        rewritten.push_str("(.*)");
        last = m.end();
    }
    rewritten.push_str(&regex::escape(&pattern[last..]));
    let rewritten = rewritten.replace(r"\*", "(?:.*)");

    let regex = Regex::new(&format!("^{}$", rewritten)).unwrap_or_else(|_| Regex::new("$^").unwrap());
    (regex, variables)
}

/// Lazily-resolved view of a [`Statement`] against the graph as it stood at
/// the moment resolution began. Each projection memoizes independently, just
/// like the `principals()`/`actions()`/`resources()` methods it mirrors.
pub struct StatementResolver<'s> {
    statement: &'s Statement,
    context_resource: NodeId,
    principals: OnceCell<Vec<NodeId>>,
    actions: OnceCell<Vec<&'static str>>,
    resources: OnceCell<(Vec<NodeId>, BTreeMap<NodeId, ConditionSet>)>,
}

impl<'s> StatementResolver<'s> {
    pub fn principals(&self, graph: &mut dyn GraphStore) -> Result<&[NodeId], PolicyError> {
        if self.principals.get().is_none() {
            let resolved = self.resolve_principals(graph)?;
            let _ = self.principals.set(resolved);
        }
        Ok(self.principals.get().expect("just set"))
    }

    pub fn actions(&self) -> Result<&[&'static str], PolicyError> {
        if self.actions.get().is_none() {
            let resolved = self.resolve_actions()?;
            let _ = self.actions.set(resolved);
        }
        Ok(self.actions.get().expect("just set"))
    }

    pub fn resources(
        &self,
        graph: &dyn GraphStore,
    ) -> Result<(&[NodeId], &BTreeMap<NodeId, ConditionSet>), PolicyError> {
        if self.resources.get().is_none() {
            let resolved = self.resolve_resources(graph)?;
            let _ = self.resources.set(resolved);
        }
        let (ids, conditions) = self.resources.get().expect("just set");
        Ok((ids, conditions))
    }

    fn resolve_principals(&self, graph: &mut dyn GraphStore) -> Result<Vec<NodeId>, PolicyError> {
        if self.statement.not_principal.is_some() {
            return Err(PolicyError::MalformedStatement("'NotPrincipal' is not supported".to_string()));
        }
        match &self.statement.principal {
            None => Ok(vec![self.context_resource]),
            Some(p) => principal::resolve(p, graph),
        }
    }

    fn resolve_actions(&self) -> Result<Vec<&'static str>, PolicyError> {
        let (key_is_not, spec) = match (&self.statement.action, &self.statement.not_action) {
            (Some(a), None) => (false, a),
            (None, Some(a)) => (true, a),
            _ => return Err(PolicyError::MalformedStatement("missing 'Action'".to_string())),
        };

        let patterns = spec.to_vec();
        if patterns.iter().any(|p| p.as_str() == "*") {
            return Ok(if key_is_not {
                Vec::new()
            } else {
                catalog::ACTIONS.keys().copied().collect()
            });
        }

        let mut matched: Vec<&'static str> = Vec::new();
        for pattern in patterns {
            if pattern.contains('*') {
                let regex = Regex::new(&format!("^{}$", glob_to_regex(pattern))).map_err(|e| {
                    PolicyError::MalformedStatement(format!("bad action glob {:?}: {}", pattern, e))
                })?;
                for name in catalog::ACTIONS.keys() {
                    if regex.is_match(name) && !matched.contains(name) {
                        matched.push(name);
                    }
                }
            } else if let Some((name, _)) = catalog::ACTIONS.get_key_value(pattern.as_str()) {
                if !matched.contains(name) {
                    matched.push(name);
                }
            }
        }

        if key_is_not {
            matched = catalog::ACTIONS.keys().copied().filter(|a| !matched.contains(a)).collect();
        }

        matched.sort_unstable();
        Ok(matched)
    }

    fn resolve_resources(
        &self,
        graph: &dyn GraphStore,
    ) -> Result<(Vec<NodeId>, BTreeMap<NodeId, ConditionSet>), PolicyError> {
        let (key_is_not, spec) = match (&self.statement.resource, &self.statement.not_resource) {
            (Some(r), None) => (false, Some(r)),
            (None, Some(r)) => (true, Some(r)),
            (None, None) => (false, None),
            (Some(_), Some(_)) => {
                return Err(PolicyError::MalformedStatement("both 'Resource' and 'NotResource' present".to_string()))
            }
        };

        let Some(spec) = spec else {
            // Statement omitted `Resource`: defaults to the attached resource
            // with no per-resource condition variant.
            let mut conditions = BTreeMap::new();
            conditions.insert(self.context_resource, ConditionSet(vec![ConditionVariant::new()]));
            return Ok((vec![self.context_resource], conditions));
        };

        let patterns = spec.to_vec();
        if patterns.iter().any(|p| p.as_str() == "*") {
            let ids: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
            return Ok((ids, BTreeMap::new()));
        }

        let mut conditions: BTreeMap<NodeId, Vec<ConditionVariant>> = BTreeMap::new();
        let mut matched: Vec<NodeId> = Vec::new();

        for pattern in patterns {
            let (regex, variables) = resource_pattern_to_regex(pattern);
            for node in graph.nodes() {
                let id_str = node.id_str();
                if !regex.is_match(id_str) {
                    continue;
                }
                if !matched.contains(&node.id) {
                    matched.push(node.id);
                }

                if variables.is_empty() {
                    conditions.entry(node.id).or_default();
                    continue;
                }

                let captures = regex.captures(id_str).expect("just matched");
                let bindings: Vec<(String, String)> = variables
                    .iter()
                    .enumerate()
                    .map(|(i, var)| (var.clone(), captures.get(i + 1).map(|m| m.as_str()).unwrap_or("").to_string()))
                    .collect();
                let variant = condition::string_equals_variant(&bindings);
                let entry = conditions.entry(node.id).or_default();
                if !entry.contains(&variant) {
                    entry.push(variant);
                }
            }
        }

        if key_is_not {
            matched = graph.nodes().iter().map(|n| n.id).filter(|id| !matched.contains(id)).collect();
            conditions.clear();
        }

        let conditions = matched
            .iter()
            .map(|id| {
                let variants = conditions.remove(id).filter(|v| !v.is_empty()).unwrap_or_else(|| vec![ConditionVariant::new()]);
                (*id, ConditionSet(variants))
            })
            .collect();

        Ok((matched, conditions))
    }

    /// Combine principals, actions, and resources into `ACTION` edges, merging
    /// any newly-discovered principal nodes into `graph` first (
    /// step 5). This is `resolve()`: each action only applies to resources
    /// whose type is in that action's `Affects` list.
    pub fn resolve(&self, graph: &mut dyn GraphStore) -> Result<Vec<Edge>, PolicyError> {
        let principals = self.resolve_principals(graph)?;
        let _ = self.principals.set(principals.clone());

        let actions = self.actions()?.to_vec();
        let (resource_ids, resource_conditions) = self.resolve_resources(&*graph)?;

        let explicit = condition::parse_explicit(self.statement.condition.as_ref());
        let effect = self.statement.effect;

        let mut edges = Vec::new();
        for action in &actions {
            let Some(def) = catalog::ACTIONS.get(action) else { continue };
            for &resource_id in &resource_ids {
                if !affects_resource(graph, resource_id, def.affects) {
                    continue;
                }

                let variants = match resource_conditions.get(&resource_id) {
                    Some(set) if !set.is_empty() => {
                        set.0.iter().map(|variant| condition::merge(variant, &explicit)).collect()
                    }
                    _ => {
                        if explicit.is_empty() {
                            Vec::new()
                        } else {
                            vec![explicit.clone()]
                        }
                    }
                };

                for &principal_id in &principals {
                    edges.push(Edge::new(
                        principal_id,
                        resource_id,
                        EdgeKind::Action {
                            name: (*action).to_string(),
                            effect,
                            access: def.access.as_str().to_string(),
                            condition: ConditionSet(variants.clone()),
                        },
                    ));
                }
            }
        }

        Ok(edges)
    }
}

fn affects_resource(graph: &dyn GraphStore, id: NodeId, affects: &[&str]) -> bool {
    match graph.node(id) {
        Some(node) => node.type_label().map(|t| affects.contains(&t)).unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InMemoryGraph, Node, NodeKind};
    use pretty_assertions::assert_eq;

    fn user(graph: &mut InMemoryGraph, name: &str, arn: &str) -> NodeId {
        graph.insert_node(Node::new(NodeId(0), NodeKind::Resource, name).with_arn(arn).with_label("AWS::Iam::User"))
    }

    fn policy_node(graph: &mut InMemoryGraph, arn: &str) -> NodeId {
        graph.insert_node(Node::new(NodeId(0), NodeKind::Resource, "p").with_arn(arn).with_label("AWS::Iam::Policy"))
    }

    #[test_log::test]
    fn test_resolve_simple_statement_produces_action_edge() {
        let mut g = InMemoryGraph::new();
        let bob = user(&mut g, "bob", "arn:aws:iam::1:user/bob");
        let policy = policy_node(&mut g, "arn:aws:iam::1:policy/target");

        let stmt = Statement::builder()
            .effect(Effect::Allow)
            .action(OneOrMany::One("iam:CreatePolicyVersion".to_string()))
            .resource(OneOrMany::One("arn:aws:iam::1:policy/target".to_string()))
            .build()
            .unwrap();

        let resolver = stmt.resolver(bob);
        let edges = resolver.resolve(&mut g).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, bob);
        assert_eq!(edges[0].target, policy);
        assert!(matches!(&edges[0].kind, EdgeKind::Action { name, .. } if name == "iam:CreatePolicyVersion"));
    }

    #[test_log::test]
    fn test_resolve_skips_resources_of_wrong_type() {
        let mut g = InMemoryGraph::new();
        let bob = user(&mut g, "bob", "arn:aws:iam::1:user/bob");
        let other_user = user(&mut g, "alice", "arn:aws:iam::1:user/alice");

        let stmt = Statement::builder()
            .effect(Effect::Allow)
            .action(OneOrMany::One("iam:CreatePolicyVersion".to_string()))
            .resource(OneOrMany::One("*".to_string()))
            .build()
            .unwrap();

        let resolver = stmt.resolver(bob);
        let edges = resolver.resolve(&mut g).unwrap();
        assert!(edges.iter().all(|e| e.target != other_user));
    }

    #[test_log::test]
    fn test_resolve_missing_resource_defaults_to_context() {
        let mut g = InMemoryGraph::new();
        let role = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "r").with_arn("arn:aws:iam::1:role/r").with_label("AWS::Iam::Role"));

        let stmt = Statement::builder()
            .effect(Effect::Allow)
            .action(OneOrMany::One("sts:AssumeRole".to_string()))
            .principal(PrincipalSpec::Wildcard("*".to_string()))
            .build()
            .unwrap();

        let resolver = stmt.resolver(role);
        let (resources, _) = resolver.resources(&g).unwrap();
        assert_eq!(resources, &[role]);
    }

    #[test_log::test]
    fn test_not_principal_is_rejected() {
        let mut g = InMemoryGraph::new();
        let bob = user(&mut g, "bob", "arn:aws:iam::1:user/bob");

        let stmt = Statement::builder()
            .effect(Effect::Allow)
            .action(OneOrMany::One("sts:AssumeRole".to_string()))
            .not_principal(PrincipalSpec::Wildcard("*".to_string()))
            .build()
            .unwrap();

        let resolver = stmt.resolver(bob);
        let err = resolver.resolve(&mut g).unwrap_err();
        assert!(matches!(err, PolicyError::MalformedStatement(_)));
    }

    #[test_log::test]
    fn test_resource_variable_produces_string_equals_condition() {
        let mut g = InMemoryGraph::new();
        let bob = user(&mut g, "bob", "arn:aws:iam::1:user/bob");

        let stmt = Statement::builder()
            .effect(Effect::Allow)
            .action(OneOrMany::One("iam:CreateAccessKey".to_string()))
            .resource(OneOrMany::One("arn:aws:iam::1:user/${aws:username}".to_string()))
            .build()
            .unwrap();

        let resolver = stmt.resolver(bob);
        let edges = resolver.resolve(&mut g).unwrap();
        assert_eq!(edges.len(), 1);
        let EdgeKind::Action { condition, .. } = &edges[0].kind else { panic!("expected Action edge") };
        assert!(!condition.is_empty());
        assert_eq!(condition.0[0]["StringEquals"]["${aws:username}"], serde_json::json!("bob"));
    }
}
