//! Fixpoint Driver: the iterative computation that discovers
//! `ATTACK`/`CREATE`/`OPTION`/`ADMIN` edges by re-running every attack
//! template's compiled query until one full pass over the template table
//! creates nothing new.

mod error;

pub use error::SearchError;

use crate::compiler::NativeEngine;
use crate::config::AnalysisConfig;
use crate::graph::{Edge, EdgeKind, GraphStore, Node, NodeId, NodeKind, QuerySummary, ADMIN_LABEL};
use crate::templates;
use log::{debug, warn};

const EFFECTIVE_ADMIN_NAME: &str = "Effective Admin";
const EFFECTIVE_ADMIN_ARN: &str = "awspx:pseudo:effective-admin";
const IAM_POLICY_TYPE: &str = "AWS::Iam::Policy";

/// Summary of one `FixpointDriver::run` call: how many iterations it took to
/// converge (or whether it was cut short by `max_iterations` or a failed
/// template), and the total creation counts across the whole run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AnalysisReport {
    pub iterations_run: usize,
    pub converged: bool,
    pub total_nodes_created: usize,
    pub total_relationships_created: usize,
}

/// The admin-synthesis-and-search loop described in . Holds no
/// state of its own between runs — everything persists in the `GraphStore`,
/// matching 's "the driver holds no locks; it assumes exclusive write
/// access to the graph during analysis."
#[derive(Clone, Copy, Debug, Default)]
pub struct FixpointDriver;

impl FixpointDriver {
    pub fn new() -> Self {
        Self
    }

    /// Run the full fixpoint sequence: delete stale patterns, synthesize the
    /// admin pseudo-node, temporarily promote Generic policies to Admin, loop
    /// every template to convergence (or `max_iterations`/a query failure),
    /// then post-unify. A template failure is recorded and the loop aborted,
    /// but post-unification always runs against whatever was discovered
    /// before returning the error.
    pub fn run(&self, graph: &mut dyn GraphStore, config: &AnalysisConfig) -> Result<AnalysisReport, SearchError> {
        graph.delete_patterns_and_admin_edges();
        let admin_node = self.create_effective_admin(graph);
        let generic_policy_ids = self.label_generic_policies_admin(graph);

        let mut report = AnalysisReport::default();
        let mut failed: Option<String> = None;

        for iteration in 0..config.max_iterations() {
            let mut iteration_summary = QuerySummary::default();
            let mut aborted = false;

            for template in templates::TEMPLATES.iter() {
                if !config.should_run(template.name) {
                    continue;
                }
                match NativeEngine::run_template(graph, template, config) {
                    Ok(summary) => iteration_summary.merge(&summary),
                    Err(e) => {
                        warn!("template {:?} failed on iteration {}: {}", template.name, iteration, e);
                        failed = Some(template.name.to_string());
                        aborted = true;
                        break;
                    }
                }
            }

            report.iterations_run += 1;
            report.total_nodes_created += iteration_summary.nodes_created;
            report.total_relationships_created += iteration_summary.relationships_created;

            if aborted {
                break;
            }
            if iteration_summary.total_created() == 0 {
                debug!("fixpoint converged after {} iteration(s)", report.iterations_run);
                report.converged = true;
                break;
            }
        }

        self.post_unify(graph, admin_node, &generic_policy_ids);

        match failed {
            Some(name) => Err(SearchError::TemplateFailed { name, detail: "query execution failed".to_string() }),
            None => Ok(report),
        }
    }

    /// Step 2: the synthetic terminus of every admin-granting path.
    fn create_effective_admin(&self, graph: &mut dyn GraphStore) -> NodeId {
        let node = Node::new(NodeId(0), NodeKind::Generic, EFFECTIVE_ADMIN_NAME)
            .with_arn(EFFECTIVE_ADMIN_ARN)
            .with_label(ADMIN_LABEL)
            .with_label(IAM_POLICY_TYPE);
        graph.merge_node(node).0
    }

    /// Step 3: reaching the ability to create a policy implies admin, so
    /// every not-yet-created `Generic` policy is temporarily admin-labeled
    /// for the duration of this run.
    fn label_generic_policies_admin(&self, graph: &mut dyn GraphStore) -> Vec<NodeId> {
        let ids: Vec<NodeId> = graph
            .nodes()
            .iter()
            .filter(|n| n.kind == NodeKind::Generic && n.has_label(IAM_POLICY_TYPE) && n.name != EFFECTIVE_ADMIN_NAME)
            .map(|n| n.id)
            .collect();
        for &id in &ids {
            graph.add_label(id, ADMIN_LABEL);
        }
        ids
    }

    fn post_unify(&self, graph: &mut dyn GraphStore, admin_node: NodeId, generic_policy_ids: &[NodeId]) {
        self.unify_admin_generics(graph, generic_policy_ids);
        self.flatten_admin_patterns(graph, admin_node);
        self.collect_descriptions(graph);
    }

    /// 5a: rewrite `Pattern-[e]->Admin-labeled-generic-policy` as `-[:ADMIN]->`,
    /// preserving properties, then drop the temporary `Admin` label from the
    /// generic policies whose edge was rewritten.
    fn unify_admin_generics(&self, graph: &mut dyn GraphStore, generic_policy_ids: &[NodeId]) {
        let mut rewritten_targets = Vec::new();
        for edge in graph.edges_mut() {
            if !generic_policy_ids.contains(&edge.target) {
                continue;
            }
            if matches!(edge.kind, EdgeKind::Attack { .. } | EdgeKind::Create { .. }) {
                edge.kind = EdgeKind::Admin;
                rewritten_targets.push(edge.target);
            }
        }
        for id in rewritten_targets {
            graph.remove_label(id, ADMIN_LABEL);
        }
    }

    /// 5b: flatten `source-[:ATTACK]->pattern-[:ATTACK{Admin:true}]->target`
    /// chains so every admin-granting pattern also terminates directly at the
    /// canonical admin pseudo-node.
    fn flatten_admin_patterns(&self, graph: &mut dyn GraphStore, admin_node: NodeId) {
        let reached_patterns: std::collections::HashSet<NodeId> = graph
            .edges()
            .iter()
            .filter(|e| matches!(e.kind, EdgeKind::Attack { .. }))
            .filter(|e| graph.node(e.target).map(|n| n.has_label("Pattern")).unwrap_or(false))
            .map(|e| e.target)
            .collect();

        let admin_grants: Vec<(NodeId, String)> = graph
            .edges()
            .iter()
            .filter_map(|e| match &e.kind {
                EdgeKind::Attack { name, admin: true } if reached_patterns.contains(&e.source) => {
                    Some((e.source, name.clone()))
                }
                _ => None,
            })
            .collect();

        for (pattern_id, name) in admin_grants {
            graph.merge_edge(Edge::new(pattern_id, admin_node, EdgeKind::Attack { name, admin: true }));
        }
    }

    /// 5c: replace each pattern-sourced grant edge's single `Description`
    /// with a `Descriptions` list, one entry per command, each taken from the
    /// lowest-weight pattern-sourced edge whose `Commands` contains that
    /// command (ties broken by iteration order, i.e. first collected).
    fn collect_descriptions(&self, graph: &mut dyn GraphStore) {
        let catalog: Vec<(usize, Vec<String>, String)> = graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.kind, EdgeKind::Attack { .. } | EdgeKind::Create { .. }))
            .filter(|(_, e)| e.properties.contains_key("Description"))
            .map(|(i, e)| {
                let commands: Vec<String> =
                    e.properties.get("Commands").and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default();
                (i, commands, e.properties.get("Description").cloned().unwrap_or_default())
            })
            .collect();

        let mut updates: Vec<(usize, String)> = Vec::new();
        for (idx, commands, _) in &catalog {
            let mut descriptions = Vec::with_capacity(commands.len());
            for command in commands {
                let mut best: Option<(usize, &str)> = None;
                for (_, other_commands, other_description) in &catalog {
                    if !other_commands.contains(command) {
                        continue;
                    }
                    let weight = other_commands.len();
                    if best.map(|(best_weight, _)| weight < best_weight).unwrap_or(true) {
                        best = Some((weight, other_description.as_str()));
                    }
                }
                descriptions.push(best.map(|(_, d)| d.to_string()).unwrap_or_default());
            }
            let serialized = serde_json::to_string(&descriptions).unwrap_or_else(|_| "[]".to_string());
            updates.push((*idx, serialized));
        }

        let edges = graph.edges_mut();
        for (idx, serialized) in updates {
            edges[idx].properties.insert("Descriptions".to_string(), serialized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeKind, Effect, InMemoryGraph, Node, NodeId, NodeKind};
    use pretty_assertions::assert_eq;

    fn resource(graph: &mut InMemoryGraph, name: &str, label: &str) -> NodeId {
        graph.insert_node(Node::new(NodeId(0), NodeKind::Resource, name).with_arn(format!("arn:aws:x::1:{name}")).with_label(label))
    }

    #[test_log::test]
    fn test_effective_admin_created_once_per_run() {
        let mut g = InMemoryGraph::new();
        let driver = FixpointDriver::new();
        let config = AnalysisConfig::default();
        driver.run(&mut g, &config).unwrap();
        driver.run(&mut g, &config).unwrap();

        let admins: Vec<_> = g.nodes().iter().filter(|n| n.name == EFFECTIVE_ADMIN_NAME).collect();
        assert_eq!(admins.len(), 1);
    }

    #[test_log::test]
    fn test_policy_version_overwrite_reaches_effective_admin() {
        // A user who can create a policy version on a policy attached (via
        // TRANSITIVE) to a role already granting admin should reach the
        // Effective Admin pseudo-node after post-unification.
        let mut g = InMemoryGraph::new();
        let user = resource(&mut g, "bob", "AWS::Iam::User");
        let policy = resource(&mut g, "target-policy", "AWS::Iam::Policy");
        let role = g.insert_node(
            Node::new(NodeId(0), NodeKind::Resource, "admin-role")
                .with_arn("arn:aws:iam::1:role/admin-role")
                .with_label("AWS::Iam::Role")
                .with_label(ADMIN_LABEL),
        );
        g.insert_edge(Edge::new(policy, role, EdgeKind::Transitive { name: "Attached".into() }));
        g.insert_edge(Edge::new(
            user,
            policy,
            EdgeKind::Action {
                name: "iam:CreatePolicyVersion".into(),
                effect: Effect::Allow,
                access: "Write".into(),
                condition: crate::graph::ConditionSet::empty(),
            },
        ));

        let driver = FixpointDriver::new();
        let config = AnalysisConfig::default();
        let report = driver.run(&mut g, &config).unwrap();
        assert!(report.total_relationships_created > 0);

        let attack_to_pattern = g.edges().iter().any(|e| {
            e.source == user && matches!(&e.kind, EdgeKind::Attack { name, .. } if name == "CreatePolicyVersion")
        });
        assert!(attack_to_pattern);

        let pattern_to_policy_admin = g.edges().iter().any(|e| {
            e.target == policy && matches!(e.kind, EdgeKind::Attack { admin: true, .. })
        });
        assert!(pattern_to_policy_admin);
    }

    #[test_log::test]
    fn test_fixpoint_monotonic_and_converges() {
        let mut g = InMemoryGraph::new();
        let user = resource(&mut g, "bob", "AWS::Iam::User");
        let role = resource(&mut g, "target-role", "AWS::Iam::Role");
        g.insert_edge(Edge::new(
            user,
            role,
            EdgeKind::Action {
                name: "sts:AssumeRole".into(),
                effect: Effect::Allow,
                access: "Write".into(),
                condition: crate::graph::ConditionSet::empty(),
            },
        ));
        g.insert_edge(Edge::new(role, user, EdgeKind::Trusts { name: "sts:AssumeRole".into() }));

        let driver = FixpointDriver::new();
        let config = AnalysisConfig::default();
        let report = driver.run(&mut g, &config).unwrap();
        assert!(report.converged);
        assert!(report.iterations_run <= config.max_iterations());
    }

    #[test_log::test]
    fn test_only_attacks_restricts_search_to_named_templates() {
        let mut g = InMemoryGraph::new();
        let user = resource(&mut g, "bob", "AWS::Iam::User");
        let policy = resource(&mut g, "target-policy", "AWS::Iam::Policy");
        g.insert_edge(Edge::new(
            user,
            policy,
            EdgeKind::Action {
                name: "iam:CreatePolicyVersion".into(),
                effect: Effect::Allow,
                access: "Write".into(),
                condition: crate::graph::ConditionSet::empty(),
            },
        ));

        let driver = FixpointDriver::new();
        let config = AnalysisConfig::builder().only_attacks(vec!["AssumeRole".to_string()]).build().unwrap();
        driver.run(&mut g, &config).unwrap();
        assert!(g.edges().iter().all(|e| !matches!(&e.kind, EdgeKind::Attack { name, .. } if name == "CreatePolicyVersion")));
    }
}
