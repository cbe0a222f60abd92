//! `NativeEngine`: a directly-testable implementation of the Pattern
//! Compiler's 10 logical stages against an in-process
//! `GraphStore`, rather than a Cypher string sent to a real graph database.
//! See [`super::query`] for the documented query-emission side of the same
//! contract.

use super::constraint::{self, Bindings};
use super::error::EngineError;
use crate::config::AnalysisConfig;
use crate::graph::{Edge, EdgeKind, Effect, GraphStore, Node, NodeId, NodeKind, QuerySummary, ADMIN_LABEL};
use crate::templates::AttackTemplate;
use std::collections::{HashMap, HashSet, VecDeque};

const TRANSITIVE_LIKE: &[&str] = &["TRANSITIVE", "ATTACK", "CREATE"];
const CREATE_ONLY: &[&str] = &["CREATE"];

fn edge_commands(edge: &Edge) -> Vec<String> {
    edge.properties
        .get("Commands")
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

fn set_commands(edge: Edge, commands: &[String]) -> Edge {
    let serialized = serde_json::to_string(commands).unwrap_or_else(|_| "[]".to_string());
    edge.with_property("Commands", serialized).with_property("Weight", commands.len().to_string())
}

fn dedup_preserve_order(commands: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    commands.into_iter().filter(|c| seen.insert(c.clone())).collect()
}

/// A fully-bound candidate for materialization: the attacking source, its
/// dependency/option node (if the template has one), the target, the grant
/// node (if the template grants something beyond the target itself), and
/// the accumulated, deduplicated command list.
#[derive(Clone, Debug)]
struct Candidate {
    source: NodeId,
    option: Option<NodeId>,
    target: NodeId,
    grant: Option<NodeId>,
    commands: Vec<String>,
}

pub struct NativeEngine;

impl NativeEngine {
    /// Run one template's compiled query against `graph`, merging the
    /// resulting `ATTACK`/`CREATE`/`OPTION`/`ADMIN` edges and returning the
    /// creation counters the fixpoint driver uses to detect convergence.
    pub fn run_template(
        graph: &mut dyn GraphStore,
        template: &'static AttackTemplate,
        config: &AnalysisConfig,
    ) -> Result<QuerySummary, EngineError> {
        let max_depth = config.max_search_depth().unwrap_or(usize::MAX);
        let excluded = admin_exclusion_set(graph);

        let matches = match_principal_actions(graph, template, max_depth, &excluded, config.ignore_actions_with_conditions());

        let mut candidates = Vec::new();
        for (source, target) in matches {
            let option = match template.depends {
                Some(depends_type) => match best_dependency(graph, source, depends_type, max_depth) {
                    Some((option, commands)) => {
                        candidates.push((source, Some(option), target, commands));
                        continue;
                    }
                    None => continue,
                },
                None => None,
            };
            candidates.push((source, option, target, Vec::new()));
        }

        let mut grouped: HashMap<(NodeId, NodeId), Candidate> = HashMap::new();
        for (source, option, target, dependency_commands) in candidates {
            let bindings = Bindings { source, option, target };
            if !constraint::evaluate(template.name, &bindings, graph) {
                continue;
            }

            let grant = resolve_grant(graph, template, source, max_depth);
            let grant_commands = grant.as_ref().map(|(_, c)| c.clone()).unwrap_or_default();
            let grant_node = grant.map(|(id, _)| id);

            let mut commands = dependency_commands;
            commands.extend(grant_commands);
            commands.extend(resolve_placeholders(template, source, option, target, grant_node, graph));
            let commands = dedup_preserve_order(commands);

            let entry = grouped.entry((source, target));
            entry
                .and_modify(|existing| {
                    if commands.len() < existing.commands.len() {
                        existing.commands = commands.clone();
                        existing.option = option;
                        existing.grant = grant_node;
                    }
                })
                .or_insert(Candidate { source, option, target, grant: grant_node, commands });
        }

        let candidates = prune_intermediate_sources(graph, grouped.into_values().collect(), max_depth);
        let candidates = widen_target_type(graph, template, candidates, max_depth);

        let mut summary = QuerySummary::default();
        for candidate in candidates {
            summary.merge(&materialize(graph, template, &candidate));
        }
        Ok(summary)
    }
}

/// Stage 1: resources already reachable to an `Admin` node within 2 hops,
/// plus the full transitive-predecessor closure of that set. Excluded from
/// consideration as general-mode intermediaries (paths crossing an
/// admin-granting node are implicit and redundant).
fn admin_exclusion_set(graph: &dyn GraphStore) -> HashSet<NodeId> {
    let admin_ids: Vec<NodeId> = graph.nodes().iter().filter(|n| n.is_admin()).map(|n| n.id).collect();
    if admin_ids.is_empty() {
        return HashSet::new();
    }

    let mut within_two_hops = HashSet::new();
    for &admin in &admin_ids {
        let mut frontier = vec![admin];
        for _ in 0..2 {
            let mut next = Vec::new();
            for node in &frontier {
                for edge in graph.edges_to(*node) {
                    if within_two_hops.insert(edge.source) {
                        next.push(edge.source);
                    }
                }
            }
            frontier = next;
        }
    }

    let mut closure = within_two_hops.clone();
    let mut queue: VecDeque<NodeId> = within_two_hops.into_iter().collect();
    while let Some(node) = queue.pop_front() {
        for edge in graph.edges_to(node) {
            if closure.insert(edge.source) {
                queue.push_back(edge.source);
            }
        }
    }
    closure
}

/// Stage 4: simple mode matches a single direct `ACTION` edge; general mode
/// walks `TRANSITIVE|ATTACK` edges to an intermediary, then one `ACTION` edge
/// to the target, requiring every `Requires` action to be seen along some
/// path from the same source.
fn match_principal_actions(
    graph: &dyn GraphStore,
    template: &AttackTemplate,
    max_depth: usize,
    excluded_intermediaries: &HashSet<NodeId>,
    ignore_conditioned: bool,
) -> Vec<(NodeId, NodeId)> {
    if template.is_simple_mode() {
        let action = template.requires[0];
        return graph
            .edges()
            .iter()
            .filter_map(|e| match &e.kind {
                EdgeKind::Action { name, effect, condition, .. }
                    if name == action
                        && *effect == Effect::Allow
                        && (!ignore_conditioned || condition.is_empty())
                        && matches_type(graph, e.target, template.affects) =>
                {
                    Some((e.source, e.target))
                }
                _ => None,
            })
            .collect();
    }

    let mut seen_actions: HashMap<(NodeId, NodeId), HashSet<&str>> = HashMap::new();
    for source_node in graph.nodes() {
        let source = source_node.id;
        let reachable = reachable_intermediaries(graph, source, max_depth, excluded_intermediaries);
        for intermediary in reachable {
            for edge in graph.edges_from(intermediary) {
                if let EdgeKind::Action { name, effect, access: _, condition } = &edge.kind {
                    if *effect != Effect::Allow {
                        continue;
                    }
                    if ignore_conditioned && !condition.is_empty() {
                        continue;
                    }
                    let Some(&required) = template.requires.iter().find(|r| r.as_bytes() == name.as_bytes()) else {
                        continue;
                    };
                    if !matches_type(graph, edge.target, template.affects) {
                        continue;
                    }
                    seen_actions.entry((source, edge.target)).or_default().insert(required);
                }
            }
        }
    }

    seen_actions
        .into_iter()
        .filter(|(_, actions)| actions.len() == template.requires.len())
        .map(|(key, _)| key)
        .collect()
}

fn reachable_intermediaries(
    graph: &dyn GraphStore,
    source: NodeId,
    max_depth: usize,
    excluded: &HashSet<NodeId>,
) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    visited.insert(source);
    let mut frontier = vec![source];
    let mut depth = 0;
    while depth < max_depth && !frontier.is_empty() {
        let mut next = Vec::new();
        for node in frontier {
            for edge in graph.edges_from(node) {
                if (edge.kind.label() == "TRANSITIVE" || edge.kind.label() == "ATTACK")
                    && !excluded.contains(&edge.target)
                    && visited.insert(edge.target)
                {
                    next.push(edge.target);
                }
            }
        }
        frontier = next;
        depth += 1;
    }
    visited
}

fn matches_type(graph: &dyn GraphStore, id: NodeId, expected: &str) -> bool {
    graph.node(id).map(|n| n.has_label(expected)).unwrap_or(false)
}

/// Stage 2: the minimum-weight `(source, option)` pair where `option` is of
/// `depends`'s type, reachable through `TRANSITIVE|ATTACK|CREATE` edges.
fn best_dependency(
    graph: &dyn GraphStore,
    source: NodeId,
    depends_type: &str,
    max_depth: usize,
) -> Option<(NodeId, Vec<String>)> {
    let mut visited: HashMap<NodeId, Vec<String>> = HashMap::new();
    visited.insert(source, Vec::new());
    let mut queue = VecDeque::new();
    queue.push_back((source, 0usize));

    let mut best: Option<(NodeId, Vec<String>)> = None;
    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for edge in graph.edges_from(node) {
            if !TRANSITIVE_LIKE.contains(&edge.kind.label()) {
                continue;
            }
            let mut commands = visited.get(&node).cloned().unwrap_or_default();
            commands.extend(edge_commands(edge));
            let commands = dedup_preserve_order(commands);

            let better = visited.get(&edge.target).map(|existing| commands.len() < existing.len()).unwrap_or(true);
            if better {
                visited.insert(edge.target, commands.clone());
                queue.push_back((edge.target, depth + 1));
            }

            if matches_type(graph, edge.target, depends_type) {
                let candidate = (edge.target, commands);
                best = Some(match best {
                    Some(current) if current.1.len() <= candidate.1.len() => current,
                    _ => candidate,
                });
            }
        }
    }
    best
}

/// Stage 3: an existing resource of the grants type costs nothing; a Generic
/// of the grants type reachable from `source` via `CREATE`-chains costs
/// whatever commands created it.
fn resolve_grant(
    graph: &dyn GraphStore,
    template: &AttackTemplate,
    source: NodeId,
    max_depth: usize,
) -> Option<(NodeId, Vec<String>)> {
    let grants_type = template.inner_grants?;

    if let Some(existing) = graph.nodes().iter().find(|n| n.kind != NodeKind::Generic && n.has_label(grants_type)) {
        return Some((existing.id, Vec::new()));
    }

    let mut visited: HashMap<NodeId, Vec<String>> = HashMap::new();
    visited.insert(source, Vec::new());
    let mut queue = VecDeque::new();
    queue.push_back((source, 0usize));
    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for edge in graph.edges_from(node) {
            if !CREATE_ONLY.contains(&edge.kind.label()) {
                continue;
            }
            let mut commands = visited.get(&node).cloned().unwrap_or_default();
            commands.extend(edge_commands(edge));
            let commands = dedup_preserve_order(commands);

            if matches_type(graph, edge.target, grants_type) {
                return Some((edge.target, commands));
            }
            if visited.get(&edge.target).map(|c| commands.len() < c.len()).unwrap_or(true) {
                visited.insert(edge.target, commands.clone());
                queue.push_back((edge.target, depth + 1));
            }
        }
    }
    None
}

/// Stage 6: drop a `(source, target)` tuple whose matched path runs through
/// another node that is itself a recorded source for the same target —
/// otherwise a 3-hop chain `A -> B -> target` and the shorter `B -> target`
/// would both materialize as independent attacks even though the first
/// subsumes the second.
fn prune_intermediate_sources(graph: &dyn GraphStore, candidates: Vec<Candidate>, max_depth: usize) -> Vec<Candidate> {
    let sources_by_target: HashMap<NodeId, Vec<NodeId>> = candidates.iter().fold(HashMap::new(), |mut acc, c| {
        acc.entry(c.target).or_default().push(c.source);
        acc
    });

    candidates
        .into_iter()
        .filter(|candidate| {
            let Some(others) = sources_by_target.get(&candidate.target) else { return true };
            let reachable = reachable_intermediaries(graph, candidate.source, max_depth, &HashSet::new());
            !others.iter().any(|&other| other != candidate.source && reachable.contains(&other))
        })
        .collect()
}

/// Stage 8: when the template isn't a `CreateAction`, a not-yet-created
/// `Generic` instance of the target's type is also a valid target if it's
/// reachable from the source via a `CREATE` chain — folding those creation
/// commands into the resulting weight.
fn widen_target_type(
    graph: &dyn GraphStore,
    template: &AttackTemplate,
    candidates: Vec<Candidate>,
    max_depth: usize,
) -> Vec<Candidate> {
    if template.create_action {
        return candidates;
    }

    let generics: Vec<&Node> =
        graph.nodes().iter().filter(|n| n.kind == NodeKind::Generic && n.has_label(template.affects)).collect();
    if generics.is_empty() {
        return candidates;
    }

    let mut widened = candidates.clone();
    let sources: HashSet<NodeId> = candidates.iter().map(|c| c.source).collect();
    for source in sources {
        let mut visited: HashMap<NodeId, Vec<String>> = HashMap::new();
        visited.insert(source, Vec::new());
        let mut queue = VecDeque::new();
        queue.push_back((source, 0usize));
        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in graph.edges_from(node) {
                if edge.kind.label() != "CREATE" {
                    continue;
                }
                let mut commands = visited.get(&node).cloned().unwrap_or_default();
                commands.extend(edge_commands(edge));
                let commands = dedup_preserve_order(commands);

                if generics.iter().any(|g| g.id == edge.target) {
                    let base = candidates.iter().find(|c| c.source == source);
                    let mut full_commands = base.map(|c| c.commands.clone()).unwrap_or_default();
                    full_commands.extend(commands.clone());
                    widened.push(Candidate {
                        source,
                        option: base.and_then(|c| c.option),
                        target: edge.target,
                        grant: base.and_then(|c| c.grant),
                        commands: dedup_preserve_order(full_commands),
                    });
                }
                if visited.get(&edge.target).map(|c| commands.len() < c.len()).unwrap_or(true) {
                    visited.insert(edge.target, commands.clone());
                    queue.push_back((edge.target, depth + 1));
                }
            }
        }
    }
    widened
}

/// Stage 9: substitute `${<type>}[.Field]` placeholders in each of the
/// template's `Commands` strings for the resolved binding's field value.
fn resolve_placeholders(
    template: &AttackTemplate,
    source: NodeId,
    option: Option<NodeId>,
    target: NodeId,
    grant: Option<NodeId>,
    graph: &dyn GraphStore,
) -> Vec<String> {
    use crate::templates::Placeholder;

    template
        .commands
        .iter()
        .map(|&command| {
            let placeholders = crate::templates::parse_command(command, template.depends, template.affects, template.grants);
            let mut rendered = command.to_string();
            for p in placeholders {
                let node_id = match p.placeholder {
                    Placeholder::Source => Some(source),
                    Placeholder::Target => Some(target),
                    Placeholder::Option => option,
                    Placeholder::Grant => grant,
                    Placeholder::TypedVar(_) => None,
                };
                let value = node_id
                    .and_then(|id| graph.node(id))
                    .map(|n| field_value(n, &p.field))
                    .unwrap_or_else(|| p.raw.clone());
                rendered = rendered.replace(&p.raw, &value);
            }
            rendered
        })
        .collect()
}

fn field_value(node: &Node, field: &str) -> String {
    match field {
        "Name" => node.name.clone(),
        "Arn" => node.arn.clone().unwrap_or_else(|| node.name.clone()),
        other => node.properties.get(other).cloned().unwrap_or_else(|| node.name.clone()),
    }
}

/// Stage 10: merge the `Pattern` intermediary node and its incident edges.
fn materialize(graph: &mut dyn GraphStore, template: &AttackTemplate, candidate: &Candidate) -> QuerySummary {
    let mut summary = QuerySummary::default();

    let pattern_label = format!("Pattern:{}", template.name);
    let pattern_arn = format!("pattern:{}:{}:{}", template.name, candidate.source.0, candidate.target.0);
    let pattern_node = Node::new(NodeId(0), NodeKind::Generic, template.name)
        .with_arn(pattern_arn)
        .with_label(pattern_label)
        .with_label("Pattern")
        .with_property("Requires", template.requires.join(","))
        .with_property("Depends", template.depends.unwrap_or_default());
    let (pattern_id, pattern_created) = graph.merge_node(pattern_node);
    if pattern_created {
        summary.nodes_created += 1;
    }

    let attack_edge = Edge::new(
        candidate.source,
        pattern_id,
        EdgeKind::Attack { name: template.name.to_string(), admin: template.admin },
    )
    .with_property("Requires", template.requires.join(","));
    let (_, attack_created) = graph.merge_edge(attack_edge);
    if attack_created {
        summary.relationships_created += 1;
    }

    let grant_target = candidate.grant.unwrap_or(candidate.target);
    let grant_kind = if template.create_action {
        EdgeKind::Create { name: template.grants.unwrap_or(template.name).to_string() }
    } else {
        EdgeKind::Attack { name: template.grants.unwrap_or(template.name).to_string(), admin: template.admin }
    };
    let grant_edge = set_commands(
        Edge::new(pattern_id, grant_target, grant_kind).with_property("Description", template.description),
        &candidate.commands,
    );
    let (_, grant_created) = graph.merge_edge(grant_edge);
    if grant_created {
        summary.relationships_created += 1;
    }

    if let Some(option) = candidate.option {
        let option_edge = set_commands(Edge::new(pattern_id, option, EdgeKind::Option { weight: candidate.commands.len(), commands: candidate.commands.clone() }), &candidate.commands);
        let (_, option_created) = graph.merge_edge(option_edge);
        if option_created {
            summary.relationships_created += 1;
        }
    }

    summary
}
