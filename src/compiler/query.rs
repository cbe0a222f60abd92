//! `CypherQuery`: an AST for the graph query language this crate targets
//! (path matching, variable-length patterns, `UNWIND`, `COLLECT`,
//! `REDUCE`/list comprehensions) plus a single `Display` stringifier, rather
//! than ad hoc string concatenation — it makes stage-ordering invariants
//! checkable and lets each stage be unit-tested in isolation. Each
//! of [`PatternCompiler::compile`]'s ten stages appends one or
//! more [`Clause`]s; [`NativeEngine`](super::engine::NativeEngine) evaluates
//! the same ten stages directly against an in-process [`crate::graph::GraphStore`]
//! so the analyzer is fully testable without a live Cypher-speaking backend.

use crate::config::AnalysisConfig;
use crate::templates::{parse_command, AttackTemplate, Placeholder};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// One clause of a Cypher-shaped query. Kept as pre-rendered strings rather
/// than a fully-typed pattern grammar — the native engine (tested exhaustively
/// against [`crate::graph::InMemoryGraph`]) is this crate's source of truth for
/// *behavior*; this AST exists so the stage boundaries a real graph-DB driver
/// would need are explicit and individually inspectable rather than buried in
/// one long format string.
#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    Match(String),
    OptionalMatch(String),
    Where(String),
    With(String),
    Unwind(String),
    Merge(String),
    Set(String),
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Match(body) => write!(f, "MATCH {body}"),
            Self::OptionalMatch(body) => write!(f, "OPTIONAL MATCH {body}"),
            Self::Where(body) => write!(f, "WHERE {body}"),
            Self::With(body) => write!(f, "WITH {body}"),
            Self::Unwind(body) => write!(f, "UNWIND {body}"),
            Self::Merge(body) => write!(f, "MERGE {body}"),
            Self::Set(body) => write!(f, "SET {body}"),
        }
    }
}

/// A complete, ordered query for one attack template's ten stages, as a
/// real Cypher-speaking backend would receive it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CypherQuery {
    pub clauses: Vec<Clause>,
}

impl CypherQuery {
    fn push(&mut self, clause: Clause) -> &mut Self {
        self.clauses.push(clause);
        self
    }
}

impl Display for CypherQuery {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let rendered: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", rendered.join("\n"))
    }
}

/// Renders the variable-length bound a real Cypher backend expects:
/// `*0..N` when `max_search_depth` is set, `*` (unbounded) otherwise — the
/// same `max_search_depth` knob as a typed value.
fn depth_bound(config: &AnalysisConfig) -> String {
    match config.max_search_depth() {
        Some(n) => format!("*0..{n}"),
        None => "*".to_string(),
    }
}

/// Builds the stage-ordered [`CypherQuery`] for one
/// template. [`super::engine::NativeEngine`] is the executable twin of this
/// same ten-stage pipeline; the two are kept in lockstep by sharing
/// [`crate::templates::AttackTemplate`] and [`crate::templates::placeholder`] as their only inputs.
pub struct PatternCompiler;

impl PatternCompiler {
    pub fn compile(template: &'static AttackTemplate, config: &AnalysisConfig) -> CypherQuery {
        let mut q = CypherQuery::default();
        let depth = depth_bound(config);

        // Stage 1: admin exclusion set — resources already within 2 hops of
        // an Admin-labeled node, plus their transitive predecessors.
        q.push(Clause::OptionalMatch("(admin:Admin)<-[:TRANSITIVE*0..2]-(near)".to_string()));
        q.push(Clause::OptionalMatch("(near)<-[:TRANSITIVE*]-(far)".to_string()));
        q.push(Clause::With("COLLECT(DISTINCT near) + COLLECT(DISTINCT far) AS excluded".to_string()));

        // Stage 4: principal-action matching, simple or general mode.
        if template.is_simple_mode() {
            let action = template.requires[0];
            q.push(Clause::Match(format!(
                "(source)-[a:ACTION {{Name: '{action}', Effect: 'Allow'}}]->(target:`{}`)",
                template.affects
            )));
        } else {
            q.push(Clause::Match(format!(
                "(source)-[:TRANSITIVE|ATTACK{depth}]->(intermediary)-[a:ACTION]->(target:`{}`)",
                template.affects
            )));
            q.push(Clause::Where(format!(
                "a.Name IN [{}] AND a.Effect = 'Allow' AND NOT intermediary IN excluded",
                template.requires.iter().map(|r| format!("'{r}'")).collect::<Vec<_>>().join(", ")
            )));
            q.push(Clause::With("source, target, COLLECT(DISTINCT a.Name) AS matched, excluded".to_string()));
            q.push(Clause::Where(format!("SIZE(matched) = {}", template.requires.len())));
        }

        if config.ignore_actions_with_conditions() {
            q.push(Clause::Where("a.Condition = '[]'".to_string()));
        }

        // Stage 2: dependency expansion.
        if let Some(depends) = template.depends {
            q.push(Clause::OptionalMatch(format!(
                "(source)-[:TRANSITIVE|ATTACK|CREATE{depth}]->(option:`{depends}`)"
            )));
            q.push(Clause::With("source, target, option, excluded".to_string()));
        }

        // Stage 3: grant expansion.
        if let Some(grants) = template.inner_grants {
            q.push(Clause::OptionalMatch(format!("(existing:`{grants}`)")));
            q.push(Clause::OptionalMatch(format!("(source)-[:CREATE*]->(generic:`{grants}`:Generic)")));
        }

        // Stage 5: extra-constraint processing (template-specific Cypher).
        for raw in template.extra_constraints {
            let rendered = render_extra_constraint(raw, template);
            q.push(Clause::Where(rendered));
        }

        // Stage 6: intermediate-source pruning — drop (source, target) pairs
        // subsumed by another known source reaching the same target.
        q.push(Clause::With("source, target, option, excluded".to_string()));
        q.push(Clause::Where(
            "NOT EXISTS { MATCH (other)-[:TRANSITIVE|ATTACK*]->(target) WHERE other <> source AND (other)-[:TRANSITIVE|ATTACK*]->(source) }"
                .to_string(),
        ));

        // Stage 8: target-type widening (skipped for CreateAction templates).
        if !template.create_action {
            q.push(Clause::OptionalMatch(format!("(source)-[:CREATE*]->(widened:`{}`:Generic)", template.affects)));
        }

        // Stage 7/9: weight minimization + placeholder resolution happen
        // over the collected command lists; represented here as a single
        // aggregation clause since the native engine does the actual string
        // substitution.
        q.push(Clause::Unwind("[] AS _commands".to_string()));

        // Stage 10: materialization.
        let pattern_label = format!("Pattern:{}", template.name);
        q.push(Clause::Merge(format!("(source)-[:ATTACK {{Name: '{}'}}]->(pattern:`{pattern_label}`)", template.name)));
        q.push(Clause::Set(format!(
            "pattern.Requires = '{}', pattern.Depends = '{}'",
            template.requires.join(","),
            template.depends.unwrap_or_default()
        )));

        let grant_label = template.grants.unwrap_or(template.name);
        let grant_kind = if template.create_action { "CREATE" } else { "ATTACK" };
        q.push(Clause::Merge(format!("(pattern)-[:{grant_kind} {{Name: '{grant_label}'}}]->(target)")));

        if template.depends.is_some() || template.inner_grants.is_some() {
            q.push(Clause::Merge("(pattern)-[:OPTION]->(option)".to_string()));
        }

        q
    }
}

/// Substitute `${}`/`${<Affects>}`/`${<Depends>}`/`${<Grants>}`/other typed
/// placeholders in a template's raw `Cypher` string with the query-local
/// variable names `source`/`target`/`option`/`grant`.
fn render_extra_constraint(raw: &str, template: &AttackTemplate) -> String {
    let placeholders = parse_command(raw, template.depends, template.affects, template.grants);
    let mut rendered = raw.to_string();
    for p in placeholders {
        let var = match p.placeholder {
            Placeholder::Source => "source",
            Placeholder::Target => "target",
            Placeholder::Option => "option",
            Placeholder::Grant => "grant",
            Placeholder::TypedVar(_) => "fresh",
        };
        rendered = rendered.replace(&p.raw, var);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn test_simple_mode_emits_direct_action_match() {
        let template = templates::get("CreatePolicyVersion").unwrap();
        let config = AnalysisConfig::default();
        let query = PatternCompiler::compile(template, &config);
        let rendered = query.to_string();
        assert!(rendered.contains("[a:ACTION {Name: 'iam:CreatePolicyVersion', Effect: 'Allow'}]"));
    }

    #[test_log::test]
    fn test_general_mode_emits_transitive_walk_and_size_check() {
        let template = templates::get("AssociateInstanceProfile").unwrap();
        let config = AnalysisConfig::default();
        let query = PatternCompiler::compile(template, &config);
        let rendered = query.to_string();
        assert!(rendered.contains("TRANSITIVE|ATTACK"));
        assert!(rendered.contains("SIZE(matched) ="));
    }

    #[test_log::test]
    fn test_condition_filter_clause_present_by_default() {
        let template = templates::get("AssumeRole").unwrap();
        let config = AnalysisConfig::default();
        let rendered = PatternCompiler::compile(template, &config).to_string();
        assert!(rendered.contains("a.Condition = '[]'"));
    }

    #[test_log::test]
    fn test_condition_filter_clause_absent_when_disabled() {
        let template = templates::get("AssumeRole").unwrap();
        let config = AnalysisConfig::builder().ignore_actions_with_conditions(false).build().unwrap();
        let rendered = PatternCompiler::compile(template, &config).to_string();
        assert!(!rendered.contains("a.Condition = '[]'"));
    }

    #[test_log::test]
    fn test_materialization_clause_merges_pattern_node() {
        let template = templates::get("AssumeRole").unwrap();
        let config = AnalysisConfig::default();
        let rendered = PatternCompiler::compile(template, &config).to_string();
        assert!(rendered.contains("Pattern:AssumeRole"));
    }

    #[test_log::test]
    fn test_extra_constraint_placeholder_rewritten_to_query_variable() {
        let template = templates::get("AssumeRole").unwrap();
        let config = AnalysisConfig::default();
        let rendered = PatternCompiler::compile(template, &config).to_string();
        assert!(rendered.contains("(source)<-[:TRUSTS{Name:'sts:AssumeRole'}]-(target)"));
    }
}
