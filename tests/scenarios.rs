//! One end-to-end test per literal escalation mechanism this analyzer is
//! built to find: build a small graph by hand, run the fixpoint driver over
//! it, and assert the expected `ATTACK`/`CREATE`/`ADMIN` edge appears (or,
//! for the condition-filter case, that toggling a config knob changes the
//! outcome).

use awspx_graph::compiler::NativeEngine;
use awspx_graph::config::AnalysisConfig;
use awspx_graph::graph::{ConditionSet, Edge, EdgeKind, Effect, GraphStore, InMemoryGraph, Node, NodeId, NodeKind};
use awspx_graph::policy::Document;
use awspx_graph::templates;
use awspx_graph::FixpointDriver;
use pretty_assertions::assert_eq;

fn resource(graph: &mut InMemoryGraph, name: &str, arn: &str, label: &str) -> NodeId {
    graph.insert_node(Node::new(NodeId(0), NodeKind::Resource, name).with_arn(arn).with_label(label))
}

fn action_edge(source: NodeId, target: NodeId, name: &str) -> Edge {
    Edge::new(
        source,
        target,
        EdgeKind::Action { name: name.to_string(), effect: Effect::Allow, access: "Write".to_string(), condition: ConditionSet::empty() },
    )
}

#[test_log::test]
fn policy_version_overwrite_reaches_admin() {
    let mut g = InMemoryGraph::new();
    let bob = resource(&mut g, "bob", "arn:aws:iam::1:user/bob", "AWS::Iam::User");
    let policy = resource(&mut g, "target-policy", "arn:aws:iam::1:policy/target", "AWS::Iam::Policy");
    g.insert_edge(action_edge(bob, policy, "iam:CreatePolicyVersion"));

    let driver = FixpointDriver::new();
    let config = AnalysisConfig::default();
    let report = driver.run(&mut g, &config).unwrap();
    assert!(report.converged);

    let grants_admin = g.edges().iter().any(|e| {
        e.target == policy && matches!(&e.kind, EdgeKind::Attack { name, admin: true } if name == "Admin")
    });
    assert!(grants_admin, "CreatePolicyVersion should grant admin control of the overwritten policy");
}

#[test_log::test]
fn assume_role_trust_is_followed() {
    let mut g = InMemoryGraph::new();
    let bob = resource(&mut g, "bob", "arn:aws:iam::1:user/bob", "AWS::Iam::User");
    let role = resource(&mut g, "target-role", "arn:aws:iam::1:role/target-role", "AWS::Iam::Role");
    g.insert_edge(action_edge(bob, role, "sts:AssumeRole"));
    g.insert_edge(Edge::new(role, bob, EdgeKind::Trusts { name: "sts:AssumeRole".to_string() }));

    let driver = FixpointDriver::new();
    let report = driver.run(&mut g, &AnalysisConfig::default()).unwrap();
    assert!(report.total_relationships_created > 0);

    let assumes = g.edges().iter().any(|e| {
        e.target == role && matches!(&e.kind, EdgeKind::Attack { name, .. } if name == "AssumeRole")
    });
    assert!(assumes, "a role trusting bob back should be reachable via AssumeRole");
}

#[test_log::test]
fn instance_profile_passrole_chain() {
    let mut g = InMemoryGraph::new();
    let bob = resource(&mut g, "bob", "arn:aws:iam::1:user/bob", "AWS::Iam::User");
    let instance = resource(&mut g, "i-1", "arn:aws:ec2:us-east-1:1:instance/i-1", "AWS::Ec2::Instance");
    let profile = resource(&mut g, "prof", "arn:aws:iam::1:instance-profile/prof", "AWS::Iam::InstanceProfile");

    g.insert_edge(action_edge(bob, instance, "ec2:AssociateIamInstanceProfile"));
    // bob already manages this instance, satisfying the template's Depends
    // expansion without a second intermediary.
    g.insert_edge(Edge::new(bob, instance, EdgeKind::Transitive { name: "Owns".to_string() }));

    let template = templates::get("AssociateInstanceProfile").unwrap();
    let summary = NativeEngine::run_template(&mut g, template, &AnalysisConfig::default()).unwrap();
    assert!(summary.total_created() > 0);

    let attached = g.edges().iter().any(|e| {
        e.target == profile && matches!(&e.kind, EdgeKind::Attack { name, .. } if name == "Attached")
    }) || g.edges().iter().any(|e| {
        e.target == instance && matches!(&e.kind, EdgeKind::Attack { name, .. } if name == "Attached")
    });
    assert!(attached, "associating an instance profile should materialize an Attached grant");
}

#[test_log::test]
fn inline_policy_document_grants_put_user_policy() {
    let mut g = InMemoryGraph::new();
    let bob = resource(&mut g, "bob", "arn:aws:iam::1:user/bob", "AWS::Iam::User");
    let victim = resource(&mut g, "victim", "arn:aws:iam::1:user/victim", "AWS::Iam::User");
    // PutUserPolicy's Depends expansion (same type as Affects) needs another
    // reachable user; bob's inline policy attaches him to the victim's
    // management surface directly.
    g.insert_edge(Edge::new(bob, victim, EdgeKind::Transitive { name: "Manages".to_string() }));

    let policy = serde_json::json!({
        "Version": "2012-10-17",
        "Statement": {
            "Effect": "Allow",
            "Action": "iam:PutUserPolicy",
            "Resource": "arn:aws:iam::1:user/victim"
        }
    });
    let document = Document::parse(&policy).unwrap();
    let edges = document.resolve(bob, &mut g);
    assert_eq!(edges.len(), 1);
    for edge in edges {
        g.insert_edge(edge);
    }

    let template = templates::get("PutUserPolicy").unwrap();
    let summary = NativeEngine::run_template(&mut g, template, &AnalysisConfig::default()).unwrap();
    assert!(summary.total_created() > 0);

    let admin_grant = g.edges().iter().any(|e| matches!(&e.kind, EdgeKind::Attack { admin: true, .. }));
    assert!(admin_grant, "an inline Admin policy document should grant admin control of the victim");
}

#[test_log::test]
fn create_user_then_login_profile_chain() {
    let mut g = InMemoryGraph::new();
    let bob = resource(&mut g, "bob", "arn:aws:iam::1:user/bob", "AWS::Iam::User");
    let generic_user = g.insert_node(Node::new(NodeId(0), NodeKind::Generic, "new-user").with_label("AWS::Iam::User"));

    g.insert_edge(action_edge(bob, generic_user, "iam:CreateUser"));
    g.insert_edge(action_edge(bob, generic_user, "iam:CreateLoginProfile"));

    let template = templates::get("CreateUserLoginProfile").unwrap();
    let summary = NativeEngine::run_template(&mut g, template, &AnalysisConfig::default()).unwrap();
    assert!(summary.total_created() > 0);

    let created = g.edges().iter().any(|e| {
        e.target == generic_user && matches!(&e.kind, EdgeKind::Create { name } if name == "CreateUserLoginProfile")
    });
    assert!(created, "creating a user and giving it a login profile should materialize a CREATE edge");
}

#[test_log::test]
fn condition_filter_toggles_whether_the_attack_is_found() {
    let mut variant = std::collections::BTreeMap::new();
    variant.insert("Bool".to_string(), serde_json::json!({"aws:MultiFactorAuthPresent": "true"}));

    let mut g = InMemoryGraph::new();
    let bob = resource(&mut g, "bob", "arn:aws:iam::1:user/bob", "AWS::Iam::User");
    let policy = resource(&mut g, "target-policy", "arn:aws:iam::1:policy/target", "AWS::Iam::Policy");
    g.insert_edge(Edge::new(
        bob,
        policy,
        EdgeKind::Action {
            name: "iam:CreatePolicyVersion".to_string(),
            effect: Effect::Allow,
            access: "Write".to_string(),
            condition: ConditionSet(vec![variant]),
        },
    ));

    let template = templates::get("CreatePolicyVersion").unwrap();

    let strict = AnalysisConfig::builder().ignore_actions_with_conditions(true).build().unwrap();
    let summary_strict = NativeEngine::run_template(&mut g, template, &strict).unwrap();
    assert_eq!(summary_strict.total_created(), 0, "a conditioned grant should be ignored by default");

    let permissive = AnalysisConfig::builder().ignore_actions_with_conditions(false).build().unwrap();
    let summary_permissive = NativeEngine::run_template(&mut g, template, &permissive).unwrap();
    assert!(summary_permissive.total_created() > 0, "disabling the filter should surface the conditioned grant");
}
