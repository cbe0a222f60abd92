//! The declarative attack-template record.

/// One declarative attack template. All fields are `'static` string/slice
/// data: the table itself never changes at runtime, only the graph queries
/// built from it do.
#[derive(Clone, Copy, Debug)]
pub struct AttackTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub commands: &'static [&'static str],

    /// `Options` contained `CreateAction`: the template's outcome is a new
    /// resource instance, not an escalation against an existing one — no
    /// `Grants` key at all, materialized as a `CREATE` edge.
    pub create_action: bool,
    /// `Options` contained `Admin`: success on this template grants full
    /// administrative control, carried on the materialized edge.
    pub admin: bool,

    /// `Attack.Depends`: a dependency/option resource type that must already
    /// be reachable from the source.
    pub depends: Option<&'static str>,
    /// `Attack.Requires`: every one of these actions must be available along
    /// the matched path.
    pub requires: &'static [&'static str],
    /// `Attack.Affects`: the target node's resource type.
    pub affects: &'static str,
    /// `Attack.Grants` (inner): a secondary resource type the attack also
    /// needs reachable (distinct from the outer `Grants` edge-name).
    pub inner_grants: Option<&'static str>,
    /// `Attack.Cypher`: extra graph constraints with `${...}` placeholders,
    /// kept as opaque strings — the native engine's stage 5 matches only the
    /// subset it can evaluate against `Node::properties` (see
    /// `compiler::constraint::evaluate`); anything else is a documented
    /// no-op rather than a silent wrong answer.
    pub extra_constraints: &'static [&'static str],

    /// `Grants` (outer): the label placed on the resulting `ATTACK`/`CREATE`
    /// edge. Usually absent when `create_action` is true (the outcome is the
    /// new resource itself), but not always — `CreateRole` both creates a
    /// role and grants the ability to assume it.
    pub grants: Option<&'static str>,
}

impl AttackTemplate {
    /// Simple mode applies when stage 4 can match a single direct `ACTION`
    /// edge: exactly one required action, no dependency, no extra
    /// constraints.
    pub fn is_simple_mode(&self) -> bool {
        self.requires.len() == 1 && self.depends.is_none() && self.extra_constraints.is_empty()
    }
}
