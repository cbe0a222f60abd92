//! Condition-block handling for statement resolution.
//!
//! The search engine treats `Condition` opaquely; this
//! module's only job is producing the right *set* of OR-combined variants —
//! the explicit `Condition` clause merged with one `StringEquals` variant per
//! captured resource-level policy variable.

use crate::graph::edge::ConditionVariant;
use serde_json::Value;

/// Parse a statement's raw `Condition` JSON value (if present) into a single
/// variant map. An absent or malformed `Condition` yields an empty map, which
/// merges as a no-op.
pub fn parse_explicit(condition: Option<&Value>) -> ConditionVariant {
    match condition {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => ConditionVariant::new(),
    }
}

/// Build the `StringEquals` variant binding each captured `${aws:...}`
/// variable to its matched substring.
pub fn string_equals_variant(bindings: &[(String, String)]) -> ConditionVariant {
    let mut variant = ConditionVariant::new();
    if bindings.is_empty() {
        return variant;
    }
    let mut ops = serde_json::Map::new();
    for (var, value) in bindings {
        ops.insert(var.clone(), Value::String(value.clone()));
    }
    variant.insert("StringEquals".to_string(), Value::Object(ops));
    variant
}

/// Merge a per-resource variant (possibly empty, possibly a `StringEquals`
/// binding) with the statement's explicit condition. Per : "Its
/// `Condition` property is the JSON serialization of the list `[{…per-resource
/// variant… + explicit condition}, …]`".
pub fn merge(per_resource: &ConditionVariant, explicit: &ConditionVariant) -> ConditionVariant {
    let mut merged = per_resource.clone();
    for (k, v) in explicit {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn test_parse_explicit_absent() {
        assert!(parse_explicit(None).is_empty());
    }

    #[test_log::test]
    fn test_string_equals_variant_binds_var() {
        let variant = string_equals_variant(&[("${aws:username}".to_string(), "bob".to_string())]);
        assert_eq!(variant["StringEquals"]["${aws:username}"], Value::String("bob".to_string()));
    }

    #[test_log::test]
    fn test_merge_combines_both() {
        let per_resource = string_equals_variant(&[("${aws:username}".to_string(), "bob".to_string())]);
        let explicit = parse_explicit(Some(&serde_json::json!({"Bool": {"aws:MultiFactorAuthPresent": "true"}})));
        let merged = merge(&per_resource, &explicit);
        assert!(merged.contains_key("StringEquals"));
        assert!(merged.contains_key("Bool"));
    }
}
