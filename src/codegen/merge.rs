//! allOf Merging
//!
//! `allOf` is structural merging, never subtyping: the branches are
//! folded into one object schema before synthesis. Properties merge
//! recursively, `required` sets union, constraints must agree (a
//! disagreement is fatal), and later `default`s override earlier ones.
//!
//! Branches must already have their own `$ref`s resolved by the caller.

use crate::error::{GenerateError, Result};
use crate::schema::{AdditionalProperties, SchemaNode};

/// Fold `allOf` branches into a single schema node.
pub fn merge_all_of(branches: &[SchemaNode], pointer: &str) -> Result<SchemaNode> {
    let mut merged = SchemaNode {
        pointer: pointer.to_string(),
        ..SchemaNode::default()
    };
    for branch in branches {
        merged = merge_pair(&merged, branch, pointer)?;
    }
    Ok(merged)
}

/// Merge `later` into `earlier` under the allOf rules.
fn merge_pair(earlier: &SchemaNode, later: &SchemaNode, pointer: &str) -> Result<SchemaNode> {
    let mut out = earlier.clone();
    out.pointer = pointer.to_string();

    // type: intersection of the declared kinds
    if out.types.is_empty() {
        out.types = later.types.clone();
    } else if !later.types.is_empty() {
        out.types.retain(|t| later.types.contains(t));
        if out.types.is_empty() {
            return Err(GenerateError::ConflictingConstraints {
                pointer: pointer.to_string(),
                keyword: "type".to_string(),
                left: format!("{:?}", earlier.types),
                right: format!("{:?}", later.types),
            });
        }
    }

    for (name, node) in &later.properties {
        match out.properties.get(name) {
            Some(existing) => {
                let child = merge_pair(existing, node, &node.pointer)?;
                out.properties.insert(name.clone(), child);
            }
            None => {
                out.properties.insert(name.clone(), node.clone());
            }
        }
    }

    out.required.extend(later.required.iter().cloned());
    out.required.sort();
    out.required.dedup();

    out.additional = match (out.additional.take(), later.additional.clone()) {
        (None, b) => b,
        (a, None) => a,
        (Some(AdditionalProperties::Allowed(a)), Some(AdditionalProperties::Allowed(b))) => {
            if a != b {
                return Err(conflict(pointer, "additionalProperties", a, b));
            }
            Some(AdditionalProperties::Allowed(a))
        }
        (Some(AdditionalProperties::Schema(a)), Some(AdditionalProperties::Schema(b))) => {
            Some(AdditionalProperties::Schema(Box::new(merge_pair(
                &a, &b, &a.pointer,
            )?)))
        }
        (a, b) => {
            return Err(conflict(
                pointer,
                "additionalProperties",
                format!("{a:?}"),
                format!("{b:?}"),
            ))
        }
    };

    out.items = match (out.items.take(), later.items.clone()) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => Some(Box::new(merge_pair(&a, &b, &a.pointer)?)),
    };

    if out.enum_values.is_empty() {
        out.enum_values = later.enum_values.clone();
    } else if !later.enum_values.is_empty() {
        out.enum_values.retain(|v| later.enum_values.contains(v));
        if out.enum_values.is_empty() {
            return Err(conflict(pointer, "enum", "..", ".."));
        }
    }

    merge_scalar(&mut out.const_value, &later.const_value, pointer, "const")?;
    merge_scalar(&mut out.pattern, &later.pattern, pointer, "pattern")?;
    merge_scalar(&mut out.format, &later.format, pointer, "format")?;
    merge_scalar(&mut out.minimum, &later.minimum, pointer, "minimum")?;
    merge_scalar(&mut out.maximum, &later.maximum, pointer, "maximum")?;
    merge_scalar(
        &mut out.exclusive_minimum,
        &later.exclusive_minimum,
        pointer,
        "exclusiveMinimum",
    )?;
    merge_scalar(
        &mut out.exclusive_maximum,
        &later.exclusive_maximum,
        pointer,
        "exclusiveMaximum",
    )?;
    merge_scalar(&mut out.min_length, &later.min_length, pointer, "minLength")?;
    merge_scalar(&mut out.max_length, &later.max_length, pointer, "maxLength")?;
    merge_scalar(&mut out.min_items, &later.min_items, pointer, "minItems")?;
    merge_scalar(&mut out.max_items, &later.max_items, pointer, "maxItems")?;

    // default: later overrides earlier
    if later.default.is_some() {
        out.default = later.default.clone();
    }
    if later.description.is_some() {
        out.description = later.description.clone();
    }
    if later.title.is_some() {
        out.title = later.title.clone();
    }

    for keyword in &later.unsupported_keywords {
        if !out.unsupported_keywords.contains(keyword) {
            out.unsupported_keywords.push(keyword.clone());
        }
    }
    for keyword in &later.unknown_keywords {
        if !out.unknown_keywords.contains(keyword) {
            out.unknown_keywords.push(keyword.clone());
        }
    }

    // Compositions nested inside a branch survive into the merged node so
    // the synthesizer can reject or recurse as appropriate.
    out.all_of.extend(later.all_of.iter().cloned());
    out.any_of.extend(later.any_of.iter().cloned());
    out.one_of.extend(later.one_of.iter().cloned());

    Ok(out)
}

/// Merge one optional constraint; both present and unequal is fatal.
fn merge_scalar<T: PartialEq + Clone + std::fmt::Debug>(
    slot: &mut Option<T>,
    other: &Option<T>,
    pointer: &str,
    keyword: &str,
) -> Result<()> {
    match (&slot, other) {
        (_, None) => Ok(()),
        (None, Some(v)) => {
            *slot = Some(v.clone());
            Ok(())
        }
        (Some(a), Some(b)) => {
            if *a == *b {
                Ok(())
            } else {
                Err(conflict(pointer, keyword, format!("{a:?}"), format!("{b:?}")))
            }
        }
    }
}

fn conflict(
    pointer: &str,
    keyword: &str,
    left: impl std::fmt::Display,
    right: impl std::fmt::Display,
) -> GenerateError {
    GenerateError::ConflictingConstraints {
        pointer: pointer.to_string(),
        keyword: keyword.to_string(),
        left: left.to_string(),
        right: right.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: serde_json::Value) -> SchemaNode {
        SchemaNode::parse(&value, "").unwrap()
    }

    #[test]
    fn merges_properties_and_unions_required() {
        let merged = merge_all_of(
            &[
                node(json!({
                    "type": "object",
                    "properties": {"a": {"type": "string"}},
                    "required": ["a"]
                })),
                node(json!({
                    "type": "object",
                    "properties": {"b": {"type": "integer"}}
                })),
            ],
            "/allOf",
        )
        .unwrap();

        assert_eq!(merged.required, vec!["a"]);
        assert_eq!(merged.properties.len(), 2);
    }

    #[test]
    fn overlapping_property_constraints_must_agree() {
        let err = merge_all_of(
            &[
                node(json!({"properties": {"a": {"type": "string", "minLength": 1}}})),
                node(json!({"properties": {"a": {"type": "string", "minLength": 2}}})),
            ],
            "/allOf",
        )
        .unwrap_err();
        assert!(matches!(err, GenerateError::ConflictingConstraints { .. }));
    }

    #[test]
    fn later_default_overrides_earlier() {
        let merged = merge_all_of(
            &[
                node(json!({"type": "integer", "default": 1})),
                node(json!({"type": "integer", "default": 2})),
            ],
            "/allOf",
        )
        .unwrap();
        assert_eq!(merged.default, Some(json!(2)));
    }

    #[test]
    fn disjoint_types_conflict() {
        let err = merge_all_of(
            &[node(json!({"type": "string"})), node(json!({"type": "integer"}))],
            "/allOf",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::ConflictingConstraints { keyword, .. } if keyword == "type"
        ));
    }
}
