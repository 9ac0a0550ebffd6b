//! Reference Resolution
//!
//! Follows `$ref` URI-references (intra- and inter-document) to their
//! target nodes. Chains of pure `$ref` wrappers are collapsed with a
//! bounded depth; siblings of `$ref` are preserved by merging them over
//! the resolved target, with the local side winning.

use std::rc::Rc;

use crate::error::{GenerateError, Result, MAX_REF_CHAIN};
use crate::schema::{Loader, NodeId, SchemaDocument, SchemaNode};

/// Outcome of resolving one `$ref`
#[derive(Debug)]
pub struct Resolved {
    /// Document the target node lives in
    pub document: Rc<SchemaDocument>,
    /// The target node, chain-collapsed and sibling-merged
    pub node: SchemaNode,
    /// Identity of the final target, before local siblings were merged
    pub target: NodeId,
    /// Absolute form of the reference
    pub absolute: String,
    /// True when the referring node carried structural siblings
    pub merged: bool,
}

pub struct Resolver<'a> {
    loader: &'a Loader,
}

impl<'a> Resolver<'a> {
    pub fn new(loader: &'a Loader) -> Self {
        Self { loader }
    }

    /// Resolve the `$ref` carried by `local`, merging any siblings.
    pub fn resolve(&self, base: &Rc<SchemaDocument>, local: &SchemaNode) -> Result<Resolved> {
        let reference = local.reference.as_deref().ok_or_else(|| {
            GenerateError::Internal(format!("resolve called on {} without $ref", local.pointer))
        })?;
        let (document, node, absolute, pointer) = self.follow(base, reference, 0)?;
        let target = document.node_id(&pointer);
        let merged = !local.is_plain_reference();
        let mut node = merge_over(&node, local);
        if !merged {
            // A plain reference aliases its target; keep the target's
            // pointer so naming and memoization see the target identity.
            node.pointer = target.pointer.clone();
        }
        Ok(Resolved {
            document,
            node,
            target,
            absolute,
            merged,
        })
    }

    /// Follow one reference, collapsing chains of `$ref` wrappers.
    fn follow(
        &self,
        base: &Rc<SchemaDocument>,
        reference: &str,
        depth: usize,
    ) -> Result<(Rc<SchemaDocument>, SchemaNode, String, String)> {
        if depth >= MAX_REF_CHAIN {
            return Err(GenerateError::RefChainTooDeep {
                reference: reference.to_string(),
                limit: MAX_REF_CHAIN,
            });
        }

        let (uri_part, fragment) = split_reference(reference);
        let document = if uri_part.is_empty() {
            base.clone()
        } else {
            self.loader.load_relative(&base.base_uri(), uri_part)?
        };

        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(GenerateError::Ref {
                reference: reference.to_string(),
                base: base.uri.to_string(),
                reason: "anchor fragments are not supported, use a JSON pointer".to_string(),
            });
        }

        let node = document
            .node_at(fragment)
            .map_err(|e| match e {
                GenerateError::Ref { .. } => GenerateError::Ref {
                    reference: reference.to_string(),
                    base: base.uri.to_string(),
                    reason: "no schema at pointer".to_string(),
                },
                other => other,
            })?;

        if let Some(next) = node.reference.clone() {
            // The landed node is itself a reference; chase it and merge this
            // hop's siblings over the deeper target.
            let (deeper_doc, deeper_node, absolute, pointer) =
                self.follow(&document, &next, depth + 1)?;
            let merged = merge_over(&deeper_node, &node);
            return Ok((deeper_doc, merged, absolute, pointer));
        }

        let absolute = format!("{}#{}", document.uri, fragment);
        Ok((document, (*node).clone(), absolute, fragment.to_string()))
    }
}

/// Split a URI-reference into its URI part and pointer fragment.
fn split_reference(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((uri, fragment)) => (uri, fragment),
        None => (reference, ""),
    }
}

/// Merge `local`'s siblings over the resolved `target`, local wins.
///
/// `required` is unioned; every other keyword present on the local node
/// replaces the target's. The merged node keeps the local pointer so that
/// structurally-merged references get their own identity.
pub fn merge_over(target: &SchemaNode, local: &SchemaNode) -> SchemaNode {
    let mut out = target.clone();
    out.pointer = local.pointer.clone();
    out.reference = None;

    if !local.types.is_empty() {
        out.types = local.types.clone();
    }
    if !local.all_of.is_empty() {
        out.all_of = local.all_of.clone();
    }
    if !local.any_of.is_empty() {
        out.any_of = local.any_of.clone();
    }
    if !local.one_of.is_empty() {
        out.one_of = local.one_of.clone();
    }
    if !local.enum_values.is_empty() {
        out.enum_values = local.enum_values.clone();
    }
    if local.const_value.is_some() {
        out.const_value = local.const_value.clone();
    }
    for (name, node) in &local.properties {
        out.properties.insert(name.clone(), node.clone());
    }
    if !local.required.is_empty() {
        let mut required = out.required.clone();
        required.extend(local.required.iter().cloned());
        required.sort();
        required.dedup();
        out.required = required;
    }
    if local.additional.is_some() {
        out.additional = local.additional.clone();
    }
    if local.items.is_some() {
        out.items = local.items.clone();
    }

    macro_rules! overlay {
        ($($field:ident),*) => {
            $(if local.$field.is_some() { out.$field = local.$field.clone(); })*
        };
    }
    overlay!(
        min_items,
        max_items,
        minimum,
        maximum,
        exclusive_minimum,
        exclusive_maximum,
        pattern,
        format,
        min_length,
        max_length,
        default,
        description,
        title
    );

    for keyword in &local.unsupported_keywords {
        if !out.unsupported_keywords.contains(keyword) {
            out.unsupported_keywords.push(keyword.clone());
        }
    }
    for keyword in &local.unknown_keywords {
        if !out.unknown_keywords.contains(keyword) {
            out.unknown_keywords.push(keyword.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use serde_json::json;
    use url::Url;

    fn loader_with(docs: &[(&str, serde_json::Value)]) -> Loader {
        let loader = Loader::new(&GeneratorConfig::default());
        for (uri, raw) in docs {
            loader.preload(Url::parse(uri).unwrap(), raw.clone());
        }
        loader
    }

    #[test]
    fn resolves_intra_document_pointer() {
        let loader = loader_with(&[(
            "file:///virtual/root.json",
            json!({"$defs": {"name": {"type": "string", "minLength": 1}}}),
        )]);
        let doc = loader
            .load_url(&Url::parse("file:///virtual/root.json").unwrap())
            .unwrap();
        let local = SchemaNode {
            reference: Some("#/$defs/name".to_string()),
            ..SchemaNode::default()
        };
        let resolved = Resolver::new(&loader).resolve(&doc, &local).unwrap();
        assert_eq!(resolved.node.min_length, Some(1));
        assert_eq!(resolved.target.pointer, "/$defs/name");
        assert!(!resolved.merged);
    }

    #[test]
    fn local_description_wins_over_target() {
        let loader = loader_with(&[(
            "file:///virtual/root.json",
            json!({"$defs": {"name": {"type": "string", "description": "far"}}}),
        )]);
        let doc = loader
            .load_url(&Url::parse("file:///virtual/root.json").unwrap())
            .unwrap();
        let local = SchemaNode {
            reference: Some("#/$defs/name".to_string()),
            description: Some("near".to_string()),
            ..SchemaNode::default()
        };
        let resolved = Resolver::new(&loader).resolve(&doc, &local).unwrap();
        assert_eq!(resolved.node.description.as_deref(), Some("near"));
    }

    #[test]
    fn chains_are_collapsed_and_bounded() {
        let loader = loader_with(&[(
            "file:///virtual/root.json",
            json!({"$defs": {
                "a": {"$ref": "#/$defs/b"},
                "b": {"type": "integer"},
                "loop": {"$ref": "#/$defs/loop"}
            }}),
        )]);
        let doc = loader
            .load_url(&Url::parse("file:///virtual/root.json").unwrap())
            .unwrap();
        let resolver = Resolver::new(&loader);

        let local = SchemaNode {
            reference: Some("#/$defs/a".to_string()),
            ..SchemaNode::default()
        };
        let resolved = resolver.resolve(&doc, &local).unwrap();
        assert_eq!(resolved.target.pointer, "/$defs/b");

        let cyclic = SchemaNode {
            reference: Some("#/$defs/loop".to_string()),
            ..SchemaNode::default()
        };
        let err = resolver.resolve(&doc, &cyclic).unwrap_err();
        assert!(matches!(err, GenerateError::RefChainTooDeep { .. }));
    }

    #[test]
    fn missing_target_is_a_ref_error() {
        let loader = loader_with(&[("file:///virtual/root.json", json!({}))]);
        let doc = loader
            .load_url(&Url::parse("file:///virtual/root.json").unwrap())
            .unwrap();
        let local = SchemaNode {
            reference: Some("#/$defs/missing".to_string()),
            ..SchemaNode::default()
        };
        let err = Resolver::new(&loader).resolve(&doc, &local).unwrap_err();
        assert!(matches!(err, GenerateError::Ref { .. }));
    }
}
