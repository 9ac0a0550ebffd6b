//! Type Synthesis
//!
//! The center of the pipeline: walks schema nodes and produces target
//! type declarations in the current package. Composition is normalized
//! first ($ref resolution, allOf merging, union detection, multi-kind
//! `type` arrays), then one shape rule applies.
//!
//! Recursion runs a per-node state machine:
//! `Unseen -> InProgress -> Placeholder -> Completed`. Entering a node
//! that will produce a declaration inserts a forward declaration into
//! the package; a recursive call meeting an InProgress node returns a
//! pointer to that declaration instead of descending. A declaration
//! still in placeholder state at pipeline exit is a generator bug.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::codegen::ast::{
    Constraints, EnumMember, EnumType, GoType, Package, Primitive, StructField, StructType,
    TypeBody, TypeDecl, UnionType, UnionVariant,
};
use crate::codegen::merge::merge_all_of;
use crate::codegen::names::{CaseConverter, IdentAllocator};
use crate::config::GeneratorConfig;
use crate::error::{GenerateError, Result, Warning};
use crate::schema::{
    AdditionalProperties, Loader, NodeId, Resolver, SchemaDocument, SchemaNode, SimpleType,
};

/// Canonical pattern attached to `format: uuid` strings
const UUID_PATTERN: &str =
    "^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

/// Formats that map to domain types or validators
const VALIDATED_FORMATS: &[&str] = &["date-time", "date", "time", "duration", "uuid"];

#[derive(Debug, Clone)]
enum NodeState {
    InProgress { name: Option<String>, hint: String },
    Placeholder { name: String },
    Completed,
}

/// Per-package synthesis. Owns the package being built, the identifier
/// allocator and all memoization state.
pub struct Synthesizer<'a> {
    config: &'a GeneratorConfig,
    loader: &'a Loader,
    case: CaseConverter,
    pub package: Package,
    pub allocator: IdentAllocator,
    pub warnings: Vec<Warning>,
    memo: HashMap<NodeId, GoType>,
    states: HashMap<NodeId, NodeState>,
    dedup: HashMap<String, String>,
}

impl<'a> Synthesizer<'a> {
    pub fn new(
        config: &'a GeneratorConfig,
        loader: &'a Loader,
        package: Package,
        allocator: IdentAllocator,
    ) -> Self {
        Self {
            config,
            loader,
            case: CaseConverter::new(config),
            package,
            allocator,
            warnings: Vec::new(),
            memo: HashMap::new(),
            states: HashMap::new(),
            dedup: HashMap::new(),
        }
    }

    /// Synthesize the root of a document under the given type name.
    ///
    /// A `forced` name comes from a user override and must be used
    /// verbatim; a collision is then fatal instead of rewritten.
    pub fn synthesize_root(
        &mut self,
        doc: &Rc<SchemaDocument>,
        root_name: &str,
        forced: bool,
    ) -> Result<GoType> {
        let root = doc.root()?;
        let id = doc.node_id("");
        let built =
            self.synthesize_identified(&root, doc, id, root_name, forced.then_some(root_name))?;

        let result = if matches!(built, GoType::Named(_)) {
            built
        } else {
            // The root did not produce a declaration of its own (a bare
            // array, map or scalar); pin it down as a defined type so
            // every generated file exports its root.
            let name = if forced {
                if !self.allocator.try_reserve(root_name) {
                    return Err(GenerateError::NamingCollision {
                        package: self.package.name.clone(),
                        name: root_name.to_string(),
                    });
                }
                root_name.to_string()
            } else {
                self.allocator.allocate(&self.case.pascal(root_name))
            };
            let constraints = self.collect_constraints(&root, doc)?;
            self.package.push(TypeDecl {
                name: name.clone(),
                comment: root.description.clone().or_else(|| root.title.clone()),
                body: TypeBody::Alias(built, constraints),
            });
            GoType::Named(name)
        };

        self.warn_unused_defs(doc, &root);
        Ok(result)
    }

    /// Synthesize a node reachable through a stable identity, running the
    /// recursion state machine.
    fn synthesize_identified(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
        id: NodeId,
        fallback_hint: &str,
        forced: Option<&str>,
    ) -> Result<GoType> {
        match self.states.get(&id).cloned() {
            Some(NodeState::Completed) => {
                return Ok(self.memo[&id].clone());
            }
            Some(NodeState::Placeholder { name }) => {
                return Ok(GoType::pointer(GoType::Named(name)));
            }
            Some(NodeState::InProgress { name: Some(name), .. }) => {
                self.states
                    .insert(id, NodeState::Placeholder { name: name.clone() });
                return Ok(GoType::pointer(GoType::Named(name)));
            }
            Some(NodeState::InProgress { name: None, hint }) => {
                // A cycle through a node that was not going to produce a
                // declaration: promote it to one so the back-reference has
                // a name to land on.
                let name = self.allocator.allocate(&self.case.pascal(&hint));
                self.package.push(TypeDecl {
                    name: name.clone(),
                    comment: None,
                    body: TypeBody::Placeholder,
                });
                self.states
                    .insert(id, NodeState::Placeholder { name: name.clone() });
                return Ok(GoType::pointer(GoType::Named(name)));
            }
            None => {}
        }

        self.check_supported(node, doc)?;

        // Structural deduplication: identical normalized forms share one
        // declaration. Reference-carrying subtrees are never deduplicated.
        let hash = structural_hash(node);
        if let Some(hash) = &hash {
            if let Some(existing) = self.dedup.get(hash) {
                let ty = GoType::Named(existing.clone());
                self.memo.insert(id.clone(), ty.clone());
                self.states.insert(id, NodeState::Completed);
                return Ok(ty);
            }
        }

        let hint = hint_for(node, fallback_hint);
        let predecl = if produces_decl(node) {
            let name = match forced {
                Some(forced_name) => {
                    if !self.allocator.try_reserve(forced_name) {
                        return Err(GenerateError::NamingCollision {
                            package: self.package.name.clone(),
                            name: forced_name.to_string(),
                        });
                    }
                    forced_name.to_string()
                }
                None => self.allocator.allocate(&self.case.pascal(&hint)),
            };
            self.package.push(TypeDecl {
                name: name.clone(),
                comment: None,
                body: TypeBody::Placeholder,
            });
            self.states.insert(
                id.clone(),
                NodeState::InProgress {
                    name: Some(name.clone()),
                    hint: hint.clone(),
                },
            );
            Some(name)
        } else {
            self.states.insert(
                id.clone(),
                NodeState::InProgress {
                    name: None,
                    hint: hint.clone(),
                },
            );
            None
        };

        let built = self.synthesize_shape(node, doc, &hint, predecl.as_deref())?;

        let result = match self.states.get(&id).cloned() {
            Some(NodeState::Placeholder { name }) if predecl.is_none() => {
                // A back-reference promoted this node mid-synthesis; wrap
                // the structural result in the promised declaration.
                let constraints = self.collect_constraints(node, doc)?;
                self.package.complete(
                    &name,
                    node.description.clone(),
                    TypeBody::Alias(built, constraints),
                );
                GoType::Named(name)
            }
            _ => built,
        };

        if let (Some(hash), GoType::Named(name)) = (&hash, &result) {
            self.dedup.insert(hash.clone(), name.clone());
        }
        self.memo.insert(id.clone(), result.clone());
        self.states.insert(id, NodeState::Completed);
        Ok(result)
    }

    /// Synthesize an anonymous (structurally reached) node.
    pub fn synthesize(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
        hint: &str,
    ) -> Result<GoType> {
        if let Some(boolean) = node.boolean {
            return Ok(if boolean { GoType::Any } else { GoType::Empty });
        }
        self.check_supported(node, doc)?;

        if node.reference.is_some() {
            let resolver = Resolver::new(self.loader);
            let resolved = resolver.resolve(doc, node)?;
            debug!(reference = %resolved.absolute, "resolved $ref");
            if resolved.merged {
                // Structural siblings force a merged, locally-owned node.
                return self.synthesize(&resolved.node, &resolved.document, hint);
            }
            let target = resolved.target.clone();
            return self.synthesize_identified(
                &resolved.node,
                &resolved.document,
                target,
                hint,
                None,
            );
        }

        self.synthesize_shape(node, doc, hint, None)
    }

    /// Shape selection after normalization. `predecl` names a forward
    /// declaration this node must complete instead of allocating its own.
    fn synthesize_shape(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
        hint: &str,
        predecl: Option<&str>,
    ) -> Result<GoType> {
        if let Some(boolean) = node.boolean {
            let ty = if boolean { GoType::Any } else { GoType::Empty };
            return self.finish_structural(node, doc, ty, predecl);
        }
        if node.reference.is_some() {
            let ty = self.synthesize(node, doc, hint)?;
            return self.finish_structural(node, doc, ty, predecl);
        }

        self.warn_unknown_keywords(node, doc);

        if !node.all_of.is_empty() {
            let merged = self.expand_all_of(node, doc)?;
            self.check_supported(&merged, doc)?;
            return self.synthesize_shape(&merged, doc, hint, predecl);
        }

        if !node.enum_values.is_empty() {
            return self.synthesize_enum(node, hint, predecl);
        }

        if let Some(const_value) = &node.const_value {
            if const_value.is_string() || const_value.is_number() || const_value.is_boolean() {
                let singleton = SchemaNode {
                    enum_values: vec![const_value.clone()],
                    ..node.clone()
                };
                return self.synthesize_enum(&singleton, hint, predecl);
            }
            // Composite consts stay inline: the structural type plus a
            // const equality check in the validator.
            let ty = self.kind_type(node, doc, hint, None)?;
            return self.finish_structural(node, doc, ty, predecl);
        }

        let variants: &[SchemaNode] = if !node.one_of.is_empty() {
            &node.one_of
        } else {
            &node.any_of
        };
        if !variants.is_empty() {
            if variants.len() == 1 {
                return self.synthesize(&variants[0], doc, hint);
            }
            if let Some(inner) = nullable_pair(variants) {
                let ty = self.synthesize(inner, doc, hint)?;
                return Ok(GoType::pointer(ty));
            }
            return self.synthesize_union(node, variants, doc, hint, predecl);
        }

        let ty = self.kind_type(node, doc, hint, predecl)?;
        self.finish_structural(node, doc, ty, predecl)
    }

    /// Honor a promised forward declaration when the shape turned out
    /// structural: complete it as a defined type over the built type.
    fn finish_structural(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
        ty: GoType,
        predecl: Option<&str>,
    ) -> Result<GoType> {
        let Some(name) = predecl else {
            return Ok(ty);
        };
        if matches!(ty, GoType::Named(_)) {
            return Ok(ty);
        }
        let constraints = self.collect_constraints(node, doc)?;
        self.package
            .complete(name, node.description.clone(), TypeBody::Alias(ty, constraints));
        Ok(GoType::Named(name.to_string()))
    }

    /// Map the `type` keyword (and friends) to a Go type.
    fn kind_type(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
        hint: &str,
        predecl: Option<&str>,
    ) -> Result<GoType> {
        // ["string","null"] and friends: nullability folds into a pointer.
        let mut kinds = node.types.clone();
        let had_null = kinds.iter().any(|t| *t == SimpleType::Null);
        kinds.retain(|t| *t != SimpleType::Null);

        let base = match kinds.as_slice() {
            [] if !node.properties.is_empty() => {
                self.synthesize_object(node, doc, hint, predecl)?
            }
            [] if node.items.is_some() => self.synthesize_array(node, doc, hint)?,
            [] => {
                if node.is_empty_schema() && !node.pointer.is_empty() {
                    debug!(pointer = %node.pointer, "empty schema maps to interface{{}}");
                }
                GoType::Any
            }
            [SimpleType::Object] => self.synthesize_object(node, doc, hint, predecl)?,
            [SimpleType::Array] => self.synthesize_array(node, doc, hint)?,
            [SimpleType::String] => self.string_type(node),
            [SimpleType::Integer] => GoType::Primitive(self.integer_type(node)),
            [SimpleType::Number] => GoType::Primitive(Primitive::Float64),
            [SimpleType::Boolean] => GoType::Primitive(Primitive::Bool),
            _ => {
                self.warnings.push(Warning::new(
                    format!("{}#{}", doc.uri, node.pointer),
                    format!(
                        "multiple type kinds {:?} synthesize to interface{{}}",
                        kinds.iter().map(|t| t.keyword()).collect::<Vec<_>>()
                    ),
                ));
                GoType::Any
            }
        };

        if had_null && !kinds.is_empty() {
            return Ok(GoType::pointer(base));
        }
        Ok(base)
    }

    fn string_type(&self, node: &SchemaNode) -> GoType {
        match node.format.as_deref() {
            Some("date-time") => GoType::DateTime,
            Some("date") => GoType::Date,
            Some("time") => GoType::Time,
            Some("duration") => GoType::Duration,
            _ => GoType::Primitive(Primitive::String),
        }
    }

    /// Narrow integer selection under `--min-sized-ints`: the smallest
    /// type whose range covers `[minimum, maximum]`.
    fn integer_type(&self, node: &SchemaNode) -> Primitive {
        if !self.config.min_sized_ints {
            return Primitive::Int;
        }
        let min = match (node.exclusive_minimum, node.minimum) {
            (Some(x), _) => Some(x + 1.0),
            (None, m) => m,
        };
        let max = match (node.exclusive_maximum, node.maximum) {
            (Some(x), _) => Some(x - 1.0),
            (None, m) => m,
        };
        let (min, max) = match (min, max) {
            (Some(min), Some(max)) => (min, max),
            (Some(min), None) if min >= 0.0 => return Primitive::Uint,
            _ => return Primitive::Int,
        };
        if min >= 0.0 {
            if max <= u8::MAX as f64 {
                Primitive::Uint8
            } else if max <= u16::MAX as f64 {
                Primitive::Uint16
            } else if max <= u32::MAX as f64 {
                Primitive::Uint32
            } else {
                Primitive::Uint64
            }
        } else if min >= i8::MIN as f64 && max <= i8::MAX as f64 {
            Primitive::Int8
        } else if min >= i16::MIN as f64 && max <= i16::MAX as f64 {
            Primitive::Int16
        } else if min >= i32::MIN as f64 && max <= i32::MAX as f64 {
            Primitive::Int32
        } else {
            Primitive::Int64
        }
    }

    fn synthesize_array(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
        hint: &str,
    ) -> Result<GoType> {
        let elem = match &node.items {
            Some(items) => self.synthesize(items, doc, &format!("{hint}Elem"))?,
            None => GoType::Any,
        };
        Ok(GoType::array(elem))
    }

    /// Object synthesis: a named struct when properties exist, a map
    /// (or the empty struct) otherwise.
    fn synthesize_object(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
        hint: &str,
        predecl_override: Option<&str>,
    ) -> Result<GoType> {
        if node.properties.is_empty() {
            return Ok(match &node.additional {
                Some(AdditionalProperties::Allowed(false)) => GoType::Empty,
                Some(AdditionalProperties::Schema(value)) => {
                    let value_ty = self.synthesize(value, doc, &format!("{hint}Value"))?;
                    GoType::string_map(value_ty)
                }
                _ => GoType::string_map(GoType::Any),
            });
        }

        let anon_hash = if predecl_override.is_none() {
            if let Some(hash) = structural_hash(node) {
                if let Some(existing) = self.dedup.get(&hash) {
                    return Ok(GoType::Named(existing.clone()));
                }
                Some(hash)
            } else {
                None
            }
        } else {
            None
        };

        let name = match predecl_override {
            Some(name) => name.to_string(),
            None => {
                // A titled schema names itself; the hint is the fallback.
                let base = node.title.as_deref().unwrap_or(hint);
                let name = self.allocator.allocate(&self.case.pascal(base));
                self.package.push(TypeDecl {
                    name: name.clone(),
                    comment: None,
                    body: TypeBody::Placeholder,
                });
                name
            }
        };
        if let Some(hash) = anon_hash {
            self.dedup.insert(hash, name.clone());
        }

        let mut fields = Vec::with_capacity(node.properties.len() + 1);
        let mut field_names = IdentAllocator::new();

        for (prop, child) in &node.properties {
            let field_name = field_names.allocate(&self.case.pascal(prop));
            let child_hint = format!("{name}{}", self.case.pascal(prop));
            let ty = self.synthesize(child, doc, &child_hint)?;

            let required = node.required.iter().any(|r| r == prop);
            let default = child.default.clone();
            let ty = if !required && default.is_none() && !ty.has_zero_absent_state() {
                GoType::pointer(ty)
            } else {
                ty
            };

            let constraints = self.collect_constraints(child, doc)?;
            fields.push(StructField {
                name: field_name,
                json_name: prop.clone(),
                ty,
                required,
                default,
                comment: child.description.clone(),
                constraints,
                catch_all: false,
            });
        }

        let mut strict_additional = false;
        match &node.additional {
            Some(AdditionalProperties::Allowed(false)) => {
                strict_additional = true;
            }
            Some(AdditionalProperties::Schema(value)) => {
                let value_ty = self.synthesize(value, doc, &format!("{name}Extra"))?;
                fields.push(catch_all_field(
                    field_names.allocate("AdditionalProperties"),
                    value_ty,
                ));
            }
            _ => {
                fields.push(catch_all_field(
                    field_names.allocate("AdditionalProperties"),
                    GoType::Any,
                ));
            }
        }

        let body = TypeBody::Struct(StructType {
            fields,
            strict_additional,
        });
        let comment = node.description.clone().or_else(|| node.title.clone());
        self.package.complete(&name, comment, body);
        Ok(GoType::Named(name))
    }

    fn synthesize_enum(
        &mut self,
        node: &SchemaNode,
        hint: &str,
        predecl: Option<&str>,
    ) -> Result<GoType> {
        let anon_hash = match predecl {
            None => structural_hash(node),
            Some(_) => None,
        };
        if let Some(hash) = &anon_hash {
            if let Some(existing) = self.dedup.get(hash) {
                return Ok(GoType::Named(existing.clone()));
            }
        }

        let name = match predecl {
            Some(name) => name.to_string(),
            None => {
                let base = node.title.as_deref().unwrap_or(hint);
                let name = self.allocator.allocate(&self.case.pascal(base));
                self.package.push(TypeDecl {
                    name: name.clone(),
                    comment: None,
                    body: TypeBody::Placeholder,
                });
                name
            }
        };
        if let Some(hash) = anon_hash {
            self.dedup.insert(hash, name.clone());
        }

        let base = enum_base(&node.enum_values);
        let mut member_names = IdentAllocator::new();
        let members = node
            .enum_values
            .iter()
            .map(|value| {
                let candidate = self.case.enum_member(&name, value);
                let unique = if member_names.try_reserve(&candidate) {
                    candidate
                } else {
                    // collision between slugs ("a-b" and "a_b"): suffix
                    let mut n = 2;
                    loop {
                        let retry = format!("{candidate}_{n}");
                        if member_names.try_reserve(&retry) {
                            break retry;
                        }
                        n += 1;
                    }
                };
                EnumMember {
                    name: unique,
                    value: value.clone(),
                }
            })
            .collect();

        let comment = node.description.clone().or_else(|| node.title.clone());
        self.package
            .complete(&name, comment, TypeBody::Enum(EnumType { base, members }));
        Ok(GoType::Named(name))
    }

    fn synthesize_union(
        &mut self,
        node: &SchemaNode,
        variants: &[SchemaNode],
        doc: &Rc<SchemaDocument>,
        hint: &str,
        predecl: Option<&str>,
    ) -> Result<GoType> {
        let name = match predecl {
            Some(name) => name.to_string(),
            None => {
                let base = node.title.as_deref().unwrap_or(hint);
                let name = self.allocator.allocate(&self.case.pascal(base));
                self.package.push(TypeDecl {
                    name: name.clone(),
                    comment: None,
                    body: TypeBody::Placeholder,
                });
                name
            }
        };

        // Resolve variant refs once for classification purposes.
        let resolver = Resolver::new(self.loader);
        let mut concrete = Vec::with_capacity(variants.len());
        for variant in variants {
            if variant.reference.is_some() {
                concrete.push(resolver.resolve(doc, variant)?.node);
            } else {
                concrete.push(variant.clone());
            }
        }

        let discriminator = detect_discriminator(&concrete);
        if discriminator.is_none() {
            self.warn_overlapping_variants(node, doc, &concrete);
        }

        let mut union_variants = Vec::with_capacity(variants.len());
        let mut variant_names = IdentAllocator::new();
        for (i, (variant, resolved)) in variants.iter().zip(&concrete).enumerate() {
            let tag = discriminator
                .as_ref()
                .and_then(|(prop, _)| variant_tag(resolved, prop));
            let base_hint = resolved
                .title
                .clone()
                .or_else(|| tag.as_ref().and_then(|t| t.as_str().map(String::from)))
                .unwrap_or_else(|| format!("Alt{}", i + 1));
            let ty = self.synthesize(variant, doc, &format!("{name}{}", self.case.pascal(&base_hint)))?;

            let field_base = match &ty {
                GoType::Named(n) => n.clone(),
                _ => self.case.pascal(&base_hint),
            };
            union_variants.push(UnionVariant {
                name: variant_names.allocate(&field_base),
                ty: GoType::pointer(ty),
                tag,
            });
        }

        let comment = node.description.clone().or_else(|| node.title.clone());
        self.package.complete(
            &name,
            comment,
            TypeBody::Union(UnionType {
                variants: union_variants,
                discriminator: discriminator.map(|(prop, _)| prop),
            }),
        );
        Ok(GoType::Named(name))
    }

    /// Iteratively expand allOf, resolving branch references first.
    fn expand_all_of(&mut self, node: &SchemaNode, doc: &Rc<SchemaDocument>) -> Result<SchemaNode> {
        let resolver = Resolver::new(self.loader);
        let mut current = node.clone();
        // Each round folds one layer of allOf; nested layers surface in
        // the merged node and are folded on the next round.
        for _ in 0..crate::error::MAX_REF_CHAIN {
            if current.all_of.is_empty() {
                return Ok(current);
            }
            let branches = std::mem::take(&mut current.all_of);
            let mut resolved = vec![current.clone()];
            for branch in &branches {
                if branch.reference.is_some() {
                    resolved.push(resolver.resolve(doc, branch)?.node);
                } else {
                    resolved.push(branch.clone());
                }
            }
            current = merge_all_of(&resolved, &node.pointer)?;
        }
        Err(GenerateError::RefChainTooDeep {
            reference: format!("{}#{}", doc.uri, node.pointer),
            limit: crate::error::MAX_REF_CHAIN,
        })
    }

    /// Gather validation constraints from a node, checking patterns.
    fn collect_constraints(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
    ) -> Result<Constraints> {
        let mut constraints = Constraints {
            pattern: node.pattern.clone(),
            min_length: node.min_length,
            max_length: node.max_length,
            minimum: node.minimum,
            maximum: node.maximum,
            exclusive_minimum: node.exclusive_minimum,
            exclusive_maximum: node.exclusive_maximum,
            min_items: node.min_items,
            max_items: node.max_items,
            const_value: node.const_value.clone(),
            format: node.format.clone(),
        };

        if let Some(pattern) = &constraints.pattern {
            regex::Regex::new(pattern).map_err(|e| GenerateError::InvalidPattern {
                pointer: format!("{}#{}", doc.uri, node.pointer),
                pattern: pattern.clone(),
                source: Box::new(e),
            })?;
        }

        match constraints.format.as_deref() {
            Some("uuid") if constraints.pattern.is_none() => {
                constraints.pattern = Some(UUID_PATTERN.to_string());
            }
            Some(format) if !VALIDATED_FORMATS.contains(&format) => {
                self.warnings.push(Warning::new(
                    format!("{}#{}", doc.uri, node.pointer),
                    format!("format {format:?} has no matching validator"),
                ));
            }
            _ => {}
        }

        Ok(constraints)
    }

    fn check_supported(&self, node: &SchemaNode, doc: &Rc<SchemaDocument>) -> Result<()> {
        if let Some(keyword) = node.unsupported_keywords.first() {
            return Err(GenerateError::UnsupportedSchema {
                pointer: format!("{}#{}", doc.uri, node.pointer),
                keyword: keyword.clone(),
            });
        }
        Ok(())
    }

    fn warn_unknown_keywords(&mut self, node: &SchemaNode, doc: &Rc<SchemaDocument>) {
        for keyword in &node.unknown_keywords {
            self.warnings.push(Warning::new(
                format!("{}#{}", doc.uri, node.pointer),
                format!("ignoring unknown keyword {keyword:?}"),
            ));
        }
    }

    fn warn_overlapping_variants(
        &mut self,
        node: &SchemaNode,
        doc: &Rc<SchemaDocument>,
        concrete: &[SchemaNode],
    ) {
        for (i, a) in concrete.iter().enumerate() {
            for b in concrete.iter().skip(i + 1) {
                let both_objects = !a.properties.is_empty() && !b.properties.is_empty();
                if both_objects && a.required == b.required {
                    self.warnings.push(Warning::new(
                        format!("{}#{}", doc.uri, node.pointer),
                        "undiscriminated union variants are not distinguished by required \
                         properties; the earlier variant wins on ambiguous input"
                            .to_string(),
                    ));
                    return;
                }
            }
        }
    }

    fn warn_unused_defs(&mut self, doc: &Rc<SchemaDocument>, root: &SchemaNode) {
        for (def_name, def) in &root.defs {
            let used = self.memo.keys().chain(self.states.keys()).any(|id| {
                id.document == doc.uri.as_str() && id.pointer.starts_with(&def.pointer)
            });
            if !used {
                self.warnings.push(Warning::new(
                    format!("{}#{}", doc.uri, def.pointer),
                    format!("unused $defs entry {def_name:?}"),
                ));
            }
        }
    }
}

fn catch_all_field(name: String, value_ty: GoType) -> StructField {
    StructField {
        name,
        json_name: String::new(),
        ty: GoType::string_map(value_ty),
        required: false,
        default: None,
        comment: Some("Properties not declared in the schema".to_string()),
        constraints: Constraints::default(),
        catch_all: true,
    }
}

/// Will this node produce a named declaration of its own?
fn produces_decl(node: &SchemaNode) -> bool {
    if node.boolean.is_some() {
        return false;
    }
    if !node.enum_values.is_empty() || !node.all_of.is_empty() {
        return true;
    }
    if let Some(const_value) = &node.const_value {
        return const_value.is_string() || const_value.is_number() || const_value.is_boolean();
    }
    let variants: &[SchemaNode] = if !node.one_of.is_empty() {
        &node.one_of
    } else {
        &node.any_of
    };
    if !variants.is_empty() {
        return variants.len() >= 2 && nullable_pair(variants).is_none();
    }
    let object_kind = node.types.contains(&SimpleType::Object)
        || (node.types.is_empty() && !node.properties.is_empty());
    object_kind && !node.properties.is_empty()
}

/// `oneOf: [T, {type: null}]` collapses to a pointer, not a union.
fn nullable_pair(variants: &[SchemaNode]) -> Option<&SchemaNode> {
    if variants.len() != 2 {
        return None;
    }
    let is_null = |n: &SchemaNode| n.types == vec![SimpleType::Null] && n.properties.is_empty();
    if is_null(&variants[0]) {
        Some(&variants[1])
    } else if is_null(&variants[1]) {
        Some(&variants[0])
    } else {
        None
    }
}

/// A name hint derived from the node itself, falling back to the caller's.
fn hint_for(node: &SchemaNode, fallback: &str) -> String {
    if let Some(title) = &node.title {
        return title.clone();
    }
    let last = node.pointer.rsplit('/').next().unwrap_or("");
    if !last.is_empty() && last != "items" && !last.chars().all(|c| c.is_ascii_digit()) {
        return last.replace("~1", "/").replace("~0", "~");
    }
    fallback.to_string()
}

/// Detect a discriminator: a property every variant constrains to a
/// distinct constant. Returns the property and the constant per variant.
fn detect_discriminator(variants: &[SchemaNode]) -> Option<(String, Vec<Value>)> {
    if variants.len() < 2 || variants.iter().any(|v| v.properties.is_empty()) {
        return None;
    }
    let candidates: Vec<&String> = variants[0].properties.keys().collect();
    'candidate: for prop in candidates {
        let mut tags = Vec::with_capacity(variants.len());
        for variant in variants {
            // Tags must be strings: the generated dispatch decodes the
            // discriminator property as a string.
            match variant
                .properties
                .get(prop)
                .and_then(variant_const)
                .filter(Value::is_string)
            {
                Some(tag) => {
                    if tags.contains(&tag) {
                        continue 'candidate;
                    }
                    tags.push(tag);
                }
                None => continue 'candidate,
            }
        }
        return Some((prop.clone(), tags));
    }
    None
}

fn variant_const(node: &SchemaNode) -> Option<Value> {
    if let Some(c) = &node.const_value {
        return Some(c.clone());
    }
    if node.enum_values.len() == 1 {
        return Some(node.enum_values[0].clone());
    }
    None
}

fn variant_tag(variant: &SchemaNode, prop: &str) -> Option<Value> {
    variant.properties.get(prop).and_then(variant_const)
}

/// Base type of an enum declaration, from its member values.
fn enum_base(values: &[Value]) -> GoType {
    if values.iter().all(Value::is_string) {
        GoType::Primitive(Primitive::String)
    } else if values.iter().all(Value::is_i64) {
        GoType::Primitive(Primitive::Int)
    } else if values.iter().all(Value::is_number) {
        GoType::Primitive(Primitive::Float64)
    } else if values.iter().all(Value::is_boolean) {
        GoType::Primitive(Primitive::Bool)
    } else {
        GoType::Any
    }
}

/// Hash of the normalized structural form, ignoring `description` and
/// `title`. Returns None when the subtree carries references, which
/// cannot be compared structurally.
pub fn structural_hash(node: &SchemaNode) -> Option<String> {
    let mut canonical = String::new();
    if !write_canonical(node, &mut canonical) {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

fn write_canonical(node: &SchemaNode, out: &mut String) -> bool {
    if node.reference.is_some() {
        return false;
    }
    let _ = write!(out, "b:{:?};", node.boolean);
    let _ = write!(
        out,
        "t:{};",
        node.types.iter().map(|t| t.keyword()).collect::<Vec<_>>().join(",")
    );
    for (label, list) in [("all", &node.all_of), ("any", &node.any_of), ("one", &node.one_of)] {
        let _ = write!(out, "{label}[");
        for sub in list {
            if !write_canonical(sub, out) {
                return false;
            }
        }
        out.push(']');
    }
    let _ = write!(out, "e:{};", Value::Array(node.enum_values.clone()));
    let _ = write!(out, "c:{:?};", node.const_value);
    out.push_str("p{");
    for (name, sub) in &node.properties {
        let _ = write!(out, "{name}=>");
        if !write_canonical(sub, out) {
            return false;
        }
    }
    out.push('}');
    let _ = write!(out, "r:{:?};", node.required);
    match &node.additional {
        None => out.push_str("a:_;"),
        Some(AdditionalProperties::Allowed(b)) => {
            let _ = write!(out, "a:{b};");
        }
        Some(AdditionalProperties::Schema(sub)) => {
            out.push_str("a:s;");
            if !write_canonical(sub, out) {
                return false;
            }
        }
    }
    if let Some(items) = &node.items {
        out.push_str("i:");
        if !write_canonical(items, out) {
            return false;
        }
    }
    let _ = write!(
        out,
        "k:{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?};d:{:?};",
        node.min_items,
        node.max_items,
        node.minimum,
        node.maximum,
        node.exclusive_minimum,
        node.exclusive_maximum,
        node.pattern,
        node.format,
        node.min_length,
        node.max_length,
        node.default,
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use url::Url;

    fn synthesize_value(value: Value) -> (GoType, Package, Vec<Warning>) {
        let config = GeneratorConfig::default();
        let loader = Loader::new(&config);
        let doc = loader.preload(Url::parse("file:///virtual/test.json").unwrap(), value);
        let package = Package::new("models", PathBuf::from("models.go"));
        let mut synth = Synthesizer::new(&config, &loader, package, IdentAllocator::new());
        let ty = synth.synthesize_root(&doc, "Test", false).unwrap();
        (ty, synth.package, synth.warnings)
    }

    #[test]
    fn object_fields_follow_required_rules() {
        let (ty, package, _) = synthesize_value(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            },
            "required": ["name"]
        }));
        assert_eq!(ty, GoType::Named("Test".to_string()));

        let decl = package.get("Test").unwrap();
        let TypeBody::Struct(st) = &decl.body else {
            panic!("expected struct, got {:?}", decl.body);
        };
        let name = st.fields.iter().find(|f| f.json_name == "name").unwrap();
        assert!(name.required);
        assert_eq!(name.ty, GoType::Primitive(Primitive::String));

        let age = st.fields.iter().find(|f| f.json_name == "age").unwrap();
        assert!(!age.required);
        assert_eq!(age.ty, GoType::pointer(GoType::Primitive(Primitive::Int)));
        assert_eq!(age.constraints.minimum, Some(0.0));

        assert!(st.catch_all().is_some());
    }

    #[test]
    fn enum_members_are_named_from_the_hint() {
        let (ty, package, _) = synthesize_value(json!({
            "title": "Color",
            "enum": ["red", "green", "blue"]
        }));
        assert_eq!(ty, GoType::Named("Color".to_string()));
        let TypeBody::Enum(en) = &package.get("Color").unwrap().body else {
            panic!("expected enum");
        };
        let names: Vec<&str> = en.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["ColorRed", "ColorGreen", "ColorBlue"]);
        assert_eq!(en.base, GoType::Primitive(Primitive::String));
    }

    #[test]
    fn all_of_merges_into_one_struct() {
        let (_, package, _) = synthesize_value(json!({
            "title": "Merged",
            "allOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}, "required": ["a"]},
                {"type": "object", "properties": {"b": {"type": "integer"}}}
            ]
        }));
        let TypeBody::Struct(st) = &package.get("Merged").unwrap().body else {
            panic!("expected struct");
        };
        let a = st.fields.iter().find(|f| f.json_name == "a").unwrap();
        assert!(a.required);
        let b = st.fields.iter().find(|f| f.json_name == "b").unwrap();
        assert_eq!(b.ty, GoType::pointer(GoType::Primitive(Primitive::Int)));
    }

    #[test]
    fn recursive_schema_terminates_with_a_pointer() {
        let (ty, package, _) = synthesize_value(json!({
            "title": "Node",
            "type": "object",
            "properties": {
                "children": {"type": "array", "items": {"$ref": "#"}}
            }
        }));
        assert_eq!(ty, GoType::Named("Node".to_string()));
        let TypeBody::Struct(st) = &package.get("Node").unwrap().body else {
            panic!("expected struct");
        };
        let children = st.fields.iter().find(|f| f.json_name == "children").unwrap();
        assert_eq!(
            children.ty,
            GoType::array(GoType::pointer(GoType::Named("Node".to_string())))
        );
        assert!(package.incomplete().is_empty());
    }

    #[test]
    fn discriminated_union_detection() {
        let (ty, package, _) = synthesize_value(json!({
            "title": "Event",
            "oneOf": [
                {
                    "type": "object",
                    "title": "Created",
                    "properties": {"kind": {"const": "a"}, "at": {"type": "string"}},
                    "required": ["kind"]
                },
                {
                    "type": "object",
                    "title": "Deleted",
                    "properties": {"kind": {"const": "b"}},
                    "required": ["kind"]
                }
            ]
        }));
        assert_eq!(ty, GoType::Named("Event".to_string()));
        let TypeBody::Union(un) = &package.get("Event").unwrap().body else {
            panic!("expected union");
        };
        assert_eq!(un.discriminator.as_deref(), Some("kind"));
        assert_eq!(un.variants[0].tag, Some(json!("a")));
        assert_eq!(un.variants[1].tag, Some(json!("b")));
    }

    #[test]
    fn nullable_type_array_becomes_pointer() {
        let (_, package, _) = synthesize_value(json!({
            "type": "object",
            "properties": {
                "nick": {"type": ["string", "null"]}
            },
            "required": ["nick"]
        }));
        let TypeBody::Struct(st) = &package.get("Test").unwrap().body else {
            panic!("expected struct");
        };
        let nick = st.fields.iter().find(|f| f.json_name == "nick").unwrap();
        assert_eq!(nick.ty, GoType::pointer(GoType::Primitive(Primitive::String)));
    }

    #[test]
    fn identical_defs_share_one_declaration() {
        let (_, package, _) = synthesize_value(json!({
            "type": "object",
            "properties": {
                "home": {"$ref": "#/$defs/address"},
                "work": {"$ref": "#/$defs/work"}
            },
            "$defs": {
                "address": {"type": "object", "properties": {"street": {"type": "string"}}},
                "work": {"type": "object", "properties": {"street": {"type": "string"}}}
            }
        }));
        let named: Vec<&str> = package
            .decls()
            .iter()
            .filter(|d| matches!(d.body, TypeBody::Struct(_)))
            .map(|d| d.name.as_str())
            .collect();
        // Test itself plus exactly one shared address struct
        assert_eq!(named.len(), 2, "decls: {named:?}");
    }

    #[test]
    fn unsupported_keywords_are_fatal() {
        let config = GeneratorConfig::default();
        let loader = Loader::new(&config);
        let doc = loader.preload(
            Url::parse("file:///virtual/bad.json").unwrap(),
            json!({"if": {"type": "string"}, "then": {}}),
        );
        let package = Package::new("models", PathBuf::from("models.go"));
        let mut synth = Synthesizer::new(&config, &loader, package, IdentAllocator::new());
        let err = synth.synthesize_root(&doc, "Bad", false).unwrap_err();
        assert!(matches!(err, GenerateError::UnsupportedSchema { .. }));
    }

    #[test]
    fn min_sized_ints_narrow_from_bounds() {
        let config = GeneratorConfig {
            min_sized_ints: true,
            ..GeneratorConfig::default()
        };
        let loader = Loader::new(&config);
        let doc = loader.preload(
            Url::parse("file:///virtual/sized.json").unwrap(),
            json!({
                "type": "object",
                "properties": {
                    "small": {"type": "integer", "minimum": 0, "maximum": 200},
                    "wide": {"type": "integer", "minimum": -40000, "maximum": 40000}
                },
                "required": ["small", "wide"]
            }),
        );
        let package = Package::new("models", PathBuf::from("models.go"));
        let mut synth = Synthesizer::new(&config, &loader, package, IdentAllocator::new());
        synth.synthesize_root(&doc, "Sized", false).unwrap();
        let TypeBody::Struct(st) = &synth.package.get("Sized").unwrap().body else {
            panic!("expected struct");
        };
        assert_eq!(
            st.fields.iter().find(|f| f.json_name == "small").unwrap().ty,
            GoType::Primitive(Primitive::Uint8)
        );
        assert_eq!(
            st.fields.iter().find(|f| f.json_name == "wide").unwrap().ty,
            GoType::Primitive(Primitive::Int32)
        );
    }
}
