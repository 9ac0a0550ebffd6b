//! Validator / Codec Synthesis
//!
//! Emits, per generated type, the Go decoding routine (required-field
//! checks, default injection, additional-property handling), the
//! post-decode validation routine, union marshal/unmarshal pairs, and
//! `New*` constructors preloaded with defaults.
//!
//! Default values are type-checked here at generation time; the
//! generated code never discovers a malformed default at runtime.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::codegen::ast::{
    Constraints, EnumType, GoType, Package, Primitive, StructField, StructType, TypeBody,
    TypeDecl, UnionType,
};
use crate::codegen::emit::{any_literal, quote, quote_pattern, scalar_literal, Emitter};
use crate::config::GeneratorConfig;
use crate::error::{GenerateError, Result};

/// Shared emission state for one output file: import requirements and
/// the lazily-built support block (error types, parsing helpers).
pub struct CodecState {
    pub imports: BTreeSet<String>,
    pub support: String,
    support_done: bool,
    duration_done: bool,
}

impl CodecState {
    pub fn new() -> Self {
        Self {
            imports: BTreeSet::new(),
            support: String::new(),
            support_done: false,
            duration_done: false,
        }
    }

    /// Emit the generated error taxonomy once per file.
    fn ensure_support(&mut self) {
        if self.support_done {
            return;
        }
        self.support_done = true;
        self.imports.insert("fmt".to_string());

        let mut e = Emitter::new(usize::MAX);
        e.line("// MissingFieldError reports a required property absent from the input.");
        e.line("type MissingFieldError struct {");
        e.indent();
        e.line("Path string");
        e.dedent();
        e.line("}");
        e.blank();
        e.line("func (e *MissingFieldError) Error() string {");
        e.indent();
        e.line("return fmt.Sprintf(\"missing required field %q\", e.Path)");
        e.dedent();
        e.line("}");
        e.blank();
        e.line("// ValidationError reports a value that violates a schema constraint.");
        e.line("type ValidationError struct {");
        e.indent();
        e.line("Path   string");
        e.line("Rule   string");
        e.line("Actual interface{}");
        e.dedent();
        e.line("}");
        e.blank();
        e.line("func (e *ValidationError) Error() string {");
        e.indent();
        e.line("return fmt.Sprintf(\"field %q violates %s (got %v)\", e.Path, e.Rule, e.Actual)");
        e.dedent();
        e.line("}");
        e.blank();
        e.line("// UnionNoMatchError reports input that matches no union variant.");
        e.line("type UnionNoMatchError struct {");
        e.indent();
        e.line("Path  string");
        e.line("Tried int");
        e.dedent();
        e.line("}");
        e.blank();
        e.line("func (e *UnionNoMatchError) Error() string {");
        e.indent();
        e.line("return fmt.Sprintf(\"field %q matches none of %d union variants\", e.Path, e.Tried)");
        e.dedent();
        e.line("}");
        e.blank();
        e.line("// AdditionalPropertyError reports a property the schema does not allow.");
        e.line("type AdditionalPropertyError struct {");
        e.indent();
        e.line("Path string");
        e.dedent();
        e.line("}");
        e.blank();
        e.line("func (e *AdditionalPropertyError) Error() string {");
        e.indent();
        e.line("return fmt.Sprintf(\"additional property %q is not allowed\", e.Path)");
        e.dedent();
        e.line("}");
        e.blank();
        self.support.push_str(&e.into_string());
    }

    /// Emit the ISO 8601 duration parser once per file.
    fn ensure_duration_helper(&mut self) {
        if self.duration_done {
            return;
        }
        self.duration_done = true;
        self.imports.insert("fmt".to_string());
        self.imports.insert("strconv".to_string());
        self.imports.insert("time".to_string());

        let mut e = Emitter::new(usize::MAX);
        e.line("// parseISO8601Duration converts an ISO 8601 duration into a time.Duration.");
        e.line("func parseISO8601Duration(s string) (time.Duration, error) {");
        e.indent();
        e.line("if len(s) < 2 || s[0] != 'P' {");
        e.indent();
        e.line("return 0, fmt.Errorf(\"invalid ISO 8601 duration %q\", s)");
        e.dedent();
        e.line("}");
        e.line("var total float64");
        e.line("num := \"\"");
        e.line("inTime := false");
        e.line("for _, r := range s[1:] {");
        e.indent();
        e.line("switch {");
        e.line("case r == 'T':");
        e.indent();
        e.line("inTime = true");
        e.dedent();
        e.line("case (r >= '0' && r <= '9') || r == '.':");
        e.indent();
        e.line("num += string(r)");
        e.dedent();
        e.line("default:");
        e.indent();
        e.line("f, err := strconv.ParseFloat(num, 64)");
        e.line("if err != nil {");
        e.indent();
        e.line("return 0, fmt.Errorf(\"invalid ISO 8601 duration %q\", s)");
        e.dedent();
        e.line("}");
        e.line("num = \"\"");
        e.line("switch {");
        e.line("case r == 'Y':");
        e.indent();
        e.line("total += f * 365 * 86400");
        e.dedent();
        e.line("case r == 'W':");
        e.indent();
        e.line("total += f * 7 * 86400");
        e.dedent();
        e.line("case r == 'D':");
        e.indent();
        e.line("total += f * 86400");
        e.dedent();
        e.line("case r == 'M' && !inTime:");
        e.indent();
        e.line("total += f * 30 * 86400");
        e.dedent();
        e.line("case r == 'M' && inTime:");
        e.indent();
        e.line("total += f * 60");
        e.dedent();
        e.line("case r == 'H':");
        e.indent();
        e.line("total += f * 3600");
        e.dedent();
        e.line("case r == 'S':");
        e.indent();
        e.line("total += f");
        e.dedent();
        e.line("default:");
        e.indent();
        e.line("return 0, fmt.Errorf(\"invalid ISO 8601 duration %q\", s)");
        e.dedent();
        e.line("}");
        e.dedent();
        e.line("}");
        e.dedent();
        e.line("}");
        e.line("if num != \"\" {");
        e.indent();
        e.line("return 0, fmt.Errorf(\"invalid ISO 8601 duration %q\", s)");
        e.dedent();
        e.line("}");
        e.line("return time.Duration(total * float64(time.Second)), nil");
        e.dedent();
        e.line("}");
        e.blank();
        self.support.push_str(&e.into_string());
    }
}

impl Default for CodecState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Per-Declaration Dispatch
// =============================================================================

/// Emit the codec methods attached to one declaration.
pub fn emit_decl_codecs(
    decl: &TypeDecl,
    pkg: &Package,
    config: &GeneratorConfig,
    e: &mut Emitter,
    state: &mut CodecState,
) -> Result<()> {
    match &decl.body {
        TypeBody::Struct(st) => emit_struct_codecs(&decl.name, st, pkg, config, e, state),
        TypeBody::Enum(en) => {
            emit_enum_codecs(&decl.name, en, e, state);
            Ok(())
        }
        TypeBody::Union(un) => {
            emit_union_codecs(&decl.name, un, e, state);
            Ok(())
        }
        TypeBody::Alias(ty, constraints) => {
            if !constraints.is_empty() {
                emit_alias_codecs(&decl.name, ty, constraints, e, state);
            }
            Ok(())
        }
        TypeBody::Placeholder => Err(GenerateError::Internal(format!(
            "placeholder declaration {} reached codec emission",
            decl.name
        ))),
    }
}

// =============================================================================
// Struct Codecs
// =============================================================================

fn emit_struct_codecs(
    name: &str,
    st: &StructType,
    pkg: &Package,
    config: &GeneratorConfig,
    e: &mut Emitter,
    state: &mut CodecState,
) -> Result<()> {
    state.ensure_support();
    state.imports.insert("encoding/json".to_string());

    emit_pattern_vars(name, st, e, state);

    if let Some(catch_all) = st.catch_all() {
        emit_struct_marshal(name, &catch_all.name, e);
    }

    emit_struct_unmarshal(name, st, pkg, config, e, state)?;

    if st.fields.iter().any(field_has_checks) {
        emit_struct_validate(name, st, e, state);
    }
    Ok(())
}

fn pattern_var(type_name: &str, field_name: &str) -> String {
    format!("pattern{type_name}{field_name}")
}

fn emit_pattern_vars(name: &str, st: &StructType, e: &mut Emitter, state: &mut CodecState) {
    for field in &st.fields {
        if let Some(pattern) = &field.constraints.pattern {
            state.imports.insert("regexp".to_string());
            e.line(&format!(
                "var {} = regexp.MustCompile({})",
                pattern_var(name, &field.name),
                quote_pattern(pattern)
            ));
            e.blank();
        }
    }
}

fn emit_struct_marshal(name: &str, catch_all: &str, e: &mut Emitter) {
    e.line(&format!("// MarshalJSON implements json.Marshaler for {name}."));
    e.line(&format!("func (v {name}) MarshalJSON() ([]byte, error) {{"));
    e.indent();
    e.line(&format!("type plain {name}"));
    e.line("b, err := json.Marshal(plain(v))");
    e.line("if err != nil {");
    e.indent();
    e.line("return nil, err");
    e.dedent();
    e.line("}");
    e.line(&format!("if len(v.{catch_all}) == 0 {{"));
    e.indent();
    e.line("return b, nil");
    e.dedent();
    e.line("}");
    e.line("var m map[string]interface{}");
    e.line("if err := json.Unmarshal(b, &m); err != nil {");
    e.indent();
    e.line("return nil, err");
    e.dedent();
    e.line("}");
    e.line(&format!("for key, value := range v.{catch_all} {{"));
    e.indent();
    e.line("m[key] = value");
    e.dedent();
    e.line("}");
    e.line("return json.Marshal(m)");
    e.dedent();
    e.line("}");
    e.blank();
}

fn emit_struct_unmarshal(
    name: &str,
    st: &StructType,
    pkg: &Package,
    config: &GeneratorConfig,
    e: &mut Emitter,
    state: &mut CodecState,
) -> Result<()> {
    e.line(&format!("// UnmarshalJSON implements json.Unmarshaler for {name}."));
    e.line(&format!("func (v *{name}) UnmarshalJSON(data []byte) error {{"));
    e.indent();
    e.line("var raw map[string]json.RawMessage");
    e.line("if err := json.Unmarshal(data, &raw); err != nil {");
    e.indent();
    e.line("return err");
    e.dedent();
    e.line("}");

    for field in st.fields.iter().filter(|f| f.required && !f.catch_all) {
        e.line(&format!("if _, ok := raw[{}]; !ok {{", quote(&field.json_name)));
        e.indent();
        e.line(&format!(
            "return &MissingFieldError{{Path: {}}}",
            quote(&field.json_name)
        ));
        e.dedent();
        e.line("}");
    }

    e.line(&format!("var out {name}"));
    e.line("for key, value := range raw {");
    e.indent();
    e.line("switch key {");
    for field in st.fields.iter().filter(|f| !f.catch_all) {
        e.line(&format!("case {}:", quote(&field.json_name)));
        e.indent();
        emit_field_decode(field, e, state);
        e.dedent();
    }
    e.line("default:");
    e.indent();
    if st.deny_additional() {
        e.line("return &AdditionalPropertyError{Path: key}");
    } else if let Some(catch_all) = st.catch_all() {
        let value_ty = match &catch_all.ty {
            GoType::Map(_, value) => value.go_string(),
            _ => "interface{}".to_string(),
        };
        e.line(&format!("var extra {value_ty}"));
        e.line("if err := json.Unmarshal(value, &extra); err != nil {");
        e.indent();
        e.line("return err");
        e.dedent();
        e.line("}");
        e.line(&format!("if out.{} == nil {{", catch_all.name));
        e.indent();
        e.line(&format!("out.{} = map[string]{value_ty}{{}}", catch_all.name));
        e.dedent();
        e.line("}");
        e.line(&format!("out.{}[key] = extra", catch_all.name));
    } else {
        // additionalProperties: false with no catch-all; drop silently
        e.line("_ = value");
    }
    e.dedent();
    e.line("}");
    e.dedent();
    e.line("}");

    for field in st.fields.iter().filter(|f| f.default.is_some() && !f.catch_all) {
        let default = field.default.as_ref().unwrap();
        check_default(&field.ty, default, &format!("{name}.{}", field.name), pkg)?;
        let literal = format_default(&field.ty, default, pkg, config, e.indent_level())?;
        e.line(&format!("if _, ok := raw[{}]; !ok {{", quote(&field.json_name)));
        e.indent();
        e.line(&format!("out.{} = {literal}", field.name));
        e.dedent();
        e.line("}");
        if matches!(unwrap_pointer(&field.ty), GoType::Duration | GoType::DateTime | GoType::Date | GoType::Time) {
            state.imports.insert("time".to_string());
        }
    }

    if st.fields.iter().any(field_has_checks) {
        e.line("if err := out.Validate(); err != nil {");
        e.indent();
        e.line("return err");
        e.dedent();
        e.line("}");
    }
    e.line("*v = out");
    e.line("return nil");
    e.dedent();
    e.line("}");
    e.blank();
    Ok(())
}

fn unwrap_pointer(ty: &GoType) -> &GoType {
    match ty {
        GoType::Pointer(inner) => inner,
        other => other,
    }
}

/// One `case` arm decoding a single field.
fn emit_field_decode(field: &StructField, e: &mut Emitter, state: &mut CodecState) {
    let pointered = matches!(field.ty, GoType::Pointer(_));
    match unwrap_pointer(&field.ty) {
        GoType::Duration => {
            state.ensure_duration_helper();
            emit_special_decode(field, pointered, "d", "parseISO8601Duration(s)", "duration", e);
        }
        GoType::Date => {
            state.imports.insert("time".to_string());
            emit_special_decode(
                field,
                pointered,
                "t",
                "time.Parse(\"2006-01-02\", s)",
                "date",
                e,
            );
        }
        GoType::Time => {
            state.imports.insert("time".to_string());
            emit_special_decode(field, pointered, "t", "time.Parse(\"15:04:05\", s)", "time", e);
        }
        _ => {
            e.line(&format!("if err := json.Unmarshal(value, &out.{}); err != nil {{", field.name));
            e.indent();
            e.line("return err");
            e.dedent();
            e.line("}");
        }
    }
}

/// Decode a string-carried domain value (duration, date, time-of-day).
fn emit_special_decode(
    field: &StructField,
    pointered: bool,
    binding: &str,
    parse_expr: &str,
    rule: &str,
    e: &mut Emitter,
) {
    if pointered {
        e.line("if string(value) == \"null\" {");
        e.indent();
        e.line("continue");
        e.dedent();
        e.line("}");
    }
    e.line("var s string");
    e.line("if err := json.Unmarshal(value, &s); err != nil {");
    e.indent();
    e.line("return err");
    e.dedent();
    e.line("}");
    e.line(&format!("{binding}, err := {parse_expr}"));
    e.line("if err != nil {");
    e.indent();
    e.line(&format!(
        "return &ValidationError{{Path: {}, Rule: {}, Actual: s}}",
        quote(&field.json_name),
        quote(rule)
    ));
    e.dedent();
    e.line("}");
    if pointered {
        e.line(&format!("out.{} = &{binding}", field.name));
    } else {
        e.line(&format!("out.{} = {binding}", field.name));
    }
}

fn field_has_checks(field: &StructField) -> bool {
    if field.catch_all {
        return false;
    }
    let c = &field.constraints;
    // const on a named type is enforced by that type's own declaration
    let const_active =
        c.const_value.is_some() && !matches!(unwrap_pointer(&field.ty), GoType::Named(_));
    c.pattern.is_some()
        || c.min_length.is_some()
        || c.max_length.is_some()
        || c.minimum.is_some()
        || c.maximum.is_some()
        || c.exclusive_minimum.is_some()
        || c.exclusive_maximum.is_some()
        || c.min_items.is_some()
        || c.max_items.is_some()
        || const_active
}

fn emit_struct_validate(name: &str, st: &StructType, e: &mut Emitter, state: &mut CodecState) {
    e.line(&format!(
        "// Validate checks {name} against the constraints of its schema."
    ));
    e.line(&format!("func (v *{name}) Validate() error {{"));
    e.indent();
    for field in st.fields.iter().filter(|f| field_has_checks(f)) {
        let (guard, expr) = match &field.ty {
            GoType::Pointer(_) => (
                Some(format!("v.{} != nil", field.name)),
                format!("*v.{}", field.name),
            ),
            _ => (None, format!("v.{}", field.name)),
        };
        emit_checks(
            &field.constraints,
            unwrap_pointer(&field.ty),
            &expr,
            guard.as_deref(),
            &field.json_name,
            Some(&pattern_var(name, &field.name)),
            e,
            state,
        );
    }
    e.line("return nil");
    e.dedent();
    e.line("}");
    e.blank();
}

/// Emit the fail-fast constraint checks for one value expression.
#[allow(clippy::too_many_arguments)]
fn emit_checks(
    c: &Constraints,
    ty: &GoType,
    expr: &str,
    guard: Option<&str>,
    path: &str,
    pattern_var: Option<&str>,
    e: &mut Emitter,
    state: &mut CodecState,
) {
    let mut check = |cond: String, rule: &str, actual: &str| {
        let cond = match guard {
            Some(guard) => format!("{guard} && {cond}"),
            None => cond,
        };
        e.line(&format!("if {cond} {{"));
        e.indent();
        e.line(&format!(
            "return &ValidationError{{Path: {}, Rule: {}, Actual: {actual}}}",
            quote(path),
            quote(rule)
        ));
        e.dedent();
        e.line("}");
    };

    if let (Some(_), Some(var)) = (&c.pattern, pattern_var) {
        check(format!("!{var}.MatchString({expr})"), "pattern", expr);
    }
    if let Some(n) = c.min_length {
        check(format!("len([]rune({expr})) < {n}"), "minLength", expr);
    }
    if let Some(n) = c.max_length {
        check(format!("len([]rune({expr})) > {n}"), "maxLength", expr);
    }
    if let Some(n) = c.minimum {
        check(format!("{expr} < {}", num_literal(n)), "minimum", expr);
    }
    if let Some(n) = c.exclusive_minimum {
        check(format!("{expr} <= {}", num_literal(n)), "exclusiveMinimum", expr);
    }
    if let Some(n) = c.maximum {
        check(format!("{expr} > {}", num_literal(n)), "maximum", expr);
    }
    if let Some(n) = c.exclusive_maximum {
        check(format!("{expr} >= {}", num_literal(n)), "exclusiveMaximum", expr);
    }
    if let Some(n) = c.min_items {
        check(format!("len({expr}) < {n}"), "minItems", expr);
    }
    if let Some(n) = c.max_items {
        check(format!("len({expr}) > {n}"), "maxItems", expr);
    }
    if let Some(const_value) = &c.const_value {
        // Named types enforce const through their own enum declarations.
        if !matches!(ty, GoType::Named(_)) {
            match const_value {
                Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                    check(
                        format!("{expr} != {}", scalar_literal(const_value)),
                        "const",
                        expr,
                    );
                }
                composite => {
                    state.imports.insert("reflect".to_string());
                    check(
                        format!("!reflect.DeepEqual({expr}, {})", any_literal(composite)),
                        "const",
                        expr,
                    );
                }
            }
        }
    }
}

/// Format a numeric bound; integral values print without a decimal point
/// so comparisons against integer-typed fields stay well-typed.
fn num_literal(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// =============================================================================
// Enum Codecs
// =============================================================================

fn emit_enum_codecs(name: &str, en: &EnumType, e: &mut Emitter, state: &mut CodecState) {
    state.ensure_support();
    state.imports.insert("encoding/json".to_string());

    let raw_ty = en.base.go_string();
    e.line(&format!("// UnmarshalJSON implements json.Unmarshaler for {name}."));
    e.line(&format!("func (v *{name}) UnmarshalJSON(data []byte) error {{"));
    e.indent();
    e.line(&format!("var raw {raw_ty}"));
    e.line("if err := json.Unmarshal(data, &raw); err != nil {");
    e.indent();
    e.line("return err");
    e.dedent();
    e.line("}");

    if matches!(en.base, GoType::Primitive(_)) {
        e.line(&format!("switch {name}(raw) {{"));
        let names: Vec<&str> = en.members.iter().map(|m| m.name.as_str()).collect();
        let chunks = chunk_names(&names, e.max_line());
        if let [single] = chunks.as_slice() {
            e.line(&format!("case {single}:"));
        } else {
            // One case clause broken after commas; separate clauses would
            // leave the earlier members with empty bodies.
            for (i, chunk) in chunks.iter().enumerate() {
                if i == 0 {
                    e.line(&format!("case {chunk},"));
                } else if i + 1 == chunks.len() {
                    e.line(&format!("\t{chunk}:"));
                } else {
                    e.line(&format!("\t{chunk},"));
                }
            }
        }
        e.indent();
        e.line(&format!("*v = {name}(raw)"));
        e.line("return nil");
        e.dedent();
        e.line("}");
    } else {
        state.imports.insert("reflect".to_string());
        e.line(&format!("for _, candidate := range enumValues{name} {{"));
        e.indent();
        e.line("if reflect.DeepEqual(raw, candidate) {");
        e.indent();
        e.line(&format!("*v = {name}(raw)"));
        e.line("return nil");
        e.dedent();
        e.line("}");
        e.dedent();
        e.line("}");
    }
    e.line("return &ValidationError{Path: \"\", Rule: \"enum\", Actual: raw}");
    e.dedent();
    e.line("}");
    e.blank();

    if !matches!(en.base, GoType::Primitive(_)) {
        let values: Vec<String> = en.members.iter().map(|m| any_literal(&m.value)).collect();
        e.line(&format!(
            "var enumValues{name} = []interface{{}}{{{}}}",
            values.join(", ")
        ));
        e.blank();
    }
}

/// Break a `case` member list across lines under the width limit.
fn chunk_names(names: &[&str], max_line: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for name in names {
        if !current.is_empty() && current.len() + name.len() + 2 > max_line.saturating_sub(8) {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(", ");
        }
        current.push_str(name);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// =============================================================================
// Union Codecs
// =============================================================================

fn emit_union_codecs(name: &str, un: &UnionType, e: &mut Emitter, state: &mut CodecState) {
    state.ensure_support();
    state.imports.insert("encoding/json".to_string());
    state.imports.insert("fmt".to_string());

    // MarshalJSON: encode the active variant, writing the discriminator
    // key when the union is discriminated.
    e.line(&format!("// MarshalJSON implements json.Marshaler for {name}."));
    e.line(&format!("func (v {name}) MarshalJSON() ([]byte, error) {{"));
    e.indent();
    e.line("switch {");
    for variant in &un.variants {
        e.line(&format!("case v.{} != nil:", variant.name));
        e.indent();
        match (&un.discriminator, &variant.tag) {
            (Some(discriminator), Some(tag)) => {
                e.line(&format!("b, err := json.Marshal(v.{})", variant.name));
                e.line("if err != nil {");
                e.indent();
                e.line("return nil, err");
                e.dedent();
                e.line("}");
                e.line("var m map[string]interface{}");
                e.line("if err := json.Unmarshal(b, &m); err != nil {");
                e.indent();
                e.line("return nil, err");
                e.dedent();
                e.line("}");
                e.line(&format!(
                    "m[{}] = {}",
                    quote(discriminator),
                    any_literal(tag)
                ));
                e.line("return json.Marshal(m)");
            }
            _ => {
                e.line(&format!("return json.Marshal(v.{})", variant.name));
            }
        }
        e.dedent();
    }
    e.line("}");
    e.line(&format!(
        "return nil, fmt.Errorf(\"no variant of {name} is set\")"
    ));
    e.dedent();
    e.line("}");
    e.blank();

    e.line(&format!("// UnmarshalJSON implements json.Unmarshaler for {name}."));
    e.line(&format!("func (v *{name}) UnmarshalJSON(data []byte) error {{"));
    e.indent();
    match &un.discriminator {
        Some(discriminator) => {
            e.line("var head struct {");
            e.indent();
            e.line(&format!("Tag string `json:{}`", quote(discriminator)));
            e.dedent();
            e.line("}");
            e.line("if err := json.Unmarshal(data, &head); err != nil {");
            e.indent();
            e.line("return err");
            e.dedent();
            e.line("}");
            e.line("switch head.Tag {");
            for variant in &un.variants {
                let tag = variant
                    .tag
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                e.line(&format!("case {}:", quote(tag)));
                e.indent();
                let inner = unwrap_pointer(&variant.ty).go_string();
                e.line(&format!("var out {inner}"));
                e.line("if err := json.Unmarshal(data, &out); err != nil {");
                e.indent();
                e.line("return err");
                e.dedent();
                e.line("}");
                e.line(&format!("*v = {name}{{{}: &out}}", variant.name));
                e.line("return nil");
                e.dedent();
            }
            e.line("}");
            e.line(&format!(
                "return &UnionNoMatchError{{Path: {}, Tried: {}}}",
                quote(discriminator),
                un.variants.len()
            ));
        }
        None => {
            // Try variants in declaration order; first success wins.
            for (i, variant) in un.variants.iter().enumerate() {
                let binding = format!("alt{}", i + 1);
                let inner = unwrap_pointer(&variant.ty).go_string();
                e.line(&format!("var {binding} {inner}"));
                e.line(&format!(
                    "if err := json.Unmarshal(data, &{binding}); err == nil {{"
                ));
                e.indent();
                e.line(&format!("*v = {name}{{{}: &{binding}}}", variant.name));
                e.line("return nil");
                e.dedent();
                e.line("}");
            }
            e.line(&format!(
                "return &UnionNoMatchError{{Path: \"\", Tried: {}}}",
                un.variants.len()
            ));
        }
    }
    e.dedent();
    e.line("}");
    e.blank();
}

// =============================================================================
// Alias Codecs
// =============================================================================

fn emit_alias_codecs(
    name: &str,
    ty: &GoType,
    constraints: &Constraints,
    e: &mut Emitter,
    state: &mut CodecState,
) {
    state.ensure_support();
    state.imports.insert("encoding/json".to_string());

    let var = format!("pattern{name}");
    if let Some(pattern) = &constraints.pattern {
        state.imports.insert("regexp".to_string());
        e.line(&format!(
            "var {var} = regexp.MustCompile({})",
            quote_pattern(pattern)
        ));
        e.blank();
    }

    e.line(&format!("// UnmarshalJSON implements json.Unmarshaler for {name}."));
    e.line(&format!("func (v *{name}) UnmarshalJSON(data []byte) error {{"));
    e.indent();
    e.line(&format!("var raw {}", ty.go_string()));
    e.line("if err := json.Unmarshal(data, &raw); err != nil {");
    e.indent();
    e.line("return err");
    e.dedent();
    e.line("}");
    emit_checks(constraints, ty, "raw", None, "", Some(&var), e, state);
    e.line(&format!("*v = {name}(raw)"));
    e.line("return nil");
    e.dedent();
    e.line("}");
    e.blank();
}

// =============================================================================
// Constructors
// =============================================================================

/// Emit the `New*` constructor for a struct with defaulted fields.
pub fn emit_constructor(
    decl: &TypeDecl,
    pkg: &Package,
    config: &GeneratorConfig,
    e: &mut Emitter,
    state: &mut CodecState,
) -> Result<()> {
    let TypeBody::Struct(st) = &decl.body else {
        return Ok(());
    };
    if !st.fields.iter().any(|f| f.default.is_some() && !f.catch_all) {
        return Ok(());
    }

    let name = &decl.name;
    e.line(&format!(
        "// New{name} creates a new {name} with default values applied."
    ));
    e.line(&format!("func New{name}() {name} {{"));
    e.indent();
    e.line(&format!("return {name}{{"));
    e.indent();
    for field in st.fields.iter().filter(|f| f.default.is_some() && !f.catch_all) {
        let default = field.default.as_ref().unwrap();
        check_default(&field.ty, default, &format!("{name}.{}", field.name), pkg)?;
        let literal = format_default(&field.ty, default, pkg, config, e.indent_level())?;
        if matches!(
            unwrap_pointer(&field.ty),
            GoType::Duration | GoType::DateTime | GoType::Date | GoType::Time
        ) {
            state.imports.insert("time".to_string());
        }
        e.line(&format!("{}: {literal},", field.name));
    }
    e.dedent();
    e.line("}");
    e.dedent();
    e.line("}");
    e.blank();
    Ok(())
}

// =============================================================================
// Default Value Formatting
// =============================================================================

/// Render a default value as a Go expression of the field's type.
///
/// `indent` is the absolute indentation of continuation lines when a
/// composite literal is broken across lines.
pub fn format_default(
    ty: &GoType,
    value: &Value,
    pkg: &Package,
    config: &GeneratorConfig,
    indent: usize,
) -> Result<String> {
    let mismatch = || GenerateError::DefaultTypeMismatch {
        field: String::new(),
        expected: ty.go_string(),
        actual: value.to_string(),
    };

    match ty {
        GoType::Pointer(inner) => {
            if value.is_null() {
                return Ok("nil".to_string());
            }
            let lit = format_default(inner, value, pkg, config, indent)?;
            Ok(format!(
                "func() *{0} {{ var d {0} = {1}; return &d }}()",
                inner.go_string(),
                lit
            ))
        }
        GoType::Named(name) => {
            let decl = pkg
                .get(name)
                .ok_or_else(|| GenerateError::Internal(format!("unknown declaration {name}")))?;
            match &decl.body {
                TypeBody::Enum(en) => en
                    .members
                    .iter()
                    .find(|m| m.value == *value)
                    .map(|m| m.name.clone())
                    .ok_or_else(mismatch),
                TypeBody::Struct(st) => {
                    let Value::Object(map) = value else {
                        return Err(mismatch());
                    };
                    if map.is_empty() {
                        let has_defaults = st.fields.iter().any(|f| f.default.is_some());
                        if has_defaults && config.default_constructors {
                            return Ok(format!("New{name}()"));
                        }
                        return Ok(format!("{name}{{}}"));
                    }
                    let mut parts = Vec::with_capacity(map.len());
                    for (key, val) in map {
                        let field = st
                            .fields
                            .iter()
                            .find(|f| f.json_name == *key)
                            .ok_or_else(mismatch)?;
                        let lit = format_default(&field.ty, val, pkg, config, indent + 1)?;
                        parts.push(format!("{}: {lit}", field.name));
                    }
                    Ok(wrap_composite(&format!("{name}{{"), parts, "}", config, indent))
                }
                TypeBody::Alias(inner, _) => {
                    let lit = format_default(inner, value, pkg, config, indent)?;
                    Ok(format!("{name}({lit})"))
                }
                TypeBody::Union(_) | TypeBody::Placeholder => Err(mismatch()),
            }
        }
        GoType::Primitive(Primitive::String) => match value {
            Value::String(s) => Ok(quote(s)),
            _ => Err(mismatch()),
        },
        GoType::Primitive(Primitive::Bool) => match value {
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(mismatch()),
        },
        GoType::Primitive(Primitive::Bytes) => match value {
            Value::String(s) => Ok(format!("[]byte({})", quote(s))),
            _ => Err(mismatch()),
        },
        GoType::Primitive(p) if p.is_integer() => match value.as_f64() {
            Some(n) if n.fract() == 0.0 => Ok(format!("{}", n as i64)),
            _ => Err(mismatch()),
        },
        GoType::Primitive(_) => match value.as_f64() {
            Some(n) => Ok(num_literal(n)),
            None => Err(mismatch()),
        },
        GoType::Array(elem) => {
            let Value::Array(items) = value else {
                return Err(mismatch());
            };
            let elems: Result<Vec<String>> = items
                .iter()
                .map(|item| format_default(elem, item, pkg, config, indent + 1))
                .collect();
            Ok(wrap_composite(
                &format!("[]{}{{", elem.go_string()),
                elems?,
                "}",
                config,
                indent,
            ))
        }
        GoType::Map(_, value_ty) => {
            let Value::Object(map) = value else {
                return Err(mismatch());
            };
            let entries: Result<Vec<String>> = map
                .iter()
                .map(|(k, val)| {
                    let lit = format_default(value_ty, val, pkg, config, indent + 1)?;
                    Ok(format!("{}: {lit}", quote(k)))
                })
                .collect();
            Ok(wrap_composite(
                &format!("map[string]{}{{", value_ty.go_string()),
                entries?,
                "}",
                config,
                indent,
            ))
        }
        GoType::Duration => {
            let Some(text) = value.as_str() else {
                return Err(mismatch());
            };
            let seconds = parse_iso8601_duration(text).ok_or_else(mismatch)?;
            Ok(format!(
                "func() time.Duration {{ d, _ := time.ParseDuration({}); return d }}()",
                quote(&go_duration_string(seconds))
            ))
        }
        GoType::DateTime => {
            let Some(text) = value.as_str() else {
                return Err(mismatch());
            };
            Ok(format!(
                "func() time.Time {{ t, _ := time.Parse(time.RFC3339, {}); return t }}()",
                quote(text)
            ))
        }
        GoType::Date => {
            let Some(text) = value.as_str() else {
                return Err(mismatch());
            };
            Ok(format!(
                "func() time.Time {{ t, _ := time.Parse(\"2006-01-02\", {}); return t }}()",
                quote(text)
            ))
        }
        GoType::Time => {
            let Some(text) = value.as_str() else {
                return Err(mismatch());
            };
            Ok(format!(
                "func() time.Time {{ t, _ := time.Parse(\"15:04:05\", {}); return t }}()",
                quote(text)
            ))
        }
        GoType::Any => Ok(any_literal(value)),
        GoType::Empty => Err(mismatch()),
    }
}

/// Lay a composite literal out on one line when it fits, one element per
/// line otherwise. Line width is advisory and applies here only.
fn wrap_composite(
    open: &str,
    parts: Vec<String>,
    close: &str,
    config: &GeneratorConfig,
    indent: usize,
) -> String {
    let single = format!("{open}{}{close}", parts.join(", "));
    let width = single.len() + indent * 4;
    if width <= config.max_line_length && !single.contains('\n') {
        return single;
    }
    let tabs = "\t".repeat(indent + 1);
    let closing_tabs = "\t".repeat(indent);
    let mut out = String::from(open);
    for part in parts {
        out.push('\n');
        out.push_str(&tabs);
        out.push_str(&part);
        out.push(',');
    }
    out.push('\n');
    out.push_str(&closing_tabs);
    out.push_str(close);
    out
}

// =============================================================================
// Default Type Checking
// =============================================================================

/// Verify a default value matches the synthesized field type. Runs at
/// generation time; a mismatch is fatal.
pub fn check_default(ty: &GoType, value: &Value, path: &str, pkg: &Package) -> Result<()> {
    let mismatch = || GenerateError::DefaultTypeMismatch {
        field: path.to_string(),
        expected: ty.go_string(),
        actual: value.to_string(),
    };

    match ty {
        GoType::Any => Ok(()),
        GoType::Pointer(inner) => {
            if value.is_null() {
                Ok(())
            } else {
                check_default(inner, value, path, pkg)
            }
        }
        GoType::Primitive(Primitive::String | Primitive::Bytes) => {
            value.as_str().map(drop).ok_or_else(mismatch)
        }
        GoType::Primitive(Primitive::Bool) => value.as_bool().map(drop).ok_or_else(mismatch),
        GoType::Primitive(p) if p.is_integer() => match value.as_f64() {
            Some(n) if n.fract() == 0.0 => Ok(()),
            _ => Err(mismatch()),
        },
        GoType::Primitive(_) => value.as_f64().map(drop).ok_or_else(mismatch),
        GoType::Array(elem) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            for (i, item) in items.iter().enumerate() {
                check_default(elem, item, &format!("{path}[{i}]"), pkg)?;
            }
            Ok(())
        }
        GoType::Map(_, value_ty) => {
            let map = value.as_object().ok_or_else(mismatch)?;
            for (key, val) in map {
                check_default(value_ty, val, &format!("{path}.{key}"), pkg)?;
            }
            Ok(())
        }
        GoType::Duration => {
            let text = value.as_str().ok_or_else(mismatch)?;
            parse_iso8601_duration(text).map(drop).ok_or_else(mismatch)
        }
        GoType::DateTime => {
            let text = value.as_str().ok_or_else(mismatch)?;
            chrono::DateTime::parse_from_rfc3339(text)
                .map(drop)
                .map_err(|_| mismatch())
        }
        GoType::Date => {
            let text = value.as_str().ok_or_else(mismatch)?;
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(drop)
                .map_err(|_| mismatch())
        }
        GoType::Time => {
            let text = value.as_str().ok_or_else(mismatch)?;
            chrono::NaiveTime::parse_from_str(text, "%H:%M:%S")
                .or_else(|_| chrono::NaiveTime::parse_from_str(text, "%H:%M:%S%.f"))
                .map(drop)
                .map_err(|_| mismatch())
        }
        GoType::Empty => Err(mismatch()),
        GoType::Named(name) => {
            let decl = pkg
                .get(name)
                .ok_or_else(|| GenerateError::Internal(format!("unknown declaration {name}")))?;
            match &decl.body {
                TypeBody::Enum(en) => {
                    if en.members.iter().any(|m| m.value == *value) {
                        Ok(())
                    } else {
                        Err(mismatch())
                    }
                }
                TypeBody::Alias(inner, _) => check_default(inner, value, path, pkg),
                TypeBody::Struct(st) => {
                    let map = value.as_object().ok_or_else(mismatch)?;
                    for (key, val) in map {
                        match st.fields.iter().find(|f| f.json_name == *key) {
                            Some(field) => {
                                check_default(&field.ty, val, &format!("{path}.{key}"), pkg)?;
                            }
                            None => match st.catch_all() {
                                Some(catch_all) => {
                                    let value_ty = match &catch_all.ty {
                                        GoType::Map(_, v) => v.as_ref().clone(),
                                        _ => GoType::Any,
                                    };
                                    check_default(&value_ty, val, &format!("{path}.{key}"), pkg)?;
                                }
                                None => return Err(mismatch()),
                            },
                        }
                    }
                    Ok(())
                }
                TypeBody::Union(un) => {
                    for variant in &un.variants {
                        if check_default(&variant.ty, value, path, pkg).is_ok() {
                            return Ok(());
                        }
                    }
                    Err(mismatch())
                }
                // Mid-recursion; the final pass re-checks completed decls.
                TypeBody::Placeholder => Ok(()),
            }
        }
    }
}

// =============================================================================
// ISO 8601 Durations
// =============================================================================

/// Parse an ISO 8601 duration into seconds. Years and months use the
/// 365/30-day approximations the generated helper applies at runtime.
pub fn parse_iso8601_duration(input: &str) -> Option<f64> {
    let rest = input.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }
    let mut total = 0.0;
    let mut number = String::new();
    let mut in_time = false;
    let mut components = 0;
    for c in rest.chars() {
        match c {
            'T' => {
                if in_time {
                    return None;
                }
                in_time = true;
            }
            '0'..='9' | '.' => number.push(c),
            unit => {
                let n: f64 = number.parse().ok()?;
                number.clear();
                components += 1;
                total += match (unit, in_time) {
                    ('Y', false) => n * 365.0 * 86_400.0,
                    ('M', false) => n * 30.0 * 86_400.0,
                    ('W', false) => n * 7.0 * 86_400.0,
                    ('D', false) => n * 86_400.0,
                    ('H', true) => n * 3_600.0,
                    ('M', true) => n * 60.0,
                    ('S', true) => n,
                    _ => return None,
                };
            }
        }
    }
    if !number.is_empty() || components == 0 {
        return None;
    }
    Some(total)
}

/// Render seconds in Go's `time.ParseDuration` syntax.
pub fn go_duration_string(seconds: f64) -> String {
    if seconds.fract() != 0.0 {
        return format!("{seconds}s");
    }
    let mut secs = seconds as i64;
    let hours = secs / 3_600;
    secs %= 3_600;
    let minutes = secs / 60;
    secs %= 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{secs}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::path::PathBuf;

    #[rstest]
    #[case("PT30S", 30.0)]
    #[case("PT1M30S", 90.0)]
    #[case("PT2H", 7200.0)]
    #[case("P1D", 86_400.0)]
    #[case("P1DT1H", 90_000.0)]
    #[case("PT0.5S", 0.5)]
    fn iso8601_durations_parse(#[case] input: &str, #[case] expected: f64) {
        assert_eq!(parse_iso8601_duration(input), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("P")]
    #[case("30S")]
    #[case("PT30X")]
    #[case("PT3")]
    fn invalid_durations_rejected(#[case] input: &str) {
        assert_eq!(parse_iso8601_duration(input), None);
    }

    #[rstest]
    #[case(30.0, "30s")]
    #[case(90.0, "1m30s")]
    #[case(7200.0, "2h0m0s")]
    #[case(0.5, "0.5s")]
    fn durations_render_for_go(#[case] seconds: f64, #[case] expected: &str) {
        assert_eq!(go_duration_string(seconds), expected);
    }

    #[test]
    fn default_checking_matches_shapes() {
        let pkg = Package::new("models", PathBuf::from("models.go"));
        let string_ty = GoType::Primitive(Primitive::String);
        assert!(check_default(&string_ty, &json!("ok"), "f", &pkg).is_ok());
        assert!(check_default(&string_ty, &json!(3), "f", &pkg).is_err());

        let int_ty = GoType::Primitive(Primitive::Int);
        assert!(check_default(&int_ty, &json!(3), "f", &pkg).is_ok());
        assert!(check_default(&int_ty, &json!(3.0), "f", &pkg).is_ok());
        assert!(check_default(&int_ty, &json!(3.5), "f", &pkg).is_err());

        let arr_ty = GoType::array(string_ty.clone());
        assert!(check_default(&arr_ty, &json!(["a", "b"]), "f", &pkg).is_ok());
        assert!(check_default(&arr_ty, &json!(["a", 1]), "f", &pkg).is_err());

        assert!(check_default(&GoType::Duration, &json!("PT30S"), "f", &pkg).is_ok());
        assert!(check_default(&GoType::Duration, &json!("30s"), "f", &pkg).is_err());
    }

    #[test]
    fn default_formatting_breaks_long_literals() {
        let pkg = Package::new("models", PathBuf::from("models.go"));
        let config = GeneratorConfig {
            max_line_length: 24,
            ..GeneratorConfig::default()
        };
        let arr_ty = GoType::array(GoType::Primitive(Primitive::String));
        let lit = format_default(
            &arr_ty,
            &json!(["alpha", "beta", "gamma"]),
            &pkg,
            &config,
            0,
        )
        .unwrap();
        assert_eq!(lit, "[]string{\n\t\"alpha\",\n\t\"beta\",\n\t\"gamma\",\n}");

        let short = format_default(&arr_ty, &json!(["a"]), &pkg, &config, 0).unwrap();
        assert_eq!(short, "[]string{\"a\"}");
    }

    #[test]
    fn duration_default_uses_parse_duration() {
        let pkg = Package::new("models", PathBuf::from("models.go"));
        let config = GeneratorConfig::default();
        let lit = format_default(&GoType::Duration, &json!("PT30S"), &pkg, &config, 0).unwrap();
        assert_eq!(
            lit,
            "func() time.Duration { d, _ := time.ParseDuration(\"30s\"); return d }()"
        );
    }
}
