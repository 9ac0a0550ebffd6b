//! Emission
//!
//! Renders the target AST to Go source text. Emission is deterministic:
//! declarations and fields in insertion order, imports sorted and
//! deduplicated. The line-width limit is advisory and only applied to
//! composite literals the codec synthesizer formats.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::codegen::ast::{
    EnumType, GoType, Package, StructType, TypeBody, TypeDecl, UnionType,
};
use crate::codegen::codec::{self, CodecState};
use crate::config::GeneratorConfig;
use crate::error::{GenerateError, Result};

/// Indentation-tracking text sink for one output file.
pub struct Emitter {
    buf: String,
    indent: usize,
    max_line: usize,
}

impl Emitter {
    pub fn new(max_line: usize) -> Self {
        Self {
            buf: String::new(),
            indent: 0,
            max_line,
        }
    }

    pub fn line(&mut self, s: &str) {
        if s.is_empty() {
            self.buf.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.buf.push('\t');
        }
        self.buf.push_str(s);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0);
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn indent_level(&self) -> usize {
        self.indent
    }

    pub fn max_line(&self) -> usize {
        self.max_line
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Render one package to a complete Go source file.
///
/// `source` names the schema the file was generated from; it appears in
/// the file header.
pub fn render_package(pkg: &Package, config: &GeneratorConfig, source: &str) -> Result<String> {
    let incomplete = pkg.incomplete();
    if !incomplete.is_empty() {
        return Err(GenerateError::Internal(format!(
            "declarations left incomplete at emission: {incomplete:?}"
        )));
    }

    let mut state = CodecState::new();
    let mut body = Emitter::new(config.max_line_length);

    for decl in pkg.decls() {
        emit_decl(decl, config, &mut body, &mut state)?;
        if config.default_constructors {
            codec::emit_constructor(decl, pkg, config, &mut body, &mut state)?;
        }
        if !config.only_models {
            codec::emit_decl_codecs(decl, pkg, config, &mut body, &mut state)?;
        }
    }

    let mut head = Emitter::new(config.max_line_length);
    head.line(&format!(
        "// Code generated by structgen from {source}. DO NOT EDIT."
    ));
    head.blank();
    head.line(&format!("package {}", pkg.name));
    head.blank();

    let mut imports = state.imports.clone();
    for decl in pkg.decls() {
        collect_decl_imports(decl, &mut imports);
    }
    for extra in &config.extra_imports {
        imports.insert(extra.clone());
    }
    if !imports.is_empty() {
        head.line("import (");
        head.indent();
        for import in &imports {
            head.line(&quote(import));
        }
        head.dedent();
        head.line(")");
        head.blank();
    }

    let mut out = head.into_string();
    if !state.support.is_empty() {
        out.push_str(&state.support);
    }
    out.push_str(&body.into_string());
    // Exactly one trailing newline.
    while out.ends_with("\n\n") {
        out.pop();
    }
    Ok(out)
}

fn collect_decl_imports(decl: &TypeDecl, imports: &mut BTreeSet<String>) {
    match &decl.body {
        TypeBody::Struct(st) => {
            for field in &st.fields {
                field.ty.collect_imports(imports);
            }
        }
        TypeBody::Alias(ty, _) => ty.collect_imports(imports),
        TypeBody::Enum(en) => en.base.collect_imports(imports),
        TypeBody::Union(un) => {
            for variant in &un.variants {
                variant.ty.collect_imports(imports);
            }
        }
        TypeBody::Placeholder => {}
    }
}

fn emit_decl(
    decl: &TypeDecl,
    config: &GeneratorConfig,
    e: &mut Emitter,
    _state: &mut CodecState,
) -> Result<()> {
    emit_comment(decl.comment.as_deref(), &decl.name, e);
    match &decl.body {
        TypeBody::Struct(st) => emit_struct(&decl.name, st, config, e),
        TypeBody::Alias(ty, _) => {
            e.line(&format!("type {} {}", decl.name, ty.go_string()));
        }
        TypeBody::Enum(en) => emit_enum(&decl.name, en, e),
        TypeBody::Union(un) => emit_union(&decl.name, un, e),
        TypeBody::Placeholder => unreachable!("placeholder survived to emission"),
    }
    e.blank();
    Ok(())
}

fn emit_comment(comment: Option<&str>, name: &str, e: &mut Emitter) {
    match comment {
        Some(text) => {
            let mut lines = text.lines();
            if let Some(first) = lines.next() {
                e.line(&format!("// {name} {}", lower_first(first)));
            }
            for line in lines {
                e.line(&format!("// {line}"));
            }
        }
        None => e.line(&format!("// {name} is generated from a JSON schema.")),
    }
}

fn emit_struct(name: &str, st: &StructType, config: &GeneratorConfig, e: &mut Emitter) {
    e.line(&format!("type {name} struct {{"));
    e.indent();
    for field in &st.fields {
        if let Some(comment) = &field.comment {
            for line in comment.lines() {
                e.line(&format!("// {line}"));
            }
        }
        let tag = field_tag(field.catch_all, &field.json_name, field.required, config);
        e.line(&format!("{} {} {}", field.name, field.ty.go_string(), tag));
    }
    e.dedent();
    e.line("}");
}

fn field_tag(catch_all: bool, json_name: &str, required: bool, config: &GeneratorConfig) -> String {
    let mut parts = Vec::with_capacity(config.tags.len());
    for tag in &config.tags {
        if catch_all {
            parts.push(format!("{tag}:\"-\""));
        } else if required {
            parts.push(format!("{tag}:{}", quote(json_name)));
        } else {
            parts.push(format!("{tag}:\"{json_name},omitempty\""));
        }
    }
    format!("`{}`", parts.join(" "))
}

fn emit_enum(name: &str, en: &EnumType, e: &mut Emitter) {
    e.line(&format!("type {name} {}", en.base.go_string()));
    e.blank();
    let constable = matches!(en.base, GoType::Primitive(_));
    e.line(if constable { "const (" } else { "var (" });
    e.indent();
    for member in &en.members {
        e.line(&format!(
            "{} {name} = {}",
            member.name,
            scalar_literal(&member.value)
        ));
    }
    e.dedent();
    e.line(")");
}

fn emit_union(name: &str, un: &UnionType, e: &mut Emitter) {
    e.line(&format!("type {name} struct {{"));
    e.indent();
    for variant in &un.variants {
        e.line(&format!("{} {}", variant.name, variant.ty.go_string()));
    }
    e.dedent();
    e.line("}");
}

fn lower_first(s: &str) -> String {
    // Acronym-led descriptions stay as written
    let first_word = s.split_whitespace().next().unwrap_or("");
    if first_word.chars().filter(|c| c.is_uppercase()).count() > 1 {
        return s.to_string();
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Quote a string as a Go interpreted string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote a regular expression, preferring a raw string literal.
pub fn quote_pattern(pattern: &str) -> String {
    if !pattern.contains('`') {
        format!("`{pattern}`")
    } else {
        quote(pattern)
    }
}

/// Literal for a scalar JSON value.
pub fn scalar_literal(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        composite => any_literal(composite),
    }
}

/// Literal for an arbitrary JSON value as `interface{}`.
pub fn any_literal(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let elems: Vec<String> = items.iter().map(any_literal).collect();
            format!("[]interface{{}}{{{}}}", elems.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), any_literal(v)))
                .collect();
            format!("map[string]interface{{}}{{{}}}", entries.join(", "))
        }
        scalar => scalar_literal(scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_go_metacharacters() {
        assert_eq!(quote("a\"b\\c\nd"), "\"a\\\"b\\\\c\\nd\"");
        assert_eq!(quote_pattern("^[a-z]+$"), "`^[a-z]+$`");
        assert_eq!(quote_pattern("a`b"), "\"a`b\"");
    }

    #[test]
    fn any_literal_renders_composites() {
        let value = serde_json::json!({"b": [1, true], "a": "x"});
        // serde_json maps iterate sorted, so emission is deterministic
        assert_eq!(
            any_literal(&value),
            "map[string]interface{}{\"a\": \"x\", \"b\": []interface{}{1, true}}"
        );
    }

    #[test]
    fn emitter_tracks_indentation() {
        let mut e = Emitter::new(96);
        e.line("type T struct {");
        e.indent();
        e.line("A string");
        e.dedent();
        e.line("}");
        assert_eq!(e.into_string(), "type T struct {\n\tA string\n}\n");
    }
}
