//! Naming & Package Mapping
//!
//! Identifier casing with initialism preservation, deterministic
//! collision rewriting, enum member naming, and the mapping from schema
//! `$id`s to output packages and files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde_json::Value;

use crate::config::GeneratorConfig;
use crate::schema::SchemaDocument;

// =============================================================================
// Case Conversion
// =============================================================================

/// Converts arbitrary schema names into Go identifiers, preserving
/// configured initialisms (ID, URL, ...) in uppercase.
#[derive(Debug, Clone)]
pub struct CaseConverter {
    initialisms: BTreeSet<String>,
}

impl CaseConverter {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            initialisms: config.capitalizations.clone(),
        }
    }

    /// PascalCase suitable for an exported Go identifier
    pub fn pascal(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for word in split_words(input) {
            let upper = word.to_ascii_uppercase();
            if self.initialisms.contains(&upper) {
                out.push_str(&upper);
            } else {
                let mut chars = word.chars();
                if let Some(first) = chars.next() {
                    out.extend(first.to_uppercase());
                    for c in chars {
                        out.push(c.to_ascii_lowercase());
                    }
                }
            }
        }
        if out.is_empty() {
            return "Value".to_string();
        }
        if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            out.insert(0, 'N');
        }
        out
    }

    /// Name for one enum member: `Pascal(hint) + Pascal(valueSlug)`
    pub fn enum_member(&self, hint: &str, value: &Value) -> String {
        let suffix = match value {
            Value::String(s) => self.pascal(s),
            Value::Number(n) => format!("Value{}", number_slug(&n.to_string())),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Null => "Null".to_string(),
            Value::Array(_) | Value::Object(_) => "Composite".to_string(),
        };
        format!("{}{}", self.pascal(hint), suffix)
    }
}

/// Split an input into words on separators and camelCase boundaries
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in input.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn number_slug(formatted: &str) -> String {
    formatted.replace('-', "Minus").replace('.', "_")
}

/// snake_case used for derived file names
pub fn snake_case(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

// =============================================================================
// Identifier Allocation
// =============================================================================

/// Per-package identifier allocator.
///
/// The first request for a name gets it verbatim; later requests are
/// rewritten to `X2`, `X3`, ... deterministically.
#[derive(Debug, Default)]
pub struct IdentAllocator {
    taken: BTreeMap<String, usize>,
}

impl IdentAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique identifier derived from `base`.
    pub fn allocate(&mut self, base: &str) -> String {
        if !self.taken.contains_key(base) {
            self.taken.insert(base.to_string(), 1);
            return base.to_string();
        }
        let mut n = self.taken[base] + 1;
        loop {
            let candidate = format!("{base}{n}");
            if !self.taken.contains_key(&candidate) {
                self.taken.insert(base.to_string(), n);
                self.taken.insert(candidate.clone(), 1);
                return candidate;
            }
            n += 1;
        }
    }

    /// Claim an exact name; false when it is already taken.
    pub fn try_reserve(&mut self, name: &str) -> bool {
        if self.taken.contains_key(name) {
            return false;
        }
        self.taken.insert(name.to_string(), 1);
        true
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains_key(name)
    }
}

// =============================================================================
// Package Mapping
// =============================================================================

/// Maps a schema document to its output package, file and root type name.
/// User-supplied overrides take precedence over derived names.
pub struct PackageMapper<'a> {
    config: &'a GeneratorConfig,
    case: &'a CaseConverter,
}

impl<'a> PackageMapper<'a> {
    pub fn new(config: &'a GeneratorConfig, case: &'a CaseConverter) -> Self {
        Self { config, case }
    }

    /// Look up an override keyed by the document's `$id` or loader URI.
    fn lookup<'m, V>(&self, map: &'m BTreeMap<String, V>, doc: &SchemaDocument) -> Option<&'m V> {
        if let Some(id) = &doc.id {
            if let Some(v) = map.get(id) {
                return Some(v);
            }
        }
        map.get(doc.uri.as_str())
    }

    /// The stem naming this schema: the last path segment of its `$id`
    /// (or URI), extensions stripped.
    fn stem(&self, doc: &SchemaDocument) -> String {
        let identity = doc.identity();
        let last = identity
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(identity);
        let mut stem = last;
        for suffix in [".schema.json", ".schema.yaml", ".json", ".yaml", ".yml"] {
            if let Some(trimmed) = stem.strip_suffix(suffix) {
                stem = trimmed;
                break;
            }
        }
        if stem.is_empty() {
            "schema".to_string()
        } else {
            stem.to_string()
        }
    }

    /// Output package name for a document
    pub fn package_name(&self, doc: &SchemaDocument) -> String {
        self.lookup(&self.config.schema_packages, doc)
            .cloned()
            .unwrap_or_else(|| self.config.default_package.clone())
    }

    /// Output file path for a document
    pub fn output_file(&self, doc: &SchemaDocument) -> PathBuf {
        if let Some(file) = self.lookup(&self.config.schema_outputs, doc) {
            return self.config.output_dir.join(file);
        }
        self.config
            .output_dir
            .join(format!("{}.go", snake_case(&self.stem(doc))))
    }

    /// Name of the synthesized root type, and whether it was forced by an
    /// override (overrides must not be rewritten on collision).
    pub fn root_type_name(&self, doc: &SchemaDocument) -> (String, bool) {
        if let Some(name) = self.lookup(&self.config.schema_root_types, doc) {
            return (name.clone(), true);
        }
        let title = doc
            .raw
            .get("title")
            .and_then(Value::as_str)
            .map(|t| self.case.pascal(t));
        match title {
            Some(name) => (name, false),
            None => (self.case.pascal(&self.stem(doc)), false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use url::Url;

    fn case() -> CaseConverter {
        CaseConverter::new(&GeneratorConfig::default())
    }

    #[rstest]
    #[case("tenant_id", "TenantID")]
    #[case("api-url", "APIURL")]
    #[case("fooBar", "FooBar")]
    #[case("already", "Already")]
    #[case("with space", "WithSpace")]
    #[case("2fa", "N2fa")]
    #[case("", "Value")]
    fn pascal_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(case().pascal(input), expected);
    }

    #[rstest]
    #[case(json!("red"), "ColorRed")]
    #[case(json!("light-blue"), "ColorLightBlue")]
    #[case(json!(3), "ColorValue3")]
    #[case(json!(-2), "ColorValueMinus2")]
    #[case(json!(2.5), "ColorValue2_5")]
    #[case(json!(true), "ColorTrue")]
    #[case(json!(null), "ColorNull")]
    fn enum_member_names(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(case().enum_member("Color", &value), expected);
    }

    #[test]
    fn allocator_rewrites_collisions_deterministically() {
        let mut alloc = IdentAllocator::new();
        assert_eq!(alloc.allocate("Thing"), "Thing");
        assert_eq!(alloc.allocate("Thing"), "Thing2");
        assert_eq!(alloc.allocate("Thing"), "Thing3");
        assert!(!alloc.try_reserve("Thing2"));
        assert!(alloc.try_reserve("Other"));
        assert_eq!(alloc.allocate("Other"), "Other2");
    }

    #[test]
    fn mapper_prefers_overrides_and_derives_stems() {
        let mut config = GeneratorConfig::default();
        config
            .schema_packages
            .insert("https://example.com/conf.json".to_string(), "conf".to_string());
        config
            .schema_root_types
            .insert("https://example.com/conf.json".to_string(), "Root".to_string());
        let converter = CaseConverter::new(&config);
        let mapper = PackageMapper::new(&config, &converter);

        let doc = SchemaDocument::new(
            Url::parse("file:///tmp/conf.json").unwrap(),
            json!({"$id": "https://example.com/conf.json"}),
        );
        assert_eq!(mapper.package_name(&doc), "conf");
        assert_eq!(mapper.root_type_name(&doc), ("Root".to_string(), true));
        assert_eq!(mapper.output_file(&doc), PathBuf::from("./conf.go"));

        let plain = SchemaDocument::new(
            Url::parse("file:///tmp/user-profile.schema.json").unwrap(),
            json!({"title": "user profile"}),
        );
        assert_eq!(mapper.package_name(&plain), "models");
        assert_eq!(
            mapper.root_type_name(&plain),
            ("UserProfile".to_string(), false)
        );
        assert_eq!(mapper.output_file(&plain), PathBuf::from("./user_profile.go"));
    }
}
