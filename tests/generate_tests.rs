//! End-to-end generation tests
//!
//! Each test drives the full pipeline over a fixture schema and checks
//! the shape of the generated Go source. Assertions target structural
//! snippets rather than full golden bytes so cosmetic emitter changes do
//! not invalidate the suite.

use std::path::PathBuf;

use serde_json::json;
use structgen::{GenerateError, Generator, GeneratorConfig};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn generate_fixture(name: &str, config: GeneratorConfig) -> String {
    let generator = Generator::new(config);
    let output = generator
        .generate_paths(&[fixture(name)])
        .unwrap_or_else(|e| panic!("generation of {name} failed: {e}"));
    assert_eq!(output.files.len(), 1);
    output.files[0].contents.clone()
}

// =============================================================================
// Literal Scenarios
// =============================================================================

#[test]
fn simple_object_declaration_and_decoder() {
    let code = generate_fixture("person.json", GeneratorConfig::default());

    assert!(code.contains("package models"), "{code}");
    assert!(code.contains("type Person struct {"), "{code}");
    assert!(code.contains("Name string `json:\"name\"`"), "{code}");
    assert!(code.contains("Age *int `json:\"age,omitempty\"`"), "{code}");

    // Decoder: required check and bound validation
    assert!(code.contains("if _, ok := raw[\"name\"]; !ok {"), "{code}");
    assert!(code.contains("return &MissingFieldError{Path: \"name\"}"), "{code}");
    assert!(code.contains("if v.Age != nil && *v.Age < 0 {"), "{code}");
    assert!(
        code.contains("return &ValidationError{Path: \"age\", Rule: \"minimum\", Actual: *v.Age}"),
        "{code}"
    );
}

#[test]
fn enum_declaration_with_named_constants() {
    let code = generate_fixture("color.json", GeneratorConfig::default());

    assert!(code.contains("type Color string"), "{code}");
    assert!(code.contains("ColorRed Color = \"red\""), "{code}");
    assert!(code.contains("ColorGreen Color = \"green\""), "{code}");
    assert!(code.contains("ColorBlue Color = \"blue\""), "{code}");
    assert!(code.contains("case ColorRed, ColorGreen, ColorBlue:"), "{code}");
    assert!(code.contains("Rule: \"enum\""), "{code}");
}

#[test]
fn all_of_merges_into_single_struct() {
    let code = generate_fixture("employee.json", GeneratorConfig::default());

    assert!(code.contains("type Employee struct {"), "{code}");
    assert!(code.contains("A string `json:\"a\"`"), "{code}");
    assert!(code.contains("B *int `json:\"b,omitempty\"`"), "{code}");
    assert!(code.contains("return &MissingFieldError{Path: \"a\"}"), "{code}");
}

#[test]
fn recursive_schema_produces_pointer_children() {
    let code = generate_fixture("node.json", GeneratorConfig::default());

    assert!(code.contains("type Node struct {"), "{code}");
    assert!(code.contains("Children []*Node"), "{code}");
}

#[test]
fn duration_default_drives_constructor_and_decoder() {
    let config = GeneratorConfig {
        default_constructors: true,
        ..GeneratorConfig::default()
    };
    let code = generate_fixture("config.json", config);

    assert!(code.contains("Timeout time.Duration"), "{code}");
    assert!(code.contains("func NewConfig() Config {"), "{code}");
    assert!(code.contains("time.ParseDuration(\"30s\")"), "{code}");

    // Decoder substitutes the same default when the key is absent
    assert!(code.contains("if _, ok := raw[\"timeout\"]; !ok {"), "{code}");
    assert!(code.contains("parseISO8601Duration"), "{code}");
}

#[test]
fn discriminated_union_dispatches_on_tag() {
    let code = generate_fixture("event.json", GeneratorConfig::default());

    assert!(code.contains("type Event struct {"), "{code}");
    assert!(code.contains("Created *Created"), "{code}");
    assert!(code.contains("Deleted *Deleted"), "{code}");

    // Decode dispatches on the discriminator
    assert!(code.contains("Tag string `json:\"kind\"`"), "{code}");
    assert!(code.contains("case \"a\":"), "{code}");
    assert!(code.contains("case \"b\":"), "{code}");

    // Encode writes the discriminator key back
    assert!(code.contains("m[\"kind\"] = \"a\""), "{code}");
    assert!(code.contains("UnionNoMatchError"), "{code}");
}

// =============================================================================
// Cross-Document and YAML Loading
// =============================================================================

#[test]
fn external_yaml_reference_is_loaded_and_synthesized() {
    let code = generate_fixture("contact.json", GeneratorConfig::default());

    assert!(code.contains("type Contact struct {"), "{code}");
    assert!(code.contains("type Address struct {"), "{code}");
    assert!(code.contains("Street string `json:\"street\"`"), "{code}");
    assert!(code.contains("City *string `json:\"city,omitempty\"`"), "{code}");
    // Required reference lands on the shared declaration
    assert!(code.contains("Address Address `json:\"address\"`"), "{code}");
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn generation_is_deterministic() {
    for name in ["event.json", "contact.json", "person.json"] {
        let first = generate_fixture(name, GeneratorConfig::default());
        let second = generate_fixture(name, GeneratorConfig::default());
        if first != second {
            let diff = similar::TextDiff::from_lines(&first, &second);
            panic!(
                "{name} generated differently across runs:\n{}",
                diff.unified_diff()
            );
        }
    }
}

#[test]
fn root_type_override_is_stable_across_runs() {
    let mut config = GeneratorConfig::default();
    config.schema_root_types.insert(
        "https://example.com/schemas/person.json".to_string(),
        "Human".to_string(),
    );

    let first = generate_fixture("person.json", config.clone());
    let second = generate_fixture("person.json", config);
    assert!(first.contains("type Human struct {"), "{first}");
    assert_eq!(first, second);
}

#[test]
fn only_models_suppresses_codecs_but_keeps_constructors() {
    let config = GeneratorConfig {
        only_models: true,
        default_constructors: true,
        ..GeneratorConfig::default()
    };
    let code = generate_fixture("config.json", config);

    assert!(!code.contains("UnmarshalJSON"), "{code}");
    assert!(!code.contains("MissingFieldError"), "{code}");
    assert!(code.contains("func NewConfig() Config {"), "{code}");
}

#[test]
fn catch_all_round_trips_additional_properties() {
    let code = generate_fixture("person.json", GeneratorConfig::default());

    assert!(
        code.contains("AdditionalProperties map[string]interface{} `json:\"-\"`"),
        "{code}"
    );
    assert!(code.contains("MarshalJSON"), "{code}");
    assert!(code.contains("out.AdditionalProperties[key] = extra"), "{code}");
}

#[test]
fn yaml_tags_follow_the_tag_flag() {
    let config = GeneratorConfig {
        tags: vec!["json".to_string(), "yaml".to_string()],
        ..GeneratorConfig::default()
    };
    let code = generate_fixture("person.json", config);
    assert!(
        code.contains("Name string `json:\"name\" yaml:\"name\"`"),
        "{code}"
    );
}

// =============================================================================
// Failure Modes and Warnings
// =============================================================================

#[test]
fn forced_name_collision_is_fatal() {
    let mut config = GeneratorConfig::default();
    config
        .schema_root_types
        .insert("file:///virtual/a.json".to_string(), "Thing".to_string());
    config
        .schema_root_types
        .insert("file:///virtual/b.json".to_string(), "Thing".to_string());

    let generator = Generator::new(config);
    let schema = json!({"type": "object", "properties": {"x": {"type": "string"}}});
    let a = generator
        .loader()
        .preload("file:///virtual/a.json".parse().unwrap(), schema.clone());
    let b = generator
        .loader()
        .preload("file:///virtual/b.json".parse().unwrap(), schema);

    let err = generator.generate_documents(&[a, b]).unwrap_err();
    assert!(
        matches!(err, GenerateError::NamingCollision { name, .. } if name == "Thing"),
        "unexpected error"
    );
}

#[test]
fn conflicting_all_of_constraints_are_fatal() {
    let generator = Generator::new(GeneratorConfig::default());
    let err = generator
        .generate_value(
            "file:///virtual/conflict.json",
            json!({
                "allOf": [
                    {"type": "object", "properties": {"n": {"type": "integer", "minimum": 1}}},
                    {"type": "object", "properties": {"n": {"type": "integer", "minimum": 5}}}
                ]
            }),
        )
        .unwrap_err();
    assert!(matches!(err, GenerateError::ConflictingConstraints { .. }));
}

#[test]
fn default_type_mismatch_is_fatal_at_generation_time() {
    let generator = Generator::new(GeneratorConfig::default());
    let err = generator
        .generate_value(
            "file:///virtual/baddefault.json",
            json!({
                "type": "object",
                "properties": {
                    "count": {"type": "integer", "default": "three"}
                }
            }),
        )
        .unwrap_err();
    assert!(matches!(err, GenerateError::DefaultTypeMismatch { .. }));
}

#[test]
fn if_then_else_is_unsupported() {
    let generator = Generator::new(GeneratorConfig::default());
    let err = generator
        .generate_value(
            "file:///virtual/conditional.json",
            json!({"if": {"type": "string"}, "then": {"minLength": 1}}),
        )
        .unwrap_err();
    assert!(matches!(err, GenerateError::UnsupportedSchema { .. }));
}

#[test]
fn unknown_keywords_and_unused_defs_warn() {
    let generator = Generator::new(GeneratorConfig::default());
    let output = generator
        .generate_value(
            "file:///virtual/warny.json",
            json!({
                "type": "object",
                "x-vendor-extension": true,
                "properties": {"a": {"type": "string"}},
                "$defs": {"orphan": {"type": "integer"}}
            }),
        )
        .unwrap();

    assert!(
        output
            .warnings
            .iter()
            .any(|w| w.message.contains("x-vendor-extension")),
        "warnings: {:?}",
        output.warnings
    );
    assert!(
        output
            .warnings
            .iter()
            .any(|w| w.message.contains("unused $defs entry")),
        "warnings: {:?}",
        output.warnings
    );
}

#[test]
fn min_sized_ints_selects_narrow_types() {
    let config = GeneratorConfig {
        min_sized_ints: true,
        ..GeneratorConfig::default()
    };
    let generator = Generator::new(config);
    let output = generator
        .generate_value(
            "file:///virtual/sized.json",
            json!({
                "title": "Limits",
                "type": "object",
                "properties": {
                    "percent": {"type": "integer", "minimum": 0, "maximum": 100}
                },
                "required": ["percent"]
            }),
        )
        .unwrap();
    assert!(
        output.files[0].contents.contains("Percent uint8"),
        "{}",
        output.files[0].contents
    );
}

#[test]
fn nullable_type_array_becomes_pointer_field() {
    let generator = Generator::new(GeneratorConfig::default());
    let output = generator
        .generate_value(
            "file:///virtual/nullable.json",
            json!({
                "title": "Profile",
                "type": "object",
                "properties": {
                    "nickname": {"type": ["string", "null"]}
                },
                "required": ["nickname"]
            }),
        )
        .unwrap();
    assert!(
        output.files[0].contents.contains("Nickname *string `json:\"nickname\"`"),
        "{}",
        output.files[0].contents
    );
}

#[test]
fn additional_properties_false_rejects_unknown_keys() {
    let generator = Generator::new(GeneratorConfig::default());
    let output = generator
        .generate_value(
            "file:///virtual/strict.json",
            json!({
                "title": "Strict",
                "type": "object",
                "additionalProperties": false,
                "properties": {"a": {"type": "string"}}
            }),
        )
        .unwrap();
    let code = &output.files[0].contents;
    assert!(code.contains("return &AdditionalPropertyError{Path: key}"), "{code}");
    assert!(!code.contains("AdditionalProperties map[string]"), "{code}");
}

#[test]
fn pattern_constraints_compile_and_emit() {
    let generator = Generator::new(GeneratorConfig::default());
    let output = generator
        .generate_value(
            "file:///virtual/patterned.json",
            json!({
                "title": "Account",
                "type": "object",
                "properties": {
                    "slug": {"type": "string", "pattern": "^[a-z0-9-]+$", "minLength": 3}
                },
                "required": ["slug"]
            }),
        )
        .unwrap();
    let code = &output.files[0].contents;
    assert!(
        code.contains("var patternAccountSlug = regexp.MustCompile(`^[a-z0-9-]+$`)"),
        "{code}"
    );
    assert!(code.contains("Rule: \"pattern\""), "{code}");
    assert!(code.contains("len([]rune(v.Slug)) < 3"), "{code}");

    let err = generator
        .generate_value(
            "file:///virtual/badpattern.json",
            json!({"type": "string", "pattern": "[unclosed"}),
        )
        .unwrap_err();
    assert!(matches!(err, GenerateError::InvalidPattern { .. }));
}
