//! Generator configuration
//!
//! All CLI flags are collected into an immutable [`GeneratorConfig`] that is
//! threaded by reference through the pipeline. There is no file- or
//! environment-based configuration and no process-wide state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GenerateError, Result};

/// Immutable configuration for one generator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Package name overrides keyed by schema `$id` (or loader URI)
    pub schema_packages: BTreeMap<String, String>,

    /// Output file overrides keyed by schema `$id`
    pub schema_outputs: BTreeMap<String, PathBuf>,

    /// Root type name overrides keyed by schema `$id`
    pub schema_root_types: BTreeMap<String, String>,

    /// Suppress codec/validator emission; keep declarations and constructors
    pub only_models: bool,

    /// Select the narrowest integer type covering `minimum`/`maximum`
    pub min_sized_ints: bool,

    /// Emit `New*` constructor functions preloaded with defaults
    pub default_constructors: bool,

    /// Additional Go imports whitelisted into emitted files
    pub extra_imports: Vec<String>,

    /// Initialisms preserved uppercase in identifier casing (e.g. URL, ID)
    pub capitalizations: BTreeSet<String>,

    /// Extensions attempted when a `$ref` target lacks one
    pub resolve_extensions: Vec<String>,

    /// Extensions recognized as YAML by the loader
    pub yaml_extensions: Vec<String>,

    /// Serialization tag sets emitted on struct fields
    pub tags: Vec<String>,

    /// Package name used when a schema has no override and no usable `$id`
    pub default_package: String,

    /// Directory emitted files are written into
    pub output_dir: PathBuf,

    /// Advisory maximum line width for emitted composite literals
    pub max_line_length: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            schema_packages: BTreeMap::new(),
            schema_outputs: BTreeMap::new(),
            schema_root_types: BTreeMap::new(),
            only_models: false,
            min_sized_ints: false,
            default_constructors: false,
            extra_imports: Vec::new(),
            capitalizations: ["ID", "URL", "URI", "UUID", "API", "HTTP", "JSON", "YAML", "SQL"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            resolve_extensions: vec![".json".to_string(), ".yaml".to_string(), ".yml".to_string()],
            yaml_extensions: vec!["yaml".to_string(), "yml".to_string()],
            tags: vec!["json".to_string()],
            default_package: "models".to_string(),
            output_dir: PathBuf::from("."),
            max_line_length: 96,
        }
    }
}

impl GeneratorConfig {
    /// Parse repeatable `URI=VALUE` flag values into a map.
    ///
    /// Later occurrences of the same URI override earlier ones.
    pub fn parse_mappings(pairs: &[String]) -> Result<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for pair in pairs {
            let (uri, value) = pair.split_once('=').ok_or_else(|| {
                GenerateError::Internal(format!("malformed mapping {pair:?}, expected URI=VALUE"))
            })?;
            if uri.is_empty() || value.is_empty() {
                return Err(GenerateError::Internal(format!(
                    "malformed mapping {pair:?}, expected URI=VALUE"
                )));
            }
            out.insert(uri.to_string(), value.to_string());
        }
        Ok(out)
    }

    /// True when `ext` (without the leading dot) names a YAML document
    pub fn is_yaml_extension(&self, ext: &str) -> bool {
        self.yaml_extensions.iter().any(|e| e == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mappings_splits_on_first_equals() {
        let map = GeneratorConfig::parse_mappings(&[
            "https://example.com/a.json=pkga".to_string(),
            "b.json=out=dir/b.go".to_string(),
        ])
        .unwrap();
        assert_eq!(map["https://example.com/a.json"], "pkga");
        assert_eq!(map["b.json"], "out=dir/b.go");
    }

    #[test]
    fn parse_mappings_rejects_missing_value() {
        assert!(GeneratorConfig::parse_mappings(&["nope".to_string()]).is_err());
        assert!(GeneratorConfig::parse_mappings(&["a=".to_string()]).is_err());
    }

    #[test]
    fn default_recognizes_yaml_extensions() {
        let config = GeneratorConfig::default();
        assert!(config.is_yaml_extension("yaml"));
        assert!(config.is_yaml_extension("yml"));
        assert!(!config.is_yaml_extension("json"));
    }
}
