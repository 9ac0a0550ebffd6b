//! Schema Loading
//!
//! Resolves schema documents by URI, parses JSON or YAML into a
//! JSON-compatible tree, and caches one [`SchemaDocument`] per canonical
//! URI. `$ref` is never dereferenced here; only the resolver follows
//! references, loading further documents through this cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

use crate::config::GeneratorConfig;
use crate::error::{GenerateError, Result};
use crate::schema::SchemaDocument;

/// Document loader with a canonical-URI cache.
///
/// Re-entry on an already-loaded URI returns the shared handle. A load
/// completes before any `$ref` into the document can be followed, so the
/// cache needs no in-progress state.
pub struct Loader {
    yaml_extensions: Vec<String>,
    resolve_extensions: Vec<String>,
    cache: RefCell<HashMap<String, Rc<SchemaDocument>>>,
}

impl Loader {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            yaml_extensions: config.yaml_extensions.clone(),
            resolve_extensions: config.resolve_extensions.clone(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Load a schema document from a filesystem path.
    pub fn load_path(&self, path: &Path) -> Result<Rc<SchemaDocument>> {
        let canonical = std::fs::canonicalize(path).map_err(|e| GenerateError::Load {
            uri: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let url = Url::from_file_path(&canonical).map_err(|_| GenerateError::Load {
            uri: path.display().to_string(),
            reason: "path is not representable as a file URL".to_string(),
        })?;
        self.load_url(&url)
    }

    /// Load a schema document from a `file://` URL.
    pub fn load_url(&self, url: &Url) -> Result<Rc<SchemaDocument>> {
        if url.scheme() != "file" {
            return Err(GenerateError::Load {
                uri: url.to_string(),
                reason: format!("unsupported URL scheme {:?}", url.scheme()),
            });
        }

        if let Some(doc) = self.cache.borrow().get(url.as_str()) {
            debug!(uri = url.as_str(), "loader cache hit");
            return Ok(doc.clone());
        }

        let path = url.to_file_path().map_err(|_| GenerateError::Load {
            uri: url.to_string(),
            reason: "file URL has no local path".to_string(),
        })?;
        let canonical = std::fs::canonicalize(&path).map_err(|e| GenerateError::Load {
            uri: url.to_string(),
            reason: e.to_string(),
        })?;
        let canonical_url = Url::from_file_path(&canonical).map_err(|_| GenerateError::Load {
            uri: url.to_string(),
            reason: "path is not representable as a file URL".to_string(),
        })?;

        if let Some(doc) = self.cache.borrow().get(canonical_url.as_str()) {
            debug!(uri = canonical_url.as_str(), "loader cache hit");
            return Ok(doc.clone());
        }

        let content = std::fs::read_to_string(&canonical).map_err(|e| GenerateError::Load {
            uri: canonical_url.to_string(),
            reason: e.to_string(),
        })?;
        let raw = self.parse_content(&content, &canonical, canonical_url.as_str())?;

        debug!(uri = canonical_url.as_str(), "loaded schema document");
        let doc = Rc::new(SchemaDocument::new(canonical_url.clone(), raw));
        self.cache
            .borrow_mut()
            .insert(canonical_url.as_str().to_string(), doc.clone());
        Ok(doc)
    }

    /// Resolve the URI part of a `$ref` against a base document and load it.
    ///
    /// When the reference lacks an extension and the target does not exist
    /// as written, each configured resolve extension is attempted in order.
    pub fn load_relative(&self, base: &Url, reference: &str) -> Result<Rc<SchemaDocument>> {
        let joined = base.join(reference).map_err(|e| GenerateError::Ref {
            reference: reference.to_string(),
            base: base.to_string(),
            reason: e.to_string(),
        })?;

        match self.load_url(&joined) {
            Ok(doc) => Ok(doc),
            Err(original) => {
                if Path::new(joined.path()).extension().is_none() {
                    for ext in &self.resolve_extensions {
                        let mut candidate = joined.clone();
                        candidate.set_path(&format!("{}{}", joined.path(), ext));
                        if let Ok(doc) = self.load_url(&candidate) {
                            return Ok(doc);
                        }
                    }
                }
                Err(original)
            }
        }
    }

    /// Register an in-memory document under a synthetic URI.
    ///
    /// Used by tests and by callers that already hold a parsed tree.
    pub fn preload(&self, uri: Url, raw: Value) -> Rc<SchemaDocument> {
        let doc = Rc::new(SchemaDocument::new(uri.clone(), raw));
        self.cache
            .borrow_mut()
            .insert(uri.as_str().to_string(), doc.clone());
        doc
    }

    /// Parse file content as JSON or YAML, selected by extension.
    fn parse_content(&self, content: &str, path: &Path, uri: &str) -> Result<Value> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if self.yaml_extensions.iter().any(|e| e == &ext) {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|e| GenerateError::Load {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                })?;
            yaml_to_json(yaml, uri)
        } else {
            serde_json::from_str(content).map_err(|e| GenerateError::Load {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Normalize a YAML tree into a JSON-compatible one.
///
/// Maps must be keyed by strings only; anything else is fatal.
pub fn yaml_to_json(value: serde_yaml::Value, uri: &str) -> Result<Value> {
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => {
            let number = if let Some(i) = n.as_i64() {
                serde_json::Number::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Number::from(u)
            } else {
                serde_json::Number::from_f64(n.as_f64().unwrap_or(0.0)).ok_or_else(|| {
                    GenerateError::Load {
                        uri: uri.to_string(),
                        reason: format!("number {n:?} has no JSON representation"),
                    }
                })?
            };
            Ok(Value::Number(number))
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Sequence(seq) => {
            let mut out = Vec::with_capacity(seq.len());
            for item in seq {
                out.push(yaml_to_json(item, uri)?);
            }
            Ok(Value::Array(out))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    other => {
                        return Err(GenerateError::Load {
                            uri: uri.to_string(),
                            reason: format!("YAML mapping key {other:?} is not a string"),
                        })
                    }
                };
                out.insert(key, yaml_to_json(val, uri)?);
            }
            Ok(Value::Object(out))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value, uri),
    }
}

/// Expand CLI inputs: files pass through, directories are walked for
/// schema files. The result is sorted for deterministic processing order.
pub fn collect_schema_paths(inputs: &[PathBuf], config: &GeneratorConfig) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if ext == "json" || config.is_yaml_extension(&ext) {
                    out.push(path.to_path_buf());
                }
            }
        } else {
            out.push(input.clone());
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_normalization_matches_json() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("type: object\nminItems: 3\nratio: 0.5\nflag: true\n").unwrap();
        let value = yaml_to_json(yaml, "test").unwrap();
        assert_eq!(
            value,
            json!({"type": "object", "minItems": 3, "ratio": 0.5, "flag": true})
        );
    }

    #[test]
    fn yaml_non_string_key_is_fatal() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: x\n").unwrap();
        let err = yaml_to_json(yaml, "test").unwrap_err();
        assert!(matches!(err, GenerateError::Load { .. }));
    }

    #[test]
    fn preload_shares_one_document_instance() {
        let loader = Loader::new(&GeneratorConfig::default());
        let url = Url::parse("file:///virtual/a.json").unwrap();
        let doc = loader.preload(url.clone(), json!({"type": "object"}));
        let again = loader.load_url(&url).unwrap();
        assert!(Rc::ptr_eq(&doc, &again));
    }
}
