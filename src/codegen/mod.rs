//! Code Generation
//!
//! The pipeline: Loader -> Resolver -> Synthesizer -> Emitter.
//!
//! The [`Generator`] owns the document cache and the per-package
//! identifier allocators and threads the immutable configuration through
//! explicitly. Generation is single-threaded and synchronous end-to-end;
//! memoization correctness depends on observing state transitions in one
//! order. Every output file is rendered to a string before anything is
//! written, so a fatal error never leaves partial output behind.

pub mod ast;
pub mod codec;
pub mod emit;
pub mod merge;
pub mod names;
pub mod synth;

pub use ast::{GoType, Package, TypeBody, TypeDecl};
pub use synth::Synthesizer;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::GeneratorConfig;
use crate::error::{GenerateError, Result, Warning};
use crate::schema::loader::collect_schema_paths;
use crate::schema::{Loader, SchemaDocument};
use names::{CaseConverter, IdentAllocator, PackageMapper};

/// One rendered output file
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub package: String,
    pub contents: String,
    pub type_count: usize,
}

/// Result of a generator run
#[derive(Debug, Clone, Default)]
pub struct GeneratedOutput {
    pub files: Vec<GeneratedFile>,
    pub warnings: Vec<Warning>,
}

/// Top-level generator: owns the loader cache and drives the pipeline
/// for each input schema.
pub struct Generator {
    config: GeneratorConfig,
    loader: Loader,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        let loader = Loader::new(&config);
        Self { config, loader }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Generate from CLI inputs: schema files, or directories walked for
    /// schema files.
    pub fn generate_paths(&self, inputs: &[PathBuf]) -> Result<GeneratedOutput> {
        let paths = collect_schema_paths(inputs, &self.config)?;
        let mut docs = Vec::with_capacity(paths.len());
        for path in &paths {
            docs.push(self.loader.load_path(path)?);
        }
        self.generate_documents(&docs)
    }

    /// Generate from an in-memory schema registered under `uri`.
    pub fn generate_value(&self, uri: &str, value: Value) -> Result<GeneratedOutput> {
        let url = Url::parse(uri).map_err(|e| GenerateError::Load {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        let doc = self.loader.preload(url, value);
        self.generate_documents(&[doc])
    }

    /// Run the pipeline over already-loaded documents.
    pub fn generate_documents(&self, docs: &[Rc<SchemaDocument>]) -> Result<GeneratedOutput> {
        let case = CaseConverter::new(&self.config);
        let mapper = PackageMapper::new(&self.config, &case);

        let mut allocators: BTreeMap<String, IdentAllocator> = BTreeMap::new();
        let mut files: Vec<GeneratedFile> = Vec::with_capacity(docs.len());
        let mut warnings = Vec::new();

        for doc in docs {
            let package_name = mapper.package_name(doc);
            let output_file = mapper.output_file(doc);
            let (root_name, forced) = mapper.root_type_name(doc);
            debug!(
                schema = doc.identity(),
                package = %package_name,
                root = %root_name,
                "generating"
            );

            if files.iter().any(|f| f.path == output_file) {
                return Err(GenerateError::NamingCollision {
                    package: package_name,
                    name: output_file.display().to_string(),
                });
            }

            // Identifier allocation is continuous across files that share
            // a package: Go forbids duplicate names per package.
            let allocator = allocators.remove(&package_name).unwrap_or_default();
            let package = ast::Package::new(package_name.clone(), output_file.clone());
            let mut synth = Synthesizer::new(&self.config, &self.loader, package, allocator);
            synth.synthesize_root(doc, &root_name, forced)?;

            let package = synth.package;
            allocators.insert(package_name.clone(), synth.allocator);
            warnings.extend(synth.warnings);

            // Every default re-checked against completed declarations;
            // a mismatch must never survive into generated code.
            verify_defaults(&package)?;

            let contents = emit::render_package(&package, &self.config, &source_label(doc))?;
            files.push(GeneratedFile {
                path: output_file,
                package: package_name,
                contents,
                type_count: package.decls().len(),
            });
        }

        info!(
            files = files.len(),
            warnings = warnings.len(),
            "generation complete"
        );
        Ok(GeneratedOutput { files, warnings })
    }

    /// Write rendered files to disk. Called only after every file has
    /// been rendered successfully.
    pub fn write(&self, output: &GeneratedOutput) -> Result<()> {
        for file in &output.files {
            if let Some(parent) = file.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&file.path, &file.contents)?;
            info!(path = %file.path.display(), "wrote");
        }
        Ok(())
    }
}

/// The schema name shown in generated file headers: the `$id` when
/// present, the file name otherwise.
fn source_label(doc: &SchemaDocument) -> String {
    if let Some(id) = &doc.id {
        return id.clone();
    }
    doc.uri
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("schema")
        .to_string()
}

/// Final default-value pass over completed declarations.
fn verify_defaults(pkg: &Package) -> Result<()> {
    for decl in pkg.decls() {
        if let TypeBody::Struct(st) = &decl.body {
            for field in &st.fields {
                if let Some(default) = &field.default {
                    codec::check_default(
                        &field.ty,
                        default,
                        &format!("{}.{}", decl.name, field.name),
                        pkg,
                    )?;
                }
            }
        }
    }
    Ok(())
}
