//! structgen CLI
//!
//! Generates Go type declarations and validators from JSON Schema files.
//! Exit codes: 0 on success, 1 on any fatal generation error, 2 on CLI
//! misuse (clap reports usage errors itself).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use structgen::{GeneratorConfig, Generator};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "structgen")]
#[command(about = "Generate Go structs, decoders and validators from JSON Schema")]
struct Cli {
    /// Schema files or directories to generate from
    #[arg(required = true)]
    schemas: Vec<PathBuf>,

    /// Output directory for generated files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Package name for schemas without an override
    #[arg(long, default_value = "models")]
    package_name: String,

    /// Override package name for a schema: URI=PKG (repeatable)
    #[arg(long = "schema-package", value_name = "URI=PKG")]
    schema_package: Vec<String>,

    /// Override output filename for a schema: URI=FILE (repeatable)
    #[arg(long = "schema-output", value_name = "URI=FILE")]
    schema_output: Vec<String>,

    /// Override the synthesized root type name: URI=NAME (repeatable)
    #[arg(long = "schema-root-type", value_name = "URI=NAME")]
    schema_root_type: Vec<String>,

    /// Suppress codec/validator emission; keep declarations and constructors
    #[arg(long)]
    only_models: bool,

    /// Select narrow integer types from minimum/maximum bounds
    #[arg(long)]
    min_sized_ints: bool,

    /// Emit New* constructors preloaded with schema defaults
    #[arg(long)]
    default_constructors: bool,

    /// Additional Go imports whitelisted into generated files
    #[arg(long = "extra-imports", value_delimiter = ',')]
    extra_imports: Vec<String>,

    /// Initialisms kept uppercase in identifiers (e.g. URL,ID)
    #[arg(long, value_delimiter = ',')]
    capitalizations: Vec<String>,

    /// Extensions attempted when a $ref lacks one
    #[arg(long = "resolve-extension", value_delimiter = ',')]
    resolve_extension: Vec<String>,

    /// Alternate YAML extensions recognized by the loader
    #[arg(long = "yaml-extension", value_delimiter = ',')]
    yaml_extension: Vec<String>,

    /// Serialization tag sets emitted on struct fields
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli).context("invalid flags")?;
    let generator = Generator::new(config);

    let output = generator
        .generate_paths(&cli.schemas)
        .context("generation failed")?;
    generator.write(&output).context("cannot write output")?;

    // Warnings surface only after successful emission.
    for warning in &output.warnings {
        eprintln!("{warning}");
    }
    for file in &output.files {
        println!(
            "{} ({} declarations, package {})",
            file.path.display(),
            file.type_count,
            file.package
        );
    }
    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<GeneratorConfig> {
    let mut config = GeneratorConfig {
        only_models: cli.only_models,
        min_sized_ints: cli.min_sized_ints,
        default_constructors: cli.default_constructors,
        extra_imports: cli.extra_imports.clone(),
        default_package: cli.package_name.clone(),
        output_dir: cli.output.clone(),
        ..GeneratorConfig::default()
    };

    config.schema_packages = GeneratorConfig::parse_mappings(&cli.schema_package)?;
    config.schema_root_types = GeneratorConfig::parse_mappings(&cli.schema_root_type)?;
    config.schema_outputs = GeneratorConfig::parse_mappings(&cli.schema_output)?
        .into_iter()
        .map(|(uri, file)| (uri, PathBuf::from(file)))
        .collect::<BTreeMap<_, _>>();

    for cap in &cli.capitalizations {
        config.capitalizations.insert(cap.to_uppercase());
    }
    if !cli.resolve_extension.is_empty() {
        config.resolve_extensions = cli
            .resolve_extension
            .iter()
            .map(|e| {
                if e.starts_with('.') {
                    e.clone()
                } else {
                    format!(".{e}")
                }
            })
            .collect();
    }
    for ext in &cli.yaml_extension {
        let ext = ext.trim_start_matches('.').to_string();
        if !config.yaml_extensions.contains(&ext) {
            config.yaml_extensions.push(ext);
        }
    }
    if !cli.tags.is_empty() {
        config.tags = cli.tags.clone();
    }
    Ok(config)
}
