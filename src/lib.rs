//! structgen
//!
//! Generates statically-typed Go struct declarations, decoders and
//! validators from JSON Schema documents (drafts 4 through 2020-12 on a
//! documented core subset).
//!
//! ## Features
//!
//! - **Reference resolution**: intra- and inter-document `$ref` with
//!   caching, sibling merging and bounded chains
//! - **Composition**: `allOf` structural merging, `anyOf`/`oneOf` unions
//!   with discriminator detection, recursive schemas
//! - **Validators**: generated decoders enforce required fields,
//!   patterns, numeric bounds, enum membership and defaults
//! - **Deterministic output**: identical inputs and flags produce
//!   byte-identical files
//!
//! ## Pipeline
//!
//! ```text
//! Loader -> Resolver -> Synthesizer -> Target AST -> Emitter
//!                                          |
//!                             Validator/Codec Synthesizer
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod schema;

pub use codegen::{GeneratedFile, GeneratedOutput, Generator};
pub use config::GeneratorConfig;
pub use error::{GenerateError, Result, Warning};
pub use schema::{Loader, SchemaDocument, SchemaNode};
