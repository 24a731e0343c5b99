//! Describe a data shape once, render it as interface declarations for a
//! language model prompt, and validate what the model sends back.
//!
//! The pipeline, leaf first:
//! - [`describe`]: abstract type descriptions and the [`Describe`] host adapter;
//! - [`lower`]: the schema graph builder (descriptions → [`ir`] declarations);
//! - [`codegen`]: the declaration renderer;
//! - [`schema`]: the compiled [`TypeSchema`] that ties them together;
//! - [`validate`]: the instance validator;
//! - [`translator`]: prompt construction, JSON extraction and the repair loop;
//! - [`model`], [`openai`], [`retry`]: the language model boundary.
pub mod codegen;
pub mod describe;
pub mod error;
pub mod ir;
pub mod lower;
pub mod model;
pub mod openai;
pub mod path_de;
pub mod retry;
pub mod schema;
pub mod translator;
pub mod validate;

pub use describe::{AliasDef, Annotation, Describe, FieldDef, RecordDef, TypeDef, TypeKey, TypeRegistry, TypeSource};
pub use error::{ModelError, SchemaError, TranslateError, ValidationError};
pub use model::{LanguageModel, PromptSection, Role};
pub use openai::{ModelConfig, OpenAiModel};
pub use retry::RetryConfig;
pub use schema::TypeSchema;
pub use translator::{Preamble, PromptBuilder, StandardPrompts, Translator, TranslatorOptions};
pub use validate::{JsonValidator, Violation};
