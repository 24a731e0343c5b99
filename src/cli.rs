//! CLI: compile a type-description file, validate documents against it, or
//! run one translation.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use json_tx::openai::OPENAI_ENDPOINT;
use json_tx::path_de::from_slice_with_path;
use json_tx::{
    JsonValidator, ModelConfig, OpenAiModel, RetryConfig, Translator, TranslatorOptions, TypeRegistry, TypeSchema,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// turn natural-language requests into JSON that matches a described type
#[derive(Parser, Debug)]
#[command(name = "json-tx", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile a type-description file and print the rendered declarations
    Schema(SchemaOut),
    /// validate JSON documents against a described type
    Validate(ValidateIn),
    /// translate one request through an OpenAI-compatible endpoint
    Translate(TranslateIn),
}

#[derive(Args, Debug, Clone)]
struct TypeSettings {
    /// JSON type-description file (a serialized type registry)
    #[arg(long)]
    types: PathBuf,

    /// key of the root type inside the description file
    #[arg(long)]
    root: String,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ValidateIn {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct TranslateIn {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// the natural-language request
    #[arg(long)]
    request: String,

    /// repair prompts allowed after the first response
    #[arg(long, default_value_t = 1)]
    max_repairs: usize,

    /// drop null properties before validating
    #[arg(long, default_value_t = false)]
    strip_nulls: bool,

    #[command(flatten)]
    model_settings: ModelSettings,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    Openai,
    Azure,
}

#[derive(Args, Debug, Clone)]
struct ModelSettings {
    #[arg(long, value_enum, default_value_t = Provider::Openai)]
    provider: Provider,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// model name; required for the openai provider
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// chat-completions URL; required for the azure provider
    #[arg(long, env = "OPENAI_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, env = "OPENAI_ORGANIZATION")]
    organization: Option<String>,

    /// retries for rate limiting and unavailability
    #[arg(long, default_value_t = 3)]
    retries: usize,

    /// per-request timeout, in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSettings {
    fn compile(&self) -> anyhow::Result<TypeSchema> {
        let bytes = std::fs::read(&self.types)
            .with_context(|| format!("failed to read type descriptions {}", self.types.display()))?;
        let registry: TypeRegistry = from_slice_with_path(&bytes)
            .with_context(|| format!("invalid type descriptions in {}", self.types.display()))?;
        if !registry.contains(&self.root.as_str().into()) {
            bail!("root type '{}' is not described in {}", self.root, self.types.display());
        }
        // conversion errors are already reported through `tracing::warn!`
        Ok(TypeSchema::compile(registry, self.root.as_str()))
    }
}

impl ModelSettings {
    fn config(&self) -> anyhow::Result<ModelConfig> {
        let mut config = match self.provider {
            Provider::Openai => {
                let model = self.model.clone().ok_or_else(|| anyhow!("--model (or OPENAI_MODEL) is required"))?;
                let mut config = ModelConfig::openai(self.api_key.clone(), model);
                config.endpoint = self.endpoint.clone().unwrap_or_else(|| OPENAI_ENDPOINT.to_string());
                config
            }
            Provider::Azure => {
                let endpoint = self
                    .endpoint
                    .clone()
                    .ok_or_else(|| anyhow!("--endpoint (or OPENAI_ENDPOINT) is required for azure"))?;
                let mut config = ModelConfig::azure(endpoint, self.api_key.clone());
                config.model = self.model.clone();
                config
            }
        };
        config.organization = self.organization.clone();
        config.request_timeout = Duration::from_secs(self.timeout_secs);
        config.retry = RetryConfig { retries: self.retries, ..RetryConfig::default() };
        Ok(config)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// `Ok(false)` when the command ran but reported failures.
    pub async fn run(&self) -> anyhow::Result<bool> {
        match &self.cmd {
            Command::Schema(target) => {
                let schema = target.type_settings.compile()?;
                match target.out.as_ref() {
                    Some(out) => write_output(out, schema.text())?,
                    None => print!("{}", schema.text()),
                }
                Ok(true)
            }
            Command::Validate(target) => {
                let schema = Arc::new(target.type_settings.compile()?);
                let validator = JsonValidator::<Value>::new(schema);
                let source_paths = resolve_file_path_patterns(&target.input)?;

                let verdicts = source_paths
                    .par_iter()
                    .map(|path| (path, validate_file(&validator, path, target.json_pointer.as_deref())))
                    .collect::<Vec<_>>();

                let mut all_ok = true;
                for (path, verdict) in verdicts {
                    match verdict {
                        Ok(()) => println!("{} {}", "✅".green(), path.display()),
                        Err(message) => {
                            all_ok = false;
                            println!("{} {}", "❌".red(), path.display().to_string().red().bold());
                            println!("{message}");
                        }
                    }
                }
                Ok(all_ok)
            }
            Command::Translate(target) => {
                let schema = Arc::new(target.type_settings.compile()?);
                let model = OpenAiModel::new(target.model_settings.config()?)?;
                let translator = Translator::<Value>::new(Arc::new(model), schema).with_options(TranslatorOptions {
                    max_repair_attempts: target.max_repairs,
                    strip_nulls: target.strip_nulls,
                });
                let value = translator.translate(&target.request).await?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(true)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn validate_file(validator: &JsonValidator<Value>, path: &Path, json_pointer: Option<&str>) -> Result<(), String> {
    let source = std::fs::read_to_string(path).map_err(|error| format!("failed to read file: {error}"))?;
    let document = serde_json::from_str::<Value>(&source).map_err(|error| format!("failed to parse JSON: {error}"))?;
    let node = match json_pointer {
        None => &document,
        Some(pointer) => document
            .pointer(pointer)
            .ok_or_else(|| format!("JSON pointer {pointer} selects nothing"))?,
    };
    validator.check(node).map_err(|error| error.to_string())
}

fn write_output(out: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_translate_with_env_free_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "json-tx", "translate", "--types", "t.json", "--root", "Order", "--request", "two lattes",
            "--api-key", "k", "--model", "gpt-4o", "--max-repairs", "2", "--strip-nulls",
        ])
        .unwrap();
        let Command::Translate(target) = cli.cmd else { panic!("expected translate") };
        assert_eq!(target.max_repairs, 2);
        assert!(target.strip_nulls);
        let config = target.model_settings.config().unwrap();
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.retry.retries, 3);
    }

    #[test]
    fn azure_requires_an_endpoint() {
        let cli = CommandLineInterface::try_parse_from([
            "json-tx", "translate", "--types", "t.json", "--root", "R", "--request", "x",
            "--api-key", "k", "--provider", "azure",
        ])
        .unwrap();
        let Command::Translate(target) = cli.cmd else { panic!("expected translate") };
        // OPENAI_ENDPOINT may be set in the environment running the tests
        if target.model_settings.endpoint.is_none() {
            assert!(target.model_settings.config().is_err());
        }
    }

    #[test]
    fn conversion_errors_stay_on_the_schema() {
        let path = std::env::temp_dir().join(format!("json-tx-cli-{}.types.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"types": {"Conn": {"kind": "record", "name": "Conn",
                "fields": [{"name": "peer", "type": {"named": {"key": "Missing"}}}]}}}"#,
        )
        .unwrap();
        let settings = TypeSettings { types: path.clone(), root: "Conn".into() };
        let schema = settings.compile().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(schema.errors().len(), 1);
        assert!(schema.text().contains("peer: any;"));
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "b/c.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("b/c.json")]);
    }
}
