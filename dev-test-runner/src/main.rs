//! Fixture runner: every `fixtures/<name>.types.json` is compiled and its
//! rendered text compared with `<name>.schema.d.ts`. Documents named
//! `<name>.valid*.json` must validate, `<name>.invalid*.json` must not.
//!
//! `cargo run -p dev-test-runner -- --bless` rewrites the snapshots.
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use json_tx::path_de::from_slice_with_path;
use json_tx::{JsonValidator, TypeRegistry, TypeSchema};

static FIXTURE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<name>[A-Za-z0-9_\-]+)\.types\.json$").expect("valid fixture regex"));

/// A type-description file plus the key to compile from.
#[derive(Debug, Deserialize)]
struct Fixture {
    root: String,
    #[serde(flatten)]
    registry: TypeRegistry,
}

#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, label: &str, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => {
                self.passed += 1;
                println!("{} {label}", "✅".green());
            }
            Err(message) => {
                self.failed += 1;
                println!("{} {}", "❌".red(), label.red().bold());
                println!("{message}");
            }
        }
    }
}

fn main() -> ExitCode {
    let bless = std::env::args().any(|arg| arg == "--bless");
    match run(&fixtures_dir(), bless) {
        Ok(tally) if tally.failed == 0 => {
            println!("{} fixture checks passed", tally.passed);
            ExitCode::SUCCESS
        }
        Ok(tally) => {
            println!("{} passed, {} failed", tally.passed, tally.failed);
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("fixtures")
}

fn run(dir: &Path, bless: bool) -> anyhow::Result<Tally> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut tally = Tally::default();
    for entry in &entries {
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(captures) = FIXTURE_NAME.captures(&file_name) else { continue };
        let name = &captures["name"];

        let bytes = std::fs::read(entry.path())?;
        let fixture: Fixture = from_slice_with_path(&bytes).with_context(|| format!("invalid fixture {file_name}"))?;
        let schema = Arc::new(TypeSchema::compile(fixture.registry, fixture.root.as_str()));

        let snapshot_path = dir.join(format!("{name}.schema.d.ts"));
        if bless {
            std::fs::write(&snapshot_path, schema.text())?;
        }
        tally.record(&format!("{name}: schema"), compare_snapshot(&snapshot_path, &schema));

        let validator = JsonValidator::<Value>::new(schema);
        for document in &entries {
            let document_name = document.file_name().to_string_lossy().to_string();
            let expect_valid = if document_name.starts_with(&format!("{name}.valid")) {
                true
            } else if document_name.starts_with(&format!("{name}.invalid")) {
                false
            } else {
                continue;
            };
            let outcome = check_document(&validator, &document.path(), expect_valid);
            tally.record(&format!("{name}: {document_name}"), outcome);
        }
    }
    Ok(tally)
}

fn compare_snapshot(path: &Path, schema: &TypeSchema) -> Result<(), String> {
    if !schema.errors().is_empty() {
        return Err(format!("conversion errors:\n  {}", schema.errors().join("\n  ")));
    }
    let expected = std::fs::read_to_string(path).map_err(|error| format!("missing snapshot: {error}"))?;
    if expected == schema.text() {
        Ok(())
    } else {
        Err(format!("--- expected\n{expected}\n--- actual\n{}", schema.text()))
    }
}

fn check_document(validator: &JsonValidator<Value>, path: &Path, expect_valid: bool) -> Result<(), String> {
    let source = std::fs::read_to_string(path).map_err(|error| error.to_string())?;
    match (validator.validate_str(&source), expect_valid) {
        (Ok(_), true) => Ok(()),
        (Err(error), false) => {
            println!("{}", error.to_string().dimmed());
            Ok(())
        }
        (Ok(_), false) => Err("expected a validation failure".to_string()),
        (Err(error), true) => Err(error.to_string()),
    }
}
