//! Natural-language request → validated JSON value.
//!
//! One `translate` call owns its conversation: the request prompt, then for
//! each repair the raw model response (as `assistant`) and a repair prompt
//! quoting the failure (as `user`). Nothing is shared between calls except
//! the compiled schema, which is read-only.
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::describe::Describe;
use crate::error::{SchemaError, TranslateError, ValidationError};
use crate::model::{LanguageModel, PromptSection};
use crate::schema::TypeSchema;
use crate::validate::JsonValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorOptions {
    /// Repair prompts sent after the first response; 0 disables repair.
    pub max_repair_attempts: usize,
    /// Drop `null` properties and array elements before validation.
    pub strip_nulls: bool,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self { max_repair_attempts: 1, strip_nulls: false }
    }
}

/// Sections placed before the generated request prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Preamble {
    Text(String),
    Sections(Vec<PromptSection>),
}

impl Preamble {
    fn into_sections(self) -> Vec<PromptSection> {
        match self {
            Preamble::Text(text) => vec![PromptSection::user(text)],
            Preamble::Sections(sections) => sections,
        }
    }
}

impl From<&str> for Preamble {
    fn from(value: &str) -> Self {
        Preamble::Text(value.to_string())
    }
}

impl From<Vec<PromptSection>> for Preamble {
    fn from(value: Vec<PromptSection>) -> Self {
        Preamble::Sections(value)
    }
}

/// Wording of the prompts a translator sends. The provided methods give the
/// standard framing; override either one to change it.
pub trait PromptBuilder: Send + Sync {
    fn request_prompt(&self, schema: &TypeSchema, request: &str) -> String {
        format!(
            "You are a service that translates user requests into JSON objects of type \"{}\" \
             according to the following TypeScript definitions:\n\
             ```\n{}```\n\
             The following is a user request:\n\
             '''\n{request}\n'''\n\
             The following is the user request translated into a JSON object with 2 spaces of \
             indentation and no properties with the value undefined:\n",
            schema.type_name(),
            schema.text(),
        )
    }

    fn repair_prompt(&self, _schema: &TypeSchema, validation_error: &str) -> String {
        format!(
            "The above JSON object is invalid for the following reason:\n\
             '''\n{validation_error}\n'''\n\
             The following is a revised JSON object:\n"
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPrompts;

impl PromptBuilder for StandardPrompts {}

pub struct Translator<T> {
    model: Arc<dyn LanguageModel>,
    validator: JsonValidator<T>,
    options: TranslatorOptions,
    prompts: Arc<dyn PromptBuilder>,
}

impl<T> Clone for Translator<T> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            validator: self.validator.clone(),
            options: self.options,
            prompts: Arc::clone(&self.prompts),
        }
    }
}

impl<T> fmt::Debug for Translator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("model", &self.model.model_name())
            .field("validator", &self.validator)
            .field("options", &self.options)
            .finish()
    }
}

impl<T: Describe + DeserializeOwned> Translator<T> {
    /// Compile the schema for `T` and translate into it.
    pub fn for_type(model: Arc<dyn LanguageModel>) -> Result<Self, SchemaError> {
        Ok(Self::new(model, Arc::new(TypeSchema::of::<T>()?)))
    }
}

impl<T: DeserializeOwned> Translator<T> {
    pub fn new(model: Arc<dyn LanguageModel>, schema: Arc<TypeSchema>) -> Self {
        Self {
            model,
            validator: JsonValidator::new(schema),
            options: TranslatorOptions::default(),
            prompts: Arc::new(StandardPrompts),
        }
    }

    pub fn with_prompts(mut self, prompts: impl PromptBuilder + 'static) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    pub fn with_options(mut self, options: TranslatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TranslatorOptions {
        &self.options
    }
    pub fn schema(&self) -> &TypeSchema {
        self.validator.schema()
    }
    pub fn validator(&self) -> &JsonValidator<T> {
        &self.validator
    }

    pub fn create_request_prompt(&self, request: &str) -> String {
        self.prompts.request_prompt(self.schema(), request)
    }

    pub fn create_repair_prompt(&self, validation_error: &str) -> String {
        self.prompts.repair_prompt(self.schema(), validation_error)
    }

    pub async fn translate(&self, request: &str) -> Result<T, TranslateError> {
        self.run(Vec::new(), request).await
    }

    pub async fn translate_with_preamble(
        &self,
        request: &str,
        preamble: impl Into<Preamble>,
    ) -> Result<T, TranslateError> {
        self.run(preamble.into().into_sections(), request).await
    }

    async fn run(&self, mut prompt: Vec<PromptSection>, request: &str) -> Result<T, TranslateError> {
        prompt.push(PromptSection::user(self.create_request_prompt(request)));
        let type_name = self.schema().type_name();
        let mut repairs = 0usize;

        loop {
            tracing::debug!(type_name, attempt = repairs + 1, sections = prompt.len(), "awaiting model");
            // model failures end the call; retrying them is the model's job
            let response = self.model.complete(&prompt).await?;

            let error = match self.extract_and_validate(&response) {
                Ok(value) => {
                    tracing::info!(type_name, repairs, "translation succeeded");
                    return Ok(value);
                }
                Err(error) => error,
            };

            if repairs >= self.options.max_repair_attempts {
                tracing::info!(type_name, repairs, "translation failed: {error}");
                return Err(error);
            }
            repairs += 1;
            tracing::debug!(type_name, repairs, "response rejected, requesting repair: {error}");

            prompt.push(PromptSection::assistant(response));
            prompt.push(PromptSection::user(self.create_repair_prompt(&error.to_string())));
        }
    }

    fn extract_and_validate(&self, response: &str) -> Result<T, TranslateError> {
        let candidate = extract_json(response).ok_or_else(|| TranslateError::Extraction {
            response: response.to_string(),
        })?;
        let mut value: Value =
            serde_json::from_str(candidate).map_err(|err| ValidationError::Parse(err.to_string()))?;
        if self.options.strip_nulls {
            strip_nulls(&mut value);
        }
        Ok(self.validator.validate_value(value)?)
    }
}

/// Text from the first `{` to the last `}`, inclusive.
pub fn extract_json(text: &str) -> Option<&str> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (first < last).then(|| &text[first..=last])
}

pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(strip_nulls);
        }
        _ => {}
    }
}

// ------------------------------- Tests ------------------------------------ //
