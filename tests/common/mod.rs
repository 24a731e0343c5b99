#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use json_tx::{LanguageModel, ModelError, PromptSection};

/// Replays canned responses in order and records the prompts it was given.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<Vec<PromptSection>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: ModelError) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::from([Err(error)])),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> Vec<PromptSection> {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &[PromptSection]) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Backend("no scripted response left".into())))
    }
}

/// Never answers; used to exercise cancellation.
pub struct SilentModel;

#[async_trait]
impl LanguageModel for SilentModel {
    async fn complete(&self, _prompt: &[PromptSection]) -> Result<String, ModelError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}
