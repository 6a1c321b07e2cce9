use crate::pipeline::traits::{EngineRequest, ReasoningEngine, TokenStream};
use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

/// Chat-completions backend streaming content deltas as tokens.
pub struct OpenAiEngine {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEngine {
    pub fn new(api_key: &str, model: &str, api_base: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiEngine {
    async fn stream(&self, request: &EngineRequest) -> Result<TokenStream> {
        let chat = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(request.max_tokens)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(request.role_instruction.as_str())
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(request.task_instruction.as_str())
                    .build()?
                    .into(),
            ])
            .build()?;

        debug!(model = %self.model, max_tokens = request.max_tokens, "opening completion stream");
        let stream = self
            .client
            .chat()
            .create_stream(chat)
            .await
            .context("completion stream request failed")?;

        let tokens = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(response) => {
                    let text: String = response
                        .choices
                        .into_iter()
                        .filter_map(|choice| choice.delta.content)
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(e) => Some(Err(anyhow::Error::new(e).context("completion stream broke"))),
            }
        });
        Ok(tokens.boxed())
    }
}
