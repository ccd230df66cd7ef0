use crate::XpiaResult;
use anyhow::Context;
use async_openai::{
    config::{AzureConfig, OpenAIConfig},
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::env;
use std::sync::Mutex;

#[async_trait]
pub trait PromptTarget: Send + Sync {
    /// Sends a prompt to the target and returns the raw string response
    async fn send_prompt(&self, prompt: &str) -> XpiaResult<String>;
}

fn user_message(prompt: &str) -> XpiaResult<ChatCompletionRequestMessage> {
    let user_msg = ChatCompletionRequestUserMessageArgs::default()
        .content(prompt)
        .build()?;
    Ok(ChatCompletionRequestMessage::User(user_msg))
}

/// Chat-completion target for api.openai.com and OpenAI-compatible endpoints.
pub struct OpenAIChatTarget {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIChatTarget {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        Self { client, model }
    }

    /// Points the target at a custom base URL, used for mocking in tests.
    pub fn new_with_base_url(api_key: String, model: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        let client = Client::with_config(config);
        Self { client, model }
    }
}

#[async_trait]
impl PromptTarget for OpenAIChatTarget {
    async fn send_prompt(&self, prompt: &str) -> XpiaResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![user_message(prompt)?])
            .build()?;

        let response = self.client.chat().create(request).await?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// Chat-completion target for an Azure OpenAI deployment.
///
/// Azure routes by deployment name rather than model name, so the triple
/// (endpoint, deployment, key) fully identifies the target.
pub struct AzureOpenAIChatTarget {
    client: Client<AzureConfig>,
}

impl AzureOpenAIChatTarget {
    const API_VERSION: &'static str = "2024-02-15-preview";

    pub fn new(endpoint: String, api_key: String, deployment: String) -> Self {
        let config = AzureConfig::new()
            .with_api_base(endpoint)
            .with_api_key(api_key)
            .with_deployment_id(deployment)
            .with_api_version(Self::API_VERSION);
        let client = Client::with_config(config);
        Self { client }
    }

    /// Reads the `AZURE_OPENAI_CHAT_ENDPOINT`, `AZURE_OPENAI_CHAT_KEY` and
    /// `AZURE_OPENAI_CHAT_DEPLOYMENT` environment variables.
    pub fn from_env() -> XpiaResult<Self> {
        let endpoint = env::var("AZURE_OPENAI_CHAT_ENDPOINT")
            .context("AZURE_OPENAI_CHAT_ENDPOINT must be set")?;
        let api_key =
            env::var("AZURE_OPENAI_CHAT_KEY").context("AZURE_OPENAI_CHAT_KEY must be set")?;
        let deployment = env::var("AZURE_OPENAI_CHAT_DEPLOYMENT")
            .context("AZURE_OPENAI_CHAT_DEPLOYMENT must be set")?;
        Ok(Self::new(endpoint, api_key, deployment))
    }
}

#[async_trait]
impl PromptTarget for AzureOpenAIChatTarget {
    async fn send_prompt(&self, prompt: &str) -> XpiaResult<String> {
        // The deployment is fixed in the config; the model field is ignored by
        // Azure but required by the request builder.
        let request = CreateChatCompletionRequestArgs::default()
            .model("azure-deployment")
            .messages(vec![user_message(prompt)?])
            .build()?;

        let response = self.client.chat().create(request).await?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// A target that records every prompt it receives and echoes it back.
///
/// Useful for dry runs and for asserting what an orchestrator actually sent.
#[derive(Default)]
pub struct TextTarget {
    received: Mutex<Vec<String>>,
}

impl TextTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().expect("prompt log poisoned").clone()
    }
}

#[async_trait]
impl PromptTarget for TextTarget {
    async fn send_prompt(&self, prompt: &str) -> XpiaResult<String> {
        self.received
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        Ok(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_target_records_prompts() {
        let target = TextTarget::new();
        let echo = target.send_prompt("hello").await.unwrap();
        assert_eq!(echo, "hello");
        assert_eq!(target.received(), vec!["hello".to_string()]);
    }
}
