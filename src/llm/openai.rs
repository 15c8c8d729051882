use super::{ChatClient, ChatError};
use crate::models::{Conversation, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiChatClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn request_body<'a>(&'a self, conversation: &'a Conversation) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: conversation.turns(),
            temperature: self.config.temperature,
        }
    }
}

fn parse_completion(body: &str) -> Result<String, ChatError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ChatError::Malformed(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::Malformed("response has no choices".to_string()))?;
    match choice.message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(ChatError::EmptyCompletion),
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, conversation: &Conversation) -> Result<String, ChatError> {
        debug!(
            model = %self.config.model,
            turns = conversation.len(),
            "Requesting completion"
        );

        let mut request = self
            .http
            .post(self.completions_url())
            .json(&self.request_body(conversation));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            endpoint: "http://localhost:8080/v1/".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: Some("sk-secret".to_string()),
            timeout: Duration::from_secs(5),
            temperature: Some(0.0),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let client = OpenAiChatClient::new(config()).unwrap();
        let conversation = Conversation::new()
            .appended(Turn::system("schema"))
            .appended(Turn::user("How many orders?"));

        let body = serde_json::to_value(client.request_body(&conversation)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "schema"},
                    {"role": "user", "content": "How many orders?"}
                ],
                "temperature": 0.0
            })
        );
        assert_eq!(client.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"SELECT 1"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_parse_completion_errors() {
        assert!(matches!(parse_completion("not json"), Err(ChatError::Malformed(_))));
        assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(ChatError::Malformed(_))));
        assert!(matches!(
            parse_completion(r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Err(ChatError::EmptyCompletion)
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(ChatError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_debug_masks_api_key() {
        let printed = format!("{:?}", config());
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("****"));
    }
}
