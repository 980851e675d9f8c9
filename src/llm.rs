use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{excerpt, CompletionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat-completion endpoint: role-tagged messages in, one text completion out.
pub trait CompletionClient {
    fn complete(
        &self,
        messages: &[ChatMessage],
    ) -> impl Future<Output = Result<String, CompletionError>> + Send;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
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

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }
}

impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        info!("Requesting completion from {} ({} messages)", self.model, messages.len());

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), latency_ms = start.elapsed().as_millis() as u64, "completion response");
        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }
        parse_completion(&body)
    }
}

fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(CompletionError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_roles_lowercase() {
        let messages = [ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.5,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["model"], "gpt-4o-mini");
    }

    fn client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new(base_url, "sk-test", "gpt-4o-mini", 0.5, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn posts_to_chat_completions_with_bearer_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "system", "content": "sys"}, {"role": "user", "content": "hi"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"H2: FAQ"}}]}"#)
            .create_async()
            .await;

        let reply = client(&format!("{}/v1/", server.url()))
            .complete(&[ChatMessage::system("sys"), ChatMessage::user("hi")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "H2: FAQ");
    }

    #[tokio::test]
    async fn error_status_keeps_an_excerpt_of_the_body() {
        let mut server = mockito::Server::new_async().await;
        let long_body = format!("{{\"error\":\"{}\"}}", "x".repeat(1000));
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(long_body)
            .create_async()
            .await;

        let err = client(&server.url())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        match err {
            CompletionError::Status { status, body } => {
                assert_eq!(status, 429);
                assert!(body.starts_with("{\"error\""));
                assert!(body.ends_with("..."));
                assert!(body.chars().count() <= 303);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_choice_content() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Do X"}},
                       {"index":1,"message":{"role":"assistant","content":"Do Y"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Do X");
    }

    #[test]
    fn empty_or_null_content_is_an_error() {
        assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(CompletionError::Empty)));
        let null = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(parse_completion(null), Err(CompletionError::Empty)));
        assert!(matches!(parse_completion("<html>"), Err(CompletionError::Decode(_))));
    }
}
