use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::hub::client::{HubClient, HubError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct HubChatResponse {
    content: String,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug)]
pub struct ChatResponse {
    pub reply: String,
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

pub async fn chat(hub: &HubClient, messages: &[ChatMessage]) -> Result<ChatResponse, HubError> {
    let res: HubChatResponse = hub
        .request(
            Method::POST,
            "/hub/ai/v1/chat",
            Some(&json!({ "messages": messages, "model": "claude" })),
        )
        .await?;
    Ok(ChatResponse {
        reply: res.content,
        model: res.model,
        usage: res.usage,
    })
}

pub async fn complete(hub: &HubClient, prompt: &str) -> Result<String, HubError> {
    #[derive(Deserialize)]
    struct Completion {
        content: String,
    }
    let res: Completion = hub
        .request(
            Method::POST,
            "/hub/ai/v1/complete",
            Some(&json!({ "prompt": prompt })),
        )
        .await?;
    Ok(res.content)
}

/// Structured-output variant: the Hub returns `{"data": <T>}`.
pub async fn structured<T: DeserializeOwned>(hub: &HubClient, prompt: &str) -> Result<T, HubError> {
    #[derive(Deserialize)]
    struct Structured<T> {
        data: T,
    }
    let res: Structured<T> = hub
        .request(
            Method::POST,
            "/hub/ai/v1/json",
            Some(&json!({ "prompt": prompt })),
        )
        .await?;
    Ok(res.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;

    fn unconfigured_hub() -> HubClient {
        HubClient::new(&HubConfig {
            url: "https://hub.invalid/api".into(),
            token: None,
        })
    }

    #[tokio::test]
    async fn unconfigured_hub_short_circuits_every_ai_operation() {
        let hub = unconfigured_hub();
        let messages = [ChatMessage {
            role: "user".into(),
            content: "hi".into(),
        }];
        assert!(matches!(
            chat(&hub, &messages).await.unwrap_err(),
            HubError::Unconfigured
        ));
        assert!(matches!(
            complete(&hub, "finish this").await.unwrap_err(),
            HubError::Unconfigured
        ));
        assert!(matches!(
            structured::<serde_json::Value>(&hub, "as json").await.unwrap_err(),
            HubError::Unconfigured
        ));
    }

    #[test]
    fn chat_messages_serialize_as_role_content_pairs() {
        let msg = ChatMessage {
            role: "user".into(),
            content: "hi".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn hub_chat_response_tolerates_missing_model_and_usage() {
        let res: HubChatResponse =
            serde_json::from_value(serde_json::json!({"content": "hello"})).unwrap();
        assert_eq!(res.content, "hello");
        assert!(res.model.is_none());
        assert!(res.usage.is_none());
    }
}
