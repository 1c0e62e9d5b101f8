use crate::error::{AssistantError, Result};
use crate::types::Run;
use serde::{Deserialize, Serialize};

const OPENAI_ASSISTANTS_BASE_URL: &str = "https://api.openai.com/v1";

/// The backend gates the threads/runs surface behind this opt-in header.
const ASSISTANTS_BETA_HEADER: &str = "assistants=v2";

#[derive(Clone)]
pub struct AssistantsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AssistantsClient {
    pub fn new(http: reqwest::Client, api_key: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            base_url: OPENAI_ASSISTANTS_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn create_thread(&self) -> Result<String> {
        let url = format!("{}/threads", self.base_url);
        let body = self.post_json(&url, &serde_json::json!({})).await?;
        let parsed: ThreadObject = serde_json::from_str(&body)?;
        Ok(parsed.id)
    }

    #[tracing::instrument(level = "info", skip_all, fields(thread_id = %thread_id))]
    pub async fn append_user_message(&self, thread_id: &str, content: &str) -> Result<()> {
        let url = format!("{}/threads/{thread_id}/messages", self.base_url);
        let req = CreateMessageRequest {
            role: "user",
            content,
        };
        self.post_json(&url, &serde_json::to_value(&req)?).await?;
        Ok(())
    }

    #[tracing::instrument(level = "info", skip_all, fields(thread_id = %thread_id))]
    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        let url = format!("{}/threads/{thread_id}/runs", self.base_url);
        let req = CreateRunRequest { assistant_id };
        let body = self.post_json(&url, &serde_json::to_value(&req)?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(thread_id = %thread_id, run_id = %run_id))]
    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let url = format!("{}/threads/{thread_id}/runs/{run_id}", self.base_url);
        let body = self.get_json(&url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Text of the newest message on the thread, if any. The backend lists
    /// messages newest-first; the reply is the first text content part.
    #[tracing::instrument(level = "info", skip_all, fields(thread_id = %thread_id))]
    pub async fn latest_message_text(&self, thread_id: &str) -> Result<Option<String>> {
        let url = format!("{}/threads/{thread_id}/messages", self.base_url);
        let body = self.get_json(&url).await?;
        let page: MessagesPage = serde_json::from_str(&body)?;
        Ok(first_text_value(page))
    }

    async fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<String> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA_HEADER)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AssistantError::Http(format!(
                "assistants api status={status} body={body}"
            )));
        }
        Ok(body)
    }

    async fn get_json(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA_HEADER)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AssistantError::Http(format!(
                "assistants api status={status} body={body}"
            )));
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    data: Vec<ThreadMessageObject>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessageObject {
    #[serde(default)]
    content: Vec<MessageContentPart>,
}

#[derive(Debug, Deserialize)]
struct MessageContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<MessageTextContent>,
}

#[derive(Debug, Deserialize)]
struct MessageTextContent {
    value: String,
}

fn first_text_value(page: MessagesPage) -> Option<String> {
    let message = page.data.into_iter().next()?;
    message
        .content
        .into_iter()
        .find(|part| part.kind == "text")
        .and_then(|part| part.text)
        .map(|text| text.value)
}

#[cfg(test)]
mod tests {
    use super::{MessagesPage, first_text_value};

    #[test]
    fn first_text_value_takes_newest_message_first_text_part() {
        let page: MessagesPage = serde_json::from_str(
            r#"{
                "data": [
                    {
                        "id": "msg_2",
                        "role": "assistant",
                        "content": [
                            {"type": "image_file", "image_file": {"file_id": "f1"}},
                            {"type": "text", "text": {"value": "the reply", "annotations": []}}
                        ]
                    },
                    {
                        "id": "msg_1",
                        "role": "user",
                        "content": [{"type": "text", "text": {"value": "the prompt"}}]
                    }
                ]
            }"#,
        )
        .expect("parse messages page");
        assert_eq!(first_text_value(page).as_deref(), Some("the reply"));
    }

    #[test]
    fn first_text_value_is_none_for_empty_page() {
        let page: MessagesPage = serde_json::from_str(r#"{"data": []}"#).expect("parse empty page");
        assert_eq!(first_text_value(page), None);
    }

    #[test]
    fn first_text_value_skips_messages_without_text_parts() {
        let page: MessagesPage = serde_json::from_str(
            r#"{"data": [{"id": "msg_1", "content": [{"type": "image_file"}]}]}"#,
        )
        .expect("parse page");
        assert_eq!(first_text_value(page), None);
    }
}
