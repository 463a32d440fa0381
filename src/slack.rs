use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Slack API error: {0}")]
    Api(String),
}

pub struct SlackWebClient {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    error: Option<String>,
    #[serde(flatten)]
    rest: HashMap<String, Value>,
}

impl SlackApiResponse {
    fn into_result(self) -> Result<(), SlackError> {
        if self.ok {
            return Ok(());
        }
        Err(SlackError::Api(
            self.error
                .unwrap_or_else(|| format!("unknown error {:?}", self.rest)),
        ))
    }
}

#[derive(Debug, Serialize)]
struct ReactionsAddRequest<'a> {
    channel: &'a str,
    timestamp: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatPostMessageRequest<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    text: &'a str,
    blocks: Value,
}

#[derive(Debug, Serialize)]
struct DelayedResponse<'a> {
    response_type: &'static str,
    text: &'a str,
}

impl SlackWebClient {
    pub fn new(bot_token: String) -> Self {
        Self::with_api_base(bot_token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(bot_token: String, api_base: impl Into<String>) -> Self {
        Self {
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn call<T: Serialize>(&self, method: &str, payload: &T) -> Result<(), SlackError> {
        let response: SlackApiResponse = self
            .client
            .post(format!("{}/{}", self.api_base, method))
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .json(payload)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    /// Adds an emoji reaction. Reacting twice with the same emoji is not an error.
    pub async fn reactions_add(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackError> {
        let payload = ReactionsAddRequest {
            channel,
            timestamp,
            name,
        };
        match self.call("reactions.add", &payload).await {
            Err(SlackError::Api(e)) if e == "already_reacted" => Ok(()),
            other => other,
        }
    }

    /// Posts `text` as a markdown section, threaded under `thread_ts` when given.
    pub async fn chat_post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), SlackError> {
        let payload = ChatPostMessageRequest {
            channel,
            thread_ts,
            text,
            blocks: markdown_blocks(text),
        };
        self.call("chat.postMessage", &payload).await
    }

    /// Delivers a deferred slash-command reply, visible to the whole channel.
    pub async fn respond(&self, response_url: &str, text: &str) -> Result<(), SlackError> {
        let response = self
            .client
            .post(response_url)
            .json(&DelayedResponse {
                response_type: "in_channel",
                text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!(
                "response_url returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    /// Fetches a private file using the bot token.
    pub async fn download_file(&self, url_private: &str) -> Result<Vec<u8>, SlackError> {
        let response = self
            .client
            .get(url_private)
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackError::Api(format!("file download returned {}", status)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn markdown_blocks(text: &str) -> Value {
    json!([{
        "type": "section",
        "text": { "type": "mrkdwn", "text": text }
    }])
}
