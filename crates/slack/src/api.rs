use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// One reply inside a thread, in conversation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadMessage {
    pub text: String,
    pub user: String,
    pub ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub title: String,
    pub initial_comment: String,
    pub channel_id: String,
    pub thread_ts: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{operation}: request failed: {reason}")]
    Request { operation: &'static str, reason: String },
    #[error("{operation}: slack declined the call: {error}")]
    Declined { operation: &'static str, error: String },
    #[error("{operation}: malformed response: {reason}")]
    MalformedResponse { operation: &'static str, reason: String },
}

/// Request/response Slack Web API surface the bot depends on. Kept narrow
/// so tests can script it; the socket event stream is a separate seam.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Posts a message visible only to `user_id` in the given channel.
    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), ApiError>;

    /// Fetches up to `limit` replies of a thread, oldest first.
    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, ApiError>;

    async fn upload_file(&self, request: UploadRequest) -> Result<(), ApiError>;
}

const SLACK_API_BASE: &str = "https://slack.com/api";

/// `SlackApi` over the Slack Web API. Uploads use the external upload
/// flow: reserve an upload URL, stream the bytes, then complete against
/// the target channel and thread.
pub struct HttpSlackApi {
    client: Client,
    bot_token: SecretString,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    text: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    ts: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    upload_url: String,
    #[serde(default)]
    file_id: String,
}

impl HttpSlackApi {
    pub fn new(client: Client, bot_token: SecretString) -> Self {
        Self { client, bot_token, base_url: SLACK_API_BASE.to_owned() }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Request {
                operation,
                reason: format!("unexpected status {status}"),
            });
        }

        response.json::<T>().await.map_err(|error| ApiError::MalformedResponse {
            operation,
            reason: error.to_string(),
        })
    }
}

fn ensure_ok(operation: &'static str, ok: bool, error: Option<String>) -> Result<(), ApiError> {
    if ok {
        return Ok(());
    }
    Err(ApiError::Declined {
        operation,
        error: error.unwrap_or_else(|| "unknown error".to_owned()),
    })
}

fn replies_from_response(
    operation: &'static str,
    response: RepliesResponse,
) -> Result<Vec<ThreadMessage>, ApiError> {
    ensure_ok(operation, response.ok, response.error)?;
    Ok(response
        .messages
        .into_iter()
        .map(|message| ThreadMessage { text: message.text, user: message.user, ts: message.ts })
        .collect())
}

#[async_trait]
impl SlackApi for HttpSlackApi {
    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), ApiError> {
        const OPERATION: &str = "chat.postEphemeral";

        let response = self
            .client
            .post(self.endpoint(OPERATION))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&json!({ "channel": channel_id, "user": user_id, "text": text }))
            .send()
            .await
            .map_err(|error| ApiError::Request { operation: OPERATION, reason: error.to_string() })?;

        let body = Self::decode::<AckResponse>(OPERATION, response).await?;
        ensure_ok(OPERATION, body.ok, body.error)
    }

    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, ApiError> {
        const OPERATION: &str = "conversations.replies";

        let limit = limit.to_string();
        let response = self
            .client
            .get(self.endpoint(OPERATION))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("channel", channel_id), ("ts", thread_ts), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|error| ApiError::Request { operation: OPERATION, reason: error.to_string() })?;

        let body = Self::decode::<RepliesResponse>(OPERATION, response).await?;
        replies_from_response(OPERATION, body)
    }

    async fn upload_file(&self, request: UploadRequest) -> Result<(), ApiError> {
        const RESERVE: &str = "files.getUploadURLExternal";
        const TRANSFER: &str = "file byte transfer";
        const COMPLETE: &str = "files.completeUploadExternal";

        let length = request.bytes.len().to_string();
        let response = self
            .client
            .get(self.endpoint(RESERVE))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("filename", request.filename.as_str()), ("length", length.as_str())])
            .send()
            .await
            .map_err(|error| ApiError::Request { operation: RESERVE, reason: error.to_string() })?;

        let reservation = Self::decode::<UploadUrlResponse>(RESERVE, response).await?;
        ensure_ok(RESERVE, reservation.ok, reservation.error)?;
        if reservation.upload_url.is_empty() || reservation.file_id.is_empty() {
            return Err(ApiError::MalformedResponse {
                operation: RESERVE,
                reason: "missing upload_url or file_id".to_owned(),
            });
        }

        let transfer = self
            .client
            .post(&reservation.upload_url)
            .body(request.bytes)
            .send()
            .await
            .map_err(|error| ApiError::Request { operation: TRANSFER, reason: error.to_string() })?;
        if !transfer.status().is_success() {
            return Err(ApiError::Request {
                operation: TRANSFER,
                reason: format!("unexpected status {}", transfer.status()),
            });
        }

        let response = self
            .client
            .post(self.endpoint(COMPLETE))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&json!({
                "files": [{ "id": reservation.file_id, "title": request.title }],
                "channel_id": request.channel_id,
                "thread_ts": request.thread_ts,
                "initial_comment": request.initial_comment,
            }))
            .send()
            .await
            .map_err(|error| ApiError::Request { operation: COMPLETE, reason: error.to_string() })?;

        let body = Self::decode::<AckResponse>(COMPLETE, response).await?;
        ensure_ok(COMPLETE, body.ok, body.error)
    }
}
