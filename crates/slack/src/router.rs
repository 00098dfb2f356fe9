use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SlackApi, UploadRequest};
use crate::events::{
    AppMentionEvent, CallbackEvent, EventsApiEnvelope, InboundEvent, InnerEvent,
};
use crate::socket::SocketTransport;
use crate::summarizer::ThreadSummarizer;

const THREAD_ONLY_NOTICE: &str = "Bot is only usable in threads to summarize them";

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("mention did not contain a recognized command")]
    InvalidCommand,
    #[error("event handling cancelled before completion")]
    Cancelled,
    #[error("posting ephemeral notice failed: {0}")]
    EphemeralNotice(#[source] ApiError),
    #[error("fetching thread replies failed: {0}")]
    ThreadFetch(#[source] ApiError),
    #[error("uploading summary artifact failed: {0}")]
    Upload(#[source] ApiError),
}

/// The per-event state machine. Classifies each inbound event to a
/// terminal action; no state survives between events beyond the shared
/// API handle. Errors returned here are logged by the socket runner and
/// never stop the event loop.
pub struct EventRouter {
    api: Arc<dyn SlackApi>,
    summarizer: ThreadSummarizer,
    reply_limit: u32,
    command_keyword: String,
    cancel: CancellationToken,
}

impl EventRouter {
    pub fn new(
        api: Arc<dyn SlackApi>,
        summarizer: ThreadSummarizer,
        reply_limit: u32,
        command_keyword: String,
        cancel: CancellationToken,
    ) -> Self {
        Self { api, summarizer, reply_limit, command_keyword, cancel }
    }

    pub async fn handle(
        &self,
        event: InboundEvent,
        transport: &dyn SocketTransport,
    ) -> Result<(), RouteError> {
        match event {
            InboundEvent::Connecting => debug!("connecting to slack socket"),
            InboundEvent::ConnectionError { error } => {
                warn!(error = %error, "socket connection failed");
            }
            InboundEvent::Connected => info!("connected to slack socket"),
            InboundEvent::Hello => debug!("greeting received from slack connection"),
            InboundEvent::EventsApi(envelope) => {
                return self.handle_events_api(envelope, transport).await;
            }
            InboundEvent::Unknown { kind } => {
                warn!(kind = %kind, "not implemented event received");
            }
        }

        Ok(())
    }

    async fn handle_events_api(
        &self,
        envelope: EventsApiEnvelope,
        transport: &dyn SocketTransport,
    ) -> Result<(), RouteError> {
        let callback = match CallbackEvent::from_payload(&envelope.payload) {
            Ok(callback) => callback,
            Err(error) => {
                warn!(
                    request_id = %envelope.request_id,
                    error = %error,
                    "ignored invalid events api payload"
                );
                return Ok(());
            }
        };

        // The upstream protocol expects prompt acknowledgment regardless of
        // processing outcome, so ack before any further branching.
        if let Err(error) = transport.acknowledge(&envelope.request_id).await {
            warn!(
                request_id = %envelope.request_id,
                error = %error,
                "failed to acknowledge events api event"
            );
        }

        let inner = match callback {
            CallbackEvent::EventCallback(inner) => inner,
            CallbackEvent::Other { .. } => return Ok(()),
        };

        match inner {
            InnerEvent::AppMention(mention) => self.handle_mention(mention).await,
            InnerEvent::Unsupported { event_type } => {
                warn!(event_type = %event_type, "not implemented events api event received");
                Ok(())
            }
        }
    }

    async fn handle_mention(&self, mention: AppMentionEvent) -> Result<(), RouteError> {
        if mention.thread_ts.is_empty() {
            self.bounded(self.api.post_ephemeral(
                &mention.channel_id,
                &mention.user_id,
                THREAD_ONLY_NOTICE,
            ))
            .await?
            .map_err(RouteError::EphemeralNotice)?;
            return Ok(());
        }

        if !mention.text.contains(&self.command_keyword) {
            return Err(RouteError::InvalidCommand);
        }

        self.summarize_thread(&mention.channel_id, &mention.thread_ts).await
    }

    async fn summarize_thread(&self, channel_id: &str, thread_ts: &str) -> Result<(), RouteError> {
        let messages = self
            .bounded(self.api.fetch_thread_replies(channel_id, thread_ts, self.reply_limit))
            .await?
            .map_err(RouteError::ThreadFetch)?;

        let artifact = self
            .bounded(self.summarizer.summarize(&messages, channel_id, thread_ts))
            .await?;

        let row_count = artifact.row_count();
        let filename = artifact.filename().to_owned();
        let request = UploadRequest {
            title: filename.clone(),
            filename,
            initial_comment: format!("Found {row_count} music URLs in this thread"),
            channel_id: channel_id.to_owned(),
            thread_ts: thread_ts.to_owned(),
            bytes: artifact.into_bytes(),
        };

        self.bounded(self.api.upload_file(request)).await?.map_err(RouteError::Upload)?;

        info!(channel_id, thread_ts, count = row_count, "summarized thread");
        Ok(())
    }

    /// Races a unit of in-flight work against the shutdown token so no
    /// network call outlives cancellation.
    async fn bounded<F: Future>(&self, work: F) -> Result<F::Output, RouteError> {
        self.cancel.run_until_cancelled(work).await.ok_or(RouteError::Cancelled)
    }
}
