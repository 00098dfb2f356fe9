use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::InboundEvent;
use crate::router::EventRouter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// The duplex connection to Slack. The same handle receives events and
/// sends acknowledgments; interleaved use of both paths is safe at the
/// transport layer, not here.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Next classified event, or `None` once the stream is closed.
    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError>;
    async fn acknowledge(&self, request_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _request_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

enum PumpOutcome {
    StreamClosed,
    Cancelled,
}

/// The single event loop: reads one event, routes it to completion, then
/// reads the next. There is no internal fan-out, so at most one
/// summarization is in flight at a time. Routing errors are logged and
/// the loop continues; only cancellation or a closed stream ends it.
pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    router: EventRouter,
    reconnect_policy: ReconnectPolicy,
    cancel: CancellationToken,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        router: EventRouter,
        reconnect_policy: ReconnectPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self { transport, router, reconnect_policy, cancel }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            if self.cancel.is_cancelled() {
                info!("shutdown requested before socket connect");
                return Ok(());
            }

            match self.connect_and_pump(attempt).await {
                Ok(PumpOutcome::Cancelled) => {
                    info!("socket loop stopped by shutdown signal");
                    return Ok(());
                }
                Ok(PumpOutcome::StreamClosed) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<PumpOutcome, TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let next = tokio::select! {
                () = self.cancel.cancelled() => {
                    self.transport.disconnect().await?;
                    return Ok(PumpOutcome::Cancelled);
                }
                next = self.transport.next_event() => next?,
            };

            let Some(event) = next else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(PumpOutcome::StreamClosed);
            };

            debug!(event = ?event_kind(&event), "received slack event");

            if let Err(error) = self.router.handle(event, self.transport.as_ref()).await {
                warn!(error = %error, "event handling failed; continuing socket loop");
            }
        }
    }
}

fn event_kind(event: &InboundEvent) -> &'static str {
    match event {
        InboundEvent::Connecting => "connecting",
        InboundEvent::ConnectionError { .. } => "connection_error",
        InboundEvent::Connected => "connected",
        InboundEvent::Hello => "hello",
        InboundEvent::EventsApi(_) => "events_api",
        InboundEvent::Unknown { .. } => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    use super::{ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError};
    use crate::api::{ApiError, SlackApi, ThreadMessage, UploadRequest};
    use crate::events::{EventsApiEnvelope, InboundEvent};
    use crate::router::EventRouter;
    use crate::summarizer::ThreadSummarizer;
    use tracknote_extractors::url::{
        spotify_matcher, youtube_matcher, youtube_music_matcher, LinkMatcher,
    };
    use tracknote_extractors::{Provider, ProviderRegistry, ResolveError, TitleResolver};

    struct NullApi;

    #[async_trait]
    impl SlackApi for NullApi {
        async fn post_ephemeral(
            &self,
            _channel_id: &str,
            _user_id: &str,
            _text: &str,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        async fn fetch_thread_replies(
            &self,
            _channel_id: &str,
            _thread_ts: &str,
            _limit: u32,
        ) -> Result<Vec<ThreadMessage>, ApiError> {
            Ok(Vec::new())
        }

        async fn upload_file(&self, _request: UploadRequest) -> Result<(), ApiError> {
            Ok(())
        }
    }

    struct StaticResolver;

    #[async_trait]
    impl TitleResolver for StaticResolver {
        async fn resolve(&self, _url: &str) -> Result<String, ResolveError> {
            Ok("Artist - Song".to_owned())
        }
    }

    fn router(cancel: CancellationToken) -> EventRouter {
        let matchers: Vec<Box<dyn LinkMatcher>> = vec![
            Box::new(spotify_matcher().expect("pattern compiles")),
            Box::new(youtube_matcher().expect("pattern compiles")),
            Box::new(youtube_music_matcher().expect("pattern compiles")),
        ];
        let resolver = Arc::new(StaticResolver);
        let mut resolvers: std::collections::HashMap<
            Provider,
            Arc<dyn TitleResolver>,
        > = std::collections::HashMap::new();
        for provider in Provider::ALL {
            resolvers.insert(provider, resolver.clone());
        }
        let registry =
            Arc::new(ProviderRegistry::new(matchers, resolvers).expect("bijection holds"));

        EventRouter::new(
            Arc::new(NullApi),
            ThreadSummarizer::new(registry),
            1000,
            "summarize".to_owned(),
            cancel,
        )
    }

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        events: VecDeque<Result<Option<InboundEvent>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            events: Vec<Result<Option<InboundEvent>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    events: events.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError> {
            let mut state = self.state.lock().await;
            state.events.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, request_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(request_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    fn unsupported_callback_envelope(request_id: &str) -> InboundEvent {
        InboundEvent::EventsApi(EventsApiEnvelope {
            request_id: request_id.to_owned(),
            payload: json!({
                "type": "event_callback",
                "event": { "type": "reaction_added", "user": "U1" }
            }),
        })
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(unsupported_callback_envelope("env-1"))), Ok(None)],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            router(CancellationToken::new()),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
            CancellationToken::new(),
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            router(CancellationToken::new()),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
            CancellationToken::new(),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn routing_errors_do_not_stop_the_loop() {
        // An invalid command error from the router must not abort the pump;
        // the following event is still read and acknowledged.
        let invalid_command = InboundEvent::EventsApi(EventsApiEnvelope {
            request_id: "env-bad".to_owned(),
            payload: json!({
                "type": "event_callback",
                "event": {
                    "type": "app_mention",
                    "channel": "C1",
                    "user": "U1",
                    "text": "<@BOT> do something else",
                    "thread_ts": "1730000000.1000"
                }
            }),
        });

        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(invalid_command)),
                Ok(Some(unsupported_callback_envelope("env-after"))),
                Ok(None),
            ],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            router(CancellationToken::new()),
            ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
            CancellationToken::new(),
        );

        runner.start().await.expect("runner should not fail");
        assert_eq!(
            transport.acknowledgements().await,
            vec!["env-bad".to_owned(), "env-after".to_owned()],
        );
    }

    struct PendingTransport;

    #[async_trait]
    impl SocketTransport for PendingTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn acknowledge(&self, _request_id: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancellation_exits_promptly_while_blocked_on_next_event() {
        let cancel = CancellationToken::new();
        let runner = SocketModeRunner::new(
            Arc::new(PendingTransport),
            router(cancel.clone()),
            ReconnectPolicy::default(),
            cancel.clone(),
        );

        let handle = tokio::spawn(async move { runner.start().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("runner should exit promptly after cancellation")
            .expect("runner task should not panic");
        assert!(result.is_ok());
    }

    #[test]
    fn backoff_is_bounded_by_max_delay() {
        let policy = ReconnectPolicy { max_retries: 10, base_delay_ms: 250, max_delay_ms: 5_000 };
        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(1).as_millis(), 500);
        assert_eq!(policy.backoff(10).as_millis(), 5_000);
    }
}
