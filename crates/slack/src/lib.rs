//! Slack integration - Socket Mode bot interface.
//!
//! This crate provides the Slack side of tracknote:
//! - **Socket Mode** (`socket`) - transport seam and the single event loop
//! - **Events** (`events`) - inbound event model and payload decoding
//! - **Router** (`router`) - per-event state machine: acknowledge, filter
//!   mentions to threads, gate on the `summarize` keyword
//! - **Web API** (`api`) - ephemeral notices, thread-reply fetch, file
//!   upload
//! - **Summarizer** (`summarizer`) - music-link extraction over a thread
//!   and the CSV summary artifact
//!
//! # Architecture
//!
//! ```text
//! Socket events → SocketModeRunner → EventRouter → ThreadSummarizer
//!                        ↓                ↓              ↓
//!                   acknowledge     SlackApi calls   ProviderRegistry
//! ```
//!
//! The runner reads one event at a time and runs it to completion, so at
//! most one summarization is in flight. A shared `CancellationToken`
//! stops the loop and aborts in-flight network work.

pub mod api;
pub mod events;
pub mod router;
pub mod socket;
pub mod summarizer;

pub use api::{ApiError, HttpSlackApi, SlackApi, ThreadMessage, UploadRequest};
pub use events::{AppMentionEvent, CallbackEvent, EventsApiEnvelope, InboundEvent, InnerEvent};
pub use router::{EventRouter, RouteError};
pub use socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner, SocketTransport};
pub use summarizer::{ParsedLink, SummaryArtifact, ThreadSummarizer};
