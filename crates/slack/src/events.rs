use serde::Deserialize;
use thiserror::Error;

/// One event read off the socket stream, classified by kind. Only
/// `EventsApi` carries a payload that needs further unwrapping; the
/// remaining kinds are connection lifecycle notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    Connecting,
    ConnectionError { error: String },
    Connected,
    Hello,
    EventsApi(EventsApiEnvelope),
    Unknown { kind: String },
}

/// An Events API delivery. The payload is kept raw here because the wire
/// shape is not trusted: decoding happens in the router, and a payload
/// that fails to decode is dropped rather than treated as fatal.
#[derive(Clone, Debug, PartialEq)]
pub struct EventsApiEnvelope {
    /// Identifier the acknowledgment must reference.
    pub request_id: String,
    pub payload: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackEvent {
    /// An `event_callback` delivery wrapping one inner event.
    EventCallback(InnerEvent),
    /// Any other callback sub-type; dropped silently after acknowledgment.
    Other { kind: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InnerEvent {
    AppMention(AppMentionEvent),
    Unsupported { event_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppMentionEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    /// Root timestamp of the enclosing thread. Empty means the mention was
    /// posted outside a thread; that sentinel matches the wire payload and
    /// always routes to the usage notice, never to summarization.
    pub thread_ts: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("events api payload failed to decode: {0}")]
    Decode(String),
    #[error("event_callback payload is missing its inner event")]
    MissingInnerEvent,
    #[error("inner event is missing its type tag")]
    MissingEventType,
}

#[derive(Debug, Deserialize)]
struct RawCallback {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    event: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawAppMention {
    channel: String,
    user: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    thread_ts: String,
}

const EVENT_CALLBACK_KIND: &str = "event_callback";
const APP_MENTION_TYPE: &str = "app_mention";

impl CallbackEvent {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, PayloadError> {
        let raw: RawCallback = serde_json::from_value(payload.clone())
            .map_err(|error| PayloadError::Decode(error.to_string()))?;

        if raw.kind != EVENT_CALLBACK_KIND {
            return Ok(Self::Other { kind: raw.kind });
        }

        let inner = raw.event.ok_or(PayloadError::MissingInnerEvent)?;
        let event_type = inner
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(PayloadError::MissingEventType)?
            .to_owned();

        if event_type != APP_MENTION_TYPE {
            return Ok(Self::EventCallback(InnerEvent::Unsupported { event_type }));
        }

        let mention: RawAppMention = serde_json::from_value(inner)
            .map_err(|error| PayloadError::Decode(error.to_string()))?;

        Ok(Self::EventCallback(InnerEvent::AppMention(AppMentionEvent {
            channel_id: mention.channel,
            user_id: mention.user,
            text: mention.text,
            thread_ts: mention.thread_ts,
        })))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AppMentionEvent, CallbackEvent, InnerEvent, PayloadError};

    #[test]
    fn decodes_threaded_app_mention() {
        let payload = json!({
            "type": "event_callback",
            "event": {
                "type": "app_mention",
                "channel": "C1",
                "user": "U1",
                "text": "<@BOT> summarize",
                "thread_ts": "1730000000.1000"
            }
        });

        assert_eq!(
            CallbackEvent::from_payload(&payload),
            Ok(CallbackEvent::EventCallback(InnerEvent::AppMention(AppMentionEvent {
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                text: "<@BOT> summarize".to_owned(),
                thread_ts: "1730000000.1000".to_owned(),
            }))),
        );
    }

    #[test]
    fn missing_thread_ts_decodes_to_empty_sentinel() {
        let payload = json!({
            "type": "event_callback",
            "event": { "type": "app_mention", "channel": "C1", "user": "U1", "text": "hi" }
        });

        let decoded = CallbackEvent::from_payload(&payload).expect("payload decodes");
        let CallbackEvent::EventCallback(InnerEvent::AppMention(mention)) = decoded else {
            panic!("expected app mention, got {decoded:?}");
        };
        assert_eq!(mention.thread_ts, "");
    }

    #[test]
    fn unsupported_inner_event_keeps_its_type_tag() {
        let payload = json!({
            "type": "event_callback",
            "event": { "type": "reaction_added", "user": "U1" }
        });

        assert_eq!(
            CallbackEvent::from_payload(&payload),
            Ok(CallbackEvent::EventCallback(InnerEvent::Unsupported {
                event_type: "reaction_added".to_owned(),
            })),
        );
    }

    #[test]
    fn non_callback_kind_is_other() {
        let payload = json!({ "type": "url_verification", "challenge": "abc" });
        assert_eq!(
            CallbackEvent::from_payload(&payload),
            Ok(CallbackEvent::Other { kind: "url_verification".to_owned() }),
        );
    }

    #[test]
    fn callback_without_inner_event_is_an_error() {
        let payload = json!({ "type": "event_callback" });
        assert_eq!(
            CallbackEvent::from_payload(&payload),
            Err(PayloadError::MissingInnerEvent),
        );
    }

    #[test]
    fn payload_without_type_tag_is_an_error() {
        let payload = json!({ "event": { "type": "app_mention" } });
        assert!(matches!(
            CallbackEvent::from_payload(&payload),
            Err(PayloadError::Decode(_)),
        ));
    }
}
