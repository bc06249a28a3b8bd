//! JSON codec for websocket frames.
//!
//! Inbound text is classified into exactly one [`InboundFrame`] by the
//! fields it carries: `status` makes it a reply, `event == "hello"` a
//! greeting, any other `event` a domain event. Anything else is a
//! [`CodecError`], which callers drop.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::types::{AuthReply, Broadcast, ClientAction, DomainEvent, InboundFrame, ServerHello};
use super::validator::validate_inbound;

/// Event tag of the server greeting.
pub const HELLO_EVENT: &str = "hello";

/// Why an inbound frame could not be classified.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame was empty or whitespace.
    #[error("empty frame")]
    Empty,
    /// Frame exceeded the configured size limit.
    #[error("frame of {size} bytes exceeds limit of {max}")]
    TooLarge {
        /// Frame size in bytes.
        size: usize,
        /// Configured limit.
        max: usize,
    },
    /// Frame was not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Frame was JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// `status` was neither `OK` nor `FAIL`.
    #[error("unknown reply status: {0}")]
    UnknownStatus(String),
    /// No string `status` or `event` field.
    #[error("frame has neither a status nor an event field")]
    Unclassified,
}

/// Decodes and classifies one inbound text frame.
///
/// Only the classifying fields are strict. `seq`, `seq_reply`, `broadcast`
/// and the greeting payload are read leniently, so a frame with an odd
/// optional field is still delivered.
pub fn decode(raw: &str, max_bytes: usize) -> Result<InboundFrame, CodecError> {
    validate_inbound(raw, max_bytes)?;

    let Value::Object(mut frame) = serde_json::from_str::<Value>(raw)? else {
        return Err(CodecError::NotAnObject);
    };

    if let Some(status) = frame.get("status").and_then(Value::as_str) {
        let seq_reply = frame.get("seq_reply").and_then(Value::as_u64);
        return match status {
            "OK" => Ok(InboundFrame::Reply(AuthReply::Ok { seq_reply })),
            "FAIL" => Ok(InboundFrame::Reply(AuthReply::Fail {
                seq_reply,
                error: frame.remove("error").unwrap_or(Value::Null),
            })),
            other => Err(CodecError::UnknownStatus(other.to_string())),
        };
    }

    let Some(tag) = frame.get("event").and_then(Value::as_str).map(str::to_owned) else {
        return Err(CodecError::Unclassified);
    };
    let data = frame.remove("data").unwrap_or(Value::Null);

    if tag == HELLO_EVENT {
        return Ok(InboundFrame::Hello(ServerHello {
            server_version: text_field(&data, "server_version"),
            connection_id: text_field(&data, "connection_id"),
        }));
    }

    Ok(InboundFrame::Event(DomainEvent {
        kind: tag.into(),
        data: match data {
            Value::Null => Value::Object(Default::default()),
            other => other,
        },
        broadcast: broadcast_from(frame.get("broadcast")),
        seq: frame.get("seq").and_then(Value::as_u64),
    }))
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Reads a broadcast scope field by field; ill-typed fields fall back to
/// their defaults.
fn broadcast_from(value: Option<&Value>) -> Broadcast {
    let Some(scope) = value.filter(|v| v.is_object()) else {
        return Broadcast::default();
    };
    Broadcast {
        omit_users: scope
            .get("omit_users")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        user_id: text_field(scope, "user_id").unwrap_or_default(),
        channel_id: text_field(scope, "channel_id").unwrap_or_default(),
        team_id: text_field(scope, "team_id").unwrap_or_default(),
    }
}

#[derive(Serialize)]
struct WireAction<'a> {
    action: &'static str,
    seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<ActionData<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ActionData<'a> {
    Auth {
        token: &'a str,
    },
    Typing {
        channel_id: &'a str,
        parent_id: &'a str,
    },
}

/// Encodes an outbound action frame with the given sequence number.
pub fn encode(seq: u64, action: &ClientAction) -> Result<String, serde_json::Error> {
    let data = match action {
        ClientAction::AuthenticationChallenge { token } => Some(ActionData::Auth { token }),
        ClientAction::UserTyping {
            channel_id,
            parent_id,
        } => Some(ActionData::Typing {
            channel_id,
            parent_id: parent_id.as_deref().unwrap_or(""),
        }),
        ClientAction::Ping => None,
    };

    serde_json::to_string(&WireAction {
        action: action.name(),
        seq,
        data,
    })
}
