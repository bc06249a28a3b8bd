//! Inbound and outbound websocket message type definitions.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Actions the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Authenticate the socket with a token.
    AuthenticationChallenge {
        /// Access token.
        token: String,
    },
    /// Tell other members of a channel that this user is typing.
    UserTyping {
        /// Channel being typed in.
        channel_id: String,
        /// Thread root, if replying in a thread.
        parent_id: Option<String>,
    },
    /// Keep-alive.
    Ping,
}

impl ClientAction {
    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationChallenge { .. } => "authentication_challenge",
            Self::UserTyping { .. } => "user_typing",
            Self::Ping => "ping",
        }
    }
}

/// Result of an action frame, including the authentication challenge.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthReply {
    /// `{"status": "OK", "seq_reply": n}`
    Ok {
        /// `seq` of the frame this reply answers.
        seq_reply: Option<u64>,
    },
    /// `{"status": "FAIL", "seq_reply": n, "error": {...}}`
    Fail {
        /// `seq` of the frame this reply answers.
        seq_reply: Option<u64>,
        /// Server-supplied error payload.
        error: serde_json::Value,
    },
}

impl AuthReply {
    /// The `seq` this reply correlates to.
    pub fn seq_reply(&self) -> Option<u64> {
        match self {
            Self::Ok { seq_reply } | Self::Fail { seq_reply, .. } => *seq_reply,
        }
    }
}

/// Greeting the server sends once after the transport opens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerHello {
    /// Server build version.
    #[serde(default)]
    pub server_version: Option<String>,
    /// Server-assigned connection id.
    #[serde(default)]
    pub connection_id: Option<String>,
}

/// Who a domain event was broadcast to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Broadcast {
    /// Users excluded from the broadcast.
    pub omit_users: Option<HashMap<String, bool>>,
    /// Set when the event targets a single user.
    pub user_id: String,
    /// Set when the event targets a channel.
    pub channel_id: String,
    /// Set when the event targets a team.
    pub team_id: String,
}

/// Event-type tag of a domain event.
///
/// Tags the client has no dedicated variant for are kept verbatim in
/// [`EventKind::Other`] and routed to the unrouted-event channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// A post was created.
    Posted,
    /// A post was edited.
    PostEdited,
    /// A post was deleted.
    PostDeleted,
    /// Someone is typing.
    Typing,
    /// A user's presence status changed.
    StatusChange,
    /// A reaction was added to a post.
    ReactionAdded,
    /// A reaction was removed from a post.
    ReactionRemoved,
    /// A channel was marked viewed.
    ChannelViewed,
    /// Any other tag.
    Other(String),
}

impl EventKind {
    /// All kinds with a dedicated subscription point.
    pub const ROUTED: [EventKind; 8] = [
        EventKind::Posted,
        EventKind::PostEdited,
        EventKind::PostDeleted,
        EventKind::Typing,
        EventKind::StatusChange,
        EventKind::ReactionAdded,
        EventKind::ReactionRemoved,
        EventKind::ChannelViewed,
    ];

    /// Wire tag for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Posted => "posted",
            Self::PostEdited => "post_edited",
            Self::PostDeleted => "post_deleted",
            Self::Typing => "typing",
            Self::StatusChange => "status_change",
            Self::ReactionAdded => "reaction_added",
            Self::ReactionRemoved => "reaction_removed",
            Self::ChannelViewed => "channel_viewed",
            Self::Other(tag) => tag,
        }
    }

    /// Whether this kind has a dedicated subscription point.
    pub fn is_routed(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "posted" => Self::Posted,
            "post_edited" => Self::PostEdited,
            "post_deleted" => Self::PostDeleted,
            "typing" => Self::Typing,
            "status_change" => Self::StatusChange,
            "reaction_added" => Self::ReactionAdded,
            "reaction_removed" => Self::ReactionRemoved,
            "channel_viewed" => Self::ChannelViewed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        match EventKind::from(tag.as_str()) {
            Self::Other(_) => Self::Other(tag),
            known => known,
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application-level event pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Event-type tag.
    #[serde(rename = "event")]
    pub kind: EventKind,
    /// Event payload, never interpreted by this crate.
    pub data: serde_json::Value,
    /// Broadcast scope.
    pub broadcast: Broadcast,
    /// Server sequence number.
    pub seq: Option<u64>,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply to an action frame.
    Reply(AuthReply),
    /// Server greeting.
    Hello(ServerHello),
    /// Domain event.
    Event(DomainEvent),
}
