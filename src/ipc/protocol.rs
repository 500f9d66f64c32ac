//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::content::ContentItem;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::router::{Intent, RouteDecision, ScriptTemplate, StateMutation};
use crate::session::{Persona, Record, SessionId};

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from the conversation engine to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Open a session for a persona
    StartSession { persona: Persona },

    /// A raw user utterance, classified by the daemon
    Utterance { session_id: SessionId, text: String },

    /// An intent already classified by the caller
    Intent { session_id: SessionId, intent: Intent },

    /// Read a session record
    GetSession { session_id: SessionId },

    /// Close a session
    EndSession { session_id: SessionId },

    /// List the tutor's content items
    ListTopics,

    /// Subscribe to session event notifications
    Subscribe,
}

/// Responses from the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Session opened, with the greeting to speak
    SessionStarted {
        session_id: SessionId,
        voice: String,
        prompt: String,
    },

    /// Router decision for one turn
    Turn {
        voice: String,
        template: ScriptTemplate,
        prompt: String,
        mutation: Option<StateMutation>,
    },

    /// Session snapshot
    Session {
        session_id: SessionId,
        record: Record,
        complete: bool,
    },

    /// Session closed, with its final record
    SessionEnded { session_id: SessionId, record: Record },

    /// Tutor content listing
    Topics { items: Vec<ContentItem> },

    /// Subscription confirmed
    Subscribed,

    /// Pushed to subscribed clients
    Event { event: SessionEvent },

    /// Error response
    Error { code: String, message: String },
}

impl From<RouteDecision> for Response {
    fn from(decision: RouteDecision) -> Self {
        let prompt = decision.prompt();
        Response::Turn {
            voice: decision.voice,
            template: decision.template,
            prompt,
            mutation: decision.mutation,
        }
    }
}

impl From<SessionError> for Response {
    fn from(err: SessionError) -> Self {
        Response::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Sessions currently open
    pub active_sessions: usize,

    /// Content items loaded
    pub topics: usize,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_sessions: 0,
            topics: 0,
            uptime_secs: 0,
        }
    }
}
