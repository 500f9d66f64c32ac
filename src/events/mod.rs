//! Events module for session activity
//!
//! The router emits one of these for every state change it makes. They are
//! fanned out over a broadcast channel to subscribed IPC clients.

use serde::{Deserialize, Serialize};

use crate::session::{FieldValue, OrderField, OrderRecord, Persona, SessionId, TutorMode};

/// Events emitted by the router while handling turns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new conversation started
    SessionStarted { session_id: SessionId, persona: Persona },

    /// Tutor mode changed
    ModeSwitched {
        session_id: SessionId,
        from: TutorMode,
        to: TutorMode,
    },

    /// Tutor topic changed
    TopicSelected { session_id: SessionId, topic: String },

    /// An order field was written
    FieldFilled {
        session_id: SessionId,
        field: OrderField,
        value: FieldValue,
    },

    /// Every required order field is now filled
    OrderCompleted {
        session_id: SessionId,
        order: OrderRecord,
    },

    /// A completed order was corrected
    OrderUpdated {
        session_id: SessionId,
        order: OrderRecord,
    },

    /// A turn could not be applied and the user was asked again
    Reprompted { session_id: SessionId, code: String },

    /// Conversation finished
    SessionEnded { session_id: SessionId, turns: u32 },
}

impl SessionEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::ModeSwitched { session_id, .. }
            | SessionEvent::TopicSelected { session_id, .. }
            | SessionEvent::FieldFilled { session_id, .. }
            | SessionEvent::OrderCompleted { session_id, .. }
            | SessionEvent::OrderUpdated { session_id, .. }
            | SessionEvent::Reprompted { session_id, .. }
            | SessionEvent::SessionEnded { session_id, .. } => *session_id,
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::SessionStarted { persona, .. } => {
                write!(f, "SESSION_STARTED ({})", persona)
            }
            SessionEvent::ModeSwitched { from, to, .. } => {
                write!(f, "MODE_SWITCHED ({} -> {})", from, to)
            }
            SessionEvent::TopicSelected { topic, .. } => write!(f, "TOPIC_SELECTED ({})", topic),
            SessionEvent::FieldFilled { field, .. } => write!(f, "FIELD_FILLED ({})", field),
            SessionEvent::OrderCompleted { .. } => write!(f, "ORDER_COMPLETED"),
            SessionEvent::OrderUpdated { .. } => write!(f, "ORDER_UPDATED"),
            SessionEvent::Reprompted { code, .. } => write!(f, "REPROMPTED ({})", code),
            SessionEvent::SessionEnded { turns, .. } => {
                write!(f, "SESSION_ENDED ({} turns)", turns)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::ModeSwitched {
            session_id: Uuid::nil(),
            from: TutorMode::Learn,
            to: TutorMode::Quiz,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"mode_switched\""));
        assert!(json.contains("\"to\":\"quiz\""));
        assert_eq!(event.to_string(), "MODE_SWITCHED (learn -> quiz)");
    }

    #[test]
    fn test_order_updated_display() {
        let event = SessionEvent::OrderUpdated {
            session_id: Uuid::nil(),
            order: OrderRecord::new(),
        };
        assert_eq!(event.to_string(), "ORDER_UPDATED");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order_updated");
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"session_ended","session_id":"00000000-0000-0000-0000-000000000000","turns":4}"#;
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, SessionEvent::SessionEnded { turns: 4, .. }));
        assert_eq!(event.session_id(), Uuid::nil());
    }
}
