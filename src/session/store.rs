//! Session state store
//!
//! Holds exactly one record per active session. Each record is owned by the
//! store; callers read through `get` and write through `set_field`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::content::ContentLibrary;
use crate::error::{SessionError, SessionResult};

use super::order::{FieldValue, OrderField, OrderRecord};
use super::tutor::{TutorField, TutorMode, TutorState};

pub type SessionId = Uuid;

/// Which agent a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Barista,
    Tutor,
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Persona::Barista => write!(f, "barista"),
            Persona::Tutor => write!(f, "tutor"),
        }
    }
}

/// Per-persona session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "persona", content = "state", rename_all = "snake_case")]
pub enum Record {
    Barista(OrderRecord),
    Tutor(TutorState),
}

impl Record {
    /// A fresh record for a persona
    pub fn empty(persona: Persona) -> Self {
        match persona {
            Persona::Barista => Record::Barista(OrderRecord::new()),
            Persona::Tutor => Record::Tutor(TutorState::default()),
        }
    }

    pub fn persona(&self) -> Persona {
        match self {
            Record::Barista(_) => Persona::Barista,
            Record::Tutor(_) => Persona::Tutor,
        }
    }
}

/// A live conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub record: Record,
    pub started_at: DateTime<Utc>,
    /// Number of routed turns so far
    pub turns: u32,
}

/// Owns every active session record
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    content: Arc<ContentLibrary>,
}

impl SessionStore {
    pub fn new(content: Arc<ContentLibrary>) -> Self {
        Self {
            sessions: HashMap::new(),
            content,
        }
    }

    pub fn content(&self) -> &ContentLibrary {
        &self.content
    }

    /// Start a session with an empty record
    pub fn create(&mut self, persona: Persona) -> SessionId {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            Session {
                id,
                record: Record::empty(persona),
                started_at: Utc::now(),
                turns: 0,
            },
        );
        info!(session_id = %id, %persona, active = self.sessions.len(), "session created");
        id
    }

    pub fn get(&self, id: &SessionId) -> SessionResult<&Record> {
        self.session(id).map(|session| &session.record)
    }

    pub fn session(&self, id: &SessionId) -> SessionResult<&Session> {
        self.sessions
            .get(id)
            .ok_or_else(|| SessionError::session_not_found(id.to_string()))
    }

    pub(crate) fn session_mut(&mut self, id: &SessionId) -> SessionResult<&mut Session> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::session_not_found(id.to_string()))
    }

    /// Write one field of a session record.
    ///
    /// Barista sessions accept `drinkType`, `size`, `milk`, `extras` and `name`;
    /// tutor sessions accept `mode` and `topic`. Anything else is
    /// `InvalidField`. The record is only touched once the value is valid.
    pub fn set_field(
        &mut self,
        id: &SessionId,
        field_name: &str,
        value: FieldValue,
    ) -> SessionResult<()> {
        let content = Arc::clone(&self.content);
        let session = self.session_mut(id)?;

        match &mut session.record {
            Record::Barista(order) => {
                let field: OrderField = field_name.parse()?;
                order.set(field, value)?;
            }
            Record::Tutor(state) => {
                let field: TutorField = field_name.parse()?;
                let text = match value {
                    FieldValue::Text(text) => text,
                    FieldValue::List(_) => {
                        return Err(SessionError::InvalidValue {
                            field: field_name.to_string(),
                            reason: "expected text, got a list".into(),
                        })
                    }
                };
                match field {
                    TutorField::Mode => {
                        state.mode = text.parse::<TutorMode>()?;
                    }
                    TutorField::Topic => {
                        let item = content.get(text.trim())?;
                        state.topic = Some(item.id.clone());
                    }
                }
            }
        }

        debug!(session_id = %id, field = field_name, "field set");
        Ok(())
    }

    /// True iff every required order field is filled. Tutor sessions never complete.
    pub fn is_complete(&self, id: &SessionId) -> SessionResult<bool> {
        Ok(match self.get(id)? {
            Record::Barista(order) => order.is_complete(),
            Record::Tutor(_) => false,
        })
    }

    /// Remove a session, returning its final record
    pub fn end(&mut self, id: &SessionId) -> SessionResult<Record> {
        let session = self
            .sessions
            .remove(id)
            .ok_or_else(|| SessionError::session_not_found(id.to_string()))?;
        info!(
            session_id = %id,
            turns = session.turns,
            duration_secs = (Utc::now() - session.started_at).num_seconds(),
            "session ended"
        );
        Ok(session.record)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(ContentLibrary::bundled().unwrap()))
    }

    #[test]
    fn test_unknown_session_not_found() {
        let store = store();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.get(&id),
            Err(SessionError::NotFound { kind: "session", .. })
        ));
        assert!(store.is_complete(&id).is_err());
    }

    #[test]
    fn test_invalid_field_never_mutates() {
        let mut store = store();
        let barista = store.create(Persona::Barista);
        let tutor = store.create(Persona::Tutor);

        for (id, field) in [(barista, "color"), (barista, "mode"), (tutor, "size"), (tutor, "")] {
            let before = store.get(&id).unwrap().clone();
            let err = store.set_field(&id, field, "anything".into()).unwrap_err();
            assert!(matches!(err, SessionError::InvalidField { .. }), "{field}");
            assert_eq!(store.get(&id).unwrap(), &before);
        }
    }

    #[test]
    fn test_barista_completion() {
        let mut store = store();
        let id = store.create(Persona::Barista);
        for (field, value) in [("drinkType", "latte"), ("size", "large"), ("milk", "oat")] {
            store.set_field(&id, field, value.into()).unwrap();
            assert!(!store.is_complete(&id).unwrap());
        }
        store.set_field(&id, "name", "Sam".into()).unwrap();
        assert!(store.is_complete(&id).unwrap());
    }

    #[test]
    fn test_tutor_mode_and_topic() {
        let mut store = store();
        let id = store.create(Persona::Tutor);
        store.set_field(&id, "topic", "loops".into()).unwrap();
        store.set_field(&id, "mode", "quiz".into()).unwrap();

        let expected = Record::Tutor(TutorState {
            mode: TutorMode::Quiz,
            topic: Some("loops".into()),
        });
        assert_eq!(store.get(&id).unwrap(), &expected);

        // Same mode again leaves the state as it was
        store.set_field(&id, "mode", "quiz".into()).unwrap();
        assert_eq!(store.get(&id).unwrap(), &expected);
        assert!(!store.is_complete(&id).unwrap());
    }

    #[test]
    fn test_unknown_topic_rejected() {
        let mut store = store();
        let id = store.create(Persona::Tutor);
        let err = store.set_field(&id, "topic", "astrology".into()).unwrap_err();
        assert!(matches!(err, SessionError::NotFound { kind: "topic", .. }));
        assert_eq!(store.get(&id).unwrap(), &Record::Tutor(TutorState::default()));
    }

    #[test]
    fn test_end_removes_session() {
        let mut store = store();
        let id = store.create(Persona::Barista);
        assert_eq!(store.len(), 1);
        assert_eq!(store.end(&id).unwrap().persona(), Persona::Barista);
        assert!(store.is_empty());
        assert!(store.end(&id).is_err());
    }

    #[test]
    fn test_record_wire_shape() {
        let record = Record::Tutor(TutorState::default());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"persona": "tutor", "state": {"mode": "learn", "topic": null}})
        );
    }
}
