//! Session state module
//!
//! One record per active session:
//! - Barista: an order record filled field by field
//! - Tutor: the current mode (learn, quiz, teach_back) and topic

mod order;
mod store;
mod tutor;

pub use order::{parse_extras, FieldValue, OrderField, OrderRecord};
pub use store::{Persona, Record, Session, SessionId, SessionStore};
pub use tutor::{TutorMode, TutorState};
