//! Mode router module
//!
//! Decides, for each user turn, whether to switch mode or topic or to treat
//! the utterance as an answer, and selects the reply:
//! - voice: opaque identity from the mode table
//! - template: the script to speak
//! - mutation: what changed in the session, if anything

mod engine;
mod intent;
mod template;
mod voice;

pub use engine::{ModeRouter, RouteDecision, StateMutation};
pub use intent::{Intent, IntentClassifier, RuleClassifier};
pub use template::ScriptTemplate;
pub use voice::VoiceTable;
