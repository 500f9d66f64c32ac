//! Tutor session mode and topic

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// The tutor's three behavioral states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TutorMode {
    /// Play back the topic summary
    #[default]
    Learn,
    /// Pose the topic's sample question
    Quiz,
    /// Listen to the learner explain the topic and give feedback
    TeachBack,
}

impl TutorMode {
    pub const ALL: [TutorMode; 3] = [TutorMode::Learn, TutorMode::Quiz, TutorMode::TeachBack];

    pub fn as_str(&self) -> &'static str {
        match self {
            TutorMode::Learn => "learn",
            TutorMode::Quiz => "quiz",
            TutorMode::TeachBack => "teach_back",
        }
    }
}

impl fmt::Display for TutorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TutorMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match normalized.as_str() {
            "learn" | "learning" => Ok(TutorMode::Learn),
            "quiz" => Ok(TutorMode::Quiz),
            "teachback" => Ok(TutorMode::TeachBack),
            _ => Err(SessionError::InvalidValue {
                field: "mode".into(),
                reason: format!("unknown mode {s:?}"),
            }),
        }
    }
}

/// Tutor-side field names accepted by the session store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorField {
    Mode,
    Topic,
}

impl FromStr for TutorField {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mode" => Ok(TutorField::Mode),
            "topic" => Ok(TutorField::Topic),
            other => Err(SessionError::InvalidField {
                field: other.to_string(),
            }),
        }
    }
}

/// Current mode plus the selected topic id.
///
/// The topic is an id into the content library; the session never owns the
/// content itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorState {
    pub mode: TutorMode,
    pub topic: Option<String>,
}
