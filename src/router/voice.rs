//! Mode table: which external voice speaks for each mode

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::{Record, TutorMode};

/// Voice identities, passed through to speech synthesis as opaque names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceTable {
    pub learn: String,
    pub quiz: String,
    pub teach_back: String,
    pub barista: String,
}

impl Default for VoiceTable {
    fn default() -> Self {
        Self {
            learn: "Matthew".to_string(),
            quiz: "Alicia".to_string(),
            teach_back: "Ken".to_string(),
            barista: "Natalie".to_string(),
        }
    }
}

impl VoiceTable {
    /// Load a table from JSON. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read voice table {}", path.display()))?;
        serde_json::from_str(&json).context("failed to parse voice table")
    }

    pub fn for_mode(&self, mode: TutorMode) -> &str {
        match mode {
            TutorMode::Learn => &self.learn,
            TutorMode::Quiz => &self.quiz,
            TutorMode::TeachBack => &self.teach_back,
        }
    }

    /// Voice for whatever state the session is in
    pub fn for_record(&self, record: &Record) -> &str {
        match record {
            Record::Barista(_) => &self.barista,
            Record::Tutor(state) => self.for_mode(state.mode),
        }
    }
}
