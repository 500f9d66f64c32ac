//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::content::ContentLibrary;
use crate::router::VoiceTable;

/// Overrides the content file location
pub const CONTENT_FILE_VAR: &str = "PERSONA_CONTENT_FILE";
/// Points at a JSON mode table
pub const VOICES_FILE_VAR: &str = "PERSONA_VOICES_FILE";
/// Overrides the IPC socket location
pub const SOCKET_VAR: &str = "PERSONA_SOCKET";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Tutor content file; `None` uses the bundled content
    pub content_path: Option<PathBuf>,

    /// Voice identity per mode
    pub voices: VoiceTable,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    fn from_env(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = var("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("persona-daemon");

        let socket_path = var(SOCKET_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let content_path = match var(CONTENT_FILE_VAR) {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let default = data_dir.join("tutor_content.json");
                default.exists().then_some(default)
            }
        };

        let voices = match var(VOICES_FILE_VAR) {
            Some(path) => VoiceTable::load(&PathBuf::from(path))?,
            None => VoiceTable::default(),
        };

        Ok(Self {
            socket_path,
            data_dir,
            content_path,
            voices,
        })
    }

    /// Where completed orders are archived
    pub fn orders_dir(&self) -> PathBuf {
        self.data_dir.join("orders")
    }

    /// Ensure data directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.orders_dir())?;
        Ok(())
    }

    /// Load the tutor content once for the life of the process
    pub fn load_content(&self) -> Result<ContentLibrary> {
        let library = match &self.content_path {
            Some(path) => ContentLibrary::load(path)?,
            None => ContentLibrary::bundled()?,
        };
        Ok(library)
    }
}
