//! persona-daemon: session state and mode routing for voice personas
//!
//! Two personas share one daemon:
//! - Barista: fills a drink order field by field
//! - Tutor: moves between learn, quiz and teach_back over static content
//!
//! Speech recognition and synthesis live elsewhere. This crate tracks each
//! session's state, decides what the persona says next and which voice says it.

pub mod archive;
pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod ipc;
pub mod lifecycle;
pub mod router;
pub mod session;
