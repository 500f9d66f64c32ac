//! Completed order archive
//!
//! Each completed order is written once as pretty JSON to
//! `<dir>/<session_id>.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::session::{OrderRecord, SessionId};

/// What lands on disk for one order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedOrder {
    pub session_id: SessionId,
    pub completed_at: DateTime<Utc>,
    pub order: OrderRecord,
}

/// Writes completed orders to a directory
#[derive(Debug, Clone)]
pub struct OrderArchive {
    dir: PathBuf,
}

impl OrderArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the order, returning the file path
    pub fn save(&self, session_id: SessionId, order: &OrderRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).context("failed to create orders directory")?;

        let entry = ArchivedOrder {
            session_id,
            completed_at: Utc::now(),
            order: order.clone(),
        };
        let path = self.dir.join(format!("{session_id}.json"));
        let json = serde_json::to_string_pretty(&entry)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write order file {}", path.display()))?;

        info!(session_id = %session_id, ?path, "order archived");
        Ok(path)
    }

    /// Read an archived order back
    pub fn load(&self, session_id: SessionId) -> Result<ArchivedOrder> {
        let path = self.dir.join(format!("{session_id}.json"));
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read order file {}", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OrderField;
    use uuid::Uuid;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let archive = OrderArchive::new(dir.path().join("orders"));

        let mut order = OrderRecord::new();
        order.set(OrderField::DrinkType, "flat white".into()).unwrap();
        order.set(OrderField::Name, "Kim".into()).unwrap();

        let id = Uuid::new_v4();
        let path = tokio_test::assert_ok!(archive.save(id, &order));
        assert!(path.ends_with(format!("{id}.json")));

        let loaded = tokio_test::assert_ok!(archive.load(id));
        assert_eq!(loaded.session_id, id);
        assert_eq!(loaded.order.drink_type, "flat white");
        assert_eq!(loaded.order.name, "Kim");
    }

    #[test]
    fn test_load_missing_order_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = OrderArchive::new(dir.path());
        tokio_test::assert_err!(archive.load(Uuid::new_v4()));
    }
}
