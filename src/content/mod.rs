//! Tutor content library
//!
//! The content file is loaded once at start into an immutable map keyed by
//! item id. There is no mutation path after construction; the library is
//! shared behind an `Arc` and sessions only hold topic ids into it.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ContentError, SessionError, SessionResult};

/// Content shipped with the daemon, used when no content file is configured
const BUNDLED_CONTENT: &str = include_str!("../../content/tutor_content.json");

/// One topic's learning material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub sample_question: String,
}

/// Immutable, id-keyed set of content items
#[derive(Debug)]
pub struct ContentLibrary {
    items: HashMap<String, ContentItem>,
    /// Ids in file order, for stable listings
    order: Vec<String>,
}

impl ContentLibrary {
    /// Build a library, validating id uniqueness and required text
    pub fn from_items(items: Vec<ContentItem>) -> Result<Self, ContentError> {
        let mut map = HashMap::with_capacity(items.len());
        let mut order = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            if item.id.trim().is_empty() {
                return Err(ContentError::EmptyId(index));
            }
            if item.summary.trim().is_empty() {
                return Err(ContentError::EmptySummary(item.id));
            }
            if item.sample_question.trim().is_empty() {
                return Err(ContentError::EmptyQuestion(item.id));
            }
            if map.contains_key(&item.id) {
                return Err(ContentError::DuplicateId(item.id));
            }
            order.push(item.id.clone());
            map.insert(item.id.clone(), item);
        }

        Ok(Self { items: map, order })
    }

    /// Parse a JSON array of content items
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let items: Vec<ContentItem> = serde_json::from_str(json)?;
        Self::from_items(items)
    }

    /// Load the content file at `path`
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let json = std::fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_owned(),
            source,
        })?;
        let library = Self::from_json(&json)?;
        info!(?path, items = library.len(), "content loaded");
        Ok(library)
    }

    /// The content bundled into the binary
    pub fn bundled() -> Result<Self, ContentError> {
        let library = Self::from_json(BUNDLED_CONTENT)?;
        info!(items = library.len(), "bundled content loaded");
        Ok(library)
    }

    /// Look up an item by id
    pub fn get(&self, id: &str) -> SessionResult<&ContentItem> {
        self.items
            .get(id)
            .ok_or_else(|| SessionError::topic_not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Resolve a spoken topic name to an item.
    ///
    /// Tries an exact id or title match first (case-insensitive), then any item
    /// whose id or title appears inside the phrase.
    pub fn find(&self, phrase: &str) -> Option<&ContentItem> {
        let wanted = phrase.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        let exact = self.iter().find(|item| {
            item.id.to_lowercase() == wanted || item.title.to_lowercase() == wanted
        });
        if exact.is_some() {
            return exact;
        }

        let found = self.iter().find(|item| {
            wanted.contains(&item.id.to_lowercase()) || wanted.contains(&item.title.to_lowercase())
        });
        debug!(phrase, found = ?found.map(|i| &i.id), "topic lookup");
        found
    }

    /// Items in file order
    pub fn iter(&self) -> impl Iterator<Item = &ContentItem> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn titles(&self) -> Vec<String> {
        self.iter().map(|item| item.title.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
