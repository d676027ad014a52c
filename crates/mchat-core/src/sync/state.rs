//! Ingestion bookkeeping.

use std::collections::HashSet;
use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

/// Ids the engine has already ingested.
#[derive(Debug, Default, Clone)]
pub struct IngestState {
    known: HashSet<String>,
}

impl IngestState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `id` was already ingested.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.known.contains(id)
    }

    /// Marks `id` as ingested. Returns false if it was already known.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.known.insert(id.into())
    }

    /// Number of known ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns true if nothing has been ingested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// Handle for registering ids of locally sent messages with the engine.
///
/// The engine adopts registered ids at the start of its next cycle.
#[derive(Debug, Clone)]
pub struct LocalIds(mpsc::UnboundedSender<String>);

impl LocalIds {
    /// Wraps a sender. Engines hand out theirs through
    /// [`SyncEngine::local_ids`](super::SyncEngine::local_ids).
    #[must_use]
    pub const fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self(sender)
    }

    /// Registers the id of a message this process sent.
    pub fn register(&self, id: impl Into<String>) {
        if self.0.send(id.into()).is_err() {
            debug!("Sync engine gone, local id dropped");
        }
    }
}

/// Outcome of one fetch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries in the listing.
    pub listed: usize,
    /// Messages ingested for the first time.
    pub new: usize,
    /// Messages already known.
    pub duplicates: usize,
    /// Retrievals that failed.
    pub failed: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} listed, {} new, {} duplicate, {} failed",
            self.listed, self.new, self.duplicates, self.failed
        )
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_novelty() {
        let mut state = IngestState::new();
        assert!(state.insert("a"));
        assert!(!state.insert("a"));
        assert!(state.contains("a"));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_register_after_engine_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        LocalIds::new(tx).register("lost");
    }

    #[test]
    fn test_report_display() {
        let report = CycleReport {
            listed: 3,
            new: 1,
            duplicates: 1,
            failed: 1,
        };
        assert_eq!(report.to_string(), "3 listed, 1 new, 1 duplicate, 1 failed");
    }
}
