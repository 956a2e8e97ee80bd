//! Search index update queue.

use std::sync::Mutex;

/// Kind of indexed object for wiki pages.
pub const WIKI_PAGE: &str = "w";

/// Receives objects that need reindexing. Processing is up to the host.
pub trait SearchQueue: Send + Sync {
    fn enqueue(&self, kind: &str, id: &str);
}

/// Drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSearchQueue;

impl SearchQueue for NullSearchQueue {
    fn enqueue(&self, _kind: &str, _id: &str) {}
}

/// Keeps queued updates in memory until drained.
#[derive(Debug, Default)]
pub struct MemorySearchQueue {
    queued: Mutex<Vec<(String, String)>>,
}

impl MemorySearchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all queued `(kind, id)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn drain(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.queued.lock().unwrap())
    }
}

impl SearchQueue for MemorySearchQueue {
    fn enqueue(&self, kind: &str, id: &str) {
        tracing::debug!(kind, id, "Queued search update");
        self.queued.lock().unwrap().push((kind.to_owned(), id.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_drain_empties_queue() {
        let queue = MemorySearchQueue::new();
        queue.enqueue(WIKI_PAGE, "Startseite");
        assert_eq!(queue.drain(), vec![("w".to_owned(), "Startseite".to_owned())]);
        assert!(queue.drain().is_empty());
    }
}
