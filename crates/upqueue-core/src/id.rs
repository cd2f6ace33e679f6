//! Identifiers for files and transport batches.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-unique file identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(u64);

impl FileId {
    /// Wrap a raw id
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-level request identifier
///
/// Assigned by the transport. One batch may carry several files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(u64);

impl BatchId {
    /// Wrap a raw batch id
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw batch id value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// Monotonic file id allocator
///
/// Owned by exactly one session. Ids are never reused, even after the file
/// they were given to has been removed.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    /// Create a generator whose first id is `0`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator whose first id is `first`
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Allocate the next id
    pub fn next_id(&mut self) -> FileId {
        let id = FileId(self.next);
        self.next += 1;
        id
    }

    /// Id the next call to [`next_id`](Self::next_id) will return
    #[must_use]
    pub fn peek(&self) -> FileId {
        FileId(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.next_id(), FileId::new(0));
        assert_eq!(ids.next_id(), FileId::new(1));
        assert_eq!(ids.peek(), FileId::new(2));
        assert_eq!(ids.next_id(), FileId::new(2));
    }

    #[test]
    fn test_starting_at() {
        let mut ids = IdGenerator::starting_at(100);
        assert_eq!(ids.next_id().get(), 100);
        assert_eq!(ids.next_id().get(), 101);
    }

    #[test]
    fn test_display() {
        assert_eq!(FileId::new(12).to_string(), "12");
        assert_eq!(BatchId::new(3).to_string(), "batch-3");
    }
}
