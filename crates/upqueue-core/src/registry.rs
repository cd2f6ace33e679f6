//! Ordered, id-keyed collection of files.

use crate::error::{Result, UploadError};
use crate::event::{Event, EventBus, SubscriptionId};
use crate::file::{File, FileSnapshot};
use crate::id::FileId;

/// Collection-scoped event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    /// Membership changed; carries the new file count
    Changed {
        /// Files registered after the change
        count: usize,
    },
}

/// Kinds of [`RegistryEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryEventKind {
    /// `changed`
    Changed,
}

impl Event for RegistryEvent {
    type Kind = RegistryEventKind;

    fn kind(&self) -> RegistryEventKind {
        match self {
            RegistryEvent::Changed { .. } => RegistryEventKind::Changed,
        }
    }
}

/// Files in creation order
///
/// Structural only: the registry adds and removes files but never changes
/// their state. Lookup is a linear scan.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: Vec<File>,
    events: EventBus<RegistryEvent>,
}

impl FileRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: FileId) -> Option<usize> {
        self.files.iter().position(|f| f.id() == id)
    }

    fn notify(&mut self) {
        let count = self.files.len();
        self.events.publish(&RegistryEvent::Changed { count });
    }

    /// Append a file
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::DuplicateId`] if a file with the same id is
    /// already registered.
    pub fn add(&mut self, file: File) -> Result<()> {
        if self.contains(file.id()) {
            return Err(UploadError::DuplicateId(file.id()));
        }
        self.files.push(file);
        self.notify();
        Ok(())
    }

    /// Remove a file, keeping the order of the rest
    pub fn remove(&mut self, id: FileId) -> Option<File> {
        let index = self.position(id)?;
        let file = self.files.remove(index);
        self.notify();
        Some(file)
    }

    /// Look up a file
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotFound`] if no such file is registered.
    pub fn get(&self, id: FileId) -> Result<&File> {
        self.files
            .iter()
            .find(|f| f.id() == id)
            .ok_or(UploadError::NotFound(id))
    }

    /// Look up a file for a state transition
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotFound`] if no such file is registered.
    pub fn get_mut(&mut self, id: FileId) -> Result<&mut File> {
        self.files
            .iter_mut()
            .find(|f| f.id() == id)
            .ok_or(UploadError::NotFound(id))
    }

    /// Check if a file is registered
    #[must_use]
    pub fn contains(&self, id: FileId) -> bool {
        self.position(id).is_some()
    }

    /// All files in creation order
    #[must_use]
    pub fn all(&self) -> &[File] {
        &self.files
    }

    /// Ids of all files in creation order
    #[must_use]
    pub fn ids(&self) -> Vec<FileId> {
        self.files.iter().map(File::id).collect()
    }

    /// Snapshots of all files in creation order
    #[must_use]
    pub fn snapshot(&self) -> Vec<FileSnapshot> {
        self.files.iter().map(File::snapshot).collect()
    }

    /// Number of registered files
    #[must_use]
    pub fn count(&self) -> usize {
        self.files.len()
    }

    /// Check if no files are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Subscribe to membership changes
    pub fn subscribe_changed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&RegistryEvent) + Send + 'static,
    {
        self.events.subscribe(RegistryEventKind::Changed, handler)
    }

    /// Remove a subscription made with [`subscribe_changed`](Self::subscribe_changed)
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileMetadata, TransportHandle};
    use crate::id::BatchId;
    use std::sync::{Arc, Mutex};

    fn file(id: u64) -> File {
        File::new(
            FileId::new(id),
            FileMetadata {
                name: format!("file-{id}.bin"),
                size: 10,
                content_type: None,
            },
            TransportHandle::new(BatchId::new(id), 0),
        )
    }

    #[test]
    fn test_add_and_get() {
        let mut registry = FileRegistry::new();
        registry.add(file(0)).unwrap();
        registry.add(file(1)).unwrap();

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.get(FileId::new(1)).unwrap().id(), FileId::new(1));
        assert_eq!(
            registry.get(FileId::new(9)).unwrap_err(),
            UploadError::NotFound(FileId::new(9))
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = FileRegistry::new();
        registry.add(file(3)).unwrap();
        assert_eq!(
            registry.add(file(3)),
            Err(UploadError::DuplicateId(FileId::new(3)))
        );
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_removal_keeps_order() {
        let mut registry = FileRegistry::new();
        for id in 0..4 {
            registry.add(file(id)).unwrap();
        }
        assert!(registry.remove(FileId::new(1)).is_some());
        assert!(registry.remove(FileId::new(1)).is_none());

        assert_eq!(
            registry.ids(),
            vec![FileId::new(0), FileId::new(2), FileId::new(3)]
        );
    }

    #[test]
    fn test_all_is_restartable() {
        let mut registry = FileRegistry::new();
        registry.add(file(0)).unwrap();
        registry.add(file(1)).unwrap();

        let all = registry.all();
        let first: Vec<_> = all.iter().map(File::id).collect();
        let second: Vec<_> = all.iter().map(File::id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_changed_notifications() {
        let counts = Arc::new(Mutex::new(Vec::new()));
        let mut registry = FileRegistry::new();
        let sink = Arc::clone(&counts);
        registry.subscribe_changed(move |event: &RegistryEvent| {
            let RegistryEvent::Changed { count } = *event;
            sink.lock().unwrap().push(count);
        });

        registry.add(file(0)).unwrap();
        registry.add(file(1)).unwrap();
        let _ = registry.add(file(1));
        registry.remove(FileId::new(0));
        registry.remove(FileId::new(42));

        assert_eq!(*counts.lock().unwrap(), vec![1, 2, 1]);
    }
}
