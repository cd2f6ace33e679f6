//! File entity and its upload state machine.
//!
//! ```text
//!            start               success
//!   pending ───────► running ───────────► done
//!      │               │  ▲
//!      │        failure│  │start (retry, new attempt)
//!      │               ▼  │
//!      │              error
//!      │ cancel        │
//!      └───────────────┴──(from pending/running)──► canceled
//! ```
//!
//! Transport-originated transitions (`receive_*`) are checked against the
//! current state before anything changes, so callbacks that arrive after a
//! cancel or after completion are rejected without side effects.

use crate::error::{Result, UploadError};
use crate::event::{Event, EventBus, SubscriptionId};
use crate::id::{BatchId, FileId};
use crate::progress::Progress;
use crate::transport::{Transport, TransportRequest, UploadResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upload state of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// Selected, not yet submitted
    Pending,
    /// Submitted to the transport
    Running,
    /// Uploaded
    Done,
    /// Upload failed; may be retried
    Error,
    /// Canceled by the user
    Canceled,
}

impl FileState {
    /// Check if the transport may still be working on this file
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Check if the file may be cleared from the registry
    #[must_use]
    pub fn is_clearable(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Canceled)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Action applied to a file, named in transition errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// `start()`
    Start,
    /// `receive_progress()`
    Progress,
    /// `receive_failure()`
    Fail,
    /// `receive_success()`
    Succeed,
    /// `cancel()`
    Cancel,
    /// Registry clear
    Clear,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Progress => write!(f, "report progress for"),
            Self::Fail => write!(f, "fail"),
            Self::Succeed => write!(f, "complete"),
            Self::Cancel => write!(f, "cancel"),
            Self::Clear => write!(f, "clear"),
        }
    }
}

/// Descriptive attributes of a file, fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Transport-side identity of one upload attempt of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportHandle {
    batch: BatchId,
    index: usize,
    attempt: u32,
}

impl TransportHandle {
    /// First attempt for the file at `index` of `batch`
    #[must_use]
    pub const fn new(batch: BatchId, index: usize) -> Self {
        Self {
            batch,
            index,
            attempt: 0,
        }
    }

    /// Batch the file arrived in
    #[must_use]
    pub const fn batch(&self) -> BatchId {
        self.batch
    }

    /// Position of the file within its batch
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Attempt number, starting at 0
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Request key transport callbacks for this attempt carry
    #[must_use]
    pub const fn request(&self) -> TransportRequest {
        TransportRequest::new(self.batch, self.attempt)
    }

    /// Handle for another attempt of the same file
    #[must_use]
    pub const fn with_attempt(&self, attempt: u32) -> Self {
        Self { attempt, ..*self }
    }
}

/// Entity-scoped event published on a file's own bus
#[derive(Debug, Clone, PartialEq)]
pub enum FileEvent {
    /// Submitted to the transport
    Started,
    /// Progress reported
    Progress(Progress),
    /// Upload failed with a message
    Failed(String),
    /// Upload completed
    Done(UploadResult),
    /// Canceled by the user
    Canceled,
    /// Any of the above happened; carries the new state
    Changed(FileState),
}

/// Kinds of [`FileEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    /// `filestarted`
    Started,
    /// `fileprogress`
    Progress,
    /// `filefailed`
    Failed,
    /// `filedone`
    Done,
    /// `filecanceled`
    Canceled,
    /// `changed`
    Changed,
}

impl Event for FileEvent {
    type Kind = FileEventKind;

    fn kind(&self) -> FileEventKind {
        match self {
            FileEvent::Started => FileEventKind::Started,
            FileEvent::Progress(_) => FileEventKind::Progress,
            FileEvent::Failed(_) => FileEventKind::Failed,
            FileEvent::Done(_) => FileEventKind::Done,
            FileEvent::Canceled => FileEventKind::Canceled,
            FileEvent::Changed(_) => FileEventKind::Changed,
        }
    }
}

/// Point-in-time copy of a file, used as event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// File id
    pub id: FileId,
    /// Upload state
    pub state: FileState,
    /// Descriptive attributes
    pub metadata: FileMetadata,
    /// Progress while running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// Failure message while in error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One logical upload unit
#[derive(Debug)]
pub struct File {
    id: FileId,
    state: FileState,
    metadata: FileMetadata,
    progress: Option<Progress>,
    error_message: Option<String>,
    handle: TransportHandle,
    events: EventBus<FileEvent>,
}

impl File {
    /// Create a pending file
    #[must_use]
    pub fn new(id: FileId, metadata: FileMetadata, handle: TransportHandle) -> Self {
        Self {
            id,
            state: FileState::Pending,
            metadata,
            progress: None,
            error_message: None,
            handle,
            events: EventBus::new(),
        }
    }

    fn invalid(&self, action: FileAction) -> UploadError {
        UploadError::InvalidTransition {
            id: self.id,
            state: self.state,
            action,
        }
    }

    fn emit(&mut self, event: FileEvent) {
        self.events.publish(&event);
        self.events.publish(&FileEvent::Changed(self.state));
    }

    /// Submit the file to `transport`
    ///
    /// Allowed from `pending` and `error`. A retry from `error` uses the
    /// attempt after the current one; see
    /// [`start_attempt`](Self::start_attempt) when several files of a batch
    /// retry independently.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTransition`] from any other state.
    pub fn start<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        let retry = self.handle.attempt() + 1;
        self.start_attempt(transport, retry)
    }

    /// Submit the file to `transport`, numbering a retry `retry`
    ///
    /// A pending file keeps its first attempt and ignores `retry`. A file in
    /// `error` switches to a handle for attempt `retry` first. If the
    /// transport refuses the submission the file lands in `error` with the
    /// refusal as its message; this is not reported as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTransition`] unless the file is pending
    /// or in error. The file and transport are left untouched.
    pub fn start_attempt<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        retry: u32,
    ) -> Result<()> {
        let handle = match self.state {
            FileState::Pending => self.handle,
            FileState::Error => self.handle.with_attempt(retry),
            _ => return Err(self.invalid(FileAction::Start)),
        };

        let submitted = transport.submit(&handle);
        self.handle = handle;
        self.state = FileState::Running;
        self.error_message = None;
        self.progress = None;
        self.emit(FileEvent::Started);

        if let Err(err) = submitted {
            let message = match err {
                UploadError::Transport(message) => message,
                other => other.to_string(),
            };
            self.receive_failure(message)?;
        }
        Ok(())
    }

    /// Record transport progress
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTransition`] unless the file is running.
    pub fn receive_progress(&mut self, progress: Progress) -> Result<()> {
        if self.state != FileState::Running {
            return Err(self.invalid(FileAction::Progress));
        }
        self.progress = Some(progress);
        self.emit(FileEvent::Progress(progress));
        Ok(())
    }

    /// Record an upload failure
    ///
    /// Accepted while pending, running or already in error.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTransition`] once the file is done or
    /// canceled.
    pub fn receive_failure(&mut self, message: impl Into<String>) -> Result<()> {
        if matches!(self.state, FileState::Done | FileState::Canceled) {
            return Err(self.invalid(FileAction::Fail));
        }
        let message = message.into();
        self.state = FileState::Error;
        self.progress = None;
        self.error_message = Some(message.clone());
        self.emit(FileEvent::Failed(message));
        Ok(())
    }

    /// Record a completed upload
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTransition`] unless the file is running.
    pub fn receive_success(&mut self, result: UploadResult) -> Result<()> {
        if self.state != FileState::Running {
            return Err(self.invalid(FileAction::Succeed));
        }
        self.state = FileState::Done;
        self.progress = None;
        self.emit(FileEvent::Done(result));
        Ok(())
    }

    /// Abort the upload
    ///
    /// The state becomes `canceled` immediately; the transport abort is best
    /// effort.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidTransition`] unless the file is pending
    /// or running.
    pub fn cancel<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        if !self.state.is_active() {
            return Err(self.invalid(FileAction::Cancel));
        }
        transport.abort(&self.handle);
        self.state = FileState::Canceled;
        self.progress = None;
        self.emit(FileEvent::Canceled);
        Ok(())
    }

    /// Check if a transport callback for `request` targets the current attempt
    #[must_use]
    pub fn matches(&self, request: TransportRequest) -> bool {
        self.handle.request() == request
    }

    /// Subscribe to this file's events
    pub fn subscribe<F>(&mut self, kind: FileEventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&FileEvent) + Send + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    /// Remove a subscription made with [`subscribe`](Self::subscribe)
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// File id
    #[must_use]
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> FileState {
        self.state
    }

    /// Descriptive attributes
    #[must_use]
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Progress, present only while running
    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        self.progress
    }

    /// Failure message, present only in error
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Handle of the current attempt
    #[must_use]
    pub fn handle(&self) -> &TransportHandle {
        &self.handle
    }

    /// Check if waiting to be submitted
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == FileState::Pending
    }

    /// Check if uploading
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == FileState::Running
    }

    /// Check if uploaded
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == FileState::Done
    }

    /// Check if failed. Canceled files are not in error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.state == FileState::Error
    }

    /// Check if canceled
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.state == FileState::Canceled
    }

    /// Copy of the current state for event payloads
    #[must_use]
    pub fn snapshot(&self) -> FileSnapshot {
        FileSnapshot {
            id: self.id,
            state: self.state,
            metadata: self.metadata.clone(),
            progress: self.progress,
            error_message: self.error_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn pending_file() -> File {
        File::new(
            FileId::new(0),
            FileMetadata {
                name: "photo.jpg".to_string(),
                size: 100,
                content_type: Some("image/jpeg".to_string()),
            },
            TransportHandle::new(BatchId::new(0), 0),
        )
    }

    #[test]
    fn test_happy_path() {
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();
        assert!(file.is_pending());

        file.start(&mut transport).unwrap();
        assert!(file.is_running());
        assert_eq!(transport.submitted().len(), 1);

        file.receive_progress(Progress::new(50, 100)).unwrap();
        assert_eq!(file.progress(), Some(Progress::new(50, 100)));

        file.receive_success(json!({"url": "/files/photo.jpg"})).unwrap();
        assert!(file.is_done());
        assert_eq!(file.progress(), None);
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();

        file.start(&mut transport).unwrap();
        let second = file.start(&mut transport);
        assert!(matches!(
            second,
            Err(UploadError::InvalidTransition {
                action: FileAction::Start,
                state: FileState::Running,
                ..
            })
        ));
        assert_eq!(transport.submitted().len(), 1);
    }

    #[test]
    fn test_start_after_done_is_rejected() {
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();
        file.start(&mut transport).unwrap();
        file.receive_success(json!(null)).unwrap();

        assert!(file.start(&mut transport).is_err());
        assert!(file.is_done());
        assert_eq!(transport.submitted().len(), 1);
    }

    #[test]
    fn test_failure_clears_progress_and_retry_clears_message() {
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();
        file.start(&mut transport).unwrap();
        file.receive_progress(Progress::new(10, 100)).unwrap();

        file.receive_failure("network down").unwrap();
        assert!(file.is_error());
        assert_eq!(file.error_message(), Some("network down"));
        assert_eq!(file.progress(), None);

        file.start(&mut transport).unwrap();
        assert!(file.is_running());
        assert_eq!(file.error_message(), None);
        assert_eq!(file.handle().attempt(), 1);

        let submitted = transport.submitted();
        assert_eq!(submitted.len(), 2);
        assert_ne!(submitted[0], submitted[1]);
    }

    #[test]
    fn test_failure_from_pending() {
        let mut file = pending_file();
        file.receive_failure("rejected before upload").unwrap();
        assert!(file.is_error());
    }

    #[test]
    fn test_progress_outside_running_is_rejected() {
        let mut file = pending_file();
        assert!(file.receive_progress(Progress::new(1, 2)).is_err());
        assert!(file.receive_success(json!(null)).is_err());
        assert!(file.is_pending());
    }

    #[test]
    fn test_late_callbacks_after_cancel() {
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();
        file.start(&mut transport).unwrap();
        file.cancel(&mut transport).unwrap();
        assert!(file.is_canceled());
        assert_eq!(transport.aborted().len(), 1);

        assert!(file.receive_progress(Progress::new(90, 100)).is_err());
        assert!(file.receive_success(json!({})).is_err());
        assert!(file.receive_failure("late").is_err());
        assert!(file.start(&mut transport).is_err());
        assert!(file.is_canceled());
        assert_eq!(file.error_message(), None);
        assert_eq!(file.progress(), None);
    }

    #[test]
    fn test_cancel_done_file_is_rejected() {
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();
        file.start(&mut transport).unwrap();
        file.receive_success(json!(null)).unwrap();

        assert!(file.cancel(&mut transport).is_err());
        assert!(transport.aborted().is_empty());
    }

    #[test]
    fn test_submit_refusal_moves_to_error() {
        let mut transport = RecordingTransport::new();
        transport.refuse_submissions("offline");
        let mut file = pending_file();

        file.start(&mut transport).unwrap();
        assert!(file.is_error());
        assert_eq!(file.error_message(), Some("offline"));
    }

    #[test]
    fn test_entity_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();

        for kind in [
            FileEventKind::Started,
            FileEventKind::Progress,
            FileEventKind::Failed,
            FileEventKind::Changed,
        ] {
            let seen = Arc::clone(&seen);
            file.subscribe(kind, move |e| seen.lock().unwrap().push(e.clone()));
        }

        file.start(&mut transport).unwrap();
        file.receive_progress(Progress::new(5, 10)).unwrap();
        file.receive_failure("boom").unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                FileEvent::Started,
                FileEvent::Changed(FileState::Running),
                FileEvent::Progress(Progress::new(5, 10)),
                FileEvent::Changed(FileState::Running),
                FileEvent::Failed("boom".to_string()),
                FileEvent::Changed(FileState::Error),
            ]
        );
    }

    #[test]
    fn test_matches_current_attempt_only() {
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();
        let first = file.handle().request();
        file.start(&mut transport).unwrap();
        file.receive_failure("x").unwrap();
        file.start(&mut transport).unwrap();

        assert!(!file.matches(first));
        assert!(file.matches(file.handle().request()));
    }

    #[test]
    fn test_start_attempt_numbers_retry() {
        let mut transport = RecordingTransport::new();
        let mut file = pending_file();

        // Pending files keep their first attempt
        file.start_attempt(&mut transport, 5).unwrap();
        assert_eq!(file.handle().attempt(), 0);

        file.receive_failure("x").unwrap();
        file.start_attempt(&mut transport, 3).unwrap();
        assert_eq!(file.handle().attempt(), 3);
        assert_eq!(file.handle().index(), 0);
        assert!(matches!(
            file.start_attempt(&mut transport, 4),
            Err(UploadError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_snapshot_serializes_state_lowercase() {
        let file = pending_file();
        let value = serde_json::to_value(file.snapshot()).unwrap();
        assert_eq!(value["state"], "pending");
        assert_eq!(value["metadata"]["name"], "photo.jpg");
        assert!(value.get("progress").is_none());
    }
}
