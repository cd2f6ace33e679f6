//! Upload session orchestration.
//!
//! An [`UploadSession`] sits between a transport and a presentation layer:
//!
//! ```text
//!  Transport ──add/progress/fail/done (per batch)──► UploadSession
//!      ▲                                                │  │
//!      └──────────── submit / abort (per file) ─────────┘  │
//!                                                          ▼
//!                   fileadd / fileprogress / filefailed / filedone /
//!                   filecanceled (per file) + changed (registry)
//! ```
//!
//! Transport callbacks are resolved through a batch table built when the
//! batch was added. Each resolved file is then checked against the callback's
//! attempt and its own state before anything is applied, so callbacks for
//! removed files, earlier attempts, canceled or finished files are dropped.

use crate::config::SessionConfig;
use crate::error::{Result, UploadError};
use crate::event::{Event, EventBus, SubscriptionId};
use crate::failure::{BatchResult, RawTransportError, extract_failure_message};
use crate::file::{File, FileAction, FileEvent, FileEventKind, FileSnapshot, TransportHandle};
use crate::id::{BatchId, FileId, IdGenerator};
use crate::progress::Progress;
use crate::registry::{FileRegistry, RegistryEvent};
use crate::transport::{
    RawFileDescriptor, Transport, TransportEvent, TransportRequest, UploadResult,
};
use std::collections::HashMap;
use std::fmt;

/// Domain event published by a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// `fileadd(file)`
    FileAdded(FileSnapshot),
    /// `fileprogress(file, progress)`
    FileProgress(FileSnapshot, Progress),
    /// `filefailed(file, message)`
    FileFailed(FileSnapshot, String),
    /// `filedone(file, result)`
    FileDone(FileSnapshot, UploadResult),
    /// `filecanceled(file)`
    FileCanceled(FileSnapshot),
}

impl SessionEvent {
    /// File the event is about
    #[must_use]
    pub fn file(&self) -> &FileSnapshot {
        match self {
            SessionEvent::FileAdded(file)
            | SessionEvent::FileProgress(file, _)
            | SessionEvent::FileFailed(file, _)
            | SessionEvent::FileDone(file, _)
            | SessionEvent::FileCanceled(file) => file,
        }
    }
}

/// Kinds of [`SessionEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    /// `fileadd`
    FileAdd,
    /// `fileprogress`
    FileProgress,
    /// `filefailed`
    FileFailed,
    /// `filedone`
    FileDone,
    /// `filecanceled`
    FileCanceled,
}

impl SessionEventKind {
    /// Every kind, in lifecycle order
    pub const ALL: [SessionEventKind; 5] = [
        SessionEventKind::FileAdd,
        SessionEventKind::FileProgress,
        SessionEventKind::FileFailed,
        SessionEventKind::FileDone,
        SessionEventKind::FileCanceled,
    ];

    /// Event name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionEventKind::FileAdd => "fileadd",
            SessionEventKind::FileProgress => "fileprogress",
            SessionEventKind::FileFailed => "filefailed",
            SessionEventKind::FileDone => "filedone",
            SessionEventKind::FileCanceled => "filecanceled",
        }
    }
}

impl fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event for SessionEvent {
    type Kind = SessionEventKind;

    fn kind(&self) -> SessionEventKind {
        match self {
            SessionEvent::FileAdded(_) => SessionEventKind::FileAdd,
            SessionEvent::FileProgress(..) => SessionEventKind::FileProgress,
            SessionEvent::FileFailed(..) => SessionEventKind::FileFailed,
            SessionEvent::FileDone(..) => SessionEventKind::FileDone,
            SessionEvent::FileCanceled(_) => SessionEventKind::FileCanceled,
        }
    }
}

/// Look up the file a transport callback targets, if it still applies
fn current_attempt(
    registry: &mut FileRegistry,
    id: FileId,
    request: TransportRequest,
) -> Option<&mut File> {
    match registry.get_mut(id) {
        Ok(file) if file.matches(request) => Some(file),
        Ok(file) => {
            tracing::debug!(
                %id,
                attempt = request.attempt,
                current = file.handle().attempt(),
                "Discarding callback for superseded attempt"
            );
            None
        }
        Err(err) => {
            tracing::debug!(error = %err, "Discarding callback for removed file");
            None
        }
    }
}

/// Orchestrates the files of one upload session
///
/// Owns the id generator, the registry and the transport. All methods run
/// to completion synchronously; callers feed transport callbacks and user
/// actions in whatever order they occur.
pub struct UploadSession<T: Transport> {
    config: SessionConfig,
    ids: IdGenerator,
    registry: FileRegistry,
    batches: HashMap<BatchId, Vec<FileId>>,
    last_attempt: HashMap<BatchId, u32>,
    transport: T,
    events: EventBus<SessionEvent>,
}

impl<T: Transport> UploadSession<T> {
    /// Create a session
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SessionConfig, transport: T, ids: IdGenerator) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            endpoint = %config.endpoint,
            auto_upload = config.auto_upload,
            response_format = %config.response_format,
            "Upload session created"
        );
        Ok(Self {
            config,
            ids,
            registry: FileRegistry::new(),
            batches: HashMap::new(),
            last_attempt: HashMap::new(),
            transport,
            events: EventBus::new(),
        })
    }

    /// Create a session with default configuration and ids starting at 0
    #[must_use]
    pub fn with_defaults(transport: T) -> Self {
        Self {
            config: SessionConfig::default(),
            ids: IdGenerator::new(),
            registry: FileRegistry::new(),
            batches: HashMap::new(),
            last_attempt: HashMap::new(),
            transport,
            events: EventBus::new(),
        }
    }

    // ============ Transport callbacks ============

    /// Register the files of a new transport batch
    ///
    /// Each well-formed descriptor becomes a pending file and a `fileadd`
    /// event. Malformed descriptors are logged and skipped. A batch id that
    /// was already added is ignored. With `auto_upload` set, the new files
    /// are started right after being announced.
    ///
    /// Returns the ids of the files created.
    pub fn add_files_from_transport_batch<I>(&mut self, batch: BatchId, descriptors: I) -> Vec<FileId>
    where
        I: IntoIterator<Item = RawFileDescriptor>,
    {
        if self.batches.contains_key(&batch) {
            tracing::warn!(error = %UploadError::DuplicateBatch(batch), "Ignoring add event");
            return Vec::new();
        }

        let mut accepted = Vec::new();
        for (position, descriptor) in descriptors.into_iter().enumerate() {
            let metadata = match descriptor.into_metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::warn!(%batch, position, error = %err, "Dropping file descriptor");
                    continue;
                }
            };

            let id = self.ids.next_id();
            let file = File::new(id, metadata, TransportHandle::new(batch, accepted.len()));
            let snapshot = file.snapshot();
            if let Err(err) = self.registry.add(file) {
                tracing::error!(%batch, error = %err, "Id generator produced a duplicate");
                continue;
            }
            accepted.push(id);

            tracing::debug!(
                %id,
                %batch,
                name = %snapshot.metadata.name,
                size = snapshot.metadata.size,
                "File added"
            );
            self.events.publish(&SessionEvent::FileAdded(snapshot));
        }
        self.batches.insert(batch, accepted.clone());

        if self.config.auto_upload {
            for &id in &accepted {
                if let Err(err) = self.request_start(id) {
                    tracing::warn!(%id, error = %err, "Auto upload failed to start");
                }
            }
        }
        accepted
    }

    fn resolve(&self, request: TransportRequest) -> Vec<FileId> {
        match self.batches.get(&request.batch) {
            Some(ids) => ids.clone(),
            None => {
                tracing::debug!(batch = %request.batch, "Callback for unknown batch");
                Vec::new()
            }
        }
    }

    /// Apply transport progress to every file of the request's batch
    pub fn on_transport_progress(
        &mut self,
        request: impl Into<TransportRequest>,
        loaded: u64,
        total: u64,
    ) {
        let request = request.into();
        let progress = Progress::new(loaded, total);

        for id in self.resolve(request) {
            let Some(file) = current_attempt(&mut self.registry, id, request) else {
                continue;
            };
            match file.receive_progress(progress) {
                Ok(()) => {
                    let snapshot = file.snapshot();
                    self.events
                        .publish(&SessionEvent::FileProgress(snapshot, progress));
                }
                Err(err) => tracing::debug!(error = %err, "Discarding progress"),
            }
        }
    }

    /// Apply a transport failure to every file of the request's batch
    ///
    /// Each file gets its own message, picked by
    /// [`extract_failure_message`] using the file's position in the batch.
    pub fn on_transport_failure(
        &mut self,
        request: impl Into<TransportRequest>,
        error: Option<RawTransportError>,
        result: Option<BatchResult>,
    ) {
        let request = request.into();

        for id in self.resolve(request) {
            let Some(file) = current_attempt(&mut self.registry, id, request) else {
                continue;
            };
            let message =
                extract_failure_message(error.as_ref(), result.as_ref(), file.handle().index());
            match file.receive_failure(message.clone()) {
                Ok(()) => {
                    tracing::warn!(%id, %message, "Upload failed");
                    let snapshot = file.snapshot();
                    self.events
                        .publish(&SessionEvent::FileFailed(snapshot, message));
                }
                Err(err) => tracing::debug!(error = %err, "Discarding failure"),
            }
        }
    }

    /// Apply a transport completion to every file of the request's batch
    pub fn on_transport_done(&mut self, request: impl Into<TransportRequest>, result: UploadResult) {
        let request = request.into();

        for id in self.resolve(request) {
            let Some(file) = current_attempt(&mut self.registry, id, request) else {
                continue;
            };
            match file.receive_success(result.clone()) {
                Ok(()) => {
                    tracing::info!(%id, name = %file.metadata().name, "Upload complete");
                    let snapshot = file.snapshot();
                    self.events
                        .publish(&SessionEvent::FileDone(snapshot, result.clone()));
                }
                Err(err) => tracing::debug!(error = %err, "Discarding completion"),
            }
        }
    }

    /// Dispatch a transport event to the matching callback
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Add { batch, descriptors } => {
                self.add_files_from_transport_batch(batch, descriptors);
            }
            TransportEvent::Progress {
                request,
                loaded,
                total,
            } => self.on_transport_progress(request, loaded, total),
            TransportEvent::Fail {
                request,
                error,
                result,
            } => self.on_transport_failure(request, error, result),
            TransportEvent::Done { request, result } => self.on_transport_done(request, result),
        }
    }

    // ============ User actions ============

    /// Start or retry a file
    ///
    /// Starting a running or finished file does nothing. A retry gets the
    /// next attempt number of its batch, so callbacks for one file's retry
    /// never reach another file of the same batch. If the transport refuses
    /// the submission, the file fails and `filefailed` is published.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotFound`] for an unknown id.
    pub fn request_start(&mut self, id: FileId) -> Result<()> {
        let file = self.registry.get_mut(id)?;
        let started = if file.is_error() {
            // Attempts are numbered per batch so every retry is a distinct request
            let last = self.last_attempt.entry(file.handle().batch()).or_insert(0);
            *last += 1;
            file.start_attempt(&mut self.transport, *last)
        } else {
            file.start(&mut self.transport)
        };
        match started {
            Ok(()) => {
                tracing::info!(%id, attempt = file.handle().attempt(), "Upload started");
                if let Some(message) = file.error_message().map(str::to_string) {
                    tracing::warn!(%id, %message, "Transport refused upload");
                    let snapshot = file.snapshot();
                    self.events
                        .publish(&SessionEvent::FileFailed(snapshot, message));
                }
                Ok(())
            }
            Err(err) if err.is_silent() => {
                tracing::debug!(error = %err, "Ignoring start request");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Cancel a pending or running file and remove it
    ///
    /// Publishes `filecanceled`, then the registry's `changed`. Canceling a
    /// file in any other state does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotFound`] for an unknown id.
    pub fn request_cancel(&mut self, id: FileId) -> Result<()> {
        let file = self.registry.get_mut(id)?;
        if let Err(err) = file.cancel(&mut self.transport) {
            tracing::debug!(error = %err, "Ignoring cancel request");
            return if err.is_silent() { Ok(()) } else { Err(err) };
        }

        tracing::info!(%id, "Upload canceled");
        let snapshot = file.snapshot();
        self.events.publish(&SessionEvent::FileCanceled(snapshot));
        self.registry.remove(id);
        Ok(())
    }

    /// Remove a finished, failed or canceled file
    ///
    /// The transport is not contacted. Clearing a pending or running file
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotFound`] for an unknown id.
    pub fn request_clear(&mut self, id: FileId) -> Result<()> {
        let state = self.registry.get(id)?.state();
        if !state.is_clearable() {
            let err = UploadError::InvalidTransition {
                id,
                state,
                action: FileAction::Clear,
            };
            tracing::debug!(error = %err, "Ignoring clear request");
            return Ok(());
        }

        self.registry.remove(id);
        tracing::debug!(%id, %state, "File cleared");
        Ok(())
    }

    /// Start every pending or failed file
    ///
    /// Returns the number of files that were submitted.
    pub fn start_all(&mut self) -> usize {
        let mut started = 0;
        for id in self.registry.ids() {
            let eligible = self
                .registry
                .get(id)
                .is_ok_and(|f| f.is_pending() || f.is_error());
            if eligible && self.request_start(id).is_ok() {
                started += 1;
            }
        }
        started
    }

    /// Cancel every pending or running file
    ///
    /// Returns the number of files canceled.
    pub fn cancel_all(&mut self) -> usize {
        let mut canceled = 0;
        for id in self.registry.ids() {
            let active = self.registry.get(id).is_ok_and(|f| f.state().is_active());
            if active && self.request_cancel(id).is_ok() {
                canceled += 1;
            }
        }
        canceled
    }

    // ============ Subscriptions ============

    /// Subscribe to a domain event
    pub fn subscribe<F>(&mut self, kind: SessionEventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    /// Remove a subscription made with [`subscribe`](Self::subscribe)
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Subscribe to registry membership changes
    pub fn subscribe_changed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&RegistryEvent) + Send + 'static,
    {
        self.registry.subscribe_changed(handler)
    }

    /// Remove a subscription made with [`subscribe_changed`](Self::subscribe_changed)
    pub fn unsubscribe_changed(&mut self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Subscribe to the entity events of one file
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotFound`] for an unknown id.
    pub fn subscribe_file<F>(
        &mut self,
        id: FileId,
        kind: FileEventKind,
        handler: F,
    ) -> Result<SubscriptionId>
    where
        F: FnMut(&FileEvent) + Send + 'static,
    {
        Ok(self.registry.get_mut(id)?.subscribe(kind, handler))
    }

    // ============ Accessors ============

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Look up a file
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotFound`] for an unknown id.
    pub fn file(&self, id: FileId) -> Result<&File> {
        self.registry.get(id)
    }

    /// Files in creation order
    #[must_use]
    pub fn files(&self) -> &[File] {
        self.registry.all()
    }

    /// Snapshots of all files in creation order
    #[must_use]
    pub fn snapshot(&self) -> Vec<FileSnapshot> {
        self.registry.snapshot()
    }

    /// Number of files in the session
    #[must_use]
    pub fn count(&self) -> usize {
        self.registry.count()
    }

    /// Check if the session holds no files
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Ids created from `batch`, in batch order
    #[must_use]
    pub fn batch_files(&self, batch: BatchId) -> Option<&[FileId]> {
        self.batches.get(&batch).map(Vec::as_slice)
    }

    /// The transport
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> fmt::Debug for UploadSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSession")
            .field("config", &self.config)
            .field("next_id", &self.ids.peek())
            .field("files", &self.registry.count())
            .field("batches", &self.batches.len())
            .finish_non_exhaustive()
    }
}
