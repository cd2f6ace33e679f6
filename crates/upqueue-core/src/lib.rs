//! # upqueue core
//!
//! Upload session orchestration for batches of user-selected files.
//!
//! This crate provides:
//! - The per-file upload state machine ([`File`])
//! - An ordered, id-keyed file registry ([`FileRegistry`])
//! - A synchronous multi-subscriber event bus ([`EventBus`])
//! - Failure message extraction from loosely shaped transport errors
//! - The session orchestrator that turns per-request transport callbacks
//!   into per-file domain events ([`UploadSession`])
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        UploadSession                             │
//! │   (ids, batch table, race checks, domain event stream)           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                        FileRegistry                              │
//! │   (ordered files keyed by id, membership notifications)          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                           File                                   │
//! │   (pending → running → done | error, canceled)                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                    ▲ submit / abort        │ add / progress / fail / done
//!                    └────────── Transport ◄─┘
//! ```
//!
//! Everything runs on the caller's thread. Transport callbacks and user
//! actions may arrive in any order; the session checks the target file's
//! state and attempt before applying any transport-originated change.
//!
//! ## Example
//!
//! ```
//! use upqueue_core::{BatchId, RawFileDescriptor, RecordingTransport, UploadSession};
//!
//! let mut session = UploadSession::with_defaults(RecordingTransport::new());
//! let batch = BatchId::new(0);
//! let ids = session.add_files_from_transport_batch(batch, [RawFileDescriptor::new("a.txt", 100)]);
//!
//! session.request_start(ids[0]).unwrap();
//! session.on_transport_progress(batch, 50, 100);
//! assert_eq!(session.file(ids[0]).unwrap().progress().unwrap().percent(), 50);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod event;
pub mod failure;
pub mod file;
pub mod id;
pub mod progress;
pub mod registry;
pub mod session;
pub mod transport;

pub use config::{ResponseFormat, SessionConfig};
pub use error::{Result, UploadError};
pub use event::{Event, EventBus, SubscriptionId};
pub use failure::{BatchResult, FileOutcome, RawTransportError, extract_failure_message};
pub use file::{
    File, FileAction, FileEvent, FileEventKind, FileMetadata, FileSnapshot, FileState,
    TransportHandle,
};
pub use id::{BatchId, FileId, IdGenerator};
pub use progress::{Progress, format_bytes};
pub use registry::{FileRegistry, RegistryEvent, RegistryEventKind};
pub use session::{SessionEvent, SessionEventKind, UploadSession};
pub use transport::{
    RawFileDescriptor, RecordingTransport, Transport, TransportCall, TransportEvent,
    TransportRequest, UploadResult,
};
