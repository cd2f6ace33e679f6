//! Transport contract consumed by the session.
//!
//! A transport moves bytes for one or more files per request ("batch") and
//! reports outcomes per batch, not per file. The session only ever calls
//! [`Transport::submit`] and [`Transport::abort`]; everything the transport
//! has to say comes back as a [`TransportEvent`].

use crate::error::{Result, UploadError};
use crate::failure::{BatchResult, RawTransportError};
use crate::file::{FileMetadata, TransportHandle};
use crate::id::BatchId;
use serde::{Deserialize, Serialize};

/// Opaque server response for a completed upload
pub type UploadResult = serde_json::Value;

/// Identifies which attempt of a batch a transport callback belongs to
///
/// Every retry of a file bumps its attempt, so callbacks left over from an
/// earlier attempt can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportRequest {
    /// Batch the callback refers to
    pub batch: BatchId,
    /// Attempt the callback refers to
    pub attempt: u32,
}

impl TransportRequest {
    /// Request for `attempt` of `batch`
    #[must_use]
    pub const fn new(batch: BatchId, attempt: u32) -> Self {
        Self { batch, attempt }
    }
}

impl From<BatchId> for TransportRequest {
    fn from(batch: BatchId) -> Self {
        Self::new(batch, 0)
    }
}

/// File description as reported by the transport's add event
///
/// Fields are optional because transports hand over whatever the picker
/// produced; entries without a name or size are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFileDescriptor {
    /// File name
    #[serde(default)]
    pub name: Option<String>,
    /// File size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    /// MIME type, if known
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
}

impl RawFileDescriptor {
    /// Descriptor with a name and size
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: Some(name.into()),
            size: Some(size),
            content_type: None,
        }
    }

    /// Set the MIME type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Validate into file metadata
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::MalformedDescriptor`] if the name is missing or
    /// blank, or the size is missing.
    pub fn into_metadata(self) -> Result<FileMetadata> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| UploadError::malformed("missing file name"))?;
        let size = self
            .size
            .ok_or_else(|| UploadError::malformed("missing file size"))?;

        Ok(FileMetadata {
            name,
            size,
            content_type: self.content_type.filter(|t| !t.is_empty()),
        })
    }
}

/// Low-level event emitted by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// New batch of files selected
    Add {
        /// Batch the files belong to
        batch: BatchId,
        /// One entry per file
        descriptors: Vec<RawFileDescriptor>,
    },
    /// Bytes sent for a batch
    Progress {
        /// Request the progress belongs to
        request: TransportRequest,
        /// Bytes sent so far
        loaded: u64,
        /// Total bytes
        total: u64,
    },
    /// Batch failed
    Fail {
        /// Request that failed
        request: TransportRequest,
        /// Transport-side error
        error: Option<RawTransportError>,
        /// Parsed server response, if any arrived
        result: Option<BatchResult>,
    },
    /// Batch completed
    Done {
        /// Request that completed
        request: TransportRequest,
        /// Parsed server response
        result: UploadResult,
    },
}

/// Network transfer mechanism driven by a session
///
/// Both calls must return without waiting for the network.
pub trait Transport {
    /// Begin transmitting the file behind `handle`
    ///
    /// # Errors
    ///
    /// Returns an error if the transport refuses the submission outright.
    /// Failures that happen later are reported through
    /// [`TransportEvent::Fail`].
    fn submit(&mut self, handle: &TransportHandle) -> Result<()>;

    /// Request cancellation of the transfer behind `handle`
    ///
    /// Best effort: callbacks for `handle` may still arrive afterwards.
    fn abort(&mut self, handle: &TransportHandle);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn submit(&mut self, handle: &TransportHandle) -> Result<()> {
        (**self).submit(handle)
    }

    fn abort(&mut self, handle: &TransportHandle) {
        (**self).abort(handle);
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn submit(&mut self, handle: &TransportHandle) -> Result<()> {
        (**self).submit(handle)
    }

    fn abort(&mut self, handle: &TransportHandle) {
        (**self).abort(handle);
    }
}

/// Transport call recorded by [`RecordingTransport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCall {
    /// `submit` was called
    Submit(TransportHandle),
    /// `abort` was called
    Abort(TransportHandle),
}

/// Transport that records calls instead of sending anything
///
/// Useful for tests and dry runs. Submissions can be made to fail with
/// [`refuse_submissions`](Self::refuse_submissions).
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Vec<TransportCall>,
    refusal: Option<String>,
}

impl RecordingTransport {
    /// Create a transport with an empty call log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `submit` fail with `reason`
    pub fn refuse_submissions(&mut self, reason: impl Into<String>) {
        self.refusal = Some(reason.into());
    }

    /// Accept submissions again
    pub fn accept_submissions(&mut self) {
        self.refusal = None;
    }

    /// All calls so far, in order
    #[must_use]
    pub fn calls(&self) -> &[TransportCall] {
        &self.calls
    }

    /// Handles passed to `submit`, in order
    #[must_use]
    pub fn submitted(&self) -> Vec<TransportHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Submit(handle) => Some(*handle),
                TransportCall::Abort(_) => None,
            })
            .collect()
    }

    /// Handles passed to `abort`, in order
    #[must_use]
    pub fn aborted(&self) -> Vec<TransportHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Abort(handle) => Some(*handle),
                TransportCall::Submit(_) => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn submit(&mut self, handle: &TransportHandle) -> Result<()> {
        self.calls.push(TransportCall::Submit(*handle));
        match &self.refusal {
            Some(reason) => Err(UploadError::transport(reason.clone())),
            None => Ok(()),
        }
    }

    fn abort(&mut self, handle: &TransportHandle) {
        self.calls.push(TransportCall::Abort(*handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_into_metadata() {
        let metadata = RawFileDescriptor::new("report.pdf", 2048)
            .with_content_type("application/pdf")
            .into_metadata()
            .unwrap();
        assert_eq!(metadata.name, "report.pdf");
        assert_eq!(metadata.size, 2048);
        assert_eq!(metadata.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_malformed_descriptors() {
        let missing_name = RawFileDescriptor {
            size: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            missing_name.into_metadata(),
            Err(UploadError::MalformedDescriptor(_))
        ));

        let blank_name = RawFileDescriptor::new("   ", 10);
        assert!(blank_name.into_metadata().is_err());

        let missing_size = RawFileDescriptor {
            name: Some("a.txt".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            missing_size.into_metadata(),
            Err(UploadError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_descriptor_from_json() {
        let descriptor: RawFileDescriptor =
            serde_json::from_str(r#"{"name":"a.png","size":12,"type":"image/png","lastModified":1}"#)
                .unwrap();
        assert_eq!(descriptor.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_request_from_batch() {
        let request = TransportRequest::from(BatchId::new(9));
        assert_eq!(request, TransportRequest::new(BatchId::new(9), 0));
    }

    #[test]
    fn test_recording_transport() {
        let mut transport = RecordingTransport::new();
        let handle = TransportHandle::new(BatchId::new(1), 0);

        transport.submit(&handle).unwrap();
        transport.abort(&handle);
        transport.refuse_submissions("offline");
        assert!(transport.submit(&handle).is_err());

        assert_eq!(transport.calls().len(), 3);
        assert_eq!(transport.submitted(), vec![handle, handle]);
        assert_eq!(transport.aborted(), vec![handle]);
    }
}
