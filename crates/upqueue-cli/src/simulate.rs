//! Simulated upload transport.
//!
//! Stands in for an HTTP uploader: every selected path becomes a single-file
//! batch, and every submission spawns a task that reports progress ticks and
//! then either completes or fails. Events go back to the session's event
//! loop over an mpsc channel.

use crate::config::SimulationConfig;
use rand::Rng;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use upqueue_core::{
    BatchId, BatchResult, FileOutcome, RawFileDescriptor, RawTransportError, Transport,
    TransportEvent, TransportHandle, UploadError,
};

/// How a simulated attempt ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    NetworkError,
    ServerRejected,
}

/// Transport that fakes uploads with timed tasks
pub struct SimulatedTransport {
    settings: SimulationConfig,
    endpoint: String,
    events: UnboundedSender<TransportEvent>,
    batches: HashMap<BatchId, RawFileDescriptor>,
    tasks: HashMap<TransportHandle, JoinHandle<()>>,
    next_batch: u64,
}

impl SimulatedTransport {
    /// Create a transport that reports to `events`
    pub fn new(
        settings: SimulationConfig,
        endpoint: String,
        events: UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            settings,
            endpoint,
            events,
            batches: HashMap::new(),
            tasks: HashMap::new(),
            next_batch: 0,
        }
    }

    /// Announce a user-selected path as a new single-file batch
    pub fn select(&mut self, path: &Path) -> BatchId {
        let batch = BatchId::new(self.next_batch);
        self.next_batch += 1;

        let descriptor = describe(path);
        self.batches.insert(batch, descriptor.clone());
        let add = TransportEvent::Add {
            batch,
            descriptors: vec![descriptor],
        };
        if self.events.send(add).is_err() {
            tracing::warn!(%batch, "Event loop closed, selection dropped");
        }
        batch
    }

    fn pick_outcome(&self) -> Outcome {
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(self.settings.failure_rate.clamp(0.0, 1.0)) {
            Outcome::Success
        } else if rng.gen_bool(0.5) {
            Outcome::NetworkError
        } else {
            Outcome::ServerRejected
        }
    }
}

fn describe(path: &Path) -> RawFileDescriptor {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string);

    let size = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        Ok(_) => {
            tracing::warn!("{} is not a regular file", path.display());
            None
        }
        Err(err) => {
            tracing::warn!("Cannot read {}: {}", path.display(), err);
            None
        }
    };

    RawFileDescriptor {
        name,
        size,
        content_type: content_type(path).map(str::to_string),
    }
}

fn content_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "txt" | "log" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mime)
}

impl Transport for SimulatedTransport {
    fn submit(&mut self, handle: &TransportHandle) -> upqueue_core::Result<()> {
        let Some(descriptor) = self.batches.get(&handle.batch()) else {
            return Err(UploadError::transport(format!(
                "{} was never selected",
                handle.batch()
            )));
        };

        let total = descriptor.size.unwrap_or(0);
        let name = descriptor.name.clone().unwrap_or_default();
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), name);
        let outcome = self.pick_outcome();
        let request = handle.request();
        let events = self.events.clone();
        let chunk = self.settings.chunk_size.max(1);
        let tick = Duration::from_millis(self.settings.tick_ms);

        let task = tokio::spawn(async move {
            let fail_at = total / 2;
            let mut loaded = 0;
            loop {
                tokio::time::sleep(tick).await;
                loaded = (loaded + chunk).min(total);
                let progress = TransportEvent::Progress {
                    request,
                    loaded,
                    total,
                };
                if events.send(progress).is_err() {
                    return;
                }
                if loaded >= total || (outcome != Outcome::Success && loaded >= fail_at) {
                    break;
                }
            }

            let event = match outcome {
                Outcome::Success => TransportEvent::Done {
                    request,
                    result: json!({ "files": [{ "name": name, "size": total, "url": url }] }),
                },
                Outcome::NetworkError => TransportEvent::Fail {
                    request,
                    error: Some(RawTransportError::from("simulated network failure")),
                    result: None,
                },
                Outcome::ServerRejected => TransportEvent::Fail {
                    request,
                    error: None,
                    result: Some(BatchResult::with_files(vec![FileOutcome::failed(
                        "server rejected file",
                    )])),
                },
            };
            let _ = events.send(event);
        });

        self.tasks.retain(|_, task| !task.is_finished());
        if let Some(previous) = self.tasks.insert(*handle, task) {
            previous.abort();
        }
        tracing::debug!(
            batch = %handle.batch(),
            attempt = handle.attempt(),
            ?outcome,
            "Simulated upload scheduled"
        );
        Ok(())
    }

    fn abort(&mut self, handle: &TransportHandle) {
        if let Some(task) = self.tasks.remove(handle) {
            task.abort();
            tracing::debug!(batch = %handle.batch(), "Simulated upload aborted");
        }
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
