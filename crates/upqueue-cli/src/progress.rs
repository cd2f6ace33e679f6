//! Upload progress display with one bar per file.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use upqueue_core::{FileId, SessionEvent, format_bytes};

/// Renders session events as a stack of progress bars
pub struct UploadBoard {
    multi: MultiProgress,
    bars: Mutex<HashMap<FileId, ProgressBar>>,
}

impl UploadBoard {
    /// Create a board drawing to stderr
    #[must_use]
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos:>3}% {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("#>-")
    }

    /// Update the board for one session event
    pub fn render(&self, event: &SessionEvent) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        let file = event.file();
        let name = &file.metadata.name;

        match event {
            SessionEvent::FileAdded(_) => {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(Self::style());
                bar.set_message(format!("{name} ({})", format_bytes(file.metadata.size)));
                bars.insert(file.id, bar);
            }
            SessionEvent::FileProgress(_, progress) => {
                if let Some(bar) = bars.get(&file.id) {
                    bar.set_position(u64::from(progress.percent()));
                    bar.set_message(format!("{name} {}", progress.label()));
                }
            }
            SessionEvent::FileFailed(_, message) => {
                if let Some(bar) = bars.get(&file.id) {
                    bar.set_message(format!("{name} failed: {message}"));
                }
            }
            SessionEvent::FileDone(..) => {
                if let Some(bar) = bars.get(&file.id) {
                    bar.set_position(100);
                    bar.finish_with_message(format!("{name} uploaded"));
                }
            }
            SessionEvent::FileCanceled(_) => {
                if let Some(bar) = bars.remove(&file.id) {
                    bar.abandon_with_message(format!("{name} canceled"));
                }
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Abandon every unfinished bar
    pub fn finish(&self) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        for bar in bars.values().filter(|bar| !bar.is_finished()) {
            bar.abandon();
        }
    }
}

impl Default for UploadBoard {
    fn default() -> Self {
        Self::new()
    }
}
