use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::model::ProgressUpdate;

/// How long 100% stays on screen before the client fetches results, so the
/// user sees the bar finish.
pub const COMPLETION_DISPLAY_DELAY: Duration = Duration::from_millis(1500);

/// Server-side error substrings known to fire spuriously when progress
/// reporting races context teardown at the very end of a run. Matched
/// case-insensitively, and only honored at >= 98%.
const TRANSIENT_ERROR_PATTERNS: &[&str] = &[
    "working outside of application context",
    "working outside of request context",
];

const FALSE_FAILURE_PERCENTAGE: u32 = 98;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Uploading,
    Processing {
        percentage: u32,
        current_page: u32,
        total_pages: u32,
        message: String,
    },
    /// Processing finished; results fetch fires once the display delay
    /// elapses.
    Completed,
    Errored { message: String },
}

/// State machine over the progress push channel. The transport owns
/// reconnection; this only reacts to events.
#[derive(Debug)]
pub struct ProgressMonitor {
    state: MonitorState,
    completed_at: Option<Instant>,
    display_delay: Duration,
    /// Persistent banner for transport-level failures.
    banner: Option<String>,
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::with_display_delay(COMPLETION_DISPLAY_DELAY)
    }

    pub fn with_display_delay(display_delay: Duration) -> Self {
        Self {
            state: MonitorState::Idle,
            completed_at: None,
            display_delay,
            banner: None,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// The upload control stays disabled while anything is in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self.state, MonitorState::Idle | MonitorState::Errored { .. })
    }

    pub fn begin_upload(&mut self) {
        self.state = MonitorState::Uploading;
        self.completed_at = None;
        self.banner = None;
    }

    pub fn apply(&mut self, update: &ProgressUpdate) {
        match update.status.as_str() {
            "completed" => {
                info!(
                    "processing completed ({}/{} pages)",
                    update.current_page, update.total_pages
                );
                self.mark_completed();
            }
            "error" => {
                let message = update
                    .latest_error()
                    .unwrap_or(update.message.as_str())
                    .to_string();
                if update.percentage >= FALSE_FAILURE_PERCENTAGE
                    && is_transient_pattern(&message)
                {
                    // Known server-side race between completion and error
                    // reporting; treat as a false failure and finish anyway.
                    warn!(
                        "ignoring near-completion error at {}%: {}",
                        update.percentage, message
                    );
                    self.mark_completed();
                } else {
                    warn!("processing failed: {}", message);
                    self.state = MonitorState::Errored { message };
                    self.completed_at = None;
                }
            }
            _ => {
                debug!(
                    "progress {}% ({}/{})",
                    update.percentage, update.current_page, update.total_pages
                );
                self.state = MonitorState::Processing {
                    percentage: update.percentage,
                    current_page: update.current_page,
                    total_pages: update.total_pages,
                    message: update.message.clone(),
                };
            }
        }
    }

    fn mark_completed(&mut self) {
        self.state = MonitorState::Completed;
        self.completed_at = Some(Instant::now());
    }

    /// True once the display delay after completion has elapsed; the app
    /// then fetches results and calls [`acknowledge_completion`].
    ///
    /// [`acknowledge_completion`]: Self::acknowledge_completion
    pub fn completion_due(&self) -> bool {
        matches!(self.state, MonitorState::Completed)
            && self
                .completed_at
                .is_some_and(|at| at.elapsed() >= self.display_delay)
    }

    pub fn acknowledge_completion(&mut self) {
        if matches!(self.state, MonitorState::Completed) {
            self.state = MonitorState::Idle;
            self.completed_at = None;
        }
    }

    /// The upload request itself failed; re-enables the upload control.
    pub fn upload_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("upload failed: {}", message);
        self.state = MonitorState::Errored { message };
        self.completed_at = None;
    }

    /// `connect_error` / `reconnect_failed` from the transport.
    pub fn transport_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("progress channel failure: {}", message);
        self.banner = Some(message);
    }
}

fn is_transient_pattern(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_ERROR_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}
