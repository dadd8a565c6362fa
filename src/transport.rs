//! Push channel for `progress_update` events.
//!
//! A background thread streams newline-delimited JSON from the server and
//! forwards typed events over a flume channel; the UI loop drains the
//! receiver every tick. Reconnection lives entirely in here; consumers
//! only ever see `ConnectError` / `ReconnectFailed`.

use std::io::{BufRead, BufReader};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::model::ProgressUpdate;

pub const RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Progress(ProgressUpdate),
    ConnectError(String),
    ReconnectFailed,
}

/// Wire envelope: `{"data": {...}}`, scoped per upload session by the URL.
#[derive(Debug, Deserialize)]
struct ProgressEnvelope {
    data: ProgressUpdate,
}

/// One line of the stream → one event. Blank lines and unparseable lines
/// are skipped (the stream may interleave keep-alives).
pub fn parse_event_line(line: &str) -> Option<ProgressUpdate> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<ProgressEnvelope>(line) {
        Ok(envelope) => Some(envelope.data),
        Err(e) => {
            debug!("skipping unparseable progress line: {}", e);
            None
        }
    }
}

fn is_terminal_status(status: &str) -> bool {
    matches!(status, "completed" | "error")
}

/// Receiving end of the push channel for one upload session. Dropping it
/// detaches the reader thread, which exits on its next send.
pub struct ProgressChannel {
    receiver: flume::Receiver<ChannelEvent>,
}

impl ProgressChannel {
    /// Connect to `{base_url}/progress-stream/{result_id}` and start
    /// forwarding events.
    pub fn connect(base_url: &str, result_id: &str) -> Self {
        let url = format!(
            "{}/progress-stream/{}",
            base_url.trim_end_matches('/'),
            result_id
        );
        let (sender, receiver) = flume::unbounded();
        thread::Builder::new()
            .name("progress-channel".to_string())
            .spawn(move || run_reader(&url, &sender))
            .expect("spawn progress channel thread");
        Self { receiver }
    }

    /// Channel with a caller-held sender instead of a reader thread. Used
    /// by tests to script progress events.
    pub fn pair() -> (flume::Sender<ChannelEvent>, Self) {
        let (sender, receiver) = flume::unbounded();
        (sender, Self { receiver })
    }

    /// Drain everything that arrived since the last tick.
    pub fn drain(&self) -> Vec<ChannelEvent> {
        self.receiver.try_iter().collect()
    }
}

fn run_reader(url: &str, sender: &flume::Sender<ChannelEvent>) {
    // No overall request timeout: the stream stays open for the whole
    // processing run. Only the connection itself is bounded.
    let client = match reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            let _ = sender.send(ChannelEvent::ConnectError(e.to_string()));
            let _ = sender.send(ChannelEvent::ReconnectFailed);
            return;
        }
    };

    for attempt in 1..=RECONNECT_ATTEMPTS {
        match client.get(url).send().and_then(|r| r.error_for_status()) {
            Ok(response) => {
                info!("progress channel connected (attempt {})", attempt);
                if stream_events(response, sender) {
                    // Terminal status seen or consumer gone; no reconnect.
                    return;
                }
                warn!("progress stream ended early, reconnecting");
            }
            Err(e) => {
                warn!("progress channel connect failed: {}", e);
                if sender
                    .send(ChannelEvent::ConnectError(e.to_string()))
                    .is_err()
                {
                    return;
                }
            }
        }
        if attempt < RECONNECT_ATTEMPTS {
            thread::sleep(RECONNECT_DELAY);
        }
    }

    let _ = sender.send(ChannelEvent::ReconnectFailed);
}

/// Returns true when the stream finished for good (terminal status, or the
/// receiver was dropped).
fn stream_events(
    response: reqwest::blocking::Response,
    sender: &flume::Sender<ChannelEvent>,
) -> bool {
    let reader = BufReader::new(response);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("progress stream read error: {}", e);
                return false;
            }
        };
        let Some(update) = parse_event_line(&line) else {
            continue;
        };
        let terminal = is_terminal_status(&update.status);
        if sender.send(ChannelEvent::Progress(update)).is_err() {
            return true;
        }
        if terminal {
            return true;
        }
    }
    false
}
