//! Progress as messages: workers produce, one consumer drains.

use serde::Serialize;
use tokio::sync::mpsc;

use tabseek_core::progress::ProgressSink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub message: String,
    pub percent: u8,
}

/// Sending half. Never blocks; events sent after the receiver is gone are
/// dropped.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSink for ProgressChannel {
    fn report(&self, message: &str, percent: u8) {
        let _ = self.tx.send(ProgressEvent {
            message: message.to_string(),
            percent,
        });
    }
}

#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Wait for the next event; `None` once every sender is dropped.
    /// Must not be called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            out.push(ev);
        }
        out
    }
}

pub fn progress_channel() -> (ProgressChannel, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressChannel { tx }, ProgressReceiver { rx })
}
