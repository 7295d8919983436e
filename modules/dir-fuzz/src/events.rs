//! Consumer-facing event stream.

use crate::classify::Bucket;
use std::fmt;
use tokio::sync::mpsc;

/// Outcome of one attempt. Immutable once appended to the result log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzResult {
    pub payload: String,
    pub target_path: String,
    /// `None` when no response arrived.
    pub status: Option<u16>,
    /// `None` when no response arrived; `Some(0)` with `malformed` set for a degraded response.
    pub length: Option<usize>,
    pub elapsed_ms: u64,
    pub malformed: bool,
    pub error: Option<String>,
}

impl FuzzResult {
    pub fn bucket(&self) -> Bucket {
        Bucket::of(self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    TargetCaptured(String),
    Started,
    Interrupted,
    Finished,
    WordlistImported(usize),
    NoTarget,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::TargetCaptured(url) => write!(f, "Target: {}", url),
            ScanStatus::Started => f.write_str("Scanning..."),
            ScanStatus::Interrupted => f.write_str("Interrupted"),
            ScanStatus::Finished => f.write_str("Task Finished"),
            ScanStatus::WordlistImported(n) => write!(f, "Words: {}", n),
            ScanStatus::NoTarget => f.write_str("No target captured"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuzzEvent {
    Result(FuzzResult),
    Progress(u8),
    Status(ScanStatus),
}

/// Delivery boundary between the engine and its consumer. Calls come from the scan
/// worker and must not block it.
pub trait EventSink: Send + Sync {
    fn on_result(&self, result: FuzzResult);
    fn on_progress(&self, percent: u8);
    fn on_status(&self, status: ScanStatus);
}

/// Forwards events into an unbounded channel, preserving order. Events sent after the
/// receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<FuzzEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<FuzzEvent>) -> Self {
        ChannelSink { tx }
    }
}

pub fn channel() -> (ChannelSink, mpsc::UnboundedReceiver<FuzzEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink::new(tx), rx)
}

impl EventSink for ChannelSink {
    fn on_result(&self, result: FuzzResult) {
        let _ = self.tx.send(FuzzEvent::Result(result));
    }

    fn on_progress(&self, percent: u8) {
        let _ = self.tx.send(FuzzEvent::Progress(percent));
    }

    fn on_status(&self, status: ScanStatus) {
        let _ = self.tx.send(FuzzEvent::Status(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text() {
        assert_eq!(ScanStatus::TargetCaptured("http://h/a".into()).to_string(), "Target: http://h/a");
        assert_eq!(ScanStatus::WordlistImported(12).to_string(), "Words: 12");
        assert_eq!(ScanStatus::Finished.to_string(), "Task Finished");
        assert_eq!(ScanStatus::Started.to_string(), "Scanning...");
    }

    #[test]
    fn channel_preserves_order_and_ignores_closed_receiver() {
        let (sink, mut rx) = channel();
        sink.on_status(ScanStatus::Started);
        sink.on_progress(50);
        sink.on_progress(100);
        assert_eq!(rx.try_recv().unwrap(), FuzzEvent::Status(ScanStatus::Started));
        assert_eq!(rx.try_recv().unwrap(), FuzzEvent::Progress(50));
        assert_eq!(rx.try_recv().unwrap(), FuzzEvent::Progress(100));
        drop(rx);
        sink.on_status(ScanStatus::Finished);
    }

    #[test]
    fn result_bucket_follows_status() {
        let r = FuzzResult {
            payload: "x".into(),
            target_path: "/x".into(),
            status: None,
            length: None,
            elapsed_ms: 3,
            malformed: false,
            error: Some("no response".into()),
        };
        assert_eq!(r.bucket(), Bucket::Neutral);
    }
}
