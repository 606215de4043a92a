//! Progress event relay for streaming runs.
//!
//! Provisioning and streaming agent execution emit human-readable progress
//! lines as they happen. A [`LogSink`] carries those lines to whoever is
//! watching (the SSE handler, or nobody in synchronous mode). Delivery is
//! immediate: each `emit` hands the line to the channel without buffering, so
//! the serving layer can flush it to the caller in real time.

use tokio::sync::mpsc;

/// Destination for progress log lines emitted during a run.
///
/// Cloneable so each pipeline stage can hold its own handle. Dropping the
/// last clone closes the channel, which the consumer observes as end of
/// stream.
#[derive(Clone)]
pub struct LogSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl LogSink {
    /// Creates a sink connected to a receiver, for streaming mode.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Creates a sink that drops every line, for synchronous mode.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Emits one progress line. A disconnected receiver is not an error:
    /// the run keeps going even if nobody is listening.
    pub fn emit(&self, line: impl Into<String>) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(line.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_lines_in_order() {
        let (sink, mut rx) = LogSink::channel();
        sink.emit("first");
        sink.emit("second");
        drop(sink);

        assert_eq!(rx.recv().await, Some("first".to_string()));
        assert_eq!(rx.recv().await, Some("second".to_string()));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_discard_sink_accepts_lines() {
        let sink = LogSink::discard();
        sink.emit("nobody is listening");
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped_is_not_an_error() {
        let (sink, rx) = LogSink::channel();
        drop(rx);
        sink.emit("still fine");
    }
}
