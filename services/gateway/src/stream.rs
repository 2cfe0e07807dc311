// StreamLoop: the one place that reads a waiter's channel until the backend
// signals `done` or the per-request deadline expires. Both the HTTP SSE
// handler and the WebSocket handler drive the same loop and differ only in
// how they frame each step.

use std::time::Duration;

use gateway_protocol::ChunkData;
use tokio::sync::mpsc;

use gateway_protocol::ResponseFrame;

/// One step produced by polling a waiter's channel. `frame.error` is not
/// surfaced here -- whatever the cause (breaker-open, backend failure,
/// malformed stream), an empty `full` at `Done`/`TimedOut` always renders the
/// same fixed busy message, exactly like the original `consumer/main.py`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamStep {
    Chunk(ChunkData),
    Done,
    TimedOut,
}

/// Accumulates chunk text and a chunk count across the life of one request,
/// so callers can apply their own completion rule afterward: the streaming
/// path checks `full.is_empty()`, the non-streaming path checks
/// `chunks_received == 0` (see spec's two distinct empty-response rules).
pub struct StreamLoop {
    rx: mpsc::Receiver<ResponseFrame>,
    timeout: Duration,
    pub chunks_received: u32,
    pub full: String,
}

impl StreamLoop {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<ResponseFrame>, timeout: Duration) -> Self {
        Self {
            rx,
            timeout,
            chunks_received: 0,
            full: String::new(),
        }
    }

    /// Waits for the next frame, up to `timeout`. Updates `chunks_received`
    /// and `full` as a side effect of observing a data chunk.
    pub async fn next(&mut self) -> StreamStep {
        match tokio::time::timeout(self.timeout, self.rx.recv()).await {
            Ok(Some(frame)) if frame.done => StreamStep::Done,
            Ok(Some(frame)) => {
                let data = frame.data.unwrap_or_default();
                self.chunks_received += 1;
                for choice in &data.choices {
                    self.full.push_str(&choice.text);
                }
                StreamStep::Chunk(data)
            }
            // The waiter's sender was dropped without a terminal frame --
            // treat like a clean end rather than hanging forever.
            Ok(None) => StreamStep::Done,
            Err(_) => StreamStep::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_protocol::Choice;

    fn chunk_frame(text: &str) -> ResponseFrame {
        ResponseFrame::chunk(
            "req-1",
            ChunkData {
                choices: vec![Choice {
                    text: text.to_owned(),
                    index: 0,
                    finish_reason: None,
                }],
            },
        )
    }

    #[tokio::test]
    async fn accumulates_text_and_count_across_chunks_then_done() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(chunk_frame("he")).await.unwrap();
        tx.send(chunk_frame("llo")).await.unwrap();
        tx.send(ResponseFrame::ok_done("req-1")).await.unwrap();

        let mut stream = StreamLoop::new(rx, Duration::from_secs(5));
        assert!(matches!(stream.next().await, StreamStep::Chunk(_)));
        assert!(matches!(stream.next().await, StreamStep::Chunk(_)));
        assert_eq!(stream.next().await, StreamStep::Done);
        assert_eq!(stream.full, "hello");
        assert_eq!(stream.chunks_received, 2);
    }

    #[tokio::test]
    async fn error_done_frame_ends_the_loop_without_populating_full() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(ResponseFrame::error_done("req-1", "vLLM service is unavailable."))
            .await
            .unwrap();

        let mut stream = StreamLoop::new(rx, Duration::from_secs(5));
        assert_eq!(stream.next().await, StreamStep::Done);
        assert!(stream.full.is_empty());
        assert_eq!(stream.chunks_received, 0);
    }

    #[tokio::test]
    async fn silence_past_the_deadline_times_out() {
        let (_tx, rx) = mpsc::channel(8);
        let mut stream = StreamLoop::new(rx, Duration::from_millis(20));
        assert_eq!(stream.next().await, StreamStep::TimedOut);
    }

    #[tokio::test]
    async fn sender_drop_without_terminal_frame_ends_the_loop() {
        let (tx, rx) = mpsc::channel(8);
        drop(tx);
        let mut stream = StreamLoop::new(rx, Duration::from_secs(5));
        assert_eq!(stream.next().await, StreamStep::Done);
    }
}
