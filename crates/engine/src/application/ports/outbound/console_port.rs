//! Console fan-out seam between adapters and the hub.

use std::sync::Arc;

use async_trait::async_trait;

use simbench_domain::SessionId;
use simbench_shared::ConsoleStream;

/// Receives copied console chunks for broadcast to subscribers.
#[async_trait]
pub trait ConsolePort: Send + Sync {
    /// Deliver one chunk of child output. The chunk is already a private
    /// copy; implementations may retain it.
    async fn publish(&self, session_id: SessionId, stream: ConsoleStream, chunk: Vec<u8>);

    /// The session's child is gone; subscribers should be told the stream
    /// ended.
    async fn session_closed(&self, session_id: SessionId);
}

/// Byte-writer handed to an adapter for one session's child stdio.
///
/// Copies every slice at the boundary so the caller may reuse its buffer
/// freely.
#[derive(Clone)]
pub struct ConsoleWriter {
    port: Arc<dyn ConsolePort>,
    session_id: SessionId,
}

impl ConsoleWriter {
    pub fn new(port: Arc<dyn ConsolePort>, session_id: SessionId) -> Self {
        Self { port, session_id }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub async fn write(&self, stream: ConsoleStream, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.port
            .publish(self.session_id, stream, chunk.to_vec())
            .await;
    }

    pub async fn closed(&self) {
        self.port.session_closed(self.session_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct Capture {
        chunks: Mutex<Vec<(ConsoleStream, Vec<u8>)>>,
    }

    #[async_trait]
    impl ConsolePort for Capture {
        async fn publish(&self, _session_id: SessionId, stream: ConsoleStream, chunk: Vec<u8>) {
            self.chunks.lock().await.push((stream, chunk));
        }

        async fn session_closed(&self, _session_id: SessionId) {}
    }

    #[tokio::test]
    async fn writer_copies_chunks_and_skips_empty_writes() {
        let capture = Arc::new(Capture {
            chunks: Mutex::new(Vec::new()),
        });
        let writer = ConsoleWriter::new(capture.clone(), SessionId::new());

        let mut buf = *b"boot: ok\r\n";
        writer.write(ConsoleStream::Stdout, &buf).await;
        // Caller reuses its buffer; the published chunk must be unaffected.
        buf.fill(0);
        writer.write(ConsoleStream::Stderr, &[]).await;

        let chunks = capture.chunks.lock().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].1, b"boot: ok\r\n");
    }
}
