//! Line-oriented monitor channel to a backend child.
//!
//! One short-lived TCP connection per command: dial with a fixed deadline,
//! swallow any banner, write the command line, close. Responses are not
//! parsed beyond detecting transport errors, which keeps the adapter free of
//! in-process protocol state and concurrent-safe for commands against the
//! same session from different callers.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use simbench_domain::CoreError;

/// Fixed dial deadline, independent of the caller's cancellation handle;
/// bounds the hang on a dead backend.
const DIAL_TIMEOUT: Duration = Duration::from_secs(2);
/// Read deadline for the optional greeting banner.
const BANNER_TIMEOUT: Duration = Duration::from_secs(1);
/// Concurrent dials allowed per session, so a stuck backend cannot bleed
/// file descriptors at the dial timeout's cadence.
pub const DIAL_PERMITS: usize = 4;

/// Command channel bound to one session's monitor port.
#[derive(Clone, Debug)]
pub struct MonitorChannel {
    port: u16,
    dials: Arc<Semaphore>,
}

impl MonitorChannel {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            dials: Arc::new(Semaphore::new(DIAL_PERMITS)),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send one command line, newline-terminated.
    pub async fn send_line(&self, line: &str) -> Result<(), CoreError> {
        let _permit = self
            .dials
            .acquire()
            .await
            .map_err(|_| CoreError::internal("monitor dial semaphore closed"))?;

        let mut stream = timeout(
            DIAL_TIMEOUT,
            TcpStream::connect((Ipv4Addr::LOCALHOST, self.port)),
        )
        .await
        .map_err(|_| CoreError::transport(format!("monitor dial to port {} timed out", self.port)))?
        .map_err(|e| CoreError::transport(format!("monitor dial to port {}: {e}", self.port)))?;

        // Backends may greet with a banner; read and discard what arrives
        // within the deadline.
        let mut banner = [0u8; 512];
        let _ = timeout(BANNER_TIMEOUT, stream.read(&mut banner)).await;

        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| CoreError::transport(format!("monitor write: {e}")))?;
        stream
            .write_all(b"\n")
            .await
            .map_err(|e| CoreError::transport(format!("monitor write: {e}")))?;
        let _ = stream.shutdown().await;

        tracing::trace!(port = self.port, command = line, "monitor command sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn send_line_writes_command_after_banner() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            socket
                .write_all(b"QEMU 8.2 monitor - type 'help'\r\n")
                .await
                .expect("banner");
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.expect("read");
            received
        });

        let channel = MonitorChannel::new(port);
        channel.send_line("system_reset").await.expect("send");

        let received = server.await.expect("join");
        assert_eq!(received, b"system_reset\n");
    }

    #[tokio::test]
    async fn dial_failure_is_a_transport_error() {
        // Allocate a port and leave nothing listening on it.
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let channel = MonitorChannel::new(port);
        let err = channel.send_line("halt").await.expect_err("must fail");
        assert!(matches!(err, CoreError::Transport(_)));
    }
}
