//! Child-process supervision shared by the backend adapters.
//!
//! Each live session owns exactly one child process. The handle keeps the
//! monitor channel, the allocated debug port, and the child itself; stdout
//! and stderr are pumped into the session's console writer by detached
//! tasks.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use simbench_domain::{CoreError, SessionId};
use simbench_shared::ConsoleStream;

use crate::application::ports::outbound::ConsoleWriter;
use crate::infrastructure::net::MonitorChannel;

/// What to launch for one session.
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// A live backend child with its control channel.
#[derive(Debug)]
pub struct ChildHandle {
    pub debug_port: u16,
    pub monitor: MonitorChannel,
    pub pid: Option<u32>,
    /// Per-session working directory, when the adapter uses one.
    pub work_dir: Option<PathBuf>,
    child: Mutex<Child>,
}

impl ChildHandle {
    /// Terminate the child forcibly. Already-exited children are fine.
    pub async fn kill(&self) {
        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, "child kill: process already gone");
        }
    }
}

/// Per-adapter index of live session children.
pub struct SessionMap {
    inner: DashMap<SessionId, Arc<ChildHandle>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn insert(&self, id: SessionId, handle: Arc<ChildHandle>) {
        self.inner.insert(id, handle);
    }

    pub fn get(&self, id: SessionId) -> Result<Arc<ChildHandle>, CoreError> {
        self.inner
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CoreError::not_found("session", id))
    }

    pub fn remove(&self, id: SessionId) -> Result<Arc<ChildHandle>, CoreError> {
        self.inner
            .remove(&id)
            .map(|(_, handle)| handle)
            .ok_or_else(|| CoreError::not_found("session", id))
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.inner.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for SessionMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Launch a backend child and wire its stdio into the console fan-out.
///
/// `cancel` covers the spawn window: a caller that goes away right after the
/// fork gets the child reaped instead of leaked.
pub async fn spawn_child(
    spec: SpawnSpec,
    debug_port: u16,
    monitor_port: u16,
    console: Option<ConsoleWriter>,
    cancel: &CancellationToken,
) -> Result<Arc<ChildHandle>, CoreError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.cwd {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .map_err(|e| CoreError::spawn(format!("{}: {e}", spec.program)))?;

    if cancel.is_cancelled() {
        let _ = child.kill().await;
        return Err(CoreError::Cancelled);
    }

    let pid = child.id();
    tracing::info!(
        program = %spec.program,
        pid = ?pid,
        debug_port,
        monitor_port,
        "backend child launched"
    );

    if let Some(writer) = console {
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_stream(stdout, writer.clone(), ConsoleStream::Stdout, true));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_stream(stderr, writer, ConsoleStream::Stderr, false));
        }
    }

    Ok(Arc::new(ChildHandle {
        debug_port,
        monitor: MonitorChannel::new(monitor_port),
        pid,
        work_dir: spec.cwd,
        child: Mutex::new(child),
    }))
}

/// Forward one child stream into the console writer until EOF.
async fn pump_stream<R: AsyncRead + Unpin>(
    mut reader: R,
    writer: ConsoleWriter,
    stream: ConsoleStream,
    notify_close: bool,
) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => writer.write(stream, &buf[..n]).await,
        }
    }
    if notify_close {
        writer.closed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex as AsyncMutex;

    use crate::application::ports::outbound::ConsolePort;

    struct Capture {
        chunks: AsyncMutex<Vec<Vec<u8>>>,
        closed: AsyncMutex<bool>,
    }

    #[async_trait]
    impl ConsolePort for Capture {
        async fn publish(&self, _id: SessionId, _stream: ConsoleStream, chunk: Vec<u8>) {
            self.chunks.lock().await.push(chunk);
        }

        async fn session_closed(&self, _id: SessionId) {
            *self.closed.lock().await = true;
        }
    }

    #[tokio::test]
    async fn child_stdout_reaches_the_console_writer() {
        let capture = Arc::new(Capture {
            chunks: AsyncMutex::new(Vec::new()),
            closed: AsyncMutex::new(false),
        });
        let writer = ConsoleWriter::new(capture.clone(), SessionId::new());

        let spec = SpawnSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "printf 'boot ok'".to_string()],
            cwd: None,
        };
        let handle = spawn_child(spec, 1234, 1235, Some(writer), &CancellationToken::new())
            .await
            .expect("spawn");
        assert!(handle.pid.is_some());

        // Wait for the pump to observe EOF.
        for _ in 0..100 {
            if *capture.closed.lock().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let output: Vec<u8> = capture
            .chunks
            .lock()
            .await
            .iter()
            .flatten()
            .copied()
            .collect();
        assert_eq!(output, b"boot ok");
        assert!(*capture.closed.lock().await);
    }

    #[tokio::test]
    async fn cancelled_spawn_reaps_the_child() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let spec = SpawnSpec {
            program: "sleep".to_string(),
            args: vec!["60".to_string()],
            cwd: None,
        };
        let err = spawn_child(spec, 1, 2, None, &cancel)
            .await
            .expect_err("must cancel");
        assert!(matches!(err, CoreError::Cancelled));
    }

    #[tokio::test]
    async fn session_map_reports_unknown_ids() {
        let map = SessionMap::new();
        let id = SessionId::new();
        assert!(map.get(id).is_err());
        assert!(matches!(
            map.remove(id),
            Err(CoreError::NotFound { entity: "session", .. })
        ));
    }
}
