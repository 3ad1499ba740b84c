//! QEMU adapter.
//!
//! The child starts paused (`-S`) with a GDB stub on the debug port and the
//! human monitor served over telnet on the monitor port. Control is plain
//! monitor text; program load is the one operation that must shell out, to a
//! symbolic debugger driven in batch mode against the debug port. Coverage
//! is indirect: the child runs with semihosting enabled in a per-session
//! working directory and the firmware writes its own data there.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use simbench_domain::{
    BackendKind, BoardConfig, CapabilityDescriptor, CoreError, FeatureFlags, Session, SessionId,
    TargetEvent,
};

use crate::application::ports::outbound::{BackendPort, ConsoleWriter};
use crate::infrastructure::backends::process::{spawn_child, SessionMap, SpawnSpec};
use crate::infrastructure::backends::run_span_with_sleep;
use crate::infrastructure::net::allocate_port_pair;

const DEFAULT_MACHINE: &str = "lm3s6965evb";

#[derive(Debug, Clone)]
pub struct QemuSettings {
    pub binary: String,
    /// Symbolic debugger used in batch mode for program load.
    pub gdb_binary: String,
    /// Root for per-session working directories (semihosting output).
    pub work_root: PathBuf,
}

pub struct QemuAdapter {
    settings: QemuSettings,
    sessions: SessionMap,
}

impl QemuAdapter {
    pub fn new(settings: QemuSettings) -> Self {
        Self {
            settings,
            sessions: SessionMap::new(),
        }
    }
}

/// Command line for one session's child.
fn build_args(board: &BoardConfig, debug_port: u16, monitor_port: u16) -> Vec<String> {
    let machine = board
        .board
        .clone()
        .unwrap_or_else(|| DEFAULT_MACHINE.to_string());
    let mut args = vec![
        "-machine".to_string(),
        machine,
        "-nographic".to_string(),
        "-semihosting".to_string(),
        // Start paused; execution is driven through the monitor.
        "-S".to_string(),
        "-gdb".to_string(),
        format!("tcp::{debug_port}"),
        "-monitor".to_string(),
        format!("telnet:127.0.0.1:{monitor_port},server,nowait"),
    ];
    if let Some(processor) = &board.processor {
        args.push("-cpu".to_string());
        args.push(processor.model.clone());
    }
    if let Some(ram) = board.main_ram() {
        let mib = (ram.size / (1024 * 1024)).max(1);
        args.push("-m".to_string());
        args.push(format!("{mib}M"));
    }
    args
}

fn snapshot_tag(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string())
}

#[async_trait]
impl BackendPort for QemuAdapter {
    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            backend: BackendKind::Qemu,
            processors: vec![
                "cortex-m3".to_string(),
                "cortex-m4".to_string(),
                "cortex-m7".to_string(),
                "cortex-a9".to_string(),
            ],
            peripherals: vec!["uart".to_string(), "timer".to_string(), "gpio".to_string()],
            buses: vec!["sysbus".to_string()],
            features: FeatureFlags {
                snapshot: true,
                step: false,
                coverage: true,
                event_injection: true,
                native_run_for: false,
            },
            boards: vec![
                "lm3s6965evb".to_string(),
                "stm32vldiscovery".to_string(),
                "netduino2".to_string(),
                "mps2-an385".to_string(),
                "virt".to_string(),
            ],
        }
    }

    async fn start_session(
        &self,
        session: &mut Session,
        board: &BoardConfig,
        console: Option<ConsoleWriter>,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        let (debug_port, monitor_port) = allocate_port_pair().await?;

        let work_dir = self.settings.work_root.join(session.id.to_string());
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| CoreError::spawn(format!("session work dir: {e}")))?;

        let spec = SpawnSpec {
            program: self.settings.binary.clone(),
            args: build_args(board, debug_port, monitor_port),
            cwd: Some(work_dir),
        };
        let handle = spawn_child(spec, debug_port, monitor_port, console, &cancel).await?;

        session.attach_child(debug_port, monitor_port, handle.pid);
        self.sessions.insert(session.id, handle);
        Ok(())
    }

    async fn stop_session(&self, id: SessionId) -> Result<(), CoreError> {
        let handle = self.sessions.remove(id)?;
        handle.kill().await;
        Ok(())
    }

    async fn reset(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions.get(id)?.monitor.send_line("system_reset").await
    }

    async fn load_program(
        &self,
        id: SessionId,
        image: &Path,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        let handle = self.sessions.get(id)?;

        let mut command = tokio::process::Command::new(&self.settings.gdb_binary);
        command
            .arg("--batch")
            .arg("-nx")
            .arg("-ex")
            .arg(format!("target remote 127.0.0.1:{}", handle.debug_port))
            .arg("-ex")
            .arg("load")
            .arg("-ex")
            .arg("detach")
            .arg(image)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| CoreError::transport(format!("{}: {e}", self.settings.gdb_binary)))?;

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(CoreError::transport(format!(
                    "debugger load exited with {status}"
                ))),
                Err(e) => Err(CoreError::transport(format!("debugger load: {e}"))),
            },
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(CoreError::Cancelled)
            }
        }
    }

    async fn execute(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions.get(id)?.monitor.send_line("cont").await
    }

    async fn pause(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions.get(id)?.monitor.send_line("stop").await
    }

    async fn resume(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions.get(id)?.monitor.send_line("cont").await
    }

    async fn debug_port(&self, id: SessionId) -> Result<u16, CoreError> {
        Ok(self.sessions.get(id)?.debug_port)
    }

    async fn create_snapshot(&self, id: SessionId, path: &Path) -> Result<(), CoreError> {
        let handle = self.sessions.get(id)?;
        let tag = snapshot_tag(path);
        handle.monitor.send_line(&format!("savevm {tag}")).await?;
        // The state lives in the VM image; the snapshot file records the tag
        // so restore can find it.
        tokio::fs::write(path, &tag)
            .await
            .map_err(|e| CoreError::internal(format!("snapshot marker write: {e}")))?;
        Ok(())
    }

    async fn restore_snapshot(&self, id: SessionId, path: &Path) -> Result<(), CoreError> {
        let handle = self.sessions.get(id)?;
        let tag = snapshot_tag(path);
        handle.monitor.send_line(&format!("loadvm {tag}")).await
    }

    async fn step(&self, id: SessionId, _count: u64) -> Result<(), CoreError> {
        // The human monitor has no instruction stepping.
        self.sessions.get(id)?;
        Err(CoreError::unsupported(BackendKind::Qemu, "step"))
    }

    async fn start_coverage(&self, id: SessionId, _path: &Path) -> Result<(), CoreError> {
        // Semihosting firmware writes coverage into the session work dir;
        // nothing to switch on at the control plane.
        let handle = self.sessions.get(id)?;
        tracing::debug!(
            session_id = %id,
            work_dir = ?handle.work_dir,
            "coverage is semihosting-driven for this backend"
        );
        Ok(())
    }

    async fn stop_coverage(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions.get(id)?;
        Ok(())
    }

    async fn run_for(
        &self,
        id: SessionId,
        duration: Duration,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        let handle = self.sessions.get(id)?;
        run_span_with_sleep(&handle.monitor, "cont", "stop", duration, &cancel).await
    }

    async fn inject_event(&self, id: SessionId, event: &TargetEvent) -> Result<(), CoreError> {
        let handle = self.sessions.get(id)?;
        match event {
            TargetEvent::Key { keys } => handle.monitor.send_line(&format!("sendkey {keys}")).await,
            TargetEvent::Mouse { dx, dy, buttons } => {
                handle
                    .monitor
                    .send_line(&format!("mouse_move {dx} {dy}"))
                    .await?;
                if *buttons != 0 {
                    handle
                        .monitor
                        .send_line(&format!("mouse_button {buttons}"))
                        .await?;
                }
                Ok(())
            }
            TargetEvent::Gpio { .. } => {
                Err(CoreError::unsupported(BackendKind::Qemu, "gpio event injection"))
            }
            TargetEvent::Uart { .. } => {
                Err(CoreError::unsupported(BackendKind::Qemu, "uart event injection"))
            }
        }
    }
}
