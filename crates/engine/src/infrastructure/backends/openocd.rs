//! OpenOCD adapter.
//!
//! The child is the hardware-debug daemon driving a real target through a
//! probe: a telnet command channel on the monitor port and a GDB bridge on
//! the debug port. Program load is flash programming; stepping is native;
//! coverage enables semihosting. Snapshots and event injection are not
//! supported by hardware.

use std::path::Path;
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

const DEFAULT_TARGET: &str = "stm32f4x";

#[derive(Debug, Clone)]
pub struct OpenOcdSettings {
    pub binary: String,
    /// Probe interface config name, e.g. "cmsis-dap" or "stlink".
    pub probe: String,
}

pub struct OpenOcdAdapter {
    settings: OpenOcdSettings,
    sessions: SessionMap,
}

impl OpenOcdAdapter {
    pub fn new(settings: OpenOcdSettings) -> Self {
        Self {
            settings,
            sessions: SessionMap::new(),
        }
    }
}

/// Target config file for a board name.
fn target_config(board: &BoardConfig) -> &'static str {
    match board.board.as_deref() {
        Some("stm32f4discovery") | Some("nucleo-f401re") => "stm32f4x",
        Some("nucleo-f103rb") | Some("bluepill") => "stm32f1x",
        Some("nrf52-dk") | Some("nrf52840-dk") => "nrf52",
        Some("esp32-devkit") => "esp32",
        _ => DEFAULT_TARGET,
    }
}

fn build_args(settings: &OpenOcdSettings, board: &BoardConfig, debug_port: u16, monitor_port: u16) -> Vec<String> {
    vec![
        "-f".to_string(),
        format!("interface/{}.cfg", settings.probe),
        "-f".to_string(),
        format!("target/{}.cfg", target_config(board)),
        "-c".to_string(),
        format!("gdb_port {debug_port}"),
        "-c".to_string(),
        format!("telnet_port {monitor_port}"),
        "-c".to_string(),
        "tcl_port disabled".to_string(),
    ]
}

#[async_trait]
impl BackendPort for OpenOcdAdapter {
    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            backend: BackendKind::OpenOcd,
            processors: vec![
                "cortex-m0".to_string(),
                "cortex-m3".to_string(),
                "cortex-m4".to_string(),
                "cortex-m7".to_string(),
            ],
            peripherals: vec!["swd".to_string(), "jtag".to_string()],
            buses: vec!["ahb".to_string(), "apb".to_string()],
            features: FeatureFlags {
                snapshot: false,
                step: true,
                coverage: true,
                event_injection: false,
                native_run_for: false,
            },
            boards: vec![
                "stm32f4discovery".to_string(),
                "nucleo-f103rb".to_string(),
                "nucleo-f401re".to_string(),
                "nrf52-dk".to_string(),
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

        let spec = SpawnSpec {
            program: self.settings.binary.clone(),
            args: build_args(&self.settings, board, debug_port, monitor_port),
            cwd: None,
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
        self.sessions.get(id)?.monitor.send_line("reset halt").await
    }

    async fn load_program(
        &self,
        id: SessionId,
        image: &Path,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        self.sessions
            .get(id)?
            .monitor
            .send_line(&format!("program {} verify", image.display()))
            .await
    }

    async fn execute(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions.get(id)?.monitor.send_line("resume").await
    }

    async fn pause(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions.get(id)?.monitor.send_line("halt").await
    }

    async fn resume(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions.get(id)?.monitor.send_line("resume").await
    }

    async fn debug_port(&self, id: SessionId) -> Result<u16, CoreError> {
        Ok(self.sessions.get(id)?.debug_port)
    }

    async fn create_snapshot(&self, id: SessionId, _path: &Path) -> Result<(), CoreError> {
        self.sessions.get(id)?;
        Err(CoreError::unsupported(BackendKind::OpenOcd, "snapshot"))
    }

    async fn restore_snapshot(&self, id: SessionId, _path: &Path) -> Result<(), CoreError> {
        self.sessions.get(id)?;
        Err(CoreError::unsupported(BackendKind::OpenOcd, "snapshot restore"))
    }

    async fn step(&self, id: SessionId, count: u64) -> Result<(), CoreError> {
        let handle = self.sessions.get(id)?;
        // The telnet channel speaks Tcl, so a counted step fits in one line.
        let line = if count <= 1 {
            "step".to_string()
        } else {
            format!("for {{set i 0}} {{$i < {count}}} {{incr i}} {{ step }}")
        };
        handle.monitor.send_line(&line).await
    }

    async fn start_coverage(&self, id: SessionId, _path: &Path) -> Result<(), CoreError> {
        self.sessions
            .get(id)?
            .monitor
            .send_line("arm semihosting enable")
            .await
    }

    async fn stop_coverage(&self, id: SessionId) -> Result<(), CoreError> {
        self.sessions
            .get(id)?
            .monitor
            .send_line("arm semihosting disable")
            .await
    }

    async fn run_for(
        &self,
        id: SessionId,
        duration: Duration,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        let handle = self.sessions.get(id)?;
        run_span_with_sleep(&handle.monitor, "resume", "halt", duration, &cancel).await
    }

    async fn inject_event(&self, id: SessionId, event: &TargetEvent) -> Result<(), CoreError> {
        self.sessions.get(id)?;
        let _ = event;
        Err(CoreError::unsupported(BackendKind::OpenOcd, "event injection"))
    }
}
