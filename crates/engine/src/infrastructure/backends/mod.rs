//! Backend adapters: QEMU, Renode, and OpenOCD realizations of the uniform
//! adapter contract.

pub mod openocd;
pub mod process;
pub mod qemu;
pub mod renode;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use simbench_domain::{BackendKind, CapabilityDescriptor, CoreError};

use crate::application::ports::outbound::BackendPort;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::net::MonitorChannel;

pub use openocd::OpenOcdAdapter;
pub use qemu::QemuAdapter;
pub use renode::RenodeAdapter;

/// Adapter lookup by backend kind. Adapters outlive individual sessions and
/// are shared by reference across the services.
pub struct BackendRegistry {
    adapters: HashMap<BackendKind, Arc<dyn BackendPort>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// The production registry: all three adapter families.
    pub fn with_defaults(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(QemuAdapter::new(qemu::QemuSettings {
            binary: config.qemu_binary.clone(),
            gdb_binary: config.gdb_binary.clone(),
            work_root: config.data_dir.join("qemu"),
        })));
        registry.register(Arc::new(RenodeAdapter::new(renode::RenodeSettings {
            binary: config.renode_binary.clone(),
            script_root: config.data_dir.join("renode"),
        })));
        registry.register(Arc::new(OpenOcdAdapter::new(openocd::OpenOcdSettings {
            binary: config.openocd_binary.clone(),
            probe: config.openocd_probe.clone(),
        })));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn BackendPort>) {
        self.adapters
            .insert(adapter.capabilities().backend, adapter);
    }

    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn BackendPort>, CoreError> {
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or(CoreError::BackendUnknown(kind))
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        let mut descriptors: Vec<_> = self
            .adapters
            .values()
            .map(|adapter| adapter.capabilities())
            .collect();
        descriptors.sort_by_key(|d| d.backend.to_string());
        descriptors
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resume/sleep/pause approximation of run-for, used by the variants without
/// native time advance. The sleep honours caller cancellation; on cancel the
/// target is halted best-effort and `Cancelled` is returned.
pub(crate) async fn run_span_with_sleep(
    monitor: &MonitorChannel,
    resume_cmd: &str,
    pause_cmd: &str,
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    monitor.send_line(resume_cmd).await?;
    tokio::select! {
        _ = tokio::time::sleep(duration) => monitor.send_line(pause_cmd).await,
        _ = cancel.cancelled() => {
            let _ = monitor.send_line(pause_cmd).await;
            Err(CoreError::Cancelled)
        }
    }
}
