//! Engine configuration, loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Runtime configuration for the engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port for the HTTP/WebSocket API.
    pub server_port: u16,
    /// SQLite URL for durable records; `None` keeps records in memory only.
    pub database_url: Option<String>,
    /// Base directory for programs, snapshots, and coverage traces.
    pub data_dir: PathBuf,
    /// Concurrent-session cap.
    pub max_sessions: usize,
    /// HTTP drain bound during shutdown.
    pub shutdown_grace: Duration,
    pub qemu_binary: String,
    /// Symbolic debugger invoked in batch mode for QEMU program load.
    pub gdb_binary: String,
    pub renode_binary: String,
    pub openocd_binary: String,
    /// Probe interface config name for the hardware-debug daemon.
    pub openocd_probe: String,
}

impl AppConfig {
    /// Read `SIMBENCH_*` variables, applying defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server_port: env_parse("SIMBENCH_PORT", 8080)?,
            database_url: std::env::var("SIMBENCH_DATABASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            data_dir: PathBuf::from(env_or("SIMBENCH_DATA_DIR", "./data")),
            max_sessions: env_parse("SIMBENCH_MAX_SESSIONS", 16)?,
            shutdown_grace: Duration::from_secs(env_parse("SIMBENCH_SHUTDOWN_GRACE_SECONDS", 5)?),
            qemu_binary: env_or("SIMBENCH_QEMU_BIN", "qemu-system-arm"),
            gdb_binary: env_or("SIMBENCH_GDB_BIN", "gdb-multiarch"),
            renode_binary: env_or("SIMBENCH_RENODE_BIN", "renode"),
            openocd_binary: env_or("SIMBENCH_OPENOCD_BIN", "openocd"),
            openocd_probe: env_or("SIMBENCH_OPENOCD_PROBE", "cmsis-dap"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}
