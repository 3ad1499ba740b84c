//! The uniform backend-adapter contract.
//!
//! Three adapter families implement this trait (QEMU, Renode, OpenOCD); the
//! session service and the co-simulation coordinator only ever talk to
//! `Arc<dyn BackendPort>`. Operations a variant cannot perform return
//! [`CoreError::Unsupported`] and never silently succeed; callers can avoid
//! the round trip entirely by consulting [`BackendPort::capabilities`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use simbench_domain::{
    BoardConfig, CapabilityDescriptor, CoreError, Session, SessionId, TargetEvent,
};

use super::console_port::ConsoleWriter;

#[async_trait]
pub trait BackendPort: Send + Sync {
    /// Static descriptor of what this adapter can do.
    fn capabilities(&self) -> CapabilityDescriptor;

    /// Launch the backend child for `session`.
    ///
    /// On success the session record has been mutated with the allocated
    /// debug/monitor ports and the child pid, the child process is alive,
    /// and the monitor channel is usable. `cancel` aborts the child if the
    /// caller goes away mid-start.
    async fn start_session(
        &self,
        session: &mut Session,
        board: &BoardConfig,
        console: Option<ConsoleWriter>,
        cancel: CancellationToken,
    ) -> Result<(), CoreError>;

    /// Terminate the child forcibly and drop all bookkeeping.
    ///
    /// Returns [`CoreError::NotFound`] when the session tag is unknown.
    async fn stop_session(&self, id: SessionId) -> Result<(), CoreError>;

    /// Reset the simulated or attached target.
    async fn reset(&self, id: SessionId) -> Result<(), CoreError>;

    /// Place a firmware image at the target.
    async fn load_program(
        &self,
        id: SessionId,
        image: &Path,
        cancel: CancellationToken,
    ) -> Result<(), CoreError>;

    /// Start target execution.
    async fn execute(&self, id: SessionId) -> Result<(), CoreError>;

    /// Halt target execution, retaining state.
    async fn pause(&self, id: SessionId) -> Result<(), CoreError>;

    /// Continue a paused target.
    async fn resume(&self, id: SessionId) -> Result<(), CoreError>;

    /// The allocated debug-bridge port for this session.
    async fn debug_port(&self, id: SessionId) -> Result<u16, CoreError>;

    /// Persist target state to `path`.
    async fn create_snapshot(&self, id: SessionId, path: &Path) -> Result<(), CoreError>;

    /// Re-materialize target state from `path`.
    async fn restore_snapshot(&self, id: SessionId, path: &Path) -> Result<(), CoreError>;

    /// Pull-style console read. Optional; the default refuses.
    async fn read_console(&self, id: SessionId) -> Result<Vec<u8>, CoreError> {
        let _ = id;
        Err(CoreError::unsupported(
            self.capabilities().backend,
            "read_console",
        ))
    }

    /// Advance the target by `count` instructions.
    async fn step(&self, id: SessionId, count: u64) -> Result<(), CoreError>;

    /// Begin coverage collection into `path`.
    async fn start_coverage(&self, id: SessionId, path: &Path) -> Result<(), CoreError>;

    /// End coverage collection.
    async fn stop_coverage(&self, id: SessionId) -> Result<(), CoreError>;

    /// Advance the target for a wall-clock span.
    ///
    /// Variants without native time advance approximate with
    /// resume/sleep/pause; the sleep honours `cancel` and returns
    /// [`CoreError::Cancelled`] when triggered.
    async fn run_for(
        &self,
        id: SessionId,
        duration: Duration,
        cancel: CancellationToken,
    ) -> Result<(), CoreError>;

    /// Apply an out-of-band stimulus to the target.
    async fn inject_event(&self, id: SessionId, event: &TargetEvent) -> Result<(), CoreError>;
}
