//! Shared fixtures for service-level tests: a recording backend adapter and
//! wiring helpers over the in-memory repositories.

use std::path::Path;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use simbench_domain::{
    BackendKind, BoardConfig, CapabilityDescriptor, CoreError, FeatureFlags, Session, SessionId,
    TargetEvent,
};

use crate::application::ports::outbound::{BackendPort, ConsoleWriter, SessionRepo};
use crate::application::services::{
    CosimService, SessionService, SessionServiceConfig,
};
use crate::infrastructure::backends::BackendRegistry;
use crate::infrastructure::persistence::memory::{
    MemoryCosimRepo, MemoryProgramRepo, MemorySessionRepo, MemorySnapshotRepo,
};

/// Monotonic fake port assignment, so live sessions get distinct pairs.
static NEXT_PORT: AtomicU16 = AtomicU16::new(41_000);

#[derive(Default)]
pub struct Counters {
    start: AtomicUsize,
    stop: AtomicUsize,
    reset: AtomicUsize,
    load: AtomicUsize,
    execute: AtomicUsize,
    pause: AtomicUsize,
    resume: AtomicUsize,
    snapshot_create: AtomicUsize,
    snapshot_restore: AtomicUsize,
    step: AtomicUsize,
    coverage_start: AtomicUsize,
    coverage_stop: AtomicUsize,
    run_for: AtomicUsize,
    inject: AtomicUsize,
}

macro_rules! counter_reader {
    ($($name:ident),* $(,)?) => {
        $(pub fn $name(&self) -> usize {
            self.$name.load(Ordering::SeqCst)
        })*
    };
}

impl Counters {
    counter_reader!(
        start, stop, reset, load, execute, pause, resume, snapshot_create, snapshot_restore,
        step, coverage_start, coverage_stop, run_for, inject,
    );
}

/// Adapter double that records every call and succeeds unless a capability
/// was switched off.
pub struct RecordingBackend {
    kind: BackendKind,
    features: FeatureFlags,
    pub counters: Counters,
    last_injected: Mutex<Option<(SessionId, TargetEvent)>>,
}

impl RecordingBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            features: FeatureFlags {
                snapshot: true,
                step: true,
                coverage: true,
                event_injection: true,
                native_run_for: false,
            },
            counters: Counters::default(),
            last_injected: Mutex::new(None),
        }
    }

    pub fn without_snapshot(mut self) -> Self {
        self.features.snapshot = false;
        self
    }

    pub fn without_step(mut self) -> Self {
        self.features.step = false;
        self
    }

    pub async fn last_injected(&self) -> Option<(SessionId, TargetEvent)> {
        self.last_injected.lock().await.clone()
    }
}

#[async_trait]
impl BackendPort for RecordingBackend {
    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            backend: self.kind,
            processors: vec!["mock".to_string()],
            peripherals: vec![],
            buses: vec![],
            features: self.features,
            boards: vec!["test-board".to_string()],
        }
    }

    async fn start_session(
        &self,
        session: &mut Session,
        _board: &BoardConfig,
        _console: Option<ConsoleWriter>,
        _cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        self.counters.start.fetch_add(1, Ordering::SeqCst);
        let debug = NEXT_PORT.fetch_add(1, Ordering::SeqCst);
        let monitor = NEXT_PORT.fetch_add(1, Ordering::SeqCst);
        session.attach_child(debug, monitor, Some(4242));
        Ok(())
    }

    async fn stop_session(&self, _id: SessionId) -> Result<(), CoreError> {
        self.counters.stop.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self, _id: SessionId) -> Result<(), CoreError> {
        self.counters.reset.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_program(
        &self,
        _id: SessionId,
        _image: &Path,
        _cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        self.counters.load.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, _id: SessionId) -> Result<(), CoreError> {
        self.counters.execute.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self, _id: SessionId) -> Result<(), CoreError> {
        self.counters.pause.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self, _id: SessionId) -> Result<(), CoreError> {
        self.counters.resume.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn debug_port(&self, _id: SessionId) -> Result<u16, CoreError> {
        Ok(4431)
    }

    async fn create_snapshot(&self, _id: SessionId, _path: &Path) -> Result<(), CoreError> {
        self.counters.snapshot_create.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn restore_snapshot(&self, _id: SessionId, _path: &Path) -> Result<(), CoreError> {
        self.counters.snapshot_restore.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn step(&self, _id: SessionId, _count: u64) -> Result<(), CoreError> {
        self.counters.step.fetch_add(1, Ordering::SeqCst);
        if !self.features.step {
            return Err(CoreError::unsupported(self.kind, "step"));
        }
        Ok(())
    }

    async fn start_coverage(&self, _id: SessionId, _path: &Path) -> Result<(), CoreError> {
        self.counters.coverage_start.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_coverage(&self, _id: SessionId) -> Result<(), CoreError> {
        self.counters.coverage_stop.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run_for(
        &self,
        _id: SessionId,
        duration: Duration,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        self.counters.run_for.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
        }
    }

    async fn inject_event(&self, id: SessionId, event: &TargetEvent) -> Result<(), CoreError> {
        self.counters.inject.fetch_add(1, Ordering::SeqCst);
        *self.last_injected.lock().await = Some((id, event.clone()));
        Ok(())
    }
}

pub fn service_with(backends: Vec<Arc<RecordingBackend>>, cap: usize) -> SessionService {
    service_with_repo(backends, cap, Arc::new(MemorySessionRepo::new()))
}

pub fn service_with_repo(
    backends: Vec<Arc<RecordingBackend>>,
    cap: usize,
    repo: Arc<dyn SessionRepo>,
) -> SessionService {
    let mut registry = BackendRegistry::new();
    for backend in backends {
        registry.register(backend);
    }
    SessionService::new(
        Arc::new(registry),
        repo,
        Arc::new(MemoryProgramRepo::new()),
        Arc::new(MemorySnapshotRepo::new()),
        None,
        SessionServiceConfig {
            max_sessions: cap,
            data_dir: std::env::temp_dir().join("simbench-test-data"),
        },
    )
}

pub fn cosim_service_over(sessions: Arc<SessionService>) -> CosimService {
    CosimService::new(sessions, Arc::new(MemoryCosimRepo::new()))
}
