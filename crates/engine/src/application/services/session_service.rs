//! Session orchestration.
//!
//! Holds the in-memory index of live sessions, enforces the configured cap,
//! and composes the backend adapters, the durable store, and the console
//! fan-out. The index is authoritative for live sessions; the durable record
//! is a write-through copy committed after every state change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use simbench_domain::{
    BoardConfig, CapabilityDescriptor, CoreError, ProgramId, Session, SessionId, SessionState,
    Snapshot, SnapshotId,
};

use crate::application::ports::outbound::{
    BackendPort, ConsolePort, ConsoleWriter, ProgramRepo, SessionRepo, SnapshotRepo,
};
use crate::infrastructure::backends::BackendRegistry;

#[derive(Debug, Clone)]
pub struct SessionServiceConfig {
    /// Concurrent-session cap; never exceeded, reservations included.
    pub max_sessions: usize,
    /// Base directory for snapshots and coverage traces.
    pub data_dir: PathBuf,
}

/// Parameters for creating a session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub name: String,
    pub backend: simbench_domain::BackendKind,
    pub board: BoardConfig,
    pub owner: Option<String>,
}

struct SessionIndex {
    live: HashMap<SessionId, Session>,
    /// Create-slots handed out but not yet resolved; counted against the cap
    /// so a burst of concurrent creates cannot overshoot it.
    reserved: usize,
}

pub struct SessionService {
    backends: Arc<BackendRegistry>,
    repo: Arc<dyn SessionRepo>,
    programs: Arc<dyn ProgramRepo>,
    snapshots: Arc<dyn SnapshotRepo>,
    console: Option<Arc<dyn ConsolePort>>,
    index: RwLock<SessionIndex>,
    config: SessionServiceConfig,
}

impl SessionService {
    pub fn new(
        backends: Arc<BackendRegistry>,
        repo: Arc<dyn SessionRepo>,
        programs: Arc<dyn ProgramRepo>,
        snapshots: Arc<dyn SnapshotRepo>,
        console: Option<Arc<dyn ConsolePort>>,
        config: SessionServiceConfig,
    ) -> Self {
        Self {
            backends,
            repo,
            programs,
            snapshots,
            console,
            index: RwLock::new(SessionIndex {
                live: HashMap::new(),
                reserved: 0,
            }),
            config,
        }
    }

    pub fn capabilities(&self) -> Vec<CapabilityDescriptor> {
        self.backends.descriptors()
    }

    /// Create a session: reserve a cap slot, start the backend unlocked,
    /// then commit to the index.
    pub async fn create(
        &self,
        request: CreateSession,
        cancel: CancellationToken,
    ) -> Result<Session, CoreError> {
        let adapter = self.backends.get(request.backend)?;

        {
            let mut index = self.index.write().await;
            if index.live.len() + index.reserved >= self.config.max_sessions {
                tracing::warn!(
                    cap = self.config.max_sessions,
                    "session create refused: capacity exhausted"
                );
                return Err(CoreError::CapacityExhausted);
            }
            index.reserved += 1;
        }

        // The reservation participates in the cap while the adapter start
        // runs without the lock.
        let started = self.start_new(adapter, request, cancel).await;

        let mut index = self.index.write().await;
        index.reserved -= 1;
        let session = started?;
        index.live.insert(session.id, session.clone());
        tracing::info!(
            session_id = %session.id,
            backend = %session.backend,
            debug_port = session.debug_port,
            monitor_port = session.monitor_port,
            "session created"
        );
        Ok(session)
    }

    async fn start_new(
        &self,
        adapter: Arc<dyn BackendPort>,
        request: CreateSession,
        cancel: CancellationToken,
    ) -> Result<Session, CoreError> {
        let blob = serde_json::to_string(&request.board)
            .map_err(|e| CoreError::internal(format!("board config serialization: {e}")))?;
        let mut session = Session::new(
            request.name,
            request.backend,
            blob,
            request.owner,
            Utc::now(),
        );

        let writer = self
            .console
            .as_ref()
            .map(|port| ConsoleWriter::new(port.clone(), session.id));

        adapter
            .start_session(&mut session, &request.board, writer, cancel)
            .await?;
        session.transition_to(SessionState::Running, Utc::now())?;

        if let Err(persist_err) = self.repo.insert(&session).await {
            tracing::error!(
                session_id = %session.id,
                error = %persist_err,
                "session commit failed; stopping backend"
            );
            if let Err(stop_err) = adapter.stop_session(session.id).await {
                tracing::warn!(
                    session_id = %session.id,
                    error = %stop_err,
                    "compensating stop failed"
                );
            }
            return Err(persist_err);
        }
        Ok(session)
    }

    /// Memory first, durable fallback.
    pub async fn get(&self, id: SessionId) -> Result<Session, CoreError> {
        if let Some(session) = self.index.read().await.live.get(&id) {
            return Ok(session.clone());
        }
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("session", id))
    }

    /// Page of sessions plus the total count.
    pub async fn list(&self, page: u32, page_size: u32) -> Result<(Vec<Session>, u64), CoreError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 200);
        let offset = u64::from(page - 1) * u64::from(page_size);
        self.repo.list(offset, u64::from(page_size)).await
    }

    /// Stop the backend when live, then delete the durable record.
    pub async fn delete(&self, id: SessionId) -> Result<(), CoreError> {
        let live = self.index.read().await.live.get(&id).cloned();
        match live {
            Some(session) => {
                let adapter = self.backends.get(session.backend)?;
                adapter.stop_session(id).await?;
                self.index.write().await.live.remove(&id);
                self.repo.delete(id).await?;
                tracing::info!(session_id = %id, "session deleted");
                Ok(())
            }
            None => match self.repo.get(id).await? {
                Some(_) => self.repo.delete(id).await,
                None => Err(CoreError::not_found("session", id)),
            },
        }
    }

    /// Resolve a live session and its adapter.
    pub async fn resolve_live(
        &self,
        id: SessionId,
    ) -> Result<(Session, Arc<dyn BackendPort>), CoreError> {
        let session = self
            .index
            .read()
            .await
            .live
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("session", id))?;
        let adapter = self.backends.get(session.backend)?;
        Ok((session, adapter))
    }

    pub async fn power_on(&self, id: SessionId) -> Result<Session, CoreError> {
        let (session, adapter) = self.resolve_live(id).await?;
        adapter.execute(id).await?;
        if session.state == SessionState::Running {
            return Ok(session);
        }
        self.commit_state(session, SessionState::Running).await
    }

    pub async fn power_off(&self, id: SessionId) -> Result<Session, CoreError> {
        let (session, adapter) = self.resolve_live(id).await?;
        adapter.pause(id).await?;
        self.commit_state(session, SessionState::Stopped).await
    }

    pub async fn reset(&self, id: SessionId) -> Result<(), CoreError> {
        let (_, adapter) = self.resolve_live(id).await?;
        adapter.reset(id).await
    }

    pub async fn pause(&self, id: SessionId) -> Result<Session, CoreError> {
        let (session, adapter) = self.resolve_live(id).await?;
        adapter.pause(id).await?;
        self.commit_state(session, SessionState::Paused).await
    }

    pub async fn resume(&self, id: SessionId) -> Result<Session, CoreError> {
        let (session, adapter) = self.resolve_live(id).await?;
        adapter.resume(id).await?;
        self.commit_state(session, SessionState::Running).await
    }

    pub async fn load_program(
        &self,
        id: SessionId,
        program_id: ProgramId,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        let (_, adapter) = self.resolve_live(id).await?;
        let program = self
            .programs
            .get(program_id)
            .await?
            .ok_or_else(|| CoreError::not_found("program", program_id))?;
        tracing::info!(session_id = %id, program_id = %program_id, "loading program");
        adapter
            .load_program(id, Path::new(&program.path), cancel)
            .await
    }

    pub async fn create_snapshot(
        &self,
        id: SessionId,
        name: String,
        description: String,
    ) -> Result<Snapshot, CoreError> {
        let (session, adapter) = self.resolve_live(id).await?;
        let caps = adapter.capabilities();
        if !caps.features.snapshot {
            return Err(CoreError::unsupported(caps.backend, "snapshot"));
        }

        let dir = self.config.data_dir.join("snapshots");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::internal(format!("snapshot dir: {e}")))?;
        let snapshot_id = SnapshotId::new();
        let path = dir.join(snapshot_id.to_string());
        let snapshot = Snapshot::new(
            snapshot_id,
            session.id,
            name,
            description,
            path.display().to_string(),
            Utc::now(),
        );

        adapter.create_snapshot(id, &path).await?;

        if let Err(persist_err) = self.snapshots.insert(&snapshot).await {
            // Compensate: the capture exists on disk but its record does not.
            if let Err(fs_err) = tokio::fs::remove_file(&path).await {
                tracing::debug!(path = %path.display(), error = %fs_err, "snapshot unlink failed");
            }
            return Err(persist_err);
        }
        Ok(snapshot)
    }

    pub async fn restore_snapshot(
        &self,
        id: SessionId,
        snapshot_id: SnapshotId,
    ) -> Result<(), CoreError> {
        let (_, adapter) = self.resolve_live(id).await?;
        let caps = adapter.capabilities();
        if !caps.features.snapshot {
            return Err(CoreError::unsupported(caps.backend, "snapshot restore"));
        }
        let snapshot = self
            .snapshots
            .get(snapshot_id)
            .await?
            .filter(|s| s.session_id == id)
            .ok_or_else(|| CoreError::not_found("snapshot", snapshot_id))?;
        adapter.restore_snapshot(id, Path::new(&snapshot.path)).await
    }

    pub async fn list_snapshots(&self, id: SessionId) -> Result<Vec<Snapshot>, CoreError> {
        // The session must exist, live or not.
        self.get(id).await?;
        self.snapshots.list_for_session(id).await
    }

    /// Begin coverage collection; returns the trace path.
    pub async fn start_coverage(&self, id: SessionId) -> Result<PathBuf, CoreError> {
        let (_, adapter) = self.resolve_live(id).await?;
        let caps = adapter.capabilities();
        if !caps.features.coverage {
            return Err(CoreError::unsupported(caps.backend, "coverage"));
        }
        let dir = self.config.data_dir.join("coverage");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::internal(format!("coverage dir: {e}")))?;
        let path = dir.join(format!("{id}.trace"));
        adapter.start_coverage(id, &path).await?;
        Ok(path)
    }

    pub async fn stop_coverage(&self, id: SessionId) -> Result<(), CoreError> {
        let (_, adapter) = self.resolve_live(id).await?;
        adapter.stop_coverage(id).await
    }

    pub async fn debug_port(&self, id: SessionId) -> Result<u16, CoreError> {
        let (_, adapter) = self.resolve_live(id).await?;
        adapter.debug_port(id).await
    }

    /// Stop every live session; used at shutdown.
    pub async fn shutdown_all(&self) {
        let sessions: Vec<Session> = self.index.read().await.live.values().cloned().collect();
        for session in sessions {
            if let Ok(adapter) = self.backends.get(session.backend) {
                if let Err(e) = adapter.stop_session(session.id).await {
                    tracing::debug!(session_id = %session.id, error = %e, "shutdown stop failed");
                }
            }
        }
        self.index.write().await.live.clear();
    }

    async fn commit_state(
        &self,
        mut session: Session,
        next: SessionState,
    ) -> Result<Session, CoreError> {
        session.transition_to(next, Utc::now())?;
        self.repo.update(&session).await?;
        self.index
            .write()
            .await
            .live
            .insert(session.id, session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbench_domain::BackendKind;

    use crate::application::ports::outbound::MockSessionRepo;
    use crate::infrastructure::persistence::memory::MemorySessionRepo;
    use crate::test_fixtures::{service_with, service_with_repo, RecordingBackend};

    fn request(name: &str, backend: BackendKind) -> CreateSession {
        CreateSession {
            name: name.to_string(),
            backend,
            board: BoardConfig::named("test-board"),
            owner: None,
        }
    }

    #[tokio::test]
    async fn capacity_cap_refuses_the_second_create() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let service = service_with(vec![backend], 1);

        service
            .create(request("a", BackendKind::Qemu), CancellationToken::new())
            .await
            .expect("first create");
        let err = service
            .create(request("b", BackendKind::Qemu), CancellationToken::new())
            .await
            .expect_err("second create must be refused");
        assert!(matches!(err, CoreError::CapacityExhausted));
    }

    #[tokio::test]
    async fn board_config_round_trips_through_the_record() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let service = service_with(vec![backend], 10);

        let created = service
            .create(request("a", BackendKind::Qemu), CancellationToken::new())
            .await
            .expect("create");
        let fetched = service.get(created.id).await.expect("get");
        let board: BoardConfig =
            serde_json::from_str(&fetched.board_config).expect("deserialize blob");
        assert_eq!(board, BoardConfig::named("test-board"));
    }

    #[tokio::test]
    async fn power_lifecycle_forwards_to_the_adapter() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let service = service_with(vec![backend.clone()], 10);

        let session = service
            .create(request("a", BackendKind::Qemu), CancellationToken::new())
            .await
            .expect("create");

        service.power_on(session.id).await.expect("power on");
        assert_eq!(backend.counters.execute(), 1);

        service.power_off(session.id).await.expect("power off");
        assert_eq!(backend.counters.pause(), 1);

        service.reset(session.id).await.expect("reset");
        assert_eq!(backend.counters.reset(), 1);
    }

    #[tokio::test]
    async fn delete_cascades_stop_and_forgets_the_session() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let service = service_with(vec![backend.clone()], 10);

        let session = service
            .create(request("a", BackendKind::Qemu), CancellationToken::new())
            .await
            .expect("create");
        service.delete(session.id).await.expect("delete");

        assert!(backend.counters.stop() >= 1);
        assert!(service
            .get(session.id)
            .await
            .expect_err("must be gone")
            .is_not_found());
    }

    #[tokio::test]
    async fn live_sessions_have_distinct_nonzero_ports() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let service = service_with(vec![backend], 10);

        let a = service
            .create(request("a", BackendKind::Qemu), CancellationToken::new())
            .await
            .expect("create a");
        let b = service
            .create(request("b", BackendKind::Qemu), CancellationToken::new())
            .await
            .expect("create b");

        for s in [&a, &b] {
            assert_ne!(s.debug_port, 0);
            assert_ne!(s.monitor_port, 0);
            assert_eq!(s.state, SessionState::Running);
        }
        let mut ports = vec![a.debug_port, a.monitor_port, b.debug_port, b.monitor_port];
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), 4, "ports must be pairwise distinct");
    }

    #[tokio::test]
    async fn failed_durable_commit_stops_the_backend_and_frees_the_slot() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Qemu));

        let mut repo = MockSessionRepo::new();
        repo.expect_insert()
            .times(1)
            .returning(|_| Err(CoreError::persist("disk full")));
        let service = service_with_repo(vec![backend.clone()], 1, Arc::new(repo));

        let err = service
            .create(request("a", BackendKind::Qemu), CancellationToken::new())
            .await
            .expect_err("create must surface the persist error");
        assert!(matches!(err, CoreError::Persist(_)));
        assert_eq!(backend.counters.stop(), 1, "compensating stop must run");

        // The reservation was released: the cap slot is usable again.
        let index = service.index.read().await;
        assert_eq!(index.live.len(), 0);
        assert_eq!(index.reserved, 0);
    }

    #[tokio::test]
    async fn snapshot_is_refused_at_the_boundary_without_the_capability() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::OpenOcd).without_snapshot());
        let service = service_with(vec![backend.clone()], 10);

        let session = service
            .create(request("hw", BackendKind::OpenOcd), CancellationToken::new())
            .await
            .expect("create");
        let err = service
            .create_snapshot(session.id, "s1".into(), String::new())
            .await
            .expect_err("must be unsupported");
        assert!(err.is_unsupported());
        assert_eq!(
            backend.counters.snapshot_create(),
            0,
            "the adapter must not be dialed for an unsupported operation"
        );
    }

    #[tokio::test]
    async fn load_program_requires_an_existing_program_record() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Renode));
        let service = service_with(vec![backend], 10);

        let session = service
            .create(request("a", BackendKind::Renode), CancellationToken::new())
            .await
            .expect("create");
        let err = service
            .load_program(session.id, ProgramId::new(), CancellationToken::new())
            .await
            .expect_err("unknown program");
        assert!(matches!(err, CoreError::NotFound { entity: "program", .. }));
    }

    #[tokio::test]
    async fn unknown_backend_kind_is_refused_before_reservation() {
        let service = service_with(vec![], 10);
        let err = service
            .create(request("a", BackendKind::Renode), CancellationToken::new())
            .await
            .expect_err("no adapter registered");
        assert!(matches!(err, CoreError::BackendUnknown(BackendKind::Renode)));
    }

    #[tokio::test]
    async fn get_falls_back_to_the_durable_store() {
        let repo = Arc::new(MemorySessionRepo::new());
        let service = service_with_repo(vec![], 10, repo.clone());

        // A session that is no longer live, only durable.
        let session = Session::new(
            "cold",
            BackendKind::Qemu,
            "{}".to_string(),
            None,
            Utc::now(),
        );
        repo.insert(&session).await.expect("seed");

        let fetched = service.get(session.id).await.expect("durable fallback");
        assert_eq!(fetched.id, session.id);
    }
}
