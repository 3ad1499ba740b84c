//! In-memory implementations of the repository ports.
//!
//! Back the engine when no database is configured, and keep the unit tests
//! free of I/O. Same contract as the sqlite repositories.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use simbench_domain::{
    CoreError, CosimSession, CosimSessionId, Program, ProgramId, Session, SessionId, Snapshot,
    SnapshotId,
};

use crate::application::ports::outbound::{CosimRepo, ProgramRepo, SessionRepo, SnapshotRepo};

#[derive(Default)]
pub struct MemorySessionRepo {
    rows: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepo for MemorySessionRepo {
    async fn insert(&self, session: &Session) -> Result<(), CoreError> {
        self.rows.write().await.insert(session.id, session.clone());
        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<(), CoreError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&session.id) {
            return Err(CoreError::persist(format!(
                "session row missing for update: {}",
                session.id
            )));
        }
        rows.insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>, CoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<Session>, u64), CoreError> {
        let rows = self.rows.read().await;
        let mut sessions: Vec<_> = rows.values().cloned().collect();
        sessions.sort_by_key(|s| s.created_at);
        let total = sessions.len() as u64;
        let page = sessions
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn delete(&self, id: SessionId) -> Result<(), CoreError> {
        self.rows.write().await.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryProgramRepo {
    rows: RwLock<HashMap<ProgramId, Program>>,
}

impl MemoryProgramRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgramRepo for MemoryProgramRepo {
    async fn insert(&self, program: &Program) -> Result<(), CoreError> {
        self.rows.write().await.insert(program.id, program.clone());
        Ok(())
    }

    async fn get(&self, id: ProgramId) -> Result<Option<Program>, CoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Program>, CoreError> {
        let rows = self.rows.read().await;
        let mut programs: Vec<_> = rows.values().cloned().collect();
        programs.sort_by_key(|p| p.created_at);
        Ok(programs)
    }

    async fn delete(&self, id: ProgramId) -> Result<(), CoreError> {
        self.rows.write().await.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySnapshotRepo {
    rows: RwLock<HashMap<SnapshotId, Snapshot>>,
}

impl MemorySnapshotRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotRepo for MemorySnapshotRepo {
    async fn insert(&self, snapshot: &Snapshot) -> Result<(), CoreError> {
        self.rows.write().await.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn get(&self, id: SnapshotId) -> Result<Option<Snapshot>, CoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_for_session(&self, session_id: SessionId) -> Result<Vec<Snapshot>, CoreError> {
        let rows = self.rows.read().await;
        let mut snapshots: Vec<_> = rows
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.created_at);
        Ok(snapshots)
    }

    async fn delete(&self, id: SnapshotId) -> Result<(), CoreError> {
        self.rows.write().await.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCosimRepo {
    rows: RwLock<HashMap<CosimSessionId, CosimSession>>,
}

impl MemoryCosimRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CosimRepo for MemoryCosimRepo {
    async fn insert(&self, group: &CosimSession) -> Result<(), CoreError> {
        self.rows.write().await.insert(group.id, group.clone());
        Ok(())
    }

    async fn update(&self, group: &CosimSession) -> Result<(), CoreError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&group.id) {
            return Err(CoreError::persist(format!(
                "co-sim row missing for update: {}",
                group.id
            )));
        }
        rows.insert(group.id, group.clone());
        Ok(())
    }

    async fn get(&self, id: CosimSessionId) -> Result<Option<CosimSession>, CoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: CosimSessionId) -> Result<(), CoreError> {
        self.rows.write().await.remove(&id);
        Ok(())
    }
}
