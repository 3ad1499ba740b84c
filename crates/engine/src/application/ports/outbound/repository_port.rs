//! Durable-store port traits.
//!
//! The core treats persistence as an external collaborator: repositories
//! commit after successful side effects, and the services compensate when a
//! commit fails. Errors surface as [`CoreError::Persist`].

use async_trait::async_trait;

use simbench_domain::{
    CoreError, CosimSession, CosimSessionId, Program, ProgramId, Session, SessionId, Snapshot,
    SnapshotId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), CoreError>;
    async fn update(&self, session: &Session) -> Result<(), CoreError>;
    async fn get(&self, id: SessionId) -> Result<Option<Session>, CoreError>;
    /// Page of sessions ordered by creation time, plus the total count.
    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<Session>, u64), CoreError>;
    async fn delete(&self, id: SessionId) -> Result<(), CoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgramRepo: Send + Sync {
    async fn insert(&self, program: &Program) -> Result<(), CoreError>;
    async fn get(&self, id: ProgramId) -> Result<Option<Program>, CoreError>;
    async fn list(&self) -> Result<Vec<Program>, CoreError>;
    async fn delete(&self, id: ProgramId) -> Result<(), CoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotRepo: Send + Sync {
    async fn insert(&self, snapshot: &Snapshot) -> Result<(), CoreError>;
    async fn get(&self, id: SnapshotId) -> Result<Option<Snapshot>, CoreError>;
    async fn list_for_session(&self, session_id: SessionId) -> Result<Vec<Snapshot>, CoreError>;
    async fn delete(&self, id: SnapshotId) -> Result<(), CoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CosimRepo: Send + Sync {
    async fn insert(&self, group: &CosimSession) -> Result<(), CoreError>;
    /// Rewrites the group row (status, counters) and member statuses.
    async fn update(&self, group: &CosimSession) -> Result<(), CoreError>;
    async fn get(&self, id: CosimSessionId) -> Result<Option<CosimSession>, CoreError>;
    async fn delete(&self, id: CosimSessionId) -> Result<(), CoreError>;
}
