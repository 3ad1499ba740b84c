//! Co-simulation coordination.
//!
//! Groups sessions and drives them through three synchronization schemes:
//! serial instruction fan-out (step), parallel wall-clock advance (time),
//! and targeted event injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use simbench_domain::{
    CoreError, CosimMemberId, CosimSession, CosimSessionId, CosimStatus, TargetEvent,
};
use simbench_shared::CosimMemberSpec;

use crate::application::ports::outbound::CosimRepo;
use crate::application::services::session_service::SessionService;

pub struct CosimService {
    sessions: Arc<SessionService>,
    repo: Arc<dyn CosimRepo>,
    groups: RwLock<HashMap<CosimSessionId, CosimSession>>,
}

impl CosimService {
    pub fn new(sessions: Arc<SessionService>, repo: Arc<dyn CosimRepo>) -> Self {
        Self {
            sessions,
            repo,
            groups: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, members: Vec<CosimMemberSpec>) -> Result<CosimSession, CoreError> {
        let mut group = CosimSession::new(Utc::now());
        for spec in members {
            let config = spec
                .config
                .map(|value| value.to_string())
                .unwrap_or_default();
            group.add_member(spec.backend, spec.session_id, config);
        }
        self.repo.insert(&group).await?;
        self.groups.write().await.insert(group.id, group.clone());
        tracing::info!(
            cosim_id = %group.id,
            members = group.members.len(),
            "co-sim group created"
        );
        Ok(group)
    }

    pub async fn get(&self, id: CosimSessionId) -> Result<CosimSession, CoreError> {
        if let Some(group) = self.groups.read().await.get(&id) {
            return Ok(group.clone());
        }
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("co-sim session", id))
    }

    pub async fn delete(&self, id: CosimSessionId) -> Result<(), CoreError> {
        let was_live = self.groups.write().await.remove(&id).is_some();
        match self.repo.get(id).await? {
            Some(_) => self.repo.delete(id).await,
            None if was_live => Ok(()),
            None => Err(CoreError::not_found("co-sim session", id)),
        }
    }

    /// Mark the group Running. Does not power on member sessions.
    pub async fn start(&self, id: CosimSessionId) -> Result<CosimSession, CoreError> {
        self.ensure_loaded(id).await?;
        let updated = {
            let mut groups = self.groups.write().await;
            let group = groups
                .get_mut(&id)
                .ok_or_else(|| CoreError::not_found("co-sim session", id))?;
            match group.status {
                CosimStatus::Created => {
                    group.status = CosimStatus::Running;
                    group.started_at = Some(Utc::now());
                }
                CosimStatus::Running => {}
                CosimStatus::Stopped => {
                    return Err(CoreError::internal("co-sim group already stopped"));
                }
            }
            group.clone()
        };
        self.repo.update(&updated).await?;
        Ok(updated)
    }

    pub async fn stop(&self, id: CosimSessionId) -> Result<CosimSession, CoreError> {
        self.ensure_loaded(id).await?;
        let updated = {
            let mut groups = self.groups.write().await;
            let group = groups
                .get_mut(&id)
                .ok_or_else(|| CoreError::not_found("co-sim session", id))?;
            group.status = CosimStatus::Stopped;
            group.clone()
        };
        self.repo.update(&updated).await?;
        Ok(updated)
    }

    /// Instruction fan-out: step every bound member serially, swallowing
    /// per-member errors (some variants have no native step). Counters are
    /// credited once per call.
    pub async fn sync_step(
        &self,
        id: CosimSessionId,
        steps: u64,
    ) -> Result<CosimSession, CoreError> {
        let group = self.ensure_loaded(id).await?;
        if group.status != CosimStatus::Running {
            return Err(CoreError::NotRunning);
        }

        for member in &group.members {
            let Some(session_id) = member.session_id else {
                continue;
            };
            match self.sessions.resolve_live(session_id).await {
                Ok((_, adapter)) => {
                    if let Err(e) = adapter.step(session_id, steps).await {
                        tracing::debug!(
                            member_id = %member.id,
                            session_id = %session_id,
                            error = %e,
                            "member step ignored"
                        );
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        member_id = %member.id,
                        error = %e,
                        "member session unavailable for step"
                    );
                }
            }
        }

        let updated = self.credit(id, |group| group.credit_steps(steps)).await?;
        self.repo.update(&updated).await?;
        Ok(updated)
    }

    /// Time-slice advance: fan out run-for across members in parallel, wait
    /// for all, and return the first error without cancelling siblings.
    pub async fn sync_time(
        &self,
        id: CosimSessionId,
        duration_ns: u64,
    ) -> Result<CosimSession, CoreError> {
        let group = self.ensure_loaded(id).await?;
        if group.status != CosimStatus::Running {
            return Err(CoreError::NotRunning);
        }

        let duration = Duration::from_nanos(duration_ns);
        let mut tasks = JoinSet::new();
        for member in &group.members {
            let Some(session_id) = member.session_id else {
                continue;
            };
            let sessions = self.sessions.clone();
            tasks.spawn(async move {
                let (_, adapter) = sessions.resolve_live(session_id).await?;
                adapter
                    .run_for(session_id, duration, CancellationToken::new())
                    .await
            });
        }

        let mut first_error: Option<CoreError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .unwrap_or_else(|e| Err(CoreError::internal(format!("run-for task: {e}"))));
            if let Err(e) = outcome {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        let updated = self
            .credit(id, |group| group.credit_time(duration_ns))
            .await?;
        self.repo.update(&updated).await?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(updated),
        }
    }

    /// Targeted event injection: resolve the member, require a bound
    /// session, delegate to its adapter with the typed payload.
    pub async fn inject_event(
        &self,
        id: CosimSessionId,
        member_id: CosimMemberId,
        event: &TargetEvent,
    ) -> Result<(), CoreError> {
        let group = self.ensure_loaded(id).await?;
        if group.status != CosimStatus::Running {
            return Err(CoreError::NotRunning);
        }
        let member = group
            .member(member_id)
            .ok_or_else(|| CoreError::not_found("co-sim member", member_id))?;
        let session_id = member
            .session_id
            .ok_or_else(|| CoreError::not_found("session", format!("unbound member {member_id}")))?;

        let (_, adapter) = self.sessions.resolve_live(session_id).await?;
        let caps = adapter.capabilities();
        if !caps.features.event_injection {
            return Err(CoreError::unsupported(caps.backend, "event injection"));
        }
        tracing::debug!(
            cosim_id = %id,
            member_id = %member_id,
            session_id = %session_id,
            event = event.kind(),
            "injecting event"
        );
        adapter.inject_event(session_id, event).await
    }

    /// Load a group into the in-memory index if only the durable copy
    /// exists, returning the indexed value.
    async fn ensure_loaded(&self, id: CosimSessionId) -> Result<CosimSession, CoreError> {
        if let Some(group) = self.groups.read().await.get(&id) {
            return Ok(group.clone());
        }
        let group = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("co-sim session", id))?;
        let mut groups = self.groups.write().await;
        Ok(groups.entry(id).or_insert(group).clone())
    }

    async fn credit(
        &self,
        id: CosimSessionId,
        apply: impl FnOnce(&mut CosimSession),
    ) -> Result<CosimSession, CoreError> {
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("co-sim session", id))?;
        apply(group);
        Ok(group.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use simbench_domain::{BackendKind, SessionId, STEP_VIRTUAL_TIME_NS};
    use simbench_shared::CosimMemberSpec;

    use crate::application::services::session_service::CreateSession;
    use crate::test_fixtures::{cosim_service_over, service_with, RecordingBackend};

    async fn session_on(
        service: &SessionService,
        backend: BackendKind,
        name: &str,
    ) -> SessionId {
        service
            .create(
                CreateSession {
                    name: name.to_string(),
                    backend,
                    board: simbench_domain::BoardConfig::named("test-board"),
                    owner: None,
                },
                CancellationToken::new(),
            )
            .await
            .expect("create session")
            .id
    }

    fn member(backend: BackendKind, session_id: SessionId) -> CosimMemberSpec {
        CosimMemberSpec {
            backend,
            session_id: Some(session_id),
            config: None,
        }
    }

    #[tokio::test]
    async fn step_fans_out_once_per_member_and_credits_once_per_call() {
        let qemu = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let renode = Arc::new(RecordingBackend::new(BackendKind::Renode));
        let sessions = Arc::new(service_with(vec![qemu.clone(), renode.clone()], 10));
        let cosim = cosim_service_over(sessions.clone());

        let a = session_on(&sessions, BackendKind::Qemu, "a").await;
        let b = session_on(&sessions, BackendKind::Renode, "b").await;
        let group = cosim
            .create(vec![member(BackendKind::Qemu, a), member(BackendKind::Renode, b)])
            .await
            .expect("create group");
        cosim.start(group.id).await.expect("start group");

        let updated = cosim.sync_step(group.id, 100).await.expect("sync step");

        assert_eq!(qemu.counters.step() + renode.counters.step(), 2);
        assert_eq!(updated.steps, 100);
        assert_eq!(updated.virtual_time_ns, 100 * STEP_VIRTUAL_TIME_NS);
    }

    #[tokio::test]
    async fn step_requires_a_running_group() {
        let qemu = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let sessions = Arc::new(service_with(vec![qemu], 10));
        let cosim = cosim_service_over(sessions.clone());

        let group = cosim.create(vec![]).await.expect("create group");
        let err = cosim
            .sync_step(group.id, 10)
            .await
            .expect_err("group is not running");
        assert!(matches!(err, CoreError::NotRunning));
    }

    #[tokio::test]
    async fn step_errors_from_members_are_swallowed() {
        let no_step = Arc::new(RecordingBackend::new(BackendKind::Qemu).without_step());
        let sessions = Arc::new(service_with(vec![no_step.clone()], 10));
        let cosim = cosim_service_over(sessions.clone());

        let a = session_on(&sessions, BackendKind::Qemu, "a").await;
        let group = cosim
            .create(vec![member(BackendKind::Qemu, a)])
            .await
            .expect("create group");
        cosim.start(group.id).await.expect("start group");

        let updated = cosim
            .sync_step(group.id, 50)
            .await
            .expect("per-member errors are best-effort");
        assert_eq!(updated.steps, 50);
    }

    #[tokio::test]
    async fn time_slice_runs_members_in_parallel() {
        let qemu = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let renode = Arc::new(RecordingBackend::new(BackendKind::Renode));
        let sessions = Arc::new(service_with(vec![qemu.clone(), renode.clone()], 10));
        let cosim = cosim_service_over(sessions.clone());

        let a = session_on(&sessions, BackendKind::Qemu, "a").await;
        let b = session_on(&sessions, BackendKind::Renode, "b").await;
        let group = cosim
            .create(vec![member(BackendKind::Qemu, a), member(BackendKind::Renode, b)])
            .await
            .expect("create group");
        cosim.start(group.id).await.expect("start group");

        let duration = Duration::from_millis(50);
        let begun = Instant::now();
        let updated = cosim
            .sync_time(group.id, duration.as_nanos() as u64)
            .await
            .expect("sync time");
        let elapsed = begun.elapsed();

        assert_eq!(qemu.counters.run_for(), 1);
        assert_eq!(renode.counters.run_for(), 1);
        assert_eq!(updated.virtual_time_ns, duration.as_nanos() as u64);
        // Serial dispatch would take >= 100ms; parallel stays near 50ms.
        assert!(
            elapsed < Duration::from_millis(90),
            "expected parallel fan-out, took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn event_injection_targets_exactly_the_bound_session() {
        let qemu = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let renode = Arc::new(RecordingBackend::new(BackendKind::Renode));
        let sessions = Arc::new(service_with(vec![qemu.clone(), renode.clone()], 10));
        let cosim = cosim_service_over(sessions.clone());

        let a = session_on(&sessions, BackendKind::Qemu, "a").await;
        let b = session_on(&sessions, BackendKind::Renode, "b").await;
        let group = cosim
            .create(vec![member(BackendKind::Qemu, a), member(BackendKind::Renode, b)])
            .await
            .expect("create group");
        cosim.start(group.id).await.expect("start group");

        let m1 = group.members[0].id;
        let event = TargetEvent::Gpio { pin: 4, state: true };
        cosim
            .inject_event(group.id, m1, &event)
            .await
            .expect("inject");

        assert_eq!(qemu.counters.inject() + renode.counters.inject(), 1);
        assert_eq!(qemu.last_injected().await, Some((a, event)));
    }

    #[tokio::test]
    async fn event_injection_to_an_unknown_member_is_not_found() {
        let qemu = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let sessions = Arc::new(service_with(vec![qemu], 10));
        let cosim = cosim_service_over(sessions.clone());

        let group = cosim.create(vec![]).await.expect("create group");
        cosim.start(group.id).await.expect("start group");

        let err = cosim
            .inject_event(
                group.id,
                CosimMemberId::new(),
                &TargetEvent::Uart { data: "hi".into() },
            )
            .await
            .expect_err("unknown member");
        assert!(matches!(err, CoreError::NotFound { entity: "co-sim member", .. }));
    }

    #[tokio::test]
    async fn event_injection_requires_a_bound_session() {
        let qemu = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let sessions = Arc::new(service_with(vec![qemu], 10));
        let cosim = cosim_service_over(sessions.clone());

        let group = cosim
            .create(vec![CosimMemberSpec {
                backend: BackendKind::Qemu,
                session_id: None,
                config: None,
            }])
            .await
            .expect("create group");
        cosim.start(group.id).await.expect("start group");

        let err = cosim
            .inject_event(
                group.id,
                group.members[0].id,
                &TargetEvent::Gpio { pin: 1, state: false },
            )
            .await
            .expect_err("unbound member");
        assert!(matches!(err, CoreError::NotFound { entity: "session", .. }));
    }

    #[tokio::test]
    async fn unbound_members_still_participate_in_counters() {
        let qemu = Arc::new(RecordingBackend::new(BackendKind::Qemu));
        let sessions = Arc::new(service_with(vec![qemu.clone()], 10));
        let cosim = cosim_service_over(sessions.clone());

        let group = cosim
            .create(vec![CosimMemberSpec {
                backend: BackendKind::Qemu,
                session_id: None,
                config: None,
            }])
            .await
            .expect("create group");
        cosim.start(group.id).await.expect("start group");

        let updated = cosim.sync_step(group.id, 10).await.expect("sync step");
        assert_eq!(qemu.counters.step(), 0, "nothing to dispatch to");
        assert_eq!(updated.steps, 10, "counters still advance once per call");
    }
}
