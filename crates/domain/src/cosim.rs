//! Co-simulation groups: ordered collections of sessions driven together
//! under one of three synchronization schemes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::BackendKind;
use crate::error::CoreError;
use crate::ids::{CosimMemberId, CosimSessionId, SessionId};

/// Virtual time credited per stepped instruction by the sync-step scheme.
///
/// Placeholder model: 1 microsecond per step, applied once per call. Backends
/// do not validate it; a real mapping would come from the adapter.
pub const STEP_VIRTUAL_TIME_NS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CosimStatus {
    Created,
    Running,
    Stopped,
}

impl CosimStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl std::str::FromStr for CosimStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            other => Err(CoreError::internal(format!("unknown co-sim status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Initialized,
    Active,
    Failed,
}

impl MemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for MemberStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialized" => Ok(Self::Initialized),
            "active" => Ok(Self::Active),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::internal(format!("unknown member status: {other}"))),
        }
    }
}

/// A constituent session reference within a co-sim group.
///
/// A member with a bound session must resolve when driven; an unbound member
/// is a dispatch no-op but still participates in the group counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosimMember {
    pub id: CosimMemberId,
    pub group_id: CosimSessionId,
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Opaque per-member configuration blob.
    #[serde(default)]
    pub config: String,
    pub status: MemberStatus,
}

/// A coordinator entity grouping sessions for joint execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosimSession {
    pub id: CosimSessionId,
    pub status: CosimStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Monotonically accumulating instruction-step count.
    pub steps: u64,
    /// Accumulated virtual time in nanoseconds.
    pub virtual_time_ns: u64,
    /// Ordered member list.
    pub members: Vec<CosimMember>,
}

impl CosimSession {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: CosimSessionId::new(),
            status: CosimStatus::Created,
            created_at: now,
            started_at: None,
            steps: 0,
            virtual_time_ns: 0,
            members: Vec::new(),
        }
    }

    pub fn add_member(
        &mut self,
        backend: BackendKind,
        session_id: Option<SessionId>,
        config: String,
    ) -> CosimMemberId {
        let id = CosimMemberId::new();
        self.members.push(CosimMember {
            id,
            group_id: self.id,
            backend,
            session_id,
            config,
            status: MemberStatus::Initialized,
        });
        id
    }

    pub fn member(&self, id: CosimMemberId) -> Option<&CosimMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Credit a sync-step call: `count` instructions at the placeholder
    /// virtual-time rate, applied once per call regardless of member count.
    pub fn credit_steps(&mut self, count: u64) {
        self.steps = self.steps.saturating_add(count);
        self.virtual_time_ns = self
            .virtual_time_ns
            .saturating_add(count.saturating_mul(STEP_VIRTUAL_TIME_NS));
    }

    /// Credit a sync-time call: `duration_ns` of virtual time, once per call.
    pub fn credit_time(&mut self, duration_ns: u64) {
        self.virtual_time_ns = self.virtual_time_ns.saturating_add(duration_ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_counters_pin_virtual_time_formula() {
        let mut group = CosimSession::new(Utc::now());
        group.credit_steps(100);
        assert_eq!(group.steps, 100);
        // 1 us per step, once per call
        assert_eq!(group.virtual_time_ns, 100 * STEP_VIRTUAL_TIME_NS);
        assert_eq!(group.virtual_time_ns, 100_000);
    }

    #[test]
    fn time_credit_applies_once_per_call() {
        let mut group = CosimSession::new(Utc::now());
        group.credit_time(1_000_000);
        group.credit_time(1_000_000);
        assert_eq!(group.virtual_time_ns, 2_000_000);
        assert_eq!(group.steps, 0);
    }

    #[test]
    fn members_start_initialized() {
        let mut group = CosimSession::new(Utc::now());
        let id = group.add_member(BackendKind::Qemu, None, String::new());
        let member = group.member(id).expect("member exists");
        assert_eq!(member.status, MemberStatus::Initialized);
        assert_eq!(member.group_id, group.id);
    }
}
