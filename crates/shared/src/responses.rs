//! Response DTOs returned by the control API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use simbench_domain::{
    BackendKind, CosimMember, CosimMemberId, CosimSession, CosimSessionId, CosimStatus,
    MemberStatus, Program, ProgramFormat, ProgramId, Session, SessionId, SessionState, Snapshot,
    SnapshotId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub name: String,
    pub backend: BackendKind,
    pub state: SessionState,
    /// The session's board configuration as submitted at creation.
    pub board_config: serde_json::Value,
    pub debug_port: u16,
    pub monitor_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(s: &Session) -> Self {
        let board_config = serde_json::from_str(&s.board_config)
            .unwrap_or_else(|_| serde_json::Value::String(s.board_config.clone()));
        Self {
            id: s.id,
            name: s.name.clone(),
            backend: s.backend,
            state: s.state,
            board_config,
            debug_port: s.debug_port,
            monitor_port: s.monitor_port,
            owner: s.owner.clone(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInfo {
    pub id: ProgramId,
    pub name: String,
    pub format: ProgramFormat,
    pub size_bytes: u64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Program> for ProgramInfo {
    fn from(p: &Program) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            format: p.format,
            size_bytes: p.size_bytes,
            sha256: p.sha256.clone(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub id: SnapshotId,
    pub session_id: SessionId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Snapshot> for SnapshotInfo {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: s.id,
            session_id: s.session_id,
            name: s.name.clone(),
            description: s.description.clone(),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosimMemberInfo {
    pub id: CosimMemberId,
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub status: MemberStatus,
}

impl From<&CosimMember> for CosimMemberInfo {
    fn from(m: &CosimMember) -> Self {
        Self {
            id: m.id,
            backend: m.backend,
            session_id: m.session_id,
            status: m.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosimInfo {
    pub id: CosimSessionId,
    pub status: CosimStatus,
    pub steps: u64,
    pub virtual_time_ns: u64,
    pub members: Vec<CosimMemberInfo>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&CosimSession> for CosimInfo {
    fn from(g: &CosimSession) -> Self {
        Self {
            id: g.id,
            status: g.status,
            steps: g.steps,
            virtual_time_ns: g.virtual_time_ns,
            members: g.members.iter().map(CosimMemberInfo::from).collect(),
            created_at: g.created_at,
            started_at: g.started_at,
        }
    }
}

/// JSON error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable machine-readable kind, e.g. "not_found".
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn session_info_parses_board_blob() {
        let session = Session::new(
            "dev",
            BackendKind::Renode,
            r#"{"board":"test-board"}"#.to_string(),
            None,
            Utc::now(),
        );
        let info = SessionInfo::from(&session);
        assert_eq!(
            info.board_config
                .get("board")
                .and_then(|v| v.as_str()),
            Some("test-board")
        );
    }
}
