//! Session entity and its lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::BackendKind;
use crate::error::CoreError;
use crate::ids::SessionId;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Running,
    Paused,
    Stopped,
    Error,
}

impl SessionState {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Created -> Running; Running <-> Paused; Running|Paused -> Stopped;
    /// any -> Error. Stopped and Error are terminal until delete.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, Error) => true,
            (Created, Running) => true,
            (Running, Paused) => true,
            (Paused, Running) => true,
            (Running, Stopped) | (Paused, Stopped) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            "error" => Ok(Self::Error),
            other => Err(CoreError::internal(format!(
                "unknown session state: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A controllable handle to one running backend instance.
///
/// The id and backend kind are immutable for the session's life; state
/// transitions go through [`Session::transition_to`]. Debug and monitor
/// ports are non-zero exactly while the child process is alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub backend: BackendKind,
    /// Board configuration, serialized verbatim at creation and opaque to
    /// the core afterwards.
    pub board_config: String,
    pub state: SessionState,
    pub debug_port: u16,
    pub monitor_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_pid: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Session {
    pub fn new(
        name: impl Into<String>,
        backend: BackendKind,
        board_config: String,
        owner: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            name: name.into(),
            backend,
            board_config,
            state: SessionState::Created,
            debug_port: 0,
            monitor_port: 0,
            child_pid: None,
            created_at: now,
            updated_at: now,
            owner,
        }
    }

    /// Move to `next`, enforcing the state machine.
    pub fn transition_to(&mut self, next: SessionState, now: DateTime<Utc>) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::internal(format!(
                "invalid session state transition: {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    /// Record the ports and pid assigned during adapter start.
    pub fn attach_child(&mut self, debug_port: u16, monitor_port: u16, pid: Option<u32>) {
        self.debug_port = debug_port;
        self.monitor_port = monitor_port;
        self.child_pid = pid;
    }

    /// Clear the child bookkeeping after the process is gone.
    pub fn detach_child(&mut self) {
        self.debug_port = 0;
        self.monitor_port = 0;
        self.child_pid = None;
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Running | SessionState::Paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            "dev-board",
            BackendKind::Qemu,
            "{}".to_string(),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn lifecycle_follows_state_machine() {
        let mut s = session();
        assert_eq!(s.state, SessionState::Created);

        s.transition_to(SessionState::Running, Utc::now()).expect("start");
        s.transition_to(SessionState::Paused, Utc::now()).expect("pause");
        s.transition_to(SessionState::Running, Utc::now()).expect("resume");
        s.transition_to(SessionState::Stopped, Utc::now()).expect("stop");
    }

    #[test]
    fn created_cannot_pause_or_stop() {
        let mut s = session();
        assert!(s.transition_to(SessionState::Paused, Utc::now()).is_err());
        assert!(s.transition_to(SessionState::Stopped, Utc::now()).is_err());
    }

    #[test]
    fn any_state_can_fault() {
        for state in [
            SessionState::Created,
            SessionState::Running,
            SessionState::Paused,
            SessionState::Stopped,
        ] {
            assert!(state.can_transition_to(SessionState::Error));
        }
    }

    #[test]
    fn stopped_is_terminal() {
        assert!(!SessionState::Stopped.can_transition_to(SessionState::Running));
        assert!(!SessionState::Stopped.can_transition_to(SessionState::Paused));
    }

    #[test]
    fn attach_and_detach_child_track_ports() {
        let mut s = session();
        s.attach_child(4431, 4432, Some(9001));
        assert!(s.debug_port != 0 && s.monitor_port != 0);
        s.detach_child();
        assert_eq!((s.debug_port, s.monitor_port, s.child_pid), (0, 0, None));
    }
}
