//! SQLite-backed session records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use simbench_domain::{BackendKind, CoreError, Session, SessionId, SessionState};

use crate::application::ports::outbound::SessionRepo;
use crate::infrastructure::persistence::sqlite::db_err;

pub struct SqliteSessionRepo {
    pool: SqlitePool,
}

impl SqliteSessionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, CoreError> {
    let id: String = row.get("id");
    let backend: String = row.get("backend");
    let state: String = row.get("state");
    Ok(Session {
        id: SessionId::parse(&id)
            .ok_or_else(|| CoreError::persist(format!("bad session id in store: {id}")))?,
        name: row.get("name"),
        backend: backend
            .parse::<BackendKind>()
            .map_err(|e| CoreError::persist(e.to_string()))?,
        board_config: row.get("board_config"),
        state: state.parse::<SessionState>()?,
        debug_port: row.get::<i64, _>("debug_port") as u16,
        monitor_port: row.get::<i64, _>("monitor_port") as u16,
        child_pid: row.get::<Option<i64>, _>("child_pid").map(|pid| pid as u32),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        owner: row.get("owner"),
    })
}

#[async_trait]
impl SessionRepo for SqliteSessionRepo {
    async fn insert(&self, session: &Session) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, name, backend, board_config, state, debug_port, monitor_port,
                 child_pid, owner, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.name)
        .bind(session.backend.to_string())
        .bind(&session.board_config)
        .bind(session.state.as_str())
        .bind(i64::from(session.debug_port))
        .bind(i64::from(session.monitor_port))
        .bind(session.child_pid.map(i64::from))
        .bind(&session.owner)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("insert session"))?;
        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET state = ?, debug_port = ?, monitor_port = ?, child_pid = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(session.state.as_str())
        .bind(i64::from(session.debug_port))
        .bind(i64::from(session.monitor_port))
        .bind(session.child_pid.map(i64::from))
        .bind(session.updated_at)
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err("update session"))?;
        if result.rows_affected() == 0 {
            return Err(CoreError::persist(format!(
                "session row missing for update: {}",
                session.id
            )));
        }
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>, CoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get session"))?;
        row.as_ref().map(row_to_session).transpose()
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<Session>, u64), CoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("count sessions"))?;

        let rows = sqlx::query("SELECT * FROM sessions ORDER BY created_at LIMIT ? OFFSET ?")
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list sessions"))?;

        let sessions = rows
            .iter()
            .map(row_to_session)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((sessions, total as u64))
    }

    async fn delete(&self, id: SessionId) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete session"))?;
        Ok(())
    }
}
