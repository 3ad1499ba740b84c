//! SQLite-backed co-simulation records.
//!
//! Groups and members live in two tables; the member list keeps its order
//! through an explicit position column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use simbench_domain::{
    BackendKind, CoreError, CosimMember, CosimMemberId, CosimSession, CosimSessionId, CosimStatus,
    MemberStatus, SessionId,
};

use crate::application::ports::outbound::CosimRepo;
use crate::infrastructure::persistence::sqlite::db_err;

pub struct SqliteCosimRepo {
    pool: SqlitePool,
}

impl SqliteCosimRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_member(row: &sqlx::sqlite::SqliteRow) -> Result<CosimMember, CoreError> {
    let id: String = row.get("id");
    let group_id: String = row.get("group_id");
    let backend: String = row.get("backend");
    let status: String = row.get("status");
    let session_id: Option<String> = row.get("session_id");
    Ok(CosimMember {
        id: CosimMemberId::parse(&id)
            .ok_or_else(|| CoreError::persist(format!("bad member id in store: {id}")))?,
        group_id: CosimSessionId::parse(&group_id)
            .ok_or_else(|| CoreError::persist(format!("bad group id in member row: {group_id}")))?,
        backend: backend
            .parse::<BackendKind>()
            .map_err(|e| CoreError::persist(e.to_string()))?,
        session_id: session_id
            .map(|s| {
                SessionId::parse(&s)
                    .ok_or_else(|| CoreError::persist(format!("bad session id in member row: {s}")))
            })
            .transpose()?,
        config: row.get("config"),
        status: status.parse::<MemberStatus>()?,
    })
}

async fn insert_members(pool: &SqlitePool, group: &CosimSession) -> Result<(), CoreError> {
    for (position, member) in group.members.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO cosim_members (id, group_id, backend, session_id, config, status, position)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(member.id.to_string())
        .bind(member.group_id.to_string())
        .bind(member.backend.to_string())
        .bind(member.session_id.map(|s| s.to_string()))
        .bind(&member.config)
        .bind(member.status.as_str())
        .bind(position as i64)
        .execute(pool)
        .await
        .map_err(db_err("insert co-sim member"))?;
    }
    Ok(())
}

#[async_trait]
impl CosimRepo for SqliteCosimRepo {
    async fn insert(&self, group: &CosimSession) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO cosim_sessions (id, status, steps, virtual_time_ns, created_at, started_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(group.id.to_string())
        .bind(group.status.as_str())
        .bind(group.steps as i64)
        .bind(group.virtual_time_ns as i64)
        .bind(group.created_at)
        .bind(group.started_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("insert co-sim session"))?;
        insert_members(&self.pool, group).await
    }

    async fn update(&self, group: &CosimSession) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cosim_sessions
            SET status = ?, steps = ?, virtual_time_ns = ?, started_at = ?
            WHERE id = ?
            "#,
        )
        .bind(group.status.as_str())
        .bind(group.steps as i64)
        .bind(group.virtual_time_ns as i64)
        .bind(group.started_at)
        .bind(group.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err("update co-sim session"))?;
        if result.rows_affected() == 0 {
            return Err(CoreError::persist(format!(
                "co-sim row missing for update: {}",
                group.id
            )));
        }
        for member in &group.members {
            sqlx::query("UPDATE cosim_members SET status = ? WHERE id = ?")
                .bind(member.status.as_str())
                .bind(member.id.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_err("update co-sim member"))?;
        }
        Ok(())
    }

    async fn get(&self, id: CosimSessionId) -> Result<Option<CosimSession>, CoreError> {
        let Some(row) = sqlx::query("SELECT * FROM cosim_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get co-sim session"))?
        else {
            return Ok(None);
        };

        let status: String = row.get("status");
        let group_id: String = row.get("id");
        let mut group = CosimSession {
            id: CosimSessionId::parse(&group_id)
                .ok_or_else(|| CoreError::persist(format!("bad group id in store: {group_id}")))?,
            status: status.parse::<CosimStatus>()?,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            started_at: row.get::<Option<DateTime<Utc>>, _>("started_at"),
            steps: row.get::<i64, _>("steps") as u64,
            virtual_time_ns: row.get::<i64, _>("virtual_time_ns") as u64,
            members: Vec::new(),
        };

        let member_rows =
            sqlx::query("SELECT * FROM cosim_members WHERE group_id = ? ORDER BY position")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err("list co-sim members"))?;
        group.members = member_rows
            .iter()
            .map(row_to_member)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(group))
    }

    async fn delete(&self, id: CosimSessionId) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM cosim_members WHERE group_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete co-sim members"))?;
        sqlx::query("DELETE FROM cosim_sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete co-sim session"))?;
        Ok(())
    }
}
