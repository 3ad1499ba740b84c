//! SQLite-backed snapshot records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use simbench_domain::{CoreError, SessionId, Snapshot, SnapshotId};

use crate::application::ports::outbound::SnapshotRepo;
use crate::infrastructure::persistence::sqlite::db_err;

pub struct SqliteSnapshotRepo {
    pool: SqlitePool,
}

impl SqliteSnapshotRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<Snapshot, CoreError> {
    let id: String = row.get("id");
    let session_id: String = row.get("session_id");
    Ok(Snapshot {
        id: SnapshotId::parse(&id)
            .ok_or_else(|| CoreError::persist(format!("bad snapshot id in store: {id}")))?,
        session_id: SessionId::parse(&session_id).ok_or_else(|| {
            CoreError::persist(format!("bad session id in snapshot row: {session_id}"))
        })?,
        name: row.get("name"),
        description: row.get("description"),
        path: row.get("path"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

#[async_trait]
impl SnapshotRepo for SqliteSnapshotRepo {
    async fn insert(&self, snapshot: &Snapshot) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (id, session_id, name, description, path, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot.id.to_string())
        .bind(snapshot.session_id.to_string())
        .bind(&snapshot.name)
        .bind(&snapshot.description)
        .bind(&snapshot.path)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("insert snapshot"))?;
        Ok(())
    }

    async fn get(&self, id: SnapshotId) -> Result<Option<Snapshot>, CoreError> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get snapshot"))?;
        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn list_for_session(&self, session_id: SessionId) -> Result<Vec<Snapshot>, CoreError> {
        let rows =
            sqlx::query("SELECT * FROM snapshots WHERE session_id = ? ORDER BY created_at")
                .bind(session_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err("list snapshots"))?;
        rows.iter().map(row_to_snapshot).collect()
    }

    async fn delete(&self, id: SnapshotId) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM snapshots WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete snapshot"))?;
        Ok(())
    }
}
