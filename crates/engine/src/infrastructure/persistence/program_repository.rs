//! SQLite-backed program records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use simbench_domain::{CoreError, Program, ProgramFormat, ProgramId};

use crate::application::ports::outbound::ProgramRepo;
use crate::infrastructure::persistence::sqlite::db_err;

pub struct SqliteProgramRepo {
    pool: SqlitePool,
}

impl SqliteProgramRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_program(row: &sqlx::sqlite::SqliteRow) -> Result<Program, CoreError> {
    let id: String = row.get("id");
    let format: String = row.get("format");
    Ok(Program {
        id: ProgramId::parse(&id)
            .ok_or_else(|| CoreError::persist(format!("bad program id in store: {id}")))?,
        name: row.get("name"),
        format: format.parse::<ProgramFormat>()?,
        size_bytes: row.get::<i64, _>("size_bytes") as u64,
        sha256: row.get("sha256"),
        path: row.get("path"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

#[async_trait]
impl ProgramRepo for SqliteProgramRepo {
    async fn insert(&self, program: &Program) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO programs (id, name, format, size_bytes, sha256, path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(program.id.to_string())
        .bind(&program.name)
        .bind(program.format.as_str())
        .bind(program.size_bytes as i64)
        .bind(&program.sha256)
        .bind(&program.path)
        .bind(program.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("insert program"))?;
        Ok(())
    }

    async fn get(&self, id: ProgramId) -> Result<Option<Program>, CoreError> {
        let row = sqlx::query("SELECT * FROM programs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get program"))?;
        row.as_ref().map(row_to_program).transpose()
    }

    async fn list(&self) -> Result<Vec<Program>, CoreError> {
        let rows = sqlx::query("SELECT * FROM programs ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list programs"))?;
        rows.iter().map(row_to_program).collect()
    }

    async fn delete(&self, id: ProgramId) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM programs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete program"))?;
        Ok(())
    }
}
