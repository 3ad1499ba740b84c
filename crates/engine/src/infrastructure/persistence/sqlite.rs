//! SQLite pool construction and schema bootstrap.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use simbench_domain::CoreError;

/// Open the pool and ensure the schema exists.
pub async fn connect(url: &str) -> Result<SqlitePool, CoreError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .map_err(|e| CoreError::persist(format!("sqlite connect: {e}")))?;
    init_schema(&pool).await?;
    Ok(pool)
}

pub(crate) fn db_err(operation: &'static str) -> impl Fn(sqlx::Error) -> CoreError {
    move |e| CoreError::persist(format!("{operation}: {e}"))
}

async fn init_schema(pool: &SqlitePool) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            backend TEXT NOT NULL,
            board_config TEXT NOT NULL,
            state TEXT NOT NULL,
            debug_port INTEGER NOT NULL DEFAULT 0,
            monitor_port INTEGER NOT NULL DEFAULT 0,
            child_pid INTEGER,
            owner TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err("create sessions table"))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS programs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            format TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            sha256 TEXT NOT NULL,
            path TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err("create programs table"))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            path TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err("create snapshots table"))?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_snapshots_session
        ON snapshots(session_id, created_at)
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err("create snapshots index"))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cosim_sessions (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            steps INTEGER NOT NULL DEFAULT 0,
            virtual_time_ns INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            started_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err("create cosim_sessions table"))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cosim_members (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            backend TEXT NOT NULL,
            session_id TEXT,
            config TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            position INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err("create cosim_members table"))?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_cosim_members_group
        ON cosim_members(group_id, position)
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err("create cosim_members index"))?;

    Ok(())
}
