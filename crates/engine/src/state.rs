//! Application composition.

use std::sync::Arc;

use crate::application::ports::outbound::{
    ConsolePort, CosimRepo, ProgramRepo, SessionRepo, SnapshotRepo,
};
use crate::application::services::{
    CosimService, ProgramService, SessionService, SessionServiceConfig,
};
use crate::infrastructure::backends::BackendRegistry;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::console::ConsoleHub;
use crate::infrastructure::persistence::memory::{
    MemoryCosimRepo, MemoryProgramRepo, MemorySessionRepo, MemorySnapshotRepo,
};
use crate::infrastructure::persistence::{
    sqlite, SqliteCosimRepo, SqliteProgramRepo, SqliteSessionRepo, SqliteSnapshotRepo,
};

/// Long-lived process state, shared with every handler.
pub struct AppState {
    pub config: AppConfig,
    pub backends: Arc<BackendRegistry>,
    pub sessions: Arc<SessionService>,
    pub cosim: Arc<CosimService>,
    pub programs: Arc<ProgramService>,
    pub console: Arc<ConsoleHub>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let console = Arc::new(ConsoleHub::new());
        let backends = Arc::new(BackendRegistry::with_defaults(&config));

        let (session_repo, program_repo, snapshot_repo, cosim_repo): (
            Arc<dyn SessionRepo>,
            Arc<dyn ProgramRepo>,
            Arc<dyn SnapshotRepo>,
            Arc<dyn CosimRepo>,
        ) = match &config.database_url {
            Some(url) => {
                let pool = sqlite::connect(url).await?;
                tracing::info!(url = %url, "durable store ready");
                (
                    Arc::new(SqliteSessionRepo::new(pool.clone())),
                    Arc::new(SqliteProgramRepo::new(pool.clone())),
                    Arc::new(SqliteSnapshotRepo::new(pool.clone())),
                    Arc::new(SqliteCosimRepo::new(pool)),
                )
            }
            None => {
                tracing::warn!("no database configured; records live in memory only");
                (
                    Arc::new(MemorySessionRepo::new()),
                    Arc::new(MemoryProgramRepo::new()),
                    Arc::new(MemorySnapshotRepo::new()),
                    Arc::new(MemoryCosimRepo::new()),
                )
            }
        };

        let sessions = Arc::new(SessionService::new(
            backends.clone(),
            session_repo,
            program_repo.clone(),
            snapshot_repo,
            Some(console.clone() as Arc<dyn ConsolePort>),
            SessionServiceConfig {
                max_sessions: config.max_sessions,
                data_dir: config.data_dir.clone(),
            },
        ));
        let cosim = Arc::new(CosimService::new(sessions.clone(), cosim_repo));
        let programs = Arc::new(ProgramService::new(program_repo, config.data_dir.clone()));

        Ok(Self {
            config,
            backends,
            sessions,
            cosim,
            programs,
            console,
        })
    }
}
