//! Engine
//!
//! Opens the database and wires repositories into the services. Callers keep
//! the `Engine` and reach the board, the library and the rewards through it.

use std::fs;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::domain::{DomainError, DomainResult};
use crate::repository::{init_db, DbState, KvRewardLedger, SqliteLibraryRepository, TaskRepository};
use crate::service::{LibraryService, TaskBoard};

pub struct Engine {
    config: EngineConfig,
    db: DbState,
    board: TaskBoard,
    library: LibraryService,
    rewards: Arc<KvRewardLedger>,
}

impl Engine {
    pub async fn open(config: EngineConfig) -> DomainResult<Self> {
        config.validate()?;

        if !config.is_in_memory() {
            fs::create_dir_all(&config.data_dir).map_err(|e| {
                DomainError::Persistence(format!("Failed to create {}: {}", config.data_dir.display(), e))
            })?;
        }
        let db_path = config.db_path();
        log::info!("opening database at {}", db_path.display());
        let db = init_db(&db_path).await?;

        let rewards = Arc::new(KvRewardLedger::new(db.connection()));

        let board = TaskBoard::new(
            Arc::new(TaskRepository::new(db.connection())),
            rewards.clone(),
            config.rearm_policy,
        )
        .with_default_points(config.default_points);
        board.init().await?;

        let library = LibraryService::new(Arc::new(SqliteLibraryRepository::new(db.connection())));
        library.init().await?;

        Ok(Self {
            config,
            db,
            board,
            library,
            rewards,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    pub fn library(&self) -> &LibraryService {
        &self.library
    }

    /// Points balance and the rewards catalog
    pub fn rewards(&self) -> &KvRewardLedger {
        &self.rewards
    }

    pub fn db(&self) -> &DbState {
        &self.db
    }

    /// Release the database; later operations fail with a persistence error
    pub async fn close(&self) {
        self.db.close().await;
        log::info!("database closed");
    }
}

/// Install the rolling file logger described by `config`
pub fn init_logging(config: &EngineConfig) -> Result<(), rolling_logger::LoggerError> {
    let mut logger = rolling_logger::LoggerConfig::new(config.log_dir(), &config.app_name);
    logger.retention_days = config.log_retention_days;
    rolling_logger::init_with(logger)
}
