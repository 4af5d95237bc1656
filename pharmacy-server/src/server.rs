use database_layer::{DatabasePool, TransactionManager};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct PharmacyServer {
    /// Loaded configuration
    pub config: Arc<Settings>,
    /// Database pool
    pub database: DatabasePool,
    started_at: Instant,
}

impl PharmacyServer {
    pub fn new(config: Settings, database: DatabasePool) -> Self {
        Self {
            config: Arc::new(config),
            database,
            started_at: Instant::now(),
        }
    }

    /// Pool for single-statement reads and writes
    pub fn pool(&self) -> &PgPool {
        self.database.pool()
    }

    /// Transaction manager for a named unit of work
    pub fn transactions(&self, label: &'static str) -> TransactionManager {
        TransactionManager::new(self.database.clone()).with_label(label)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
