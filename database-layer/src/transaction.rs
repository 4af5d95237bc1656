// Transaction management
use crate::connection::DatabasePool;
use crate::error::{DatabaseError, DatabaseResult};
use sqlx::{Postgres, Transaction};
use tracing::debug;

/// Transaction manager for multi-statement writes
pub struct TransactionManager {
    pool: DatabasePool,
    label: &'static str,
}

impl TransactionManager {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            label: "unnamed",
        }
    }

    /// Name the unit of work for log correlation
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Begin a new transaction
    pub async fn begin(&self) -> DatabaseResult<Transaction<'static, Postgres>> {
        debug!(label = self.label, "Beginning transaction");

        self.pool.pool().begin().await.map_err(|e| match DatabaseError::from(e) {
            DatabaseError::QueryFailed(msg) => {
                DatabaseError::QueryFailed(format!("Failed to begin transaction: {}", msg))
            }
            other => other,
        })
    }

    /// Commit a transaction started by this manager
    pub async fn commit(&self, tx: Transaction<'static, Postgres>) -> DatabaseResult<()> {
        tx.commit().await?;
        debug!(label = self.label, "Transaction committed");
        Ok(())
    }
}
