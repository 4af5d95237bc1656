//! Database layer for the pharmacy preparation service
//!
//! Wraps the PostgreSQL pool, classifies driver errors into the cases the
//! HTTP layer maps to status codes, and ships the schema migrations.
//!
//! # Example
//!
//! ```rust,no_run
//! use database_layer::{DatabasePool, PoolSettings, TransactionManager};
//!
//! # async fn run() -> database_layer::DatabaseResult<()> {
//! let pool = DatabasePool::connect(&PoolSettings::new("postgres://localhost/pharmacy")).await?;
//! pool.run_migrations().await?;
//!
//! let txm = TransactionManager::new(pool.clone()).with_label("example");
//! let mut tx = txm.begin().await?;
//! sqlx::query("SELECT 1").execute(&mut *tx).await?;
//! txm.commit(tx).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod transaction;

pub use connection::*;
pub use error::*;
pub use transaction::*;
