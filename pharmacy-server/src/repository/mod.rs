//! SQL for the pharmacy tables
//!
//! Functions take any Postgres executor so the same statement runs against
//! the pool or inside a transaction (`&mut *tx`). Operations made of several
//! statements take a `&mut PgConnection` instead.

pub mod items;
pub mod medications;
pub mod patients;
pub mod prep_requests;
pub mod reports;

pub use database_layer::{DatabaseError, DatabaseResult};
