//! PII redaction for pharmacy service logs
//!
//! Patient national identifiers and names must never reach log output in the
//! clear. This crate replaces them with short SHA-256 based hashes so that log
//! lines about the same patient can still be correlated.
//!
//! # Detected Data Types
//!
//! - **National IDs**: 12.345.678-9 → ID[hash]
//! - **Email Addresses**: user@example.com → EMAIL[hash]
//! - **Phone Numbers**: +56 9 1234 5678 → PHONE[hash]
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{redact_id, PiiRedactor, RedactionConfig};
//! use tracing::info;
//!
//! PiiRedactor::install(RedactionConfig::default());
//!
//! let national_id = "12.345.678-9";
//! info!(patient = %redact_id(national_id), "Patient upserted");
//!
//! let line = PiiRedactor::global().redact("lookup failed for 12.345.678-9");
//! assert!(line.starts_with("lookup failed for ID["));
//! ```

pub mod config;
pub mod redactor;

pub use config::*;
pub use redactor::*;
