//! Domain logic that does not touch the database
//!
//! Handlers load rows, hand them to these functions and persist or return
//! the result. Everything here is synchronous and unit tested in place.

pub mod medication_catalog;
pub mod reconciliation;
pub mod record_grouping;
pub mod statistics;

pub use medication_catalog::{medication_label, normalize_key, parse_medication_input, MedicationGroup};
pub use reconciliation::{ExistingItem, ReconcilePlan};
pub use record_grouping::{ItemRecordRow, MedicationPatient, RecordGroup, RegistryRow};
pub use statistics::{MedicationRangeReport, Statistics};
