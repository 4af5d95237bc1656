//! Fold flat item rows into the record-shaped views
//!
//! Three screens show "one line per prescription" while the database stores
//! one item per application date: recent records, the patient registry and
//! the patients of a medication. Each groups the same flat row by a
//! different key and collects the dates of the group.

use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use serde::Serialize;
use sqlx::FromRow;
use std::collections::HashMap;
use std::hash::Hash;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::medication_catalog::medication_label;
use crate::types::Acquisition;

/// One item joined with its request, patient, medication and pharmacist.
#[derive(Debug, Clone, FromRow)]
pub struct ItemRecordRow {
    pub item_id: Uuid,
    pub prep_request_id: Uuid,
    pub patient_id: Uuid,
    pub national_id: String,
    pub patient_name: Option<String>,
    pub medication_id: Uuid,
    pub medication_code: Option<String>,
    pub medication_name: String,
    pub dose_text: String,
    pub units_required: f64,
    pub frequency: Option<String>,
    pub acquisition: String,
    pub notes: Option<String>,
    pub application_date: NaiveDate,
    pub reception_date: Option<NaiveDate>,
    pub prescription_number: Option<String>,
    pub prescriber_id: Option<Uuid>,
    pub pharmacist_id: Option<Uuid>,
    pub pharmacist_code: Option<String>,
    pub pharmacist_first_names: Option<String>,
    pub pharmacist_last_names: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ItemRecordRow {
    fn medication_label(&self) -> String {
        medication_label(self.medication_code.as_deref(), &self.medication_name)
    }

    /// `"<code> - <first names> <last names>"` when a pharmacist is assigned
    fn pharmacist_label(&self) -> Option<String> {
        self.pharmacist_code.as_deref().map(|code| {
            format!(
                "{} - {} {}",
                code,
                self.pharmacist_first_names.as_deref().unwrap_or_default(),
                self.pharmacist_last_names.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string()
        })
    }
}

/// Group rows by `key`, keeping groups in first-seen order and rows in
/// input order inside each group.
fn group_in_order<T, K, F>(rows: Vec<T>, key: F) -> Vec<Vec<T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<T>> = Vec::new();
    for row in rows {
        let slot = *index.entry(key(&row)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    groups
}

fn sorted_dates<'a>(dates: impl Iterator<Item = &'a NaiveDate>) -> Vec<NaiveDate> {
    dates.copied().sorted().dedup().collect()
}

// ============================================================================
// RECENT RECORDS
// ============================================================================

/// A prescription line across all its application dates
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordGroup {
    /// First item of the group
    pub id: Uuid,
    pub patient_id: Uuid,
    pub reception_date: Option<NaiveDate>,
    pub prescription_number: Option<String>,
    pub prescriber_id: Option<Uuid>,
    pub pharmacist_id: Option<Uuid>,
    pub national_id: String,
    pub name: Option<String>,
    pub medication_id: Uuid,
    pub medication: String,
    pub dose_text: String,
    pub units_required: f64,
    pub frequency: Option<String>,
    pub acquisition: Acquisition,
    pub notes: Option<String>,
    pub application_dates: Vec<NaiveDate>,
    pub item_ids: Vec<Uuid>,
}

/// Group by (patient, medication, dose, frequency, prescription number,
/// reception date, pharmacist, prescriber, acquisition); newest first.
pub fn group_recent_records(rows: Vec<ItemRecordRow>) -> Vec<RecordGroup> {
    let groups = group_in_order(rows, |r| {
        (
            r.patient_id,
            r.medication_id,
            r.dose_text.clone(),
            r.frequency.clone(),
            r.prescription_number.clone(),
            r.reception_date,
            r.pharmacist_id,
            r.prescriber_id,
            r.acquisition.clone(),
        )
    });

    groups
        .into_iter()
        .filter_map(|group| {
            let newest = group.iter().map(|r| r.created_at).max()?;
            let first = group.first()?;
            let record = RecordGroup {
                id: first.item_id,
                patient_id: first.patient_id,
                reception_date: first.reception_date,
                prescription_number: first.prescription_number.clone(),
                prescriber_id: first.prescriber_id,
                pharmacist_id: first.pharmacist_id,
                national_id: first.national_id.clone(),
                name: first.patient_name.clone(),
                medication_id: first.medication_id,
                medication: first.medication_label(),
                dose_text: first.dose_text.clone(),
                units_required: first.units_required,
                frequency: first.frequency.clone(),
                acquisition: first.acquisition.parse().unwrap_or_default(),
                notes: first.notes.clone(),
                application_dates: sorted_dates(group.iter().map(|r| &r.application_date)),
                item_ids: group.iter().map(|r| r.item_id).unique().collect(),
            };
            Some((newest, record))
        })
        .sorted_by(|a, b| b.0.cmp(&a.0))
        .map(|(_, record)| record)
        .collect()
}

// ============================================================================
// PATIENT REGISTRY
// ============================================================================

/// One registry line with its planned and already applied dates
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistryRow {
    pub patient_id: Uuid,
    pub medication_id: Uuid,
    pub reception_date: Option<NaiveDate>,
    pub prescription_number: Option<String>,
    pub national_id: String,
    pub name: Option<String>,
    pub medication: String,
    pub dose_text: String,
    pub application_dates: Vec<NaiveDate>,
    pub applied_dates: Vec<NaiveDate>,
    pub pharmacist: Option<String>,
}

/// Group by (patient, medication, prescription number, reception date,
/// pharmacist, dose). Sorted by reception date desc, last application date
/// desc, then national id.
pub fn group_registry(rows: Vec<ItemRecordRow>) -> Vec<RegistryRow> {
    let groups = group_in_order(rows, |r| {
        (
            r.patient_id,
            r.medication_id,
            r.prescription_number.clone(),
            r.reception_date,
            r.pharmacist_id,
            r.dose_text.clone(),
        )
    });

    let mut registry: Vec<RegistryRow> = groups
        .into_iter()
        .filter_map(|group| {
            let first = group.first()?;
            Some(RegistryRow {
                patient_id: first.patient_id,
                medication_id: first.medication_id,
                reception_date: first.reception_date,
                prescription_number: first.prescription_number.clone(),
                national_id: first.national_id.clone(),
                name: first.patient_name.clone(),
                medication: first.medication_label(),
                dose_text: first.dose_text.clone(),
                application_dates: sorted_dates(group.iter().map(|r| &r.application_date)),
                applied_dates: sorted_dates(
                    group
                        .iter()
                        .filter(|r| r.applied_at.is_some())
                        .map(|r| &r.application_date),
                ),
                pharmacist: first.pharmacist_label(),
            })
        })
        .collect();

    // None sorts before Some, so undated rows land at the end of a desc sort
    registry.sort_by(|a, b| {
        b.reception_date
            .cmp(&a.reception_date)
            .then_with(|| b.application_dates.last().cmp(&a.application_dates.last()))
            .then_with(|| a.national_id.cmp(&b.national_id))
    });
    registry
}

// ============================================================================
// PATIENTS OF A MEDICATION
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MedicationPatient {
    pub patient_id: Uuid,
    pub national_id: String,
    pub name: Option<String>,
    pub application_dates: Vec<NaiveDate>,
    /// Number of items, not distinct dates
    pub lines: usize,
}

pub fn group_medication_patients(rows: Vec<ItemRecordRow>) -> Vec<MedicationPatient> {
    group_in_order(rows, |r| r.patient_id)
        .into_iter()
        .filter_map(|group| {
            let first = group.first()?;
            Some(MedicationPatient {
                patient_id: first.patient_id,
                national_id: first.national_id.clone(),
                name: first.patient_name.clone(),
                application_dates: sorted_dates(group.iter().map(|r| &r.application_date)),
                lines: group.len(),
            })
        })
        .sorted_by(|a, b| a.national_id.cmp(&b.national_id))
        .collect()
}
