//! Recent records and date reconciliation
//!
//! A record is one prescription line spread over several application dates.
//! Editing it rewrites the line on every kept item and brings the set of
//! dates in line with what the client sent, all in one transaction.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ValidatedJson, ValidatedQuery};
use crate::repository::items::{self, NewItem, RecordFields};
use crate::repository::prep_requests::{self, RequestMeta};
use crate::repository::{medications, patients};
use crate::server::PharmacyServer;
use crate::services::medication_catalog::parse_medication_input;
use crate::services::reconciliation;
use crate::services::record_grouping::{group_recent_records, RecordGroup};
use crate::types::Acquisition;
use crate::utils::dates::{month_range, parse_iso_date};
use crate::utils::validation::{
    iso_date, iso_dates, not_blank, prescription_number, upper, upper_opt,
};

const MAX_TAKE: i64 = 5000;
const DEFAULT_TAKE_WITHOUT_MONTH: usize = 5;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentRecordsParams {
    /// Month of reception (`YYYY-MM`)
    pub month: Option<String>,
    /// Maximum records returned (1..=5000)
    pub take: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecordMedication {
    pub id: Option<Uuid>,
    pub institutional_code: Option<String>,
    /// Plain name, or `"<code> - <name>"` as typed in the picker
    #[validate(custom(function = "not_blank"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_record_request"))]
pub struct ReconcileRecordRequest {
    pub patient_id: Uuid,
    #[validate(custom(function = "not_blank"), length(max = 50))]
    pub national_id: String,
    /// Absent keeps the name, `null` clears it
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub name: Option<Option<String>>,
    #[validate(nested)]
    pub medication: RecordMedication,
    #[validate(custom(function = "not_blank"))]
    pub dose_text: String,
    #[validate(range(exclusive_min = 0.0, message = "units must be greater than zero"))]
    pub units_required: f64,
    #[validate(length(max = 50))]
    pub frequency: Option<String>,
    pub acquisition: Option<Acquisition>,
    #[validate(length(max = 300))]
    pub notes: Option<String>,
    #[validate(custom(function = "iso_date"))]
    pub reception_date: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub prescription_number: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub prescriber_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub pharmacist_id: Option<Option<Uuid>>,
    #[validate(
        length(min = 1, max = 16, message = "between 1 and 16 application dates"),
        custom(function = "iso_dates")
    )]
    pub application_dates: Vec<String>,
    #[validate(length(min = 1, message = "at least one item id"))]
    pub item_ids: Vec<Uuid>,
}

fn validate_record_request(req: &ReconcileRecordRequest) -> Result<(), ValidationError> {
    if let Some(Some(number)) = &req.prescription_number {
        prescription_number(number)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileResult {
    pub updated: usize,
    pub created: usize,
    pub deleted: usize,
}

/// Resolve the `take` of the recent records list: clamped when given,
/// otherwise a short list without a month and everything with one.
fn effective_take(take: Option<i64>, has_month: bool) -> Option<usize> {
    match take {
        Some(take) => usize::try_from(take.clamp(1, MAX_TAKE)).ok(),
        None if has_month => None,
        None => Some(DEFAULT_TAKE_WITHOUT_MONTH),
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/records",
    params(RecentRecordsParams),
    responses(
        (status = 200, description = "Recent prescription lines grouped across dates", body = Vec<RecordGroup>),
        (status = 400, description = "Invalid month")
    ),
    tag = "records"
)]
pub async fn list_recent_records(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<RecentRecordsParams>,
) -> Result<Json<ApiResponse<Vec<RecordGroup>>>, ApiError> {
    let month = match params.month.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            month_range(raw)
                .ok_or_else(|| ApiError::validation(format!("invalid month '{}', expected YYYY-MM", raw)))?,
        ),
    };

    let rows = items::recent_rows(server.pool(), month).await?;
    let mut records = group_recent_records(rows);
    if let Some(take) = effective_take(params.take, month.is_some()) {
        records.truncate(take);
    }

    Ok(Json(api_success(records)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/records",
    request_body = ReconcileRecordRequest,
    responses(
        (status = 200, description = "Items updated, created and deleted", body = ReconcileResult),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Patient not found")
    ),
    tag = "records"
)]
pub async fn reconcile_record(
    State(server): State<PharmacyServer>,
    ValidatedJson(req): ValidatedJson<ReconcileRecordRequest>,
) -> Result<Json<ApiResponse<ReconcileResult>>, ApiError> {
    let dates = req
        .application_dates
        .iter()
        .map(|raw| parse_iso_date(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let reception_date = req.reception_date.as_deref().map(parse_iso_date).transpose()?;

    let medication = parse_medication_input(
        req.medication.id,
        req.medication.institutional_code.as_deref(),
        &req.medication.name,
    );

    let meta = RequestMeta {
        reception_date,
        prescription_number: req
            .prescription_number
            .map(|number| number.map(|n| n.trim().to_string())),
        prescriber_id: req.prescriber_id,
        pharmacist_id: req.pharmacist_id,
        actor: None,
    };

    let transactions = server.transactions("reconcile_record");
    let mut tx = transactions.begin().await?;

    let medication_id = medications::resolve(&mut *tx, &medication).await?;

    let name = req.name.map(|name| upper_opt(name.as_deref()));
    let patient = patients::update(
        &mut *tx,
        req.patient_id,
        Some(&upper(&req.national_id)),
        name.as_ref().map(|n| n.as_deref()),
    )
    .await
    .map_err(|e| ApiError::or_not_found(e, "Patient"))?;

    let existing = items::load_existing(&mut *tx, &req.item_ids).await?;
    let plan = reconciliation::plan(patient.id, &existing, &dates);
    debug!(
        keep = plan.keep.len(),
        delete = plan.delete.len(),
        create = plan.create.len(),
        "Record reconciliation planned"
    );

    let fields = RecordFields {
        medication_id,
        dose_text: upper(&req.dose_text),
        units_required: req.units_required,
        frequency: upper_opt(req.frequency.as_deref()),
        acquisition: req.acquisition.unwrap_or_default(),
        notes: req.notes.as_deref().map(|n| n.trim().to_string()),
    };

    prep_requests::update_meta(&mut *tx, &plan.request_ids, &meta).await?;
    items::update_record_fields(&mut *tx, &plan.keep, &fields).await?;
    items::delete_many(&mut *tx, &plan.delete).await?;

    for date in &plan.create {
        let prep_request_id = prep_requests::upsert_for_date(&mut *tx, *date, patient.id, &meta).await?;
        let item = NewItem {
            prep_request_id,
            medication_id,
            dose_text: fields.dose_text.clone(),
            units_required: fields.units_required,
            frequency: fields.frequency.clone(),
            acquisition: fields.acquisition,
            notes: fields.notes.clone(),
            created_by: None,
        };
        items::insert(&mut *tx, &item).await?;
    }

    transactions.commit(tx).await?;

    let result = ReconcileResult {
        updated: plan.matched,
        created: plan.create.len(),
        deleted: plan.delete.len(),
    };
    info!(
        patient_id = %patient.id,
        updated = result.updated,
        created = result.created,
        deleted = result.deleted,
        "Record reconciled"
    );
    Ok(Json(api_success(result)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> serde_json::Value {
        serde_json::json!({
            "patient_id": Uuid::new_v4(),
            "national_id": "12.345.678-9",
            "medication": { "name": "1-23-45-6789 - PARACETAMOL" },
            "dose_text": "500 mg",
            "units_required": 1.5,
            "application_dates": ["2024-05-01", "2024-05-02"],
            "item_ids": [Uuid::new_v4()]
        })
    }

    #[test]
    fn test_effective_take() {
        assert_eq!(effective_take(None, false), Some(5));
        assert_eq!(effective_take(None, true), None);
        assert_eq!(effective_take(Some(0), true), Some(1));
        assert_eq!(effective_take(Some(90_000), false), Some(5000));
    }

    #[test]
    fn test_minimal_body_is_valid() {
        let req: ReconcileRecordRequest = serde_json::from_value(body()).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.prescription_number, None);
        assert_eq!(req.acquisition, None);
    }

    #[test]
    fn test_explicit_nulls_are_kept_apart_from_absent() {
        let mut value = body();
        value["prescriber_id"] = serde_json::Value::Null;
        value["name"] = serde_json::Value::Null;
        let req: ReconcileRecordRequest = serde_json::from_value(value).unwrap();
        assert_eq!(req.prescriber_id, Some(None));
        assert_eq!(req.name, Some(None));
        assert_eq!(req.pharmacist_id, None);
    }

    #[test]
    fn test_rejects_bad_prescription_number_and_empty_lists() {
        let mut value = body();
        value["prescription_number"] = serde_json::json!("12345");
        let req: ReconcileRecordRequest = serde_json::from_value(value).unwrap();
        assert!(req.validate().is_err());

        let mut value = body();
        value["item_ids"] = serde_json::json!([]);
        let req: ReconcileRecordRequest = serde_json::from_value(value).unwrap();
        assert!(req.validate().is_err());

        let mut value = body();
        value["application_dates"] = serde_json::json!([]);
        let req: ReconcileRecordRequest = serde_json::from_value(value).unwrap();
        assert!(req.validate().is_err());
    }
}
