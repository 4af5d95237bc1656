//! Daily preparation agenda
//!
//! The agenda shows the items of every request that has not been finalized.
//! Creating items fans one prescription line out over up to
//! [`MAX_APPLY_DATES`] application dates, one request per patient and date.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use logger_redacted::redact_id;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{api_success, api_success_with_meta, ApiError, ApiResponse, ResponseMetadata};
use crate::handlers::common::{split_list, IdResponse, IdsResponse};
use crate::middleware::{OptionalJson, ValidatedJson, ValidatedQuery};
use crate::repository::items::{self, AgendaFilter, AgendaItem, ItemPatch, NewItem};
use crate::repository::patients;
use crate::repository::prep_requests::{self, RequestMeta};
use crate::server::PharmacyServer;
use crate::types::{Acquisition, ItemStatus};
use crate::utils::dates::{parse_iso_date, parse_optional_date, parse_rfc3339};
use crate::utils::validation::{
    iso_date, iso_dates, not_blank, prescription_number, upper, MAX_APPLY_DATES,
};

/// An identical item created this recently is treated as a double submit.
const DUPLICATE_WINDOW_MS: i64 = 2000;

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AgendaParams {
    /// Exact application date (`YYYY-MM-DD`)
    #[validate(custom(function = "iso_date"))]
    pub date: Option<String>,
    /// Patient national id or name fragment
    #[validate(length(max = 200))]
    pub patient: Option<String>,
    /// Medication name or code fragment
    #[validate(length(max = 200))]
    pub med: Option<String>,
    /// Comma-separated item statuses
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PatientRef {
    #[validate(custom(function = "not_blank"), length(max = 50))]
    pub national_id: String,
    #[validate(custom(function = "not_blank"), length(max = 200))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MedicationRef {
    pub id: Uuid,
    pub institutional_code: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateItemsRequest {
    #[validate(custom(function = "iso_date"))]
    pub application_date: Option<String>,
    #[validate(
        length(max = 16, message = "at most 16 application dates"),
        custom(function = "iso_dates")
    )]
    pub application_dates: Option<Vec<String>>,
    #[validate(custom(function = "iso_date"))]
    pub reception_date: String,
    #[validate(custom(function = "prescription_number"))]
    pub prescription_number: String,
    pub prescriber_id: Uuid,
    pub pharmacist_id: Uuid,
    #[validate(nested)]
    pub patient: PatientRef,
    #[validate(nested)]
    pub medication: MedicationRef,
    #[validate(custom(function = "not_blank"))]
    pub dose_text: String,
    #[validate(range(exclusive_min = 0.0, message = "units must be greater than zero"))]
    pub units_required: f64,
    #[validate(custom(function = "not_blank"), length(min = 1, max = 50))]
    pub frequency: String,
    pub acquisition: Acquisition,
    #[validate(length(max = 300))]
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

impl CreateItemsRequest {
    /// Distinct application dates, ascending. The list wins over the single
    /// date when both are sent.
    pub fn resolved_dates(&self) -> Result<Vec<NaiveDate>, ApiError> {
        let raw: Vec<&str> = match &self.application_dates {
            Some(dates) if !dates.is_empty() => dates.iter().map(String::as_str).collect(),
            _ => self.application_date.as_deref().into_iter().collect(),
        };

        let dates = raw
            .into_iter()
            .map(parse_iso_date)
            .collect::<Result<BTreeSet<_>, _>>()?;

        if dates.is_empty() {
            return Err(ApiError::validation("at least one application date is required"));
        }
        if dates.len() > MAX_APPLY_DATES {
            return Err(ApiError::validation(format!(
                "at most {} application dates",
                MAX_APPLY_DATES
            )));
        }
        Ok(dates.into_iter().collect())
    }
}

/// Partial item update. Nullable fields accept an explicit `null`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub status: Option<ItemStatus>,
    pub dose_text: Option<String>,
    pub units_required: Option<f64>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub updated_by: Option<Option<String>>,
    /// RFC 3339 timestamp
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub delivered_at: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub cancel_reason: Option<Option<String>>,
}

fn too_long(max: usize) -> ValidationError {
    let mut err = ValidationError::new("length");
    err.add_param("max".into(), &max);
    err
}

impl Validate for UpdateItemRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(dose) = &self.dose_text {
            if let Err(e) = not_blank(dose) {
                errors.add("dose_text", e);
            }
        }
        if let Some(units) = self.units_required {
            if units <= 0.0 || !units.is_finite() {
                errors.add("units_required", ValidationError::new("range"));
            }
        }
        if let Some(Some(notes)) = &self.notes {
            if notes.trim().chars().count() > 300 {
                errors.add("notes", too_long(300));
            }
        }
        if let Some(Some(reason)) = &self.cancel_reason {
            if reason.trim().chars().count() > 200 {
                errors.add("cancel_reason", too_long(200));
            }
        }
        if let Some(Some(by)) = &self.updated_by {
            if let Err(e) = not_blank(by) {
                errors.add("updated_by", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl UpdateItemRequest {
    fn into_patch(self) -> Result<ItemPatch, ApiError> {
        let delivered_at = match self.delivered_at {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) => Some(Some(parse_rfc3339(&raw)?)),
        };

        Ok(ItemPatch {
            status: self.status,
            dose_text: self.dose_text.map(|d| d.trim().to_string()),
            units_required: self.units_required,
            notes: self.notes.map(|n| n.map(|v| v.trim().to_string())),
            updated_by: self.updated_by.map(|u| u.map(|v| v.trim().to_string())),
            delivered_at,
            cancel_reason: self.cancel_reason.map(|r| r.map(|v| v.trim().to_string())),
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct DuplicateItemRequest {
    #[validate(length(max = 100))]
    pub created_by: Option<String>,
}

/// Parse the comma-separated status filter.
fn parse_statuses(raw: Option<&str>) -> Result<Vec<ItemStatus>, ApiError> {
    split_list(raw)
        .into_iter()
        .map(|s| s.parse::<ItemStatus>().map_err(ApiError::validation))
        .collect()
}

// ============================================================================
// HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/agenda/items",
    params(AgendaParams),
    responses(
        (status = 200, description = "Open preparation items", body = Vec<AgendaItem>),
        (status = 400, description = "Invalid filter")
    ),
    tag = "agenda"
)]
pub async fn list_agenda_items(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<AgendaParams>,
) -> Result<Json<ApiResponse<Vec<AgendaItem>>>, ApiError> {
    let filter = AgendaFilter {
        application_date: parse_optional_date(params.date.as_deref())?,
        patient: params.patient,
        medication: params.med,
        statuses: parse_statuses(params.status.as_deref())?,
    };

    let rows = items::list_agenda(server.pool(), &filter).await?;
    Ok(Json(api_success_with_meta(rows, ResponseMetadata::now())))
}

#[utoipa::path(
    post,
    path = "/api/v1/agenda/items",
    request_body = CreateItemsRequest,
    responses(
        (status = 200, description = "Item ids in application date order", body = IdsResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "agenda"
)]
pub async fn create_agenda_items(
    State(server): State<PharmacyServer>,
    ValidatedJson(req): ValidatedJson<CreateItemsRequest>,
) -> Result<Json<ApiResponse<IdsResponse>>, ApiError> {
    let dates = req.resolved_dates()?;
    let reception_date = parse_iso_date(&req.reception_date)?;
    let national_id = upper(&req.patient.national_id);
    let created_by = req
        .created_by
        .as_deref()
        .map(str::trim)
        .filter(|by| !by.is_empty())
        .map(str::to_string);

    let meta = RequestMeta {
        reception_date: Some(reception_date),
        prescription_number: Some(Some(req.prescription_number.trim().to_string())),
        prescriber_id: Some(Some(req.prescriber_id)),
        pharmacist_id: Some(Some(req.pharmacist_id)),
        actor: created_by.clone(),
    };

    let transactions = server.transactions("create_agenda_items");
    let mut tx = transactions.begin().await?;

    let patient = patients::upsert(&mut *tx, &national_id, Some(&upper(&req.patient.name))).await?;
    let since: DateTime<Utc> = Utc::now() - Duration::milliseconds(DUPLICATE_WINDOW_MS);

    let mut ids = Vec::with_capacity(dates.len());
    for date in &dates {
        let prep_request_id = prep_requests::upsert_for_date(&mut *tx, *date, patient.id, &meta).await?;

        let item = NewItem {
            prep_request_id,
            medication_id: req.medication.id,
            dose_text: upper(&req.dose_text),
            units_required: req.units_required,
            frequency: Some(upper(&req.frequency)),
            acquisition: req.acquisition,
            notes: req.notes.as_deref().map(|n| n.trim().to_string()),
            created_by: created_by.clone(),
        };

        if let Some(existing) = items::find_recent_duplicate(&mut *tx, &item, since).await? {
            debug!(id = %existing, %date, "Reusing item from a repeated submit");
            ids.push(existing);
            continue;
        }

        ids.push(items::insert(&mut *tx, &item).await?);
    }

    transactions.commit(tx).await?;

    info!(
        patient = %redact_id(&national_id),
        medication_id = %req.medication.id,
        dates = dates.len(),
        "Preparation items created"
    );
    Ok(Json(api_success(IdsResponse { ids })))
}

#[utoipa::path(
    patch,
    path = "/api/v1/agenda/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = IdResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Item not found")
    ),
    tag = "agenda"
)]
pub async fn update_agenda_item(
    State(server): State<PharmacyServer>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateItemRequest>,
) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
    let patch = req.into_patch()?;

    let id = items::update(server.pool(), id, &patch)
        .await
        .map_err(|e| ApiError::or_not_found(e, "Item"))?;

    debug!(%id, status = ?patch.status, "Item updated");
    Ok(Json(api_success(IdResponse { id })))
}

#[utoipa::path(
    post,
    path = "/api/v1/agenda/items/{id}/duplicate",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body(content = DuplicateItemRequest, description = "Optional author of the copy"),
    responses(
        (status = 200, description = "New pending item", body = IdResponse),
        (status = 404, description = "Item not found")
    ),
    tag = "agenda"
)]
pub async fn duplicate_agenda_item(
    State(server): State<PharmacyServer>,
    Path(id): Path<Uuid>,
    OptionalJson(req): OptionalJson<DuplicateItemRequest>,
) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
    let created_by = req.created_by.as_deref().map(str::trim).filter(|by| !by.is_empty());

    let new_id = items::duplicate(server.pool(), id, created_by)
        .await
        .map_err(|e| ApiError::or_not_found(e, "Item"))?;

    debug!(source = %id, id = %new_id, "Item duplicated");
    Ok(Json(api_success(IdResponse { id: new_id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(dates: Option<Vec<&str>>, single: Option<&str>) -> CreateItemsRequest {
        CreateItemsRequest {
            application_date: single.map(str::to_string),
            application_dates: dates.map(|d| d.into_iter().map(str::to_string).collect()),
            reception_date: "2024-05-01".to_string(),
            prescription_number: "123456".to_string(),
            prescriber_id: Uuid::new_v4(),
            pharmacist_id: Uuid::new_v4(),
            patient: PatientRef {
                national_id: "12.345.678-9".to_string(),
                name: "Ana Rojas".to_string(),
            },
            medication: MedicationRef {
                id: Uuid::new_v4(),
                institutional_code: None,
                name: "PARACETAMOL".to_string(),
            },
            dose_text: "500 mg".to_string(),
            units_required: 2.0,
            frequency: "c/8h".to_string(),
            acquisition: Acquisition::Stockable,
            notes: None,
            created_by: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_dates_are_deduplicated_and_sorted() {
        let req = request(Some(vec!["2024-05-03", "2024-05-01", "2024-05-03"]), Some("2024-05-09"));
        assert_eq!(req.resolved_dates().unwrap(), vec![day(1), day(3)]);
    }

    #[test]
    fn test_single_date_is_used_without_list() {
        let req = request(Some(vec![]), Some("2024-05-09"));
        assert_eq!(req.resolved_dates().unwrap(), vec![day(9)]);
    }

    #[test]
    fn test_missing_or_impossible_dates_fail() {
        assert!(request(None, None).resolved_dates().is_err());
        assert!(request(Some(vec!["2024-02-30"]), None).resolved_dates().is_err());
    }

    #[test]
    fn test_schema_rules() {
        assert!(request(Some(vec!["2024-05-01"]), None).validate().is_ok());

        let mut req = request(Some(vec!["2024-05-01"]), None);
        req.prescription_number = "12345".to_string();
        assert!(req.validate().is_err());

        let mut req = request(Some(vec!["2024-05-01"]), None);
        req.units_required = 0.0;
        assert!(req.validate().is_err());

        let many: Vec<String> = (1..=17).map(|d| format!("2024-05-{:02}", d)).collect();
        let mut req = request(None, None);
        req.application_dates = Some(many);
        assert!(req.validate().is_err());

        let mut req = request(Some(vec!["2024-05-01"]), None);
        req.patient.name = "  ".to_string();
        let errors = req.validate().unwrap_err();
        assert!(crate::middleware::extractors::field_errors(&errors).contains_key("patient.name"));
    }

    #[test]
    fn test_patch_parses_delivery_time() {
        let req: UpdateItemRequest = serde_json::from_str(
            r#"{"status": "delivered", "delivered_at": "2024-05-01T10:00:00Z", "notes": null}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());

        let patch = req.into_patch().unwrap();
        assert_eq!(patch.status, Some(ItemStatus::Delivered));
        assert!(matches!(patch.delivered_at, Some(Some(_))));
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.cancel_reason, None);
    }

    #[test]
    fn test_patch_rejects_bad_values() {
        let req: UpdateItemRequest = serde_json::from_str(r#"{"units_required": -1}"#).unwrap();
        assert!(req.validate().is_err());

        let req: UpdateItemRequest = serde_json::from_str(r#"{"delivered_at": "yesterday"}"#).unwrap();
        assert!(req.into_patch().is_err());
    }

    #[test]
    fn test_status_filter() {
        assert_eq!(
            parse_statuses(Some("pending,ready")).unwrap(),
            vec![ItemStatus::Pending, ItemStatus::Ready]
        );
        assert!(parse_statuses(Some("pending,unknown")).is_err());
        assert!(parse_statuses(None).unwrap().is_empty());
    }
}
