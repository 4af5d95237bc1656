use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::handlers::common::{split_list, IdResponse, SearchParams};
use crate::middleware::{ValidatedJson, ValidatedQuery};
use crate::repository::{items, medications};
use crate::repository::medications::{MedicationFields, MedicationOption};
use crate::server::PharmacyServer;
use crate::services::medication_catalog::{summarize, MedicationGroup};
use crate::services::record_grouping::{group_medication_patients, MedicationPatient};
use crate::types::{Window, WindowInfo};
use crate::utils::dates::parse_optional_date;
use crate::utils::validation::{iso_date, not_blank, upper, upper_opt};

const PATIENTS_DEFAULT_TAKE: usize = 50;
const PATIENTS_MAX_TAKE: usize = 200;
const SUMMARY_DEFAULT_TAKE: usize = 300;
const SUMMARY_MAX_TAKE: usize = 500;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpsertMedicationRequest {
    #[validate(length(max = 50))]
    pub institutional_code: Option<String>,
    #[validate(custom(function = "not_blank"), length(max = 300))]
    pub name: String,
    #[validate(length(max = 100))]
    pub concentration: Option<String>,
    #[validate(length(max = 100))]
    pub route: Option<String>,
    #[validate(length(max = 100))]
    pub presentation: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MedicationPatientsParams {
    /// Restrict to one application date (`YYYY-MM-DD`)
    #[validate(custom(function = "iso_date"))]
    pub date: Option<String>,
    /// Include finalized requests
    pub historical: Option<bool>,
    pub take: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MedicationPatientsResponse {
    pub patients: Vec<MedicationPatient>,
    #[serde(flatten)]
    pub window: WindowInfo,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MedicationSummaryParams {
    #[validate(length(max = 200))]
    pub q: Option<String>,
    pub take: Option<i64>,
}

// ============================================================================
// HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/medications",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching medications with display labels", body = Vec<MedicationOption>)
    ),
    tag = "medications"
)]
pub async fn search_medications(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<SearchParams>,
) -> Result<Json<ApiResponse<Vec<MedicationOption>>>, ApiError> {
    let results = medications::search(server.pool(), params.query.as_deref())
        .await?
        .into_iter()
        .map(MedicationOption::from)
        .collect();
    Ok(Json(api_success(results)))
}

#[utoipa::path(
    post,
    path = "/api/v1/medications",
    request_body = UpsertMedicationRequest,
    responses(
        (status = 200, description = "Medication saved", body = IdResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "medications"
)]
pub async fn upsert_medication(
    State(server): State<PharmacyServer>,
    ValidatedJson(req): ValidatedJson<UpsertMedicationRequest>,
) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
    let fields = MedicationFields {
        institutional_code: upper_opt(req.institutional_code.as_deref()),
        name: upper(&req.name),
        concentration: upper_opt(req.concentration.as_deref()),
        route: upper_opt(req.route.as_deref()),
        presentation: upper_opt(req.presentation.as_deref()),
    };

    let id = medications::save(server.pool(), &fields).await?;
    debug!(%id, code = ?fields.institutional_code, "Medication saved");
    Ok(Json(api_success(IdResponse { id })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/medications/{id}",
    params(("id" = Uuid, Path, description = "Medication ID")),
    responses(
        (status = 200, description = "Medication deleted", body = IdResponse),
        (status = 404, description = "Medication not found"),
        (status = 409, description = "Medication is referenced by preparation items")
    ),
    tag = "medications"
)]
pub async fn delete_medication(
    State(server): State<PharmacyServer>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
    medications::delete(server.pool(), id)
        .await
        .map_err(|e| ApiError::or_not_found(e, "Medication"))?;

    info!(%id, "Medication deleted");
    Ok(Json(api_success(IdResponse { id })))
}

#[utoipa::path(
    get,
    path = "/api/v1/medications/{id}/patients",
    params(
        ("id" = String, Path, description = "One medication ID or several, comma-separated"),
        MedicationPatientsParams
    ),
    responses(
        (status = 200, description = "Patients receiving the medications", body = MedicationPatientsResponse),
        (status = 400, description = "Invalid ids or query")
    ),
    tag = "medications"
)]
pub async fn medication_patients(
    State(server): State<PharmacyServer>,
    Path(ids): Path<String>,
    ValidatedQuery(params): ValidatedQuery<MedicationPatientsParams>,
) -> Result<Json<ApiResponse<MedicationPatientsResponse>>, ApiError> {
    let medication_ids = parse_id_list(&ids)?;
    let date = parse_optional_date(params.date.as_deref())?;
    let window = Window::resolve(params.take, params.offset, PATIENTS_DEFAULT_TAKE, PATIENTS_MAX_TAKE);

    let rows = items::rows_for_medications(
        server.pool(),
        medication_ids,
        date,
        params.historical.unwrap_or(false),
    )
    .await?;

    let (patients, window) = window.apply(group_medication_patients(rows));
    Ok(Json(api_success(MedicationPatientsResponse { patients, window })))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/medication-summary",
    params(MedicationSummaryParams),
    responses(
        (status = 200, description = "Catalog entries merged by normalized name", body = Vec<MedicationGroup>)
    ),
    tag = "reports"
)]
pub async fn medication_summary(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<MedicationSummaryParams>,
) -> Result<Json<ApiResponse<Vec<MedicationGroup>>>, ApiError> {
    let window = Window::resolve(params.take, None, SUMMARY_DEFAULT_TAKE, SUMMARY_MAX_TAKE);
    let fetch = i64::try_from(window.take.saturating_mul(4)).unwrap_or(i64::MAX);

    let candidates = medications::summary_candidates(server.pool(), params.q.as_deref(), fetch).await?;
    Ok(Json(api_success(summarize(candidates, window.take))))
}

/// Parse the comma-separated id list of the medication patients route.
fn parse_id_list(raw: &str) -> Result<Vec<Uuid>, ApiError> {
    let ids = split_list(Some(raw))
        .into_iter()
        .map(|part| {
            Uuid::parse_str(part)
                .map_err(|_| ApiError::validation(format!("invalid medication id '{}'", part)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ApiError::validation("at least one medication id is required"));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_id_list(&format!("{}, {},", a, b)).unwrap();
        assert_eq!(ids, vec![a, b]);

        assert!(parse_id_list(" , ").is_err());
        assert!(parse_id_list("not-a-uuid").is_err());
    }

    #[test]
    fn test_upsert_requires_name() {
        let req = UpsertMedicationRequest {
            institutional_code: Some("1-23-45-6789".to_string()),
            name: " ".to_string(),
            concentration: None,
            route: None,
            presentation: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_patients_params_reject_bad_date() {
        let params = MedicationPatientsParams {
            date: Some("2024/01/01".to_string()),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
