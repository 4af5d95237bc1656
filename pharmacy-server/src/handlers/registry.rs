use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ValidatedJson, ValidatedQuery};
use crate::repository::items;
use crate::server::PharmacyServer;
use crate::services::record_grouping::{group_registry, RegistryRow};
use crate::types::{Window, WindowInfo};
use crate::utils::dates::parse_iso_date;
use crate::utils::validation::{iso_date, not_blank};

const DEFAULT_TAKE: usize = 50;
const MAX_TAKE: usize = 200;

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegistryParams {
    /// Matches dose, medication, prescription number, patient or pharmacist
    #[validate(length(max = 200))]
    pub q: Option<String>,
    /// Include finalized requests
    pub historical: Option<bool>,
    pub take: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegistryResponse {
    pub rows: Vec<RegistryRow>,
    #[serde(flatten)]
    pub window: WindowInfo,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ToggleApplicationRequest {
    pub patient_id: Uuid,
    pub medication_id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub dose_text: String,
    #[validate(custom(function = "iso_date"))]
    pub application_date: String,
    /// Target state; flips the current state when absent
    pub applied: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleApplicationResponse {
    pub applied: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/patient-registry",
    params(RegistryParams),
    responses(
        (status = 200, description = "Registry lines with planned and applied dates", body = RegistryResponse)
    ),
    tag = "patient-registry"
)]
pub async fn list_registry(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<RegistryParams>,
) -> Result<Json<ApiResponse<RegistryResponse>>, ApiError> {
    let window = Window::resolve(params.take, params.offset, DEFAULT_TAKE, MAX_TAKE);

    let rows = items::registry_rows(
        server.pool(),
        params.q.as_deref(),
        params.historical.unwrap_or(false),
    )
    .await?;

    let (rows, window) = window.apply(group_registry(rows));
    Ok(Json(api_success(RegistryResponse { rows, window })))
}

#[utoipa::path(
    patch,
    path = "/api/v1/patient-registry/application",
    request_body = ToggleApplicationRequest,
    responses(
        (status = 200, description = "New application state", body = ToggleApplicationResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "No matching items")
    ),
    tag = "patient-registry"
)]
pub async fn toggle_application(
    State(server): State<PharmacyServer>,
    ValidatedJson(req): ValidatedJson<ToggleApplicationRequest>,
) -> Result<Json<ApiResponse<ToggleApplicationResponse>>, ApiError> {
    let application_date = parse_iso_date(&req.application_date)?;

    let marks = items::application_marks(
        server.pool(),
        req.patient_id,
        req.medication_id,
        req.dose_text.trim(),
        application_date,
    )
    .await?;

    if marks.is_empty() {
        return Err(ApiError::not_found("Application items"));
    }

    let all_applied = marks.iter().all(|mark| mark.applied_at.is_some());
    let applied = req.applied.unwrap_or(!all_applied);
    let ids: Vec<Uuid> = marks.iter().map(|mark| mark.id).collect();

    items::set_applied(server.pool(), &ids, applied).await?;

    info!(
        patient_id = %req.patient_id,
        medication_id = %req.medication_id,
        date = %application_date,
        applied,
        "Application mark updated"
    );
    Ok(Json(api_success(ToggleApplicationResponse { applied })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_request_validation() {
        let req = ToggleApplicationRequest {
            patient_id: Uuid::new_v4(),
            medication_id: Uuid::new_v4(),
            dose_text: "500 MG".to_string(),
            application_date: "2024-05-01".to_string(),
            applied: None,
        };
        assert!(req.validate().is_ok());

        let req = ToggleApplicationRequest {
            application_date: "01/05/2024".to_string(),
            ..req
        };
        assert!(req.validate().is_err());
    }
}
