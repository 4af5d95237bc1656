use axum::{
    extract::{Path, State},
    Json,
};
use logger_redacted::redact_id;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{api_success, ApiError, ApiResponse};
use crate::handlers::common::SearchParams;
use crate::middleware::{ValidatedJson, ValidatedQuery};
use crate::repository::patients::{self, CascadeDeleteResult, Patient};
use crate::server::PharmacyServer;
use crate::utils::validation::{not_blank, upper, upper_opt};

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpsertPatientRequest {
    #[validate(custom(function = "not_blank"), length(max = 50))]
    pub national_id: String,
    #[validate(length(max = 200))]
    pub name: Option<String>,
}

/// Partial identity update. An explicit `"name": null` clears the name.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePatientRequest {
    pub national_id: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub name: Option<Option<String>>,
}

impl Validate for UpdatePatientRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(national_id) = &self.national_id {
            if let Err(e) = not_blank(national_id) {
                errors.add("national_id", e);
            }
        }
        if let Some(Some(name)) = &self.name {
            if name.chars().count() > 200 {
                errors.add("name", ValidationError::new("length"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/patients",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching patients", body = Vec<Patient>)
    ),
    tag = "patients"
)]
pub async fn search_patients(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<SearchParams>,
) -> Result<Json<ApiResponse<Vec<Patient>>>, ApiError> {
    let results = patients::search(server.pool(), params.query.as_deref()).await?;
    Ok(Json(api_success(results)))
}

#[utoipa::path(
    post,
    path = "/api/v1/patients",
    request_body = UpsertPatientRequest,
    responses(
        (status = 200, description = "Patient created or refreshed", body = Patient),
        (status = 400, description = "Invalid input")
    ),
    tag = "patients"
)]
pub async fn upsert_patient(
    State(server): State<PharmacyServer>,
    ValidatedJson(req): ValidatedJson<UpsertPatientRequest>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    let national_id = upper(&req.national_id);
    let name = upper_opt(req.name.as_deref());

    let patient = patients::upsert(server.pool(), &national_id, name.as_deref()).await?;
    info!(id = %patient.id, patient = %redact_id(&national_id), "Patient saved");
    Ok(Json(api_success(patient)))
}

#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}",
    params(("id" = Uuid, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient", body = Patient),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients"
)]
pub async fn get_patient(
    State(server): State<PharmacyServer>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    let patient = patients::find(server.pool(), id)
        .await
        .map_err(|e| ApiError::or_not_found(e, "Patient"))?;
    Ok(Json(api_success(patient)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/patients/{id}",
    params(("id" = Uuid, Path, description = "Patient ID")),
    request_body = UpdatePatientRequest,
    responses(
        (status = 200, description = "Patient updated", body = Patient),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Patient not found"),
        (status = 409, description = "National id already in use")
    ),
    tag = "patients"
)]
pub async fn update_patient(
    State(server): State<PharmacyServer>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePatientRequest>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    let national_id = req.national_id.as_deref().map(upper);
    let name = req.name.map(|name| upper_opt(name.as_deref()));

    let patient = patients::update(
        server.pool(),
        id,
        national_id.as_deref(),
        name.as_ref().map(|n| n.as_deref()),
    )
    .await
    .map_err(|e| ApiError::or_not_found(e, "Patient"))?;

    Ok(Json(api_success(patient)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/patient-registry/{patient_id}",
    params(("patient_id" = Uuid, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient and dependants removed", body = CascadeDeleteResult),
        (status = 404, description = "Patient not found")
    ),
    tag = "patient-registry"
)]
pub async fn delete_patient_cascade(
    State(server): State<PharmacyServer>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CascadeDeleteResult>>, ApiError> {
    let transactions = server.transactions("delete_patient_cascade");
    let mut tx = transactions.begin().await?;

    let result = patients::delete_cascade(&mut *tx, patient_id)
        .await
        .map_err(|e| ApiError::or_not_found(e, "Patient"))?;

    transactions.commit(tx).await?;

    info!(
        %patient_id,
        deleted_items = result.deleted_items,
        deleted_prep_requests = result.deleted_prep_requests,
        "Patient deleted"
    );
    Ok(Json(api_success(result)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let absent: UpdatePatientRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(absent.name, None);

        let cleared: UpdatePatientRequest = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(cleared.name, Some(None));

        let set: UpdatePatientRequest = serde_json::from_str(r#"{"name": "ana"}"#).unwrap();
        assert_eq!(set.name, Some(Some("ana".to_string())));
    }

    #[test]
    fn test_update_rejects_blank_national_id() {
        let req = UpdatePatientRequest {
            national_id: Some("   ".to_string()),
            name: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_upsert_requires_national_id() {
        let req = UpsertPatientRequest {
            national_id: String::new(),
            name: Some("ANA".to_string()),
        };
        assert!(req.validate().is_err());
    }
}
