use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{OptionalJson, ValidatedQuery};
use crate::repository::prep_requests::{
    self, FinalizedRequest, PrepRequestHeader, PrepRequestSummary, RequestItemView,
};
use crate::server::PharmacyServer;
use crate::utils::dates::parse_optional_date;
use crate::utils::validation::iso_date;

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPrepRequestsParams {
    #[validate(custom(function = "iso_date"))]
    pub date: Option<String>,
    /// Finalized requests instead of open ones
    pub historical: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PrepRequestDetail {
    #[serde(flatten)]
    pub request: PrepRequestHeader,
    pub items: Vec<RequestItemView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedPrepRequest {
    pub id: Uuid,
    pub deleted_items: u64,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct FinalizeRequest {
    #[validate(length(min = 1, max = 100))]
    pub finalized_by: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/prep-requests",
    params(ListPrepRequestsParams),
    responses(
        (status = 200, description = "Preparation requests", body = Vec<PrepRequestSummary>),
        (status = 400, description = "Invalid date")
    ),
    tag = "prep-requests"
)]
pub async fn list_prep_requests(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<ListPrepRequestsParams>,
) -> Result<Json<ApiResponse<Vec<PrepRequestSummary>>>, ApiError> {
    let date = parse_optional_date(params.date.as_deref())?;
    let rows = prep_requests::list(server.pool(), date, params.historical.unwrap_or(false)).await?;
    Ok(Json(api_success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/prep-requests/{id}",
    params(("id" = Uuid, Path, description = "Prep request ID")),
    responses(
        (status = 200, description = "Request with its items", body = PrepRequestDetail),
        (status = 404, description = "Prep request not found")
    ),
    tag = "prep-requests"
)]
pub async fn get_prep_request(
    State(server): State<PharmacyServer>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PrepRequestDetail>>, ApiError> {
    let request = prep_requests::find_header(server.pool(), id)
        .await
        .map_err(|e| ApiError::or_not_found(e, "Prep request"))?;
    let items = prep_requests::items_of(server.pool(), id).await?;

    Ok(Json(api_success(PrepRequestDetail { request, items })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/prep-requests/{id}",
    params(("id" = Uuid, Path, description = "Prep request ID")),
    responses(
        (status = 200, description = "Request and its items deleted", body = DeletedPrepRequest),
        (status = 404, description = "Prep request not found")
    ),
    tag = "prep-requests"
)]
pub async fn delete_prep_request(
    State(server): State<PharmacyServer>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeletedPrepRequest>>, ApiError> {
    let transactions = server.transactions("delete_prep_request");
    let mut tx = transactions.begin().await?;

    let deleted_items = prep_requests::delete(&mut *tx, id)
        .await
        .map_err(|e| ApiError::or_not_found(e, "Prep request"))?;

    transactions.commit(tx).await?;

    info!(%id, deleted_items, "Prep request deleted");
    Ok(Json(api_success(DeletedPrepRequest { id, deleted_items })))
}

#[utoipa::path(
    post,
    path = "/api/v1/prep-requests/{id}/finalize",
    params(("id" = Uuid, Path, description = "Prep request ID")),
    request_body(content = FinalizeRequest, description = "Optional name of who closes the request"),
    responses(
        (status = 200, description = "Request finalized", body = FinalizedRequest),
        (status = 404, description = "Prep request not found")
    ),
    tag = "prep-requests"
)]
pub async fn finalize_prep_request(
    State(server): State<PharmacyServer>,
    Path(id): Path<Uuid>,
    OptionalJson(req): OptionalJson<FinalizeRequest>,
) -> Result<Json<ApiResponse<FinalizedRequest>>, ApiError> {
    let finalized_by = req.finalized_by.as_deref().map(str::trim).filter(|by| !by.is_empty());

    let finalized = prep_requests::finalize(server.pool(), id, finalized_by)
        .await
        .map_err(|e| ApiError::or_not_found(e, "Prep request"))?;

    info!(%id, finalized_by = ?finalized.finalized_by, "Prep request finalized");
    Ok(Json(api_success(finalized)))
}
