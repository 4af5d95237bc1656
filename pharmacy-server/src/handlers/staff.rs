use axum::{extract::State, Json};

use crate::error::{ApiError, ApiResponse};
use crate::handlers::common::crud::{StaffCatalog, StaffMember, UpsertStaffRequest};
use crate::handlers::common::{IdResponse, SearchParams};
use crate::middleware::{ValidatedJson, ValidatedQuery};
use crate::server::PharmacyServer;

pub struct Prescribers;

impl StaffCatalog for Prescribers {
    fn table_name() -> &'static str {
        "prescribers"
    }

    fn resource_name() -> &'static str {
        "Prescriber"
    }
}

pub struct Pharmacists;

impl StaffCatalog for Pharmacists {
    fn table_name() -> &'static str {
        "pharmacists"
    }

    fn resource_name() -> &'static str {
        "Pharmacist"
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/prescribers",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching prescribers", body = Vec<StaffMember>),
        (status = 400, description = "Invalid query")
    ),
    tag = "staff"
)]
pub async fn search_prescribers(
    state: State<PharmacyServer>,
    query: ValidatedQuery<SearchParams>,
) -> Result<Json<ApiResponse<Vec<StaffMember>>>, ApiError> {
    Prescribers::search(state, query).await
}

#[utoipa::path(
    post,
    path = "/api/v1/prescribers",
    request_body = UpsertStaffRequest,
    responses(
        (status = 200, description = "Prescriber saved", body = IdResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "staff"
)]
pub async fn upsert_prescriber(
    state: State<PharmacyServer>,
    body: ValidatedJson<UpsertStaffRequest>,
) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
    Prescribers::upsert(state, body).await
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacists",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching pharmacists", body = Vec<StaffMember>),
        (status = 400, description = "Invalid query")
    ),
    tag = "staff"
)]
pub async fn search_pharmacists(
    state: State<PharmacyServer>,
    query: ValidatedQuery<SearchParams>,
) -> Result<Json<ApiResponse<Vec<StaffMember>>>, ApiError> {
    Pharmacists::search(state, query).await
}

#[utoipa::path(
    post,
    path = "/api/v1/pharmacists",
    request_body = UpsertStaffRequest,
    responses(
        (status = 200, description = "Pharmacist saved", body = IdResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "staff"
)]
pub async fn upsert_pharmacist(
    state: State<PharmacyServer>,
    body: ValidatedJson<UpsertStaffRequest>,
) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
    Pharmacists::upsert(state, body).await
}
