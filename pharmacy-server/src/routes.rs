pub mod paths;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::{
    handlers::{agenda, health, medications, patients, prep_requests, records, registry, reports, staff},
    openapi,
    server::PharmacyServer,
};

/// Create health check routes
pub fn health_routes() -> Router<PharmacyServer> {
    Router::new()
        .route(paths::health::HEALTH, get(health::health_check))
        .route(paths::health::VERSION, get(health::version_info))
}

/// Patient, medication and staff catalogs
pub fn catalog_routes() -> Router<PharmacyServer> {
    use paths::catalogs::*;

    Router::new()
        .route(PATIENTS, get(patients::search_patients).post(patients::upsert_patient))
        .route(PATIENT_BY_ID, get(patients::get_patient).patch(patients::update_patient))
        .route(
            MEDICATIONS,
            get(medications::search_medications).post(medications::upsert_medication),
        )
        .route(MEDICATION_BY_ID, delete(medications::delete_medication))
        .route(MEDICATION_PATIENTS, get(medications::medication_patients))
        .route(PRESCRIBERS, get(staff::search_prescribers).post(staff::upsert_prescriber))
        .route(PHARMACISTS, get(staff::search_pharmacists).post(staff::upsert_pharmacist))
}

/// Daily agenda and prep request routes
pub fn agenda_routes() -> Router<PharmacyServer> {
    Router::new()
        .route(
            paths::agenda::ITEMS,
            get(agenda::list_agenda_items).post(agenda::create_agenda_items),
        )
        .route(paths::agenda::ITEM_BY_ID, patch(agenda::update_agenda_item))
        .route(paths::agenda::ITEM_DUPLICATE, post(agenda::duplicate_agenda_item))
        .route(
            paths::prep_requests::PREP_REQUESTS,
            get(prep_requests::list_prep_requests),
        )
        .route(
            paths::prep_requests::PREP_REQUEST_BY_ID,
            get(prep_requests::get_prep_request).delete(prep_requests::delete_prep_request),
        )
        .route(
            paths::prep_requests::FINALIZE,
            post(prep_requests::finalize_prep_request),
        )
}

/// History, registry and report routes
pub fn record_routes() -> Router<PharmacyServer> {
    Router::new()
        .route(
            paths::records::RECORDS,
            get(records::list_recent_records).patch(records::reconcile_record),
        )
        .route(paths::records::REGISTRY, get(registry::list_registry))
        .route(
            paths::records::REGISTRY_APPLICATION,
            patch(registry::toggle_application),
        )
        .route(
            paths::records::REGISTRY_PATIENT,
            delete(patients::delete_patient_cascade),
        )
        .route(paths::reports::STATISTICS, get(reports::statistics))
        .route(paths::reports::MEDICATION_RANGE, get(reports::medication_range))
        .route(
            paths::reports::MEDICATION_SUMMARY,
            get(medications::medication_summary),
        )
}

/// Create API v1 routes
pub fn api_v1_routes() -> Router<PharmacyServer> {
    Router::new()
        .merge(catalog_routes())
        .merge(agenda_routes())
        .merge(record_routes())
}

/// Create all application routes
pub fn create_routes() -> Router<PharmacyServer> {
    Router::new()
        .merge(health_routes())
        .merge(openapi::create_docs_routes())
        .nest(paths::API_V1, api_v1_routes())
}
