//! Centralized API route path constants
//!
//! utoipa `#[path(...)]` attributes need string literals, so the handler
//! annotations repeat these values; keep both in sync.
//! Paths under a module are relative to [`API_V1`].

/// API base path
pub const API_V1: &str = "/api/v1";

/// Health check endpoints
pub mod health {
    pub const HEALTH: &str = "/health";
    pub const VERSION: &str = "/version";
}

/// Documentation endpoints
pub mod docs {
    pub const SWAGGER_UI: &str = "/docs";
    pub const OPENAPI_JSON: &str = "/api-docs/openapi.json";
}

/// Catalog endpoints
pub mod catalogs {
    pub const PATIENTS: &str = "/patients";
    pub const PATIENT_BY_ID: &str = "/patients/:id";
    pub const MEDICATIONS: &str = "/medications";
    pub const MEDICATION_BY_ID: &str = "/medications/:id";
    pub const MEDICATION_PATIENTS: &str = "/medications/:id/patients";
    pub const PRESCRIBERS: &str = "/prescribers";
    pub const PHARMACISTS: &str = "/pharmacists";
}

/// Daily agenda endpoints
pub mod agenda {
    pub const ITEMS: &str = "/agenda/items";
    pub const ITEM_BY_ID: &str = "/agenda/items/:id";
    pub const ITEM_DUPLICATE: &str = "/agenda/items/:id/duplicate";
}

/// Prep request endpoints
pub mod prep_requests {
    pub const PREP_REQUESTS: &str = "/prep-requests";
    pub const PREP_REQUEST_BY_ID: &str = "/prep-requests/:id";
    pub const FINALIZE: &str = "/prep-requests/:id/finalize";
}

/// Record and registry endpoints
pub mod records {
    pub const RECORDS: &str = "/records";
    pub const REGISTRY: &str = "/patient-registry";
    pub const REGISTRY_PATIENT: &str = "/patient-registry/:patient_id";
    pub const REGISTRY_APPLICATION: &str = "/patient-registry/application";
}

/// Report endpoints
pub mod reports {
    pub const STATISTICS: &str = "/reports/statistics";
    pub const MEDICATION_RANGE: &str = "/reports/medication-range";
    pub const MEDICATION_SUMMARY: &str = "/reports/medication-summary";
}
