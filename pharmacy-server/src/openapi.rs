use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::routes::paths;
use crate::server::PharmacyServer;

/// Main OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::handlers::health::health_check,
        crate::handlers::health::version_info,

        // Catalogs
        crate::handlers::patients::search_patients,
        crate::handlers::patients::upsert_patient,
        crate::handlers::patients::get_patient,
        crate::handlers::patients::update_patient,
        crate::handlers::medications::search_medications,
        crate::handlers::medications::upsert_medication,
        crate::handlers::medications::delete_medication,
        crate::handlers::medications::medication_patients,
        crate::handlers::staff::search_prescribers,
        crate::handlers::staff::upsert_prescriber,
        crate::handlers::staff::search_pharmacists,
        crate::handlers::staff::upsert_pharmacist,

        // Agenda and prep requests
        crate::handlers::agenda::list_agenda_items,
        crate::handlers::agenda::create_agenda_items,
        crate::handlers::agenda::update_agenda_item,
        crate::handlers::agenda::duplicate_agenda_item,
        crate::handlers::prep_requests::list_prep_requests,
        crate::handlers::prep_requests::get_prep_request,
        crate::handlers::prep_requests::delete_prep_request,
        crate::handlers::prep_requests::finalize_prep_request,

        // Records and registry
        crate::handlers::records::list_recent_records,
        crate::handlers::records::reconcile_record,
        crate::handlers::registry::list_registry,
        crate::handlers::registry::toggle_application,
        crate::handlers::patients::delete_patient_cascade,

        // Reports
        crate::handlers::reports::statistics,
        crate::handlers::reports::medication_range,
        crate::handlers::medications::medication_summary,
    ),
    components(
        schemas(
            crate::error::ApiErrorResponse,
            crate::types::ItemStatus,
            crate::types::Acquisition,
            crate::types::WindowInfo,

            // Health schemas
            crate::handlers::health::HealthResponse,
            crate::handlers::health::VersionResponse,

            // Shared schemas
            crate::handlers::common::IdResponse,
            crate::handlers::common::IdsResponse,
            crate::handlers::common::crud::StaffMember,
            crate::handlers::common::crud::UpsertStaffRequest,

            // Catalog schemas
            crate::repository::patients::Patient,
            crate::repository::patients::CascadeDeleteResult,
            crate::handlers::patients::UpsertPatientRequest,
            crate::handlers::patients::UpdatePatientRequest,
            crate::repository::medications::Medication,
            crate::repository::medications::MedicationOption,
            crate::handlers::medications::UpsertMedicationRequest,
            crate::handlers::medications::MedicationPatientsResponse,
            crate::services::record_grouping::MedicationPatient,
            crate::services::medication_catalog::MedicationGroup,

            // Agenda schemas
            crate::repository::items::AgendaItem,
            crate::handlers::agenda::PatientRef,
            crate::handlers::agenda::MedicationRef,
            crate::handlers::agenda::CreateItemsRequest,
            crate::handlers::agenda::UpdateItemRequest,
            crate::handlers::agenda::DuplicateItemRequest,

            // Prep request schemas
            crate::repository::prep_requests::PrepRequestSummary,
            crate::repository::prep_requests::PrepRequestHeader,
            crate::repository::prep_requests::RequestItemView,
            crate::repository::prep_requests::FinalizedRequest,
            crate::handlers::prep_requests::PrepRequestDetail,
            crate::handlers::prep_requests::DeletedPrepRequest,
            crate::handlers::prep_requests::FinalizeRequest,

            // Record and registry schemas
            crate::services::record_grouping::RecordGroup,
            crate::services::record_grouping::RegistryRow,
            crate::handlers::records::RecordMedication,
            crate::handlers::records::ReconcileRecordRequest,
            crate::handlers::records::ReconcileResult,
            crate::handlers::registry::RegistryResponse,
            crate::handlers::registry::ToggleApplicationRequest,
            crate::handlers::registry::ToggleApplicationResponse,

            // Report schemas
            crate::services::statistics::DateRange,
            crate::services::statistics::Totals,
            crate::services::statistics::DailyPoint,
            crate::services::statistics::CountEntry,
            crate::services::statistics::MedicationUsage,
            crate::services::statistics::Workload,
            crate::services::statistics::DeliveryTimes,
            crate::services::statistics::UpcomingDay,
            crate::services::statistics::Statistics,
            crate::services::statistics::RangeTotals,
            crate::services::statistics::RangeUsage,
            crate::services::statistics::MedicationRangeReport,
        )
    ),
    tags(
        (name = "health", description = "Service health and build information"),
        (name = "patients", description = "Patient catalog"),
        (name = "medications", description = "Medication catalog and patients per medication"),
        (name = "staff", description = "Prescriber and pharmacist catalogs"),
        (name = "agenda", description = "Daily preparation agenda"),
        (name = "prep-requests", description = "Preparation requests and finalization"),
        (name = "records", description = "Recent records and record reconciliation"),
        (name = "patient-registry", description = "Per-patient registry and application marks"),
        (name = "reports", description = "Statistics and medication demand reports"),
    ),
    info(
        title = "Pharmacy Preparation API",
        version = "1.0.0",
        description = "Hospital pharmacy preparation service: daily agenda, preparation requests, patient registry and reports.",
    ),
)]
pub struct ApiDoc;

/// Swagger UI plus the raw OpenAPI document
pub fn create_docs_routes() -> Router<PharmacyServer> {
    Router::new()
        .merge(SwaggerUi::new(paths::docs::SWAGGER_UI).url(paths::docs::OPENAPI_JSON, ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_versioned_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/api/v1/agenda/items"));
        assert!(doc.paths.paths.contains_key("/api/v1/patient-registry/application"));
        assert!(doc.paths.paths.contains_key("/api/v1/reports/statistics"));
    }
}
