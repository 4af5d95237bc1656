//! Shared search/upsert handlers for the staff catalogs
//!
//! Prescribers and pharmacists are the same shape of record (a code plus
//! first and last names) kept in two tables. Implement [`StaffCatalog`] with
//! the table name to get both endpoints.

use async_trait::async_trait;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{IdResponse, SearchParams};
use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ValidatedJson, ValidatedQuery};
use crate::server::PharmacyServer;
use crate::utils::query_builder::SearchQuery;
use crate::utils::validation::{not_blank, upper};

/// Prescriber or pharmacist
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct StaffMember {
    pub id: Uuid,
    pub code: String,
    pub first_names: String,
    pub last_names: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpsertStaffRequest {
    #[validate(custom(function = "not_blank"), length(max = 50))]
    pub code: String,
    #[validate(custom(function = "not_blank"), length(max = 200))]
    pub first_names: String,
    #[validate(custom(function = "not_blank"), length(max = 200))]
    pub last_names: String,
}

/// Trait for catalogs of staff members keyed by code
#[async_trait]
pub trait StaffCatalog {
    /// The database table name
    fn table_name() -> &'static str;

    /// Name used in logs and error messages
    fn resource_name() -> &'static str;

    /// Maximum rows returned by a search
    fn search_limit() -> i64 {
        50
    }

    /// Search by code or names, most recently touched first
    async fn search(
        State(server): State<PharmacyServer>,
        ValidatedQuery(params): ValidatedQuery<SearchParams>,
    ) -> Result<Json<ApiResponse<Vec<StaffMember>>>, ApiError> {
        let mut query = SearchQuery::new(format!(
            "SELECT id, code, first_names, last_names, created_at, updated_at FROM {} WHERE 1=1",
            Self::table_name()
        ));
        query
            .filter_contains_any(&["code", "first_names", "last_names"], params.query.as_deref())
            .order_by("updated_at", "DESC")
            .limit(Self::search_limit());

        let results = query.build::<StaffMember>().fetch_all(server.pool()).await?;
        Ok(Json(api_success(results)))
    }

    /// Insert or rename by code
    async fn upsert(
        State(server): State<PharmacyServer>,
        ValidatedJson(req): ValidatedJson<UpsertStaffRequest>,
    ) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
        let code = upper(&req.code);

        let id = sqlx::query_scalar::<_, Uuid>(&format!(
            r#"
            INSERT INTO {table} (id, code, first_names, last_names)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET first_names = EXCLUDED.first_names,
                last_names = EXCLUDED.last_names,
                updated_at = NOW()
            RETURNING id
            "#,
            table = Self::table_name()
        ))
        .bind(Uuid::new_v4())
        .bind(code.as_str())
        .bind(upper(&req.first_names))
        .bind(upper(&req.last_names))
        .fetch_one(server.pool())
        .await?;

        debug!(%id, code = %code, "{} saved", Self::resource_name());
        Ok(Json(api_success(IdResponse { id })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nurses;

    impl StaffCatalog for Nurses {
        fn table_name() -> &'static str {
            "nurses"
        }

        fn resource_name() -> &'static str {
            "Nurse"
        }
    }

    #[test]
    fn test_default_search_limit() {
        assert_eq!(Nurses::search_limit(), 50);
        assert_eq!(Nurses::table_name(), "nurses");
    }

    #[test]
    fn test_upsert_request_rejects_blank_names() {
        let req = UpsertStaffRequest {
            code: "mp-1".to_string(),
            first_names: "  ".to_string(),
            last_names: "Rojas".to_string(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("first_names"));
    }
}
