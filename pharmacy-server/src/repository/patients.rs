use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{DatabaseError, DatabaseResult};
use crate::utils::query_builder::SearchQuery;

pub const SEARCH_LIMIT: i64 = 20;

const COLUMNS: &str = "id, national_id, name, created_at, updated_at";

/// Patient structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub national_id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rows removed by a cascading patient delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CascadeDeleteResult {
    pub deleted_items: u64,
    pub deleted_prep_requests: u64,
}

pub async fn search<'e, E>(executor: E, term: Option<&str>) -> DatabaseResult<Vec<Patient>>
where
    E: PgExecutor<'e>,
{
    let mut query = SearchQuery::new("SELECT id, national_id, name, created_at, updated_at FROM patients WHERE 1=1");
    query
        .filter_contains_any(&["national_id", "name"], term)
        .order_by("updated_at", "DESC")
        .limit(SEARCH_LIMIT);

    Ok(query.build::<Patient>().fetch_all(executor).await?)
}

pub async fn find<'e, E>(executor: E, id: Uuid) -> DatabaseResult<Patient>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Patient>(&format!("SELECT {} FROM patients WHERE id = $1", COLUMNS))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(DatabaseError::NotFound)
}

/// Insert or refresh by national id. Values must already be upper-cased;
/// `None` keeps the stored name.
pub async fn upsert<'e, E>(executor: E, national_id: &str, name: Option<&str>) -> DatabaseResult<Patient>
where
    E: PgExecutor<'e>,
{
    let patient = sqlx::query_as::<_, Patient>(&format!(
        r#"
        INSERT INTO patients (id, national_id, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (national_id) DO UPDATE
        SET name = COALESCE(EXCLUDED.name, patients.name),
            updated_at = NOW()
        RETURNING {}
        "#,
        COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(national_id)
    .bind(name)
    .fetch_one(executor)
    .await?;

    Ok(patient)
}

/// Patch identity fields. `name` is `None` to leave it, `Some(None)` to
/// clear it.
pub async fn update<'e, E>(
    executor: E,
    id: Uuid,
    national_id: Option<&str>,
    name: Option<Option<&str>>,
) -> DatabaseResult<Patient>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Patient>(&format!(
        r#"
        UPDATE patients
        SET national_id = COALESCE($2, national_id),
            name = CASE WHEN $3 THEN $4 ELSE name END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        COLUMNS
    ))
    .bind(id)
    .bind(national_id)
    .bind(name.is_some())
    .bind(name.flatten())
    .fetch_optional(executor)
    .await?
    .ok_or(DatabaseError::NotFound)
}

/// Delete the patient with all requests and items. Run inside a
/// transaction.
pub async fn delete_cascade(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<CascadeDeleteResult> {
    let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM patients WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(DatabaseError::NotFound);
    }

    let deleted_items = sqlx::query(
        r#"
        DELETE FROM prep_request_items
        WHERE prep_request_id IN (SELECT id FROM prep_requests WHERE patient_id = $1)
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let deleted_prep_requests = sqlx::query("DELETE FROM prep_requests WHERE patient_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM patients WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    debug!(%id, deleted_items, deleted_prep_requests, "Patient removed with dependants");

    Ok(CascadeDeleteResult {
        deleted_items,
        deleted_prep_requests,
    })
}
