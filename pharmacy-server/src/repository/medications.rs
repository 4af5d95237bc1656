use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{DatabaseError, DatabaseResult};
use crate::services::medication_catalog::{medication_label, MedicationInput, SummaryCandidate};
use crate::utils::query_builder::SearchQuery;

pub const SEARCH_LIMIT: i64 = 20;
/// Upper bound on catalog rows read for the merged summary
pub const SUMMARY_FETCH_CAP: i64 = 2000;

/// Medication structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Medication {
    pub id: Uuid,
    pub institutional_code: Option<String>,
    pub name: String,
    pub concentration: Option<String>,
    pub route: Option<String>,
    pub presentation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Search result with the display label the UI shows in pickers
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MedicationOption {
    pub id: Uuid,
    pub institutional_code: Option<String>,
    pub name: String,
    pub concentration: Option<String>,
    pub route: Option<String>,
    pub label: String,
}

impl From<Medication> for MedicationOption {
    fn from(m: Medication) -> Self {
        Self {
            label: medication_label(m.institutional_code.as_deref(), &m.name),
            id: m.id,
            institutional_code: m.institutional_code,
            name: m.name,
            concentration: m.concentration,
            route: m.route,
        }
    }
}

/// Upper-cased catalog fields for an insert or upsert
#[derive(Debug, Clone, Default)]
pub struct MedicationFields {
    pub institutional_code: Option<String>,
    pub name: String,
    pub concentration: Option<String>,
    pub route: Option<String>,
    pub presentation: Option<String>,
}

pub async fn search<'e, E>(executor: E, term: Option<&str>) -> DatabaseResult<Vec<Medication>>
where
    E: PgExecutor<'e>,
{
    let mut query = SearchQuery::new(
        "SELECT id, institutional_code, name, concentration, route, presentation, created_at, updated_at \
         FROM medications WHERE 1=1",
    );
    query
        .filter_contains_any(&["name", "institutional_code"], term)
        .order_by("updated_at", "DESC")
        .limit(SEARCH_LIMIT);

    Ok(query.build::<Medication>().fetch_all(executor).await?)
}

/// Upsert by institutional code. Absent optional fields keep the stored
/// values.
pub async fn upsert_by_code<'e, E>(executor: E, code: &str, fields: &MedicationFields) -> DatabaseResult<Uuid>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO medications (id, institutional_code, name, concentration, route, presentation)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (institutional_code) DO UPDATE
        SET name = EXCLUDED.name,
            concentration = COALESCE(EXCLUDED.concentration, medications.concentration),
            route = COALESCE(EXCLUDED.route, medications.route),
            presentation = COALESCE(EXCLUDED.presentation, medications.presentation),
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(code)
    .bind(fields.name.as_str())
    .bind(fields.concentration.as_deref())
    .bind(fields.route.as_deref())
    .bind(fields.presentation.as_deref())
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Insert a medication without institutional code
pub async fn insert<'e, E>(executor: E, fields: &MedicationFields) -> DatabaseResult<Uuid>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO medications (id, institutional_code, name, concentration, route, presentation)
        VALUES ($1, NULL, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(fields.name.as_str())
    .bind(fields.concentration.as_deref())
    .bind(fields.route.as_deref())
    .bind(fields.presentation.as_deref())
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Catalog upsert: by code when there is one, otherwise always a new row.
pub async fn save<'e, E>(executor: E, fields: &MedicationFields) -> DatabaseResult<Uuid>
where
    E: PgExecutor<'e>,
{
    match fields.institutional_code.as_deref() {
        Some(code) => upsert_by_code(executor, code, fields).await,
        None => insert(executor, fields).await,
    }
}

/// Fails with `ForeignKeyViolation` while items still reference the row.
pub async fn delete<'e, E>(executor: E, id: Uuid) -> DatabaseResult<()>
where
    E: PgExecutor<'e>,
{
    let affected = sqlx::query("DELETE FROM medications WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

/// Turn a typed medication into an id: the explicit id, an upsert by code,
/// or the code-less entry with the same name (created when missing).
pub async fn resolve(conn: &mut PgConnection, input: &MedicationInput) -> DatabaseResult<Uuid> {
    if let Some(id) = input.id {
        return Ok(id);
    }

    let fields = MedicationFields {
        institutional_code: input.code.clone(),
        name: input.name.clone(),
        ..MedicationFields::default()
    };

    if let Some(code) = input.code.as_deref() {
        return upsert_by_code(&mut *conn, code, &fields).await;
    }

    let existing = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM medications
        WHERE name = $1 AND institutional_code IS NULL
        ORDER BY created_at
        LIMIT 1
        "#,
    )
    .bind(input.name.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(id) => Ok(id),
        None => {
            debug!(name = %input.name, "Creating code-less medication");
            insert(&mut *conn, &fields).await
        }
    }
}

/// Catalog rows with their item counts, most used first.
pub async fn summary_candidates<'e, E>(
    executor: E,
    term: Option<&str>,
    limit: i64,
) -> DatabaseResult<Vec<SummaryCandidate>>
where
    E: PgExecutor<'e>,
{
    let mut query = SearchQuery::new(
        "SELECT m.id, m.institutional_code AS code, m.name, COUNT(i.id) AS item_count \
         FROM medications m LEFT JOIN prep_request_items i ON i.medication_id = m.id WHERE 1=1",
    );
    query
        .filter_contains_any(&["m.name", "m.institutional_code"], term)
        .group_by("m.id")
        .order_by("item_count", "DESC")
        .order_by("m.name", "ASC")
        .limit(limit.min(SUMMARY_FETCH_CAP));

    Ok(query.build::<SummaryCandidate>().fetch_all(executor).await?)
}
