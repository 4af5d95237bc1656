use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{DatabaseError, DatabaseResult};
use crate::utils::query_builder::SearchQuery;

pub const LIST_LIMIT: i64 = 300;
pub const DEFAULT_FINALIZED_BY: &str = "pharmacy";

/// Request metadata written on upsert. `None` leaves the stored value; the
/// nested options can clear nullable columns.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub reception_date: Option<NaiveDate>,
    pub prescription_number: Option<Option<String>>,
    pub prescriber_id: Option<Option<Uuid>>,
    pub pharmacist_id: Option<Option<Uuid>>,
    /// Recorded as creator on insert and as last editor on update
    pub actor: Option<String>,
}

/// Request row in the agenda and history lists
#[derive(Debug, Clone, Serialize, ToSchema, FromRow)]
pub struct PrepRequestSummary {
    pub id: Uuid,
    pub application_date: NaiveDate,
    pub patient_id: Uuid,
    pub national_id: String,
    pub name: Option<String>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub items_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema, FromRow)]
pub struct PrepRequestHeader {
    pub id: Uuid,
    pub application_date: NaiveDate,
    pub patient_id: Uuid,
    pub national_id: String,
    pub name: Option<String>,
    pub reception_date: Option<NaiveDate>,
    pub prescription_number: Option<String>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finalized_by: Option<String>,
}

/// One line of a request detail
#[derive(Debug, Clone, Serialize, ToSchema, FromRow)]
pub struct RequestItemView {
    pub id: Uuid,
    pub status: String,
    pub medication: String,
    pub dose_text: String,
    pub units_required: f64,
    pub frequency: Option<String>,
    pub notes: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema, FromRow)]
pub struct FinalizedRequest {
    pub id: Uuid,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finalized_by: Option<String>,
}

/// Find or create the request of `patient_id` for `application_date`,
/// refreshing the provided metadata.
pub async fn upsert_for_date<'e, E>(
    executor: E,
    application_date: NaiveDate,
    patient_id: Uuid,
    meta: &RequestMeta,
) -> DatabaseResult<Uuid>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO prep_requests (
            id, application_date, patient_id, reception_date,
            prescription_number, prescriber_id, pharmacist_id, created_by, updated_by
        ) VALUES ($1, $2, $3, $4, $6, $8, $10, $11, $11)
        ON CONFLICT (application_date, patient_id) DO UPDATE
        SET reception_date = COALESCE(EXCLUDED.reception_date, prep_requests.reception_date),
            prescription_number = CASE WHEN $5 THEN EXCLUDED.prescription_number ELSE prep_requests.prescription_number END,
            prescriber_id = CASE WHEN $7 THEN EXCLUDED.prescriber_id ELSE prep_requests.prescriber_id END,
            pharmacist_id = CASE WHEN $9 THEN EXCLUDED.pharmacist_id ELSE prep_requests.pharmacist_id END,
            updated_by = COALESCE(EXCLUDED.updated_by, prep_requests.updated_by),
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_date)
    .bind(patient_id)
    .bind(meta.reception_date)
    .bind(meta.prescription_number.is_some())
    .bind(meta.prescription_number.clone().flatten())
    .bind(meta.prescriber_id.is_some())
    .bind(meta.prescriber_id.flatten())
    .bind(meta.pharmacist_id.is_some())
    .bind(meta.pharmacist_id.flatten())
    .bind(meta.actor.as_deref())
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Apply the provided metadata to existing requests.
pub async fn update_meta<'e, E>(executor: E, ids: &[Uuid], meta: &RequestMeta) -> DatabaseResult<u64>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(0);
    }

    let affected = sqlx::query(
        r#"
        UPDATE prep_requests
        SET reception_date = COALESCE($2, reception_date),
            prescription_number = CASE WHEN $3 THEN $4 ELSE prescription_number END,
            prescriber_id = CASE WHEN $5 THEN $6 ELSE prescriber_id END,
            pharmacist_id = CASE WHEN $7 THEN $8 ELSE pharmacist_id END,
            updated_by = COALESCE($9, updated_by),
            updated_at = NOW()
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .bind(meta.reception_date)
    .bind(meta.prescription_number.is_some())
    .bind(meta.prescription_number.clone().flatten())
    .bind(meta.prescriber_id.is_some())
    .bind(meta.prescriber_id.flatten())
    .bind(meta.pharmacist_id.is_some())
    .bind(meta.pharmacist_id.flatten())
    .bind(meta.actor.as_deref())
    .execute(executor)
    .await?
    .rows_affected();

    Ok(affected)
}

/// Open requests, or finalized ones when `historical`.
pub async fn list<'e, E>(
    executor: E,
    application_date: Option<NaiveDate>,
    historical: bool,
) -> DatabaseResult<Vec<PrepRequestSummary>>
where
    E: PgExecutor<'e>,
{
    let mut query = SearchQuery::new(
        r#"
        SELECT pr.id, pr.application_date, pr.patient_id, p.national_id, p.name, pr.finalized_at,
               (SELECT COUNT(*) FROM prep_request_items i WHERE i.prep_request_id = pr.id) AS items_count
        FROM prep_requests pr
        JOIN patients p ON p.id = pr.patient_id
        WHERE 1=1"#,
    );
    query
        .filter_eq("pr.application_date", application_date)
        .filter_raw(if historical {
            "pr.finalized_at IS NOT NULL"
        } else {
            "pr.finalized_at IS NULL"
        })
        .order_by("pr.application_date", "DESC")
        .order_by("pr.updated_at", "DESC")
        .limit(LIST_LIMIT);

    Ok(query.build::<PrepRequestSummary>().fetch_all(executor).await?)
}

pub async fn find_header<'e, E>(executor: E, id: Uuid) -> DatabaseResult<PrepRequestHeader>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PrepRequestHeader>(
        r#"
        SELECT pr.id, pr.application_date, pr.patient_id, p.national_id, p.name,
               pr.reception_date, pr.prescription_number, pr.finalized_at, pr.finalized_by
        FROM prep_requests pr
        JOIN patients p ON p.id = pr.patient_id
        WHERE pr.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or(DatabaseError::NotFound)
}

pub async fn items_of<'e, E>(executor: E, id: Uuid) -> DatabaseResult<Vec<RequestItemView>>
where
    E: PgExecutor<'e>,
{
    let items = sqlx::query_as::<_, RequestItemView>(
        r#"
        SELECT i.id, i.status,
               CASE WHEN m.institutional_code IS NULL THEN m.name
                    ELSE m.institutional_code || ' - ' || m.name END AS medication,
               i.dose_text, i.units_required, i.frequency, i.notes, i.delivered_at, i.cancel_reason
        FROM prep_request_items i
        JOIN medications m ON m.id = i.medication_id
        WHERE i.prep_request_id = $1
        ORDER BY i.updated_at DESC
        "#,
    )
    .bind(id)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

/// Delete the request and its items. Run inside a transaction.
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<u64> {
    let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM prep_requests WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(DatabaseError::NotFound);
    }

    let deleted_items = sqlx::query("DELETE FROM prep_request_items WHERE prep_request_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM prep_requests WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    debug!(%id, deleted_items, "Prep request removed");
    Ok(deleted_items)
}

pub async fn finalize<'e, E>(executor: E, id: Uuid, finalized_by: Option<&str>) -> DatabaseResult<FinalizedRequest>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, FinalizedRequest>(
        r#"
        UPDATE prep_requests
        SET finalized_at = NOW(), finalized_by = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING id, finalized_at, finalized_by
        "#,
    )
    .bind(id)
    .bind(finalized_by.unwrap_or(DEFAULT_FINALIZED_BY))
    .fetch_optional(executor)
    .await?
    .ok_or(DatabaseError::NotFound)
}
