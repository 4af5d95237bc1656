use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{DatabaseError, DatabaseResult};
use crate::services::reconciliation::ExistingItem;
use crate::services::record_grouping::ItemRecordRow;
use crate::types::{Acquisition, ItemStatus};
use crate::utils::query_builder::SearchQuery;

pub const AGENDA_LIMIT: i64 = 500;
pub const MEDICATION_PATIENTS_FETCH_CAP: i64 = 5000;
pub const REGISTRY_FETCH_CAP: i64 = 20000;
/// Items read for recent records when no month is given
pub const RECENT_FETCH_LIMIT: i64 = 250;

/// Agenda line: item with its request, patient and staff codes
#[derive(Debug, Clone, Serialize, ToSchema, FromRow)]
pub struct AgendaItem {
    pub id: Uuid,
    pub prep_request_id: Uuid,
    pub patient_id: Uuid,
    pub application_date: NaiveDate,
    pub prescription_number: Option<String>,
    pub status: String,
    pub national_id: String,
    pub name: Option<String>,
    pub prescriber_code: Option<String>,
    pub pharmacist_code: Option<String>,
    pub medication_id: Uuid,
    pub medication_code: Option<String>,
    pub medication_name: String,
    pub medication_route: Option<String>,
    pub medication: String,
    pub dose_text: String,
    pub units_required: f64,
    pub frequency: Option<String>,
    pub acquisition: String,
    pub notes: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AgendaFilter {
    pub application_date: Option<NaiveDate>,
    pub patient: Option<String>,
    pub medication: Option<String>,
    pub statuses: Vec<ItemStatus>,
}

/// Values of a new `pending` item, already normalized
#[derive(Debug, Clone)]
pub struct NewItem {
    pub prep_request_id: Uuid,
    pub medication_id: Uuid,
    pub dose_text: String,
    pub units_required: f64,
    pub frequency: Option<String>,
    pub acquisition: Acquisition,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// Partial update of one item. Nested options distinguish "leave" from
/// "set to null".
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub status: Option<ItemStatus>,
    pub dose_text: Option<String>,
    pub units_required: Option<f64>,
    pub notes: Option<Option<String>>,
    pub updated_by: Option<Option<String>>,
    pub delivered_at: Option<Option<DateTime<Utc>>>,
    pub cancel_reason: Option<Option<String>>,
}

/// Fields a record edit writes onto every kept item
#[derive(Debug, Clone)]
pub struct RecordFields {
    pub medication_id: Uuid,
    pub dose_text: String,
    pub units_required: f64,
    pub frequency: Option<String>,
    pub acquisition: Acquisition,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ApplicationMark {
    pub id: Uuid,
    pub applied_at: Option<DateTime<Utc>>,
}

const AGENDA_SELECT: &str = r#"
    SELECT i.id, i.prep_request_id, pr.patient_id, pr.application_date, pr.prescription_number,
           i.status, p.national_id, p.name,
           ps.code AS prescriber_code, ph.code AS pharmacist_code,
           i.medication_id, m.institutional_code AS medication_code, m.name AS medication_name,
           m.route AS medication_route,
           CASE WHEN m.institutional_code IS NULL THEN m.name
                ELSE m.institutional_code || ' - ' || m.name END AS medication,
           i.dose_text, i.units_required, i.frequency, i.acquisition, i.notes,
           i.delivered_at, i.cancel_reason, i.created_by, i.created_at, i.updated_by, i.updated_at
    FROM prep_request_items i
    JOIN prep_requests pr ON pr.id = i.prep_request_id
    JOIN patients p ON p.id = pr.patient_id
    JOIN medications m ON m.id = i.medication_id
    LEFT JOIN prescribers ps ON ps.id = pr.prescriber_id
    LEFT JOIN pharmacists ph ON ph.id = pr.pharmacist_id
    WHERE pr.finalized_at IS NULL"#;

const RECORD_SELECT: &str = r#"
    SELECT i.id AS item_id, i.prep_request_id, pr.patient_id, p.national_id, p.name AS patient_name,
           i.medication_id, m.institutional_code AS medication_code, m.name AS medication_name,
           i.dose_text, i.units_required, i.frequency, i.acquisition, i.notes,
           pr.application_date, pr.reception_date, pr.prescription_number,
           pr.prescriber_id, pr.pharmacist_id,
           ph.code AS pharmacist_code, ph.first_names AS pharmacist_first_names,
           ph.last_names AS pharmacist_last_names,
           i.applied_at, i.created_at
    FROM prep_request_items i
    JOIN prep_requests pr ON pr.id = i.prep_request_id
    JOIN patients p ON p.id = pr.patient_id
    JOIN medications m ON m.id = i.medication_id
    LEFT JOIN pharmacists ph ON ph.id = pr.pharmacist_id
    WHERE 1=1"#;

// ============================================================================
// AGENDA
// ============================================================================

pub async fn list_agenda<'e, E>(executor: E, filter: &AgendaFilter) -> DatabaseResult<Vec<AgendaItem>>
where
    E: PgExecutor<'e>,
{
    let statuses: Vec<String> = filter.statuses.iter().map(|s| s.as_str().to_string()).collect();

    let mut query = SearchQuery::new(AGENDA_SELECT);
    query
        .filter_eq("pr.application_date", filter.application_date)
        .filter_contains_any(&["p.national_id", "p.name"], filter.patient.as_deref())
        .filter_contains_any(&["m.name", "m.institutional_code"], filter.medication.as_deref())
        .filter_in("i.status", statuses)
        .order_by("i.updated_at", "DESC")
        .limit(AGENDA_LIMIT);

    Ok(query.build::<AgendaItem>().fetch_all(executor).await?)
}

/// Id of an identical item created since `since`, if any.
pub async fn find_recent_duplicate<'e, E>(
    executor: E,
    item: &NewItem,
    since: DateTime<Utc>,
) -> DatabaseResult<Option<Uuid>>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM prep_request_items
        WHERE prep_request_id = $1
          AND medication_id = $2
          AND dose_text = $3
          AND units_required = $4
          AND frequency IS NOT DISTINCT FROM $5
          AND acquisition = $6
          AND notes IS NOT DISTINCT FROM $7
          AND created_at >= $8
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(item.prep_request_id)
    .bind(item.medication_id)
    .bind(item.dose_text.as_str())
    .bind(item.units_required)
    .bind(item.frequency.as_deref())
    .bind(item.acquisition.as_str())
    .bind(item.notes.as_deref())
    .bind(since)
    .fetch_optional(executor)
    .await?;

    Ok(id)
}

pub async fn insert<'e, E>(executor: E, item: &NewItem) -> DatabaseResult<Uuid>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO prep_request_items (
            id, prep_request_id, medication_id, dose_text, units_required, status,
            frequency, acquisition, notes, created_by, updated_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(item.prep_request_id)
    .bind(item.medication_id)
    .bind(item.dose_text.as_str())
    .bind(item.units_required)
    .bind(ItemStatus::Pending.as_str())
    .bind(item.frequency.as_deref())
    .bind(item.acquisition.as_str())
    .bind(item.notes.as_deref())
    .bind(item.created_by.as_deref())
    .fetch_one(executor)
    .await?;

    Ok(id)
}

pub async fn update<'e, E>(executor: E, id: Uuid, patch: &ItemPatch) -> DatabaseResult<Uuid>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE prep_request_items
        SET status = COALESCE($2, status),
            dose_text = COALESCE($3, dose_text),
            units_required = COALESCE($4, units_required),
            notes = CASE WHEN $5 THEN $6 ELSE notes END,
            updated_by = CASE WHEN $7 THEN $8 ELSE updated_by END,
            delivered_at = CASE WHEN $9 THEN $10 ELSE delivered_at END,
            cancel_reason = CASE WHEN $11 THEN $12 ELSE cancel_reason END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(patch.status.map(|s| s.as_str()))
    .bind(patch.dose_text.as_deref())
    .bind(patch.units_required)
    .bind(patch.notes.is_some())
    .bind(patch.notes.clone().flatten())
    .bind(patch.updated_by.is_some())
    .bind(patch.updated_by.clone().flatten())
    .bind(patch.delivered_at.is_some())
    .bind(patch.delivered_at.flatten())
    .bind(patch.cancel_reason.is_some())
    .bind(patch.cancel_reason.clone().flatten())
    .fetch_optional(executor)
    .await?
    .ok_or(DatabaseError::NotFound)
}

/// Copy an item into a new `pending` item of the same request.
pub async fn duplicate<'e, E>(executor: E, id: Uuid, created_by: Option<&str>) -> DatabaseResult<Uuid>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO prep_request_items (
            id, prep_request_id, medication_id, dose_text, units_required, status,
            frequency, acquisition, notes, created_by, updated_by
        )
        SELECT $2, prep_request_id, medication_id, dose_text, units_required, $3,
               frequency, acquisition, notes, $4, $4
        FROM prep_request_items
        WHERE id = $1
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(Uuid::new_v4())
    .bind(ItemStatus::Pending.as_str())
    .bind(created_by)
    .fetch_optional(executor)
    .await?
    .ok_or(DatabaseError::NotFound)
}

// ============================================================================
// RECORD VIEWS
// ============================================================================

/// Items of the given medications, newest update first.
pub async fn rows_for_medications<'e, E>(
    executor: E,
    medication_ids: Vec<Uuid>,
    application_date: Option<NaiveDate>,
    historical: bool,
) -> DatabaseResult<Vec<ItemRecordRow>>
where
    E: PgExecutor<'e>,
{
    let mut query = SearchQuery::new(RECORD_SELECT);
    query
        .and_where()
        .push("i.medication_id = ANY(")
        .push_bind(medication_ids)
        .push(")");
    query.filter_eq("pr.application_date", application_date);
    if !historical {
        query.filter_raw("pr.finalized_at IS NULL");
    }
    query
        .order_by("i.updated_at", "DESC")
        .limit(MEDICATION_PATIENTS_FETCH_CAP);

    Ok(query.build::<ItemRecordRow>().fetch_all(executor).await?)
}

pub async fn registry_rows<'e, E>(
    executor: E,
    term: Option<&str>,
    historical: bool,
) -> DatabaseResult<Vec<ItemRecordRow>>
where
    E: PgExecutor<'e>,
{
    let mut query = SearchQuery::new(RECORD_SELECT);
    if !historical {
        query.filter_raw("pr.finalized_at IS NULL");
    }
    query
        .filter_contains_any(
            &[
                "i.dose_text",
                "m.name",
                "m.institutional_code",
                "pr.prescription_number",
                "p.national_id",
                "p.name",
                "ph.code",
                "ph.first_names",
                "ph.last_names",
            ],
            term,
        )
        .order_by("i.updated_at", "DESC")
        .limit(REGISTRY_FETCH_CAP);

    Ok(query.build::<ItemRecordRow>().fetch_all(executor).await?)
}

/// Items for the recent records view. With a month `[start, end)`: items of
/// requests received in the month, or created in it when the reception date
/// is unknown. Without: the latest items.
pub async fn recent_rows<'e, E>(
    executor: E,
    month: Option<(NaiveDate, NaiveDate)>,
) -> DatabaseResult<Vec<ItemRecordRow>>
where
    E: PgExecutor<'e>,
{
    let mut query = SearchQuery::new(RECORD_SELECT);
    match month {
        Some((start, end)) => {
            query
                .and_where()
                .push("((pr.reception_date >= ")
                .push_bind(start)
                .push(" AND pr.reception_date < ")
                .push_bind(end)
                .push(") OR (pr.reception_date IS NULL AND pr.created_at >= ")
                .push_bind(start)
                .push(" AND pr.created_at < ")
                .push_bind(end)
                .push("))");
            query.order_by("i.created_at", "DESC");
        }
        None => {
            query.order_by("i.created_at", "DESC").limit(RECENT_FETCH_LIMIT);
        }
    }

    Ok(query.build::<ItemRecordRow>().fetch_all(executor).await?)
}

// ============================================================================
// RECONCILIATION
// ============================================================================

pub async fn load_existing<'e, E>(executor: E, ids: &[Uuid]) -> DatabaseResult<Vec<ExistingItem>>
where
    E: PgExecutor<'e>,
{
    let items = sqlx::query_as::<_, ExistingItem>(
        r#"
        SELECT i.id, i.prep_request_id, pr.patient_id, pr.application_date
        FROM prep_request_items i
        JOIN prep_requests pr ON pr.id = i.prep_request_id
        WHERE i.id = ANY($1)
        FOR UPDATE OF i
        "#,
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

/// Rewrite the record fields of `ids`, keeping their status.
pub async fn update_record_fields<'e, E>(executor: E, ids: &[Uuid], fields: &RecordFields) -> DatabaseResult<u64>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(0);
    }

    let affected = sqlx::query(
        r#"
        UPDATE prep_request_items
        SET medication_id = $2,
            dose_text = $3,
            units_required = $4,
            frequency = $5,
            acquisition = $6,
            notes = $7,
            updated_at = NOW()
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .bind(fields.medication_id)
    .bind(fields.dose_text.as_str())
    .bind(fields.units_required)
    .bind(fields.frequency.as_deref())
    .bind(fields.acquisition.as_str())
    .bind(fields.notes.as_deref())
    .execute(executor)
    .await?
    .rows_affected();

    Ok(affected)
}

pub async fn delete_many<'e, E>(executor: E, ids: &[Uuid]) -> DatabaseResult<u64>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(0);
    }

    let affected = sqlx::query("DELETE FROM prep_request_items WHERE id = ANY($1)")
        .bind(ids)
        .execute(executor)
        .await?
        .rows_affected();

    Ok(affected)
}

// ============================================================================
// APPLICATION MARKS
// ============================================================================

/// Items of one registry line on one application date.
pub async fn application_marks<'e, E>(
    executor: E,
    patient_id: Uuid,
    medication_id: Uuid,
    dose_text: &str,
    application_date: NaiveDate,
) -> DatabaseResult<Vec<ApplicationMark>>
where
    E: PgExecutor<'e>,
{
    let marks = sqlx::query_as::<_, ApplicationMark>(
        r#"
        SELECT i.id, i.applied_at
        FROM prep_request_items i
        JOIN prep_requests pr ON pr.id = i.prep_request_id
        WHERE i.medication_id = $1
          AND i.dose_text = $2
          AND pr.patient_id = $3
          AND pr.application_date = $4
        "#,
    )
    .bind(medication_id)
    .bind(dose_text)
    .bind(patient_id)
    .bind(application_date)
    .fetch_all(executor)
    .await?;

    Ok(marks)
}

pub async fn set_applied<'e, E>(executor: E, ids: &[Uuid], applied: bool) -> DatabaseResult<u64>
where
    E: PgExecutor<'e>,
{
    let affected = sqlx::query(
        r#"
        UPDATE prep_request_items
        SET applied_at = CASE WHEN $2 THEN NOW() ELSE NULL END,
            updated_at = NOW()
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .bind(applied)
    .execute(executor)
    .await?
    .rows_affected();

    Ok(affected)
}
