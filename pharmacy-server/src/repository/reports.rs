//! Flat row reads behind the report endpoints

use chrono::{Duration, NaiveDate};
use sqlx::PgExecutor;

use super::DatabaseResult;
use crate::services::statistics::{
    DateRange, MedicationRangeRow, StatsItemRow, StatsRequestRow, UpcomingItemRow, UPCOMING_DAYS,
};
use crate::types::ItemStatus;

/// Requests received inside the window
pub async fn stats_requests<'e, E>(executor: E, range: DateRange) -> DatabaseResult<Vec<StatsRequestRow>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, StatsRequestRow>(
        r#"
        SELECT id, patient_id, reception_date
        FROM prep_requests
        WHERE reception_date >= $1 AND reception_date <= $2
        "#,
    )
    .bind(range.from)
    .bind(range.to)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

pub async fn stats_items<'e, E>(executor: E, range: DateRange) -> DatabaseResult<Vec<StatsItemRow>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, StatsItemRow>(
        r#"
        SELECT i.prep_request_id, pr.reception_date,
               i.medication_id, m.institutional_code AS medication_code, m.name AS medication_name,
               i.units_required, i.status, i.acquisition, i.frequency, i.cancel_reason,
               pr.pharmacist_id,
               CASE WHEN ph.id IS NULL THEN NULL
                    ELSE ph.code || ' - ' || CONCAT_WS(' ', ph.first_names, ph.last_names) END AS pharmacist_label,
               pr.prescriber_id,
               CASE WHEN ps.id IS NULL THEN NULL
                    ELSE ps.code || ' - ' || CONCAT_WS(' ', ps.first_names, ps.last_names) END AS prescriber_label,
               i.created_at, i.delivered_at
        FROM prep_request_items i
        JOIN prep_requests pr ON pr.id = i.prep_request_id
        JOIN medications m ON m.id = i.medication_id
        LEFT JOIN pharmacists ph ON ph.id = pr.pharmacist_id
        LEFT JOIN prescribers ps ON ps.id = pr.prescriber_id
        WHERE pr.reception_date >= $1 AND pr.reception_date <= $2
        "#,
    )
    .bind(range.from)
    .bind(range.to)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Items of open requests due in the days starting at `today`
pub async fn upcoming_items<'e, E>(executor: E, today: NaiveDate) -> DatabaseResult<Vec<UpcomingItemRow>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, UpcomingItemRow>(
        r#"
        SELECT pr.application_date, pr.patient_id
        FROM prep_request_items i
        JOIN prep_requests pr ON pr.id = i.prep_request_id
        WHERE pr.finalized_at IS NULL
          AND pr.application_date >= $1
          AND pr.application_date < $2
        "#,
    )
    .bind(today)
    .bind(today + Duration::days(UPCOMING_DAYS))
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Non-cancelled demand of open requests per medication
pub async fn medication_range<'e, E>(executor: E, range: DateRange) -> DatabaseResult<Vec<MedicationRangeRow>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, MedicationRangeRow>(
        r#"
        SELECT m.id AS medication_id, m.institutional_code AS medication_code, m.name AS medication_name,
               COUNT(i.id) AS lines, COALESCE(SUM(i.units_required), 0)::float8 AS units
        FROM prep_request_items i
        JOIN prep_requests pr ON pr.id = i.prep_request_id
        JOIN medications m ON m.id = i.medication_id
        WHERE pr.finalized_at IS NULL
          AND i.status <> $3
          AND pr.application_date >= $1 AND pr.application_date <= $2
        GROUP BY m.id, m.institutional_code, m.name
        ORDER BY units DESC
        "#,
    )
    .bind(range.from)
    .bind(range.to)
    .bind(ItemStatus::Cancelled.as_str())
    .fetch_all(executor)
    .await?;

    Ok(rows)
}
