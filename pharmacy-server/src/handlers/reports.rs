use axum::{extract::State, Json};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::debug;
use utoipa::IntoParams;
use validator::Validate;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::ValidatedQuery;
use crate::repository::reports;
use crate::server::PharmacyServer;
use crate::services::statistics::{
    self, DateRange, MedicationRangeReport, Statistics, DEFAULT_RANGE_DAYS, MAX_RANGE_DAYS,
};
use crate::utils::dates::{days_between, parse_iso_date, parse_optional_date, today_utc};

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeParams {
    /// First day (`YYYY-MM-DD`)
    pub from: Option<String>,
    /// Last day, inclusive (`YYYY-MM-DD`)
    pub to: Option<String>,
}

/// Check a report window: `to` not before `from` and at most
/// [`MAX_RANGE_DAYS`] apart.
pub fn checked_range(from: NaiveDate, to: NaiveDate) -> Result<DateRange, ApiError> {
    let days = days_between(from, to);
    if days < 0 {
        return Err(ApiError::validation("'to' must not be before 'from'"));
    }
    if days > MAX_RANGE_DAYS {
        return Err(ApiError::validation(format!(
            "range cannot exceed {} days",
            MAX_RANGE_DAYS
        )));
    }
    Ok(DateRange { from, to })
}

/// Statistics window: defaults to the last 30 days ending `today`.
fn statistics_range(params: &RangeParams, today: NaiveDate) -> Result<DateRange, ApiError> {
    let to = parse_optional_date(params.to.as_deref())?.unwrap_or(today);
    let from = parse_optional_date(params.from.as_deref())?
        .unwrap_or_else(|| today - Duration::days(DEFAULT_RANGE_DAYS - 1));
    checked_range(from, to)
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/statistics",
    params(RangeParams),
    responses(
        (status = 200, description = "Aggregated activity for the window", body = Statistics),
        (status = 400, description = "Invalid or too wide range")
    ),
    tag = "reports"
)]
pub async fn statistics(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<RangeParams>,
) -> Result<Json<ApiResponse<Statistics>>, ApiError> {
    let today = today_utc();
    let range = statistics_range(&params, today)?;

    let requests = reports::stats_requests(server.pool(), range).await?;
    let items = reports::stats_items(server.pool(), range).await?;
    let upcoming = reports::upcoming_items(server.pool(), today).await?;

    debug!(
        from = %range.from,
        to = %range.to,
        requests = requests.len(),
        items = items.len(),
        "Computing statistics"
    );
    Ok(Json(api_success(statistics::compute(range, &requests, &items, &upcoming))))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/medication-range",
    params(RangeParams),
    responses(
        (status = 200, description = "Demand per medication over the window", body = MedicationRangeReport),
        (status = 400, description = "Missing, invalid or too wide range")
    ),
    tag = "reports"
)]
pub async fn medication_range(
    State(server): State<PharmacyServer>,
    ValidatedQuery(params): ValidatedQuery<RangeParams>,
) -> Result<Json<ApiResponse<MedicationRangeReport>>, ApiError> {
    let from = params
        .from
        .as_deref()
        .ok_or_else(|| ApiError::validation("'from' is required"))?;
    let to = params
        .to
        .as_deref()
        .ok_or_else(|| ApiError::validation("'to' is required"))?;
    let range = checked_range(parse_iso_date(from)?, parse_iso_date(to)?)?;

    let rows = reports::medication_range(server.pool(), range).await?;
    Ok(Json(api_success(statistics::medication_range(range, rows))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_default_statistics_range_is_thirty_days() {
        let range = statistics_range(&RangeParams::default(), day(6, 30)).unwrap();
        assert_eq!(range.from, day(6, 1));
        assert_eq!(range.to, day(6, 30));
    }

    #[test]
    fn test_range_limits() {
        assert!(checked_range(day(1, 1), day(6, 29)).is_ok());
        assert!(checked_range(day(1, 1), day(6, 30)).is_err());
        assert!(checked_range(day(2, 1), day(1, 31)).is_err());
        assert!(checked_range(day(3, 3), day(3, 3)).is_ok());
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        let params = RangeParams {
            from: Some("2024-13-01".to_string()),
            to: None,
        };
        assert!(statistics_range(&params, day(6, 30)).is_err());
    }
}
