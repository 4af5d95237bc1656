//! Report aggregation over flat row sets
//!
//! The handlers fetch plain rows for the requested window and everything
//! below is computed in memory: totals, per-day series, breakdowns, top-N
//! lists, workloads and delivery time percentiles.

use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use serde::Serialize;
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::medication_catalog::medication_label;
use crate::types::ItemStatus;

/// Longest window the reports accept, in days between `from` and `to`
pub const MAX_RANGE_DAYS: i64 = 180;
/// Default statistics window, ending today
pub const DEFAULT_RANGE_DAYS: i64 = 30;
/// Days ahead covered by the upcoming workload
pub const UPCOMING_DAYS: i64 = 31;

const TOP_FREQUENCIES: usize = 12;
const TOP_MEDICATIONS: usize = 10;
const TOP_CANCEL_REASONS: usize = 10;
const TOP_WORKLOAD: usize = 15;
const DELIVERY_TARGET_HOURS: f64 = 4.0;

const UNDEFINED_FREQUENCY: &str = "UNDEFINED";
const NO_REASON: &str = "NO REASON";
const UNASSIGNED: &str = "UNASSIGNED";

// ============================================================================
// INPUT ROWS
// ============================================================================

/// A request received inside the window
#[derive(Debug, Clone, FromRow)]
pub struct StatsRequestRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub reception_date: NaiveDate,
}

/// An item whose request was received inside the window
#[derive(Debug, Clone, FromRow)]
pub struct StatsItemRow {
    pub prep_request_id: Uuid,
    pub reception_date: NaiveDate,
    pub medication_id: Uuid,
    pub medication_code: Option<String>,
    pub medication_name: String,
    pub units_required: f64,
    pub status: String,
    pub acquisition: String,
    pub frequency: Option<String>,
    pub cancel_reason: Option<String>,
    pub pharmacist_id: Option<Uuid>,
    pub pharmacist_label: Option<String>,
    pub prescriber_id: Option<Uuid>,
    pub prescriber_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// An item of an open request due in the upcoming window
#[derive(Debug, Clone, FromRow)]
pub struct UpcomingItemRow {
    pub application_date: NaiveDate,
    pub patient_id: Uuid,
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Totals {
    pub requests: usize,
    pub patients: usize,
    pub lines: usize,
    pub units: f64,
    pub delivered: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub requests: usize,
    pub patients: usize,
    pub lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CountEntry {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MedicationUsage {
    pub medication_id: Uuid,
    pub medication: String,
    pub lines: usize,
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Workload {
    pub id: Option<Uuid>,
    pub name: String,
    pub lines: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct DeliveryTimes {
    pub count: usize,
    pub mean_hours: Option<f64>,
    pub p50_hours: Option<f64>,
    pub p90_hours: Option<f64>,
    /// Share delivered within four hours, as a percentage with one decimal
    pub within_target_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UpcomingDay {
    pub date: NaiveDate,
    pub patients: usize,
    pub lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Statistics {
    pub range: DateRange,
    pub totals: Totals,
    pub daily: Vec<DailyPoint>,
    pub status: Vec<CountEntry>,
    pub acquisition: Vec<CountEntry>,
    pub frequencies: Vec<CountEntry>,
    pub top_medications: Vec<MedicationUsage>,
    pub cancel_reasons: Vec<CountEntry>,
    pub pharmacist_workload: Vec<Workload>,
    pub prescriber_workload: Vec<Workload>,
    pub delivery: DeliveryTimes,
    pub upcoming: Vec<UpcomingDay>,
}

/// Build the full statistics report.
pub fn compute(
    range: DateRange,
    requests: &[StatsRequestRow],
    items: &[StatsItemRow],
    upcoming: &[UpcomingItemRow],
) -> Statistics {
    let cancelled = ItemStatus::Cancelled.as_str();

    let totals = Totals {
        requests: requests.len(),
        patients: requests.iter().map(|r| r.patient_id).unique().count(),
        lines: items.len(),
        units: items.iter().map(|i| i.units_required).sum(),
        delivered: items
            .iter()
            .filter(|i| i.status == ItemStatus::Delivered.as_str())
            .count(),
        cancelled: items.iter().filter(|i| i.status == cancelled).count(),
    };

    Statistics {
        range,
        totals,
        daily: daily_series(requests, items),
        status: count_by(items.iter().map(|i| i.status.clone()), usize::MAX),
        acquisition: count_by(items.iter().map(|i| i.acquisition.clone()), usize::MAX),
        frequencies: count_by(
            items.iter().map(|i| {
                i.frequency
                    .clone()
                    .unwrap_or_else(|| UNDEFINED_FREQUENCY.to_string())
            }),
            TOP_FREQUENCIES,
        ),
        top_medications: top_medications(items),
        cancel_reasons: count_by(
            items
                .iter()
                .filter(|i| i.status == cancelled)
                .map(|i| i.cancel_reason.clone().unwrap_or_else(|| NO_REASON.to_string())),
            TOP_CANCEL_REASONS,
        ),
        pharmacist_workload: workload(
            items
                .iter()
                .map(|i| (i.pharmacist_id, i.pharmacist_label.as_deref())),
        ),
        prescriber_workload: workload(
            items
                .iter()
                .map(|i| (i.prescriber_id, i.prescriber_label.as_deref())),
        ),
        delivery: delivery_times(items),
        upcoming: upcoming_days(upcoming),
    }
}

/// Count occurrences, sorted by count desc then key asc, keeping `limit`.
fn count_by<K>(keys: impl Iterator<Item = K>, limit: usize) -> Vec<CountEntry>
where
    K: Eq + Hash + Ord + Into<String>,
{
    keys.counts()
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .take(limit)
        .map(|(key, count)| CountEntry {
            key: key.into(),
            count,
        })
        .collect()
}

fn daily_series(requests: &[StatsRequestRow], items: &[StatsItemRow]) -> Vec<DailyPoint> {
    let lines_by_day = items.iter().map(|i| i.reception_date).counts();

    requests
        .iter()
        .into_group_map_by(|r| r.reception_date)
        .into_iter()
        .sorted_by_key(|(date, _)| *date)
        .map(|(date, rows)| DailyPoint {
            date,
            requests: rows.len(),
            patients: rows.iter().map(|r| r.patient_id).unique().count(),
            lines: lines_by_day.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

fn top_medications(items: &[StatsItemRow]) -> Vec<MedicationUsage> {
    items
        .iter()
        .into_group_map_by(|i| i.medication_id)
        .into_iter()
        .filter_map(|(medication_id, rows)| {
            let first = rows.first()?;
            Some(MedicationUsage {
                medication_id,
                medication: medication_label(first.medication_code.as_deref(), &first.medication_name),
                lines: rows.len(),
                units: rows.iter().map(|r| r.units_required).sum(),
            })
        })
        .sorted_by(|a, b| b.lines.cmp(&a.lines).then_with(|| a.medication.cmp(&b.medication)))
        .take(TOP_MEDICATIONS)
        .collect()
}

fn workload<'a>(assignments: impl Iterator<Item = (Option<Uuid>, Option<&'a str>)>) -> Vec<Workload> {
    let mut labels: HashMap<Option<Uuid>, String> = HashMap::new();
    let mut lines: HashMap<Option<Uuid>, usize> = HashMap::new();

    for (id, label) in assignments {
        *lines.entry(id).or_insert(0) += 1;
        labels.entry(id).or_insert_with(|| match (id, label) {
            (None, _) => UNASSIGNED.to_string(),
            (Some(_), Some(label)) => label.to_string(),
            (Some(id), None) => id.to_string(),
        });
    }

    lines
        .into_iter()
        .map(|(id, count)| Workload {
            id,
            name: labels.remove(&id).unwrap_or_else(|| UNASSIGNED.to_string()),
            lines: count,
        })
        .sorted_by(|a, b| b.lines.cmp(&a.lines).then_with(|| a.name.cmp(&b.name)))
        .take(TOP_WORKLOAD)
        .collect()
}

fn delivery_times(items: &[StatsItemRow]) -> DeliveryTimes {
    let mut hours: Vec<f64> = items
        .iter()
        .filter_map(|i| {
            let delivered = i.delivered_at?;
            Some((delivered - i.created_at).num_seconds() as f64 / 3600.0)
        })
        .collect();

    if hours.is_empty() {
        return DeliveryTimes::default();
    }

    hours.sort_by(|a, b| a.total_cmp(b));
    let count = hours.len();
    let within = hours.iter().filter(|h| **h <= DELIVERY_TARGET_HOURS).count();

    DeliveryTimes {
        count,
        mean_hours: Some(hours.iter().sum::<f64>() / count as f64),
        p50_hours: percentile(&hours, 0.5),
        p90_hours: percentile(&hours, 0.9),
        within_target_pct: Some((within as f64 / count as f64 * 1000.0).round() / 10.0),
    }
}

/// Continuous percentile with linear interpolation between the closest
/// ranks. `sorted` must be ascending.
#[allow(clippy::cast_possible_truncation)]
pub fn percentile(sorted: &[f64], fraction: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = fraction.clamp(0.0, 1.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let low = *sorted.get(lower)?;
    let high = *sorted.get(upper)?;
    Some(low + (high - low) * (rank - lower as f64))
}

fn upcoming_days(rows: &[UpcomingItemRow]) -> Vec<UpcomingDay> {
    rows.iter()
        .into_group_map_by(|r| r.application_date)
        .into_iter()
        .sorted_by_key(|(date, _)| *date)
        .map(|(date, rows)| UpcomingDay {
            date,
            patients: rows.iter().map(|r| r.patient_id).collect::<HashSet<_>>().len(),
            lines: rows.len(),
        })
        .collect()
}

// ============================================================================
// MEDICATION RANGE
// ============================================================================

/// Per-medication demand, already aggregated by the database
#[derive(Debug, Clone, FromRow)]
pub struct MedicationRangeRow {
    pub medication_id: Uuid,
    pub medication_code: Option<String>,
    pub medication_name: String,
    pub lines: i64,
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RangeTotals {
    pub lines: i64,
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RangeUsage {
    pub medication_id: Uuid,
    pub medication: String,
    pub lines: i64,
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MedicationRangeReport {
    pub range: DateRange,
    pub totals: RangeTotals,
    pub rows: Vec<RangeUsage>,
}

/// Label the rows, order by units desc and add the totals.
pub fn medication_range(range: DateRange, rows: Vec<MedicationRangeRow>) -> MedicationRangeReport {
    let rows: Vec<RangeUsage> = rows
        .into_iter()
        .map(|row| RangeUsage {
            medication_id: row.medication_id,
            medication: medication_label(row.medication_code.as_deref(), &row.medication_name),
            lines: row.lines,
            units: row.units,
        })
        .sorted_by(|a, b| b.units.total_cmp(&a.units).then_with(|| a.medication.cmp(&b.medication)))
        .collect();

    let totals = RangeTotals {
        lines: rows.iter().map(|r| r.lines).sum(),
        units: rows.iter().map(|r| r.units).sum(),
    };

    MedicationRangeReport { range, totals, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn request(patient: Uuid, date: NaiveDate) -> StatsRequestRow {
        StatsRequestRow {
            id: Uuid::new_v4(),
            patient_id: patient,
            reception_date: date,
        }
    }

    fn item(req: &StatsRequestRow, medication: Uuid, status: ItemStatus) -> StatsItemRow {
        StatsItemRow {
            prep_request_id: req.id,
            reception_date: req.reception_date,
            medication_id: medication,
            medication_code: None,
            medication_name: "ONDANSETRON".to_string(),
            units_required: 1.5,
            status: status.as_str().to_string(),
            acquisition: "stockable".to_string(),
            frequency: None,
            cancel_reason: None,
            pharmacist_id: None,
            pharmacist_label: None,
            prescriber_id: None,
            prescriber_label: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            delivered_at: None,
        }
    }

    fn range() -> DateRange {
        DateRange { from: day(1), to: day(30) }
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.5), Some(2.5));
        assert!((percentile(&values, 0.9).unwrap() - 3.7).abs() < 1e-9);
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(4.0));
        assert_eq!(percentile(&[7.0], 0.9), Some(7.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_totals_and_daily_series() {
        let ana = Uuid::new_v4();
        let luis = Uuid::new_v4();
        let med = Uuid::new_v4();

        let r1 = request(ana, day(2));
        let r2 = request(luis, day(2));
        let r3 = request(ana, day(3));
        // a request without items still counts
        let r4 = request(luis, day(5));

        let items = vec![
            item(&r1, med, ItemStatus::Delivered),
            item(&r1, med, ItemStatus::Pending),
            item(&r2, med, ItemStatus::Cancelled),
            item(&r3, med, ItemStatus::Pending),
        ];
        let requests = vec![r1, r2, r3, r4];

        let stats = compute(range(), &requests, &items, &[]);

        assert_eq!(stats.totals.requests, 4);
        assert_eq!(stats.totals.patients, 2);
        assert_eq!(stats.totals.lines, 4);
        assert!((stats.totals.units - 6.0).abs() < 1e-9);
        assert_eq!(stats.totals.delivered, 1);
        assert_eq!(stats.totals.cancelled, 1);

        assert_eq!(
            stats.daily,
            vec![
                DailyPoint { date: day(2), requests: 2, patients: 2, lines: 3 },
                DailyPoint { date: day(3), requests: 1, patients: 1, lines: 1 },
                DailyPoint { date: day(5), requests: 1, patients: 1, lines: 0 },
            ]
        );
        assert_eq!(stats.status[0], CountEntry { key: "pending".into(), count: 2 });
    }

    #[test]
    fn test_breakdowns_use_placeholders() {
        let req = request(Uuid::new_v4(), day(4));
        let med = Uuid::new_v4();

        let mut cancelled = item(&req, med, ItemStatus::Cancelled);
        cancelled.frequency = Some("CADA 12 HORAS".into());
        let mut reasoned = item(&req, med, ItemStatus::Cancelled);
        reasoned.cancel_reason = Some("ALTA MEDICA".into());
        let mut assigned = item(&req, med, ItemStatus::Ready);
        let pharmacist = Uuid::new_v4();
        assigned.pharmacist_id = Some(pharmacist);
        assigned.pharmacist_label = Some("QF01 - LUIS ROJAS".into());
        let plain = item(&req, med, ItemStatus::Ready);

        let stats = compute(range(), &[req], &[cancelled, reasoned, assigned, plain], &[]);

        assert_eq!(stats.frequencies[0], CountEntry { key: "UNDEFINED".into(), count: 3 });
        assert_eq!(stats.cancel_reasons.len(), 2);
        assert!(stats.cancel_reasons.contains(&CountEntry { key: "NO REASON".into(), count: 1 }));
        assert_eq!(
            stats.pharmacist_workload,
            vec![
                Workload { id: None, name: "UNASSIGNED".into(), lines: 3 },
                Workload { id: Some(pharmacist), name: "QF01 - LUIS ROJAS".into(), lines: 1 },
            ]
        );
        assert_eq!(stats.top_medications.len(), 1);
        assert_eq!(stats.top_medications[0].lines, 4);
    }

    #[test]
    fn test_top_lists_are_truncated() {
        let req = request(Uuid::new_v4(), day(4));
        let items: Vec<StatsItemRow> = (0..20)
            .map(|n| {
                let mut row = item(&req, Uuid::new_v4(), ItemStatus::Pending);
                row.frequency = Some(format!("F{:02}", n));
                row
            })
            .collect();

        let stats = compute(range(), &[req], &items, &[]);
        assert_eq!(stats.frequencies.len(), 12);
        assert_eq!(stats.frequencies[0].key, "F00");
        assert_eq!(stats.top_medications.len(), 10);
    }

    #[test]
    fn test_delivery_times() {
        let req = request(Uuid::new_v4(), day(4));
        let med = Uuid::new_v4();
        let items: Vec<StatsItemRow> = [1, 2, 3, 10]
            .iter()
            .map(|hours| {
                let mut row = item(&req, med, ItemStatus::Delivered);
                row.delivered_at = Some(row.created_at + Duration::hours(*hours));
                row
            })
            .chain(std::iter::once(item(&req, med, ItemStatus::Pending)))
            .collect();

        let delivery = compute(range(), &[req], &items, &[]).delivery;

        assert_eq!(delivery.count, 4);
        assert_eq!(delivery.mean_hours, Some(4.0));
        assert_eq!(delivery.p50_hours, Some(2.5));
        assert!((delivery.p90_hours.unwrap() - 7.9).abs() < 1e-9);
        assert_eq!(delivery.within_target_pct, Some(75.0));
    }

    #[test]
    fn test_no_deliveries_leaves_times_empty() {
        let delivery = compute(range(), &[], &[], &[]).delivery;
        assert_eq!(delivery, DeliveryTimes::default());
    }

    #[test]
    fn test_upcoming_counts_distinct_patients() {
        let ana = Uuid::new_v4();
        let luis = Uuid::new_v4();
        let rows = vec![
            UpcomingItemRow { application_date: day(21), patient_id: ana },
            UpcomingItemRow { application_date: day(20), patient_id: ana },
            UpcomingItemRow { application_date: day(20), patient_id: ana },
            UpcomingItemRow { application_date: day(20), patient_id: luis },
        ];

        let upcoming = compute(range(), &[], &[], &rows).upcoming;
        assert_eq!(
            upcoming,
            vec![
                UpcomingDay { date: day(20), patients: 2, lines: 3 },
                UpcomingDay { date: day(21), patients: 1, lines: 1 },
            ]
        );
    }

    #[test]
    fn test_medication_range_totals() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let report = medication_range(
            DateRange { from: day(1), to: day(7) },
            vec![
                MedicationRangeRow {
                    medication_id: a,
                    medication_code: None,
                    medication_name: "ACICLOVIR".into(),
                    lines: 3,
                    units: 4.0,
                },
                MedicationRangeRow {
                    medication_id: b,
                    medication_code: Some("1-01-02-0003".into()),
                    medication_name: "PARACETAMOL".into(),
                    lines: 2,
                    units: 9.5,
                },
            ],
        );

        assert_eq!(report.rows[0].medication, "1-01-02-0003 - PARACETAMOL");
        assert_eq!(report.rows[1].medication_id, a);
        assert_eq!(report.totals, RangeTotals { lines: 5, units: 13.5 });
    }
}
