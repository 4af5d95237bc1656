//! Diff a record's existing items against the requested application dates
//!
//! A record in the history view is one medication line repeated over several
//! application dates, one item per date. Editing the record sends the full
//! target set of dates; this module decides which items survive, which go and
//! which dates still need an item. The database work happens in
//! `handlers::records` inside one transaction.

use chrono::NaiveDate;
use sqlx::FromRow;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// An item the client listed as part of the record, as loaded from the
/// database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExistingItem {
    pub id: Uuid,
    pub prep_request_id: Uuid,
    pub patient_id: Uuid,
    pub application_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Items whose date is still requested; updated in place
    pub keep: Vec<Uuid>,
    /// Requests owning any of the patient's listed items, for the
    /// metadata refresh
    pub request_ids: Vec<Uuid>,
    /// Listed items that belong to the patient, kept or deleted
    pub matched: usize,
    /// Items whose date is no longer requested
    pub delete: Vec<Uuid>,
    /// Requested dates that have no item yet, ascending
    pub create: Vec<NaiveDate>,
}

/// Build the plan. Items of other patients are ignored entirely, so a
/// stale or forged item id can never touch someone else's record.
pub fn plan(patient_id: Uuid, existing: &[ExistingItem], requested: &[NaiveDate]) -> ReconcilePlan {
    let requested: BTreeSet<NaiveDate> = requested.iter().copied().collect();

    let mut plan = ReconcilePlan::default();
    let mut seen_requests = BTreeSet::new();
    let mut by_date: BTreeMap<NaiveDate, Vec<&ExistingItem>> = BTreeMap::new();

    for item in existing.iter().filter(|item| item.patient_id == patient_id) {
        plan.matched += 1;
        if seen_requests.insert(item.prep_request_id) {
            plan.request_ids.push(item.prep_request_id);
        }
        by_date.entry(item.application_date).or_default().push(item);
    }

    for (date, items) in &by_date {
        if requested.contains(date) {
            plan.keep.extend(items.iter().map(|item| item.id));
        } else {
            plan.delete.extend(items.iter().map(|item| item.id));
        }
    }

    plan.create = requested
        .into_iter()
        .filter(|date| !by_date.contains_key(date))
        .collect();

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn item(patient_id: Uuid, date: NaiveDate) -> ExistingItem {
        ExistingItem {
            id: Uuid::new_v4(),
            prep_request_id: Uuid::new_v4(),
            patient_id,
            application_date: date,
        }
    }

    #[test]
    fn test_keeps_deletes_and_creates() {
        let patient = Uuid::new_v4();
        let first = item(patient, day(1));
        let second = item(patient, day(2));
        let third = item(patient, day(3));

        let plan = plan(
            patient,
            &[first.clone(), second.clone(), third.clone()],
            &[day(3), day(1), day(5), day(4)],
        );

        assert_eq!(plan.keep, vec![first.id, third.id]);
        assert_eq!(plan.delete, vec![second.id]);
        assert_eq!(plan.create, vec![day(4), day(5)]);
        assert_eq!(
            plan.request_ids,
            vec![first.prep_request_id, second.prep_request_id, third.prep_request_id]
        );
        assert_eq!(plan.matched, 3);
    }

    #[test]
    fn test_other_patients_items_are_ignored() {
        let patient = Uuid::new_v4();
        let mine = item(patient, day(1));
        let foreign = item(Uuid::new_v4(), day(2));

        let plan = plan(patient, &[mine.clone(), foreign.clone()], &[day(1)]);

        assert_eq!(plan.keep, vec![mine.id]);
        assert!(plan.delete.is_empty());
        assert!(!plan.keep.contains(&foreign.id));
        assert!(plan.create.is_empty());
        assert_eq!(plan.matched, 1);
        assert_eq!(plan.request_ids, vec![mine.prep_request_id]);
    }

    #[test]
    fn test_foreign_date_is_still_created_for_the_patient() {
        let patient = Uuid::new_v4();
        let foreign = item(Uuid::new_v4(), day(2));

        let plan = plan(patient, &[foreign], &[day(2)]);

        assert!(plan.keep.is_empty());
        assert!(plan.request_ids.is_empty());
        assert_eq!(plan.matched, 0);
        assert_eq!(plan.create, vec![day(2)]);
    }

    #[test]
    fn test_metadata_reaches_every_listed_request() {
        let patient = Uuid::new_v4();
        let kept = item(patient, day(1));
        let dropped = item(patient, day(2));

        let plan = plan(patient, &[kept.clone(), dropped.clone()], &[day(1), day(9)]);

        // A request that loses its item still has its metadata refreshed
        assert_eq!(plan.request_ids, vec![kept.prep_request_id, dropped.prep_request_id]);
        assert_eq!(plan.keep, vec![kept.id]);
        assert_eq!(plan.delete, vec![dropped.id]);
        assert_eq!(plan.matched, 2);
    }

    #[test]
    fn test_duplicate_requested_dates_create_once() {
        let patient = Uuid::new_v4();
        let plan = plan(patient, &[], &[day(7), day(7), day(6)]);
        assert_eq!(plan.create, vec![day(6), day(7)]);
    }

    #[test]
    fn test_shared_request_is_listed_once() {
        let patient = Uuid::new_v4();
        let first = item(patient, day(1));
        let mut twin = item(patient, day(1));
        twin.prep_request_id = first.prep_request_id;

        let plan = plan(patient, &[first.clone(), twin.clone()], &[day(1)]);

        assert_eq!(plan.keep.len(), 2);
        assert_eq!(plan.request_ids, vec![first.prep_request_id]);
    }
}
