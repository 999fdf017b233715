//! Local per-day attendance history.
//!
//! One record per (actor, date). A record is opened as an `Absent`
//! placeholder, follows the live session through the day and is finalized at
//! checkout or when a later day begins. Finalized records are never modified.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::config::ShiftPolicy;
use crate::error::{CoreError, Result};
use crate::local_store::{load_document, save_document, LocalStore};
use crate::session::{determine_status, record_for_day};
use crate::storage::RECORDS_KEY;
use crate::types::{AttendanceRecord, AttendanceStatus, DateRange};

type RecordKey = (String, NaiveDate);

#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: BTreeMap<RecordKey, AttendanceRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(store: &dyn LocalStore) -> Self {
        let records: Vec<AttendanceRecord> = load_document(store, RECORDS_KEY);
        let mut loaded = RecordStore::new();
        for record in records {
            loaded
                .records
                .insert((record.actor_id.clone(), record.date), record);
        }
        loaded
    }

    pub fn save(&self, store: &dyn LocalStore) -> Result<()> {
        let records: Vec<&AttendanceRecord> = self.records.values().collect();
        save_document(store, RECORDS_KEY, &records)
    }

    pub fn get(&self, actor_id: &str, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.records.get(&(actor_id.to_string(), date))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ensures a record exists for the day, creating an `Absent` placeholder.
    pub fn open_day(&mut self, actor_id: &str, date: NaiveDate) -> &AttendanceRecord {
        self.records
            .entry((actor_id.to_string(), date))
            .or_insert_with(|| AttendanceRecord::placeholder(actor_id, date))
    }

    /// Mirrors an in-progress session onto its day record.
    pub fn track_session(
        &mut self,
        actor_id: &str,
        date: NaiveDate,
        status: &AttendanceStatus,
        shift: &ShiftPolicy,
    ) -> Result<&AttendanceRecord> {
        self.write(actor_id, date, status, false, shift)
    }

    /// Writes the session's final state and freezes the record.
    pub fn finalize_session(
        &mut self,
        actor_id: &str,
        date: NaiveDate,
        status: &AttendanceStatus,
        shift: &ShiftPolicy,
    ) -> Result<&AttendanceRecord> {
        self.write(actor_id, date, status, true, shift)
    }

    /// Freezes every open record for `actor_id` dated before `date`.
    /// Returns the number of records finalized.
    pub fn finalize_before(&mut self, actor_id: &str, date: NaiveDate, shift: &ShiftPolicy) -> usize {
        let mut finalized = 0;
        for ((actor, day), record) in self.records.iter_mut() {
            if actor != actor_id || *day >= date || record.finalized {
                continue;
            }
            record.finalized = true;
            record.status = determine_status(record, shift);
            finalized += 1;
        }
        if finalized > 0 {
            debug!(actor_id, before = %date, count = finalized, "Finalized past attendance records");
        }
        finalized
    }

    /// Records for `actor_id` within `range`, in date order.
    pub fn range(&self, actor_id: &str, range: &DateRange) -> Vec<AttendanceRecord> {
        let lower = (actor_id.to_string(), range.start);
        let upper = (actor_id.to_string(), range.end);
        self.records
            .range(lower..=upper)
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn write(
        &mut self,
        actor_id: &str,
        date: NaiveDate,
        status: &AttendanceStatus,
        finalize: bool,
        shift: &ShiftPolicy,
    ) -> Result<&AttendanceRecord> {
        let key = (actor_id.to_string(), date);
        if self.records.get(&key).is_some_and(|r| r.finalized) {
            return Err(CoreError::RecordFinalized {
                actor_id: actor_id.to_string(),
                date,
            });
        }

        let record = record_for_day(actor_id, date, status, finalize, shift);
        self.records.insert(key.clone(), record);
        Ok(&self.records[&key])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::MemoryStore;
    use crate::types::DayStatus;
    use chrono::{NaiveDateTime, NaiveTime};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn checked_in(d: u32) -> AttendanceStatus {
        AttendanceStatus {
            is_checked_in: true,
            check_in_time: Some(at(d, 9, 0)),
            last_check_in_date: Some(day(d)),
            ..AttendanceStatus::default()
        }
    }

    fn checked_out(d: u32) -> AttendanceStatus {
        AttendanceStatus {
            is_checked_in: false,
            check_out_time: Some(at(d, 17, 0)),
            total_hours: dec!(8),
            ..checked_in(d)
        }
    }

    #[test]
    fn test_open_day_creates_absent_placeholder() {
        let mut store = RecordStore::new();
        let record = store.open_day("emp-1", day(2));
        assert_eq!(record.status, DayStatus::Absent);
        assert!(!record.finalized);
        assert!(record.check_in_time.is_none());
    }

    #[test]
    fn test_open_day_keeps_existing_record() {
        let mut store = RecordStore::new();
        store
            .track_session("emp-1", day(2), &checked_in(2), &ShiftPolicy::default())
            .unwrap();
        let record = store.open_day("emp-1", day(2));
        assert_eq!(record.status, DayStatus::InProgress);
    }

    #[test]
    fn test_finalized_record_is_immutable() {
        let mut store = RecordStore::new();
        let shift = ShiftPolicy::default();
        store
            .finalize_session("emp-1", day(2), &checked_out(2), &shift)
            .unwrap();

        let err = store
            .track_session("emp-1", day(2), &checked_in(2), &shift)
            .unwrap_err();
        assert!(matches!(err, CoreError::RecordFinalized { .. }));
        assert_eq!(store.get("emp-1", day(2)).unwrap().status, DayStatus::Present);
    }

    #[test]
    fn test_finalize_before_freezes_only_past_days() {
        let mut store = RecordStore::new();
        let shift = ShiftPolicy::default();
        store.open_day("emp-1", day(2));
        store.track_session("emp-1", day(3), &checked_in(3), &shift).unwrap();
        store.open_day("emp-1", day(4));
        store.open_day("emp-2", day(2));

        assert_eq!(store.finalize_before("emp-1", day(4), &shift), 2);

        assert!(store.get("emp-1", day(2)).unwrap().finalized);
        assert_eq!(store.get("emp-1", day(2)).unwrap().status, DayStatus::Absent);
        // Open session without checkout, frozen with zero hours
        assert_eq!(store.get("emp-1", day(3)).unwrap().status, DayStatus::HalfDay);
        assert!(!store.get("emp-1", day(4)).unwrap().finalized);
        assert!(!store.get("emp-2", day(2)).unwrap().finalized);
    }

    #[test]
    fn test_range_filters_actor_and_dates() {
        let mut store = RecordStore::new();
        for d in 1..=9 {
            store.open_day("emp-1", day(d));
        }
        store.open_day("emp-0", day(3));
        store.open_day("emp-2", day(3));

        let range = DateRange::new(day(2), day(8));
        let records = store.range("emp-1", &range);
        assert_eq!(records.len(), 7);
        assert!(records.iter().all(|r| r.actor_id == "emp-1"));
        assert_eq!(records.first().unwrap().date, day(2));
        assert_eq!(records.last().unwrap().date, day(8));
    }

    #[test]
    fn test_persistence_round_trip() {
        let backing = MemoryStore::new();
        let mut store = RecordStore::new();
        store
            .finalize_session("emp-1", day(2), &checked_out(2), &ShiftPolicy::default())
            .unwrap();
        store.save(&backing).unwrap();

        let loaded = RecordStore::load(&backing);
        assert_eq!(loaded.len(), 1);
        let record = loaded.get("emp-1", day(2)).unwrap();
        assert!(record.finalized);
        assert_eq!(record.total_hours, dec!(8));
    }
}
