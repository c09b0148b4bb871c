//! Daily water-budget accounting.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;

use irrigo_domain::id::RoomId;

#[derive(Debug, Default)]
struct Ledger {
    day: Option<NaiveDate>,
    totals: HashMap<RoomId, u32>,
}

/// Seconds watered per room since the last local-midnight reset.
#[derive(Debug, Default)]
pub struct DailyTotals {
    ledger: Mutex<Ledger>,
}

impl DailyTotals {
    #[must_use]
    pub fn get(&self, room_id: &RoomId) -> u32 {
        self.lock().totals.get(room_id).copied().unwrap_or(0)
    }

    /// Add watered seconds to a room, returning the new total.
    pub fn add(&self, room_id: &RoomId, seconds: u32) -> u32 {
        let mut ledger = self.lock();
        let total = ledger.totals.entry(room_id.clone()).or_insert(0);
        *total = total.saturating_add(seconds);
        *total
    }

    /// Clear every total if `today` differs from the day of the last reset.
    ///
    /// Returns whether a reset happened, so a boundary is only ever
    /// crossed once no matter how often the reset timer fires.
    pub fn reset_for(&self, today: NaiveDate) -> bool {
        let mut ledger = self.lock();
        if ledger.day == Some(today) {
            return false;
        }
        ledger.day = Some(today);
        ledger.totals.clear();
        true
    }

    pub fn forget(&self, room_id: &RoomId) {
        self.lock().totals.remove(room_id);
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<RoomId, u32> {
        self.lock()
            .totals
            .iter()
            .map(|(room, total)| (room.clone(), *total))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
