//! Storage counters

use std::fmt;

/// Counters reported by the device, used to size bulk transfers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordsInfo {
    pub users: u32,
    pub fingerprints: u32,
    pub passwords: u32,
    pub cards: u32,
    pub all_records: u32,
    /// Records not yet acknowledged with a clear-records call
    pub new_records: u32,
}

impl fmt::Display for RecordsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users={} fp={} pwd={} cards={} records={} new={}",
            self.users,
            self.fingerprints,
            self.passwords,
            self.cards,
            self.all_records,
            self.new_records
        )
    }
}
