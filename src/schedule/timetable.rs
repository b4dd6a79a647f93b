use serde::Deserialize;
use std::time::Duration;
use time::{OffsetDateTime, Time};

/// Minimum wait returned by [`next_fire`]; absorbs zero or negative
/// durations from clock skew or an exact hour:minute match.
pub const SCHEDULE_FLOOR: Duration = Duration::from_secs(2);

/// One daily trigger point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScheduleEntry {
    pub hour: u8,
    pub minute: u8,
    #[serde(rename = "sendMail", default)]
    pub notify: bool,
}

impl ScheduleEntry {
    fn clock(&self) -> (u8, u8) {
        (self.hour, self.minute)
    }
}

pub fn sort_table(table: &mut [ScheduleEntry]) {
    table.sort_by_key(ScheduleEntry::clock);
}

/// Wait until the next trigger and that entry's notify flag.
///
/// Binary-searches `table` (sorted by (hour, minute)) for the first entry at
/// or after `now`'s (hour, minute); past the last entry it wraps to the
/// first entry tomorrow. Returns `None` only for an empty table.
pub fn next_fire(now: OffsetDateTime, table: &[ScheduleEntry]) -> Option<(Duration, bool)> {
    if table.is_empty() {
        return None;
    }
    let clock_now = (now.hour(), now.minute());
    let index = table.partition_point(|entry| entry.clock() < clock_now);
    let (entry, tomorrow) = if index < table.len() {
        (table[index], false)
    } else {
        (table[0], true)
    };

    let at = Time::from_hms(entry.hour, entry.minute, 0).ok()?;
    let mut fire = now.replace_time(at);
    if tomorrow {
        fire += time::Duration::days(1);
    }
    let until = Duration::try_from(fire - now).unwrap_or(Duration::ZERO);
    Some((until.max(SCHEDULE_FLOOR), entry.notify))
}
