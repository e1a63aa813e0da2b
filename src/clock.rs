//! Wall-clock rendering of beacon timestamps in Eastern European time.

use core::fmt::Write;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeDelta, Timelike, Utc};
use heapless::String;

const STANDARD_OFFSET_SECS: i64 = 2 * 3600;
const SUMMER_OFFSET_SECS: i64 = 3 * 3600;

/// Shown when an epoch falls outside the representable calendar.
pub const UNKNOWN_TIME: &str = "--/--/-- --:--:--";

pub type TimeText = String<24>;

/// Offset from UTC in effect at `utc`: EEST from 01:00 UTC on the last
/// Sunday of March until 01:00 UTC on the last Sunday of October, EET otherwise.
pub fn local_offset_seconds(utc: &DateTime<Utc>) -> i64 {
    let now = utc.timestamp();
    match (
        last_sunday_switch(utc.year(), 3),
        last_sunday_switch(utc.year(), 10),
    ) {
        (Some(start), Some(end)) if now >= start && now < end => SUMMER_OFFSET_SECS,
        _ => STANDARD_OFFSET_SECS,
    }
}

// March and October both end on the 31st
fn last_sunday_switch(year: i32, month: u32) -> Option<i64> {
    let last_day = NaiveDate::from_ymd_opt(year, month, 31)?;
    let back = u64::from(last_day.weekday().num_days_from_sunday());
    let sunday = last_day.checked_sub_days(Days::new(back))?;
    Some(sunday.and_hms_opt(1, 0, 0)?.and_utc().timestamp())
}

/// Formats epoch seconds as local `dd/mm/yy HH:MM:SS`.
pub fn format_local(epoch: i64) -> TimeText {
    let mut out = TimeText::new();

    let local = DateTime::<Utc>::from_timestamp(epoch, 0).and_then(|utc| {
        let offset = TimeDelta::try_seconds(local_offset_seconds(&utc))?;
        utc.naive_utc().checked_add_signed(offset)
    });

    match local {
        Some(t) => {
            let _ = write!(
                out,
                "{:02}/{:02}/{:02} {:02}:{:02}:{:02}",
                t.day(),
                t.month(),
                t.year().rem_euclid(100),
                t.hour(),
                t.minute(),
                t.second()
            );
        }
        None => {
            let _ = out.push_str(UNKNOWN_TIME);
        }
    }
    out
}
