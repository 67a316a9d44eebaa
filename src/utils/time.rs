use chrono::NaiveDate;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a session key in worktimer.
pub fn date_to_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Reads a session key back into a date. Anything else than `YYYY-MM-DD` is rejected.
pub fn key_to_date(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

/// Splits a number of seconds into hours, minutes and seconds. Values are truncated, never
/// rounded.
pub fn split_seconds(total: u64) -> (u64, u64, u64) {
    (total / 3600, (total % 3600) / 60, total % 60)
}
