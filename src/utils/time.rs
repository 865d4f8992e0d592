use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// This is the standard way of converting a date to a string in onto. It doubles as the key
/// under which a day is stored, both locally and remotely.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Strict inverse of [date_key]. Rejects shorthand like `2026-8-2` that chrono would otherwise
/// accept.
pub fn parse_date_key(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .filter(|date| date_key(*date) == s)
}

/// Calendar date of `at` on the local clock. All day bucketing in the application goes through
/// this.
pub fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// Start of `date` on the local clock, as an instant. Used as the boundary timestamp when a day
/// rolls over.
pub fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let mut candidate = date.and_time(NaiveTime::MIN);
    loop {
        if let Some(v) = Local.from_local_datetime(&candidate).earliest() {
            return v.with_timezone(&Utc);
        }
        // midnight fell into a DST gap, fall forward
        candidate += Duration::hours(1);
    }
}

/// Compact human format: `2h 5m`, `3m 20s`, `45s`.
pub fn format_duration_short(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

/// Stopwatch format: `1:02:35`.
pub fn format_duration_clock(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}
