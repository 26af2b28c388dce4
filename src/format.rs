// Pica - Media Download Core
// Copyright (C) 2025 Pica contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Human-readable formatting for durations, sizes and dates
//!
//! These are the strings the observer view and the library listing show:
//! - `format_time` - `HH:MM:SS` clock for elapsed/remaining time
//! - `format_size` - 1024-based byte sizes (`B`, `KB`, `MB`)
//! - `humanize_date` - relative publish dates ("Today", "3 days ago", ...)

use chrono::NaiveDate;

/// Format seconds as `HH:MM:SS`
///
/// Fractional seconds are truncated. Hours are not wrapped, so long
/// downloads show e.g. `26:00:00`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (minutes, secs) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Format a byte count (or byte rate) as a human-readable string
pub fn format_size(bytes: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    if bytes < KIB {
        format!("{:.0} B", bytes)
    } else if bytes < MIB {
        format!("{:.2} KB", bytes / KIB)
    } else {
        format!("{:.2} MB", bytes / MIB)
    }
}

/// Convert a `YYYY-MM-DD` date to a relative description against `today`
///
/// Unparsable input and dates in the future are returned unchanged.
pub fn humanize_date(date_str: &str, today: NaiveDate) -> String {
    let published = match NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => return date_str.to_string(),
    };

    let delta_days = (today - published).num_days();
    if delta_days < 0 {
        return date_str.to_string();
    }

    match delta_days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=29 => format!("{} days ago", delta_days),
        30..=364 => plural(delta_days / 30, "month"),
        _ => plural(delta_days / 365, "year"),
    }
}

/// `humanize_date` against the local calendar date
pub fn humanize_date_local(date_str: &str) -> String {
    humanize_date(date_str, chrono::Local::now().date_naive())
}

fn plural(count: i64, unit: &str) -> String {
    if count > 1 {
        format!("{} {}s ago", count, unit)
    } else {
        format!("{} {} ago", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn days_before(days: i64) -> String {
        (today() - Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00:00");
        assert_eq!(format_time(59.9), "00:00:59");
        assert_eq!(format_time(3_725.0), "01:02:05");
        assert_eq!(format_time(-4.0), "00:00:00");
        assert_eq!(format_time(f64::INFINITY), "00:00:00");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512.0), "512 B");
        assert_eq!(format_size(1536.0), "1.50 KB");
        assert_eq!(format_size(10.0 * 1024.0 * 1024.0), "10.00 MB");
    }

    #[test]
    fn test_humanize_recent() {
        assert_eq!(humanize_date(&days_before(0), today()), "Today");
        assert_eq!(humanize_date(&days_before(1), today()), "Yesterday");
        assert_eq!(humanize_date(&days_before(10), today()), "10 days ago");
    }

    #[test]
    fn test_humanize_months_and_years() {
        assert_eq!(humanize_date(&days_before(45), today()), "1 month ago");
        assert_eq!(humanize_date(&days_before(95), today()), "3 months ago");
        assert_eq!(humanize_date(&days_before(400), today()), "1 year ago");
        assert_eq!(humanize_date(&days_before(800), today()), "2 years ago");
    }

    #[test]
    fn test_humanize_passthrough() {
        assert_eq!(humanize_date("not a date", today()), "not a date");
        assert_eq!(humanize_date("", today()), "");
        assert_eq!(humanize_date(&days_before(-3), today()), days_before(-3));
    }
}
