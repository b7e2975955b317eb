use std::fmt::Display;

use anyhow::bail;
use chrono::{Datelike as _, Days, Local, NaiveDate, NaiveDateTime, NaiveTime};

/// A Monday-through-Sunday reporting window. `start` is always a Monday and
/// `end` is always the following Sunday, whatever date the window was built
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl WeekWindow {
    /// Returns the week window containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let start = date - Days::new(date.weekday().num_days_from_monday() as u64);
        let end = start + Days::new(6);
        Self { start, end }
    }

    /// Parses a week selector from the command line. Valid options are
    /// "today" or any date of the form "%Y-%m-%d"; the result is the week
    /// containing that date.
    pub fn from_selector(selector: &str) -> anyhow::Result<Self> {
        let date = match selector {
            "today" => Local::now().date_naive(),
            date_string => {
                let Ok(date) = NaiveDate::parse_from_str(date_string, "%Y-%m-%d") else {
                    bail!("invalid week selector \"{date_string}\". Use 'today' or '%Y-%m-%d'");
                };
                date
            }
        };
        Ok(Self::containing(date))
    }

    /// The Monday the window starts on.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// The Sunday the window ends on (inclusive).
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `instant` falls within the window. Inclusive on both edges:
    /// anything from Monday 00:00 up to the end of Sunday counts.
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        let date = instant.date();
        date >= self.start && date <= self.end
    }
}

impl Display for WeekWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start.format("%m/%d/%Y"), self.end.format("%m/%d/%Y"))
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parses the date formats seen in the weekly exports. Returns `None` rather
/// than an error; callers drop records whose dates do not parse.
pub fn parse_loose_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(NaiveDateTime::new(date, NaiveTime::MIN));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn window_normalizes_to_monday() {
        // 2025-08-20 is a Wednesday
        let window = WeekWindow::containing(NaiveDate::from_ymd_opt(2025, 8, 20).unwrap());
        assert_eq!(window.start(), NaiveDate::from_ymd_opt(2025, 8, 18).unwrap());
        assert_eq!(window.end(), NaiveDate::from_ymd_opt(2025, 8, 24).unwrap());
        assert_eq!(window.start().weekday(), Weekday::Mon);
        assert!(window.start() <= window.end());
    }

    #[test]
    fn window_from_monday_and_sunday_is_identical() {
        let monday = WeekWindow::containing(NaiveDate::from_ymd_opt(2025, 8, 18).unwrap());
        let sunday = WeekWindow::containing(NaiveDate::from_ymd_opt(2025, 8, 24).unwrap());
        assert_eq!(monday, sunday);
    }

    #[test]
    fn window_edges_are_inclusive() {
        let window = WeekWindow::containing(NaiveDate::from_ymd_opt(2025, 8, 18).unwrap());
        let monday_midnight = parse_loose_date("2025-08-18").unwrap();
        let late_sunday = parse_loose_date("2025-08-24 23:59:59").unwrap();
        let next_monday = parse_loose_date("2025-08-25").unwrap();
        assert!(window.contains(monday_midnight));
        assert!(window.contains(late_sunday));
        assert!(!window.contains(next_monday));
    }

    #[test]
    fn loose_date_accepts_export_formats() {
        assert!(parse_loose_date("08/20/2025").is_some());
        assert!(parse_loose_date("08/20/2025 02:30 PM").is_some());
        assert!(parse_loose_date("2025-08-20 14:30:00").is_some());
        assert!(parse_loose_date("").is_none());
        assert!(parse_loose_date("next Tuesday").is_none());
    }

    #[test]
    fn week_selector_rejects_garbage() {
        assert!(WeekWindow::from_selector("2025-08-20").is_ok());
        assert!(WeekWindow::from_selector("today").is_ok());
        assert!(WeekWindow::from_selector("tomorrow").is_err());
    }
}
