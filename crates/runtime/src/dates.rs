//! Date windows named in free text.
//!
//! Relative phrases are resolved against an explicit `today` so results are
//! reproducible. Financial years run April to March.

use chrono::{Datelike, Duration, Local, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tallygate_common::models::{DashboardFilters, DateRange};

pub(crate) static LAST_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:last|past)\s+(\d{1,4})\s+days?\b").unwrap());
pub(crate) static PAST_MONTHS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:last|past)\s+(\d{1,3})\s+months?\b").unwrap());
static EXPLICIT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4}|\d{2}-\d{2}-\d{4})\b").unwrap()
});

/// Upper bound for "last N days".
pub const MAX_WINDOW_DAYS: u32 = 3_660;
/// Upper bound for "past N months".
pub const MAX_WINDOW_MONTHS: u32 = 120;

/// Closed, inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    /// Builds a window, swapping the bounds if they arrive reversed.
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { from: a, to: b }
        } else {
            Self { from: b, to: a }
        }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    pub fn days(&self) -> u32 {
        ((self.to - self.from).num_days() + 1) as u32
    }

    /// Calendar months touched by the window, counting partial months.
    pub fn months_spanned(&self) -> u32 {
        let index = |d: NaiveDate| d.year() * 12 + d.month0() as i32;
        (index(self.to) - index(self.from) + 1) as u32
    }

    pub fn to_range(&self) -> DateRange {
        DateRange {
            from: Some(self.from),
            to: Some(self.to),
        }
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// April 1 of the financial year containing `date`.
pub fn financial_year_start(date: NaiveDate) -> NaiveDate {
    let year = if date.month() >= 4 {
        date.year()
    } else {
        date.year() - 1
    };
    NaiveDate::from_ymd_opt(year, 4, 1).unwrap_or(date)
}

/// The full financial year (April 1 to March 31) containing `date`.
pub fn financial_year(date: NaiveDate) -> DateWindow {
    let start = financial_year_start(date);
    let end = NaiveDate::from_ymd_opt(start.year() + 1, 3, 31).unwrap_or(start);
    DateWindow::new(start, end)
}

/// The `days` days ending today, today included.
pub fn last_days(days: u32, today: NaiveDate) -> DateWindow {
    let days = days.clamp(1, MAX_WINDOW_DAYS);
    DateWindow::new(today - Duration::days(days as i64 - 1), today)
}

/// The current month plus the `months - 1` months before it, ending today.
pub fn past_months(months: u32, today: NaiveDate) -> DateWindow {
    let months = months.clamp(1, MAX_WINDOW_MONTHS);
    let current = month_start(today);
    let from = current
        .checked_sub_months(Months::new(months - 1))
        .unwrap_or(current);
    DateWindow::new(from, today)
}

pub fn this_month(today: NaiveDate) -> DateWindow {
    DateWindow::new(month_start(today), today)
}

pub fn last_month(today: NaiveDate) -> DateWindow {
    let end = month_start(today) - Duration::days(1);
    DateWindow::new(month_start(end), end)
}

/// Find the first date expression in `text`.
pub fn extract_window(text: &str, today: NaiveDate) -> Option<DateWindow> {
    let lower = text.to_lowercase();
    let has = |phrase: &str| lower.contains(phrase);

    if has("today") {
        return Some(DateWindow::day(today));
    }
    if has("yesterday") {
        return Some(DateWindow::day(today - Duration::days(1)));
    }
    if has("this week") {
        return Some(DateWindow::new(week_start(today), today));
    }
    if has("last week") {
        let start = week_start(today) - Duration::days(7);
        return Some(DateWindow::new(start, start + Duration::days(6)));
    }
    if has("this month") {
        return Some(this_month(today));
    }
    if has("last month") {
        return Some(last_month(today));
    }
    if has("this financial year") || has("current financial year") || has("this fy") {
        return Some(DateWindow::new(financial_year_start(today), today));
    }
    if has("last financial year") || has("previous financial year") || has("last fy") {
        let previous = financial_year_start(today) - Duration::days(1);
        return Some(financial_year(previous));
    }
    if has("this year") {
        let start = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
        return Some(DateWindow::new(start, today));
    }
    if has("last year") {
        let start = NaiveDate::from_ymd_opt(today.year() - 1, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(today.year() - 1, 12, 31)?;
        return Some(DateWindow::new(start, end));
    }
    if let Some(days) = capture_number(&LAST_DAYS, &lower) {
        return Some(last_days(days, today));
    }
    if let Some(months) = capture_number(&PAST_MONTHS, &lower) {
        return Some(past_months(months, today));
    }

    explicit_dates(text)
}

/// Explicit dates in `YYYY-MM-DD`, `DD/MM/YYYY` or `DD-MM-YYYY`. Two or more form a range.
fn explicit_dates(text: &str) -> Option<DateWindow> {
    let dates: Vec<NaiveDate> = EXPLICIT_DATE
        .find_iter(text)
        .filter_map(|m| parse_date(m.as_str()))
        .collect();

    let min = dates.iter().min()?;
    let max = dates.iter().max()?;
    Some(DateWindow::new(*min, *max))
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let format = if s.contains('/') {
        "%d/%m/%Y"
    } else if s.len() == 10 && s.as_bytes()[4] == b'-' {
        "%Y-%m-%d"
    } else {
        "%d-%m-%Y"
    };
    NaiveDate::parse_from_str(s, format).ok()
}

pub(crate) fn capture_number(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Combine a window found in text with the dashboard's own date filters.
/// Each dashboard bound overrides the matching side of the text window.
pub fn merge_with_dashboard(
    window: Option<DateWindow>,
    filters: Option<&DashboardFilters>,
) -> Option<DateRange> {
    let mut range = window.map(|w| w.to_range());
    if let Some(f) = filters {
        if f.date_from.is_some() || f.date_to.is_some() {
            let r = range.get_or_insert_with(DateRange::default);
            if f.date_from.is_some() {
                r.from = f.date_from;
            }
            if f.date_to.is_some() {
                r.to = f.date_to;
            }
        }
    }
    range
}
