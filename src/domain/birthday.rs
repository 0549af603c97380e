//! Upcoming-birthday window arithmetic.
//!
//! Birthdays are compared on month and day only. The window is
//! `[today, today + days]`, both ends inclusive, and may wrap over New
//! Year. A Feb 29 birthday is celebrated on Mar 1 in non-leap years.

use chrono::{Datelike, Duration, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthdayWindow {
    today: NaiveDate,
    days: u32,
}

impl BirthdayWindow {
    pub fn new(today: NaiveDate, days: u32) -> Self {
        Self { today, days }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// Last day of the window.
    pub fn end(&self) -> NaiveDate {
        self.today + Duration::days(i64::from(self.days))
    }

    /// `MMDD` key of the first day, comparable with `to_char(birthday, 'MMDD')`.
    pub fn start_key(&self) -> String {
        self.today.format("%m%d").to_string()
    }

    /// `MMDD` key of the last day.
    pub fn end_key(&self) -> String {
        self.end().format("%m%d").to_string()
    }

    /// The window reaches the same calendar day a year on, so every
    /// birthday falls inside it.
    pub fn covers_full_year(&self) -> bool {
        self.days_until(self.today.pred_opt().unwrap_or(self.today)) <= i64::from(self.days)
    }

    /// The window crosses New Year, so the `MMDD` range is split in two.
    pub fn wraps_year(&self) -> bool {
        !self.covers_full_year() && self.end().year() != self.today.year()
    }

    /// Days from today until the next occurrence of `birthday` (0 = today).
    pub fn days_until(&self, birthday: NaiveDate) -> i64 {
        let this_year = anniversary(birthday, self.today.year());
        let next = if this_year >= self.today {
            this_year
        } else {
            anniversary(birthday, self.today.year() + 1)
        };
        (next - self.today).num_days()
    }

    pub fn contains(&self, birthday: NaiveDate) -> bool {
        self.days_until(birthday) <= i64::from(self.days)
    }
}

/// The date `birthday` is celebrated in `year`.
fn anniversary(birthday: NaiveDate, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
        .unwrap_or(birthday)
}
