//! A day in the Jalali (Solar Hijri) calendar.
//!
//! Conversion uses the arithmetic 33-year cycle: 8 leap years per cycle, 12053
//! days per cycle. Leap years are those whose year number modulo 33 is one of
//! 1, 5, 9, 13, 17, 22, 26 or 30. Days are counted from 979/01/01, which falls
//! on Gregorian 1600-03-20.

use crate::calendar::error::CalendarError;
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const EPOCH_YEAR: i64 = 979;
/// `num_days_from_ce` of Gregorian 1600-03-20 (Jalali 979/01/01).
const EPOCH_CE_DAY: i64 = 584_102;
const DAYS_PER_CYCLE: i64 = 12_053;
const DAYS_PER_FOUR_YEARS: i64 = 1_461;
/// Days in the first six months, which have 31 days each.
const FIRST_HALF_DAYS: i64 = 186;

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JalaliDate {
    year: i32,
    month: u32,
    day: u32,
}

impl JalaliDate {
    /// Builds a date, rejecting days that do not exist in the calendar
    /// (e.g. 1402/12/30, since 1402 is not a leap year).
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, CalendarError> {
        let nonexistent = CalendarError::NonexistentDate { year, month, day };
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(nonexistent);
        }
        match days_in_month(year, month) {
            Some(max_day) if (1..=max_day).contains(&day) => Ok(Self { year, month, day }),
            _ => Err(nonexistent),
        }
    }

    /// For compile-time constants that are known to be valid.
    pub(crate) const fn from_ymd_unchecked(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn day(self) -> u32 {
        self.day
    }

    /// Days elapsed since 979/01/01.
    fn day_number(self) -> i64 {
        let years = i64::from(self.year) - EPOCH_YEAR;
        365 * years
            + 8 * years.div_euclid(33)
            + (years.rem_euclid(33) + 3) / 4
            + days_before_month(self.month)
            + i64::from(self.day)
            - 1
    }

    fn from_day_number(number: i64) -> Option<Self> {
        let cycle = number.div_euclid(DAYS_PER_CYCLE);
        let mut rem = number.rem_euclid(DAYS_PER_CYCLE);

        let mut year = EPOCH_YEAR + 33 * cycle + 4 * (rem / DAYS_PER_FOUR_YEARS);
        rem %= DAYS_PER_FOUR_YEARS;
        // The first year of every four-year block is the leap one.
        if rem >= 366 {
            year += (rem - 1) / 365;
            rem = (rem - 1) % 365;
        }

        let (month, day) = if rem < FIRST_HALF_DAYS {
            (rem / 31 + 1, rem % 31 + 1)
        } else {
            let rem = rem - FIRST_HALF_DAYS;
            (rem / 30 + 7, rem % 30 + 1)
        };

        let year = i32::try_from(year).ok()?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        Some(Self {
            year,
            month: u32::try_from(month).ok()?,
            day: u32::try_from(day).ok()?,
        })
    }

    /// Number of days from `self` to `other`; negative when `other` is earlier.
    pub fn days_until(self, other: JalaliDate) -> i64 {
        other.day_number() - self.day_number()
    }

    /// Shifts the date by `days`, or `None` when the result leaves the supported years.
    pub fn add_days(self, days: i64) -> Option<Self> {
        Self::from_day_number(self.day_number().checked_add(days)?)
    }

    pub fn to_gregorian(self) -> Option<NaiveDate> {
        let ce_day = i32::try_from(EPOCH_CE_DAY + self.day_number()).ok()?;
        NaiveDate::from_num_days_from_ce_opt(ce_day)
    }

    pub fn from_gregorian(date: NaiveDate) -> Option<Self> {
        Self::from_day_number(i64::from(date.num_days_from_ce()) - EPOCH_CE_DAY)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    matches!(year.rem_euclid(33), 1 | 5 | 9 | 13 | 17 | 22 | 26 | 30)
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    match month {
        1..=6 => Some(31),
        7..=11 => Some(30),
        12 if is_leap_year(year) => Some(30),
        12 => Some(29),
        _ => None,
    }
}

fn days_before_month(month: u32) -> i64 {
    let month = i64::from(month);
    if month <= 7 {
        (month - 1) * 31
    } else {
        FIRST_HALF_DAYS + (month - 7) * 30
    }
}

impl Display for JalaliDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for JalaliDate {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CalendarError::InvalidFormat(s.to_string());
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [year, month, day] = parts.as_slice() else {
            return Err(invalid());
        };
        if [year, month, day]
            .iter()
            .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        let day = day.parse().map_err(|_| invalid())?;
        JalaliDate::new(year, month, day)
    }
}
