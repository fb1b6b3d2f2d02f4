use crate::calendar::error::CalendarError;
use crate::calendar::jalali_date::JalaliDate;
use std::fmt;
use std::fmt::{Display, Formatter};

/// An inclusive span of Jalali days, `start <= end`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DateRange {
    start: JalaliDate,
    end: JalaliDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`CalendarError::InvertedRange`] if `end` precedes `start`.
    pub fn new(start: JalaliDate, end: JalaliDate) -> Result<Self, CalendarError> {
        if end < start {
            return Err(CalendarError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses both endpoints as `YYYY/MM/DD`.
    pub fn parse(start: &str, end: &str) -> Result<Self, CalendarError> {
        Self::new(start.parse()?, end.parse()?)
    }

    pub fn start(&self) -> JalaliDate {
        self.start
    }

    pub fn end(&self) -> JalaliDate {
        self.end
    }

    /// Number of days in the range, both endpoints included.
    pub fn len(&self) -> usize {
        usize::try_from(self.start.days_until(self.end) + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every day from `start` to `end` inclusive, ascending.
    pub fn days(&self) -> Vec<JalaliDate> {
        let delta = self.start.days_until(self.end);
        (0..=delta)
            .map_while(|offset| self.start.add_days(offset))
            .collect()
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Expands `start..=end` (both `YYYY/MM/DD` Jalali strings) into the ordered day sequence.
///
/// # Errors
///
/// Fails with [`CalendarError`] when either endpoint is malformed or the range is inverted.
pub fn expand(start: &str, end: &str) -> Result<Vec<JalaliDate>, CalendarError> {
    Ok(DateRange::parse(start, end)?.days())
}
