use crate::calendar::jalali_date::JalaliDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("Date '{0}' is not in YYYY/MM/DD form")]
    InvalidFormat(String),

    #[error("Jalali date {year:04}/{month:02}/{day:02} does not exist")]
    NonexistentDate { year: i32, month: u32, day: u32 },

    #[error("End date {end} precedes start date {start}")]
    InvertedRange { start: JalaliDate, end: JalaliDate },
}
