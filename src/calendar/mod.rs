pub mod date_range;
pub mod error;
pub mod jalali_date;
