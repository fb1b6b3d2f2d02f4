mod calendar;
mod config;
mod dataset;
mod error;
mod fetch;

pub use error::AqiError;

pub use calendar::date_range::*;
pub use calendar::error::CalendarError;
pub use calendar::jalali_date::*;

pub use config::*;

pub use fetch::coordinator::*;
pub use fetch::day_fetcher::*;
pub use fetch::error::FetchError;
pub use fetch::job::*;
pub use fetch::normalizer::*;
pub use fetch::output_path::*;
pub use fetch::retry::*;
pub use fetch::transport::*;

pub use dataset::error::DatasetError;
pub use dataset::features::*;
pub use dataset::loader::*;
pub use dataset::trend::*;
