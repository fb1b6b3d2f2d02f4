use crate::calendar::jalali_date::JalaliDate;
use crate::fetch::error::FetchError;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const OUTPUT_EXTENSION: &str = "parquet";

/// `base/year=<Y>/month=<M>/aqi_<Y>_<M>_<D>.parquet`, all components in the Jalali calendar.
pub fn output_path(base_dir: &Path, date: JalaliDate) -> PathBuf {
    let (year, month, day) = (date.year(), date.month(), date.day());
    base_dir
        .join(format!("year={year:04}"))
        .join(format!("month={month:02}"))
        .join(format!(
            "aqi_{year:04}_{month:02}_{day:02}.{OUTPUT_EXTENSION}"
        ))
}

/// Resolves the day's path and makes sure its month directory exists.
///
/// Sibling days of the same month race to create the same directory;
/// `create_dir_all` treats a directory that already exists as success.
pub async fn ensure_output_path(base_dir: &Path, date: JalaliDate) -> Result<PathBuf, FetchError> {
    let path = output_path(base_dir, date);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| FetchError::OutputDirCreation(parent.to_path_buf(), e))?;
    }
    Ok(path)
}
