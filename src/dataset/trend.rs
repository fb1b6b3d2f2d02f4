use crate::dataset::error::DatasetError;
use crate::fetch::normalizer::REQUESTED_DATE_COLUMN;
use log::info;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const MONTH_DAY_COLUMN: &str = "month_day";

/// Pivots one region's AQI into a day-of-year by year table.
///
/// Rows are `MM/DD` keys in ascending order, with one `f64` column per year
/// (also ascending). Several readings for the same day and region are averaged;
/// days missing from a year are null. Returns `None` when the region has no
/// AQI readings at all.
pub fn yearly_trend(df: &DataFrame, region: &str) -> Result<Option<DataFrame>, DatasetError> {
    let regions = df.column("region_name_en")?.str()?;
    let dates = df.column(REQUESTED_DATE_COLUMN)?.str()?;
    let aqi_column = df.column("aqi")?.cast(&DataType::Float64)?;
    let aqi = aqi_column.f64()?;

    // month_day -> year -> (sum, count)
    let mut cells: BTreeMap<String, BTreeMap<String, (f64, u32)>> = BTreeMap::new();
    let mut years: BTreeSet<String> = BTreeSet::new();
    for ((row_region, date), value) in regions.into_iter().zip(dates).zip(aqi) {
        let (Some(row_region), Some(date), Some(value)) = (row_region, date, value) else {
            continue;
        };
        if row_region != region {
            continue;
        }
        let Some((year, month_day)) = date.split_once('/') else {
            continue;
        };
        years.insert(year.to_string());
        let cell = cells
            .entry(month_day.to_string())
            .or_default()
            .entry(year.to_string())
            .or_insert((0.0, 0));
        cell.0 += value;
        cell.1 += 1;
    }

    if cells.is_empty() {
        return Ok(None);
    }

    let month_days: Vec<&str> = cells.keys().map(String::as_str).collect();
    let mut columns = vec![Column::new(MONTH_DAY_COLUMN.into(), month_days)];
    for year in &years {
        let values: Vec<Option<f64>> = cells
            .values()
            .map(|by_year| {
                by_year
                    .get(year)
                    .map(|(sum, count)| sum / f64::from(*count))
            })
            .collect();
        columns.push(Column::new(year.as_str().into(), values));
    }

    let trend = DataFrame::new(columns)?;
    info!(
        "Built yearly trend for {region}: {} days across {} years",
        trend.height(),
        years.len()
    );
    Ok(Some(trend))
}

pub fn trend_file_name(region: &str) -> String {
    format!("aqi_yearly_comparison_{}.csv", region.to_lowercase())
}

/// Writes a trend table to `<dir>/aqi_yearly_comparison_<region>.csv`.
pub fn write_trend_csv(
    dir: &Path,
    region: &str,
    df: &mut DataFrame,
) -> Result<PathBuf, DatasetError> {
    std::fs::create_dir_all(dir).map_err(|e| DatasetError::DirCreation(dir.to_path_buf(), e))?;
    let path = dir.join(trend_file_name(region));
    let file = File::create(&path).map_err(|e| DatasetError::CsvWriteIo(path.clone(), e))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(df)
        .map_err(|e| DatasetError::CsvWritePolars(path.clone(), e))?;
    info!("Saved {} to {}", region, path.display());
    Ok(path)
}
