use crate::dataset::error::DatasetError;
use crate::fetch::output_path::OUTPUT_EXTENSION;
use log::{info, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tokio::task;
use walkdir::WalkDir;

/// Loads every day file under `dir` into one frame.
///
/// Returns `None` when the directory holds no parquet files (or does not exist).
pub async fn load_dataset(dir: &Path) -> Result<Option<DataFrame>, DatasetError> {
    let dir = dir.to_path_buf();
    task::spawn_blocking(move || {
        info!("Loading data from {}", dir.display());
        let files = find_parquet_files(&dir)?;
        if files.is_empty() {
            warn!("No parquet files found in {}", dir.display());
            return Ok(None);
        }

        let frames = files
            .iter()
            .map(|path| {
                LazyFrame::scan_parquet(path, Default::default())
                    .map_err(|e| DatasetError::ParquetScan(path.clone(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let df = concat(frames, UnionArgs::default())?.collect()?;

        info!("Loaded {} records from {} files", df.height(), files.len());
        Ok(Some(df))
    })
    .await?
}

/// All `*.parquet` files below `dir`, sorted by path. A missing `dir` has none.
pub fn find_parquet_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| DatasetError::DirWalk(dir.to_path_buf(), e))?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext == OUTPUT_EXTENSION)
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::jalali_date::JalaliDate;
    use crate::fetch::normalizer::{normalize, records_to_frame};
    use crate::fetch::output_path::ensure_output_path;
    use serde_json::json;
    use tempfile::TempDir;

    async fn write_day(base: &Path, day: &str, aqi: &[i64]) -> Result<(), Box<dyn std::error::Error>> {
        let raw: Vec<_> = aqi
            .iter()
            .map(|value| json!({"Region_En": "Tehran", "AQI": value}))
            .collect();
        let date: JalaliDate = day.parse()?;
        let mut df = records_to_frame(&normalize(&raw, date))?;
        let path = ensure_output_path(base, date).await?;
        let file = std::fs::File::create(path)?;
        ParquetWriter::new(file).finish(&mut df)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_load_combines_all_partitions() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        write_day(dir.path(), "1402/01/01", &[10, 20]).await?;
        write_day(dir.path(), "1402/02/15", &[30]).await?;
        write_day(dir.path(), "1403/01/01", &[40]).await?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let files = find_parquet_files(dir.path())?;
        assert_eq!(files.len(), 3);

        let df = load_dataset(dir.path()).await?.expect("data present");
        assert_eq!(df.height(), 4);
        let mut aqi: Vec<f64> = df.column("aqi")?.f64()?.into_no_null_iter().collect();
        aqi.sort_by(f64::total_cmp);
        assert_eq!(aqi, vec![10.0, 20.0, 30.0, 40.0]);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_parquet_files_only_lists_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        write_day(dir.path(), "1403/01/01", &[5]).await?;
        write_day(dir.path(), "1402/12/29", &[6]).await?;
        std::fs::create_dir_all(dir.path().join("year=1402").join("stray.parquet"))?;
        std::fs::write(dir.path().join("year=1402").join(".tmpAbC123"), "partial")?;

        let names: Vec<String> = find_parquet_files(dir.path())?
            .iter()
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["aqi_1402_12_29.parquet", "aqi_1403_01_01.parquet"]);
        assert!(find_parquet_files(&dir.path().join("missing"))?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_load_empty_or_missing_dir() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        assert!(load_dataset(dir.path()).await?.is_none());
        assert!(load_dataset(&dir.path().join("missing")).await?.is_none());
        Ok(())
    }
}
