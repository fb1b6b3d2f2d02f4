//! One calendar day: resume check, request, validation, normalization and write.

use crate::calendar::jalali_date::JalaliDate;
use crate::fetch::error::FetchError;
use crate::fetch::job::FetchJob;
use crate::fetch::normalizer::{normalize, records_to_frame};
use crate::fetch::output_path::ensure_output_path;
use crate::fetch::retry::RetryPolicy;
use crate::fetch::transport::AqiTransport;
use log::{debug, error, info, warn};
use polars::prelude::*;
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Semaphore;
use tokio::{fs, task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The day's file is already on disk.
    Exists,
    /// The endpoint answered, but without a non-empty `Data` array.
    NoData,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Exists => write!(f, "exists"),
            SkipReason::NoData => write!(f, "no-data"),
        }
    }
}

/// Terminal result of one day's work. Failures stay local to the day.
#[derive(Debug)]
pub enum DayOutcome {
    Saved { rows: usize, path: PathBuf },
    Skipped(SkipReason),
    Failed(FetchError),
}

pub struct DayFetcher<T> {
    transport: T,
    output_dir: PathBuf,
    retry: RetryPolicy,
}

impl<T: AqiTransport> DayFetcher<T> {
    pub fn new(transport: T, output_dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            output_dir: output_dir.into(),
            retry,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs the job to a terminal outcome and logs it.
    ///
    /// A permit from `gate` is held only while the (retried) request is in
    /// flight. If the gate has been closed the day fails with
    /// [`FetchError::Cancelled`] without touching the network.
    pub async fn fetch_day(&self, job: &FetchJob, gate: &Semaphore) -> DayOutcome {
        let outcome = self
            .try_fetch_day(job, gate)
            .await
            .unwrap_or_else(DayOutcome::Failed);
        log_outcome(job.date, &outcome);
        outcome
    }

    async fn try_fetch_day(&self, job: &FetchJob, gate: &Semaphore) -> Result<DayOutcome, FetchError> {
        let path = ensure_output_path(&self.output_dir, job.date).await?;
        if fs::metadata(&path).await.is_ok() {
            return Ok(DayOutcome::Skipped(SkipReason::Exists));
        }

        let body = {
            let _permit = gate.acquire().await.map_err(|_| FetchError::Cancelled)?;
            debug!("day={} fetching", job.date);
            let form = job.form();
            let label = format!("day={}", job.date);
            self.retry
                .run(
                    &label,
                    || self.transport.post_form(&form),
                    FetchError::is_retryable,
                )
                .await?
        };

        let Some(rows) = extract_data(&body) else {
            return Ok(DayOutcome::Skipped(SkipReason::NoData));
        };

        let records = normalize(&rows, job.date);
        let frame = records_to_frame(&records).map_err(|source| FetchError::FrameBuild {
            day: job.date,
            source,
        })?;

        if write_parquet_atomic(frame, &path).await? {
            Ok(DayOutcome::Saved {
                rows: records.len(),
                path,
            })
        } else {
            Ok(DayOutcome::Skipped(SkipReason::Exists))
        }
    }
}

/// The non-empty `Data` array of a response body, if there is one.
///
/// Bodies that are not JSON, not an object, or lack `Data` all mean "no
/// measurement for this day".
pub fn extract_data(body: &str) -> Option<Vec<Value>> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!("Response body is not JSON: {e}");
            return None;
        }
    };
    match value {
        Value::Object(mut map) => match map.remove("Data") {
            Some(Value::Array(rows)) if !rows.is_empty() => Some(rows),
            _ => None,
        },
        _ => None,
    }
}

/// Writes `df` next to `path` and renames it into place without replacing an
/// existing file. Returns `false` when `path` appeared in the meantime, in
/// which case nothing is written.
async fn write_parquet_atomic(mut df: DataFrame, path: &Path) -> Result<bool, FetchError> {
    let path_buf = path.to_path_buf();
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    task::spawn_blocking(move || {
        let mut temp = NamedTempFile::new_in(&dir)
            .map_err(|e| FetchError::ParquetWriteIo(path_buf.clone(), e))?;
        ParquetWriter::new(temp.as_file_mut())
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df)
            .map_err(|e| FetchError::ParquetWritePolars(path_buf.clone(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| FetchError::ParquetWriteIo(path_buf.clone(), e))?;

        match temp.persist_noclobber(&path_buf) {
            Ok(_) => Ok(true),
            // The temp file is removed when the returned handle drops.
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(FetchError::ParquetWriteIo(path_buf, e.error)),
        }
    })
    .await?
}

fn log_outcome(day: JalaliDate, outcome: &DayOutcome) {
    match outcome {
        DayOutcome::Saved { rows, path } => {
            info!("day={day} outcome=saved rows={rows} path={}", path.display());
        }
        DayOutcome::Skipped(reason @ SkipReason::Exists) => {
            info!("day={day} outcome=skipped reason={reason}");
        }
        DayOutcome::Skipped(reason @ SkipReason::NoData) => {
            warn!("day={day} outcome=skipped reason={reason}");
        }
        DayOutcome::Failed(e) => {
            error!("day={day} outcome=failed error={}", error_chain(e));
        }
    }
}

fn error_chain(e: &dyn Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
