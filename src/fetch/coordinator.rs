//! Fans a date range out to per-day fetches behind one shared concurrency gate.

use crate::calendar::date_range::DateRange;
use crate::fetch::day_fetcher::{DayFetcher, DayOutcome};
use crate::fetch::job::{FetchJob, DEFAULT_REGION_TYPE, DEFAULT_REQUEST_TIME};
use crate::fetch::transport::AqiTransport;
use bon::bon;
use futures_util::future::join_all;
use log::{error, info, warn};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Per-outcome day counts of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FetchSummary {
    fn record(&mut self, outcome: &DayOutcome) {
        match outcome {
            DayOutcome::Saved { .. } => self.saved += 1,
            DayOutcome::Skipped(_) => self.skipped += 1,
            DayOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.saved + self.skipped + self.failed
    }
}

impl Display for FetchSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "saved={} skipped={} failed={}",
            self.saved, self.skipped, self.failed
        )
    }
}

pub struct FetchCoordinator<T> {
    fetcher: Arc<DayFetcher<T>>,
    max_concurrent: usize,
    request_time: String,
    region_type: u32,
}

#[bon]
impl<T: AqiTransport + 'static> FetchCoordinator<T> {
    /// # Arguments
    ///
    /// * `.fetcher(DayFetcher<T>)`: **Required.** Does the work for each day.
    /// * `.max_concurrent(usize)`: Optional. Requests allowed in flight at once. Defaults to `10`; `0` is treated as `1`.
    /// * `.request_time(&str)`: Optional. `HH:MM` sent with every day. Defaults to `"11:00"`.
    /// * `.region_type(u32)`: Optional. Region granularity requested. Defaults to `1`.
    #[builder]
    pub fn new(
        fetcher: DayFetcher<T>,
        max_concurrent: Option<usize>,
        #[builder(into)] request_time: Option<String>,
        region_type: Option<u32>,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            max_concurrent: max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT).max(1),
            request_time: request_time.unwrap_or_else(|| DEFAULT_REQUEST_TIME.to_string()),
            region_type: region_type.unwrap_or(DEFAULT_REGION_TYPE),
        }
    }

    pub fn fetcher(&self) -> &DayFetcher<T> {
        &self.fetcher
    }

    /// Fetches every day of `range` and waits for all of them.
    pub async fn run(&self, range: &DateRange) -> FetchSummary {
        self.run_until(range, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but once `shutdown` resolves the gate is
    /// closed: days still waiting for a permit end as cancelled failures while
    /// requests already in flight are allowed to finish.
    pub async fn run_until<S>(&self, range: &DateRange, shutdown: S) -> FetchSummary
    where
        S: Future<Output = ()>,
    {
        info!(
            "Fetching {} days from {} to {} into {} with at most {} concurrent requests",
            range.len(),
            range.start(),
            range.end(),
            self.fetcher.output_dir().display(),
            self.max_concurrent
        );
        let gate = Arc::new(Semaphore::new(self.max_concurrent));

        // Every day gets its task up front; the gate, not the spawn, bounds the requests.
        let handles: Vec<_> = range
            .days()
            .into_iter()
            .map(|date| {
                let job = FetchJob::builder()
                    .date(date)
                    .time(self.request_time.clone())
                    .region_type(self.region_type)
                    .build();
                let fetcher = Arc::clone(&self.fetcher);
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { fetcher.fetch_day(&job, &gate).await })
            })
            .collect();

        let all = join_all(handles);
        tokio::pin!(all);
        tokio::pin!(shutdown);
        let results = tokio::select! {
            results = &mut all => results,
            () = &mut shutdown => {
                warn!("Shutdown requested; no further requests will be started");
                gate.close();
                all.await
            }
        };

        let mut summary = FetchSummary::default();
        for result in results {
            match result {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    error!("Day task did not complete: {e}");
                    summary.failed += 1;
                }
            }
        }
        info!("Fetch finished ({range}): {summary}");
        summary
    }
}
