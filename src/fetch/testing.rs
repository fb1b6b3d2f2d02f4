use crate::fetch::error::FetchError;
use crate::fetch::transport::AqiTransport;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Reply = Result<String, StatusCode>;

/// Transport answering from a per-day script; the last reply of a script repeats.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub(crate) fn script(self, day: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(day.to_string(), replies.into_iter().collect());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, day: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(day) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Ok(region_body(day))),
            None => Ok(region_body(day)),
        }
    }
}

#[async_trait]
impl AqiTransport for ScriptedTransport {
    async fn post_form(&self, form: &[(&'static str, String)]) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let day = form[0].1.split(' ').next().unwrap_or_default().to_string();
        self.next_reply(&day).map_err(|status| FetchError::HttpStatus {
            url: "scripted".to_string(),
            status,
        })
    }
}

/// A successful body with two regions.
pub(crate) fn region_body(day: &str) -> String {
    json!({
        "Data": [
            {"Id": 1, "Region_En": "Tehran", "AQI": 120, "Pollutant": "PM2.5",
             "CreateDate": "/Date(1680307200000)/", "Note": day},
            {"Id": 2, "Region_En": "Isfahan", "AQI": 80, "Pollutant": "O3",
             "CreateDate": "bogus"}
        ]
    })
    .to_string()
}

pub(crate) fn empty_body() -> String {
    json!({ "Data": [] }).to_string()
}
