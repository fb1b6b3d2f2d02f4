//! Runtime settings, read from the environment (and an optional `.env`).

use crate::calendar::date_range::DateRange;
use crate::calendar::jalali_date::JalaliDate;
use crate::fetch::coordinator::DEFAULT_MAX_CONCURRENT;
use crate::fetch::job::{DEFAULT_REGION_TYPE, DEFAULT_REQUEST_TIME};
use bon::Builder;
use chrono::NaiveTime;
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://aqms.doe.ir/Home/GetAQIDataByRegion/";
pub const DEFAULT_OUTPUT_DIR: &str = "data/aqi";
pub const DEFAULT_PLOTS_DIR: &str = "plots";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_START_DATE: JalaliDate = JalaliDate::from_ymd_unchecked(1402, 1, 1);
const DEFAULT_END_DATE: JalaliDate = JalaliDate::from_ymd_unchecked(1402, 12, 29);

/// Cookie name and the variable its value is read from.
const COOKIE_VARS: [(&str, &str); 4] = [
    ("_ga", "COOKIES_GA"),
    ("_gid", "COOKIES_GID"),
    ("ASP.NET_SessionId", "COOKIES_SESSIONID"),
    ("_gat", "COOKIES_GAT"),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid fetch range")]
    Range(#[from] crate::calendar::error::CalendarError),
}

/// Headers the endpoint expects from its own web page.
pub fn default_headers() -> Vec<(String, String)> {
    [
        ("Accept", "application/json, text/javascript, */*; q=0.01"),
        (
            "Content-Type",
            "application/x-www-form-urlencoded; charset=UTF-8",
        ),
        ("Origin", "https://aqms.doe.ir"),
        ("Referer", "https://aqms.doe.ir/Home/AQI"),
        ("User-Agent", "Mozilla/5.0"),
        ("X-Requested-With", "XMLHttpRequest"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}

#[derive(Debug, Clone, Builder)]
pub struct AppConfig {
    #[builder(default = DEFAULT_START_DATE)]
    pub start_date: JalaliDate,
    #[builder(default = DEFAULT_END_DATE)]
    pub end_date: JalaliDate,
    #[builder(default = DEFAULT_MAX_CONCURRENT)]
    pub max_concurrent: usize,
    /// Root of the partitioned parquet store.
    #[builder(default = PathBuf::from(DEFAULT_OUTPUT_DIR), into)]
    pub output_dir: PathBuf,
    /// Where processing reads from; the output directory when unset.
    #[builder(into)]
    pub input_dir: Option<PathBuf>,
    #[builder(default = PathBuf::from(DEFAULT_PLOTS_DIR), into)]
    pub plots_dir: PathBuf,
    #[builder(default = vec!["Tehran".to_string()])]
    pub plot_regions: Vec<String>,
    #[builder(default = DEFAULT_BASE_URL.to_string(), into)]
    pub base_url: String,
    #[builder(default = default_headers())]
    pub headers: Vec<(String, String)>,
    #[builder(default)]
    pub cookies: Vec<(String, String)>,
    #[builder(default = DEFAULT_REQUEST_TIME.to_string(), into)]
    pub request_time: String,
    #[builder(default = DEFAULT_REGION_TYPE)]
    pub region_type: u32,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Reads every recognized variable, falling back to defaults for unset or empty ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for values that do not parse and for an inverted date range.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cookies = COOKIE_VARS
            .iter()
            .map(|(name, var)| (name.to_string(), env::var(var).unwrap_or_default()))
            .collect();

        let config = Self::builder()
            .maybe_start_date(env_parse("START_DATE")?)
            .maybe_end_date(env_parse("END_DATE")?)
            .maybe_max_concurrent(env_parse("MAX_CONCURRENT")?)
            .maybe_output_dir(env_value("OUTPUT_DIR"))
            .maybe_input_dir(env_value("INPUT_DIR"))
            .maybe_plots_dir(env_value("PLOTS_DIR"))
            .maybe_plot_regions(env_value("PLOT_REGIONS").map(|v| split_list(&v)))
            .maybe_base_url(env_value("BASE_URL"))
            .maybe_request_time(env_value("REQUEST_TIME"))
            .maybe_region_type(env_parse("REGION_TYPE")?)
            .maybe_request_timeout(env_parse("REQUEST_TIMEOUT_SECS")?.map(Duration::from_secs))
            .cookies(cookies)
            .build();
        config.validate()?;
        Ok(config)
    }

    /// Checks the cross-field rules the builder cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                var: "MAX_CONCURRENT",
                value: "0".to_string(),
                reason: "at least one request must be allowed".to_string(),
            });
        }
        if NaiveTime::parse_from_str(&self.request_time, "%H:%M").is_err() {
            return Err(ConfigError::InvalidValue {
                var: "REQUEST_TIME",
                value: self.request_time.clone(),
                reason: "expected HH:MM".to_string(),
            });
        }
        self.date_range()?;
        Ok(())
    }

    pub fn date_range(&self) -> Result<DateRange, ConfigError> {
        Ok(DateRange::new(self.start_date, self.end_date)?)
    }

    pub fn dataset_dir(&self) -> &Path {
        self.input_dir.as_deref().unwrap_or(&self.output_dir)
    }
}

fn env_value(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    env_value(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    var,
                    value: value.clone(),
                    reason: e.to_string(),
                })
        })
        .transpose()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let config = AppConfig::builder().build();
        config.validate()?;

        assert_eq!(config.start_date.to_string(), "1402/01/01");
        assert_eq!(config.end_date.to_string(), "1402/12/29");
        assert_eq!(config.date_range()?.len(), 365);
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.request_time, "11:00");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.dataset_dir(), Path::new(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.headers.len(), 6);
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = AppConfig::builder().max_concurrent(0).build();
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidValue { var: "MAX_CONCURRENT", .. })
        ));

        let bad_time = AppConfig::builder().request_time("11h").build();
        assert!(matches!(
            bad_time.validate(),
            Err(ConfigError::InvalidValue { var: "REQUEST_TIME", .. })
        ));

        let inverted = AppConfig::builder()
            .start_date("1402/05/01".parse().unwrap())
            .end_date("1402/04/01".parse().unwrap())
            .build();
        assert!(matches!(inverted.validate(), Err(ConfigError::Range(_))));
    }

    #[test]
    fn test_input_dir_overrides_output_dir() {
        let config = AppConfig::builder()
            .output_dir("out")
            .input_dir("archive")
            .build();
        assert_eq!(config.dataset_dir(), Path::new("archive"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("Tehran, Isfahan,,Mashhad "), vec!["Tehran", "Isfahan", "Mashhad"]);
        assert!(split_list(" , ").is_empty());
    }
}
