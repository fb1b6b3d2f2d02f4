//! Turns the endpoint's per-region JSON objects into rows with a fixed schema.
//!
//! Only the fields listed in [`COLUMN_MAPPING`] are kept; anything else the
//! endpoint adds is ignored. Numeric fields tolerate being sent as strings, and
//! a value of the wrong shape becomes null rather than failing the day.

use crate::calendar::jalali_date::JalaliDate;
use chrono::{DateTime, SecondsFormat, Utc};
use polars::prelude::*;
use serde_json::Value;

/// Source field name to output column name.
pub const COLUMN_MAPPING: [(&str, &str); 20] = [
    ("Id", "id"),
    ("StateId", "state_id"),
    ("RegionId", "region_id"),
    ("CO", "co"),
    ("O3", "o3"),
    ("NO2", "no2"),
    ("SO2", "so2"),
    ("PM10", "pm10"),
    ("PM2_5", "pm2_5"),
    ("AQI", "aqi"),
    ("Pollutant", "main_pollutant"),
    ("StateName_Fa", "state_name_fa"),
    ("StateName_En", "state_name_en"),
    ("Region_Fa", "region_name_fa"),
    ("Region_En", "region_name_en"),
    ("RegionLatitude", "region_latitude"),
    ("RegionLongitude", "region_longitude"),
    ("CreateDate", "create_date"),
    ("ModifyDate", "modify_date"),
    ("Date", "date"),
];

/// Column holding the day that was asked for, as opposed to the server's `date`.
pub const REQUESTED_DATE_COLUMN: &str = "jalali_date";

/// Output columns in file order.
pub fn output_columns() -> impl Iterator<Item = &'static str> {
    COLUMN_MAPPING
        .iter()
        .map(|(_, column)| *column)
        .chain(std::iter::once(REQUESTED_DATE_COLUMN))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AqiRecord {
    pub id: Option<i64>,
    pub state_id: Option<i64>,
    pub region_id: Option<i64>,
    pub co: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub pm10: Option<f64>,
    pub pm2_5: Option<f64>,
    pub aqi: Option<f64>,
    pub main_pollutant: Option<String>,
    pub state_name_fa: Option<String>,
    pub state_name_en: Option<String>,
    pub region_name_fa: Option<String>,
    pub region_name_en: Option<String>,
    pub region_latitude: Option<f64>,
    pub region_longitude: Option<f64>,
    pub create_date: Option<DateTime<Utc>>,
    pub modify_date: Option<DateTime<Utc>>,
    pub date: Option<DateTime<Utc>>,
    pub jalali_date: String,
}

impl AqiRecord {
    pub fn from_raw(raw: &Value, requested: JalaliDate) -> Self {
        Self {
            id: int_field(raw, "Id"),
            state_id: int_field(raw, "StateId"),
            region_id: int_field(raw, "RegionId"),
            co: float_field(raw, "CO"),
            o3: float_field(raw, "O3"),
            no2: float_field(raw, "NO2"),
            so2: float_field(raw, "SO2"),
            pm10: float_field(raw, "PM10"),
            pm2_5: float_field(raw, "PM2_5"),
            aqi: float_field(raw, "AQI"),
            main_pollutant: text_field(raw, "Pollutant"),
            state_name_fa: text_field(raw, "StateName_Fa"),
            state_name_en: text_field(raw, "StateName_En"),
            region_name_fa: text_field(raw, "Region_Fa"),
            region_name_en: text_field(raw, "Region_En"),
            region_latitude: float_field(raw, "RegionLatitude"),
            region_longitude: float_field(raw, "RegionLongitude"),
            create_date: text_field(raw, "CreateDate").and_then(|s| decode_ms_date(&s)),
            modify_date: text_field(raw, "ModifyDate").and_then(|s| decode_ms_date(&s)),
            date: text_field(raw, "Date").and_then(|s| decode_ms_date(&s)),
            jalali_date: requested.to_string(),
        }
    }
}

/// Normalizes one day's `Data` array, one record per element.
pub fn normalize(raw: &[Value], requested: JalaliDate) -> Vec<AqiRecord> {
    raw.iter()
        .map(|value| AqiRecord::from_raw(value, requested))
        .collect()
}

/// Decodes the `/Date(<millis>)/` wrapper used by the endpoint.
///
/// The marker may be surrounded by other text; anything that does not contain
/// it (or carries a timezone suffix inside the parentheses) decodes to `None`.
pub fn decode_ms_date(raw: &str) -> Option<DateTime<Utc>> {
    const PREFIX: &str = "/Date(";
    const SUFFIX: &str = ")/";

    raw.match_indices(PREFIX).find_map(|(start, _)| {
        let rest = &raw[start + PREFIX.len()..];
        let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits_len == 0 || !rest[digits_len..].starts_with(SUFFIX) {
            return None;
        }
        let millis: i64 = rest[..digits_len].parse().ok()?;
        DateTime::from_timestamp_millis(millis)
    })
}

// 2^63 itself is not representable, hence the exclusive upper bound.
const I64_LOWER: f64 = i64::MIN as f64;
const I64_UPPER: f64 = i64::MAX as f64;

fn int_field(raw: &Value, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_field(raw: &Value, key: &str) -> Option<f64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `2023-04-01T00:00:00+00:00`, or `2023-04-01T00:00:00.123000+00:00` when
/// there is a fraction: seconds only for whole seconds, microseconds otherwise.
fn iso(instant: Option<DateTime<Utc>>) -> Option<String> {
    instant.map(|t| {
        let format = if t.timestamp_subsec_micros() == 0 {
            SecondsFormat::Secs
        } else {
            SecondsFormat::Micros
        };
        t.to_rfc3339_opts(format, false)
    })
}

/// Lays the records out column by column in [`output_columns`] order.
///
/// Column types do not depend on the content, so every day's file carries the
/// same schema even when a column is entirely null.
pub fn records_to_frame(records: &[AqiRecord]) -> PolarsResult<DataFrame> {
    macro_rules! column {
        ($name:literal, $map:expr) => {
            Column::new($name.into(), records.iter().map($map).collect::<Vec<_>>())
        };
    }

    DataFrame::new(vec![
        column!("id", |r| r.id),
        column!("state_id", |r| r.state_id),
        column!("region_id", |r| r.region_id),
        column!("co", |r| r.co),
        column!("o3", |r| r.o3),
        column!("no2", |r| r.no2),
        column!("so2", |r| r.so2),
        column!("pm10", |r| r.pm10),
        column!("pm2_5", |r| r.pm2_5),
        column!("aqi", |r| r.aqi),
        column!("main_pollutant", |r| r.main_pollutant.clone()),
        column!("state_name_fa", |r| r.state_name_fa.clone()),
        column!("state_name_en", |r| r.state_name_en.clone()),
        column!("region_name_fa", |r| r.region_name_fa.clone()),
        column!("region_name_en", |r| r.region_name_en.clone()),
        column!("region_latitude", |r| r.region_latitude),
        column!("region_longitude", |r| r.region_longitude),
        column!("create_date", |r| iso(r.create_date)),
        column!("modify_date", |r| iso(r.modify_date)),
        column!("date", |r| iso(r.date)),
        column!("jalali_date", |r| r.jalali_date.clone()),
    ])
}
