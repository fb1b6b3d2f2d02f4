//! Derived columns used by reporting: cleaned pollutant names, per-pollutant
//! indicators, a fuel-oil heuristic and the AQI category.

use polars::prelude::*;

/// Canonical pollutant name and its indicator column.
pub const POLLUTANT_INDICATORS: [(&str, &str); 6] = [
    ("PM2.5", "has_pm2_5"),
    ("PM10", "has_pm10"),
    ("SO2", "has_so2"),
    ("NO2", "has_no2"),
    ("O3", "has_o3"),
    ("CO", "has_co"),
];

/// Upper bound (inclusive) and label of each AQI category; the first starts at 0.
pub const AQI_LEVELS: [(f64, &str); 6] = [
    (50.0, "Good"),
    (100.0, "Moderate"),
    (150.0, "Unhealthy for Sensitive"),
    (200.0, "Unhealthy"),
    (300.0, "Very Unhealthy"),
    (500.0, "Hazardous"),
];

const SO2_FUEL_OIL_THRESHOLD: f64 = 75.0;
const PM2_5_FUEL_OIL_THRESHOLD: f64 = 100.0;

pub fn clean_pollutant_name(raw: Option<&str>) -> String {
    match raw.map(str::trim).unwrap_or_default() {
        "PM 2.5" => "PM2.5".to_string(),
        "PM 10" => "PM10".to_string(),
        other => other.to_string(),
    }
}

pub fn aqi_level(aqi: Option<f64>) -> Option<&'static str> {
    let aqi = aqi?;
    if !(0.0..=AQI_LEVELS[AQI_LEVELS.len() - 1].0).contains(&aqi) {
        return None;
    }
    AQI_LEVELS
        .iter()
        .find(|(upper, _)| aqi <= *upper)
        .map(|(_, label)| *label)
}

fn float_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Adds the derived columns to a frame with the stored day-file schema.
pub fn derive_features(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let pollutants: Vec<String> = df
        .column("main_pollutant")?
        .str()?
        .into_iter()
        .map(clean_pollutant_name)
        .collect();

    for (pollutant, indicator) in POLLUTANT_INDICATORS {
        let flags: Vec<bool> = pollutants.iter().map(|p| p == pollutant).collect();
        df.with_column(Column::new(indicator.into(), flags))?;
    }

    let so2 = float_values(&df, "so2")?;
    let pm2_5 = float_values(&df, "pm2_5")?;
    let fuel_oil: Vec<bool> = pollutants
        .iter()
        .zip(so2.iter().zip(&pm2_5))
        .map(|(pollutant, (so2, pm2_5))| {
            let so2_high = so2.is_some_and(|v| v > SO2_FUEL_OIL_THRESHOLD);
            let pm2_5_high = pm2_5.is_some_and(|v| v > PM2_5_FUEL_OIL_THRESHOLD);
            (so2_high && pollutant == "SO2") || (pm2_5_high && pollutant == "PM2.5")
        })
        .collect();
    df.with_column(Column::new("possible_fuel_oil_usage".into(), fuel_oil))?;

    let levels: Vec<Option<&str>> = float_values(&df, "aqi")?
        .into_iter()
        .map(aqi_level)
        .collect();
    df.with_column(Column::new("aqi_level".into(), levels))?;

    df.with_column(Column::new("main_pollutant".into(), pollutants))?;
    Ok(df)
}
