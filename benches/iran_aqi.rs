use criterion::{black_box, criterion_group, criterion_main, Criterion};
use iran_aqi::{expand, normalize, records_to_frame, JalaliDate};
use serde_json::{json, Value};

fn response_rows(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "Id": i, "StateId": i / 4, "RegionId": i, "AQI": 40 + i % 200,
                "PM2_5": 35.5, "SO2": "12.1", "Pollutant": "PM 2.5",
                "Region_En": format!("Region {i}"), "Region_Fa": "منطقه",
                "RegionLatitude": 35.7, "RegionLongitude": 51.4,
                "CreateDate": "/Date(1680307200000)/", "Date": "/Date(1680334200000)/"
            })
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    c.bench_function("expand_year", |b| {
        b.iter(|| expand(black_box("1402/01/01"), black_box("1402/12/29")))
    });

    let rows = response_rows(250);
    let day = JalaliDate::new(1402, 1, 1).unwrap();
    c.bench_function("normalize_day", |b| b.iter(|| normalize(black_box(&rows), day)));
    c.bench_function("normalize_to_frame", |b| {
        b.iter(|| records_to_frame(&normalize(black_box(&rows), day)))
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
