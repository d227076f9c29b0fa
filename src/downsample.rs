//! Time-bucketed averaging for chart queries ("dots").

use chrono::{DateTime, Duration, Utc};

use crate::models::Tick;

/// Average a range of ticks into `dots_per_day` buckets per day.
///
/// `dots_per_day == 0` means no downsampling; the input comes back
/// unchanged. Otherwise the caller must have validated `dots_per_day`
/// to `1..=24` and `start < end`. Bucket width is `24 / dots_per_day`
/// hours using integer division, so counts that do not divide 24
/// truncate (5 dots gives 4-hour buckets) rather than round.
///
/// Buckets are half-open `[bucket_start, bucket_end)`; a tick sitting
/// exactly on a boundary belongs to the later bucket and is never
/// counted twice. A bucket with no samples yields an all-zero record
/// stamped with the bucket start, so charts keep their x axis; callers
/// cannot tell it from a genuine all-zero reading.
pub fn downsample(
    ticks: &[Tick],
    dots_per_day: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Tick> {
    if dots_per_day == 0 {
        return ticks.to_vec();
    }

    let hours = 24 / dots_per_day;
    let step = Duration::hours(hours);

    let mut result = Vec::new();
    let mut bucket_start = start;
    while bucket_start < end {
        let bucket_end = bucket_start + step;
        result.push(average_bucket(ticks, bucket_start, bucket_end));
        bucket_start = bucket_end;
    }
    result
}

fn average_bucket(ticks: &[Tick], start: DateTime<Utc>, end: DateTime<Utc>) -> Tick {
    let mut matching: i64 = 0;
    let mut battery_voltage = 0.0;
    let mut temperature = 0.0;
    let mut humidity: i64 = 0;
    let mut radio_quality: i64 = 0;

    for tick in ticks {
        if tick.datetime < start || tick.datetime >= end {
            continue;
        }
        battery_voltage += tick.battery_voltage;
        temperature += tick.temperature;
        humidity += tick.humidity;
        radio_quality += tick.radio_quality;
        matching += 1;
    }

    let mut dot = Tick::zero_at(start);
    if matching > 0 {
        dot.battery_voltage = battery_voltage / matching as f64;
        dot.temperature = temperature / matching as f64;
        dot.humidity = humidity / matching;
        dot.radio_quality = radio_quality / matching;
    }
    dot
}
