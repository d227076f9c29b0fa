//! Unit conversions for raw sensor readings.
//!
//! Three field generations encode temperature differently and all are
//! still in service, so every formula is kept and selected by the
//! format version of the reading.

use md5::{Digest, Md5};

use crate::models::{FormatVersion, Tick};

/// Decode the first-generation 16-bit packed temperature.
///
/// The magnitude is a sum of selected bit weights, not a plain
/// fixed-point fraction: bit 7 adds 0.5, bits 8..=14 add 1, 2, 4, 8,
/// 16, 32 and 64 degrees, bit 15 flips the sign. Bits 0..=6 are unused.
pub fn decode_temperature(raw: u16) -> f64 {
    const WEIGHTS: [(u8, f64); 8] = [
        (7, 0.5),
        (8, 1.0),
        (9, 2.0),
        (10, 4.0),
        (11, 8.0),
        (12, 16.0),
        (13, 32.0),
        (14, 64.0),
    ];

    let mut value = 0.0;
    for (bit, weight) in WEIGHTS {
        if raw & (1 << bit) != 0 {
            value += weight;
        }
    }
    if raw & (1 << 15) != 0 {
        value = -value;
    }
    value
}

/// Second-generation linear temperature conversion.
pub fn temperature_v2(raw: f64) -> f64 {
    (raw - 324.31) / 1.22
}

/// Third-generation linear temperature conversion, with an optional
/// per-sensor calibration offset added on top.
pub fn temperature_v3(raw: f64, calibration: Option<f64>) -> f64 {
    let t = ((raw * 0.001292) - 0.6) / 0.01;
    t + calibration.unwrap_or(0.0)
}

/// Convert a v2/v3 raw battery code to volts.
pub fn battery_volts(raw: f64) -> f64 {
    raw * 0.00384
}

/// First-generation payloads carry millivolts; display layers divide
/// down to volts.
pub fn millivolts_to_volts(mv: f64) -> f64 {
    mv / 1000.0
}

/// Replace a tick's raw fields with physical units.
///
/// Decoders leave `raw_temperature` and `battery_voltage` exactly as
/// received; this fills `temperature` (and rescales the battery for
/// v2/v3) according to the reading's generation. v1 batteries stay in
/// their native millivolts.
pub fn apply_conversion(tick: &mut Tick, version: FormatVersion, calibration: Option<f64>) {
    match version {
        FormatVersion::V1 => {
            tick.temperature = decode_temperature(tick.raw_temperature as u16);
        }
        FormatVersion::V2 => {
            tick.temperature = temperature_v2(tick.raw_temperature);
            tick.battery_voltage = battery_volts(tick.battery_voltage);
        }
        FormatVersion::V3 => {
            tick.temperature = temperature_v3(tick.raw_temperature, calibration);
            tick.battery_voltage = battery_volts(tick.battery_voltage);
        }
    }
}

/// Access token a coordinator must present: lower-case hex MD5 of
/// `OPEN<id>SENSOR<id>PLATFORM`. Recomputed on every save, never cached.
pub fn coordinator_token(coordinator_id: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!(
        "OPEN{id}SENSOR{id}PLATFORM",
        id = coordinator_id
    ));
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_packed_temperature_vectors() {
        assert_eq!(decode_temperature(5056), 19.5);
        assert_eq!(decode_temperature(2528), 9.5);
        assert_eq!(decode_temperature(2240), 8.5);
    }

    #[test]
    fn packed_temperature_sign_bit() {
        let positive = decode_temperature(5056);
        let negative = decode_temperature(5056 | 1 << 15);
        assert_eq!(negative, -positive);
    }

    #[test]
    fn packed_temperature_ignores_low_bits() {
        assert_eq!(decode_temperature(0b0000_0000_0111_1111), 0.0);
    }

    #[test]
    fn linear_v2_formula() {
        let t = temperature_v2(347.0);
        assert!((t - 18.598).abs() < 0.001, "got {}", t);
    }

    #[test]
    fn linear_v3_formula_with_calibration() {
        let base = temperature_v3(621.0, None);
        assert!((base - 20.2332).abs() < 0.001, "got {}", base);
        assert_eq!(temperature_v3(621.0, Some(1.5)), base + 1.5);
    }

    #[test]
    fn battery_conversions() {
        assert!((battery_volts(886.0) - 3.40224).abs() < 1e-9);
        assert_eq!(millivolts_to_volts(3158.0), 3.158);
    }

    #[test]
    fn conversion_dispatches_on_version() {
        let mut tick = Tick::zero_at(Utc::now());
        tick.raw_temperature = 5632.0;
        tick.battery_voltage = 3158.0;
        apply_conversion(&mut tick, FormatVersion::V1, None);
        assert_eq!(tick.temperature, decode_temperature(5632));
        // v1 keeps the native millivolt battery value
        assert_eq!(tick.battery_voltage, 3158.0);

        let mut tick = Tick::zero_at(Utc::now());
        tick.raw_temperature = 347.0;
        tick.battery_voltage = 886.0;
        apply_conversion(&mut tick, FormatVersion::V2, None);
        assert_eq!(tick.temperature, temperature_v2(347.0));
        assert_eq!(tick.battery_voltage, battery_volts(886.0));

        let mut tick = Tick::zero_at(Utc::now());
        tick.raw_temperature = 621.0;
        tick.battery_voltage = 797.0;
        apply_conversion(&mut tick, FormatVersion::V3, Some(0.25));
        assert_eq!(tick.temperature, temperature_v3(621.0, Some(0.25)));
        assert_eq!(tick.battery_voltage, battery_volts(797.0));
    }

    #[test]
    fn coordinator_token_is_deterministic_md5() {
        assert_eq!(coordinator_token("1"), "8c31564cac7b191adad84447afacfc38");
        assert_eq!(coordinator_token("13"), "d74c26137f5eeaa8a7ee22c2bbe9e8c9");
        assert_eq!(coordinator_token("1"), coordinator_token("1"));
        assert_ne!(coordinator_token("1"), coordinator_token("2"));
    }
}
