//! Decoders for the three coexisting upload formats.
//!
//! Which decoder runs is fixed by the TCP port that accepted the
//! connection, never by sniffing the payload; v1 and v2 share the
//! same delimiter characters and cannot be told apart reliably.

pub mod v1;
pub mod v2;
pub mod v3;

use crate::error::{AppError, Result};

fn parse_f64(value: &str, field: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::Malformed(format!("invalid {}: {:?}", field, value)))
}

fn parse_i64(value: &str, field: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::Malformed(format!("invalid {}: {:?}", field, value)))
}
