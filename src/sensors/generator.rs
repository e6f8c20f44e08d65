// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Bounded random values for simulated sensors

use rand::Rng;

use crate::config::SensorTypeParams;

/// Slack for float noise when comparing against the configured bounds
const BOUND_EPSILON: f64 = 1e-9;

/// Draw a value uniformly from `[base - fluctuation, base + fluctuation]`.
///
/// The result is rounded to two decimals, half away from zero, and kept inside
/// the interval. With zero fluctuation the (rounded) base is returned.
pub fn generate<R: Rng + ?Sized>(params: &SensorTypeParams, rng: &mut R) -> f64 {
    if params.fluctuation <= 0.0 {
        return round2(params.base);
    }

    let low = params.base - params.fluctuation;
    let high = params.base + params.fluctuation;
    let value = round2(rng.gen_range(low..=high));

    if value < low - BOUND_EPSILON {
        (low * 100.0).ceil() / 100.0
    } else if value > high + BOUND_EPSILON {
        (high * 100.0).floor() / 100.0
    } else {
        value
    }
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
