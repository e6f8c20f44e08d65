// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Sensor module - simulated readings and their wire shape

mod generator;

pub use generator::{generate, round2};

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// One simulated measurement, serialized as the published message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "sensor_name")]
    pub sensor_type: String,
    pub sensor_id: String,
    pub location: String,
    pub value: f64,
    pub unit: String,
    /// Epoch milliseconds at generation time
    pub timestamp: i64,
}

impl Reading {
    /// Topic `/{domain}/{location}/{sensor_type}/{sensor_id}`.
    ///
    /// Segments are not escaped; names containing `/` will split downstream.
    pub fn topic(&self, domain: &str) -> String {
        format!(
            "/{}/{}/{}/{}",
            domain, self.location, self.sensor_type, self.sensor_id
        )
    }
}

/// Generate one reading per (location, sensor type, id), locations outermost
pub fn simulate_cycle<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> Vec<Reading> {
    let mut readings = Vec::with_capacity(config.readings_per_cycle());

    for location in &config.topology.locations {
        for (sensor_type, params) in &config.sensor_types {
            let unit = config.unit(sensor_type);
            for sensor_id in &params.ids {
                readings.push(Reading {
                    sensor_type: sensor_type.clone(),
                    sensor_id: sensor_id.clone(),
                    location: location.clone(),
                    value: generate(params, rng),
                    unit: unit.to_string(),
                    timestamp: Utc::now().timestamp_millis(),
                });
            }
        }
    }

    readings
}
