// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! greenhouse-sim - synthetic greenhouse telemetry over MQTT
//!
//! Simulates a fleet of environmental sensors and publishes bounded-random
//! readings to an MQTT broker at a jittered cadence. Locations and sensor
//! ranges come from a YAML file that is hot-reloaded whenever it changes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     SimulationLoop                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌────────────┐   ┌────────────────┐   │
//! │  │ ConfigStore │ → │ generate() │ → │   Publisher    │   │
//! │  │ (hot-reload)│   │  Reading   │   │ (state machine)│   │
//! │  └─────────────┘   └────────────┘   └────────────────┘   │
//! │                                             ↓            │
//! │                                     ┌────────────────┐   │
//! │                                     │ MqttTransport  │   │
//! │                                     │   (rumqttc)    │   │
//! │                                     └────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Topics are `/{domain}/{location}/{sensor_type}/{sensor_id}`. Names must not
//! contain `/`; this is not validated.

pub mod config;
pub mod core;
pub mod sensors;
pub mod streaming;

// Re-exports for convenience
pub use config::{Config, ConfigError, ConfigStore, Settings};
pub use crate::core::{CycleReport, SimulationLoop};
pub use sensors::Reading;
pub use streaming::{ConnectionState, MqttTransport, Publisher};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
