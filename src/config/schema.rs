// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Simulation file schema
//!
//! The canonical layout nests simulator settings under `simulator` and keeps
//! runtime sensor metadata (units) in a top-level `sensors` section:
//!
//! ```yaml
//! simulator:
//!   greenhouses: [north, south]
//!   sensors:
//!     temperature: { base: 22.0, fluctuation: 1.5, ids: ["1", "2"] }
//! sensors:
//!   temperature: { unit: "°C" }
//! ```
//!
//! The older flat layout (`greenhouses` and simulator `sensors` at top level) is
//! converted on load. Units for it come from an inline `unit` key or
//! [`DEFAULT_UNITS`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::SystemTime;
use tracing::warn;

use super::ConfigError;

/// Fallback units for the flat layout, which had no metadata section
pub const DEFAULT_UNITS: &[(&str, &str)] = &[
    ("temperature", "°C"),
    ("humidity", "%"),
    ("soil_moisture", "%"),
    ("co2", "ppm"),
    ("light", "lux"),
    ("ph", "pH"),
    ("ec", "mS/cm"),
    ("water_level", "cm"),
];

/// Simulation parameters for one sensor type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTypeParams {
    pub base: f64,
    pub fluctuation: f64,
    #[serde(default, deserialize_with = "labels")]
    pub ids: Vec<String>,
}

/// Runtime metadata for one sensor type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorMetadata {
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub locations: Vec<String>,
}

/// Immutable snapshot of the simulation file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub topology: Topology,
    pub sensor_types: BTreeMap<String, SensorTypeParams>,
    pub metadata: BTreeMap<String, SensorMetadata>,
    /// Modification time of the file this snapshot was read from
    pub loaded_at: Option<SystemTime>,
}

impl Config {
    /// Parse and validate a YAML document
    pub fn from_yaml(text: &str, loaded_at: Option<SystemTime>) -> Result<Self, ConfigError> {
        let root: serde_yaml::Value = if text.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(text)?
        };

        let mut config = if root.is_null() {
            Config::default()
        } else if is_flat_layout(&root) {
            warn!("Flat config layout is deprecated, move greenhouses and sensors under `simulator`");
            serde_yaml::from_value::<FlatDocument>(root)?.into_config()
        } else {
            serde_yaml::from_value::<Document>(root)?.into_config()
        };

        config.loaded_at = loaded_at;
        config.validate()?;
        Ok(config)
    }

    /// Unit for a sensor type, empty when no metadata exists
    pub fn unit(&self, sensor_type: &str) -> &str {
        self.metadata
            .get(sensor_type)
            .map(|m| m.unit.as_str())
            .unwrap_or("")
    }

    /// Number of readings one cycle produces
    pub fn readings_per_cycle(&self) -> usize {
        let per_location: usize = self.sensor_types.values().map(|p| p.ids.len()).sum();
        self.topology.locations.len() * per_location
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, params) in &self.sensor_types {
            if !params.base.is_finite() {
                return Err(ConfigError::Invalid(format!("sensor '{}' has a non-finite base", name)));
            }
            if !params.fluctuation.is_finite() || params.fluctuation < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "sensor '{}' has fluctuation {}, expected a finite value >= 0",
                    name, params.fluctuation
                )));
            }
            let mut seen = HashSet::new();
            for id in &params.ids {
                if !seen.insert(id.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "sensor '{}' lists id '{}' more than once",
                        name, id
                    )));
                }
            }
        }
        Ok(())
    }
}

fn is_flat_layout(root: &serde_yaml::Value) -> bool {
    root.get("simulator").is_none() && root.get("greenhouses").is_some()
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Document {
    simulator: Option<SimulatorSection>,
    sensors: Option<BTreeMap<String, Option<SensorMetadata>>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SimulatorSection {
    #[serde(alias = "locations", deserialize_with = "labels")]
    greenhouses: Vec<String>,
    sensors: Option<BTreeMap<String, SensorTypeParams>>,
}

impl Document {
    fn into_config(self) -> Config {
        let simulator = self.simulator.unwrap_or_default();
        Config {
            topology: Topology {
                locations: simulator.greenhouses,
            },
            sensor_types: simulator.sensors.unwrap_or_default(),
            metadata: self
                .sensors
                .unwrap_or_default()
                .into_iter()
                .map(|(name, meta)| (name, meta.unwrap_or_default()))
                .collect(),
            loaded_at: None,
        }
    }
}

#[derive(Deserialize)]
struct FlatDocument {
    #[serde(default, deserialize_with = "labels")]
    greenhouses: Vec<String>,
    #[serde(default)]
    sensors: Option<BTreeMap<String, FlatSensor>>,
}

#[derive(Deserialize)]
struct FlatSensor {
    base: f64,
    fluctuation: f64,
    #[serde(default, deserialize_with = "labels")]
    ids: Vec<String>,
    #[serde(default)]
    unit: Option<String>,
}

impl FlatDocument {
    fn into_config(self) -> Config {
        let mut sensor_types = BTreeMap::new();
        let mut metadata = BTreeMap::new();

        for (name, sensor) in self.sensors.unwrap_or_default() {
            let unit = sensor.unit.unwrap_or_else(|| default_unit(&name).to_string());
            metadata.insert(name.clone(), SensorMetadata { unit });
            sensor_types.insert(
                name,
                SensorTypeParams {
                    base: sensor.base,
                    fluctuation: sensor.fluctuation,
                    ids: sensor.ids,
                },
            );
        }

        Config {
            topology: Topology {
                locations: self.greenhouses,
            },
            sensor_types,
            metadata,
            loaded_at: None,
        }
    }
}

fn default_unit(sensor_type: &str) -> &'static str {
    DEFAULT_UNITS
        .iter()
        .find(|(name, _)| *name == sensor_type)
        .map(|(_, unit)| *unit)
        .unwrap_or("")
}

/// Names and ids may be written as bare integers in YAML.
///
/// Floats are rejected: `1.50` would come back as `"1.5"`, so such ids must be quoted.
#[derive(Deserialize)]
#[serde(untagged)]
enum Label {
    Text(String),
    Integer(i64),
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        match label {
            Label::Text(s) => s,
            Label::Integer(n) => n.to_string(),
        }
    }
}

fn labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Label>>::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().map(String::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"
simulator:
  greenhouses: [north, south]
  sensors:
    temperature:
      base: 22.0
      fluctuation: 1.5
      ids: ["t1", "t2"]
    humidity:
      base: 60
      fluctuation: 5
      ids: [1]
    co2:
      base: 400
      fluctuation: 20
      ids: []
sensors:
  temperature:
    unit: "°C"
    min: 10
    max: 35
  humidity:
    unit: "%"
"#;

    #[test]
    fn test_nested_layout() {
        let config = Config::from_yaml(NESTED, None).unwrap();

        assert_eq!(config.topology.locations, vec!["north", "south"]);
        assert_eq!(config.sensor_types.len(), 3);
        assert_eq!(config.sensor_types["humidity"].ids, vec!["1"]);
        assert_eq!(config.sensor_types["humidity"].base, 60.0);
        assert_eq!(config.unit("temperature"), "°C");
        assert_eq!(config.unit("co2"), "");
        assert_eq!(config.readings_per_cycle(), 6);
    }

    #[test]
    fn test_example_file_loads() {
        let config = Config::from_yaml(include_str!("../../config/config.example.yaml"), None).unwrap();
        assert_eq!(config.topology.locations.len(), 2);
        assert_eq!(config.readings_per_cycle(), 10);
        assert_eq!(config.unit("ec"), "mS/cm");
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let config = Config::from_yaml("", None).unwrap();
        assert!(config.topology.locations.is_empty());
        assert!(config.sensor_types.is_empty());
        assert!(config.metadata.is_empty());

        let config = Config::from_yaml("simulator:\n  greenhouses: [a]\n", None).unwrap();
        assert_eq!(config.topology.locations, vec!["a"]);
        assert_eq!(config.readings_per_cycle(), 0);
    }

    #[test]
    fn test_flat_layout_shim() {
        let yaml = r#"
greenhouses: [gh1]
sensors:
  temperature: { base: 21.0, fluctuation: 1.0, ids: ["1"] }
  ph: { base: 6.5, fluctuation: 0.2, ids: ["1"], unit: "" }
  nitrogen: { base: 30, fluctuation: 2, ids: ["1"] }
"#;
        let config = Config::from_yaml(yaml, None).unwrap();

        assert_eq!(config.topology.locations, vec!["gh1"]);
        assert_eq!(config.sensor_types.len(), 3);
        assert_eq!(config.unit("temperature"), "°C");
        assert_eq!(config.unit("ph"), "");
        assert_eq!(config.unit("nitrogen"), "");
    }

    #[test]
    fn test_negative_fluctuation_rejected() {
        let yaml = "simulator:\n  sensors:\n    t: { base: 1.0, fluctuation: -0.5, ids: [a] }\n";
        let err = Config::from_yaml(yaml, None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = "simulator:\n  sensors:\n    t: { base: 1.0, fluctuation: 0.5, ids: [a, a] }\n";
        assert!(matches!(
            Config::from_yaml(yaml, None),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_float_ids_must_be_quoted() {
        let yaml = "simulator:\n  sensors:\n    ph: { base: 6.5, fluctuation: 0.2, ids: [1.50] }\n";
        assert!(matches!(Config::from_yaml(yaml, None), Err(ConfigError::Parse(_))));

        let yaml = "simulator:\n  greenhouses: [2.0]\n";
        assert!(matches!(Config::from_yaml(yaml, None), Err(ConfigError::Parse(_))));

        let yaml = "simulator:\n  sensors:\n    ph: { base: 6.5, fluctuation: 0.2, ids: [\"1.50\", 7] }\n";
        let config = Config::from_yaml(yaml, None).unwrap();
        assert_eq!(config.sensor_types["ph"].ids, vec!["1.50", "7"]);
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = Config::from_yaml("simulator: [unclosed", None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = Config::from_yaml("simulator:\n  sensors:\n    t: { base: warm }\n", None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
