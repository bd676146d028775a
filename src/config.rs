//! Service configuration loaded from YAML
//!
//! ```yaml
//! lap_poll_interval_secs: 5
//! commit_interval_secs: 10
//! cars:
//!   - car_number: "7"
//!     device_id: 70
//!     tenant_id: acme
//!     capacity_gallons: 18.5
//!     refuel_cooldown_minutes: 15
//!     channels:
//!       speed: 1
//!       fuel_level: 2
//!       range_laps: 10
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{RangeError, Result};
use crate::types::CarRangeSettings;

fn default_lap_poll_interval() -> u64 {
    5
}

fn default_commit_interval() -> u64 {
    10
}

fn default_max_concurrent_cars() -> usize {
    16
}

/// Intervals, fan-out bound and per-car settings for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_lap_poll_interval")]
    pub lap_poll_interval_secs: u64,
    #[serde(default = "default_commit_interval")]
    pub commit_interval_secs: u64,
    #[serde(default = "default_max_concurrent_cars")]
    pub max_concurrent_cars: usize,
    #[serde(default)]
    pub cars: Vec<CarRangeSettings>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lap_poll_interval_secs: default_lap_poll_interval(),
            commit_interval_secs: default_commit_interval(),
            max_concurrent_cars: default_max_concurrent_cars(),
            cars: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        debug!(cars = config.cars.len(), "Service config parsed");
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RangeError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lap_poll_interval_secs == 0 {
            return Err(RangeError::config_error("lap_poll_interval_secs", "must be greater than zero"));
        }
        if self.commit_interval_secs == 0 {
            return Err(RangeError::config_error("commit_interval_secs", "must be greater than zero"));
        }
        if self.max_concurrent_cars == 0 {
            return Err(RangeError::config_error("max_concurrent_cars", "must be greater than zero"));
        }

        let mut car_numbers = HashSet::new();
        let mut device_ids = HashSet::new();
        for car in &self.cars {
            if car.car_number.trim().is_empty() {
                return Err(RangeError::config_error("cars", "car number is empty"));
            }
            if !car_numbers.insert(car.car_number.as_str()) {
                return Err(RangeError::config_error(
                    "cars",
                    format!("duplicate car number '{}'", car.car_number),
                ));
            }
            if !device_ids.insert(car.device_id) {
                return Err(RangeError::config_error(
                    "cars",
                    format!("device {} is mapped to more than one car", car.device_id),
                ));
            }
            if car.capacity_gallons.is_nan() || car.capacity_gallons < 0.0 {
                return Err(RangeError::config_error(
                    format!("car {}", car.car_number),
                    format!("invalid fuel capacity {}", car.capacity_gallons),
                ));
            }
        }
        Ok(())
    }

    pub fn lap_poll_interval(&self) -> Duration {
        Duration::from_secs(self.lap_poll_interval_secs)
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_secs)
    }

    pub fn car(&self, car_number: &str) -> Option<&CarRangeSettings> {
        self.cars.iter().find(|c| c.car_number == car_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    const SAMPLE: &str = r#"
lap_poll_interval_secs: 3
cars:
  - car_number: "7"
    device_id: 70
    tenant_id: acme
    capacity_gallons: 18.5
    use_telemetry: false
    refuel_cooldown_minutes: 5
    channels:
      speed: 1
      fuel_level: 2
      range_laps: 10
  - car_number: "31"
    device_id: 310
    capacity_gallons: 22
"#;

    #[test]
    fn parses_cars_and_defaults() -> anyhow::Result<()> {
        let config = ServiceConfig::from_yaml_str(SAMPLE).context("sample config")?;

        assert_eq!(config.lap_poll_interval(), Duration::from_secs(3));
        assert_eq!(config.commit_interval(), Duration::from_secs(10));
        assert_eq!(config.max_concurrent_cars, 16);
        assert_eq!(config.cars.len(), 2);

        let seven = config.car("7").context("car 7")?;
        assert_eq!(seven.tenant_id, "acme");
        assert!(!seven.use_telemetry);
        assert!(seven.use_race_hero_trigger);
        assert_eq!(seven.channels.fuel_level, Some(2));
        assert_eq!(seven.channels.range_minutes, None);
        assert_eq!(seven.refuel_cooldown_minutes, 5);

        let thirty_one = config.car("31").context("car 31")?;
        assert!(thirty_one.use_telemetry);
        assert_eq!(thirty_one.refuel_cooldown_minutes, 15);
        assert!(!thirty_one.channels.has_outputs());
        Ok(())
    }

    #[test]
    fn empty_document_uses_defaults() -> anyhow::Result<()> {
        let config = ServiceConfig::from_yaml_str("{}")?;
        assert_eq!(config, ServiceConfig::default());
        Ok(())
    }

    #[test]
    fn duplicate_cars_are_rejected() {
        let mut config = ServiceConfig::default();
        config.cars.push(CarRangeSettings::new("7", 70, 18.0));
        config.cars.push(CarRangeSettings::new("7", 71, 18.0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate car number"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn shared_device_is_rejected() {
        let mut config = ServiceConfig::default();
        config.cars.push(CarRangeSettings::new("7", 70, 18.0));
        config.cars.push(CarRangeSettings::new("8", 70, 18.0));
        assert!(matches!(config.validate(), Err(RangeError::Config { .. })));
    }

    #[test]
    fn bad_capacity_and_intervals_are_rejected() {
        let mut config = ServiceConfig::default();
        config.cars.push(CarRangeSettings::new("7", 70, -1.0));
        assert!(config.validate().is_err());

        let config = ServiceConfig { commit_interval_secs: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = ServiceConfig::from_yaml_str("cars: [").unwrap_err();
        assert!(matches!(err, RangeError::Config { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ServiceConfig::load("/nonexistent/pitwall-range.yaml").unwrap_err();
        match err {
            RangeError::File { path, .. } => assert!(path.ends_with("pitwall-range.yaml")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
