//! # Simulation Configuration
//!
//! Supplied once at startup and treated as immutable afterwards. Every field
//! has a default, so a JSON file only needs to name what it overrides.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while validating a [`SimulationConfig`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("closing hour {close} must come after opening hour {open}")]
    Schedule { open: u32, close: u32 },

    #[error("{field} must lie within 0.0..=1.0 (got {value})")]
    Fraction { field: &'static str, value: f64 },

    #[error("register close fraction {close} must be below open fraction {open}")]
    Hysteresis { open: f64, close: f64 },

    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("malformed configuration: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Shop floor capacity.
    pub max_occupancy: usize,
    /// Number of products in the catalog.
    pub product_count: usize,
    /// Real duration of one logical minute.
    pub tick_ms: u64,
    pub open_hour: u32,
    pub close_hour: u32,
    /// Logical minutes of production before the doors open.
    pub warmup_minutes: u32,
    /// Concurrent workers inside the baker.
    pub baker_workers: usize,
    /// Upper bound of customers spawned per tick.
    pub arrivals_per_tick: u32,
    pub max_active_customers: usize,
    pub max_customers_total: u64,
    pub entry_attempts: u32,
    pub entry_backoff_ms: u64,
    pub receipt_attempts: u32,
    pub receipt_wait_ms: u64,
    pub shutdown_grace_ms: u64,
    /// Logical minutes customers may stay after closing time.
    pub closing_grace_minutes: u32,
    pub max_wall_clock_ms: Option<u64>,
    pub max_logical_minutes: Option<u64>,
    /// Budget each message channel derives its slot count from.
    pub queue_byte_budget: usize,
    pub register_open_fraction: f64,
    pub register_close_fraction: f64,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_occupancy: 10,
            product_count: 12,
            tick_ms: 100,
            open_hour: 8,
            close_hour: 16,
            warmup_minutes: 30,
            baker_workers: 2,
            arrivals_per_tick: 2,
            max_active_customers: 300,
            max_customers_total: 5000,
            entry_attempts: 100,
            entry_backoff_ms: 50,
            receipt_attempts: 20,
            receipt_wait_ms: 500,
            shutdown_grace_ms: 2000,
            closing_grace_minutes: 30,
            max_wall_clock_ms: None,
            max_logical_minutes: None,
            queue_byte_budget: 16384,
            register_open_fraction: 0.5,
            register_close_fraction: 1.0 / 3.0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Reads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_occupancy", self.max_occupancy as u64, 3, 300)?;
        check_range("product_count", self.product_count as u64, 11, 20)?;
        check_range("tick_ms", self.tick_ms, 1, 2000)?;
        check_range("open_hour", self.open_hour.into(), 6, 12)?;
        check_range("close_hour", self.close_hour.into(), 12, 22)?;
        if self.close_hour <= self.open_hour {
            return Err(ConfigError::Schedule {
                open: self.open_hour,
                close: self.close_hour,
            });
        }
        check_range("warmup_minutes", self.warmup_minutes.into(), 0, 180)?;
        check_range("baker_workers", self.baker_workers as u64, 1, self.product_count as u64)?;
        check_range("max_active_customers", self.max_active_customers as u64, 1, 300)?;
        check_range("max_customers_total", self.max_customers_total, 1, 5000)?;
        check_range("entry_attempts", self.entry_attempts.into(), 1, 1000)?;
        check_range("receipt_attempts", self.receipt_attempts.into(), 1, 1000)?;
        check_range("receipt_wait_ms", self.receipt_wait_ms, 1, 60_000)?;
        for (field, value) in [
            ("register_open_fraction", self.register_open_fraction),
            ("register_close_fraction", self.register_close_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Fraction { field, value });
            }
        }
        if self.register_close_fraction >= self.register_open_fraction {
            return Err(ConfigError::Hysteresis {
                open: self.register_open_fraction,
                close: self.register_close_fraction,
            });
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Time a cashier spends scanning one unit.
    pub fn scan_delay(&self) -> Duration {
        Duration::from_micros(self.tick_ms * 50)
    }

    pub fn entry_backoff(&self) -> Duration {
        Duration::from_millis(self.entry_backoff_ms)
    }

    pub fn receipt_wait(&self) -> Duration {
        Duration::from_millis(self.receipt_wait_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn max_wall_clock(&self) -> Option<Duration> {
        self.max_wall_clock_ms.map(Duration::from_millis)
    }

    /// Random source for one actor or worker. Seeded runs give every stream
    /// its own deterministic sequence.
    pub fn rng(&self, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_entropy(),
        }
    }

    /// Minute of the day at which the logical clock starts.
    pub fn start_minute(&self) -> u32 {
        (self.open_hour * 60).saturating_sub(self.warmup_minutes)
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.start_minute(), 7 * 60 + 30);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SimulationConfig::from_json(r#"{ "max_occupancy": 25, "tick_ms": 5 }"#).unwrap();
        assert_eq!(config.max_occupancy, 25);
        assert_eq!(config.tick_ms, 5);
        assert_eq!(config.close_hour, 16);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let config = SimulationConfig {
            max_occupancy: 2,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "max_occupancy",
                value: 2,
                min: 3,
                max: 300
            })
        );

        let config = SimulationConfig {
            open_hour: 12,
            close_hour: 12,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Schedule { .. })));

        let config = SimulationConfig {
            register_close_fraction: 0.6,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Hysteresis { .. })));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let err = SimulationConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }
}
