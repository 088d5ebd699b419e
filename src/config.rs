// 7.0 config.rs: all router settings in one place. program identity, slot timing,
// sampling policy, rent schedule, event retention.
// 7.1 RentConfig mirrors the ledger's rent-exemption rule: (overhead + space) bytes
// charged for `exemption_threshold_years` years.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sampler::SamplePolicy;
use crate::twap_market::TwapMarket;

pub const DEFAULT_PROGRAM_NAME: &str = "twap_router";

// Rent schedule for ledger accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentConfig {
    pub lamports_per_byte_year: u64,
    pub exemption_threshold_years: u64,
    // Bytes charged on top of the data for the account header
    pub account_overhead_bytes: u64,
}

impl Default for RentConfig {
    fn default() -> Self {
        Self {
            lamports_per_byte_year: 3_480,
            exemption_threshold_years: 2,
            account_overhead_bytes: 128,
        }
    }
}

impl RentConfig {
    pub fn exempt_minimum(&self, space: usize) -> u64 {
        let bytes = self.account_overhead_bytes.saturating_add(space as u64);
        bytes
            .saturating_mul(self.lamports_per_byte_year)
            .saturating_mul(self.exemption_threshold_years)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    // Seed of the router's program id; every record address derives from it
    pub program_name: String,
    // Wall clock length of one slot, used to turn expiry timestamps into slots
    pub slot_duration_ms: u64,
    pub sample_policy: SamplePolicy,
    // Bytes allocated for each TwapMarket record
    pub twap_market_space: usize,
    // Audit events kept in memory, oldest dropped first
    pub max_events: usize,
    // tracing EnvFilter directive used by the simulator
    pub log_filter: String,
    pub rent: RentConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
            slot_duration_ms: 400,
            sample_policy: SamplePolicy::Midpoint,
            twap_market_space: 512,
            max_events: 10_000,
            log_filter: "info".to_string(),
            rent: RentConfig::default(),
        }
    }
}

impl RouterConfig {
    pub fn development() -> Self {
        Self {
            log_filter: "debug".to_string(),
            ..Self::default()
        }
    }

    pub fn devnet() -> Self {
        Self {
            max_events: 1_000,
            ..Self::default()
        }
    }

    // Mainnet keeps a longer audit trail and logs less
    pub fn mainnet() -> Self {
        Self {
            max_events: 100_000,
            log_filter: "warn".to_string(),
            ..Self::default()
        }
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program_name.trim().is_empty() {
            return Err(ConfigError::InvalidProgram {
                reason: "program name must not be empty".to_string(),
            });
        }

        // at least one slot per second keeps expiry conversion meaningful
        if self.slot_duration_ms == 0 || self.slot_duration_ms > 1_000 {
            return Err(ConfigError::InvalidSlotDuration(self.slot_duration_ms));
        }

        if self.rent.lamports_per_byte_year == 0 || self.rent.exemption_threshold_years == 0 {
            return Err(ConfigError::InvalidRent {
                reason: "rent must be positive".to_string(),
            });
        }

        // room for the record with its accumulators at their widest
        let needed = TwapMarket::max_encoded_len().map_err(|e| ConfigError::Parse(e.to_string()))?;
        if self.twap_market_space < needed {
            return Err(ConfigError::InvalidSpace {
                space: self.twap_market_space,
                needed,
            });
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidEvents {
                reason: "need room for at least one event".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid program: {reason}")]
    InvalidProgram { reason: String },

    #[error("Invalid slot duration {0}ms")]
    InvalidSlotDuration(u64),

    #[error("Invalid rent: {reason}")]
    InvalidRent { reason: String },

    #[error("TwapMarket space {space} is below the {needed} bytes the widest record needs")]
    InvalidSpace { space: usize, needed: usize },

    #[error("Invalid event log: {reason}")]
    InvalidEvents { reason: String },

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Config read error: {0}")]
    Io(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Devnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> RouterConfig {
        match self {
            Environment::Development => RouterConfig::development(),
            Environment::Devnet => RouterConfig::devnet(),
            Environment::Mainnet => RouterConfig::mainnet(),
        }
    }
}
