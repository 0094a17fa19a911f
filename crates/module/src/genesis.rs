//! Genesis configuration for the auction ledger.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use thiserror::Error;

use zkbid_types::{Address, Digest};

use crate::state::LedgerState;

/// Shortest commit or reveal window accepted by default (5 minutes).
pub const DEFAULT_MIN_DURATION: u64 = 300;
/// Longest commit or reveal window accepted by default (24 hours).
pub const DEFAULT_MAX_DURATION: u64 = 86_400;

/// Genesis configuration for the ledger module.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerGenesisConfig {
    /// Hash of the registered verification key
    #[serde_as(as = "Option<Hex>")]
    pub vk_hash: Option<Digest>,

    /// Address allowed to publish attestation roots (anyone if unset)
    #[serde_as(as = "Option<Hex>")]
    pub relayer: Option<Address>,

    /// Duration bounds for auction windows
    #[serde(default)]
    pub rules: AuctionRules,

    /// Starting timestamp for chains with a controllable clock
    #[serde(default)]
    pub initial_timestamp: Option<u64>,
}

/// Bounds applied to every new auction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRules {
    /// Minimum commit / reveal duration (seconds)
    pub min_duration: u64,
    /// Maximum commit / reveal duration (seconds)
    pub max_duration: u64,
}

impl Default for AuctionRules {
    fn default() -> Self {
        Self {
            min_duration: DEFAULT_MIN_DURATION,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

impl AuctionRules {
    pub fn allows(&self, duration: u64) -> bool {
        (self.min_duration..=self.max_duration).contains(&duration)
    }
}

impl LedgerGenesisConfig {
    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.rules.min_duration == 0 {
            return Err(GenesisValidationError::InvalidMinDuration);
        }

        if self.rules.max_duration < self.rules.min_duration {
            return Err(GenesisValidationError::InvalidDurationRange {
                min: self.rules.min_duration,
                max: self.rules.max_duration,
            });
        }

        Ok(())
    }

    /// Validate and build the initial ledger state.
    pub fn build_state(&self) -> Result<LedgerState, GenesisValidationError> {
        self.validate()?;
        Ok(LedgerState {
            vk_hash: self.vk_hash,
            relayer: self.relayer,
            rules: self.rules.clone(),
            ..LedgerState::new()
        })
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenesisValidationError {
    #[error("Minimum duration must be greater than zero")]
    InvalidMinDuration,

    #[error("Maximum duration {max} is below minimum duration {min}")]
    InvalidDurationRange { min: u64, max: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerGenesisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rules.min_duration, 300);
        assert_eq!(config.rules.max_duration, 86_400);
    }

    #[test]
    fn test_invalid_min_duration() {
        let mut config = LedgerGenesisConfig::default();
        config.rules.min_duration = 0;
        assert_eq!(
            config.validate(),
            Err(GenesisValidationError::InvalidMinDuration)
        );
    }

    #[test]
    fn test_inverted_duration_range() {
        let mut config = LedgerGenesisConfig::default();
        config.rules.max_duration = 100;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidDurationRange { min: 300, max: 100 })
        ));
    }

    #[test]
    fn test_build_state_carries_vk_hash() {
        let config = LedgerGenesisConfig {
            vk_hash: Some([9u8; 32]),
            ..Default::default()
        };
        let state = config.build_state().unwrap();
        assert_eq!(state.vk_hash, Some([9u8; 32]));
        assert_eq!(state.next_auction_id, 1);
    }

    #[test]
    fn test_json_uses_hex_digests() {
        let json = format!(
            r#"{{"vk_hash":"{}","rules":{{"min_duration":60,"max_duration":120}}}}"#,
            "ab".repeat(32)
        );
        let config: LedgerGenesisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.vk_hash, Some([0xab; 32]));
        assert_eq!(config.relayer, None);
        assert!(config.rules.allows(60));
        assert!(!config.rules.allows(121));
    }
}
