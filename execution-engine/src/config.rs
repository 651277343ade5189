//! Engine Configuration Module
//!
//! This module handles loading and validating configuration for the
//! execution engine: the dust buffer applied to max-repayment amounts,
//! the per-chunk instruction limit, and per-provider flash loan fee
//! overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::flashloan::FlashLoanProvider;

/// Per-provider flash loan fee override, in basis points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFeeConfig {
    pub provider: FlashLoanProvider,
    pub fee_bps: u32,
}

/// Main configuration structure for the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Buffer added to max-repayment amounts to absorb interest accrual
    /// between quote and execution; the excess is refunded by a trailing
    /// push. Basis points.
    #[serde(default = "default_dust_buffer_bps")]
    pub dust_buffer_bps: u32,

    /// Hard cap on instructions per chunk.
    #[serde(default = "default_max_instructions_per_chunk")]
    pub max_instructions_per_chunk: usize,

    /// Flash loan fee overrides (use `[[provider_fees]]` in TOML).
    #[serde(default)]
    pub provider_fees: Vec<ProviderFeeConfig>,
}

fn default_dust_buffer_bps() -> u32 {
    50
}

fn default_max_instructions_per_chunk() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            dust_buffer_bps: default_dust_buffer_bps(),
            max_instructions_per_chunk: default_max_instructions_per_chunk(),
            provider_fees: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Ok(EngineConfig)` - Parsed and validated configuration
    /// * `Err(anyhow::Error)` - File missing, unparsable, or invalid
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config file: {}", path))?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(contents).context("Failed to parse engine config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.dust_buffer_bps >= 10_000 {
            anyhow::bail!(
                "dust_buffer_bps {} must be below 10000 (100%)",
                self.dust_buffer_bps
            );
        }
        if self.max_instructions_per_chunk == 0 {
            anyhow::bail!("max_instructions_per_chunk must be at least 1");
        }
        for fee in &self.provider_fees {
            if fee.fee_bps >= 10_000 {
                anyhow::bail!(
                    "fee override {} bps for {:?} must be below 10000",
                    fee.fee_bps,
                    fee.provider
                );
            }
        }
        Ok(())
    }

    /// Configured fee override for a provider, if any.
    pub fn provider_fee_override(&self, provider: FlashLoanProvider) -> Option<u32> {
        self.provider_fees
            .iter()
            .find(|fee| fee.provider == provider)
            .map(|fee| fee.fee_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dust_buffer_bps, 50);
    }

    #[test]
    fn parses_overrides_from_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            dust_buffer_bps = 25

            [[provider_fees]]
            provider = "BalancerV3"
            fee_bps = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.dust_buffer_bps, 25);
        assert_eq!(
            config.provider_fee_override(FlashLoanProvider::BalancerV3),
            Some(4)
        );
        assert_eq!(
            config.provider_fee_override(FlashLoanProvider::AaveV3),
            None
        );
    }

    #[test]
    fn rejects_oversized_buffer() {
        let result = EngineConfig::from_toml_str("dust_buffer_bps = 10000");
        assert!(result.is_err());
    }
}
