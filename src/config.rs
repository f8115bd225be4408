//! Configuration management for the bridge orchestrator
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::error::{BridgeError, BridgeResult};

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub wallet: WalletConfig,
    /// Chain where the bridged asset natively lives (lock/unlock side)
    pub source: ChainSettings,
    /// Chain carrying the wrapped asset (mint/burn side)
    pub destination: ChainSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the relayer private key
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainSettings {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Manager contract authorized to hold/release the bridged asset.
    /// Decoded approval events are validated against this address.
    pub manager_contract: String,
    pub confirmation_blocks: u64,
    pub poll_interval_ms: u64,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("LATTICE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        for chain in [&self.source, &self.destination] {
            if chain.rpc_url.is_empty() {
                anyhow::bail!("Chain {} has no RPC URL configured", chain.name);
            }
            chain
                .manager_address()
                .with_context(|| format!("Chain {} manager contract", chain.name))?;
            if chain.confirmation_blocks == 0 {
                anyhow::bail!(
                    "Chain {} must require at least one confirmation block",
                    chain.name
                );
            }
        }

        if self.source.chain_id == self.destination.chain_id {
            anyhow::bail!("Source and destination chains must differ");
        }

        Ok(())
    }
}

impl ChainSettings {
    /// Parse the configured manager contract address
    pub fn manager_address(&self) -> BridgeResult<Address> {
        Address::from_str(&self.manager_contract).map_err(|e| {
            BridgeError::Config(format!(
                "Invalid manager contract address {:?}: {}",
                self.manager_contract, e
            ))
        })
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
