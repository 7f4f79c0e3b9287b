//! Instance configuration read by `nos init`.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use nos_ledger::{parse_amount, Address, LedgerConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "NOS Coin";
pub const DEFAULT_SYMBOL: &str = "NOS";
pub const DEFAULT_SUPPLY: &str = "430000000";

/// TOML form of a genesis configuration.
///
/// ```toml
/// owner = "0x4b1c..."
/// initial_supply = "0"      # successor instances start empty
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InstanceConfig {
    pub name: String,
    pub symbol: String,
    pub owner: Option<Address>,
    /// Derived from owner, name and symbol when absent.
    pub address: Option<Address>,
    /// Whole tokens with up to eight decimals.
    pub initial_supply: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            owner: None,
            address: None,
            initial_supply: DEFAULT_SUPPLY.to_string(),
        }
    }
}

impl InstanceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_ledger_config(&self) -> Result<LedgerConfig> {
        let owner = self.owner.context("config is missing `owner`")?;
        let initial_supply = parse_amount(&self.initial_supply).context("invalid `initial_supply`")?;
        let address = self.address.unwrap_or_else(|| {
            let seed = format!("{owner}/{}/{}", self.name, self.symbol);
            Address::derive(seed.as_bytes())
        });
        Ok(LedgerConfig {
            address,
            owner,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            initial_supply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nos_ledger::NOS_SCALE;

    const OWNER: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = InstanceConfig::parse(&format!("owner = \"{OWNER}\"")).unwrap();
        let ledger = cfg.to_ledger_config().unwrap();
        assert_eq!(ledger.name, DEFAULT_NAME);
        assert_eq!(ledger.symbol, DEFAULT_SYMBOL);
        assert_eq!(ledger.initial_supply, 430_000_000 * NOS_SCALE);
        assert_eq!(ledger.owner, OWNER.parse::<Address>().unwrap());
    }

    #[test]
    fn successor_starts_empty_at_a_fixed_address() {
        let raw = format!(
            "owner = \"{OWNER}\"\naddress = \"0x00000000000000000000000000000000000000bb\"\ninitial_supply = \"0\"\n"
        );
        let ledger = InstanceConfig::parse(&raw)
            .unwrap()
            .to_ledger_config()
            .unwrap();
        assert_eq!(ledger.initial_supply, 0);
        assert_eq!(
            ledger.address.to_string(),
            "0x00000000000000000000000000000000000000bb"
        );
    }

    #[test]
    fn derived_address_depends_on_symbol() {
        let a = InstanceConfig::parse(&format!("owner = \"{OWNER}\""))
            .unwrap()
            .to_ledger_config()
            .unwrap();
        let b = InstanceConfig::parse(&format!("owner = \"{OWNER}\"\nsymbol = \"NOS2\""))
            .unwrap()
            .to_ledger_config()
            .unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn missing_owner_and_bad_supply_are_errors() {
        assert!(InstanceConfig::default().to_ledger_config().is_err());
        let cfg = InstanceConfig::parse(&format!(
            "owner = \"{OWNER}\"\ninitial_supply = \"1.123456789\""
        ))
        .unwrap();
        assert!(cfg.to_ledger_config().is_err());
        assert!(InstanceConfig::parse("decimals = 18").is_err());
    }
}
