use btc_core::{AccountContext, SelectionPolicy};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Account selection and coin-selection tunables, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub purpose: u32,
    pub coin: u32,
    #[serde(default)]
    pub account: u32,
    #[serde(default)]
    pub policy: SelectionPolicy,
}

impl WalletConfig {
    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        serde_json::from_str(json).map_err(|e| WalletError::InvalidConfig(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, WalletError> {
        serde_json::to_string(self).map_err(|e| WalletError::InvalidConfig(e.to_string()))
    }

    pub fn context(&self) -> Result<AccountContext, WalletError> {
        AccountContext::new(self.purpose, self.coin, self.account)
            .map_err(|e| WalletError::InvalidConfig(e.to_string()))
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            purpose: 84,
            coin: 0,
            account: 0,
            policy: SelectionPolicy::default(),
        }
    }
}
