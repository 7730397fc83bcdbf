// 🪪 Wallet Address - validated identifier for a screened wallet

use crate::error::ScreenerError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Ethereum hexadecimal address is derived from the last 20 bytes of the
/// public key controlling the account with 0x in front.
/// e.g. 0x71C7656EC7ab88b098defB751B7401B5f6d8976F
pub const ETH_WALLET_ADDRESS_LENGTH: usize = 42;

/// A wallet address that passed validation.
///
/// Only the minimum length is enforced; checksum and hex validation are left
/// to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self, ScreenerError> {
        if raw.chars().count() < ETH_WALLET_ADDRESS_LENGTH {
            return Err(ScreenerError::InvalidAddress);
        }
        Ok(Address(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
