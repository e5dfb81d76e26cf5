//! Wallet address type.
//!
//! A wallet address is `0x` followed by exactly 40 hex digits. The digits are
//! accepted in any case and normalized to lowercase, so two spellings of the
//! same address compare equal. The prefix itself must be lowercase.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of hex digits after the `0x` prefix.
const ADDRESS_HEX_LEN: usize = 40;

/// Validated, lower-cased wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalize a wallet address.
    ///
    /// Surrounding whitespace is not trimmed: `" 0xabc…"` is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let hex = raw
            .strip_prefix("0x")
            .ok_or_else(|| CoreError::InvalidWallet(format!("missing 0x prefix: {raw}")))?;

        if hex.len() != ADDRESS_HEX_LEN {
            return Err(CoreError::InvalidWallet(format!(
                "expected {ADDRESS_HEX_LEN} hex digits, got {}",
                hex.len()
            )));
        }

        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidWallet(format!(
                "non-hex characters in address: {raw}"
            )));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Get the normalized address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee";

    #[test]
    fn test_parse_valid_address() {
        let wallet = WalletAddress::parse(VALID).unwrap();
        assert_eq!(wallet.as_str(), VALID);
    }

    #[test]
    fn test_parse_normalizes_to_lowercase() {
        let wallet = WalletAddress::parse("0x6A72F61820B26B1FE4D956E17B6DC2A1EA3033EE").unwrap();
        assert_eq!(wallet.as_str(), VALID);

        let upper_prefix = WalletAddress::parse("0X6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee");
        assert!(upper_prefix.is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [
            "not-an-address",
            "0x123",
            "6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee",
            "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033eez",
            "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033eg",
            "",
            " 0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee",
        ] {
            assert!(WalletAddress::parse(raw).is_err(), "should reject {raw:?}");
        }
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = format!("\"{}\"", VALID.to_uppercase().replacen("0X", "0x", 1));
        let wallet: WalletAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(wallet.as_str(), VALID);

        let bad: std::result::Result<WalletAddress, _> = serde_json::from_str("\"0x123\"");
        assert!(bad.is_err());
    }
}
