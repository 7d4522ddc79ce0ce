//! Ledger account identifier (`0x`-prefixed, 20-byte hex).

use crate::error::TallyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A ledger account id.
///
/// Stored as raw bytes so that differently-cased renderings of the same
/// account compare equal. Displayed as lowercase `0x…` hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId([u8; 20]);

impl AccountId {
    /// The all-zero account. The ledger uses it for placeholder proposal slots.
    pub const ZERO: Self = Self([0u8; 20]);

    pub const PREFIX: &'static str = "0x";

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a `0x`-prefixed hex account id (case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, TallyError> {
        let trimmed = raw.trim();
        let hex_part = trimmed
            .strip_prefix(Self::PREFIX)
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| TallyError::InvalidAccount(raw.to_string()))?;
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|_| TallyError::InvalidAccount(raw.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId(0x{})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = TallyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        let lower = AccountId::parse("0x3ad34899951b491132302f22849c174a18e9668d").unwrap();
        let mixed = AccountId::parse("0x3ad34899951B491132302f22849C174a18E9668D").unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(
            mixed.to_string(),
            "0x3ad34899951b491132302f22849c174a18e9668d"
        );
    }

    #[test]
    fn zero_address_is_detected() {
        let zero = AccountId::parse("0x0000000000000000000000000000000000000000").unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, AccountId::ZERO);
    }

    #[test]
    fn rejects_missing_prefix_and_bad_length() {
        assert!(AccountId::parse("3ad34899951b491132302f22849c174a18e9668d").is_err());
        assert!(AccountId::parse("0x3ad3").is_err());
        assert!(AccountId::parse("0xzz34899951b491132302f22849c174a18e9668d").is_err());
    }

    #[test]
    fn serde_uses_hex_string() {
        let id = AccountId::new([0xab; 20]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
