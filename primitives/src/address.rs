use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 32-byte account identity. The all-zero value is reserved as the
/// invalid sentinel and is rejected wherever an identity is stored.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The invalid sentinel identity.
    pub const ZERO: Address = Address([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an address from an ed25519 verifying key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 4 bytes are enough to tell fixtures apart in logs.
        write!(f, "Address({}..)", hex::encode(&self.0[..4]))
    }
}

/// Failure to parse a hex-encoded address.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(AddressParseError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn test_zero_sentinel() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!Address::new([1u8; 32]).is_zero());
    }

    #[test]
    fn test_hex_parse_accepts_prefix() {
        let addr = Address::new([0xab; 32]);
        let plain: Address = addr.to_hex().parse().unwrap();
        let prefixed: Address = format!("0x{}", addr.to_hex()).parse().unwrap();
        assert_eq!(plain, addr);
        assert_eq!(prefixed, addr);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = "abcd".parse::<Address>().unwrap_err();
        assert_eq!(err, AddressParseError::InvalidLength(2));
    }

    #[test]
    fn test_parse_rejects_bad_hex() {
        assert!(matches!(
            "zz".parse::<Address>(),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_serializes_as_hex_string() {
        let addr = Address::new([7u8; 32]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "07".repeat(32)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_from_verifying_key() {
        let sk = SigningKey::generate(&mut OsRng);
        let vk = sk.verifying_key();
        let addr = Address::from_verifying_key(&vk);
        assert_eq!(addr.as_bytes(), vk.as_bytes());
    }
}
