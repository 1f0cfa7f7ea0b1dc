use std::{fmt, str::FromStr};

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("address must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// 20-byte account identifier, rendered as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Last 20 bytes of SHA-256 over the ed25519 public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let arr: [u8; ADDRESS_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| AddressError::InvalidLength {
                    expected: ADDRESS_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity that issues calls against the token: an ed25519 key pair plus
/// the address derived from it.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
    address: Address,
}

impl Signer {
    pub fn from_signing_key(key: SigningKey) -> Self {
        let address = Address::from_verifying_key(&key.verifying_key());
        Self { key, address }
    }

    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_signing_key(SigningKey::generate(rng))
    }

    /// Expects exactly 32 bytes (64 hex characters).
    pub fn from_secret_hex(sk_hex: &str) -> Result<Self, AddressError> {
        let bytes =
            hex::decode(sk_hex.trim()).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&arr)))
    }

    /// Reproducible key for slot `index`, for fixtures and local runs.
    pub fn deterministic(index: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"mytoken-signer");
        hasher.update(index.to_le_bytes());
        let seed: [u8; 32] = hasher.finalize().into();
        Self::from_signing_key(SigningKey::from_bytes(&seed))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// First `n` deterministic signers. Slot 0 is the conventional deployer.
pub fn signers(n: u32) -> Vec<Signer> {
    (0..n).map(Signer::deterministic).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn address_display_and_parse_agree() {
        let addr = Signer::deterministic(7).address();
        let text = addr.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 2 + ADDRESS_LEN * 2);
        assert_eq!(text.parse::<Address>().unwrap(), addr);
        assert_eq!(text.trim_start_matches("0x").parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(AddressError::InvalidLength { expected: 20, actual: 2 })
        ));
        assert!(matches!(
            "0xzz".parse::<Address>(),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn address_serializes_as_string() {
        let addr = Signer::deterministic(1).address();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{addr}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn deterministic_signers_are_stable_and_distinct() {
        let a = signers(3);
        let b = signers(3);
        assert_eq!(a[0].address(), b[0].address());
        assert_ne!(a[0].address(), a[1].address());
        assert_ne!(a[1].address(), a[2].address());
        assert!(!a[0].address().is_zero());
    }

    #[test]
    fn secret_hex_restores_signer() {
        let signer = Signer::generate(&mut OsRng);
        let restored = Signer::from_secret_hex(&signer.secret_hex()).unwrap();
        assert_eq!(restored.address(), signer.address());
        assert_eq!(restored.verifying_key(), signer.verifying_key());
        assert!(Signer::from_secret_hex("abcd").is_err());
    }
}
