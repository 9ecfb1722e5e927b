//! Wallet and address handling.
//!
//! Every mutating chain call takes an externally supplied [`Wallet`]; the
//! engine never manages private keys beyond this seam.

use crate::error::{ChainError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// An account or contract address (0x-prefixed hex, 20 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create an address from a 0x-prefixed hex string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self> {
        let stripped = s
            .strip_prefix("0x")
            .ok_or_else(|| ChainError::invalid_address("missing 0x prefix"))?;
        let bytes = hex::decode(stripped)
            .map_err(|e| ChainError::invalid_address(format!("invalid hex: {e}")))?;
        if bytes.len() != 20 {
            return Err(ChainError::invalid_address(format!(
                "address must be 20 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(format!("0x{}", stripped.to_ascii_lowercase())))
    }

    /// Create an address from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns error if bytes are not 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 20 {
            return Err(ChainError::invalid_address(format!(
                "address must be 20 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }

    /// Get the 0x-prefixed hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the raw bytes of the address.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        hex::decode(self.0.trim_start_matches("0x")).unwrap_or_default()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A signing wallet.
///
/// The address is derived from the verifying key (first 20 bytes of its
/// SHA-256 digest).
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Generate a new random wallet.
    ///
    /// Key material comes straight from the operating system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns error if random generation fails.
    pub fn generate() -> Result<Self> {
        let mut secret_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        Self::from_secret_key(&secret_bytes)
    }

    /// Create a wallet from a secret key (32 bytes).
    ///
    /// # Errors
    ///
    /// Returns error if the key is invalid.
    pub fn from_secret_key(secret: &[u8]) -> Result<Self> {
        let secret_array: [u8; 32] = secret.try_into().map_err(|_| {
            ChainError::wallet_error(format!("secret key must be 32 bytes, got {}", secret.len()))
        })?;

        let signing_key = SigningKey::from_bytes(&secret_array);
        let address = derive_address(&signing_key.verifying_key())?;

        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Load a wallet from a JSON file containing the 32 secret-key bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let bytes: Vec<u8> = serde_json::from_str(&contents)?;
        Self::from_secret_key(&bytes)
    }

    /// Save the wallet secret key to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes: Vec<u8> = self.signing_key.as_bytes().to_vec();
        let json = serde_json::to_string(&bytes)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Get the wallet address.
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Get the public key (verifying key).
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the secret key bytes (careful with this!).
    #[must_use]
    pub fn secret_key(&self) -> &[u8; 32] {
        self.signing_key.as_bytes()
    }

    /// Sign a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Sign a message and return the signature as bytes.
    #[must_use]
    pub fn sign_bytes(&self, message: &[u8]) -> [u8; 64] {
        self.sign(message).to_bytes()
    }
}

fn derive_address(key: &VerifyingKey) -> Result<Address> {
    let digest = Sha256::digest(key.as_bytes());
    Address::from_bytes(&digest[..20])
}

#[allow(clippy::missing_fields_in_debug)]
impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}
