use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ValidationError;

/// 32 byte HTLC preimage. Serializes as lowercase hex.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Secret([u8; 32]);

impl Secret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
        let raw = hex::decode(value.trim_start_matches("0x"))
            .map_err(|_| ValidationError::SecretMismatch)?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| ValidationError::SecretMismatch)?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex sha256 of the preimage, the value orders carry as `secret_hash`
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.0))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.to_hex()
    }
}

impl TryFrom<String> for Secret {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Secret::from_hex(&value)
    }
}

/// Check a preimage against a hex hashlock, case-insensitively
pub fn verify_secret(secret: &Secret, secret_hash: &str) -> bool {
    secret
        .hash()
        .eq_ignore_ascii_case(secret_hash.trim_start_matches("0x"))
}
