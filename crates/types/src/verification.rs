use cosmwasm_std::Binary;
use k256::ecdsa::{signature::Verifier, Signature, SigningKey, VerifyingKey};
use thiserror::Error;

use crate::{OrderTerms, SignedOrder, ValidationError};

/// Errors that can occur during signature verification
#[derive(Debug, Error, PartialEq)]
pub enum VerificationError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("missing signature")]
    MissingSignature,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("signature verification failed")]
    VerificationFailed,
}

impl From<VerificationError> for ValidationError {
    fn from(err: VerificationError) -> Self {
        ValidationError::InvalidSignature(err.to_string())
    }
}

/// Verify the maker's secp256k1 signature over the order's signing hash
pub fn verify_order_signature(order: &SignedOrder) -> Result<(), VerificationError> {
    verify_signature(
        &order.terms.signing_hash(),
        &order.signature,
        &order.public_key,
    )
}

/// Sign a message using secp256k1 with a given private key.
///
/// Returns the 64 byte compact signature.
pub fn sign_message(message: &[u8], private_key_bytes: &[u8]) -> Result<Binary, VerificationError> {
    use k256::ecdsa::signature::Signer;

    let signing_key = signing_key(private_key_bytes)?;
    let signature: Signature = signing_key.sign(message);

    Ok(Binary::from(signature.to_bytes().to_vec()))
}

/// Verify a compact signature against a message and compressed public key
pub fn verify_signature(
    message: &[u8],
    signature: &Binary,
    public_key: &Binary,
) -> Result<(), VerificationError> {
    if signature.is_empty() {
        return Err(VerificationError::MissingSignature);
    }

    if public_key.is_empty() {
        return Err(VerificationError::InvalidPublicKey(
            "public key is empty".to_string(),
        ));
    }

    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| VerificationError::InvalidPublicKey(e.to_string()))?;

    let sig = Signature::from_slice(signature)
        .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;

    verifying_key
        .verify(message, &sig)
        .map_err(|_| VerificationError::VerificationFailed)
}

/// Compressed (33 byte) public key for a 32 byte private key
pub fn derive_public_key(private_key_bytes: &[u8]) -> Result<Binary, VerificationError> {
    let signing_key = signing_key(private_key_bytes)?;
    let public_key_bytes = signing_key.verifying_key().to_sec1_bytes();

    Ok(Binary::from(public_key_bytes.to_vec()))
}

fn signing_key(private_key_bytes: &[u8]) -> Result<SigningKey, VerificationError> {
    if private_key_bytes.len() != 32 {
        return Err(VerificationError::EncodingError(format!(
            "private key must be 32 bytes, got {}",
            private_key_bytes.len()
        )));
    }

    SigningKey::from_bytes(private_key_bytes.into())
        .map_err(|e| VerificationError::EncodingError(e.to_string()))
}

impl OrderTerms {
    /// Sign the terms with the maker's private key
    pub fn sign_with_key(self, private_key: &[u8]) -> Result<SignedOrder, VerificationError> {
        let signature = sign_message(&self.signing_hash(), private_key)?;
        let public_key = derive_public_key(private_key)?;
        Ok(self.into_signed(signature, public_key))
    }
}

impl SignedOrder {
    pub fn verify(&self) -> Result<(), VerificationError> {
        verify_order_signature(self)
    }
}
