//! Participant signature backend: secp256k1 keys, Blake2b-256 message hashes, and
//! DER signatures zero-padded to a fixed length.
//!
//! Backends are passed around explicitly as a [BackendConfig]; there is no global
//! default backend.

use crate::encoding::blake2b_256;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;

/// Length of a padded signature: longest secp256k1 DER signature (72) plus one.
pub const PADDED_SIGNATURE_LENGTH: usize = 73;
/// Length of a compressed SEC1 public key.
pub const PUBLIC_KEY_LENGTH: usize = 33;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid signature padding: {0}")]
    Padding(String),
    #[error("parsing DER signature: {0}")]
    Der(String),
    #[error("reading signature: {0}")]
    Io(#[from] std::io::Error),
}

/// A channel participant, identified by its public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub_key: VerifyingKey,
}

impl Participant {
    pub fn new(pub_key: VerifyingKey) -> Self {
        Self { pub_key }
    }

    pub fn pub_key(&self) -> &VerifyingKey {
        &self.pub_key
    }

    /// Compressed SEC1 encoding, as stored in channel params.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut out = [0u8; PUBLIC_KEY_LENGTH];
        out.copy_from_slice(self.pub_key.to_encoded_point(true).as_bytes());
        out
    }
}

pub trait AddressDecoder: Send + Sync {
    fn decode_address(&self, bytes: &[u8]) -> Result<Participant, WalletError>;
}

pub trait SignatureVerifier: Send + Sync {
    /// Read one padded signature from `reader`. The padding is kept.
    fn decode_sig(&self, reader: &mut dyn Read) -> Result<Vec<u8>, WalletError>;

    /// Verify a padded signature over the plain (unhashed) `msg`.
    fn verify_signature(&self, msg: &[u8], sig: &[u8], signer: &Participant) -> Result<bool, WalletError>;
}

/// The capability set a component signs and verifies with.
#[derive(Clone)]
pub struct BackendConfig {
    pub verifier: Arc<dyn SignatureVerifier>,
    pub addresses: Arc<dyn AddressDecoder>,
}

impl BackendConfig {
    pub fn secp256k1() -> Self {
        let backend = Arc::new(Secp256k1Backend);
        Self {
            verifier: backend.clone(),
            addresses: backend,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Backend;

impl AddressDecoder for Secp256k1Backend {
    fn decode_address(&self, bytes: &[u8]) -> Result<Participant, WalletError> {
        if bytes.len() != PUBLIC_KEY_LENGTH {
            return Err(WalletError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LENGTH,
                bytes.len()
            )));
        }
        let pub_key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| WalletError::InvalidPublicKey(e.to_string()))?;
        Ok(Participant::new(pub_key))
    }
}

impl SignatureVerifier for Secp256k1Backend {
    fn decode_sig(&self, reader: &mut dyn Read) -> Result<Vec<u8>, WalletError> {
        let mut sig = vec![0u8; PADDED_SIGNATURE_LENGTH];
        reader.read_exact(&mut sig)?;
        Ok(sig)
    }

    fn verify_signature(&self, msg: &[u8], sig: &[u8], signer: &Participant) -> Result<bool, WalletError> {
        let hash = blake2b_256(msg);
        let der = remove_padding(sig)?;
        let signature = Signature::from_der(der).map_err(|e| WalletError::Der(e.to_string()))?;
        // k256 only verifies low-S signatures.
        let signature = signature.normalize_s().unwrap_or(signature);
        Ok(signer.pub_key.verify_prehash(&hash, &signature).is_ok())
    }
}

/// Zero-pad a DER signature to [PADDED_SIGNATURE_LENGTH].
pub fn pad_der_signature(der: &[u8]) -> Result<Vec<u8>, WalletError> {
    if der.len() > PADDED_SIGNATURE_LENGTH {
        return Err(WalletError::Padding(format!(
            "signature of {} bytes exceeds {}",
            der.len(),
            PADDED_SIGNATURE_LENGTH
        )));
    }
    let mut out = der.to_vec();
    out.resize(PADDED_SIGNATURE_LENGTH, 0);
    Ok(out)
}

/// Strip the zero padding; the DER header gives the real length.
pub fn remove_padding(sig: &[u8]) -> Result<&[u8], WalletError> {
    if sig.len() != PADDED_SIGNATURE_LENGTH {
        return Err(WalletError::Padding(format!(
            "expected {} bytes, got {}",
            PADDED_SIGNATURE_LENGTH,
            sig.len()
        )));
    }
    if sig[0] != 0x30 {
        return Err(WalletError::Padding("not a DER sequence".into()));
    }
    let len = 2 + sig[1] as usize;
    if len > sig.len() {
        return Err(WalletError::Padding(format!("DER length {} out of range", len)));
    }
    if sig[len..].iter().any(|b| *b != 0) {
        return Err(WalletError::Padding("non-zero padding".into()));
    }
    Ok(&sig[..len])
}
