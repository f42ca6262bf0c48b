//! Signing Identity
//!
//! Ed25519 identity used to authenticate every proposal and envelope sent
//! to the network. Uses domain separation tags for the different signing
//! contexts. Enrollment material is loaded once at startup; a failure
//! here is fatal to initialization.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use std::path::Path;

use crate::error::{ConnectorError, ConnectorResult};

/// Domain separation tags for connector signing contexts
pub mod domain {
    /// Domain tag for transaction proposals
    pub const PROPOSAL: &[u8] = b"FLEX:Proposal:v1\0";
    /// Domain tag for endorsed transaction envelopes
    pub const ENVELOPE: &[u8] = b"FLEX:Envelope:v1\0";
}

/// Connector signing identity
#[derive(Clone)]
pub struct SigningIdentity {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    /// Enrollment identifier from the network profile
    pub enrollment_id: String,
    /// Key identifier (hex-encoded public key prefix)
    pub kid: String,
}

impl SigningIdentity {
    /// Generate a new random identity (tooling and tests)
    pub fn generate(enrollment_id: &str) -> Self {
        Self::from_key(SigningKey::generate(&mut OsRng), enrollment_id)
    }

    /// Create from existing secret key bytes
    pub fn from_bytes(bytes: &[u8; 32], enrollment_id: &str) -> Self {
        Self::from_key(SigningKey::from_bytes(bytes), enrollment_id)
    }

    /// Load enrollment material from a hex-encoded secret key file
    pub fn from_key_file(path: &Path, enrollment_id: &str) -> ConnectorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConnectorError::Init(format!("Failed to read key file {}: {}", path.display(), e))
        })?;
        let bytes = hex::decode(raw.trim()).map_err(|e| {
            ConnectorError::Init(format!("Invalid key material in {}: {}", path.display(), e))
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            ConnectorError::Init(format!(
                "Key material in {} must be 32 bytes",
                path.display()
            ))
        })?;
        Ok(Self::from_bytes(&bytes, enrollment_id))
    }

    fn from_key(signing_key: SigningKey, enrollment_id: &str) -> Self {
        let verifying_key = signing_key.verifying_key();
        let kid = hex::encode(&verifying_key.to_bytes()[..8]);
        Self {
            signing_key,
            verifying_key,
            enrollment_id: enrollment_id.to_string(),
            kid,
        }
    }

    /// Hex-encoded public key: the creator identity on the wire
    pub fn creator(&self) -> String {
        hex::encode(self.verifying_key.to_bytes())
    }

    /// Sign a message under a domain separation tag, returning a hex
    /// signature
    pub fn sign(&self, domain_tag: &[u8], message: &[u8]) -> String {
        let mut data = Vec::with_capacity(domain_tag.len() + message.len());
        data.extend_from_slice(domain_tag);
        data.extend_from_slice(message);
        hex::encode(self.signing_key.sign(&data).to_bytes())
    }

    /// Verify a hex signature produced by [`sign`](Self::sign)
    pub fn verify(&self, domain_tag: &[u8], message: &[u8], signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&bytes) else {
            return false;
        };
        let mut data = Vec::with_capacity(domain_tag.len() + message.len());
        data.extend_from_slice(domain_tag);
        data.extend_from_slice(message);
        self.verifying_key.verify(&data, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let identity = SigningIdentity::generate("connector-1");
        let signature = identity.sign(domain::PROPOSAL, b"payload");
        assert!(identity.verify(domain::PROPOSAL, b"payload", &signature));
        assert!(!identity.verify(domain::PROPOSAL, b"tampered", &signature));
        assert!(!identity.verify(domain::ENVELOPE, b"payload", &signature));
    }

    #[test]
    fn test_from_bytes_is_deterministic() {
        let bytes = [7u8; 32];
        let a = SigningIdentity::from_bytes(&bytes, "connector-1");
        let b = SigningIdentity::from_bytes(&bytes, "connector-1");
        assert_eq!(a.creator(), b.creator());
        assert_eq!(a.kid, b.kid);
        assert_eq!(a.kid.len(), 16);
    }

    #[test]
    fn test_rejects_garbage_signature() {
        let identity = SigningIdentity::generate("connector-1");
        assert!(!identity.verify(domain::PROPOSAL, b"payload", "zz"));
        assert!(!identity.verify(domain::PROPOSAL, b"payload", "deadbeef"));
    }
}
