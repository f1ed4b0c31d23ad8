// Algorithm suite negotiation names and the primitive bundles behind them.
//
//   W4-BASE-1  X25519 / Ed25519 / ChaCha20-Poly1305 / SHA-256 / HKDF-SHA256
//   W4-FIPS-1  negotiable name only
//   W4-IOT-1   negotiable name only

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::aead::{AeadCipher, OpenError, NONCE_LEN};
use super::hash;
use super::kdf::{self, KeyBundle};
use super::keys::{self, IdentityKeyPair};
use super::x25519::EphemeralKeyPair;
use super::SecureRng;
use crate::error::Result;

/// Suite identifier as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SuiteId {
    /// `W4-BASE-1`
    W4Base1,
    /// `W4-FIPS-1`
    W4Fips1,
    /// `W4-IOT-1`
    W4Iot1,
    /// Any identifier this build does not know, preserved verbatim.
    Other(String),
}

impl SuiteId {
    /// Wire name used during negotiation.
    pub fn as_str(&self) -> &str {
        match self {
            SuiteId::W4Base1 => "W4-BASE-1",
            SuiteId::W4Fips1 => "W4-FIPS-1",
            SuiteId::W4Iot1 => "W4-IOT-1",
            SuiteId::Other(s) => s.as_str(),
        }
    }

    /// Resolve from a wire name.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "W4-BASE-1" => SuiteId::W4Base1,
            "W4-FIPS-1" => SuiteId::W4Fips1,
            "W4-IOT-1" => SuiteId::W4Iot1,
            other => SuiteId::Other(other.to_string()),
        }
    }

    /// Whether this build carries an implementation for the suite.
    pub fn is_implemented(&self) -> bool {
        CryptoSuite::resolve(self).is_some()
    }
}

impl From<String> for SuiteId {
    fn from(s: String) -> Self {
        SuiteId::from_wire(&s)
    }
}

impl From<SuiteId> for String {
    fn from(id: SuiteId) -> Self {
        id.as_str().to_string()
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved, fixed bundle of primitives.
///
/// Obtained only from a negotiated [`SuiteId`]; algorithms are never
/// inferred from the shape of key or signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoSuite {
    /// X25519 + Ed25519 + ChaCha20-Poly1305 + SHA-256 + HKDF-SHA256.
    W4Base1,
}

impl CryptoSuite {
    /// Look up the implementation for a suite identifier.
    pub fn resolve(id: &SuiteId) -> Option<Self> {
        match id {
            SuiteId::W4Base1 => Some(CryptoSuite::W4Base1),
            _ => None,
        }
    }

    /// The identifier this bundle is negotiated under.
    pub fn id(self) -> SuiteId {
        match self {
            CryptoSuite::W4Base1 => SuiteId::W4Base1,
        }
    }

    pub fn generate_kex_keypair(self, rng: &mut dyn SecureRng) -> EphemeralKeyPair {
        match self {
            CryptoSuite::W4Base1 => EphemeralKeyPair::generate(rng),
        }
    }

    pub fn generate_sig_keypair(self, rng: &mut dyn SecureRng) -> IdentityKeyPair {
        match self {
            CryptoSuite::W4Base1 => IdentityKeyPair::generate_with(rng),
        }
    }

    pub fn dh(self, private: EphemeralKeyPair, peer_public: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>> {
        match self {
            CryptoSuite::W4Base1 => private.diffie_hellman(peer_public),
        }
    }

    pub fn sign(self, identity: &IdentityKeyPair, message: &[u8]) -> [u8; 64] {
        match self {
            CryptoSuite::W4Base1 => identity.sign(message),
        }
    }

    /// `false` on any forged, mismatched or undecodable input.
    pub fn verify(self, public: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
        match self {
            CryptoSuite::W4Base1 => keys::verify_signature(public, message, signature),
        }
    }

    /// Encrypt under a fresh random nonce; returns `(nonce, ciphertext)`.
    pub fn encrypt(
        self,
        rng: &mut dyn SecureRng,
        key: &[u8; 32],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
        match self {
            CryptoSuite::W4Base1 => AeadCipher::new(*key).seal(rng, plaintext, aad),
        }
    }

    pub fn decrypt(
        self,
        key: &[u8; 32],
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> std::result::Result<Vec<u8>, OpenError> {
        match self {
            CryptoSuite::W4Base1 => AeadCipher::new(*key).decrypt(nonce, ciphertext, aad),
        }
    }

    pub fn derive_keys(
        self,
        shared_secret: &[u8; 32],
        transcript_hash: &[u8; 32],
        salt: Option<&[u8]>,
    ) -> Result<KeyBundle> {
        match self {
            CryptoSuite::W4Base1 => kdf::derive_keys(shared_secret, transcript_hash, salt),
        }
    }

    pub fn transcript_hash(self, parts: &[&[u8]]) -> [u8; 32] {
        match self {
            CryptoSuite::W4Base1 => hash::transcript_hash(parts),
        }
    }
}
