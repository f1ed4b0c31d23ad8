// Ed25519 identity keypairs: generation, signing, verification.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::SecureRng;

/// A long-lived Ed25519 identity keypair.
///
/// Owned by one participant for its whole lifetime; never regenerated per
/// handshake.
pub struct IdentityKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl IdentityKeyPair {
    /// Generate a fresh random Ed25519 keypair from the OS RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a keypair from an injected RNG.
    pub fn generate_with(rng: &mut dyn SecureRng) -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(seed.as_mut());
        Self::from_seed(&seed)
    }

    /// Reconstruct from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// The 32-byte Ed25519 public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Sign arbitrary data.
    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        let sig: Signature = self.signing_key.sign(data);
        sig.to_bytes()
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, data: &[u8], signature: &[u8; 64]) -> bool {
        verify_signature(&self.public_key_bytes(), data, signature)
    }
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Verify a signature given raw public key bytes, message, and signature bytes.
///
/// A forged signature or an undecodable public key is an ordinary `false`.
pub fn verify_signature(pubkey_bytes: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(pubkey_bytes) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    vk.verify_strict(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sign_verify() {
        let kp = IdentityKeyPair::generate();
        let msg = b"web4 test message";
        let sig = kp.sign(msg);
        assert!(kp.verify(msg, &sig));
        assert!(!kp.verify(b"wrong", &sig));
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = IdentityKeyPair::generate_with(&mut StdRng::seed_from_u64(7));
        let b = IdentityKeyPair::generate_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn test_garbage_pubkey_is_false_not_error() {
        let kp = IdentityKeyPair::generate();
        let sig = kp.sign(b"msg");
        // Non-canonical encoding, not the signer.
        let bogus = [0xFFu8; 32];
        assert!(!verify_signature(&bogus, b"msg", &sig));
    }
}
