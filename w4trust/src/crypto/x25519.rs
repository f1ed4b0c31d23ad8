// X25519 ephemeral Diffie-Hellman for the handshake key exchange.

use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

use super::SecureRng;
use crate::error::{Result, W4TrustError};

/// An X25519 keypair that lives for exactly one handshake.
///
/// `diffie_hellman` consumes the keypair, so the private half cannot be
/// reused after the shared secret is derived; it is zeroized on drop.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new random ephemeral keypair.
    pub fn generate(rng: &mut dyn SecureRng) -> Self {
        let secret = EphemeralSecret::random_from_rng(&mut *rng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The 32-byte public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Perform Diffie-Hellman with a peer's public key, returning the 32-byte
    /// shared secret.
    ///
    /// Low-order peer keys yield an all-zero output; those are rejected.
    pub fn diffie_hellman(self, peer_public: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>> {
        let peer_pk = PublicKey::from(*peer_public);
        let shared = self.secret.diffie_hellman(&peer_pk);
        if !shared.was_contributory() {
            return Err(W4TrustError::InvalidKey(
                "non-contributory X25519 peer key".into(),
            ));
        }
        Ok(Zeroizing::new(shared.to_bytes()))
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}
