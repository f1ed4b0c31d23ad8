// ChaCha20-Poly1305 AEAD encrypt / decrypt (RFC 8439).

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::SecureRng;
use crate::error::{Result, W4TrustError};

/// Length of a ChaCha20-Poly1305 nonce.
pub const NONCE_LEN: usize = 12;

/// AEAD failure while opening a ciphertext.
///
/// Carries no detail; callers map it to a credential or message failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenError;

/// ChaCha20-Poly1305 authenticated encryption with associated data.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadCipher {
    key: [u8; 32],
}

impl AeadCipher {
    /// Create a new AEAD cipher from a 32-byte key.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` under a fresh random nonce drawn from `rng`.
    ///
    /// Returns `(nonce, ciphertext || 16-byte Poly1305 tag)`.
    pub fn seal(
        &self,
        rng: &mut dyn SecureRng,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        let ct = self.encrypt(&nonce, plaintext, aad)?;
        Ok((nonce, ct))
    }

    /// Encrypt `plaintext` with the given 12-byte `nonce` and associated data `aad`.
    pub fn encrypt(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| W4TrustError::Encryption(format!("cipher init: {e}")))?;
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload { msg: plaintext, aad };
        cipher
            .encrypt(nonce, payload)
            .map_err(|e| W4TrustError::Encryption(format!("{e}")))
    }

    /// Decrypt `ciphertext` (which includes the appended 16-byte tag) with the given
    /// 12-byte `nonce` and the same `aad` used during encryption.
    pub fn decrypt(
        &self,
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> std::result::Result<Vec<u8>, OpenError> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key).map_err(|_| OpenError)?;
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        cipher.decrypt(nonce, payload).map_err(|_| OpenError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn roundtrip_with_aad() {
        let cipher = AeadCipher::new([0x99u8; 32]);
        let (nonce, ct) = cipher.seal(&mut OsRng, b"hello web4", b"aad").unwrap();
        let pt = cipher.decrypt(&nonce, &ct, b"aad").unwrap();
        assert_eq!(pt, b"hello web4");
    }

    #[test]
    fn seal_draws_fresh_nonces() {
        let cipher = AeadCipher::new([0x01u8; 32]);
        let (n1, c1) = cipher.seal(&mut OsRng, b"same", b"").unwrap();
        let (n2, c2) = cipher.seal(&mut OsRng, b"same", b"").unwrap();
        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
    }

    #[test]
    fn wrong_aad_fails() {
        let cipher = AeadCipher::new([0xAAu8; 32]);
        let (nonce, ct) = cipher.seal(&mut OsRng, b"data", b"good aad").unwrap();
        assert_eq!(cipher.decrypt(&nonce, &ct, b"bad aad"), Err(OpenError));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = AeadCipher::new([0xBBu8; 32]);
        let (nonce, mut ct) = cipher.seal(&mut OsRng, b"data", b"").unwrap();
        ct[0] ^= 0xFF; // flip a byte
        assert!(cipher.decrypt(&nonce, &ct, b"").is_err());
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let cipher = AeadCipher::new([0xCCu8; 32]);
        let (nonce, ct) = cipher.seal(&mut OsRng, b"data", b"").unwrap();
        assert!(cipher.decrypt(&nonce, &ct[..8], b"").is_err());
    }
}
