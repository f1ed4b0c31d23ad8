// Crypto module declarations

pub mod aead;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod suite;
pub mod x25519;

use rand::{CryptoRng, RngCore};

/// A cryptographically secure randomness source that can be injected into
/// participants (`OsRng` in production, a seeded RNG in tests).
pub trait SecureRng: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> SecureRng for T {}
