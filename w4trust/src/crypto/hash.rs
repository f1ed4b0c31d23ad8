// SHA-256 transcript hashing.

use sha2::{Digest, Sha256};

/// Hash an ordered sequence of protocol messages.
///
/// Each part is framed as `len (u64 big-endian) || bytes`, so the parts
/// `["A", "B"]` and `["AB"]` never collide.
pub fn transcript_hash(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}
