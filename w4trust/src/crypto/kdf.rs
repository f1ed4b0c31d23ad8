// HKDF-SHA256 key schedule.
//
//   prk         = HKDF-Extract(salt = override | transcript_hash[..16], ikm = shared_secret)
//   send_key    = HKDF-Expand(prk, "web4-send-key"   || transcript_hash, 32)
//   recv_key    = HKDF-Expand(prk, "web4-recv-key"   || transcript_hash, 32)
//   session_id  = HKDF-Expand(prk, "web4-session-id" || transcript_hash, 32)[..16]
//   exporter    = HKDF-Expand(prk, "web4-exporter"   || transcript_hash, 32)

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, W4TrustError};

pub const INFO_SEND: &[u8] = b"web4-send-key";
pub const INFO_RECV: &[u8] = b"web4-recv-key";
pub const INFO_SESSION: &[u8] = b"web4-session-id";
pub const INFO_EXPORT: &[u8] = b"web4-exporter";

/// Salt for the provisional bundle that protects the responder's credentials.
pub const EARLY_HANDSHAKE_SALT: &[u8] = b"web4-early-handshake";

/// Four independent values derived from one shared secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyBundle {
    pub send_key: [u8; 32],
    pub recv_key: [u8; 32],
    pub session_id: [u8; 16],
    pub exporter_secret: [u8; 32],
}

/// Derive a [`KeyBundle`] from a Diffie-Hellman shared secret.
///
/// `salt` overrides the default salt (first 16 bytes of the transcript hash).
#[cfg(not(test))]
pub fn derive_keys(
    shared_secret: &[u8; 32],
    transcript_hash: &[u8; 32],
    salt: Option<&[u8]>,
) -> Result<KeyBundle> {
    derive_bundle(shared_secret, transcript_hash, salt)
}

/// Counting variant used by unit tests to observe how often key material
/// is derived.
#[cfg(test)]
pub fn derive_keys(
    shared_secret: &[u8; 32],
    transcript_hash: &[u8; 32],
    salt: Option<&[u8]>,
) -> Result<KeyBundle> {
    tests::DERIVATIONS.with(|c| c.set(c.get() + 1));
    derive_bundle(shared_secret, transcript_hash, salt)
}

fn derive_bundle(
    shared_secret: &[u8; 32],
    transcript_hash: &[u8; 32],
    salt: Option<&[u8]>,
) -> Result<KeyBundle> {
    let salt = salt.unwrap_or(&transcript_hash[..16]);
    let hk = Hkdf::<Sha256>::new(Some(salt), shared_secret);

    let expand = |label: &[u8], out: &mut [u8]| -> Result<()> {
        let mut info = Vec::with_capacity(label.len() + transcript_hash.len());
        info.extend_from_slice(label);
        info.extend_from_slice(transcript_hash);
        hk.expand(&info, out)
            .map_err(|e| W4TrustError::KeyDerivation(format!("HKDF expand error: {e}")))
    };

    let mut bundle = KeyBundle {
        send_key: [0u8; 32],
        recv_key: [0u8; 32],
        session_id: [0u8; 16],
        exporter_secret: [0u8; 32],
    };
    expand(INFO_SEND, &mut bundle.send_key)?;
    expand(INFO_RECV, &mut bundle.recv_key)?;

    let mut session_full = [0u8; 32];
    expand(INFO_SESSION, &mut session_full)?;
    bundle.session_id.copy_from_slice(&session_full[..16]);
    session_full.zeroize();

    expand(INFO_EXPORT, &mut bundle.exporter_secret)?;
    Ok(bundle)
}

/// Expand `len` bytes of keying material from an exporter secret.
pub fn export_keying_material(
    exporter_secret: &[u8; 32],
    label: &[u8],
    context: &[u8],
    len: usize,
) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::from_prk(exporter_secret)
        .map_err(|e| W4TrustError::KeyDerivation(format!("exporter prk: {e}")))?;
    let mut info = Vec::with_capacity(label.len() + context.len() + 1);
    info.extend_from_slice(label);
    info.push(0);
    info.extend_from_slice(context);
    let mut out = vec![0u8; len];
    hk.expand(&info, &mut out)
        .map_err(|e| W4TrustError::KeyDerivation(format!("exporter expand: {e}")))?;
    Ok(out)
}
