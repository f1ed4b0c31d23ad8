// Secure session: the post-handshake encrypted channel.

pub mod record;
pub mod replay;

use std::fmt;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::codec::hex_bytes;
use crate::crypto::kdf::{self, KeyBundle};
use crate::crypto::suite::{CryptoSuite, SuiteId};
use crate::crypto::SecureRng;
use crate::error::{Result, W4TrustError};
use crate::handshake::credentials::Credentials;

pub use record::SessionRecord;
pub use replay::ReplayGuard;

/// 16-byte session identifier derived from the handshake key schedule.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(#[serde(with = "hex_bytes")] [u8; 16]);

impl SessionId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({self})")
    }
}

struct SendHalf {
    key: Zeroizing<[u8; 32]>,
    counter: u64,
    rng: StdRng,
}

struct RecvHalf {
    key: Zeroizing<[u8; 32]>,
    counter: u64,
    guard: ReplayGuard,
}

/// Everything the handshake hands over when a session is established.
pub(crate) struct SessionParams {
    pub local_w4id: String,
    pub remote_w4id: String,
    pub suite: CryptoSuite,
    pub established_at: u64,
    pub extensions: Vec<String>,
    pub peer_credentials: Credentials,
}

/// An established session.
///
/// The send half and the receive half are locked independently: one sender
/// path and one receiver path may use a shared session concurrently, while
/// each direction's counter is only ever advanced by one caller at a time.
pub struct SecureSession {
    id: SessionId,
    local_w4id: String,
    remote_w4id: String,
    suite: CryptoSuite,
    established_at: u64,
    extensions: Vec<String>,
    peer_credentials: Credentials,
    exporter_secret: Zeroizing<[u8; 32]>,
    send: Mutex<SendHalf>,
    recv: Mutex<RecvHalf>,
}

impl SecureSession {
    /// Build a session from a key bundle. `swap` exchanges the bundle's
    /// send/receive labels (the responder side does this exactly once).
    pub(crate) fn establish(
        keys: &KeyBundle,
        swap: bool,
        params: SessionParams,
        rng: &mut dyn SecureRng,
    ) -> Self {
        let (send_key, recv_key) = if swap {
            (keys.recv_key, keys.send_key)
        } else {
            (keys.send_key, keys.recv_key)
        };
        let mut seed = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(seed.as_mut());

        Self {
            id: SessionId(keys.session_id),
            local_w4id: params.local_w4id,
            remote_w4id: params.remote_w4id,
            suite: params.suite,
            established_at: params.established_at,
            extensions: params.extensions,
            peer_credentials: params.peer_credentials,
            exporter_secret: Zeroizing::new(keys.exporter_secret),
            send: Mutex::new(SendHalf {
                key: Zeroizing::new(send_key),
                counter: 0,
                rng: StdRng::from_seed(*seed),
            }),
            recv: Mutex::new(RecvHalf {
                key: Zeroizing::new(recv_key),
                counter: 0,
                guard: ReplayGuard::new(),
            }),
        }
    }

    /// Encrypt an application message of the given kind.
    ///
    /// Every call consumes one send sequence number.
    pub fn encrypt(&self, plaintext: &[u8], kind: &str) -> Result<SessionRecord> {
        let mut guard = self.send.lock();
        let SendHalf { key, counter, rng } = &mut *guard;

        let seq = *counter;
        if seq == u64::MAX {
            return Err(W4TrustError::SequenceExhausted);
        }
        let aad = record::record_aad(self.id, seq, kind)?;
        let (nonce, ciphertext) = self.suite.encrypt(rng, key, plaintext, &aad)?;
        *counter += 1;

        Ok(SessionRecord {
            session_id: self.id,
            seq,
            kind: kind.to_string(),
            nonce,
            ciphertext,
        })
    }

    /// Authenticate and decrypt a record from the peer.
    ///
    /// Fails with `MessageDecryptionFailed` for a foreign session id, a
    /// replayed or regressed sequence number, or any AEAD failure.
    pub fn decrypt(&self, record: &SessionRecord) -> Result<Vec<u8>> {
        if record.session_id != self.id {
            tracing::warn!(session = %self.id, foreign = %record.session_id, "record for another session");
            return Err(W4TrustError::MessageDecryptionFailed(format!(
                "record addressed to session {}",
                record.session_id
            )));
        }

        let mut recv = self.recv.lock();
        if !recv.guard.check(record.seq) {
            tracing::warn!(session = %self.id, seq = record.seq, "replayed or regressed record");
            return Err(W4TrustError::MessageDecryptionFailed(format!(
                "sequence {} not after highest accepted {:?}",
                record.seq,
                recv.guard.highest()
            )));
        }

        let aad = record::record_aad(record.session_id, record.seq, &record.kind)?;
        let plaintext = self
            .suite
            .decrypt(&recv.key, &record.nonce, &record.ciphertext, &aad)
            .map_err(|_| {
                tracing::warn!(session = %self.id, seq = record.seq, "record failed authentication");
                W4TrustError::MessageDecryptionFailed("authentication tag mismatch".into())
            })?;

        recv.guard.accept(record.seq);
        recv.counter += 1;
        Ok(plaintext)
    }

    /// Derive further protocol-bound keying material without re-handshaking.
    pub fn export_keying_material(&self, label: &[u8], context: &[u8], len: usize) -> Result<Vec<u8>> {
        kdf::export_keying_material(&self.exporter_secret, label, context, len)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn local_w4id(&self) -> &str {
        &self.local_w4id
    }

    pub fn remote_w4id(&self) -> &str {
        &self.remote_w4id
    }

    pub fn suite(&self) -> SuiteId {
        self.suite.id()
    }

    /// Unix seconds at which the handshake completed.
    pub fn established_at(&self) -> u64 {
        self.established_at
    }

    /// Extensions both sides agreed on.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Credentials the peer declared (decrypted during the handshake).
    pub fn peer_credentials(&self) -> &Credentials {
        &self.peer_credentials
    }

    pub fn send_key(&self) -> [u8; 32] {
        *self.send.lock().key
    }

    pub fn recv_key(&self) -> [u8; 32] {
        *self.recv.lock().key
    }

    pub fn send_counter(&self) -> u64 {
        self.send.lock().counter
    }

    pub fn recv_counter(&self) -> u64 {
        self.recv.lock().counter
    }
}

impl fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureSession")
            .field("id", &self.id)
            .field("local_w4id", &self.local_w4id)
            .field("remote_w4id", &self.remote_w4id)
            .field("suite", &self.suite)
            .field("established_at", &self.established_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn bundle(seed: u8) -> KeyBundle {
        KeyBundle {
            send_key: [seed; 32],
            recv_key: [seed.wrapping_add(1); 32],
            session_id: [seed; 16],
            exporter_secret: [seed.wrapping_add(2); 32],
        }
    }

    fn params(local: &str, remote: &str) -> SessionParams {
        SessionParams {
            local_w4id: local.into(),
            remote_w4id: remote.into(),
            suite: CryptoSuite::W4Base1,
            established_at: 1_700_000_000,
            extensions: vec![],
            peer_credentials: Credentials::for_w4id(remote),
        }
    }

    fn pair(seed: u8) -> (SecureSession, SecureSession) {
        let keys = bundle(seed);
        let a = SecureSession::establish(&keys, false, params("a", "b"), &mut OsRng);
        let b = SecureSession::establish(&keys, true, params("b", "a"), &mut OsRng);
        (a, b)
    }

    #[test]
    fn swap_mirrors_keys() {
        let (a, b) = pair(1);
        assert_eq!(a.send_key(), b.recv_key());
        assert_eq!(a.recv_key(), b.send_key());
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn both_directions_roundtrip() {
        let (a, b) = pair(2);
        let rec = a.encrypt(b"ping", "request").unwrap();
        assert_eq!(b.decrypt(&rec).unwrap(), b"ping");
        let rec = b.encrypt(b"pong", "response").unwrap();
        assert_eq!(a.decrypt(&rec).unwrap(), b"pong");
    }

    #[test]
    fn counters_advance() {
        let (a, b) = pair(3);
        for i in 0..5u64 {
            let rec = a.encrypt(format!("msg-{i}").as_bytes(), "event").unwrap();
            assert_eq!(rec.seq, i);
            b.decrypt(&rec).unwrap();
        }
        assert_eq!(a.send_counter(), 5);
        assert_eq!(b.recv_counter(), 5);
        assert_eq!(a.recv_counter(), 0);
    }

    #[test]
    fn replayed_record_rejected() {
        let (a, b) = pair(4);
        let first = a.encrypt(b"one", "event").unwrap();
        let second = a.encrypt(b"two", "event").unwrap();
        b.decrypt(&first).unwrap();
        b.decrypt(&second).unwrap();
        assert!(matches!(
            b.decrypt(&first),
            Err(W4TrustError::MessageDecryptionFailed(_))
        ));
        assert!(matches!(
            b.decrypt(&second),
            Err(W4TrustError::MessageDecryptionFailed(_))
        ));
        assert_eq!(b.recv_counter(), 2);
    }

    #[test]
    fn forged_high_sequence_does_not_advance_guard() {
        let (a, b) = pair(5);
        let mut forged = a.encrypt(b"x", "event").unwrap();
        forged.seq = 1_000;
        assert!(b.decrypt(&forged).is_err());
        // Rejected record must not raise the replay floor.
        let genuine = a.encrypt(b"y", "event").unwrap();
        assert_eq!(genuine.seq, 1);
        assert_eq!(b.decrypt(&genuine).unwrap(), b"y");
    }

    #[test]
    fn relabeled_kind_fails() {
        let (a, b) = pair(6);
        let mut rec = a.encrypt(b"data", "request").unwrap();
        rec.kind = "response".into();
        assert!(b.decrypt(&rec).is_err());
    }

    #[test]
    fn exporter_matches_on_both_sides() {
        let (a, b) = pair(7);
        let ka = a.export_keying_material(b"app-key", b"ctx", 32).unwrap();
        let kb = b.export_keying_material(b"app-key", b"ctx", 32).unwrap();
        assert_eq!(ka, kb);
        assert_ne!(ka, a.export_keying_material(b"other", b"ctx", 32).unwrap());
    }
}
