// Application record: one encrypted message on an established session.
//
//   {"session_id": <hex>, "seq": <n>, "type": <kind>, "nonce": <hex>, "ciphertext": <hex>}
//
// The AEAD associated data binds {session id, seq, kind}:
//   {"session": <hex>, "seq": <n>, "type": <kind>}

use serde::{Deserialize, Serialize};

use super::SessionId;
use crate::codec::{from_wire_bytes, hex_bytes, to_canonical_vec};
use crate::crypto::aead::NONCE_LEN;
use crate::error::Result;

/// An encrypted application message as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub seq: u64,
    /// Caller-chosen message kind, e.g. "request", "response", "event".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "hex_bytes")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
}

impl SessionRecord {
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        to_canonical_vec(self)
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        from_wire_bytes(bytes)
    }
}

#[derive(Serialize)]
struct RecordAad<'a> {
    session: SessionId,
    seq: u64,
    #[serde(rename = "type")]
    kind: &'a str,
}

/// Associated data authenticated alongside every record.
pub(crate) fn record_aad(session_id: SessionId, seq: u64, kind: &str) -> Result<Vec<u8>> {
    to_canonical_vec(&RecordAad {
        session: session_id,
        seq,
        kind,
    })
}
