// Handshake messages exchanged during the W4 4-message protocol.
//
//   Initiator                         Responder
//     |--- ClientHello ------------->|
//     |<-- ServerHello --------------|   (responder creds under provisional key)
//     |--- ClientFinished ---------->|   (initiator creds + transcript signature)
//     |<-- ServerFinished -----------|   (transcript signature + session id)
//
// Every message is immutable once built and has exactly one canonical
// encoding (see `codec`), which is what transcripts and signatures cover.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::{from_wire_bytes, hex_bytes, to_canonical_vec};
use crate::crypto::aead::NONCE_LEN;
use crate::crypto::keys::IdentityKeyPair;
use crate::crypto::suite::SuiteId;
use crate::error::{Result, W4TrustError};
use crate::handshake::transcript::Transcript;
use crate::session::SessionId;

/// Size of the random nonce carried in each Hello.
pub const HELLO_NONCE_LEN: usize = 32;

/// The `type` tag of a handshake message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    ClientHello,
    ServerHello,
    ClientFinished,
    ServerFinished,
}

/// Canonical wire encoding shared by all four messages.
pub trait WireMessage: Serialize + DeserializeOwned {
    const TYPE: MessageType;

    /// The `type` tag this value carries.
    fn message_type(&self) -> MessageType;

    /// Canonical bytes; identical logical content always yields identical bytes.
    fn to_wire(&self) -> Result<Vec<u8>> {
        to_canonical_vec(self)
    }

    /// Parse wire bytes, rejecting a message of the wrong type.
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        let msg: Self = from_wire_bytes(bytes)?;
        if msg.message_type() != Self::TYPE {
            return Err(W4TrustError::MalformedMessage(format!(
                "expected {:?}, got {:?}",
                Self::TYPE,
                msg.message_type()
            )));
        }
        Ok(msg)
    }
}

macro_rules! wire_message {
    ($ty:ident) => {
        impl WireMessage for $ty {
            const TYPE: MessageType = MessageType::$ty;

            fn message_type(&self) -> MessageType {
                self.kind
            }
        }
    };
}

// ── ClientHello ──────────────────────────────────────────────────────────

/// Message 1: Initiator -> Responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHello {
    #[serde(rename = "type")]
    kind: MessageType,
    /// Offered suites, in the initiator's order of preference.
    suites: Vec<SuiteId>,
    /// Initiator's Ed25519 identity key.
    #[serde(with = "hex_bytes")]
    pub_key: [u8; 32],
    /// Initiator's ephemeral X25519 key.
    #[serde(with = "hex_bytes")]
    kex_pub: [u8; 32],
    w4id: String,
    #[serde(with = "hex_bytes")]
    nonce: [u8; HELLO_NONCE_LEN],
    ext: Vec<String>,
    grease: Vec<String>,
}

wire_message!(ClientHello);

impl ClientHello {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        suites: Vec<SuiteId>,
        identity_key: [u8; 32],
        kex_public: [u8; 32],
        w4id: impl Into<String>,
        nonce: [u8; HELLO_NONCE_LEN],
        extensions: Vec<String>,
        grease: Vec<String>,
    ) -> Self {
        Self {
            kind: MessageType::ClientHello,
            suites,
            pub_key: identity_key,
            kex_pub: kex_public,
            w4id: w4id.into(),
            nonce,
            ext: extensions,
            grease,
        }
    }

    pub fn suites(&self) -> &[SuiteId] {
        &self.suites
    }

    pub fn identity_key(&self) -> &[u8; 32] {
        &self.pub_key
    }

    pub fn kex_public(&self) -> &[u8; 32] {
        &self.kex_pub
    }

    pub fn w4id(&self) -> &str {
        &self.w4id
    }

    pub fn nonce(&self) -> &[u8; HELLO_NONCE_LEN] {
        &self.nonce
    }

    pub fn extensions(&self) -> &[String] {
        &self.ext
    }

    pub fn grease(&self) -> &[String] {
        &self.grease
    }
}

// ── ServerHello ──────────────────────────────────────────────────────────

/// Message 2: Responder -> Initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHello {
    #[serde(rename = "type")]
    kind: MessageType,
    suite: SuiteId,
    #[serde(with = "hex_bytes")]
    pub_key: [u8; 32],
    #[serde(with = "hex_bytes")]
    kex_pub: [u8; 32],
    w4id: String,
    #[serde(with = "hex_bytes")]
    nonce: [u8; HELLO_NONCE_LEN],
    /// Responder credentials sealed under the provisional send key.
    #[serde(with = "hex_bytes")]
    enc_creds: Vec<u8>,
    #[serde(with = "hex_bytes")]
    creds_nonce: [u8; NONCE_LEN],
    /// Acknowledged subset of the initiator's extensions.
    ext: Vec<String>,
}

wire_message!(ServerHello);

impl ServerHello {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        suite: SuiteId,
        identity_key: [u8; 32],
        kex_public: [u8; 32],
        w4id: impl Into<String>,
        nonce: [u8; HELLO_NONCE_LEN],
        encrypted_credentials: Vec<u8>,
        credentials_nonce: [u8; NONCE_LEN],
        extensions: Vec<String>,
    ) -> Self {
        Self {
            kind: MessageType::ServerHello,
            suite,
            pub_key: identity_key,
            kex_pub: kex_public,
            w4id: w4id.into(),
            nonce,
            enc_creds: encrypted_credentials,
            creds_nonce: credentials_nonce,
            ext: extensions,
        }
    }

    pub fn suite(&self) -> &SuiteId {
        &self.suite
    }

    pub fn identity_key(&self) -> &[u8; 32] {
        &self.pub_key
    }

    pub fn kex_public(&self) -> &[u8; 32] {
        &self.kex_pub
    }

    pub fn w4id(&self) -> &str {
        &self.w4id
    }

    pub fn nonce(&self) -> &[u8; HELLO_NONCE_LEN] {
        &self.nonce
    }

    pub fn encrypted_credentials(&self) -> &[u8] {
        &self.enc_creds
    }

    pub fn credentials_nonce(&self) -> &[u8; NONCE_LEN] {
        &self.creds_nonce
    }

    pub fn extensions(&self) -> &[String] {
        &self.ext
    }
}

// ── ClientFinished ───────────────────────────────────────────────────────

/// Message 3: Initiator -> Responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFinished {
    #[serde(rename = "type")]
    kind: MessageType,
    /// Initiator credentials sealed under the session send key.
    #[serde(with = "hex_bytes")]
    enc_creds: Vec<u8>,
    #[serde(with = "hex_bytes")]
    creds_nonce: [u8; NONCE_LEN],
    /// Ed25519 signature over the authentication transcript.
    #[serde(with = "hex_bytes")]
    mac: [u8; 64],
}

wire_message!(ClientFinished);

impl ClientFinished {
    /// Build the message, signing `H(ClientHello, ServerHello, credentials)`
    /// with the initiator's identity key.
    pub fn sign(
        transcript: &Transcript,
        identity: &IdentityKeyPair,
        plaintext_credentials: &[u8],
        encrypted_credentials: Vec<u8>,
        credentials_nonce: [u8; NONCE_LEN],
    ) -> Result<Self> {
        let auth = transcript.auth_hash(plaintext_credentials)?;
        Ok(Self {
            kind: MessageType::ClientFinished,
            enc_creds: encrypted_credentials,
            creds_nonce: credentials_nonce,
            mac: transcript.suite().sign(identity, &auth),
        })
    }

    /// Check the signature against the identity key the initiator declared
    /// in its Hello.
    pub fn verify(
        &self,
        transcript: &Transcript,
        initiator_key: &[u8; 32],
        plaintext_credentials: &[u8],
    ) -> Result<bool> {
        let auth = transcript.auth_hash(plaintext_credentials)?;
        Ok(transcript.suite().verify(initiator_key, &auth, &self.mac))
    }

    pub fn encrypted_credentials(&self) -> &[u8] {
        &self.enc_creds
    }

    pub fn credentials_nonce(&self) -> &[u8; NONCE_LEN] {
        &self.creds_nonce
    }

    pub fn mac(&self) -> &[u8; 64] {
        &self.mac
    }
}

// ── ServerFinished ───────────────────────────────────────────────────────

/// Message 4: Responder -> Initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFinished {
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(with = "hex_bytes")]
    mac: [u8; 64],
    session_id: SessionId,
}

wire_message!(ServerFinished);

impl ServerFinished {
    /// Build the message, signing the same authentication transcript the
    /// initiator signed (both Hellos plus the initiator's credentials).
    pub fn sign(
        transcript: &Transcript,
        identity: &IdentityKeyPair,
        initiator_credentials: &[u8],
        session_id: SessionId,
    ) -> Result<Self> {
        let auth = transcript.auth_hash(initiator_credentials)?;
        Ok(Self {
            kind: MessageType::ServerFinished,
            mac: transcript.suite().sign(identity, &auth),
            session_id,
        })
    }

    pub fn verify(
        &self,
        transcript: &Transcript,
        responder_key: &[u8; 32],
        initiator_credentials: &[u8],
    ) -> Result<bool> {
        let auth = transcript.auth_hash(initiator_credentials)?;
        Ok(transcript.suite().verify(responder_key, &auth, &self.mac))
    }

    pub fn mac(&self) -> &[u8; 64] {
        &self.mac
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}
