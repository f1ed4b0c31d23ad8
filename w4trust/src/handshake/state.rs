// Handshake state machine.
//
//   Initiator:  Init -> SentHello -> (KeyMaterialDerived) -> FinishedSent -> SessionEstablished
//   Responder:  Init -> HelloReceived -> (KeyMaterialDerived, FinishedSent) -> SessionEstablished
//
// Parenthesized stages are passed through within one step and are never stored.
//
// Any failure lands in Aborted, which is terminal and holds no key material.

use std::fmt;

use zeroize::Zeroizing;

use crate::crypto::kdf::KeyBundle;
use crate::crypto::x25519::EphemeralKeyPair;
use crate::handshake::credentials::Credentials;
use crate::handshake::transcript::Transcript;
use crate::session::SessionId;

/// Stage of a handshake driver.
///
/// Every variant names a protocol stage, but not every one is a resting
/// point. `KeyMaterialDerived` is entered and left inside a single step, so
/// it shows up in debug logs only and `stage()` never returns it. The
/// responder sends its Finished in the same step that establishes the
/// session, so it goes from `HelloReceived` straight to
/// `SessionEstablished` and never reports `FinishedSent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Init,
    SentHello,
    HelloReceived,
    KeyMaterialDerived,
    FinishedSent,
    SessionEstablished,
    Aborted,
}

impl HandshakeStage {
    /// Human-readable label for the stage (used in errors and logs).
    pub fn label(self) -> &'static str {
        match self {
            HandshakeStage::Init => "Init",
            HandshakeStage::SentHello => "SentHello",
            HandshakeStage::HelloReceived => "HelloReceived",
            HandshakeStage::KeyMaterialDerived => "KeyMaterialDerived",
            HandshakeStage::FinishedSent => "FinishedSent",
            HandshakeStage::SessionEstablished => "SessionEstablished",
            HandshakeStage::Aborted => "Aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeStage::SessionEstablished | HandshakeStage::Aborted)
    }
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the responder learned from the Hellos and must carry to its Finished.
pub(crate) struct PeerHello {
    pub w4id: String,
    pub identity_key: [u8; 32],
    pub extensions: Vec<String>,
}

/// Initiator-side state. Secrets live only inside the variant that needs them.
pub(crate) enum InitiatorState {
    Init,

    /// ClientHello sent; holding the ephemeral secret for the DH.
    SentHello {
        ephemeral: EphemeralKeyPair,
        /// Exact wire bytes of the ClientHello we sent.
        client_hello: Vec<u8>,
    },

    /// ClientFinished sent; waiting for the responder's signature.
    FinishedSent {
        transcript: Transcript,
        keys: KeyBundle,
        /// Our plaintext credential bytes, bound into both signatures.
        credentials: Vec<u8>,
        peer: PeerHello,
        peer_credentials: Credentials,
    },

    SessionEstablished(SessionId),
    Aborted,
}

impl InitiatorState {
    pub fn stage(&self) -> HandshakeStage {
        match self {
            InitiatorState::Init => HandshakeStage::Init,
            InitiatorState::SentHello { .. } => HandshakeStage::SentHello,
            InitiatorState::FinishedSent { .. } => HandshakeStage::FinishedSent,
            InitiatorState::SessionEstablished(_) => HandshakeStage::SessionEstablished,
            InitiatorState::Aborted => HandshakeStage::Aborted,
        }
    }
}

/// Responder-side state.
pub(crate) enum ResponderState {
    Init,

    /// ServerHello sent; holding the shared secret until ClientFinished arrives.
    HelloReceived {
        transcript: Transcript,
        shared_secret: Zeroizing<[u8; 32]>,
        peer: PeerHello,
    },

    SessionEstablished(SessionId),
    Aborted,
}

impl ResponderState {
    pub fn stage(&self) -> HandshakeStage {
        match self {
            ResponderState::Init => HandshakeStage::Init,
            ResponderState::HelloReceived { .. } => HandshakeStage::HelloReceived,
            ResponderState::SessionEstablished(_) => HandshakeStage::SessionEstablished,
            ResponderState::Aborted => HandshakeStage::Aborted,
        }
    }
}
