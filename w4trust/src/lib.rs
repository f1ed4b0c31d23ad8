// W4Trust: mutual-authentication handshake and secure session channel.
//
// Crate root: module declarations and public re-exports.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod session;

// Re-export key types at crate root for convenience.
pub use config::ParticipantConfig;
pub use crypto::keys::IdentityKeyPair;
pub use crypto::suite::{CryptoSuite, SuiteId};
pub use error::{Result, W4TrustError};
pub use handshake::credentials::Credentials;
pub use handshake::messages::{ClientFinished, ClientHello, ServerFinished, ServerHello, WireMessage};
pub use handshake::participant::{direct_handshake, AcceptAnyBinding, IdentityBinding, Participant, PinnedKeys};
pub use handshake::protocol::{Initiator, Responder};
pub use handshake::state::HandshakeStage;
pub use session::{SecureSession, SessionId, SessionRecord};
