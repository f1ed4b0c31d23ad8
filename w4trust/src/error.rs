// W4Trust error types

use thiserror::Error;

/// Top-level error type for the W4Trust crate.
#[derive(Debug, Error)]
pub enum W4TrustError {
    // ── Handshake failures ──────────────────────────────────────────────
    #[error("suite negotiation failed: no mutually supported suite")]
    SuiteNegotiationFailed,

    #[error("credential decryption failed: {0}")]
    CredentialDecryptionFailed(String),

    #[error("transcript authentication failed")]
    TranscriptAuthenticationFailed,

    #[error("session id mismatch: peer announced {announced}, derived {derived}")]
    SessionIdMismatch { announced: String, derived: String },

    #[error("identity binding rejected for {0}")]
    IdentityBindingRejected(String),

    #[error("invalid handshake state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // ── Session errors ──────────────────────────────────────────────────
    #[error("message decryption failed: {0}")]
    MessageDecryptionFailed(String),

    #[error("send sequence space exhausted")]
    SequenceExhausted,

    // ── Crypto errors ───────────────────────────────────────────────────
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("AEAD encryption failed: {0}")]
    Encryption(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    // ── Wire format ─────────────────────────────────────────────────────
    #[error("canonical encoding error: {0}")]
    Codec(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

impl W4TrustError {
    /// Short stable name of the failure kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            W4TrustError::SuiteNegotiationFailed => "SuiteNegotiationFailed",
            W4TrustError::CredentialDecryptionFailed(_) => "CredentialDecryptionFailed",
            W4TrustError::TranscriptAuthenticationFailed => "TranscriptAuthenticationFailed",
            W4TrustError::SessionIdMismatch { .. } => "SessionIdMismatch",
            W4TrustError::IdentityBindingRejected(_) => "IdentityBindingRejected",
            W4TrustError::InvalidStateTransition { .. } => "InvalidStateTransition",
            W4TrustError::MessageDecryptionFailed(_) => "MessageDecryptionFailed",
            W4TrustError::SequenceExhausted => "SequenceExhausted",
            W4TrustError::InvalidKey(_) => "InvalidKey",
            W4TrustError::Encryption(_) => "Encryption",
            W4TrustError::KeyDerivation(_) => "KeyDerivation",
            W4TrustError::Codec(_) => "Codec",
            W4TrustError::MalformedMessage(_) => "MalformedMessage",
        }
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, W4TrustError>;
