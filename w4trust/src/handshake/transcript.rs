// Handshake transcript: the exact wire bytes of the Hellos, in order.

use crate::crypto::suite::CryptoSuite;
use crate::error::{Result, W4TrustError};

/// Serialized prior messages of one exchange, hashed under the negotiated suite.
///
///   early   = H(ClientHello)                            provisional keys
///   session = H(ClientHello, ServerHello)               session keys
///   auth    = H(ClientHello, ServerHello, credentials)  Finished signatures
#[derive(Debug, Clone)]
pub struct Transcript {
    suite: CryptoSuite,
    client_hello: Vec<u8>,
    server_hello: Option<Vec<u8>>,
}

impl Transcript {
    pub fn new(suite: CryptoSuite, client_hello: Vec<u8>) -> Self {
        Self {
            suite,
            client_hello,
            server_hello: None,
        }
    }

    pub fn with_server_hello(mut self, server_hello: Vec<u8>) -> Self {
        self.server_hello = Some(server_hello);
        self
    }

    pub fn suite(&self) -> CryptoSuite {
        self.suite
    }

    pub fn client_hello(&self) -> &[u8] {
        &self.client_hello
    }

    pub fn early_hash(&self) -> [u8; 32] {
        self.suite.transcript_hash(&[self.client_hello.as_slice()])
    }

    pub fn session_hash(&self) -> Result<[u8; 32]> {
        let sh = self.server_hello_bytes()?;
        Ok(self.suite.transcript_hash(&[self.client_hello.as_slice(), sh]))
    }

    pub fn auth_hash(&self, credentials: &[u8]) -> Result<[u8; 32]> {
        let sh = self.server_hello_bytes()?;
        Ok(self
            .suite
            .transcript_hash(&[self.client_hello.as_slice(), sh, credentials]))
    }

    fn server_hello_bytes(&self) -> Result<&[u8]> {
        self.server_hello
            .as_deref()
            .ok_or_else(|| W4TrustError::InvalidStateTransition {
                from: "HelloOnly".into(),
                to: "TranscriptComplete".into(),
            })
    }
}
