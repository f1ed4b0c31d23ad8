// W4 handshake drivers: one Initiator or Responder per connection attempt.
//
//   Initiator                                   Responder
//     client_hello()            --- CH --->     process_client_hello()
//     process_server_hello()    <-- SH ----     (provisional keys, sealed creds)
//                               --- CF --->     process_client_finished()
//     process_server_finished() <-- SF ----     (session established, keys swapped)
//
// Provisional bundle: derive(dh, H(CH), salt = "web4-early-handshake")
// Session bundle:     derive(dh, H(CH, SH))

use std::sync::Arc;

use rand::RngCore;

use crate::crypto::kdf::EARLY_HANDSHAKE_SALT;
use crate::crypto::suite::CryptoSuite;
use crate::crypto::x25519::EphemeralKeyPair;
use crate::crypto::SecureRng;
use crate::error::{Result, W4TrustError};
use crate::handshake::credentials::Credentials;
use crate::handshake::messages::{
    ClientFinished, ClientHello, ServerFinished, ServerHello, WireMessage, HELLO_NONCE_LEN,
};
use crate::handshake::participant::Participant;
use crate::handshake::state::{HandshakeStage, InitiatorState, PeerHello, ResponderState};
use crate::handshake::transcript::Transcript;
use crate::session::{SecureSession, SessionId, SessionParams};

fn invalid_transition(from: HandshakeStage, to: HandshakeStage) -> W4TrustError {
    W4TrustError::InvalidStateTransition {
        from: from.label().into(),
        to: to.label().into(),
    }
}

/// A random extension name no conformant peer recognizes.
fn grease_name(rng: &mut dyn SecureRng) -> String {
    let mut tag = [0u8; 4];
    rng.fill_bytes(&mut tag);
    format!("w4_ext_{}@0", hex::encode(tag))
}

fn random_nonce(rng: &mut dyn SecureRng) -> [u8; HELLO_NONCE_LEN] {
    let mut nonce = [0u8; HELLO_NONCE_LEN];
    rng.fill_bytes(&mut nonce);
    nonce
}

fn log_abort(role: &'static str, from: HandshakeStage, err: &W4TrustError) {
    tracing::warn!(role, stage = from.label(), kind = err.kind(), error = %err, "handshake aborted");
}

// ── Initiator ────────────────────────────────────────────────────────────

/// Client side of one handshake attempt.
pub struct Initiator<'a> {
    participant: &'a Participant,
    state: InitiatorState,
}

impl<'a> Initiator<'a> {
    pub(crate) fn new(participant: &'a Participant) -> Self {
        Self {
            participant,
            state: InitiatorState::Init,
        }
    }

    pub fn stage(&self) -> HandshakeStage {
        self.state.stage()
    }

    /// Step 1: generate a fresh ephemeral key and build the ClientHello.
    ///
    /// The key-exchange key is generated for the first implemented suite in
    /// the configured list; a participant with none cannot initiate.
    pub fn client_hello(&mut self) -> Result<ClientHello> {
        if !matches!(self.state, InitiatorState::Init) {
            return Err(invalid_transition(self.stage(), HandshakeStage::SentHello));
        }

        match self.build_hello() {
            Ok((state, hello)) => {
                self.state = state;
                tracing::debug!(
                    w4id = %hello.w4id(),
                    suites = hello.suites().len(),
                    grease = hello.grease().len(),
                    "initiator: ClientHello built"
                );
                Ok(hello)
            }
            Err(e) => {
                log_abort("initiator", HandshakeStage::Init, &e);
                self.state = InitiatorState::Aborted;
                Err(e)
            }
        }
    }

    fn build_hello(&self) -> Result<(InitiatorState, ClientHello)> {
        let config = self.participant.config();
        let suite = config
            .suites
            .iter()
            .find_map(CryptoSuite::resolve)
            .ok_or(W4TrustError::SuiteNegotiationFailed)?;

        let (ephemeral, nonce, grease) = self.participant.using_rng(|rng| {
            let ephemeral = suite.generate_kex_keypair(rng);
            let nonce = random_nonce(rng);
            let grease: Vec<String> = (0..config.grease_count.max(1))
                .map(|_| grease_name(rng))
                .collect();
            (ephemeral, nonce, grease)
        });

        let hello = ClientHello::new(
            config.suites.clone(),
            self.participant.public_key(),
            ephemeral.public_key_bytes(),
            config.w4id.clone(),
            nonce,
            config.extensions.clone(),
            grease,
        );
        let client_hello = hello.to_wire()?;
        Ok((
            InitiatorState::SentHello {
                ephemeral,
                client_hello,
            },
            hello,
        ))
    }

    /// Step 3: consume the ServerHello, open the responder's credentials and
    /// answer with a signed ClientFinished.
    pub fn process_server_hello(&mut self, hello: &ServerHello) -> Result<ClientFinished> {
        let (ephemeral, client_hello) =
            match std::mem::replace(&mut self.state, InitiatorState::Aborted) {
                InitiatorState::SentHello {
                    ephemeral,
                    client_hello,
                } => (ephemeral, client_hello),
                other => {
                    let from = other.stage();
                    self.state = other;
                    return Err(invalid_transition(from, HandshakeStage::FinishedSent));
                }
            };

        match self.answer_hello(ephemeral, client_hello, hello) {
            Ok((state, finished)) => {
                self.state = state;
                tracing::debug!(peer = %hello.w4id(), suite = %hello.suite(), "initiator: ClientFinished sent");
                Ok(finished)
            }
            Err(e) => {
                log_abort("initiator", HandshakeStage::SentHello, &e);
                Err(e)
            }
        }
    }

    fn answer_hello(
        &self,
        ephemeral: EphemeralKeyPair,
        client_hello: Vec<u8>,
        hello: &ServerHello,
    ) -> Result<(InitiatorState, ClientFinished)> {
        let config = self.participant.config();
        let selected = hello.suite();
        if !config.is_usable(selected) {
            return Err(W4TrustError::SuiteNegotiationFailed);
        }
        let suite = CryptoSuite::resolve(selected).ok_or(W4TrustError::SuiteNegotiationFailed)?;

        let transcript = Transcript::new(suite, client_hello).with_server_hello(hello.to_wire()?);
        let shared = suite.dh(ephemeral, hello.kex_public())?;

        let early = suite.derive_keys(&shared, &transcript.early_hash(), Some(EARLY_HANDSHAKE_SALT))?;
        let peer_plaintext = suite
            .decrypt(
                &early.send_key,
                hello.credentials_nonce(),
                hello.encrypted_credentials(),
                b"",
            )
            .map_err(|_| W4TrustError::CredentialDecryptionFailed("responder credentials".into()))?;
        drop(early);
        let peer_credentials = Credentials::from_bytes(&peer_plaintext)?;

        let keys = suite.derive_keys(&shared, &transcript.session_hash()?, None)?;
        tracing::debug!(stage = HandshakeStage::KeyMaterialDerived.label(), "initiator: session keys derived");

        let credentials = config.declared_credentials().to_bytes()?;
        let (creds_nonce, enc_creds) = self
            .participant
            .using_rng(|rng| suite.encrypt(rng, &keys.send_key, &credentials, b""))?;
        let finished = ClientFinished::sign(
            &transcript,
            self.participant.identity(),
            &credentials,
            enc_creds,
            creds_nonce,
        )?;

        // Only names we offered can be acknowledged.
        let extensions = hello
            .extensions()
            .iter()
            .filter(|e| config.supports_extension(e))
            .cloned()
            .collect();

        Ok((
            InitiatorState::FinishedSent {
                transcript,
                keys,
                credentials,
                peer: PeerHello {
                    w4id: hello.w4id().to_string(),
                    identity_key: *hello.identity_key(),
                    extensions,
                },
                peer_credentials,
            },
            finished,
        ))
    }

    /// Step 5: verify the responder's signature and establish the session.
    pub fn process_server_finished(
        &mut self,
        finished: &ServerFinished,
        now: u64,
    ) -> Result<Arc<SecureSession>> {
        let (transcript, keys, credentials, peer, peer_credentials) =
            match std::mem::replace(&mut self.state, InitiatorState::Aborted) {
                InitiatorState::FinishedSent {
                    transcript,
                    keys,
                    credentials,
                    peer,
                    peer_credentials,
                } => (transcript, keys, credentials, peer, peer_credentials),
                other => {
                    let from = other.stage();
                    self.state = other;
                    return Err(invalid_transition(from, HandshakeStage::SessionEstablished));
                }
            };

        let result = (|| -> Result<Arc<SecureSession>> {
            if !finished.verify(&transcript, &peer.identity_key, &credentials)? {
                return Err(W4TrustError::TranscriptAuthenticationFailed);
            }
            let derived = SessionId::from_bytes(keys.session_id);
            if finished.session_id() != derived {
                return Err(W4TrustError::SessionIdMismatch {
                    announced: finished.session_id().to_string(),
                    derived: derived.to_string(),
                });
            }
            self.participant
                .check_binding(&peer.w4id, &peer.identity_key, &peer_credentials)?;

            let params = SessionParams {
                local_w4id: self.participant.w4id().to_string(),
                remote_w4id: peer.w4id,
                suite: transcript.suite(),
                established_at: now,
                extensions: peer.extensions,
                peer_credentials,
            };
            Ok(self.participant.establish(&keys, false, params))
        })();

        match result {
            Ok(session) => {
                self.state = InitiatorState::SessionEstablished(session.id());
                Ok(session)
            }
            Err(e) => {
                log_abort("initiator", HandshakeStage::FinishedSent, &e);
                Err(e)
            }
        }
    }

    /// Id of the established session, once the handshake has completed.
    pub fn session_id(&self) -> Option<SessionId> {
        match self.state {
            InitiatorState::SessionEstablished(id) => Some(id),
            _ => None,
        }
    }
}

// ── Responder ────────────────────────────────────────────────────────────

/// Server side of one handshake attempt.
pub struct Responder<'a> {
    participant: &'a Participant,
    state: ResponderState,
}

impl<'a> Responder<'a> {
    pub(crate) fn new(participant: &'a Participant) -> Self {
        Self {
            participant,
            state: ResponderState::Init,
        }
    }

    pub fn stage(&self) -> HandshakeStage {
        self.state.stage()
    }

    /// Step 2: negotiate, derive the provisional bundle and answer with a
    /// ServerHello carrying our sealed credentials.
    ///
    /// The suite is the first one in the initiator's list that is locally
    /// usable. Unsupported and GREASE extensions are dropped silently.
    pub fn process_client_hello(&mut self, hello: &ClientHello) -> Result<ServerHello> {
        if !matches!(self.state, ResponderState::Init) {
            return Err(invalid_transition(self.stage(), HandshakeStage::HelloReceived));
        }

        match self.answer_hello(hello) {
            Ok((state, reply)) => {
                self.state = state;
                tracing::debug!(
                    peer = %hello.w4id(),
                    suite = %reply.suite(),
                    extensions = reply.extensions().len(),
                    "responder: ServerHello sent"
                );
                Ok(reply)
            }
            Err(e) => {
                log_abort("responder", HandshakeStage::Init, &e);
                self.state = ResponderState::Aborted;
                Err(e)
            }
        }
    }

    fn answer_hello(&self, hello: &ClientHello) -> Result<(ResponderState, ServerHello)> {
        let config = self.participant.config();
        let suite = hello
            .suites()
            .iter()
            .filter(|s| config.is_usable(s))
            .find_map(CryptoSuite::resolve)
            .ok_or(W4TrustError::SuiteNegotiationFailed)?;

        let extensions: Vec<String> = hello
            .extensions()
            .iter()
            .filter(|e| config.supports_extension(e))
            .cloned()
            .collect();

        let transcript = Transcript::new(suite, hello.to_wire()?);
        let credentials = config.declared_credentials().to_bytes()?;

        let (ephemeral, nonce) = self
            .participant
            .using_rng(|rng| (suite.generate_kex_keypair(rng), random_nonce(rng)));
        let kex_public = ephemeral.public_key_bytes();
        let shared = suite.dh(ephemeral, hello.kex_public())?;

        let early = suite.derive_keys(&shared, &transcript.early_hash(), Some(EARLY_HANDSHAKE_SALT))?;
        let (creds_nonce, enc_creds) = self
            .participant
            .using_rng(|rng| suite.encrypt(rng, &early.send_key, &credentials, b""))?;
        drop(early);

        let reply = ServerHello::new(
            suite.id(),
            self.participant.public_key(),
            kex_public,
            config.w4id.clone(),
            nonce,
            enc_creds,
            creds_nonce,
            extensions.clone(),
        );
        let transcript = transcript.with_server_hello(reply.to_wire()?);

        Ok((
            ResponderState::HelloReceived {
                transcript,
                shared_secret: shared,
                peer: PeerHello {
                    w4id: hello.w4id().to_string(),
                    identity_key: *hello.identity_key(),
                    extensions,
                },
            },
            reply,
        ))
    }

    /// Step 4: derive the session bundle, authenticate the initiator and
    /// establish our (swapped) side of the session.
    pub fn process_client_finished(
        &mut self,
        finished: &ClientFinished,
        now: u64,
    ) -> Result<(ServerFinished, Arc<SecureSession>)> {
        let (transcript, shared_secret, peer) =
            match std::mem::replace(&mut self.state, ResponderState::Aborted) {
                ResponderState::HelloReceived {
                    transcript,
                    shared_secret,
                    peer,
                } => (transcript, shared_secret, peer),
                other => {
                    let from = other.stage();
                    self.state = other;
                    return Err(invalid_transition(from, HandshakeStage::FinishedSent));
                }
            };

        let result = (|| -> Result<(ServerFinished, Arc<SecureSession>)> {
            let suite = transcript.suite();
            let keys = suite.derive_keys(&shared_secret, &transcript.session_hash()?, None)?;
            drop(shared_secret);
            tracing::debug!(stage = HandshakeStage::KeyMaterialDerived.label(), "responder: session keys derived");

            let credentials = suite
                .decrypt(
                    &keys.send_key,
                    finished.credentials_nonce(),
                    finished.encrypted_credentials(),
                    b"",
                )
                .map_err(|_| W4TrustError::CredentialDecryptionFailed("initiator credentials".into()))?;
            if !finished.verify(&transcript, &peer.identity_key, &credentials)? {
                return Err(W4TrustError::TranscriptAuthenticationFailed);
            }
            let peer_credentials = Credentials::from_bytes(&credentials)?;
            self.participant
                .check_binding(&peer.w4id, &peer.identity_key, &peer_credentials)?;

            let reply = ServerFinished::sign(
                &transcript,
                self.participant.identity(),
                &credentials,
                SessionId::from_bytes(keys.session_id),
            )?;
            tracing::debug!(stage = HandshakeStage::FinishedSent.label(), "responder: ServerFinished built");

            let params = SessionParams {
                local_w4id: self.participant.w4id().to_string(),
                remote_w4id: peer.w4id,
                suite,
                established_at: now,
                extensions: peer.extensions,
                peer_credentials,
            };
            Ok((reply, self.participant.establish(&keys, true, params)))
        })();

        match result {
            Ok((reply, session)) => {
                self.state = ResponderState::SessionEstablished(session.id());
                Ok((reply, session))
            }
            Err(e) => {
                log_abort("responder", HandshakeStage::HelloReceived, &e);
                Err(e)
            }
        }
    }

    /// Id of the established session, once the handshake has completed.
    pub fn session_id(&self) -> Option<SessionId> {
        match self.state {
            ResponderState::SessionEstablished(id) => Some(id),
            _ => None,
        }
    }
}
