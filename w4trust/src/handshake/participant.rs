// Handshake participant: a long-lived identity plus its established sessions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::OsRng;

use crate::config::ParticipantConfig;
use crate::crypto::kdf::KeyBundle;
use crate::crypto::keys::IdentityKeyPair;
use crate::crypto::SecureRng;
use crate::error::{Result, W4TrustError};
use crate::handshake::credentials::Credentials;
use crate::handshake::messages::{ClientFinished, ClientHello, ServerFinished, ServerHello, WireMessage};
use crate::handshake::protocol::{Initiator, Responder};
use crate::session::{SecureSession, SessionId, SessionParams};

/// Decides whether a peer's declared w4id may be bound to the identity key
/// that signed the transcript.
///
/// Consulted only after the transcript signature has verified. The handshake
/// itself proves possession of the key, nothing more.
pub trait IdentityBinding: Send + Sync {
    fn accepts(&self, w4id: &str, identity_key: &[u8; 32], credentials: &Credentials) -> bool;
}

/// Accepts every binding.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAnyBinding;

impl IdentityBinding for AcceptAnyBinding {
    fn accepts(&self, _w4id: &str, _identity_key: &[u8; 32], _credentials: &Credentials) -> bool {
        true
    }
}

/// Accepts only w4ids pinned to one specific identity key.
#[derive(Debug, Default, Clone)]
pub struct PinnedKeys {
    pins: HashMap<String, [u8; 32]>,
}

impl PinnedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(mut self, w4id: impl Into<String>, identity_key: [u8; 32]) -> Self {
        self.pins.insert(w4id.into(), identity_key);
        self
    }
}

impl IdentityBinding for PinnedKeys {
    fn accepts(&self, w4id: &str, identity_key: &[u8; 32], _credentials: &Credentials) -> bool {
        self.pins.get(w4id) == Some(identity_key)
    }
}

/// An identity holder that can initiate or respond to handshakes.
///
/// Shared by reference across concurrent handshakes: the RNG and the
/// session registry are each behind their own lock.
pub struct Participant {
    identity: IdentityKeyPair,
    config: ParticipantConfig,
    rng: Mutex<Box<dyn SecureRng>>,
    binding: Box<dyn IdentityBinding>,
    sessions: RwLock<HashMap<SessionId, Arc<SecureSession>>>,
}

impl Participant {
    /// A participant with a fresh identity and the operating-system RNG.
    pub fn new(config: ParticipantConfig) -> Self {
        Self::with_rng(config, IdentityKeyPair::generate(), OsRng)
    }

    /// A participant with an explicit identity and randomness source.
    pub fn with_rng(
        config: ParticipantConfig,
        identity: IdentityKeyPair,
        rng: impl SecureRng + 'static,
    ) -> Self {
        Self {
            identity,
            config,
            rng: Mutex::new(Box::new(rng)),
            binding: Box::new(AcceptAnyBinding),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the identity-binding policy (default: [`AcceptAnyBinding`]).
    pub fn with_identity_binding(mut self, binding: impl IdentityBinding + 'static) -> Self {
        self.binding = Box::new(binding);
        self
    }

    /// Start a handshake as the initiating side.
    pub fn initiator(&self) -> Initiator<'_> {
        Initiator::new(self)
    }

    /// Start a handshake as the responding side.
    pub fn responder(&self) -> Responder<'_> {
        Responder::new(self)
    }

    pub fn w4id(&self) -> &str {
        &self.config.w4id
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.identity.public_key_bytes()
    }

    pub fn config(&self) -> &ParticipantConfig {
        &self.config
    }

    pub(crate) fn identity(&self) -> &IdentityKeyPair {
        &self.identity
    }

    pub(crate) fn using_rng<R>(&self, f: impl FnOnce(&mut dyn SecureRng) -> R) -> R {
        let mut rng = self.rng.lock();
        f(&mut **rng)
    }

    pub(crate) fn check_binding(
        &self,
        w4id: &str,
        identity_key: &[u8; 32],
        credentials: &Credentials,
    ) -> Result<()> {
        if self.binding.accepts(w4id, identity_key, credentials) {
            Ok(())
        } else {
            Err(W4TrustError::IdentityBindingRejected(w4id.to_string()))
        }
    }

    /// Build a session from a completed key schedule and register it.
    pub(crate) fn establish(&self, keys: &KeyBundle, swap: bool, params: SessionParams) -> Arc<SecureSession> {
        let session = Arc::new(self.using_rng(|rng| SecureSession::establish(keys, swap, params, rng)));
        self.sessions.write().insert(session.id(), Arc::clone(&session));
        tracing::info!(
            session = %session.id(),
            local = %session.local_w4id(),
            remote = %session.remote_w4id(),
            suite = %session.suite(),
            "session established"
        );
        session
    }

    // ── Session registry ─────────────────────────────────────────────────

    pub fn session(&self, id: &SessionId) -> Option<Arc<SecureSession>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn sessions(&self) -> Vec<Arc<SecureSession>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Forget a session. Handles already held elsewhere stay usable.
    pub fn close_session(&self, id: &SessionId) -> Option<Arc<SecureSession>> {
        let removed = self.sessions.write().remove(id);
        if removed.is_some() {
            tracing::debug!(session = %id, "session closed");
        }
        removed
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("w4id", &self.config.w4id)
            .field("identity", &self.identity)
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}

/// Run the full four-message exchange in-process, passing every message
/// through its wire encoding. Returns `(client_session, server_session)`.
pub fn direct_handshake(
    client: &Participant,
    server: &Participant,
    now: u64,
) -> Result<(Arc<SecureSession>, Arc<SecureSession>)> {
    let mut initiator = client.initiator();
    let mut responder = server.responder();

    let hello = ClientHello::from_wire(&initiator.client_hello()?.to_wire()?)?;
    let reply = ServerHello::from_wire(&responder.process_client_hello(&hello)?.to_wire()?)?;
    let finished = ClientFinished::from_wire(&initiator.process_server_hello(&reply)?.to_wire()?)?;
    let (server_finished, server_session) = responder.process_client_finished(&finished, now)?;
    let server_finished = ServerFinished::from_wire(&server_finished.to_wire()?)?;
    let client_session = initiator.process_server_finished(&server_finished, now)?;

    Ok((client_session, server_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::suite::SuiteId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded(w4id: &str, seed: u64) -> Participant {
        let mut rng = StdRng::seed_from_u64(seed);
        let identity = IdentityKeyPair::generate_with(&mut rng);
        Participant::with_rng(ParticipantConfig::new(w4id), identity, rng)
    }

    #[test]
    fn registry_tracks_sessions() {
        let client = seeded("alice", 1);
        let server = seeded("bob", 2);
        let (c1, s1) = direct_handshake(&client, &server, 10).unwrap();
        let (c2, _) = direct_handshake(&client, &server, 11).unwrap();

        assert_eq!(client.session_count(), 2);
        assert_eq!(server.session_count(), 2);
        assert!(Arc::ptr_eq(&client.session(&c1.id()).unwrap(), &c1));
        assert_eq!(server.session(&s1.id()).unwrap().remote_w4id(), "alice");

        assert!(client.close_session(&c2.id()).is_some());
        assert!(client.close_session(&c2.id()).is_none());
        assert_eq!(client.session_count(), 1);
        assert_eq!(client.sessions()[0].id(), c1.id());
    }

    #[test]
    fn seeded_participants_are_reproducible() {
        let a = seeded("alice", 42);
        let b = seeded("alice", 42);
        assert_eq!(a.public_key(), b.public_key());
        let ha = a.initiator().client_hello().unwrap();
        let hb = b.initiator().client_hello().unwrap();
        assert_eq!(ha.to_wire().unwrap(), hb.to_wire().unwrap());
    }

    #[test]
    fn pinned_binding_rejects_unknown_key() {
        let client = seeded("alice", 3);
        let impostor = seeded("alice", 4);
        let server = seeded("bob", 5)
            .with_identity_binding(PinnedKeys::new().pin("alice", client.public_key()));

        assert!(direct_handshake(&client, &server, 1).is_ok());
        let err = direct_handshake(&impostor, &server, 1).unwrap_err();
        assert!(matches!(err, W4TrustError::IdentityBindingRejected(ref id) if id == "alice"));
        assert_eq!(server.session_count(), 1);
    }

    #[test]
    fn config_suites_flow_into_hello() {
        let mut rng = StdRng::seed_from_u64(9);
        let identity = IdentityKeyPair::generate_with(&mut rng);
        let p = Participant::with_rng(
            ParticipantConfig::new("carol").suites(vec![SuiteId::W4Fips1, SuiteId::W4Base1]),
            identity,
            rng,
        );
        let hello = p.initiator().client_hello().unwrap();
        assert_eq!(hello.suites(), &[SuiteId::W4Fips1, SuiteId::W4Base1]);
        assert_eq!(hello.w4id(), "carol");
        assert_eq!(hello.grease().len(), 1);
    }
}
