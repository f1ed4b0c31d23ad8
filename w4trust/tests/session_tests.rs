// Integration tests for established secure sessions.

use std::collections::HashSet;
use std::sync::{mpsc, Arc};

use rand::rngs::StdRng;
use rand::SeedableRng;

use w4trust::{
    direct_handshake, IdentityKeyPair, Participant, ParticipantConfig, SecureSession,
    SessionRecord, W4TrustError,
};

fn participant(w4id: &str, seed: u64) -> Participant {
    let mut rng = StdRng::seed_from_u64(seed);
    let identity = IdentityKeyPair::generate_with(&mut rng);
    Participant::with_rng(ParticipantConfig::new(w4id), identity, rng)
}

fn sessions(seed: u64) -> (Arc<SecureSession>, Arc<SecureSession>) {
    let alice = participant("alice", seed);
    let bob = participant("bob", seed + 1);
    direct_handshake(&alice, &bob, 0).unwrap()
}

// ── Round trips ──────────────────────────────────────────────────────────

#[test]
fn payload_sizes_roundtrip_for_every_kind() {
    let (client, server) = sessions(1);
    let sizes = [0usize, 1, 15, 16, 17, 1000, 64 * 1024, 1024 * 1024];

    for kind in ["request", "response", "event"] {
        for &size in &sizes {
            let payload = vec![size as u8 ^ 0x5A; size];
            let record = client.encrypt(&payload, kind).unwrap();
            assert_eq!(record.kind, kind);
            assert_eq!(server.decrypt(&record).unwrap(), payload, "{kind} / {size}");
        }
    }
    let expected = (3 * sizes.len()) as u64;
    assert_eq!(client.send_counter(), expected);
    assert_eq!(server.recv_counter(), expected);
}

#[test]
fn records_survive_the_wire() {
    let (client, server) = sessions(3);
    let record = client.encrypt(b"{\"op\": \"attest\"}", "request").unwrap();
    let wire = record.to_wire().unwrap();
    let parsed = SessionRecord::from_wire(&wire).unwrap();
    assert_eq!(parsed, record);
    assert_eq!(server.decrypt(&parsed).unwrap(), b"{\"op\": \"attest\"}");
}

#[test]
fn sequence_numbers_count_up_per_direction() {
    let (client, server) = sessions(5);
    for expected in 0..4u64 {
        assert_eq!(client.encrypt(b"c", "event").unwrap().seq, expected);
    }
    assert_eq!(server.encrypt(b"s", "event").unwrap().seq, 0);
}

#[test]
fn nonces_do_not_repeat() {
    let (client, _) = sessions(7);
    let nonces: HashSet<[u8; 12]> = (0..200)
        .map(|_| client.encrypt(b"same", "event").unwrap().nonce)
        .collect();
    assert_eq!(nonces.len(), 200);
}

// ── Isolation and tampering ──────────────────────────────────────────────

#[test]
fn record_from_one_session_fails_on_another() {
    let (c1, _s1) = sessions(9);
    let (_c2, s2) = sessions(11);
    assert_ne!(c1.id(), s2.id());

    let record = c1.encrypt(b"for s1 only", "request").unwrap();
    assert!(matches!(
        s2.decrypt(&record),
        Err(W4TrustError::MessageDecryptionFailed(_))
    ));

    // Relabeling the record with the other session's id does not help.
    let mut relabeled = record;
    relabeled.session_id = s2.id();
    assert!(matches!(
        s2.decrypt(&relabeled),
        Err(W4TrustError::MessageDecryptionFailed(_))
    ));
    assert_eq!(s2.recv_counter(), 0);
}

#[test]
fn own_records_do_not_decrypt_locally() {
    let (client, _) = sessions(13);
    let record = client.encrypt(b"outbound", "event").unwrap();
    assert!(client.decrypt(&record).is_err());
}

#[test]
fn tampered_ciphertext_is_rejected() {
    let (client, server) = sessions(15);
    let mut record = client.encrypt(b"integrity", "event").unwrap();
    record.ciphertext[0] ^= 0x01;
    assert!(matches!(
        server.decrypt(&record),
        Err(W4TrustError::MessageDecryptionFailed(_))
    ));
}

#[test]
fn reordered_and_replayed_records_are_rejected() {
    let (client, server) = sessions(17);
    let r0 = client.encrypt(b"zero", "event").unwrap();
    let r1 = client.encrypt(b"one", "event").unwrap();
    let r2 = client.encrypt(b"two", "event").unwrap();

    assert_eq!(server.decrypt(&r0).unwrap(), b"zero");
    assert_eq!(server.decrypt(&r2).unwrap(), b"two");
    // r1 arrives after r2: a regression.
    assert!(server.decrypt(&r1).is_err());
    // r2 again: a replay.
    assert!(server.decrypt(&r2).is_err());
    assert_eq!(server.recv_counter(), 2);
}

#[test]
fn forged_sequence_number_is_rejected() {
    let (client, server) = sessions(19);
    let mut record = client.encrypt(b"seq is authenticated", "event").unwrap();
    record.seq += 1;
    assert!(server.decrypt(&record).is_err());
}

// ── Exporter ─────────────────────────────────────────────────────────────

#[test]
fn exporter_agrees_across_sides_and_differs_across_sessions() {
    let (c1, s1) = sessions(21);
    let (c2, _) = sessions(23);
    let a = c1.export_keying_material(b"w4-app-channel", b"v1", 32).unwrap();
    let b = s1.export_keying_material(b"w4-app-channel", b"v1", 32).unwrap();
    let other = c2.export_keying_material(b"w4-app-channel", b"v1", 32).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, other);
    assert_eq!(c1.export_keying_material(b"x", b"", 64).unwrap().len(), 64);
}

// ── Concurrency ──────────────────────────────────────────────────────────

#[test]
fn sender_and_receiver_threads_share_a_session() {
    let (client, server) = sessions(25);
    let (tx, rx) = mpsc::channel::<SessionRecord>();

    let sender = {
        let client = Arc::clone(&client);
        std::thread::spawn(move || {
            for i in 0..100u32 {
                tx.send(client.encrypt(&i.to_be_bytes(), "event").unwrap()).unwrap();
            }
        })
    };

    // Replies flow the other way on the same session while the sender runs.
    let replier = {
        let server = Arc::clone(&server);
        std::thread::spawn(move || {
            (0..100)
                .map(|_| server.encrypt(b"ack", "response").unwrap())
                .collect::<Vec<_>>()
        })
    };

    for i in 0..100u32 {
        let record = rx.recv().unwrap();
        assert_eq!(server.decrypt(&record).unwrap(), i.to_be_bytes());
    }
    sender.join().unwrap();
    for record in replier.join().unwrap() {
        assert_eq!(client.decrypt(&record).unwrap(), b"ack");
    }
    assert_eq!(server.recv_counter(), 100);
    assert_eq!(client.recv_counter(), 100);
}
