use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use bitpost_services::{DefaultLabeler, Labeler, StoreError};

use crate::*;

/// Alice sends Bob a message carrying an ack. Bob's node publishes the ack;
/// once it reaches Alice's node her copy is marked acknowledged.
#[test]
fn test_ack_round_trip_between_nodes() {
    let alice_node = node();
    let bob_node = node();

    let alice = test_identity("BM-alice", 1);
    let bob = test_identity("BM-bob", 2);
    let alice_pubkey = alice.pubkey.clone().unwrap();
    let bob_pubkey = bob.pubkey.clone().unwrap();
    let bob_as_contact =
        Address::contact("BM-bob", bob_pubkey.version, bob_pubkey.stream, bob_pubkey.ripe())
            .with_pubkey(bob_pubkey.clone());
    let alice_as_contact =
        Address::contact("BM-alice", alice_pubkey.version, alice_pubkey.stream, alice_pubkey.ripe());
    alice_node.add(alice.clone()).add(bob_as_contact.clone());
    bob_node.add(bob.clone()).add(alice_as_contact.clone());

    // Alice's outgoing copy.
    let ack = NetworkObject::ack(1, TEST_EXPIRY, vec![0xA5; 32]);
    let outgoing = Plaintext::simple(alice.clone(), bob_as_contact, "ping", "are you there")
        .with_ack_message(ack.clone());
    let outgoing = DefaultLabeler::new()
        .mark_as_sending(outgoing)
        .with_status(Status::Sent);
    let outgoing = alice_node.messages.save(outgoing).unwrap();

    // What Bob's node receives.
    let incoming = Plaintext::simple(
        sender_view(&alice_as_contact, &alice_pubkey),
        bob.clone(),
        "ping",
        "are you there",
    )
    .with_ack_message(ack.clone());
    assert_eq!(incoming.ack_data, outgoing.ack_data);
    bob_node.receive(&bob_node.msg_object(&bob, incoming, &alice_pubkey, test_iv(1)));

    assert_eq!(bob_node.listener.count(), 1);
    let announced = offers(&bob_node.outbound());
    assert_eq!(announced, vec![ack.inventory_vector()]);
    let published = bob_node.inventory.get(&announced[0]).unwrap();
    // Bob learned Alice's key from her message.
    assert_eq!(bob_node.addresses.get("BM-alice").unwrap().pubkey, Some(alice_pubkey));

    alice_node.receive(&published);

    let id = outgoing.id.unwrap();
    let acknowledged = alice_node.messages.get(id).unwrap();
    assert_eq!(acknowledged.status, Status::SentAcknowledged);
    assert!(acknowledged.has_label(LabelKind::Sent));
    assert!(!acknowledged.has_label(LabelKind::Outbox));

    // A late duplicate changes nothing.
    alice_node.receive(&published);
    assert_eq!(alice_node.messages.get(id).unwrap().labels, acknowledged.labels);
}

/// Bob's identity does not advertise acknowledgements, so nothing is
/// published even though the message carries an ack.
#[test]
fn test_no_ack_for_identity_without_ack_feature() {
    let node = node();
    let bob = Address::identity(
        "BM-bob",
        PrivateKey::new([2; 32], [66; 32]),
        test_pubkey(2, &[Feature::IncludeDestination]),
    );
    node.add(bob.clone());
    let (alice, alice_key) = test_contact("BM-alice", 1);

    let plaintext = Plaintext::msg(sender_view(&alice, &alice_key), bob.clone(), Encoding::Trivial, "hi")
        .with_ack_message(NetworkObject::ack(1, TEST_EXPIRY, vec![1; 32]));
    node.receive(&node.msg_object(&bob, plaintext, &alice_key, test_iv(2)));

    assert_eq!(node.listener.count(), 1);
    assert!(offers(&node.outbound()).is_empty());
    assert_eq!(node.inventory.count(), 0);
}

/// Ack announcement switched off in config: messages still arrive, acks stay
/// local.
#[test]
fn test_ack_announcement_disabled_by_config() {
    init_tracing();
    let node = TestNode::with_ack_config(AckConfig { announce: false });
    let me = test_identity("BM-me", 1);
    node.add(me.clone());
    let (alice, alice_key) = test_contact("BM-alice", 20);

    let plaintext = Plaintext::msg(sender_view(&alice, &alice_key), me.clone(), Encoding::Trivial, "hi")
        .with_ack_message(NetworkObject::ack(1, TEST_EXPIRY, vec![1; 32]));
    node.receive(&node.msg_object(&me, plaintext, &alice_key, test_iv(3)));

    assert_eq!(node.listener.count(), 1);
    assert!(offers(&node.outbound()).is_empty());
}

/// An ack nobody is waiting for is dropped.
#[test]
fn test_stray_ack_is_ignored() {
    let node = node();
    node.receive(&NetworkObject::ack(1, TEST_EXPIRY, vec![0x42; 32]));

    assert_eq!(node.messages.count(), 0);
    assert!(node.outbound().is_empty());
}

/// Message store that holds ack lookups until two have looked, and counts
/// the writes that went through.
struct LockstepAcks {
    inner: Arc<dyn MessageRepository>,
    barrier: Barrier,
    writes: Arc<AtomicUsize>,
}

impl MessageRepository for LockstepAcks {
    fn find_messages(&self, status: Status, recipient: &Address) -> Vec<Plaintext> {
        self.inner.find_messages(status, recipient)
    }

    fn find_message_for_ack(&self, ack_data: &[u8]) -> Option<Plaintext> {
        let found = self.inner.find_message_for_ack(ack_data);
        self.barrier.wait();
        found
    }

    fn save(&self, message: Plaintext) -> Result<Plaintext, StoreError> {
        let stored = self.inner.save(message)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    fn save_if_status(&self, message: Plaintext, expected: Status) -> Result<bool, StoreError> {
        let written = self.inner.save_if_status(message, expected)?;
        if written {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(written)
    }
}

/// Two copies of one ack processed at once acknowledge the message once.
#[test]
fn test_concurrent_duplicate_acks_write_once() {
    init_tracing();
    let writes = Arc::new(AtomicUsize::new(0));
    let node = TestNode::wrapped(AckConfig::default(), |ctx| {
        ctx.messages = Arc::new(LockstepAcks {
            inner: ctx.messages.clone(),
            barrier: Barrier::new(2),
            writes: writes.clone(),
        });
    });
    let me = test_identity("BM-me", 1);
    let (them, key) = test_contact("BM-them", 2);
    let ack = NetworkObject::ack(1, TEST_EXPIRY, vec![0x3C; 32]);
    let outgoing = Plaintext::msg(me, them.with_pubkey(key), Encoding::Trivial, "hello")
        .with_ack_message(ack.clone());
    let outgoing = DefaultLabeler::new()
        .mark_as_sending(outgoing)
        .with_status(Status::Sent);
    let id = node.messages.save(outgoing).unwrap().id.unwrap();

    std::thread::scope(|s| {
        s.spawn(|| node.receive(&ack));
        s.spawn(|| node.receive(&ack));
    });

    assert_eq!(writes.load(Ordering::SeqCst), 1);
    let acknowledged = node.messages.get(id).unwrap();
    assert_eq!(acknowledged.status, Status::SentAcknowledged);
    assert!(acknowledged.has_label(LabelKind::Sent));
}
