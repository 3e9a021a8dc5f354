use std::sync::{Arc, Barrier};

use bitpost_services::testing::RecordingListener;
use bitpost_services::{
    AddressBook, Collaborators, DefaultLabeler, MessageStore, ObjectInventory, ObjectProcessor,
    OutboundQueue, StoreError,
};

use crate::*;

fn get_pubkey(target: RipeOrTag, stream: u64, iv: InventoryVector) -> NetworkObject {
    NetworkObject::new(
        stream,
        TEST_EXPIRY,
        ObjectPayload::GetPubkey(GetPubkey { version: 4, target }),
        iv,
    )
}

fn tagged_pubkey(node: &TestNode, contact: &Address, pubkey: Pubkey, iv: InventoryVector) -> NetworkObject {
    let encrypted = node.cipher.seal_pubkey(&contact.public_decryption_key, pubkey);
    NetworkObject::new(
        contact.stream,
        TEST_EXPIRY,
        ObjectPayload::Pubkey(PubkeyPayload::Tagged {
            tag: contact.tag,
            encrypted,
        }),
        iv,
    )
}

/// Answers for an owned identity, on the stream the request arrived on.
#[test]
fn test_key_request_is_answered_on_request_stream() {
    let node = node();
    let me = test_identity("BM-me", 1);
    node.add(me.clone());

    node.receive(&get_pubkey(RipeOrTag::Tag(me.tag), 7, test_iv(1)));

    let out = node.outbound();
    assert_eq!(out.len(), 1);
    let Outbound::Pubkey { identity, stream } = &out[0] else {
        panic!("expected pubkey response, got {:?}", out[0]);
    };
    assert_eq!(identity.address, "BM-me");
    assert_eq!(*stream, 7);
}

/// Chans share their keys and never answer.
#[test]
fn test_chan_stays_silent() {
    let node = node();
    let chan = test_identity("BM-chan", 1).into_chan();
    node.add(chan.clone());

    node.receive(&get_pubkey(RipeOrTag::Tag(chan.tag), 1, test_iv(2)));
    node.receive(&get_pubkey(RipeOrTag::Ripe(chan.ripe), 1, test_iv(3)));

    assert!(node.outbound().is_empty());
}

/// Address store that reports an identity whose private key is unavailable.
struct KeylessIdentities {
    inner: AddressBook,
    keyless: Address,
}

impl AddressRepository for KeylessIdentities {
    fn find_identity(&self, target: &RipeOrTag) -> Option<Address> {
        if self.keyless.matches(target) {
            return Some(self.keyless.clone());
        }
        self.inner.find_identity(target)
    }

    fn find_contact_by_tag(&self, tag: &bitpost_core::Tag) -> Option<Address> {
        self.inner.find_contact_by_tag(tag)
    }

    fn find_contact_by_ripe(&self, ripe: &bitpost_core::Ripe) -> Option<Address> {
        self.inner.find_contact_by_ripe(ripe)
    }

    fn identities(&self) -> Vec<Address> {
        let mut identities = vec![self.keyless.clone()];
        identities.extend(self.inner.identities());
        identities
    }

    fn find_address(&self, address: &str) -> Option<Address> {
        self.inner.find_address(address)
    }

    fn subscriptions(&self, broadcast_version: u64) -> Vec<Address> {
        self.inner.subscriptions(broadcast_version)
    }

    fn save(&self, address: Address) -> Result<(), StoreError> {
        self.inner.save(address)
    }

    fn set_pubkey_if_absent(
        &self,
        address: &str,
        pubkey: Pubkey,
    ) -> Result<Option<Address>, StoreError> {
        self.inner.set_pubkey_if_absent(address, pubkey)
    }
}

/// An identity without a private key neither answers key requests nor takes
/// part in trial decryption.
#[test]
fn test_keyless_identity_is_skipped() {
    init_tracing();
    let (keyless, _) = test_contact("BM-keyless", 5);
    let me = test_identity("BM-me", 1);
    let book = AddressBook::new();
    book.save(me.clone()).unwrap();

    let cipher = Arc::new(FakeCipher::new());
    let listener = Arc::new(RecordingListener::new());
    let (outbound, mut outbound_rx) = OutboundQueue::new();
    let processor = ObjectProcessor::new(
        Collaborators {
            addresses: Arc::new(KeylessIdentities {
                inner: book,
                keyless: keyless.clone(),
            }),
            messages: Arc::new(MessageStore::new()),
            inventory: Arc::new(ObjectInventory::new()),
            announcer: Arc::new(outbound.clone()),
            sender: Arc::new(outbound.clone()),
            key_responder: Arc::new(outbound),
            labeler: Arc::new(DefaultLabeler::new()),
            listener: listener.clone(),
            cipher: cipher.clone(),
        },
        AckConfig::default(),
    );

    processor.receive(&get_pubkey(RipeOrTag::Tag(keyless.tag), 1, test_iv(4)));
    assert!(outbound_rx.try_recv().is_err());

    let (alice, alice_key) = test_contact("BM-alice", 20);
    let plaintext = Plaintext::msg(sender_view(&alice, &alice_key), me.clone(), Encoding::Trivial, "hi");
    let me_key = me.private_key.as_ref().unwrap().encryption_key.clone();
    let msg = cipher.seal_msg(&me_key, plaintext);
    processor.receive(
        &NetworkObject::new(1, TEST_EXPIRY, ObjectPayload::Msg(msg), test_iv(5))
            .with_signature(FakeCipher::sign(&alice_key)),
    );

    assert_eq!(cipher.attempts(), vec![me_key]);
    assert_eq!(listener.count(), 1);
}

/// A pubkey response fills in the contact's key and releases every message
/// that was waiting for it. A second response never replaces the key.
#[test]
fn test_pubkey_response_releases_queued_messages() {
    let node = node();
    let me = test_identity("BM-me", 1);
    let (bob, bob_key) = test_contact("BM-bob", 2);
    let (carol, _) = test_contact("BM-carol", 3);
    node.add(me.clone()).add(bob.clone()).add(carol.clone());

    for text in ["one", "two", "three"] {
        node.messages
            .save(
                Plaintext::msg(me.clone(), bob.clone(), Encoding::Trivial, text)
                    .with_status(Status::PubkeyRequested),
            )
            .unwrap();
    }
    node.messages
        .save(
            Plaintext::msg(me.clone(), carol.clone(), Encoding::Trivial, "other")
                .with_status(Status::PubkeyRequested),
        )
        .unwrap();

    node.receive(&tagged_pubkey(&node, &bob, bob_key.clone(), test_iv(6)));

    assert_eq!(node.addresses.get("BM-bob").unwrap().pubkey, Some(bob_key.clone()));
    let released = sent(&node.outbound());
    assert_eq!(released.len(), 3);
    assert!(released.iter().all(|m| m.status == Status::Sending));
    assert!(released.iter().all(|m| m.has_label(LabelKind::Outbox)));
    assert_eq!(node.messages.find_messages(Status::Sending, &bob).len(), 3);
    assert_eq!(node.messages.find_messages(Status::PubkeyRequested, &carol).len(), 1);

    let impostor = test_pubkey(99, &[]);
    node.receive(&tagged_pubkey(&node, &bob, impostor, test_iv(7)));
    assert_eq!(node.addresses.get("BM-bob").unwrap().pubkey, Some(bob_key));
    assert!(node.outbound().is_empty());
}

/// A pubkey sealed under the wrong key is not an error, just not ours.
#[test]
fn test_undecryptable_pubkey_is_swallowed() {
    let node = node();
    let (bob, bob_key) = test_contact("BM-bob", 2);
    node.add(bob.clone());

    let encrypted = node.cipher.seal_pubkey(&SecretKey::from_bytes([1; 32]), bob_key);
    node.receive(&NetworkObject::new(
        1,
        TEST_EXPIRY,
        ObjectPayload::Pubkey(PubkeyPayload::Tagged {
            tag: bob.tag,
            encrypted,
        }),
        test_iv(8),
    ));

    assert!(node.addresses.get("BM-bob").unwrap().pubkey.is_none());
    assert!(node.outbound().is_empty());
}

/// Contact lookups that hold each caller until two have looked, so both
/// racing responses see the contact without a key.
struct LockstepLookups {
    inner: Arc<dyn AddressRepository>,
    barrier: Barrier,
}

impl AddressRepository for LockstepLookups {
    fn find_identity(&self, target: &RipeOrTag) -> Option<Address> {
        self.inner.find_identity(target)
    }

    fn find_contact_by_tag(&self, tag: &bitpost_core::Tag) -> Option<Address> {
        let found = self.inner.find_contact_by_tag(tag);
        self.barrier.wait();
        found
    }

    fn find_contact_by_ripe(&self, ripe: &bitpost_core::Ripe) -> Option<Address> {
        let found = self.inner.find_contact_by_ripe(ripe);
        self.barrier.wait();
        found
    }

    fn identities(&self) -> Vec<Address> {
        self.inner.identities()
    }

    fn find_address(&self, address: &str) -> Option<Address> {
        self.inner.find_address(address)
    }

    fn subscriptions(&self, broadcast_version: u64) -> Vec<Address> {
        self.inner.subscriptions(broadcast_version)
    }

    fn save(&self, address: Address) -> Result<(), StoreError> {
        self.inner.save(address)
    }

    fn set_pubkey_if_absent(
        &self,
        address: &str,
        pubkey: Pubkey,
    ) -> Result<Option<Address>, StoreError> {
        self.inner.set_pubkey_if_absent(address, pubkey)
    }
}

/// Two responses for one contact arrive at once, one genuine and one not.
/// Exactly one key is stored and every queued message goes out once, under
/// that key.
#[test]
fn test_racing_pubkey_responses_release_queue_once() {
    init_tracing();
    let node = TestNode::wrapped(AckConfig::default(), |ctx| {
        ctx.addresses = Arc::new(LockstepLookups {
            inner: ctx.addresses.clone(),
            barrier: Barrier::new(2),
        });
    });
    let me = test_identity("BM-me", 1);
    let (bob, bob_key) = test_contact("BM-bob", 2);
    node.add(me.clone()).add(bob.clone());
    for text in ["one", "two"] {
        node.messages
            .save(
                Plaintext::msg(me.clone(), bob.clone(), Encoding::Trivial, text)
                    .with_status(Status::PubkeyRequested),
            )
            .unwrap();
    }

    let genuine = tagged_pubkey(&node, &bob, bob_key, test_iv(20));
    let impostor = tagged_pubkey(&node, &bob, test_pubkey(99, &[]), test_iv(21));
    std::thread::scope(|s| {
        s.spawn(|| node.receive(&genuine));
        s.spawn(|| node.receive(&impostor));
    });

    let stored = node.addresses.get("BM-bob").unwrap().pubkey.unwrap();
    let released = sent(&node.outbound());
    assert_eq!(released.len(), 2);
    assert!(released
        .iter()
        .all(|m| m.to.as_ref().and_then(|to| to.pubkey.as_ref()) == Some(&stored)));
    assert_eq!(node.messages.find_messages(Status::Sending, &bob).len(), 2);
    assert!(node.messages.find_messages(Status::PubkeyRequested, &bob).is_empty());
}
