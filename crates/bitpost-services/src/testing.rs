//! Test doubles and an in-memory node for exercising the processor.
//!
//! `FakeCipher` stands in for the curve math: a ciphertext opens only under the
//! keys it was sealed for, and a signature is valid only for the pubkey it was
//! made with. Every decryption attempt is recorded so tests can assert which
//! keys were tried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bitpost_core::config::AckConfig;
use bitpost_core::crypto::{self, CryptoError, ObjectCipher, PrivateKey, SecretKey};
use bitpost_core::object::{Broadcast, Msg};
use bitpost_core::{
    Address, Feature, InventoryVector, NetworkObject, ObjectPayload, Plaintext, Pubkey, Tag,
};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::address_store::AddressBook;
use crate::inventory::ObjectInventory;
use crate::labeler::DefaultLabeler;
use crate::message_store::MessageStore;
use crate::outbound::{Outbound, OutboundQueue};
use crate::ports::{AddressRepository, MessageListener};
use crate::processor::{Collaborators, ObjectProcessor};

// ── Fake cipher ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Opened {
    Plaintext(Plaintext),
    Pubkey(Pubkey),
}

#[derive(Default)]
pub struct FakeCipher {
    /// ciphertext -> keys that open it and what they reveal
    openings: DashMap<Bytes, Vec<(SecretKey, Opened)>>,
    attempts: Mutex<Vec<SecretKey>>,
    counter: AtomicU64,
}

impl FakeCipher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature over any object, valid for `pubkey` only.
    pub fn sign(pubkey: &Pubkey) -> Bytes {
        Bytes::copy_from_slice(&crypto::hash(&pubkey.signing_key))
    }

    fn fresh_ciphertext(&self) -> Bytes {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Bytes::copy_from_slice(&crypto::hash(&n.to_le_bytes()))
    }

    fn seal(&self, key: &SecretKey, opened: Opened) -> Bytes {
        let ciphertext = self.fresh_ciphertext();
        self.openings
            .entry(ciphertext.clone())
            .or_default()
            .push((key.clone(), opened));
        ciphertext
    }

    pub fn seal_msg(&self, key: &SecretKey, plaintext: Plaintext) -> Msg {
        Msg {
            encrypted: self.seal(key, Opened::Plaintext(plaintext)),
        }
    }

    pub fn seal_broadcast(
        &self,
        key: &SecretKey,
        plaintext: Plaintext,
        tag: Option<Tag>,
    ) -> Broadcast {
        let encrypted = self.seal(key, Opened::Plaintext(plaintext));
        match tag {
            Some(tag) => Broadcast::v5(tag, encrypted),
            None => Broadcast::v4(encrypted),
        }
    }

    pub fn seal_pubkey(&self, key: &SecretKey, pubkey: Pubkey) -> Bytes {
        self.seal(key, Opened::Pubkey(pubkey))
    }

    /// Let an existing ciphertext also open under `key`, revealing `plaintext`.
    pub fn also_opens(&self, ciphertext: &Bytes, key: &SecretKey, plaintext: Plaintext) {
        self.openings
            .entry(ciphertext.clone())
            .or_default()
            .push((key.clone(), Opened::Plaintext(plaintext)));
    }

    /// Every key a decryption was attempted with, in order.
    pub fn attempts(&self) -> Vec<SecretKey> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn attempt_count(&self, key: &SecretKey) -> usize {
        self.attempts().iter().filter(|k| *k == key).count()
    }

    fn open(&self, ciphertext: &Bytes, key: &SecretKey) -> Result<Opened, CryptoError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(key.clone());
        }
        self.openings
            .get(ciphertext)
            .and_then(|candidates| {
                candidates
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, opened)| opened.clone())
            })
            .ok_or(CryptoError::DecryptionFailed)
    }
}

impl ObjectCipher for FakeCipher {
    fn decrypt_msg(&self, msg: &Msg, key: &SecretKey) -> Result<Plaintext, CryptoError> {
        match self.open(&msg.encrypted, key)? {
            Opened::Plaintext(p) => Ok(p),
            Opened::Pubkey(_) => Err(CryptoError::Malformed("expected msg".into())),
        }
    }

    fn decrypt_broadcast(
        &self,
        broadcast: &Broadcast,
        key: &SecretKey,
    ) -> Result<Plaintext, CryptoError> {
        match self.open(&broadcast.encrypted, key)? {
            Opened::Plaintext(p) => Ok(p),
            Opened::Pubkey(_) => Err(CryptoError::Malformed("expected broadcast".into())),
        }
    }

    fn decrypt_pubkey(&self, encrypted: &Bytes, key: &SecretKey) -> Result<Pubkey, CryptoError> {
        match self.open(encrypted, key)? {
            Opened::Pubkey(p) => Ok(p),
            Opened::Plaintext(_) => Err(CryptoError::Malformed("expected pubkey".into())),
        }
    }

    fn is_signature_valid(&self, object: &NetworkObject, pubkey: &Pubkey) -> bool {
        object.signature == Self::sign(pubkey)
    }
}

// ── Recording listener ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingListener {
    received: Mutex<Vec<Plaintext>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Plaintext> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.received().len()
    }
}

impl MessageListener for RecordingListener {
    fn receive(&self, message: &Plaintext) {
        if let Ok(mut received) = self.received.lock() {
            received.push(message.clone());
        }
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// Version 4 pubkey on stream 1, distinct per seed.
pub fn test_pubkey(seed: u8, features: &[Feature]) -> Pubkey {
    Pubkey::new(4, 1, vec![seed; 64], vec![seed.wrapping_add(128); 64]).with_features(features)
}

/// Owned identity that advertises acknowledgements.
pub fn test_identity(name: &str, seed: u8) -> Address {
    Address::identity(
        name,
        PrivateKey::new([seed; 32], [seed.wrapping_add(64); 32]),
        test_pubkey(seed, &[Feature::DoesAck]),
    )
}

/// A contact as stored locally (pubkey unknown) plus the pubkey it owns.
pub fn test_contact(name: &str, seed: u8) -> (Address, Pubkey) {
    let pubkey = test_pubkey(seed, &[Feature::DoesAck]);
    let contact = Address::contact(name, pubkey.version, pubkey.stream, pubkey.ripe());
    (contact, pubkey)
}

pub fn test_iv(seed: u8) -> InventoryVector {
    InventoryVector(crypto::hash(&[seed]))
}

/// Far enough in the future for any test run.
pub const TEST_EXPIRY: u64 = 4_000_000_000;

// ── In-memory node ────────────────────────────────────────────────────────────

/// A processor wired to in-memory collaborators, with handles on each.
pub struct TestNode {
    pub addresses: AddressBook,
    pub messages: MessageStore,
    pub inventory: ObjectInventory,
    pub cipher: Arc<FakeCipher>,
    pub listener: Arc<RecordingListener>,
    pub processor: Arc<ObjectProcessor>,
    outbound_rx: Mutex<mpsc::UnboundedReceiver<Outbound>>,
}

impl Default for TestNode {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNode {
    pub fn new() -> Self {
        Self::with_ack_config(AckConfig::default())
    }

    pub fn with_ack_config(ack: AckConfig) -> Self {
        Self::wrapped(ack, |_| {})
    }

    /// Like [`with_ack_config`](Self::with_ack_config), but `wrap` may swap
    /// any collaborator before the processor is built, typically to wrap a
    /// store. The node's own store handles still reach the backing stores.
    pub fn wrapped(ack: AckConfig, wrap: impl FnOnce(&mut Collaborators)) -> Self {
        let addresses = AddressBook::new();
        let messages = MessageStore::new();
        let inventory = ObjectInventory::new();
        let cipher = Arc::new(FakeCipher::new());
        let listener = Arc::new(RecordingListener::new());
        let (outbound, outbound_rx) = OutboundQueue::new();

        let mut collaborators = Collaborators {
            addresses: Arc::new(addresses.clone()),
            messages: Arc::new(messages.clone()),
            inventory: Arc::new(inventory.clone()),
            announcer: Arc::new(outbound.clone()),
            sender: Arc::new(outbound.clone()),
            key_responder: Arc::new(outbound),
            labeler: Arc::new(DefaultLabeler::new()),
            listener: listener.clone(),
            cipher: cipher.clone(),
        };
        wrap(&mut collaborators);

        Self {
            addresses,
            messages,
            inventory,
            cipher,
            listener,
            processor: Arc::new(ObjectProcessor::new(collaborators, ack)),
            outbound_rx: Mutex::new(outbound_rx),
        }
    }

    /// Store an address.
    pub fn add(&self, address: Address) -> &Self {
        if let Err(e) = self.addresses.save(address) {
            panic!("in-memory address book rejected save: {e}");
        }
        self
    }

    pub fn receive(&self, object: &NetworkObject) {
        self.processor.receive(object);
    }

    /// Drain everything queued for the network layer so far.
    pub fn outbound(&self) -> Vec<Outbound> {
        let mut items = Vec::new();
        if let Ok(mut rx) = self.outbound_rx.lock() {
            while let Ok(item) = rx.try_recv() {
                items.push(item);
            }
        }
        items
    }

    /// Seal `plaintext` for `recipient` and wrap it in a msg object signed by
    /// `signer`.
    pub fn msg_object(
        &self,
        recipient: &Address,
        plaintext: Plaintext,
        signer: &Pubkey,
        iv: InventoryVector,
    ) -> NetworkObject {
        let key = match &recipient.private_key {
            Some(private_key) => private_key.encryption_key.clone(),
            None => panic!("msg recipient {recipient} has no private key"),
        };
        let msg = self.cipher.seal_msg(&key, plaintext);
        NetworkObject::new(recipient.stream, TEST_EXPIRY, ObjectPayload::Msg(msg), iv)
            .with_signature(FakeCipher::sign(signer))
    }
}

/// The sender as it appears inside a decrypted message: address plus the
/// pubkey it claims.
pub fn sender_view(contact: &Address, pubkey: &Pubkey) -> Address {
    contact.clone().with_pubkey(pubkey.clone())
}
