//! Collaborator contracts of the processing core.
//!
//! The processor never owns storage, sockets, or UI. Everything it touches
//! goes through one of these traits, handed to `ObjectProcessor::new` once.
//! This crate ships in-memory implementations of the stores and the outbound
//! side; a real node plugs in its own.
//!
//! Per-entity updates must be atomic from the implementation's side. The
//! processor never locks; where two handlers may race on one entity it uses
//! the conditional writes `set_pubkey_if_absent` and `save_if_status`.

use bitpost_core::{
    Address, InventoryVector, NetworkObject, Plaintext, Pubkey, Ripe, RipeOrTag, Status, Tag,
};

use crate::error::StoreError;

/// Identity & contact store.
pub trait AddressRepository: Send + Sync {
    /// Owned identity (has a private key) matching a key request target.
    fn find_identity(&self, target: &RipeOrTag) -> Option<Address>;

    /// Contact (no private key) with this tag.
    fn find_contact_by_tag(&self, tag: &Tag) -> Option<Address>;

    /// Contact (no private key) with this ripe-hash.
    fn find_contact_by_ripe(&self, ripe: &Ripe) -> Option<Address>;

    /// All owned identities, in the store's enumeration order.
    fn identities(&self) -> Vec<Address>;

    /// Any address, identity or contact, by protocol address string.
    fn find_address(&self, address: &str) -> Option<Address>;

    /// Subscriptions able to send broadcasts of `broadcast_version`.
    fn subscriptions(&self, broadcast_version: u64) -> Vec<Address>;

    fn save(&self, address: Address) -> Result<(), StoreError>;

    /// Attach `pubkey` to the address stored under `address` unless it
    /// already has one. Atomic per address: of several concurrent calls at
    /// most one returns the updated address, and only that caller may act on
    /// the new key.
    fn set_pubkey_if_absent(
        &self,
        address: &str,
        pubkey: Pubkey,
    ) -> Result<Option<Address>, StoreError>;
}

/// Plaintext message store.
pub trait MessageRepository: Send + Sync {
    /// Messages in `status` addressed to `recipient`.
    fn find_messages(&self, status: Status, recipient: &Address) -> Vec<Plaintext>;

    /// The sent message whose ack data equals `ack_data`.
    fn find_message_for_ack(&self, ack_data: &[u8]) -> Option<Plaintext>;

    /// Insert or update. Returns the stored message with its id assigned.
    ///
    /// Fails with `StoreError::AlreadyStored` when a new message carries an
    /// inventory vector that is already stored.
    fn save(&self, message: Plaintext) -> Result<Plaintext, StoreError>;

    /// Update a stored message only while its stored status is still
    /// `expected`. Returns `false`, writing nothing, when another writer
    /// changed the status first.
    fn save_if_status(&self, message: Plaintext, expected: Status) -> Result<bool, StoreError>;
}

/// Local object inventory. Holds objects this node publishes.
pub trait Inventory: Send + Sync {
    fn store_object(&self, object: NetworkObject) -> Result<(), StoreError>;
}

/// Advertises newly stored objects to peers.
pub trait Announcer: Send + Sync {
    fn offer(&self, iv: InventoryVector);
}

/// Hands a message to the outbound pipeline (proof of work, then the network).
pub trait MessageSender: Send + Sync {
    fn send(&self, message: Plaintext);
}

/// Publishes an identity's pubkey on a stream.
pub trait KeyResponder: Send + Sync {
    fn send_pubkey(&self, identity: &Address, stream: u64);
}

/// Status and label transitions.
pub trait Labeler: Send + Sync {
    /// Classify a freshly received message.
    fn set_labels(&self, message: Plaintext) -> Plaintext;

    fn mark_as_sending(&self, message: Plaintext) -> Plaintext;

    fn mark_as_acknowledged(&self, message: Plaintext) -> Plaintext;
}

/// Application layer callback.
pub trait MessageListener: Send + Sync {
    fn receive(&self, message: &Plaintext);
}
