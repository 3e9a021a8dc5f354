//! Addresses, public keys, and the short identifiers derived from them.
//!
//! One `Address` type covers both sides of the conversation:
//!
//! - an owned identity carries a `PrivateKey` (and the matching `Pubkey`)
//! - a contact carries at most a `Pubkey`, absent until a key response or a
//!   signed message from that contact arrives
//!
//! Stores index addresses by ripe-hash (legacy pubkeys and key requests for
//! versions 2–3) or by tag (version 4+). Both are derived, never stored
//! independently of the address they describe.
//!
//! `Pubkey::with_pow_params` is for embedders building keys from parsed
//! payloads. The processing core only carries the values through.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::{self, PrivateKey, SecretKey};

// ── Identifiers ───────────────────────────────────────────────────────────────

/// 20-byte hash of an address's public key pair. Serialized as hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ripe(pub [u8; 20]);

/// 32-byte tag derived from version, stream, and ripe-hash. Serialized as hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub [u8; 32]);

fn decode_hex<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
    bytes
        .try_into()
        .map_err(|_| serde::de::Error::custom(format!("expected {N} bytes")))
}

impl Serialize for Ripe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Ripe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        decode_hex(deserializer).map(Self)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        decode_hex(deserializer).map(Self)
    }
}

impl fmt::Display for Ripe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// What a key request names: a ripe-hash for address versions below 4,
/// a tag from version 4 on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RipeOrTag {
    Ripe(Ripe),
    Tag(Tag),
}

// ── Pubkey ────────────────────────────────────────────────────────────────────

/// Behaviour flags a pubkey advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// The owner sends acknowledgements for messages it receives.
    DoesAck,
    /// Messages to this key must include the destination ripe.
    IncludeDestination,
}

impl Feature {
    pub fn bit(self) -> u32 {
        match self {
            Feature::DoesAck => 1,
            Feature::IncludeDestination => 1 << 1,
        }
    }

    pub fn bitfield(features: &[Feature]) -> u32 {
        features.iter().fold(0, |acc, f| acc | f.bit())
    }
}

/// Default proof-of-work parameters a version 2 pubkey implies.
pub const DEFAULT_NONCE_TRIALS_PER_BYTE: u64 = 1000;
pub const DEFAULT_EXTRA_BYTES: u64 = 1000;

/// A public key pair as published in a pubkey object.
///
/// Version 3 and later also carry the owner's proof-of-work demands.
/// Version 2 keys get the network defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pubkey {
    pub version: u64,
    pub stream: u64,
    pub behavior_bitfield: u32,
    pub signing_key: Bytes,
    pub encryption_key: Bytes,
    pub nonce_trials_per_byte: u64,
    pub extra_bytes: u64,
}

impl Pubkey {
    pub fn new(
        version: u64,
        stream: u64,
        signing_key: impl Into<Bytes>,
        encryption_key: impl Into<Bytes>,
    ) -> Self {
        Self {
            version,
            stream,
            behavior_bitfield: 0,
            signing_key: signing_key.into(),
            encryption_key: encryption_key.into(),
            nonce_trials_per_byte: DEFAULT_NONCE_TRIALS_PER_BYTE,
            extra_bytes: DEFAULT_EXTRA_BYTES,
        }
    }

    pub fn with_features(mut self, features: &[Feature]) -> Self {
        self.behavior_bitfield = Feature::bitfield(features);
        self
    }

    /// Proof-of-work parameters. Ignored for version 2 keys, which cannot
    /// express them.
    pub fn with_pow_params(mut self, nonce_trials_per_byte: u64, extra_bytes: u64) -> Self {
        if self.version >= 3 {
            self.nonce_trials_per_byte = nonce_trials_per_byte;
            self.extra_bytes = extra_bytes;
        }
        self
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.behavior_bitfield & feature.bit() != 0
    }

    pub fn ripe(&self) -> Ripe {
        crypto::ripe_of(&self.signing_key, &self.encryption_key)
    }
}

// ── Address ───────────────────────────────────────────────────────────────────

/// An owned identity or a contact.
#[derive(Debug, Clone)]
pub struct Address {
    /// Protocol address string. Opaque to this crate; used as the lookup key
    /// when a decrypted message names its sender.
    pub address: String,
    pub version: u64,
    pub stream: u64,
    pub ripe: Ripe,
    pub tag: Tag,
    /// Derived from the address itself, so anyone who knows the address has it.
    pub public_decryption_key: SecretKey,
    pub private_key: Option<PrivateKey>,
    pub pubkey: Option<Pubkey>,
    /// Shared-secret group identity. Never answers key requests.
    pub chan: bool,
    pub subscribed: bool,
    pub alias: Option<String>,
}

impl Address {
    /// A contact whose pubkey is not yet known.
    pub fn contact(address: impl Into<String>, version: u64, stream: u64, ripe: Ripe) -> Self {
        let (public_decryption_key, tag) = crypto::address_secret(version, stream, &ripe);
        Self {
            address: address.into(),
            version,
            stream,
            ripe,
            tag,
            public_decryption_key,
            private_key: None,
            pubkey: None,
            chan: false,
            subscribed: false,
            alias: None,
        }
    }

    /// An owned identity. Version and stream come from the pubkey.
    pub fn identity(address: impl Into<String>, private_key: PrivateKey, pubkey: Pubkey) -> Self {
        let mut identity = Self::contact(address, pubkey.version, pubkey.stream, pubkey.ripe());
        identity.private_key = Some(private_key);
        identity.pubkey = Some(pubkey);
        identity
    }

    pub fn into_chan(mut self) -> Self {
        self.chan = true;
        self
    }

    pub fn into_subscription(mut self) -> Self {
        self.subscribed = true;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns the address with `pubkey` attached. A pubkey that is already
    /// known is kept.
    pub fn with_pubkey(mut self, pubkey: Pubkey) -> Self {
        if self.pubkey.is_none() {
            self.pubkey = Some(pubkey);
        }
        self
    }

    pub fn is_identity(&self) -> bool {
        self.private_key.is_some()
    }

    /// Whether this address's pubkey advertises `feature`. False while the
    /// pubkey is unknown.
    pub fn has(&self, feature: Feature) -> bool {
        self.pubkey.as_ref().is_some_and(|p| p.has(feature))
    }

    pub fn matches(&self, target: &RipeOrTag) -> bool {
        match target {
            RipeOrTag::Ripe(ripe) => self.ripe == *ripe,
            RipeOrTag::Tag(tag) => self.tag == *tag,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{alias} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Address {}
