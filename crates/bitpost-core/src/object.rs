//! Network objects as the processing core sees them.
//!
//! By the time a `NetworkObject` reaches this crate it has been parsed and its
//! proof of work checked. What is left is an envelope (stream, expiry,
//! signature, inventory vector) around exactly one `ObjectPayload` variant.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::{Pubkey, Ripe, RipeOrTag, Tag};
use crate::crypto::Hasher;

/// Length of the acknowledgement data a sender embeds in every message.
pub const ACK_LENGTH: usize = 32;

// ── Inventory vector ──────────────────────────────────────────────────────────

/// Content-derived identifier of a network object.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InventoryVector(pub [u8; 32]);

impl InventoryVector {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for InventoryVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for InventoryVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InventoryVector({})", hex::encode(&self.0[..8]))
    }
}

impl Serialize for InventoryVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for InventoryVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
        Ok(Self(arr))
    }
}

// ── Object types ──────────────────────────────────────────────────────────────

/// Declared object type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ObjectType {
    GetPubkey = 0,
    Pubkey = 1,
    Msg = 2,
    Broadcast = 3,
}

impl ObjectType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::GetPubkey),
            1 => Some(Self::Pubkey),
            2 => Some(Self::Msg),
            3 => Some(Self::Broadcast),
            _ => None,
        }
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Request for the pubkey of the identity named by `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPubkey {
    pub version: u64,
    pub target: RipeOrTag,
}

/// A published pubkey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubkeyPayload {
    /// Versions 2 and 3: sent in the clear, indexed by ripe-hash.
    Legacy { ripe: Ripe, pubkey: Pubkey },
    /// Version 4: encrypted with the address's public decryption key,
    /// indexed by tag.
    Tagged { tag: Tag, encrypted: Bytes },
}

/// Directed encrypted message. Nothing outside the ciphertext says who it is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msg {
    pub encrypted: Bytes,
}

/// Encrypted broadcast. Version 5 broadcasts carry the sender's tag so
/// receivers only try the matching subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub version: u64,
    pub tag: Option<Tag>,
    pub encrypted: Bytes,
}

impl Broadcast {
    /// Untagged broadcast, tried against every subscription of matching version.
    pub fn v4(encrypted: impl Into<Bytes>) -> Self {
        Self {
            version: 4,
            tag: None,
            encrypted: encrypted.into(),
        }
    }

    pub fn v5(tag: Tag, encrypted: impl Into<Bytes>) -> Self {
        Self {
            version: 5,
            tag: Some(tag),
            encrypted: encrypted.into(),
        }
    }
}

/// A payload without a declared type. Acknowledgements travel this way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericPayload {
    pub object_type: u32,
    pub version: u64,
    pub data: Bytes,
}

/// Exactly one of the payload shapes the core understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectPayload {
    GetPubkey(GetPubkey),
    Pubkey(PubkeyPayload),
    Msg(Msg),
    Broadcast(Broadcast),
    Generic(GenericPayload),
    /// A declared type at a payload version this node does not parse.
    Unknown { object_type: u32, version: u64 },
}

impl ObjectPayload {
    /// The declared type, if any. `Generic` payloads have none.
    pub fn object_type(&self) -> Option<ObjectType> {
        match self {
            ObjectPayload::GetPubkey(_) => Some(ObjectType::GetPubkey),
            ObjectPayload::Pubkey(_) => Some(ObjectType::Pubkey),
            ObjectPayload::Msg(_) => Some(ObjectType::Msg),
            ObjectPayload::Broadcast(_) => Some(ObjectType::Broadcast),
            ObjectPayload::Generic(_) => None,
            ObjectPayload::Unknown { object_type, .. } => ObjectType::from_u32(*object_type),
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// An inbound (or locally built) network object. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkObject {
    pub stream: u64,
    /// Unix time in seconds after which peers drop the object.
    pub expires_time: u64,
    pub payload: ObjectPayload,
    pub signature: Bytes,
    inventory_vector: InventoryVector,
}

impl NetworkObject {
    /// Wrap a parsed payload. The inventory vector is computed by the network
    /// layer over the serialized object and handed in as-is.
    pub fn new(
        stream: u64,
        expires_time: u64,
        payload: ObjectPayload,
        inventory_vector: InventoryVector,
    ) -> Self {
        Self {
            stream,
            expires_time,
            payload,
            signature: Bytes::new(),
            inventory_vector,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<Bytes>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Build the acknowledgement object a sender embeds in an outgoing message.
    ///
    ///   iv = BLAKE3(stream_le || expires_le || ack_data)
    pub fn ack(stream: u64, expires_time: u64, ack_data: impl Into<Bytes>) -> Self {
        let data: Bytes = ack_data.into();
        let mut h = Hasher::new();
        h.update(&stream.to_le_bytes());
        h.update(&expires_time.to_le_bytes());
        h.update(&data);
        let iv = InventoryVector(h.finalize());

        Self::new(
            stream,
            expires_time,
            ObjectPayload::Generic(GenericPayload {
                object_type: ObjectType::Msg as u32,
                version: 1,
                data,
            }),
            iv,
        )
    }

    pub fn inventory_vector(&self) -> InventoryVector {
        self.inventory_vector
    }

    pub fn object_type(&self) -> Option<ObjectType> {
        self.payload.object_type()
    }
}
