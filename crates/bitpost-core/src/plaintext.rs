//! Decrypted messages and their lifecycle.
//!
//! A `Plaintext` is what a `Msg` or `Broadcast` object turns into once a key
//! opens it. Outgoing messages use the same type: they sit in the store with a
//! status such as `PubkeyRequested` until the network layer can send them.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::object::{InventoryVector, NetworkObject};

/// Plaintext type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaintextType {
    Msg,
    Broadcast,
}

/// Message body encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Encoding {
    Ignore = 0,
    Trivial = 1,
    /// `Subject:<subject>\nBody:<body>`
    Simple = 2,
    Extended = 3,
}

impl Encoding {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ignore),
            1 => Some(Self::Trivial),
            2 => Some(Self::Simple),
            3 => Some(Self::Extended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Draft,
    /// Cannot send yet; the recipient's pubkey is unknown.
    PubkeyRequested,
    /// Queued for proof of work and transmission.
    Sending,
    Sent,
    SentAcknowledged,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Inbox,
    Broadcast,
    Drafts,
    Outbox,
    Sent,
    Unread,
    Trash,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub kind: LabelKind,
}

impl Label {
    pub fn new(name: impl Into<String>, kind: LabelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Complete plaintext message
#[derive(Debug, Clone)]
pub struct Plaintext {
    /// Store-assigned id. `None` until the first save.
    pub id: Option<u64>,

    pub kind: PlaintextType,

    pub from: Address,

    /// Recipient identity. Always `None` for broadcasts.
    pub to: Option<Address>,

    pub encoding: Encoding,

    pub message: Bytes,

    /// Data the recipient echoes back as an acknowledgement.
    pub ack_data: Option<Bytes>,

    /// Pre-built acknowledgement object the recipient publishes on receipt.
    pub ack_message: Option<NetworkObject>,

    pub status: Status,

    pub labels: Vec<Label>,

    /// Inventory vector of the object this message arrived in.
    pub inventory_vector: Option<InventoryVector>,

    /// Unix timestamp in seconds
    pub received: Option<u64>,
}

impl Plaintext {
    /// Create a directed message
    pub fn msg(from: Address, to: Address, encoding: Encoding, message: impl AsRef<[u8]>) -> Self {
        let message = Bytes::copy_from_slice(message.as_ref());
        Self::build(PlaintextType::Msg, from, Some(to), encoding, message)
    }

    /// Create a broadcast
    pub fn broadcast(from: Address, encoding: Encoding, message: impl AsRef<[u8]>) -> Self {
        let message = Bytes::copy_from_slice(message.as_ref());
        Self::build(PlaintextType::Broadcast, from, None, encoding, message)
    }

    /// Create a directed message in simple encoding
    pub fn simple(from: Address, to: Address, subject: &str, body: &str) -> Self {
        Self::msg(from, to, Encoding::Simple, format!("Subject:{subject}\nBody:{body}"))
    }

    fn build(
        kind: PlaintextType,
        from: Address,
        to: Option<Address>,
        encoding: Encoding,
        message: Bytes,
    ) -> Self {
        Self {
            id: None,
            kind,
            from,
            to,
            encoding,
            message,
            ack_data: None,
            ack_message: None,
            status: Status::Draft,
            labels: Vec::new(),
            inventory_vector: None,
            received: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Attach the acknowledgement object. Its data becomes `ack_data`.
    pub fn with_ack_message(mut self, ack: NetworkObject) -> Self {
        if let crate::object::ObjectPayload::Generic(generic) = &ack.payload {
            self.ack_data = Some(generic.data.clone());
        }
        self.ack_message = Some(ack);
        self
    }

    pub fn with_ack_data(mut self, ack_data: impl Into<Bytes>) -> Self {
        self.ack_data = Some(ack_data.into());
        self
    }

    /// Record delivery: which object it came in and when.
    pub fn delivered_in(mut self, iv: InventoryVector) -> Self {
        self.inventory_vector = Some(iv);
        self.received = Some(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        );
        self
    }

    pub fn has_label(&self, kind: LabelKind) -> bool {
        self.labels.iter().any(|l| l.kind == kind)
    }

    /// Subject line for simple encoding, `None` otherwise.
    pub fn subject(&self) -> Option<String> {
        self.simple_parts().map(|(subject, _)| subject)
    }

    /// Message text. For simple encoding this is the body without the subject.
    pub fn text(&self) -> String {
        match self.simple_parts() {
            Some((_, body)) => body,
            None => String::from_utf8_lossy(&self.message).into_owned(),
        }
    }

    fn simple_parts(&self) -> Option<(String, String)> {
        if self.encoding != Encoding::Simple {
            return None;
        }
        let text = String::from_utf8_lossy(&self.message);
        let rest = text.strip_prefix("Subject:")?;
        match rest.split_once("\nBody:") {
            Some((subject, body)) => Some((subject.to_string(), body.to_string())),
            None => Some((rest.to_string(), String::new())),
        }
    }
}
