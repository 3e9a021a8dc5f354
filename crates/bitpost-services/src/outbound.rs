//! Outbound queue: everything the processor wants the network layer to do.
//!
//! The processor runs on blocking worker threads and never touches sockets.
//! Sends, pubkey responses, and inventory offers are pushed onto an unbounded
//! channel; the network layer drains the receiving end.

use bitpost_core::{Address, InventoryVector, Plaintext};
use tokio::sync::mpsc;

use crate::ports::{Announcer, KeyResponder, MessageSender};

/// One unit of outbound work.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// (Re)transmit a queued message.
    Message(Plaintext),
    /// Publish `identity`'s pubkey on `stream`.
    Pubkey { identity: Address, stream: u64 },
    /// Advertise an object from the local inventory.
    Offer(InventoryVector),
}

/// Sender half of the outbound channel. Cheap to clone.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl OutboundQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, item: Outbound) {
        if self.tx.send(item).is_err() {
            tracing::debug!("outbound receiver dropped, discarding outbound item");
        }
    }
}

impl MessageSender for OutboundQueue {
    fn send(&self, message: Plaintext) {
        self.push(Outbound::Message(message));
    }
}

impl KeyResponder for OutboundQueue {
    fn send_pubkey(&self, identity: &Address, stream: u64) {
        self.push(Outbound::Pubkey {
            identity: identity.clone(),
            stream,
        });
    }
}

impl Announcer for OutboundQueue {
    fn offer(&self, iv: InventoryVector) {
        self.push(Outbound::Offer(iv));
    }
}
