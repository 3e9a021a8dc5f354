//! Routes inbound network objects to the handler for their payload.
//!
//! ```text
//! receive ─┬─ GetPubkey ──> key_request   (answer for a local identity)
//!          ├─ Pubkey ─────> key_response  (learn a contact's key, flush queue)
//!          ├─ Msg ────────> msg           ─┐
//!          ├─ Broadcast ──> broadcast     ─┴─> finalize (store, notify, ack)
//!          ├─ Generic ────> ack           (close the loop on a sent message)
//!          └─ Unknown ────> dropped
//! ```
//!
//! Nothing a handler does escapes `receive`. Expected non-matches are silent;
//! collaborator failures are logged here and the object is dropped.

mod ack;
mod broadcast;
mod finalize;
mod key_request;
mod key_response;
mod msg;

use std::sync::Arc;

use anyhow::Result;
use bitpost_core::config::AckConfig;
use bitpost_core::crypto::ObjectCipher;
use bitpost_core::{Address, NetworkObject, ObjectPayload, Pubkey, Status};

use crate::ports::{
    AddressRepository, Announcer, Inventory, KeyResponder, Labeler, MessageListener,
    MessageRepository, MessageSender,
};

/// Everything the processor talks to. Injected once at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub addresses: Arc<dyn AddressRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub inventory: Arc<dyn Inventory>,
    pub announcer: Arc<dyn Announcer>,
    pub sender: Arc<dyn MessageSender>,
    pub key_responder: Arc<dyn KeyResponder>,
    pub labeler: Arc<dyn Labeler>,
    pub listener: Arc<dyn MessageListener>,
    pub cipher: Arc<dyn ObjectCipher>,
}

/// The inbound-object processing core. `Send + Sync`; one instance may
/// process many objects concurrently.
pub struct ObjectProcessor {
    ctx: Collaborators,
    ack: AckConfig,
}

impl ObjectProcessor {
    pub fn new(ctx: Collaborators, ack: AckConfig) -> Self {
        Self { ctx, ack }
    }

    /// Process one inbound object to completion.
    pub fn receive(&self, object: &NetworkObject) {
        let result = match &object.payload {
            ObjectPayload::GetPubkey(request) => self.receive_get_pubkey(object, request),
            ObjectPayload::Pubkey(pubkey) => self.receive_pubkey(pubkey),
            ObjectPayload::Msg(msg) => self.receive_msg(object, msg),
            ObjectPayload::Broadcast(broadcast) => self.receive_broadcast(object, broadcast),
            ObjectPayload::Generic(generic) => self.receive_ack(generic),
            ObjectPayload::Unknown {
                object_type,
                version,
            } => {
                tracing::trace!(
                    iv = %object.inventory_vector(),
                    object_type,
                    version,
                    "ignoring object of unsupported type"
                );
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(
                iv = %object.inventory_vector(),
                error = %e,
                "object processing failed"
            );
        }
    }

    /// Attach a newly learned pubkey to `contact`, persist it, and send every
    /// message that was waiting for it.
    ///
    /// Only the caller that actually stores the key flushes the queue. A
    /// concurrent response for the same contact finds the key already set and
    /// does nothing, so queued messages go out once and under the stored key.
    fn update_pubkey(&self, contact: Address, pubkey: Pubkey) -> Result<()> {
        let Some(contact) = self
            .ctx
            .addresses
            .set_pubkey_if_absent(&contact.address, pubkey)?
        else {
            tracing::debug!(contact = %contact, "pubkey already known, nothing to flush");
            return Ok(());
        };
        tracing::info!(contact = %contact, "got pubkey for contact");

        let queued = self
            .ctx
            .messages
            .find_messages(Status::PubkeyRequested, &contact);
        tracing::info!(
            contact = %contact,
            count = queued.len(),
            "sending messages queued for contact"
        );

        for mut message in queued {
            message.to = Some(contact.clone());
            let message = self.ctx.labeler.mark_as_sending(message);
            if self
                .ctx
                .messages
                .save_if_status(message.clone(), Status::PubkeyRequested)?
            {
                self.ctx.sender.send(message);
            }
        }
        Ok(())
    }
}
