use anyhow::Result;
use bitpost_core::{Feature, NetworkObject, Plaintext, PlaintextType};

use crate::error::StoreError;

use super::ObjectProcessor;

impl ObjectProcessor {
    /// Deliver a decrypted, authenticated message.
    ///
    /// Order matters: the sender's key is learned before the message is
    /// stored, the listener only hears about messages that were actually
    /// stored, and the ack goes out last.
    pub(super) fn finalize(&self, object: &NetworkObject, message: Plaintext) -> Result<()> {
        let iv = object.inventory_vector();

        if let Some(pubkey) = &message.from.pubkey {
            if let Some(contact) = self.ctx.addresses.find_address(&message.from.address) {
                if contact.pubkey.is_none() {
                    self.update_pubkey(contact, pubkey.clone())?;
                }
            }
        }

        let message = self.ctx.labeler.set_labels(message.delivered_in(iv));
        let message = match self.ctx.messages.save(message) {
            Ok(stored) => stored,
            Err(StoreError::AlreadyStored(_)) => {
                tracing::trace!(iv = %iv, "received message was already stored");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(iv = %iv, id = ?message.id, from = %message.from, "message received");
        self.ctx.listener.receive(&message);

        let wants_ack = message.kind == PlaintextType::Msg
            && message.to.as_ref().is_some_and(|to| to.has(Feature::DoesAck));
        if wants_ack && self.ack.announce {
            match &message.ack_message {
                Some(ack) => {
                    self.ctx.inventory.store_object(ack.clone())?;
                    self.ctx.announcer.offer(ack.inventory_vector());
                }
                None => tracing::debug!(iv = %iv, "ack message expected"),
            }
        }
        Ok(())
    }
}
