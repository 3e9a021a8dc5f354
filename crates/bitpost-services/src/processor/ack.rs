use anyhow::Result;
use bitpost_core::object::GenericPayload;
use bitpost_core::{Status, ACK_LENGTH};

use super::ObjectProcessor;

impl ObjectProcessor {
    /// Mark a sent message acknowledged when its ack data comes back.
    pub(super) fn receive_ack(&self, payload: &GenericPayload) -> Result<()> {
        if payload.data.len() != ACK_LENGTH {
            return Ok(());
        }

        let Some(message) = self.ctx.messages.find_message_for_ack(&payload.data) else {
            tracing::debug!(ack = %hex::encode(&payload.data), "ack for unknown message");
            return Ok(());
        };
        let previous = message.status;
        if previous == Status::SentAcknowledged {
            tracing::trace!(id = ?message.id, "message already acknowledged");
            return Ok(());
        }

        // A concurrent copy of the same ack may have won since the lookup.
        let message = self.ctx.labeler.mark_as_acknowledged(message);
        let id = message.id;
        if !self.ctx.messages.save_if_status(message, previous)? {
            tracing::trace!(id = ?id, "message already acknowledged");
            return Ok(());
        }
        tracing::info!(id = ?id, "message acknowledged");
        Ok(())
    }
}
