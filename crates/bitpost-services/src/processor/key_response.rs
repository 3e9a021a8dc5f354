use anyhow::Result;
use bitpost_core::crypto::CryptoError;
use bitpost_core::object::PubkeyPayload;

use super::ObjectProcessor;

impl ObjectProcessor {
    /// Learn a contact's pubkey. Only contacts whose key is still unknown are
    /// updated; a known key is never replaced.
    pub(super) fn receive_pubkey(&self, payload: &PubkeyPayload) -> Result<()> {
        match payload {
            PubkeyPayload::Tagged { tag, encrypted } => {
                let Some(contact) = self.ctx.addresses.find_contact_by_tag(tag) else {
                    return Ok(());
                };
                if contact.pubkey.is_some() {
                    return Ok(());
                }
                match self
                    .ctx
                    .cipher
                    .decrypt_pubkey(encrypted, &contact.public_decryption_key)
                {
                    Ok(pubkey) => self.update_pubkey(contact, pubkey),
                    Err(CryptoError::DecryptionFailed) => Ok(()),
                    Err(e) => {
                        tracing::debug!(tag = %tag, error = %e, "unreadable pubkey");
                        Ok(())
                    }
                }
            }
            PubkeyPayload::Legacy { ripe, pubkey } => {
                match self.ctx.addresses.find_contact_by_ripe(ripe) {
                    Some(contact) if contact.pubkey.is_none() => {
                        self.update_pubkey(contact, pubkey.clone())
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}
