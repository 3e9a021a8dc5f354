use anyhow::Result;
use bitpost_core::crypto::CryptoError;
use bitpost_core::object::Broadcast;
use bitpost_core::NetworkObject;

use super::ObjectProcessor;

impl ObjectProcessor {
    /// Try a broadcast against every subscription able to have sent it.
    ///
    /// Tagged broadcasts only go to the subscription with that tag. There is
    /// no early exit: each candidate that decrypts and verifies is finalized,
    /// and the message store collapses repeats of the same object.
    pub(super) fn receive_broadcast(
        &self,
        object: &NetworkObject,
        broadcast: &Broadcast,
    ) -> Result<()> {
        let iv = object.inventory_vector();
        let candidates = self
            .ctx
            .addresses
            .subscriptions(broadcast.version)
            .into_iter()
            .filter(|subscription| broadcast.tag.map_or(true, |tag| subscription.tag == tag));

        for subscription in candidates {
            let plaintext = match self
                .ctx
                .cipher
                .decrypt_broadcast(broadcast, &subscription.public_decryption_key)
            {
                Ok(plaintext) => plaintext,
                Err(CryptoError::DecryptionFailed) => continue,
                Err(e) => {
                    tracing::debug!(
                        iv = %iv,
                        subscription = %subscription,
                        error = %e,
                        "unreadable broadcast"
                    );
                    continue;
                }
            };

            let signed = plaintext
                .from
                .pubkey
                .as_ref()
                .is_some_and(|key| self.ctx.cipher.is_signature_valid(object, key));
            if !signed {
                tracing::warn!(iv = %iv, subscription = %subscription, "broadcast with invalid signature");
                continue;
            }
            self.finalize(object, plaintext)?;
        }
        Ok(())
    }
}
