use anyhow::Result;
use bitpost_core::crypto::CryptoError;
use bitpost_core::object::Msg;
use bitpost_core::NetworkObject;

use super::ObjectProcessor;

impl ObjectProcessor {
    /// Trial-decrypt a directed message with each local identity's key.
    ///
    /// The first identity that decrypts ends the search, whatever the
    /// signature check says after it. A message that opens for one identity
    /// but fails authentication is dropped, never retried under another.
    pub(super) fn receive_msg(&self, object: &NetworkObject, msg: &Msg) -> Result<()> {
        let iv = object.inventory_vector();

        for identity in self.ctx.addresses.identities() {
            let Some(private_key) = identity.private_key.as_ref() else {
                continue;
            };
            let mut plaintext = match self.ctx.cipher.decrypt_msg(msg, &private_key.encryption_key)
            {
                Ok(plaintext) => plaintext,
                Err(CryptoError::DecryptionFailed) => continue,
                Err(e) => {
                    tracing::debug!(iv = %iv, identity = %identity, error = %e, "unreadable msg");
                    continue;
                }
            };

            plaintext.to = Some(identity);
            let signed = plaintext
                .from
                .pubkey
                .as_ref()
                .is_some_and(|key| self.ctx.cipher.is_signature_valid(object, key));
            if !signed {
                tracing::warn!(
                    iv = %iv,
                    "msg was successfully decrypted, but signature check failed; ignoring"
                );
                return Ok(());
            }
            return self.finalize(object, plaintext);
        }

        tracing::trace!(iv = %iv, "msg is not for any local identity");
        Ok(())
    }
}
