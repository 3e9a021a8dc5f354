use anyhow::Result;
use bitpost_core::object::GetPubkey;
use bitpost_core::NetworkObject;

use super::ObjectProcessor;

impl ObjectProcessor {
    /// Answer a pubkey request if it names one of our identities.
    ///
    /// Chans share their keys among members and never answer; an identity
    /// without a private key cannot.
    pub(super) fn receive_get_pubkey(
        &self,
        object: &NetworkObject,
        request: &GetPubkey,
    ) -> Result<()> {
        let Some(identity) = self.ctx.addresses.find_identity(&request.target) else {
            return Ok(());
        };
        if identity.private_key.is_none() || identity.chan {
            tracing::debug!(identity = %identity, "not answering pubkey request");
            return Ok(());
        }

        tracing::info!(
            identity = %identity,
            stream = object.stream,
            "got pubkey request for identity"
        );
        self.ctx.key_responder.send_pubkey(&identity, object.stream);
        Ok(())
    }
}
