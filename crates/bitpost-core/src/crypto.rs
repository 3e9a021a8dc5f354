//! Cryptographic seam for bitpost.
//!
//! Provides two things:
//!   1. BLAKE3 hashing for inventory vectors of locally built objects,
//!      ripe-hashes, and the per-address secret (decryption key + tag)
//!   2. `ObjectCipher`, the trait the processing core calls to trial-decrypt
//!      payloads and check envelope signatures
//!
//! The curve math behind `ObjectCipher` lives outside this workspace. The core
//! only orchestrates it: a wrong key is an ordinary `Err(DecryptionFailed)`,
//! never a panic.
//!
//! All secret key material derives ZeroizeOnDrop and is wiped from memory when dropped.

use bytes::Bytes;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::address::{Pubkey, Ripe, Tag};
use crate::object::{Broadcast, Msg, NetworkObject};
use crate::plaintext::Plaintext;

// ── BLAKE3 ────────────────────────────────────────────────────────────────────

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Incremental BLAKE3 hasher for identifiers built from several fields.
///
/// # Example
/// ```
/// use bitpost_core::crypto::Hasher;
/// let mut h = Hasher::new();
/// h.update(b"hello ");
/// h.update(b"world");
/// let digest = h.finalize();
/// assert_eq!(digest, bitpost_core::crypto::hash(b"hello world"));
/// ```
pub struct Hasher(blake3::Hasher);

impl Hasher {
    pub fn new() -> Self {
        Self(blake3::Hasher::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        *self.0.finalize().as_bytes()
    }

    /// Extendable output, for derivations that need more than 32 bytes.
    pub fn finalize_into(self, out: &mut [u8]) {
        self.0.finalize_xof().fill(out);
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Ripe-hash of a public key pair: the first 20 bytes of
/// `BLAKE3(signing_key || encryption_key)`.
pub fn ripe_of(signing_key: &[u8], encryption_key: &[u8]) -> Ripe {
    let mut h = Hasher::new();
    h.update(signing_key);
    h.update(encryption_key);
    let digest = h.finalize();
    let mut ripe = [0u8; 20];
    ripe.copy_from_slice(&digest[..20]);
    Ripe(ripe)
}

/// Derive the public decryption key and tag of an address.
///
///   secret = BLAKE3-XOF(version_le || stream_le || ripe)[..64]
///   decryption key = secret[..32], tag = secret[32..]
///
/// Anyone who knows the address can compute both, which is what lets a
/// subscriber open broadcasts and a contact's tagged pubkey.
pub fn address_secret(version: u64, stream: u64, ripe: &Ripe) -> (SecretKey, Tag) {
    let mut h = Hasher::new();
    h.update(&version.to_le_bytes());
    h.update(&stream.to_le_bytes());
    h.update(&ripe.0);
    let mut out = Zeroizing::new([0u8; 64]);
    h.finalize_into(&mut out[..]);

    let mut key = [0u8; 32];
    key.copy_from_slice(&out[..32]);
    let mut tag = [0u8; 32];
    tag.copy_from_slice(&out[32..]);
    (SecretKey::from_bytes(key), Tag(tag))
}

// ── Keys ──────────────────────────────────────────────────────────────────────

/// A 32-byte private scalar. Zeroized on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// The private half of an owned identity.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    pub signing_key: SecretKey,
    pub encryption_key: SecretKey,
}

impl PrivateKey {
    pub fn new(signing_key: [u8; 32], encryption_key: [u8; 32]) -> Self {
        Self {
            signing_key: SecretKey::from_bytes(signing_key),
            encryption_key: SecretKey::from_bytes(encryption_key),
        }
    }
}

// ── Cipher seam ───────────────────────────────────────────────────────────────

/// Decryption and signature checks for inbound objects.
///
/// Implementations are pure CPU work and must be callable from many threads at
/// once. Trial decryption is the normal mode of operation: the processor calls
/// `decrypt_*` once per candidate key and moves on when it gets
/// `Err(CryptoError::DecryptionFailed)`.
pub trait ObjectCipher: Send + Sync {
    /// Open a directed message with a local identity's private encryption key.
    fn decrypt_msg(&self, msg: &Msg, key: &SecretKey) -> Result<Plaintext, CryptoError>;

    /// Open a broadcast with a subscription's public decryption key.
    fn decrypt_broadcast(
        &self,
        broadcast: &Broadcast,
        key: &SecretKey,
    ) -> Result<Plaintext, CryptoError>;

    /// Open a tagged (v4) pubkey with the contact's public decryption key.
    fn decrypt_pubkey(&self, encrypted: &Bytes, key: &SecretKey) -> Result<Pubkey, CryptoError>;

    /// Check the envelope signature of `object` against `pubkey`'s signing key.
    fn is_signature_valid(&self, object: &NetworkObject, pubkey: &Pubkey) -> bool;
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key does not open this payload. Expected during trial decryption.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("malformed payload: {0}")]
    Malformed(String),
}
