//! bitpost-core: shared protocol types, the crypto seam, and configuration.
//! All other bitpost crates depend on this one.

pub mod address;
pub mod config;
pub mod crypto;
pub mod object;
pub mod plaintext;

pub use address::{Address, Feature, Pubkey, Ripe, RipeOrTag, Tag};
pub use object::{InventoryVector, NetworkObject, ObjectPayload, ObjectType, ACK_LENGTH};
pub use plaintext::{Encoding, Label, LabelKind, Plaintext, PlaintextType, Status};
