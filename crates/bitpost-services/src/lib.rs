//! bitpost-services: the inbound-object processor, its collaborator
//! contracts, in-memory stores, and the object worker.

pub mod address_store;
pub mod error;
pub mod inventory;
pub mod labeler;
pub mod message_store;
pub mod outbound;
pub mod ports;
pub mod processor;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use address_store::AddressBook;
pub use error::StoreError;
pub use inventory::ObjectInventory;
pub use labeler::DefaultLabeler;
pub use message_store::MessageStore;
pub use outbound::{Outbound, OutboundQueue};
pub use ports::{
    AddressRepository, Announcer, Inventory, KeyResponder, Labeler, MessageListener,
    MessageRepository, MessageSender,
};
pub use processor::{Collaborators, ObjectProcessor};
pub use worker::ObjectWorker;
