use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bitpost_core::{Address, InventoryVector, Plaintext, PlaintextType, Status};

use crate::error::StoreError;
use crate::ports::MessageRepository;

/// In-memory message store
#[derive(Clone, Default)]
pub struct MessageStore {
    /// Messages by id
    messages: Arc<DashMap<u64, Plaintext>>,
    /// Inventory vector -> id, for received messages
    by_iv: Arc<DashMap<InventoryVector, u64>>,
    next_id: Arc<AtomicU64>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a message by id
    pub fn get(&self, id: u64) -> Option<Plaintext> {
        self.messages.get(&id).map(|m| m.clone())
    }

    /// All messages, oldest first
    pub fn all(&self) -> Vec<Plaintext> {
        self.filtered(|_| true)
    }

    /// Count stored messages
    pub fn count(&self) -> usize {
        self.messages.len()
    }

    /// Clear all messages
    pub fn clear(&self) {
        self.messages.clear();
        self.by_iv.clear();
    }

    fn filtered(&self, filter: impl Fn(&Plaintext) -> bool) -> Vec<Plaintext> {
        let mut found: Vec<Plaintext> = self
            .messages
            .iter()
            .filter(|e| filter(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|m| m.id);
        found
    }

    fn assign_id(&self, mut message: Plaintext) -> Plaintext {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        message.id = Some(id);
        self.messages.insert(id, message.clone());
        message
    }
}

impl MessageRepository for MessageStore {
    fn find_messages(&self, status: Status, recipient: &Address) -> Vec<Plaintext> {
        self.filtered(|m| {
            m.status == status
                && m.to
                    .as_ref()
                    .is_some_and(|to| to.address == recipient.address)
        })
    }

    fn find_message_for_ack(&self, ack_data: &[u8]) -> Option<Plaintext> {
        self.filtered(|m| {
            m.kind == PlaintextType::Msg && m.ack_data.as_deref() == Some(ack_data)
        })
        .into_iter()
        .next()
    }

    fn save(&self, message: Plaintext) -> Result<Plaintext, StoreError> {
        if let Some(id) = message.id {
            return match self.messages.get_mut(&id) {
                Some(mut stored) => {
                    *stored = message.clone();
                    Ok(message)
                }
                None => Err(StoreError::NotFound(id)),
            };
        }

        match message.inventory_vector {
            // Hold the iv entry until the message is in, so two concurrent
            // deliveries of one object cannot both insert.
            Some(iv) => match self.by_iv.entry(iv) {
                Entry::Occupied(_) => Err(StoreError::AlreadyStored(iv)),
                Entry::Vacant(e) => {
                    let stored = self.assign_id(message);
                    e.insert(stored.id.unwrap_or_default());
                    Ok(stored)
                }
            },
            None => Ok(self.assign_id(message)),
        }
    }

    fn save_if_status(&self, message: Plaintext, expected: Status) -> Result<bool, StoreError> {
        let id = message.id.ok_or(StoreError::NotStored)?;
        let mut stored = self.messages.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if stored.status != expected {
            return Ok(false);
        }
        *stored = message;
        Ok(true)
    }
}
