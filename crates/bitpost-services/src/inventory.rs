//! In-memory object inventory for locally published objects.
//!
//! The processor only stores into it. Reads and `remove_expired` are for the
//! embedding node, which serves the objects to peers and prunes them on its
//! own schedule.

use std::sync::Arc;

use bitpost_core::{InventoryVector, NetworkObject};
use dashmap::DashMap;

use crate::error::StoreError;
use crate::ports::Inventory;

#[derive(Clone, Default)]
pub struct ObjectInventory {
    objects: Arc<DashMap<InventoryVector, NetworkObject>>,
}

impl ObjectInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, iv: &InventoryVector) -> Option<NetworkObject> {
        self.objects.get(iv).map(|o| o.clone())
    }

    pub fn contains(&self, iv: &InventoryVector) -> bool {
        self.objects.contains_key(iv)
    }

    pub fn count(&self) -> usize {
        self.objects.len()
    }

    /// Drop objects whose expiry is at or before `now` (unix seconds).
    /// Returns how many were removed.
    pub fn remove_expired(&self, now: u64) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, o| o.expires_time > now);
        before - self.objects.len()
    }
}

impl Inventory for ObjectInventory {
    fn store_object(&self, object: NetworkObject) -> Result<(), StoreError> {
        self.objects.insert(object.inventory_vector(), object);
        Ok(())
    }
}
