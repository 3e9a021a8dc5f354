//! In-memory identity & contact store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bitpost_core::{Address, Pubkey, Ripe, RipeOrTag, Tag};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::ports::AddressRepository;

/// Addresses keyed by protocol address string.
///
/// Enumeration follows insertion order. Saving an address whose pubkey is
/// already known keeps the known pubkey.
#[derive(Clone, Default)]
pub struct AddressBook {
    /// address string -> (insertion sequence, address)
    addresses: Arc<DashMap<String, (u64, Address)>>,
    next_seq: Arc<AtomicU64>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an address by protocol address string.
    pub fn get(&self, address: &str) -> Option<Address> {
        self.addresses.get(address).map(|e| e.value().1.clone())
    }

    /// Count stored addresses
    pub fn count(&self) -> usize {
        self.addresses.len()
    }

    /// Addresses matching `filter`, in insertion order.
    fn collect(&self, filter: impl Fn(&Address) -> bool) -> Vec<Address> {
        let mut found: Vec<(u64, Address)> = self
            .addresses
            .iter()
            .filter(|e| filter(&e.value().1))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, a)| a).collect()
    }

    fn find(&self, filter: impl Fn(&Address) -> bool) -> Option<Address> {
        self.collect(filter).into_iter().next()
    }
}

impl AddressRepository for AddressBook {
    fn find_identity(&self, target: &RipeOrTag) -> Option<Address> {
        self.find(|a| a.is_identity() && a.matches(target))
    }

    fn find_contact_by_tag(&self, tag: &Tag) -> Option<Address> {
        self.find(|a| !a.is_identity() && a.tag == *tag)
    }

    fn find_contact_by_ripe(&self, ripe: &Ripe) -> Option<Address> {
        self.find(|a| !a.is_identity() && a.ripe == *ripe)
    }

    fn identities(&self) -> Vec<Address> {
        self.collect(|a| a.is_identity())
    }

    fn find_address(&self, address: &str) -> Option<Address> {
        self.get(address)
    }

    fn subscriptions(&self, broadcast_version: u64) -> Vec<Address> {
        // v4 broadcasts come from addresses up to version 3, v5 from version 4 on.
        self.collect(|a| {
            a.subscribed
                && if broadcast_version > 4 {
                    a.version > 3
                } else {
                    a.version <= 3
                }
        })
    }

    fn save(&self, address: Address) -> Result<(), StoreError> {
        match self.addresses.entry(address.address.clone()) {
            Entry::Occupied(mut e) => {
                let (_, existing) = e.get_mut();
                let known = existing.pubkey.take();
                *existing = address;
                if known.is_some() {
                    existing.pubkey = known;
                }
            }
            Entry::Vacant(e) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                e.insert((seq, address));
            }
        }
        Ok(())
    }

    fn set_pubkey_if_absent(
        &self,
        address: &str,
        pubkey: Pubkey,
    ) -> Result<Option<Address>, StoreError> {
        // The shard lock is held from the check to the write.
        let Some(mut entry) = self.addresses.get_mut(address) else {
            return Ok(None);
        };
        let (_, stored) = entry.value_mut();
        if stored.pubkey.is_some() {
            return Ok(None);
        }
        stored.pubkey = Some(pubkey);
        Ok(Some(stored.clone()))
    }
}
