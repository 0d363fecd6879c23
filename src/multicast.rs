//! Multicast filter table.
//!
//! Eight reference-counted multicast addresses plus the 64-bit hash filter
//! derived from them. The hardware hash filter is an approximation; the
//! receive path calls [`MulticastTable::contains`] to reject frames that
//! merely collide with a registered address's hash slot.

use smoltcp::wire::EthernetAddress;

use crate::error::Error;
use crate::util::crc32;

/// Number of multicast address slots.
pub const MULTICAST_SLOTS: usize = 8;

#[derive(Clone, Copy)]
struct Entry {
    address: EthernetAddress,
    /// Zero marks a free slot; occupied slots hold their registration count.
    refs: u8,
}

/// Fixed-capacity, reference-counted multicast address set.
pub struct MulticastTable {
    entries: [Entry; MULTICAST_SLOTS],
}

impl MulticastTable {
    pub const fn new() -> Self {
        Self {
            entries: [Entry { address: EthernetAddress([0; 6]), refs: 0 }; MULTICAST_SLOTS],
        }
    }

    /// Register `address`. A repeat registration bumps the reference count
    /// and reports that the hardware filter is unchanged.
    ///
    /// Returns `true` when the hash filter must be reprogrammed.
    pub fn add(&mut self, address: EthernetAddress) -> Result<bool, Error> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.refs > 0 && e.address == address) {
            entry.refs = entry.refs.saturating_add(1);
            return Ok(false);
        }
        match self.entries.iter_mut().find(|e| e.refs == 0) {
            Some(slot) => {
                *slot = Entry { address, refs: 1 };
                Ok(true)
            }
            None => Err(Error::TableFull),
        }
    }

    /// Drop one registration of `address`. The slot is freed, and the hash
    /// filter must be recomputed, only when the last registration goes.
    ///
    /// Returns `true` when the hash filter must be reprogrammed. Removing
    /// an address that is not registered is a no-op.
    pub fn remove(&mut self, address: EthernetAddress) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.refs > 0 && e.address == address) {
            entry.refs -= 1;
            return entry.refs == 0;
        }
        false
    }

    /// Exact-match lookup, used to disambiguate hash collisions.
    pub fn contains(&self, address: EthernetAddress) -> bool {
        self.entries.iter().any(|e| e.refs > 0 && e.address == address)
    }

    /// Hash-filter words (EHT1..EHT4) covering the registered set.
    ///
    /// Each address selects one of 64 filter bits via CRC-32 bits 28:23.
    pub fn hash_words(&self) -> [u16; 4] {
        let mut words = [0u16; 4];
        for entry in self.entries.iter().filter(|e| e.refs > 0) {
            let slot = hash_slot(entry.address);
            words[(slot / 16) as usize] |= 1 << (slot % 16);
        }
        words
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.refs > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MulticastTable {
    fn default() -> Self {
        Self::new()
    }
}

/// 6-bit hash-filter slot for an address.
fn hash_slot(address: EthernetAddress) -> u8 {
    ((crc32(address.as_bytes()) >> 23) & 0x3F) as u8
}
