//! Protocol handler registry.
//!
//! A fixed 16-slot table mapping Ethernet protocol numbers to handler
//! capabilities. Mutated only from the foreground control path; the receive
//! path reads it at interrupt time, so handlers take `&self` and use
//! interior mutability for their own state.

use crate::error::Error;

/// Number of protocol handler slots.
pub const HANDLER_SLOTS: usize = 16;

/// Protocol number for 802.3/802.2 length-typed frames (type field below
/// 0x0600). The link-access layer registers for this instead of a literal
/// ethertype.
pub const PROTO_LENGTH_TYPED: u16 = 0x0000;

/// Reserved value marking a free table slot; never a valid ethertype.
const PROTO_FREE: u16 = 0x0001;

/// Protocol selector for handler registration and lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolId {
    /// 802.3 frames carrying a length instead of a type.
    LengthTyped,
    /// An Ethernet II ethertype (`>= 0x0600`).
    Ethertype(u16),
}

impl ProtocolId {
    /// Table key for this protocol. Type fields below 0x0600 are length
    /// fields, so they collapse onto the length-typed protocol.
    pub(crate) fn key(self) -> u16 {
        match self {
            ProtocolId::LengthTyped => PROTO_LENGTH_TYPED,
            ProtocolId::Ethertype(ty) if ty < 0x0600 => PROTO_LENGTH_TYPED,
            ProtocolId::Ethertype(ty) => ty,
        }
    }
}

/// Per-frame header facts handed to a protocol handler.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Destination address, verbatim from the wire.
    pub destination: smoltcp::wire::EthernetAddress,
    /// Source address, verbatim from the wire.
    pub source: smoltcp::wire::EthernetAddress,
    /// Raw type/length field.
    pub protocol: u16,
    /// Payload bytes still in controller memory, excluding header and FCS.
    pub payload_len: u16,
}

/// Capability to pull the remaining payload out of controller memory.
///
/// Valid only for the duration of one [`FrameSink::deliver`] call; the ring
/// storage is reclaimed as soon as the handler returns.
pub trait PayloadSource {
    /// Bytes not yet read.
    fn remaining(&self) -> u16;

    /// Copy up to `dst.len()` payload bytes into `dst`, advancing the read
    /// position. Returns the number of bytes copied, which is short only
    /// when the payload is exhausted.
    fn read(&mut self, dst: &mut [u8]) -> usize;
}

/// A registered protocol handler.
///
/// Called from the interrupt bottom half, never reentrantly. Anything the
/// handler keeps between calls is its own scratch state.
pub trait FrameSink {
    /// Take delivery of one frame. The handler may read any amount of the
    /// payload through `payload`, including none of it.
    fn deliver(&self, header: &FrameHeader, payload: &mut dyn PayloadSource);
}

#[derive(Clone, Copy)]
struct Slot<'h> {
    protocol: u16,
    sink: Option<&'h dyn FrameSink>,
}

/// Fixed-capacity protocol handler table.
pub struct HandlerTable<'h> {
    slots: [Slot<'h>; HANDLER_SLOTS],
}

impl<'h> HandlerTable<'h> {
    pub const fn new() -> Self {
        Self { slots: [Slot { protocol: PROTO_FREE, sink: None }; HANDLER_SLOTS] }
    }

    /// Register `sink` for `id`.
    ///
    /// `sink` may be `None`: a registration that reserves the protocol but
    /// delivers nothing (the receive path drops such frames, since the
    /// synchronous-read delivery mode is unsupported).
    ///
    /// First registration wins; attaching to an occupied protocol fails
    /// without touching the existing entry.
    pub fn attach(&mut self, id: ProtocolId, sink: Option<&'h dyn FrameSink>) -> Result<(), Error> {
        let key = id.key();
        if self.slots.iter().any(|s| s.protocol == key) {
            return Err(Error::AlreadyAttached);
        }
        match self.slots.iter_mut().find(|s| s.protocol == PROTO_FREE) {
            Some(slot) => {
                *slot = Slot { protocol: key, sink };
                Ok(())
            }
            None => Err(Error::TableFull),
        }
    }

    /// Remove the registration for `id`. Detaching a protocol that was
    /// never attached is a successful no-op.
    pub fn detach(&mut self, id: ProtocolId) {
        let key = id.key();
        for slot in self.slots.iter_mut() {
            if slot.protocol == key {
                *slot = Slot { protocol: PROTO_FREE, sink: None };
            }
        }
    }

    /// Look up the handler for a raw type/length field as seen on the wire.
    ///
    /// Returns `None` both for an unregistered protocol and for a
    /// registered-but-null handler; the receive path treats them alike.
    pub fn find(&self, type_field: u16) -> Option<&'h dyn FrameSink> {
        let key = if type_field < 0x0600 { PROTO_LENGTH_TYPED } else { type_field };
        self.slots
            .iter()
            .find(|s| s.protocol == key)
            .and_then(|s| s.sink)
    }

    /// True if `id` currently has an entry (null handler included).
    pub fn is_attached(&self, id: ProtocolId) -> bool {
        let key = id.key();
        self.slots.iter().any(|s| s.protocol == key)
    }
}

impl<'h> Default for HandlerTable<'h> {
    fn default() -> Self {
        Self::new()
    }
}
