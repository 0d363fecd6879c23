//! Receive path: ring descriptor decode, frame classification, dispatch.
//!
//! The hardware queues each frame in the receive ring behind a descriptor:
//! a little-endian next-packet pointer, a six-byte receive status vector,
//! then the frame itself. [`Driver::handle_packet`] consumes exactly one
//! descriptor per call; the packet-pending interrupt cause is level
//! triggered, so the bottom half keeps calling it until the pending count
//! reaches zero.

use log::trace;
use smoltcp::wire::EthernetFrame;

use crate::bus::ChipBus;
use crate::chip::Chip;
use crate::driver::Driver;
use crate::proto::{FrameHeader, PayloadSource};
use crate::stats::DriverInfo;

use bitflags::bitflags;

/// Minimum legal frame length (status-vector length, FCS included).
pub const MIN_FRAME_LEN: u16 = 64;
/// Maximum legal frame length (status-vector length, FCS included).
pub const MAX_FRAME_LEN: u16 = 1518;
/// Ethernet header: destination, source, type/length.
pub const ETH_HEADER_LEN: u16 = 14;
/// Trailing frame check sequence.
pub const FCS_LEN: u16 = 4;

/// Ring descriptor bytes copied per frame: next pointer (2), receive
/// status vector (6), Ethernet header (14). Fixed, independent of the
/// frame's actual length.
pub const RING_HEADER_LEN: usize = 22;
/// Scratch area protocol handlers may use during delivery.
pub const HANDLER_WORKSPACE_LEN: usize = 8;

bitflags! {
    /// Receive status vector flags (status bytes 2..6, little-endian).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RsvFlags: u32 {
        /// Frame check sequence did not verify.
        const CRC_ERR = 1 << 4;
        /// Length field did not match the received length.
        const LEN_CHECK_ERR = 1 << 5;
        /// Type/length field out of range.
        const LEN_RANGE_ERR = 1 << 6;
        /// Frame received intact.
        const OK = 1 << 7;
        /// Destination had the group bit set.
        const MULTICAST = 1 << 8;
        /// Destination was the broadcast address.
        const BROADCAST = 1 << 9;
        /// Odd number of nibbles on the wire.
        const DRIBBLE = 1 << 10;
        /// MAC control frame.
        const CONTROL = 1 << 11;
        /// Pattern-match filter hit.
        const PATTERN_MATCH = 1 << 16;
        /// Destination matched our station address exactly.
        const UNICAST_MATCH = 1 << 17;
        /// Not-me filter hit.
        const NOTME_MATCH = 1 << 18;
        /// Destination hashed into the multicast hash table.
        const HASH_MATCH = 1 << 19;
    }
}

/// The Receive Header Area: one descriptor's worth of header bytes copied
/// out of the ring, plus handler workspace. Reused for every frame.
pub struct ReceiveHeaderArea {
    buf: [u8; RING_HEADER_LEN + HANDLER_WORKSPACE_LEN],
}

impl ReceiveHeaderArea {
    pub const fn new() -> Self {
        Self { buf: [0; RING_HEADER_LEN + HANDLER_WORKSPACE_LEN] }
    }

    pub(crate) fn descriptor_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..RING_HEADER_LEN]
    }

    /// Ring address of the next descriptor, as stored by the hardware.
    pub fn next_packet(&self) -> u16 {
        u16::from_le_bytes([self.buf[0], self.buf[1]])
    }

    /// Frame length from the status vector, FCS included.
    pub fn frame_len(&self) -> u16 {
        u16::from_le_bytes([self.buf[2], self.buf[3]])
    }

    pub fn rsv_flags(&self) -> RsvFlags {
        let raw = u32::from_le_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]);
        RsvFlags::from_bits_truncate(raw)
    }

    /// The verbatim Ethernet header.
    pub fn eth_header(&self) -> EthernetFrame<&[u8]> {
        EthernetFrame::new_unchecked(&self.buf[8..RING_HEADER_LEN])
    }

    /// Raw type/length field of the buffered header.
    pub fn type_field(&self) -> u16 {
        u16::from_be_bytes([self.buf[20], self.buf[21]])
    }
}

impl Default for ReceiveHeaderArea {
    fn default() -> Self {
        Self::new()
    }
}

/// Read capability over the unread payload of the frame being delivered.
///
/// Reads come straight out of controller memory, continuing at the ring
/// start when they run off the end of SRAM.
pub struct PayloadReader<'c, B: ChipBus> {
    chip: &'c Chip<B>,
    cursor: u16,
    remaining: u16,
}

impl<'c, B: ChipBus> PayloadReader<'c, B> {
    fn new(chip: &'c Chip<B>, start: u16, len: u16) -> Self {
        Self { chip, cursor: chip.rx_wrap(start), remaining: len }
    }
}

impl<'c, B: ChipBus> PayloadSource for PayloadReader<'c, B> {
    fn remaining(&self) -> u16 {
        self.remaining
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.remaining as usize);
        if n == 0 {
            return 0;
        }
        self.chip.read_rx(self.cursor, &mut dst[..n]);
        self.cursor = self.chip.rx_wrap(self.cursor.wrapping_add(n as u16));
        self.remaining -= n as u16;
        n
    }
}

impl<'h, B: ChipBus> Driver<'h, B> {
    /// Consume one frame from the receive ring.
    ///
    /// Called from the interrupt bottom half while the pending-packet count
    /// is nonzero; not reentrant. Whatever classification decides, the ring
    /// read pointer advances to the descriptor's next-packet address and
    /// the pending count is decremented exactly once.
    pub(crate) fn handle_packet(&mut self) {
        let pending = self.chip.rx_pending_count() as u32;
        DriverInfo::raise_hwm(&mut self.info.rx_pending_packets_hwm, pending);
        let level = self.chip.rx_fifo_level() as u32;
        DriverInfo::raise_hwm(&mut self.info.rx_pending_bytes_hwm, level);

        let base = self.chip.rx_read_ptr();
        self.chip.read_rx(base, self.rha.descriptor_mut());
        let next = self.rha.next_packet();

        self.classify_and_dispatch(base);

        // Exactly once per descriptor, accept or drop: release the ring
        // space and tell the hardware the packet is gone.
        self.chip.rx_advance(next);
        self.chip.rx_decrement_pending();
    }

    /// Everything that can reject a frame; returning early drops it.
    fn classify_and_dispatch(&mut self, base: u16) {
        let frame_len = self.rha.frame_len();
        let flags = self.rha.rsv_flags();

        // The hardware normally drops these itself; count them in case the
        // filters are disabled.
        if flags.contains(RsvFlags::CRC_ERR) {
            self.info.fcs_errors += 1;
            return;
        }
        if frame_len < MIN_FRAME_LEN {
            self.info.rx_runt += 1;
            return;
        }
        if frame_len > MAX_FRAME_LEN {
            self.info.rx_too_long += 1;
            return;
        }

        // Filter sanity check, in decreasing specificity.
        if flags.contains(RsvFlags::UNICAST_MATCH) {
            // Ours.
        } else if flags.contains(RsvFlags::BROADCAST) {
            self.info.rx_broadcast += 1;
        } else if flags.contains(RsvFlags::MULTICAST) && flags.contains(RsvFlags::HASH_MATCH) {
            // The hash filter is approximate; confirm against the exact
            // multicast set to reject collisions.
            if self.multicast.contains(self.rha.eth_header().dst_addr()) {
                self.info.rx_multicast += 1;
            } else {
                self.info.rx_unwanted += 1;
                return;
            }
        } else {
            // Hash collision with a non-multicast address.
            self.info.rx_unwanted += 1;
            return;
        }

        let type_field = self.rha.type_field();
        let Some(sink) = self.handlers.find(type_field) else {
            self.info.rx_unknown_protocol += 1;
            return;
        };

        let payload_len = frame_len - ETH_HEADER_LEN - FCS_LEN;
        let eth = self.rha.eth_header();
        let header = FrameHeader {
            destination: eth.dst_addr(),
            source: eth.src_addr(),
            protocol: type_field,
            payload_len,
        };
        trace!("rx: type={:#06x} len={}", type_field, frame_len);

        // Payload bytes start right after the part of the frame already in
        // the Receive Header Area.
        let mut payload = PayloadReader::new(&self.chip, base.wrapping_add(RING_HEADER_LEN as u16), payload_len);
        sink.deliver(&header, &mut payload);
        self.info.rx_frames += 1;
    }
}
