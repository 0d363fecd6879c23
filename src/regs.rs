//! ENC624J600 register definitions.
//!
//! Offsets are chip addresses as seen through the parallel slave bus: the
//! 24 KiB SRAM occupies `0x0000..0x6000` and the special-function registers
//! sit at `0x7E00..0x7E76`. Every SFR also has a bit-set alias (+0x80) and a
//! bit-clear alias (+0x100); writing a mask to those performs an atomic
//! set/clear without a read-modify-write cycle.
//!
//! # Reference
//! ENC624J600 Data Sheet (DS39935), Section 3 (Register Map)

use bitflags::bitflags;

/// Total chip SRAM, shared between the transmit buffer and the receive ring.
pub const SRAM_SIZE: u16 = 0x6000;

/// Base chip address of the special-function register file.
pub const SFR_BASE: u16 = 0x7E00;
/// Added to an SFR address to reach its bit-set alias.
pub const SFR_SET: u16 = 0x0080;
/// Added to an SFR address to reach its bit-clear alias.
pub const SFR_CLR: u16 = 0x0100;

// ═══════════════════════════════════════════════════════════════════════════
// SFR OFFSETS (relative to SFR_BASE, all registers 16 bits wide)
// ═══════════════════════════════════════════════════════════════════════════

/// Transmit buffer start address.
pub const ETXST: u16 = 0x00;
/// Transmit length.
pub const ETXLEN: u16 = 0x02;
/// Receive buffer start address.
pub const ERXST: u16 = 0x04;
/// Receive buffer tail (last address the hardware may not write past).
pub const ERXTAIL: u16 = 0x06;
/// Receive buffer head (next address the hardware will write).
pub const ERXHEAD: u16 = 0x08;
/// Transmit status.
pub const ETXSTAT: u16 = 0x12;
/// Transmit byte count on wire (including collision retries).
pub const ETXWIRE: u16 = 0x14;
/// User data start pointer, used as a scratch register for bus probing.
pub const EUDAST: u16 = 0x16;
/// Ethernet status.
pub const ESTAT: u16 = 0x1A;
/// Ethernet interrupt flags.
pub const EIR: u16 = 0x1C;
/// Ethernet control 1.
pub const ECON1: u16 = 0x1E;

/// Hash table, four 16-bit words covering 64 filter bits.
pub const EHT1: u16 = 0x20;
pub const EHT2: u16 = 0x22;
pub const EHT3: u16 = 0x24;
pub const EHT4: u16 = 0x26;

/// Receive filter control.
pub const ERXFCON: u16 = 0x34;

/// MAC control 1.
pub const MACON1: u16 = 0x40;
/// MAC control 2 (duplex, padding, CRC generation).
pub const MACON2: u16 = 0x42;
/// Back-to-back inter-packet gap.
pub const MABBIPG: u16 = 0x44;
/// Non-back-to-back inter-packet gap.
pub const MAIPG: u16 = 0x46;
/// Collision window / retransmission limit.
pub const MACLCON: u16 = 0x48;
/// Maximum frame length accepted by the MAC.
pub const MAMXFL: u16 = 0x4A;

/// MII management command.
pub const MICMD: u16 = 0x52;
/// MII management register address.
pub const MIREGADR: u16 = 0x54;

/// MAC address words. MAADR1 holds octets 0-1 (low byte first on the wire).
pub const MAADR3: u16 = 0x60;
pub const MAADR2: u16 = 0x62;
pub const MAADR1: u16 = 0x64;

/// MII management write data.
pub const MIWR: u16 = 0x66;
/// MII management read data.
pub const MIRD: u16 = 0x68;
/// MII management status.
pub const MISTAT: u16 = 0x6A;

/// Ethernet control 2 (reset bits, automatic flow control).
pub const ECON2: u16 = 0x6E;
/// Interrupt enables.
pub const EIE: u16 = 0x72;

// ═══════════════════════════════════════════════════════════════════════════
// REGISTER FIELDS
// ═══════════════════════════════════════════════════════════════════════════

bitflags! {
    /// EIR: interrupt cause flags.
    ///
    /// `PKTIF` is level-triggered: it reads as set while the pending-packet
    /// count in ESTAT is nonzero and cannot be cleared directly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Eir: u16 {
        /// Packet counter saturated at 255.
        const PCFULIF = 1 << 0;
        /// Receive aborted (no buffer space or counter full).
        const RXABTIF = 1 << 1;
        /// Transmit aborted.
        const TXABTIF = 1 << 2;
        /// Transmit done.
        const TXIF = 1 << 3;
        /// DMA operation done (unused by this driver).
        const DMAIF = 1 << 5;
        /// One or more packets pending in the receive ring.
        const PKTIF = 1 << 6;
        /// PHY link state changed.
        const LINKIF = 1 << 11;
    }
}

bitflags! {
    /// EIE: interrupt enable bits, positions matching [`Eir`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Eie: u16 {
        const PCFULIE = 1 << 0;
        const RXABTIE = 1 << 1;
        const TXABTIE = 1 << 2;
        const TXIE = 1 << 3;
        const PKTIE = 1 << 6;
        const LINKIE = 1 << 11;
        /// Global interrupt output enable; masks the INT pin when clear.
        const INTIE = 1 << 15;
    }
}

impl Eie {
    /// Full cause set used during normal operation.
    pub const OPERATING: Eie = Eie::INTIE
        .union(Eie::LINKIE)
        .union(Eie::PKTIE)
        .union(Eie::RXABTIE)
        .union(Eie::PCFULIE)
        .union(Eie::TXIE)
        .union(Eie::TXABTIE);
}

bitflags! {
    /// ESTAT: chip status. Low byte is the pending-packet count.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Estat: u16 {
        const PHYLNK = 1 << 8;
        const PHYDPX = 1 << 10;
        const CLKRDY = 1 << 12;
        const RXBUSY = 1 << 13;
        const INT = 1 << 15;
        const _ = 0x00FF; // PKTCNT
    }
}

/// Mask of the pending-packet count within ESTAT.
pub const ESTAT_PKTCNT_MASK: u16 = 0x00FF;

bitflags! {
    /// ECON1: run-time control.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Econ1: u16 {
        /// Enable packet reception.
        const RXEN = 1 << 0;
        /// Transmit request; set to start, cleared by hardware on completion.
        const TXRTS = 1 << 1;
        /// Decrement the pending-packet count (write-to-trigger).
        const PKTDEC = 1 << 8;
    }
}

bitflags! {
    /// ECON2: reset and configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Econ2: u16 {
        /// Master Ethernet reset (clears MAC/PHY state, not the SPI/PSP port).
        const ETHRST = 1 << 4;
        const RXRST = 1 << 5;
        const TXRST = 1 << 6;
        /// Automatic flow control.
        const AUTOFC = 1 << 7;
        /// Ethernet module enable.
        const ETHEN = 1 << 15;
    }
}

bitflags! {
    /// ETXSTAT: status of the last transmission.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EtxStat: u16 {
        /// Transmission was deferred at least once while the medium was busy.
        const DEFER = 1 << 7;
        /// Deferral exceeded the timeout; frame aborted.
        const EXDEFER = 1 << 8;
        /// Collision count exceeded the MACLCON retransmission limit.
        const MAXCOL = 1 << 9;
        /// Collision after the slot time; frame aborted.
        const LATECOL = 1 << 10;
        /// CRC of the aborted frame was bad anyway.
        const CRCBAD = 1 << 12;
        const _ = 0x000F; // COLCNT
    }
}

/// Mask and shift of the collision count within ETXSTAT.
pub const ETXSTAT_COLCNT_MASK: u16 = 0x000F;

bitflags! {
    /// ERXFCON: hardware receive filters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Erxfcon: u16 {
        /// Accept broadcast frames.
        const BCEN = 1 << 0;
        /// Accept all multicast frames (not used; the hash table is).
        const MCEN = 1 << 1;
        /// Reject frames not addressed to us.
        const NOTMEEN = 1 << 2;
        /// Accept unicast frames matching MAADR.
        const UCEN = 1 << 3;
        /// Reject runt frames.
        const RUNTEN = 1 << 4;
        /// Reject frames with bad CRC.
        const CRCEN = 1 << 6;
        /// Accept frames whose destination hashes into the hash table.
        const HTEN = 1 << 15;
    }
}

bitflags! {
    /// MACON2 fields this driver touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Macon2: u16 {
        /// Full-duplex operation; must match the autonegotiated PHY duplex.
        const FULDPX = 1 << 0;
    }
}

bitflags! {
    /// MISTAT fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mistat: u16 {
        /// MII management operation in progress.
        const BUSY = 1 << 0;
    }
}

/// MICMD read-start bit.
pub const MICMD_MIIRD: u16 = 1 << 0;

// ═══════════════════════════════════════════════════════════════════════════
// PHY REGISTERS (reached through the MII management interface)
// ═══════════════════════════════════════════════════════════════════════════

/// PHY control 1.
pub const PHCON1: u8 = 0x00;
/// PHY status 1.
pub const PHSTAT1: u8 = 0x01;
/// PHY autonegotiation advertisement.
pub const PHANA: u8 = 0x04;

/// PHCON1: internal loopback enable.
pub const PHCON1_PLOOPBK: u16 = 1 << 14;

/// Back-to-back inter-packet gap values for half and full duplex.
pub const MABBIPG_HALF: u16 = 0x12;
pub const MABBIPG_FULL: u16 = 0x15;

/// Probe pattern written to EUDAST to detect a live chip on the bus.
pub const PROBE_PATTERN: u16 = 0x1234;
