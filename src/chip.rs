//! Chip control and buffer-layout state machine.
//!
//! Owns the controller's internal memory layout: a fixed 1536-byte transmit
//! buffer at the bottom of SRAM (exactly one maximum-size frame; the host
//! serializes writes, so nothing is queued) and the remainder as one receive
//! ring. Also home to the address translator: hardware-produced ring
//! pointers are wrapped into the receive region before use, and reads that
//! would run past the end of SRAM continue at the ring start.

use smoltcp::wire::EthernetAddress;

use crate::bus::ChipBus;
use crate::error::Error;
use crate::regs::*;

/// Transmit buffer start: bottom of SRAM.
pub const TX_BUF_START: u16 = 0x0000;
/// Transmit buffer size: one maximum-length frame, nothing queued behind it.
pub const TX_BUF_LEN: u16 = 1536;
/// Default receive ring start, directly after the transmit buffer.
pub const RX_BUF_DEFAULT_START: u16 = TX_BUF_START + TX_BUF_LEN;

/// Iteration bound for MII management busy polls.
const MIIM_POLL_LIMIT: u32 = 10_000;

/// Controller handle: bus access plus the layout and link state the rest of
/// the driver needs. Exclusively owned by the driver; borrowed per call.
pub struct Chip<B: ChipBus> {
    bus: B,
    rx_start: u16,
    /// Software read pointer: chip address of the next ring descriptor.
    next_packet: u16,
    link_up: bool,
    full_duplex: bool,
}

impl<B: ChipBus> Chip<B> {
    pub fn new(bus: B, rx_start: u16) -> Self {
        Self {
            bus,
            rx_start,
            next_packet: rx_start,
            link_up: false,
            full_duplex: false,
        }
    }

    /// Give the bus back, e.g. at close.
    pub fn release(self) -> B {
        self.bus
    }

    // ───────────────────────────────────────────────────────────────────
    // Register access
    // ───────────────────────────────────────────────────────────────────

    pub(crate) fn sfr_read(&self, reg: u16) -> u16 {
        self.bus.read_reg(SFR_BASE + reg)
    }

    pub(crate) fn sfr_write(&mut self, reg: u16, value: u16) {
        self.bus.write_reg(SFR_BASE + reg, value);
    }

    /// Set bits through the register's set alias; no read-modify-write.
    pub(crate) fn sfr_set(&mut self, reg: u16, mask: u16) {
        self.bus.write_reg(SFR_BASE + SFR_SET + reg, mask);
    }

    /// Clear bits through the register's clear alias.
    pub(crate) fn sfr_clr(&mut self, reg: u16, mask: u16) {
        self.bus.write_reg(SFR_BASE + SFR_CLR + reg, mask);
    }

    // ───────────────────────────────────────────────────────────────────
    // Bring-up
    // ───────────────────────────────────────────────────────────────────

    /// Check for a live chip: EUDAST must read back a test pattern.
    pub fn probe(&mut self) -> bool {
        self.sfr_write(EUDAST, PROBE_PATTERN);
        self.sfr_read(EUDAST) == PROBE_PATTERN
    }

    /// Full Ethernet reset. `delay_us` is the host's busy-wait; the MAC
    /// needs 25 us after reset and the PHY a further 256 us.
    pub fn reset(&mut self, delay_us: &dyn Fn(u32)) -> Result<(), Error> {
        if !self.probe() {
            return Err(Error::NoHardware);
        }
        self.sfr_set(ECON2, Econ2::ETHRST.bits());
        delay_us(25);
        // Reset restores EUDAST to zero; if the pattern survived, the write
        // above hit dead bus instead of a chip.
        if self.sfr_read(EUDAST) != 0 {
            return Err(Error::NoHardware);
        }
        delay_us(256);
        Ok(())
    }

    /// Program buffer layout, receive filters and MAC limits.
    ///
    /// Reception stays disabled until [`Chip::start`].
    pub fn init(&mut self) {
        self.sfr_write(ETXST, TX_BUF_START);
        self.sfr_write(ERXST, self.rx_start);
        self.sfr_write(ERXTAIL, SRAM_SIZE - 2);
        self.next_packet = self.rx_start;

        // Unicast, broadcast, and hash-filtered multicast; runts and bad
        // CRC dropped in hardware. The receive path re-checks all of these
        // in case a filter gets disabled for debugging.
        let filters = Erxfcon::UCEN | Erxfcon::BCEN | Erxfcon::HTEN | Erxfcon::RUNTEN | Erxfcon::CRCEN;
        self.sfr_write(ERXFCON, filters.bits());

        self.sfr_write(MAMXFL, crate::rx::MAX_FRAME_LEN);
        self.duplex_sync();
    }

    /// Enable packet reception.
    pub fn start(&mut self) {
        self.sfr_set(ECON1, Econ1::RXEN.bits());
    }

    /// Big hammer used at close: stop transmit/receive and mask the chip.
    pub fn shutdown(&mut self) {
        self.sfr_clr(ECON1, (Econ1::RXEN | Econ1::TXRTS).bits());
        self.sfr_write(EIE, 0);
        self.sfr_set(ECON2, Econ2::ETHRST.bits());
    }

    // ───────────────────────────────────────────────────────────────────
    // Interrupt plumbing
    // ───────────────────────────────────────────────────────────────────

    pub fn irq_state(&self) -> Eir {
        Eir::from_bits_truncate(self.sfr_read(EIR))
    }

    pub fn enable_irq(&mut self, mask: Eie) {
        self.sfr_set(EIE, mask.bits());
    }

    pub fn disable_irq(&mut self, mask: Eie) {
        self.sfr_clr(EIE, mask.bits());
    }

    /// Acknowledge causes. PKTIF is not directly clearable; it follows the
    /// pending-packet counter.
    pub fn clear_irq(&mut self, mask: Eir) {
        self.sfr_clr(EIR, mask.bits());
    }

    // ───────────────────────────────────────────────────────────────────
    // Link state
    // ───────────────────────────────────────────────────────────────────

    /// Resynchronize MAC duplex configuration with the autonegotiated PHY
    /// state, and latch link-up for the transmit path.
    pub fn duplex_sync(&mut self) {
        let estat = Estat::from_bits_truncate(self.sfr_read(ESTAT));
        self.link_up = estat.contains(Estat::PHYLNK);
        self.full_duplex = estat.contains(Estat::PHYDPX);
        if self.full_duplex {
            self.sfr_set(MACON2, Macon2::FULDPX.bits());
            self.sfr_write(MABBIPG, MABBIPG_FULL);
        } else {
            self.sfr_clr(MACON2, Macon2::FULDPX.bits());
            self.sfr_write(MABBIPG, MABBIPG_HALF);
        }
    }

    pub fn link_up(&self) -> bool {
        self.link_up
    }

    pub fn full_duplex(&self) -> bool {
        self.full_duplex
    }

    // ───────────────────────────────────────────────────────────────────
    // Hardware address
    // ───────────────────────────────────────────────────────────────────

    pub fn read_hwaddr(&self) -> EthernetAddress {
        let w1 = self.sfr_read(MAADR1).to_le_bytes();
        let w2 = self.sfr_read(MAADR2).to_le_bytes();
        let w3 = self.sfr_read(MAADR3).to_le_bytes();
        EthernetAddress([w1[0], w1[1], w2[0], w2[1], w3[0], w3[1]])
    }

    pub fn write_hwaddr(&mut self, addr: EthernetAddress) {
        let b = addr.as_bytes();
        self.sfr_write(MAADR1, u16::from_le_bytes([b[0], b[1]]));
        self.sfr_write(MAADR2, u16::from_le_bytes([b[2], b[3]]));
        self.sfr_write(MAADR3, u16::from_le_bytes([b[4], b[5]]));
    }

    /// Program the 64-bit multicast hash filter.
    pub fn write_hash_filter(&mut self, words: [u16; 4]) {
        self.sfr_write(EHT1, words[0]);
        self.sfr_write(EHT2, words[1]);
        self.sfr_write(EHT3, words[2]);
        self.sfr_write(EHT4, words[3]);
    }

    // ───────────────────────────────────────────────────────────────────
    // Address translator & receive ring
    // ───────────────────────────────────────────────────────────────────

    fn rx_len(&self) -> u16 {
        SRAM_SIZE - self.rx_start
    }

    /// Wrap a hardware-produced ring pointer into the receive region.
    /// Offsets are relative to the configured ring start, modulo the ring
    /// size; the result never lands in the transmit buffer.
    pub fn rx_wrap(&self, addr: u16) -> u16 {
        let off = (addr.wrapping_sub(self.rx_start)) % self.rx_len();
        self.rx_start + off
    }

    /// Chip address of the next unread ring descriptor.
    pub fn rx_read_ptr(&self) -> u16 {
        self.next_packet
    }

    /// Copy bytes out of the ring starting at `addr`, continuing at the
    /// ring start if the read runs off the end of SRAM.
    pub fn read_rx(&self, addr: u16, dst: &mut [u8]) {
        let addr = self.rx_wrap(addr);
        let straight = (SRAM_SIZE - addr) as usize;
        if dst.len() <= straight {
            self.bus.read_buf(addr, dst);
        } else {
            let (head, tail) = dst.split_at_mut(straight);
            self.bus.read_buf(addr, head);
            self.bus.read_buf(self.rx_start, tail);
        }
    }

    /// Pending-packet count maintained by the hardware.
    pub fn rx_pending_count(&self) -> u8 {
        (self.sfr_read(ESTAT) & ESTAT_PKTCNT_MASK) as u8
    }

    /// Tell the hardware one packet has been consumed.
    pub fn rx_decrement_pending(&mut self) {
        self.sfr_set(ECON1, Econ1::PKTDEC.bits());
    }

    /// Bytes currently queued in the ring, from our read pointer to the
    /// hardware write head.
    ///
    /// Both pointers are reduced to ring-relative offsets before the
    /// subtraction; differencing the raw chip addresses would be wrong
    /// whenever the head has wrapped, since 2^16 is not a multiple of the
    /// ring size.
    pub fn rx_fifo_level(&self) -> u16 {
        let rx_len = self.rx_len();
        let head_off = self.rx_wrap(self.sfr_read(ERXHEAD)) - self.rx_start;
        let read_off = self.next_packet - self.rx_start;
        (head_off + rx_len - read_off) % rx_len
    }

    /// Finish with the current packet: move the read pointer to `next` and
    /// release the freed ring space to the hardware. ERXTAIL trails the
    /// next descriptor by one word, per the controller's ring protocol.
    pub fn rx_advance(&mut self, next: u16) {
        let next = self.rx_wrap(next);
        self.next_packet = next;
        let tail_off = (next.wrapping_sub(self.rx_start)).wrapping_add(self.rx_len() - 2) % self.rx_len();
        self.sfr_write(ERXTAIL, self.rx_start + tail_off);
    }

    // ───────────────────────────────────────────────────────────────────
    // Transmit buffer
    // ───────────────────────────────────────────────────────────────────

    /// Copy frame bytes into the transmit buffer at `offset`.
    pub fn write_tx(&mut self, offset: u16, src: &[u8]) {
        self.bus.write_buf(TX_BUF_START + offset, src);
    }

    /// Program the frame length and request transmission.
    pub fn start_transmit(&mut self, len: u16) {
        self.sfr_write(ETXST, TX_BUF_START);
        self.sfr_write(ETXLEN, len);
        self.sfr_set(ECON1, Econ1::TXRTS.bits());
    }

    /// Status of the most recent transmission.
    pub fn tx_status(&self) -> EtxStat {
        EtxStat::from_bits_truncate(self.sfr_read(ETXSTAT))
    }

    /// Collision count of the most recent transmission.
    pub fn tx_collision_count(&self) -> u16 {
        self.sfr_read(ETXSTAT) & ETXSTAT_COLCNT_MASK
    }

    // ───────────────────────────────────────────────────────────────────
    // PHY access (MII management interface)
    // ───────────────────────────────────────────────────────────────────

    fn miim_wait(&self) -> Result<(), Error> {
        for _ in 0..MIIM_POLL_LIMIT {
            if !Mistat::from_bits_truncate(self.sfr_read(MISTAT)).contains(Mistat::BUSY) {
                return Ok(());
            }
        }
        Err(Error::PhyTimeout)
    }

    pub fn phy_read(&mut self, reg: u8) -> Result<u16, Error> {
        self.sfr_write(MIREGADR, 0x0100 | reg as u16);
        self.sfr_write(MICMD, MICMD_MIIRD);
        self.miim_wait()?;
        self.sfr_write(MICMD, 0);
        Ok(self.sfr_read(MIRD))
    }

    pub fn phy_write(&mut self, reg: u8, value: u16) -> Result<(), Error> {
        self.sfr_write(MIREGADR, 0x0100 | reg as u16);
        self.sfr_write(MIWR, value);
        self.miim_wait()
    }

    /// Enable or disable PHY internal loopback (debug aid).
    pub fn set_loopback(&mut self, enable: bool) -> Result<(), Error> {
        let phcon1 = self.phy_read(PHCON1)?;
        let phcon1 = if enable {
            phcon1 | PHCON1_PLOOPBK
        } else {
            phcon1 & !PHCON1_PLOOPBK
        };
        self.phy_write(PHCON1, phcon1)
    }
}
