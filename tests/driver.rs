//! End-to-end driver tests against an in-memory chip model.
//!
//! The fake implements just enough ENC624J600 behavior to exercise the
//! driver: SRAM, the SFR file with its set/clear aliases, the pending
//! packet counter driving a level-triggered PKTIF, and a transmit engine
//! that captures frames and raises completion causes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use smoltcp::wire::EthernetAddress;

use enc624j600_driver::regs::{
    self, Econ1, Econ2, Eie, Eir, Estat, EtxStat, ESTAT_PKTCNT_MASK, SFR_BASE, SFR_CLR, SFR_SET,
    SRAM_SIZE,
};
use enc624j600_driver::rx::RsvFlags;
use enc624j600_driver::stats::INFO_LEN;
use enc624j600_driver::{
    ChipBus, Config, Control, ControlReply, DeferRefused, Driver, Error, FrameHeader, FrameSink,
    HostInterface, IsrStatus, PayloadSource, ProtocolId, TxFault,
};

const STATION: EthernetAddress = EthernetAddress([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
const PEER: [u8; 6] = [0x02, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE];

// ─────────────────────────────────────────────────────────────────────────
// Chip model
// ─────────────────────────────────────────────────────────────────────────

struct FakeState {
    sram: Vec<u8>,
    /// SFR file, indexed by register offset / 2.
    regs: [u16; 64],
    phy: [u16; 32],
    /// Hardware write head of the receive ring.
    head: u16,
    /// Dead bus: reads float, writes vanish.
    dead: bool,
    /// Abort the next transmission with this status instead of completing.
    abort_status: Option<u16>,
    tx_sent: Vec<Vec<u8>>,
}

impl FakeState {
    fn new() -> Self {
        let mut fake = Self {
            sram: vec![0; SRAM_SIZE as usize],
            regs: [0; 64],
            phy: [0; 32],
            head: 0,
            dead: false,
            abort_status: None,
            tx_sent: Vec::new(),
        };
        // Link up, full duplex, clock ready.
        fake.set_reg(regs::ESTAT, (Estat::PHYLNK | Estat::PHYDPX | Estat::CLKRDY).bits());
        fake
    }

    fn reg(&self, off: u16) -> u16 {
        self.regs[(off / 2) as usize]
    }

    fn set_reg(&mut self, off: u16, value: u16) {
        self.regs[(off / 2) as usize] = value;
    }

    fn pkt_count(&self) -> u16 {
        self.reg(regs::ESTAT) & ESTAT_PKTCNT_MASK
    }

    fn bump_pkt_count(&mut self, delta: i16) {
        let count = (self.pkt_count() as i16 + delta).max(0) as u16;
        let flags = self.reg(regs::ESTAT) & !ESTAT_PKTCNT_MASK;
        self.set_reg(regs::ESTAT, flags | count);
    }

    fn launch_tx(&mut self) {
        let start = self.reg(regs::ETXST) as usize;
        let len = self.reg(regs::ETXLEN) as usize;
        let frame = self.sram[start..start + len].to_vec();
        self.tx_sent.push(frame);
        match self.abort_status.take() {
            Some(status) => {
                self.set_reg(regs::ETXSTAT, status);
                self.set_reg(regs::EIR, self.reg(regs::EIR) | Eir::TXABTIF.bits());
            }
            None => {
                self.set_reg(regs::EIR, self.reg(regs::EIR) | Eir::TXIF.bits());
            }
        }
    }

    fn sfr_write(&mut self, off: u16, value: u16) {
        if off >= SFR_CLR {
            let reg = off - SFR_CLR;
            let old = self.reg(reg);
            self.set_reg(reg, old & !value);
        } else if off >= SFR_SET {
            let reg = off - SFR_SET;
            if reg == regs::ECON1 {
                if value & Econ1::PKTDEC.bits() != 0 {
                    self.bump_pkt_count(-1);
                }
                if value & Econ1::TXRTS.bits() != 0 {
                    self.launch_tx();
                }
                let sticky = value & !(Econ1::PKTDEC | Econ1::TXRTS).bits();
                let old = self.reg(reg);
                self.set_reg(reg, old | sticky);
            } else {
                if reg == regs::ECON2 && value & Econ2::ETHRST.bits() != 0 {
                    self.set_reg(regs::EUDAST, 0);
                }
                let old = self.reg(reg);
                self.set_reg(reg, old | value);
            }
        } else {
            self.set_reg(off, value);
            // Minimal MII management model: writes land in the PHY register
            // file immediately, a read command latches into MIRD.
            let phy_index = (self.reg(regs::MIREGADR) & 0x1F) as usize;
            if off == regs::MIWR {
                self.phy[phy_index] = value;
            } else if off == regs::MICMD && value & regs::MICMD_MIIRD != 0 {
                self.set_reg(regs::MIRD, self.phy[phy_index]);
            }
        }
    }
}

/// Shared handle so the test can poke chip state while the driver owns
/// the bus.
#[derive(Clone)]
struct FakeWindow(Rc<RefCell<FakeState>>);

impl FakeWindow {
    fn new() -> Self {
        FakeWindow(Rc::new(RefCell::new(FakeState::new())))
    }

    fn reg(&self, off: u16) -> u16 {
        self.0.borrow().reg(off)
    }

    fn tx_sent(&self) -> Vec<Vec<u8>> {
        self.0.borrow().tx_sent.clone()
    }

    fn set_link(&self, up: bool) {
        let mut state = self.0.borrow_mut();
        let mut estat = state.reg(regs::ESTAT);
        if up {
            estat |= Estat::PHYLNK.bits();
        } else {
            estat &= !Estat::PHYLNK.bits();
        }
        state.set_reg(regs::ESTAT, estat);
    }

    fn raise_cause(&self, cause: Eir) {
        let mut state = self.0.borrow_mut();
        let eir = state.reg(regs::EIR);
        state.set_reg(regs::EIR, eir | cause.bits());
    }

    fn abort_next_tx(&self, status: EtxStat) {
        self.0.borrow_mut().abort_status = Some(status.bits());
    }

    /// Queue one received frame in the ring the way the hardware does:
    /// descriptor (next pointer, status vector), verbatim frame bytes,
    /// then head and packet-count updates.
    fn inject_frame(
        &self,
        dest: [u8; 6],
        type_field: u16,
        payload: &[u8],
        flags: RsvFlags,
        len_override: Option<u16>,
    ) -> u16 {
        let mut state = self.0.borrow_mut();
        let rx_start = state.reg(regs::ERXST);
        if state.head < rx_start {
            state.head = rx_start;
        }
        let base = state.head;

        let frame_len = len_override.unwrap_or((14 + payload.len() + 4) as u16);
        let stored = 8 + 14 + payload.len() + 4;
        // The hardware pads descriptors to word boundaries.
        let next_off = (base - rx_start) as usize + (stored + 1) / 2 * 2;
        let rx_len = (SRAM_SIZE - rx_start) as usize;
        let next = rx_start + (next_off % rx_len) as u16;

        let mut bytes = Vec::with_capacity(stored);
        bytes.extend_from_slice(&next.to_le_bytes());
        bytes.extend_from_slice(&frame_len.to_le_bytes());
        bytes.extend_from_slice(&flags.bits().to_le_bytes());
        bytes.extend_from_slice(&dest);
        bytes.extend_from_slice(&PEER);
        bytes.extend_from_slice(&type_field.to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&[0; 4]); // FCS placeholder

        for (i, b) in bytes.iter().enumerate() {
            let off = (base - rx_start) as usize + i;
            let addr = rx_start as usize + off % rx_len;
            state.sram[addr] = *b;
        }

        state.head = next;
        state.set_reg(regs::ERXHEAD, next);
        state.bump_pkt_count(1);
        base
    }
}

impl ChipBus for FakeWindow {
    fn read_reg(&self, addr: u16) -> u16 {
        let state = self.0.borrow();
        if state.dead {
            return 0;
        }
        if addr < SRAM_SIZE {
            return u16::from_le_bytes([
                state.sram[addr as usize],
                state.sram[addr as usize + 1],
            ]);
        }
        let off = addr - SFR_BASE;
        let mut value = state.reg(off);
        // PKTIF is level triggered off the pending-packet counter.
        if off == regs::EIR && state.pkt_count() > 0 {
            value |= Eir::PKTIF.bits();
        }
        value
    }

    fn write_reg(&mut self, addr: u16, value: u16) {
        let mut state = self.0.borrow_mut();
        if state.dead {
            return;
        }
        if addr < SRAM_SIZE {
            let [lo, hi] = value.to_le_bytes();
            state.sram[addr as usize] = lo;
            state.sram[addr as usize + 1] = hi;
        } else {
            state.sfr_write(addr - SFR_BASE, value);
        }
    }

    fn read_buf(&self, addr: u16, dst: &mut [u8]) {
        let state = self.0.borrow();
        dst.copy_from_slice(&state.sram[addr as usize..addr as usize + dst.len()]);
    }

    fn write_buf(&mut self, addr: u16, src: &[u8]) {
        let mut state = self.0.borrow_mut();
        state.sram[addr as usize..addr as usize + src.len()].copy_from_slice(src);
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Host & handler stubs
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TestHost {
    paging: Cell<bool>,
    refuse_defer: Cell<bool>,
    deferrals: Cell<u32>,
    completions: RefCell<Vec<Result<(), TxFault>>>,
}

impl HostInterface for TestHost {
    fn paging_active(&self) -> bool {
        self.paging.get()
    }

    fn delay_us(&self, _us: u32) {}

    fn defer_bottom_half(&self) -> Result<(), DeferRefused> {
        if self.refuse_defer.get() {
            return Err(DeferRefused);
        }
        self.deferrals.set(self.deferrals.get() + 1);
        Ok(())
    }

    fn transmit_complete(&self, result: Result<(), TxFault>) {
        self.completions.borrow_mut().push(result);
    }
}

/// Handler that records every delivery.
#[derive(Default)]
struct Recorder {
    frames: RefCell<Vec<(FrameHeader, Vec<u8>)>>,
}

impl FrameSink for Recorder {
    fn deliver(&self, header: &FrameHeader, payload: &mut dyn PayloadSource) {
        let mut bytes = vec![0; payload.remaining() as usize];
        let n = payload.read(&mut bytes);
        bytes.truncate(n);
        self.frames.borrow_mut().push((*header, bytes));
    }
}

impl Recorder {
    fn count(&self) -> usize {
        self.frames.borrow().len()
    }
}

fn open_driver<'h>(fake: &FakeWindow, host: &TestHost) -> Driver<'h, FakeWindow> {
    let config = Config { mac_override: Some(STATION), ..Config::default() };
    Driver::open(fake.clone(), host, config).expect("open")
}

fn expected_tail(fake: &FakeWindow, next: u16) -> u16 {
    let rx_start = fake.reg(regs::ERXST);
    let rx_len = SRAM_SIZE - rx_start;
    rx_start + (next - rx_start + rx_len - 2) % rx_len
}

// ─────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_open_programs_layout_and_starts_reception() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let driver = open_driver(&fake, &host);

    assert_eq!(driver.address(), STATION);
    assert_eq!(fake.reg(regs::ETXST), 0x0000);
    assert_eq!(fake.reg(regs::ERXST), 0x0600);
    assert_eq!(fake.reg(regs::ERXTAIL), SRAM_SIZE - 2);
    assert_ne!(fake.reg(regs::ECON1) & Econ1::RXEN.bits(), 0);
    assert!(Eie::from_bits_truncate(fake.reg(regs::EIE)).contains(Eie::OPERATING));
    // Full duplex picked up from the PHY.
    assert_eq!(fake.reg(regs::MABBIPG), regs::MABBIPG_FULL);
}

#[test]
fn test_open_fails_on_dead_bus() {
    let fake = FakeWindow::new();
    fake.0.borrow_mut().dead = true;
    let host = TestHost::default();
    let result = Driver::open(fake, &host, Config::default());
    assert!(matches!(result, Err(Error::NoHardware)));
}

#[test]
fn test_close_quiesces_the_chip() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let driver = open_driver(&fake, &host);
    driver.close();
    assert_eq!(fake.reg(regs::EIE), 0);
    assert_eq!(fake.reg(regs::ECON1) & Econ1::RXEN.bits(), 0);
}

// ─────────────────────────────────────────────────────────────────────────
// Receive path
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_unicast_frame_delivered_to_handler() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::Ethertype(0x0800), Some(&recorder)).unwrap();

    let payload: Vec<u8> = (0..100u8).collect();
    fake.inject_frame(
        STATION.0,
        0x0800,
        &payload,
        RsvFlags::OK | RsvFlags::UNICAST_MATCH,
        None,
    );

    assert_eq!(driver.isr_top(&host), IsrStatus::Handled);

    let frames = recorder.frames.borrow();
    assert_eq!(frames.len(), 1);
    let (header, bytes) = &frames[0];
    assert_eq!(header.protocol, 0x0800);
    assert_eq!(header.source, EthernetAddress(PEER));
    // payload_len excludes header and FCS: (14 + 100 + 4) - 18.
    assert_eq!(header.payload_len, 100);
    assert_eq!(bytes.as_slice(), payload.as_slice());
    assert_eq!(driver.info().rx_frames, 1);
    // Pending count consumed; PKTIF no longer reads set.
    assert_eq!(fake.reg(regs::ESTAT) & ESTAT_PKTCNT_MASK, 0);
}

#[test]
fn test_crc_error_dropped_and_ring_advanced_once() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::Ethertype(0x0800), Some(&recorder)).unwrap();

    fake.inject_frame(
        STATION.0,
        0x0800,
        &[0; 60],
        RsvFlags::UNICAST_MATCH | RsvFlags::CRC_ERR,
        None,
    );
    let next = fake.reg(regs::ERXHEAD);

    driver.isr_top(&host);

    assert_eq!(recorder.count(), 0);
    assert_eq!(driver.info().fcs_errors, 1);
    assert_eq!(driver.info().rx_frames, 0);
    // Ring space released and the packet consumed, exactly once.
    assert_eq!(fake.reg(regs::ERXTAIL), expected_tail(&fake, next));
    assert_eq!(fake.reg(regs::ESTAT) & ESTAT_PKTCNT_MASK, 0);
}

#[test]
fn test_runt_and_oversize_frames_dropped() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::Ethertype(0x0800), Some(&recorder)).unwrap();

    let flags = RsvFlags::OK | RsvFlags::UNICAST_MATCH;
    fake.inject_frame(STATION.0, 0x0800, &[0; 40], flags, Some(58));
    fake.inject_frame(STATION.0, 0x0800, &[0; 100], flags, Some(1600));
    driver.isr_top(&host);

    assert_eq!(recorder.count(), 0);
    assert_eq!(driver.info().rx_runt, 1);
    assert_eq!(driver.info().rx_too_long, 1);
    assert_eq!(fake.reg(regs::ESTAT) & ESTAT_PKTCNT_MASK, 0);
}

#[test]
fn test_length_typed_frame_routes_to_8023_handler() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::LengthTyped, Some(&recorder)).unwrap();

    // Type field 0x0100 is a length, not an ethertype.
    fake.inject_frame(
        STATION.0,
        0x0100,
        &[0xAA; 64],
        RsvFlags::OK | RsvFlags::UNICAST_MATCH,
        None,
    );
    driver.isr_top(&host);

    let frames = recorder.frames.borrow();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0.protocol, 0x0100);
}

#[test]
fn test_unknown_protocol_dropped() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    fake.inject_frame(
        STATION.0,
        0x86DD,
        &[0; 60],
        RsvFlags::OK | RsvFlags::UNICAST_MATCH,
        None,
    );
    driver.isr_top(&host);

    assert_eq!(driver.info().rx_unknown_protocol, 1);
    assert_eq!(driver.info().rx_frames, 0);
    assert_eq!(fake.reg(regs::ESTAT) & ESTAT_PKTCNT_MASK, 0);
}

#[test]
fn test_multicast_requires_exact_table_match() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::Ethertype(0x0800), Some(&recorder)).unwrap();

    let group = EthernetAddress([0x01, 0x00, 0x5E, 0x00, 0x00, 0x05]);
    let flags = RsvFlags::OK | RsvFlags::MULTICAST | RsvFlags::HASH_MATCH;

    // Hash collision: group address not registered.
    fake.inject_frame(group.0, 0x0800, &[0; 60], flags, None);
    driver.isr_top(&host);
    assert_eq!(recorder.count(), 0);
    assert_eq!(driver.info().rx_unwanted, 1);

    // Registered: delivered and counted.
    driver.add_multicast(group).unwrap();
    assert_ne!(fake.reg(regs::EHT1) | fake.reg(regs::EHT2) | fake.reg(regs::EHT3) | fake.reg(regs::EHT4), 0);
    fake.inject_frame(group.0, 0x0800, &[0; 60], flags, None);
    driver.isr_top(&host);
    assert_eq!(recorder.count(), 1);
    assert_eq!(driver.info().rx_multicast, 1);

    // Deregistered: filter empties again.
    driver.del_multicast(group);
    assert_eq!(fake.reg(regs::EHT1) | fake.reg(regs::EHT2) | fake.reg(regs::EHT3) | fake.reg(regs::EHT4), 0);
}

#[test]
fn test_payload_read_wraps_around_ring_end() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::Ethertype(0x0800), Some(&recorder)).unwrap();

    // Walk the ring close to the end of SRAM with filler frames nobody
    // listens for, so the next frame spans the wrap point.
    let filler = [0u8; 1460];
    for _ in 0..15 {
        fake.inject_frame(
            STATION.0,
            0x86DD,
            &filler,
            RsvFlags::OK | RsvFlags::UNICAST_MATCH,
            None,
        );
    }
    driver.isr_top(&host);
    assert_eq!(recorder.count(), 0);

    let payload: Vec<u8> = (0..1000).map(|i| (i * 3) as u8).collect();
    let base = fake.inject_frame(
        STATION.0,
        0x0800,
        &payload,
        RsvFlags::OK | RsvFlags::UNICAST_MATCH,
        None,
    );
    // The descriptor plus frame really does cross the end of SRAM.
    assert!(base as usize + 8 + 14 + payload.len() + 4 > SRAM_SIZE as usize);

    driver.isr_top(&host);
    let frames = recorder.frames.borrow();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].1.as_slice(), payload.as_slice());
}

#[test]
fn test_rx_fifo_level_with_wrapped_write_head() {
    let fake = FakeWindow::new();
    let mut chip = enc624j600_driver::chip::Chip::new(fake.clone(), 0x0600);

    // Straight case: head ahead of the read pointer, no wrap.
    fake.0.borrow_mut().set_reg(regs::ERXHEAD, 0x0700);
    assert_eq!(chip.rx_fifo_level(), 0x0100);

    // The hardware head has wrapped past the ring end while the read
    // pointer is still near it: 0x5F00..0x6000 plus 0x0600..0x0700.
    chip.rx_advance(0x5F00);
    assert_eq!(chip.rx_fifo_level(), 512);

    // Caught up: head and read pointer coincide.
    fake.0.borrow_mut().set_reg(regs::ERXHEAD, 0x5F00);
    assert_eq!(chip.rx_fifo_level(), 0);
}

#[test]
fn test_bottom_half_drains_all_pending_packets() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::Ethertype(0x0800), Some(&recorder)).unwrap();

    let flags = RsvFlags::OK | RsvFlags::UNICAST_MATCH;
    for _ in 0..3 {
        fake.inject_frame(STATION.0, 0x0800, &[0x55; 60], flags, None);
    }
    driver.isr_top(&host);

    assert_eq!(recorder.count(), 3);
    assert_eq!(driver.info().rx_frames, 3);
    assert!(driver.info().rx_pending_packets_hwm >= 3);
}

// ─────────────────────────────────────────────────────────────────────────
// Transmit path
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_transmit_stamps_source_address_and_completes() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    let mut header = [0u8; 14];
    header[..6].copy_from_slice(&PEER);
    header[12] = 0x08;
    let payload = [0x42u8; 50];
    driver.transmit(&[&header, &payload]).unwrap();

    let sent = fake.tx_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].len(), 64);
    assert_eq!(&sent[0][..6], &PEER);
    assert_eq!(&sent[0][6..12], STATION.as_bytes());
    assert_eq!(&sent[0][14..], &payload);

    // Completion arrives through the interrupt path.
    driver.isr_top(&host);
    assert_eq!(host.completions.borrow().as_slice(), &[Ok(())]);
    assert_eq!(driver.info().tx_frames, 1);
}

#[test]
fn test_transmit_length_limit() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    // 1514 bytes plus the hardware FCS is exactly the maximum frame.
    let frame = vec![0u8; 1514];
    driver.transmit(&[&frame]).unwrap();
    assert_eq!(fake.tx_sent().len(), 1);

    let frame = vec![0u8; 1515];
    assert_eq!(driver.transmit(&[&frame]), Err(Error::FrameTooLong));
    // The oversize frame never reached the wire.
    assert_eq!(fake.tx_sent().len(), 1);
}

#[test]
fn test_transmit_fails_when_link_down() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    fake.set_link(false);
    fake.raise_cause(Eir::LINKIF);
    driver.isr_top(&host);

    assert_eq!(driver.transmit(&[&[0u8; 64]]), Err(Error::LinkDown));
    assert!(fake.tx_sent().is_empty());
}

#[test]
fn test_transmit_abort_reports_fault() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    fake.abort_next_tx(EtxStat::MAXCOL);
    driver.transmit(&[&[0u8; 64]]).unwrap();
    driver.isr_top(&host);

    assert_eq!(
        host.completions.borrow().as_slice(),
        &[Err(TxFault::ExcessCollisions)]
    );
    assert_eq!(driver.info().tx_excessive_collisions, 1);
    assert_eq!(driver.info().tx_frames, 0);
}

// ─────────────────────────────────────────────────────────────────────────
// Interrupt dispatch
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_spurious_interrupt_counted_and_unmasked() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    assert_eq!(driver.isr_top(&host), IsrStatus::NotHandled);
    assert_eq!(driver.info().spurious_interrupts, 1);
    assert_ne!(fake.reg(regs::EIE) & Eie::INTIE.bits(), 0);
}

#[test]
fn test_paging_defers_bottom_half() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::Ethertype(0x0800), Some(&recorder)).unwrap();

    fake.inject_frame(
        STATION.0,
        0x0800,
        &[0; 60],
        RsvFlags::OK | RsvFlags::UNICAST_MATCH,
        None,
    );

    host.paging.set(true);
    assert_eq!(driver.isr_top(&host), IsrStatus::Handled);
    assert_eq!(host.deferrals.get(), 1);
    // Nothing delivered yet; interrupts stay masked for the bottom half.
    assert_eq!(recorder.count(), 0);
    assert_eq!(fake.reg(regs::EIE) & Eie::INTIE.bits(), 0);

    driver.isr_bottom(&host);
    assert_eq!(recorder.count(), 1);
    assert_ne!(fake.reg(regs::EIE) & Eie::INTIE.bits(), 0);
}

#[test]
fn test_defer_refusal_leaves_cause_for_retry() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    fake.inject_frame(
        STATION.0,
        0x0800,
        &[0; 60],
        RsvFlags::OK | RsvFlags::UNICAST_MATCH,
        None,
    );

    host.paging.set(true);
    host.refuse_defer.set(true);
    assert_eq!(driver.isr_top(&host), IsrStatus::NotHandled);
    // Unmasked, cause still pending: the chip will re-assert.
    assert_ne!(fake.reg(regs::EIE) & Eie::INTIE.bits(), 0);
    assert_eq!(driver.info().rx_frames, 0);
    assert_eq!(fake.reg(regs::ESTAT) & ESTAT_PKTCNT_MASK, 1);

    // The retry goes through once the queue has room.
    host.refuse_defer.set(false);
    assert_eq!(driver.isr_top(&host), IsrStatus::Handled);
    driver.isr_bottom(&host);
    assert_eq!(driver.info().rx_unknown_protocol, 1);
}

#[test]
fn test_rx_overflow_counted_in_top_half() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    fake.raise_cause(Eir::RXABTIF);
    assert_eq!(driver.isr_top(&host), IsrStatus::Handled);
    assert_eq!(driver.info().rx_internal_errors, 1);
    assert_eq!(fake.reg(regs::EIR) & Eir::RXABTIF.bits(), 0);
}

// ─────────────────────────────────────────────────────────────────────────
// Control surface
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_control_get_info_and_unsupported_ops() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    let mut buf = [0u8; INFO_LEN];
    assert_eq!(
        driver.control(Control::GetInfo(&mut buf)),
        Ok(ControlReply::InfoLen(INFO_LEN))
    );
    assert_eq!(&buf[..6], STATION.as_bytes());

    assert_eq!(driver.control(Control::Read), Err(Error::Unsupported));
    assert_eq!(driver.control(Control::ReadCancel), Err(Error::Unsupported));
    assert_eq!(driver.control(Control::SetGeneralMode), Ok(ControlReply::Done));
}

#[test]
fn test_control_write_is_asynchronous() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    let frame = [0u8; 64];
    let segments: [&[u8]; 1] = [&frame];
    assert_eq!(driver.control(Control::Write(&segments)), Ok(ControlReply::InProgress));
    assert_eq!(fake.tx_sent().len(), 1);
}

#[test]
fn test_shared_driver_serves_both_contexts() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let recorder = Recorder::default();
    let mut driver = open_driver(&fake, &host);
    driver.attach_handler(ProtocolId::Ethertype(0x0800), Some(&recorder)).unwrap();
    let shared = enc624j600_driver::SharedDriver::new(driver);

    shared.lock().transmit(&[&[0u8; 64]]).unwrap();
    fake.inject_frame(
        STATION.0,
        0x0800,
        &[0; 60],
        RsvFlags::OK | RsvFlags::UNICAST_MATCH,
        None,
    );
    assert_eq!(shared.isr_top(&host), IsrStatus::Handled);

    assert_eq!(recorder.count(), 1);
    assert_eq!(host.completions.borrow().len(), 1);
    shared.close();
}

#[test]
fn test_mapped_window_accesses_are_little_endian() {
    let mut backing = vec![0u8; 0x8000];
    let mut window = unsafe { enc624j600_driver::MappedWindow::new(backing.as_mut_ptr()) };

    window.write_reg(0x0100, 0xBEEF);
    assert_eq!(backing[0x0100], 0xEF);
    assert_eq!(backing[0x0101], 0xBE);
    assert_eq!(window.read_reg(0x0100), 0xBEEF);

    window.write_buf(0x0200, &[1, 2, 3, 4]);
    let mut out = [0u8; 4];
    window.read_buf(0x0200, &mut out);
    assert_eq!(out, [1, 2, 3, 4]);
}

#[test]
fn test_control_phy_loopback_round_trip() {
    let fake = FakeWindow::new();
    let host = TestHost::default();
    let mut driver = open_driver(&fake, &host);

    assert_eq!(driver.control(Control::SetLoopback(true)), Ok(ControlReply::Done));
    let reply = driver.control(Control::ReadPhy(regs::PHCON1)).unwrap();
    assert_eq!(reply, ControlReply::Value(regs::PHCON1_PLOOPBK));

    assert_eq!(driver.control(Control::SetLoopback(false)), Ok(ControlReply::Done));
    let reply = driver.control(Control::ReadPhy(regs::PHCON1)).unwrap();
    assert_eq!(reply, ControlReply::Value(0));
}
