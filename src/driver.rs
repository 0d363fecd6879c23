//! Driver lifecycle and control dispatch.
//!
//! One [`Driver`] value per controller, created at open and consumed at
//! close; there is no process-wide state. The host framework owns it,
//! serializes control requests, and calls the interrupt entry points from
//! its interrupt registration. [`SharedDriver`] is the shape that sharing
//! usually takes: a spinlock that is uncontended on a single core as long
//! as the host masks interrupts around foreground mutation.

use log::debug;
use smoltcp::wire::EthernetAddress;

use crate::bus::ChipBus;
use crate::chip::{Chip, RX_BUF_DEFAULT_START};
use crate::error::Error;
use crate::isr::{HostInterface, IsrStatus};
use crate::multicast::MulticastTable;
use crate::proto::{FrameSink, HandlerTable, ProtocolId};
use crate::regs::Eie;
use crate::rx::ReceiveHeaderArea;
use crate::stats::DriverInfo;

/// Open-time configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// First chip address of the receive ring. Everything from here to the
    /// end of SRAM belongs to the ring.
    pub rx_buffer_start: u16,
    /// Station address to program instead of the chip's factory address.
    pub mac_override: Option<EthernetAddress>,
}

impl Default for Config {
    fn default() -> Self {
        Self { rx_buffer_start: RX_BUF_DEFAULT_START, mac_override: None }
    }
}

/// Control operations, the driver's command surface.
///
/// Synchronous unless noted. Register and PHY access plus loopback exist
/// for hardware debugging only.
pub enum Control<'a, 'h> {
    /// Register a multicast address (reference counted).
    AddMulticast(EthernetAddress),
    /// Drop one registration of a multicast address.
    DelMulticast(EthernetAddress),
    /// Register a protocol handler. `None` reserves the protocol without
    /// a deliverable handler.
    AttachHandler(ProtocolId, Option<&'h dyn FrameSink>),
    /// Remove a protocol handler registration.
    DetachHandler(ProtocolId),
    /// Transmit a frame given as ordered segments. Asynchronous: replies
    /// [`ControlReply::InProgress`], completion arrives via
    /// [`HostInterface::transmit_complete`].
    Write(&'a [&'a [u8]]),
    /// Copy hardware address and statistics into the buffer, truncating.
    GetInfo(&'a mut [u8]),
    /// Prepare for general (non-AppleTalk-sized) frames. The fixed buffer
    /// layout already supports them, so this succeeds without action.
    SetGeneralMode,
    /// Synchronous handler-less read. Unsupported.
    Read,
    /// Cancel a synchronous read. Unsupported.
    ReadCancel,
    /// Read a controller register (debug).
    ReadRegister(u16),
    /// Write a controller register (debug).
    WriteRegister(u16, u16),
    /// Read a PHY register (debug).
    ReadPhy(u8),
    /// Write a PHY register (debug).
    WritePhy(u8, u16),
    /// Switch PHY internal loopback (debug).
    SetLoopback(bool),
}

/// Successful control outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    /// Completed synchronously.
    Done,
    /// Accepted; completion signaled asynchronously.
    InProgress,
    /// Bytes written by a get-info copy.
    InfoLen(usize),
    /// Register contents from a debug read.
    Value(u16),
}

/// The driver core: controller handle, registries, statistics.
///
/// `'h` bounds the protocol handlers lent to the driver at attach time.
pub struct Driver<'h, B: ChipBus> {
    pub(crate) chip: Chip<B>,
    pub(crate) handlers: HandlerTable<'h>,
    pub(crate) multicast: MulticastTable,
    pub(crate) info: DriverInfo,
    pub(crate) rha: ReceiveHeaderArea,
}

impl<'h, B: ChipBus> Driver<'h, B> {
    /// Detect, reset and initialize the controller, returning a running
    /// driver with reception enabled and the full cause set unmasked.
    ///
    /// Fails with [`Error::NoHardware`] when nothing answers on the bus;
    /// nothing is retained in that case.
    pub fn open<H: HostInterface>(bus: B, host: &H, config: Config) -> Result<Self, Error> {
        let mut chip = Chip::new(bus, config.rx_buffer_start);
        chip.reset(&|us| host.delay_us(us))?;
        chip.init();

        // Prefer an externally supplied address; otherwise trust the
        // factory-programmed one the reset just restored.
        let address = match config.mac_override {
            Some(addr) => {
                chip.write_hwaddr(addr);
                addr
            }
            None => chip.read_hwaddr(),
        };

        chip.write_hash_filter([0; 4]);
        chip.enable_irq(Eie::OPERATING);
        chip.start();
        debug!("open: station address {}", address);

        Ok(Self {
            chip,
            handlers: HandlerTable::new(),
            multicast: MulticastTable::new(),
            info: DriverInfo::new(address),
            rha: ReceiveHeaderArea::new(),
        })
    }

    /// Reset the controller to an inert state and give the bus back.
    ///
    /// The host uninstalls its interrupt registration before calling this.
    pub fn close(mut self) -> B {
        self.chip.shutdown();
        self.chip.release()
    }

    /// The station address in use.
    pub fn address(&self) -> EthernetAddress {
        self.info.address
    }

    /// Current statistics.
    pub fn info(&self) -> &DriverInfo {
        &self.info
    }

    /// Register a multicast address; reprograms the hardware hash filter
    /// only when the exact-match set actually changed.
    pub fn add_multicast(&mut self, address: EthernetAddress) -> Result<(), Error> {
        if self.multicast.add(address)? {
            let words = self.multicast.hash_words();
            self.chip.write_hash_filter(words);
        }
        Ok(())
    }

    /// Drop one registration of a multicast address.
    pub fn del_multicast(&mut self, address: EthernetAddress) {
        if self.multicast.remove(address) {
            let words = self.multicast.hash_words();
            self.chip.write_hash_filter(words);
        }
    }

    /// Register a protocol handler. Duplicate registration fails; the
    /// first one wins.
    pub fn attach_handler(
        &mut self,
        id: ProtocolId,
        sink: Option<&'h dyn FrameSink>,
    ) -> Result<(), Error> {
        self.handlers.attach(id, sink)
    }

    /// Remove a protocol handler registration (no-op when absent).
    pub fn detach_handler(&mut self, id: ProtocolId) {
        self.handlers.detach(id)
    }

    /// Copy the info block into `out`, truncating to its length.
    pub fn get_info(&self, out: &mut [u8]) -> usize {
        self.info.write_to(out)
    }

    /// Dispatch one control operation.
    pub fn control(&mut self, op: Control<'_, 'h>) -> Result<ControlReply, Error> {
        match op {
            Control::AddMulticast(addr) => {
                self.add_multicast(addr)?;
                Ok(ControlReply::Done)
            }
            Control::DelMulticast(addr) => {
                self.del_multicast(addr);
                Ok(ControlReply::Done)
            }
            Control::AttachHandler(id, sink) => {
                self.attach_handler(id, sink)?;
                Ok(ControlReply::Done)
            }
            Control::DetachHandler(id) => {
                self.detach_handler(id);
                Ok(ControlReply::Done)
            }
            Control::Write(segments) => {
                self.transmit(segments)?;
                Ok(ControlReply::InProgress)
            }
            Control::GetInfo(out) => Ok(ControlReply::InfoLen(self.get_info(out))),
            Control::SetGeneralMode => Ok(ControlReply::Done),
            Control::Read | Control::ReadCancel => Err(Error::Unsupported),
            Control::ReadRegister(reg) => Ok(ControlReply::Value(self.chip.sfr_read(reg))),
            Control::WriteRegister(reg, value) => {
                self.chip.sfr_write(reg, value);
                Ok(ControlReply::Done)
            }
            Control::ReadPhy(reg) => Ok(ControlReply::Value(self.chip.phy_read(reg)?)),
            Control::WritePhy(reg, value) => {
                self.chip.phy_write(reg, value)?;
                Ok(ControlReply::Done)
            }
            Control::SetLoopback(enable) => {
                self.chip.set_loopback(enable)?;
                Ok(ControlReply::Done)
            }
        }
    }
}

/// A driver shared between the foreground context and the interrupt
/// context.
///
/// On the single-core platforms this controller lives on, the lock is
/// never contended: the host masks interrupts for the duration of
/// foreground mutation, and the two interrupt halves never overlap.
pub struct SharedDriver<'h, B: ChipBus> {
    inner: spin::Mutex<Driver<'h, B>>,
}

impl<'h, B: ChipBus> SharedDriver<'h, B> {
    pub fn new(driver: Driver<'h, B>) -> Self {
        Self { inner: spin::Mutex::new(driver) }
    }

    /// Foreground access for control calls.
    pub fn lock(&self) -> spin::MutexGuard<'_, Driver<'h, B>> {
        self.inner.lock()
    }

    /// Interrupt top-half entry point.
    pub fn isr_top<H: HostInterface>(&self, host: &H) -> IsrStatus {
        self.inner.lock().isr_top(host)
    }

    /// Deferred bottom-half entry point.
    pub fn isr_bottom<H: HostInterface>(&self, host: &H) {
        self.inner.lock().isr_bottom(host)
    }

    /// Tear down, returning the bus.
    pub fn close(self) -> B {
        self.inner.into_inner().close()
    }
}
