//! Bus access to the controller's mapped window.
//!
//! The ENC624J600 in parallel slave mode appears as one contiguous memory
//! window: SRAM, then the SFR file. Everything the driver does goes through
//! [`ChipBus`]; production code uses the raw-pointer [`MappedWindow`], tests
//! substitute an in-memory fake.

/// Register and buffer access to the chip's address space.
///
/// Addresses are chip addresses (`0x0000..0x8000`). Register accesses are
/// 16-bit and little-endian on the wire; implementations return host-order
/// values. Reads of the SFR file can be side-effecting on real hardware
/// (write-to-clear aliases, write-to-trigger bits), so callers never cache
/// register contents across calls.
pub trait ChipBus {
    /// Read a 16-bit register or SRAM word at `addr`.
    fn read_reg(&self, addr: u16) -> u16;

    /// Write a 16-bit register or SRAM word at `addr`.
    fn write_reg(&mut self, addr: u16, value: u16);

    /// Copy `dst.len()` bytes out of the window starting at `addr`.
    fn read_buf(&self, addr: u16, dst: &mut [u8]);

    /// Copy `src` into the window starting at `addr`.
    fn write_buf(&mut self, addr: u16, src: &[u8]);
}

/// A memory-mapped chip window at a fixed host address.
pub struct MappedWindow {
    base: *mut u8,
}

// The window maps device registers, not host memory; the driver serializes
// all access through a single context.
unsafe impl Send for MappedWindow {}

impl MappedWindow {
    /// Wrap the mapped window at `base`.
    ///
    /// # Safety
    /// `base` must point at a live, correctly decoded ENC624J600 window of
    /// at least 32 KiB, and no other code may access it for the lifetime of
    /// the returned value.
    pub unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

impl ChipBus for MappedWindow {
    fn read_reg(&self, addr: u16) -> u16 {
        // SAFETY: in-window per the constructor contract; 16-bit aligned
        // accesses are what the chip's bus interface expects.
        unsafe {
            let lo = core::ptr::read_volatile(self.base.add(addr as usize));
            let hi = core::ptr::read_volatile(self.base.add(addr as usize + 1));
            u16::from_le_bytes([lo, hi])
        }
    }

    fn write_reg(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        // SAFETY: see read_reg.
        unsafe {
            core::ptr::write_volatile(self.base.add(addr as usize), lo);
            core::ptr::write_volatile(self.base.add(addr as usize + 1), hi);
        }
    }

    fn read_buf(&self, addr: u16, dst: &mut [u8]) {
        for (i, b) in dst.iter_mut().enumerate() {
            // SAFETY: in-window; SRAM reads have no side effects.
            *b = unsafe { core::ptr::read_volatile(self.base.add(addr as usize + i)) };
        }
    }

    fn write_buf(&mut self, addr: u16, src: &[u8]) {
        for (i, b) in src.iter().enumerate() {
            // SAFETY: in-window.
            unsafe { core::ptr::write_volatile(self.base.add(addr as usize + i), *b) };
        }
    }
}
