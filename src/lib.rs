//! ENC624J600 Ethernet Controller Driver
//!
//! Control core for the Microchip ENC624J600 in parallel-slave (PSP)
//! mode: the chip's SRAM and registers are memory-mapped and every frame
//! byte crosses the bus under CPU control, no DMA. The driver owns the
//! on-chip buffer layout, walks the receive ring, dispatches frames to
//! registered protocol handlers, maintains the multicast filter, and runs
//! a two-phase interrupt service split between a masked top half and a
//! deferred bottom half.
//!
//! The host platform plugs in through two seams: [`ChipBus`] for register
//! and buffer access (with [`MappedWindow`] as the memory-mapped
//! implementation) and [`HostInterface`] for delays, bottom-half deferral
//! and transmit-completion callbacks.

#![no_std]

pub mod bus;
pub mod chip;
pub mod driver;
pub mod error;
pub mod isr;
pub mod multicast;
pub mod proto;
pub mod regs;
pub mod rx;
pub mod stats;
pub mod tx;

mod util;

pub use bus::{ChipBus, MappedWindow};
pub use driver::{Config, Control, ControlReply, Driver, SharedDriver};
pub use error::{DeferRefused, Error, TxFault};
pub use isr::{HostInterface, IsrStatus};
pub use proto::{FrameHeader, FrameSink, PayloadSource, ProtocolId};
pub use stats::DriverInfo;
