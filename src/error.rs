//! Driver error types.

use core::fmt;

/// Errors reported synchronously by driver entry points.
///
/// Receive-side rejects (bad CRC, runts, unwanted addresses, unknown
/// protocols) are deliberately not here: they are expected background noise
/// and only show up as [`DriverInfo`](crate::stats::DriverInfo) counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No responding chip found on the bus at open.
    NoHardware,
    /// Frame plus FCS would exceed the maximum Ethernet frame size.
    FrameTooLong,
    /// The PHY reports no link; the frame was not transmitted.
    LinkDown,
    /// Fixed-capacity registration table is full.
    TableFull,
    /// A handler is already registered for this protocol.
    AlreadyAttached,
    /// The requested control operation is not supported.
    Unsupported,
    /// The MII management interface did not complete an operation.
    PhyTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHardware => write!(f, "no controller detected on the bus"),
            Self::FrameTooLong => write!(f, "frame exceeds maximum length"),
            Self::LinkDown => write!(f, "link is down"),
            Self::TableFull => write!(f, "registration table is full"),
            Self::AlreadyAttached => write!(f, "protocol already has a handler"),
            Self::Unsupported => write!(f, "operation not supported"),
            Self::PhyTimeout => write!(f, "PHY management interface timed out"),
        }
    }
}

/// The host's deferred-execution queue refused the bottom half.
///
/// Not a failure: the interrupt cause stays asserted and the next hardware
/// interrupt retries the deferral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferRefused;

/// Asynchronous transmit failure delivered through the completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxFault {
    /// Covers excess deferral, max collisions, late collision and internal
    /// aborts uniformly, as the host framework expects a single code.
    ExcessCollisions,
}

impl fmt::Display for TxFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcessCollisions => write!(f, "transmit aborted (collisions or deferral)"),
        }
    }
}
