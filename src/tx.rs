//! Transmit path.
//!
//! One frame in flight at a time: the transmit buffer holds exactly one
//! maximum-size frame, and the host does not issue another write until the
//! completion signal for the previous one has fired. Completion is always
//! asynchronous, through the transmit causes in the interrupt path.

use log::{debug, trace};

use crate::bus::ChipBus;
use crate::driver::Driver;
use crate::error::Error;
use crate::rx::{FCS_LEN, MAX_FRAME_LEN};

impl<'h, B: ChipBus> Driver<'h, B> {
    /// Copy an outbound frame into the transmit buffer and start it.
    ///
    /// `segments` is the frame in order, header first. Callers leave the
    /// source-address field as a placeholder; it is overwritten with the
    /// device's own hardware address. `Ok(())` means transmission is in
    /// progress; success or failure arrives later through the host's
    /// completion signal.
    pub fn transmit(&mut self, segments: &[&[u8]]) -> Result<(), Error> {
        let total: usize = segments.iter().map(|s| s.len()).sum();

        // The controller appends the 4-byte FCS itself.
        if total + FCS_LEN as usize > MAX_FRAME_LEN as usize {
            debug!("tx: rejecting {} byte frame", total);
            return Err(Error::FrameTooLong);
        }

        let mut offset: u16 = 0;
        for segment in segments {
            self.chip.write_tx(offset, segment);
            offset += segment.len() as u16;
        }

        // Stamp our station address into the source field.
        self.chip.write_tx(6, self.info.address.as_bytes());

        if !self.chip.link_up() {
            // Nothing on the wire would hear it.
            return Err(Error::LinkDown);
        }

        trace!("tx: {} bytes", total);
        self.chip.start_transmit(total as u16);
        Ok(())
    }
}
