//! Statistics and device-info block.
//!
//! Counters only ever increment; they are zeroed once, when the driver is
//! opened. The interrupt path writes them, the foreground get-info control
//! op reads them, so multi-field consistency is only guaranteed while the
//! host masks interrupts.

use smoltcp::wire::EthernetAddress;

/// Hardware address plus driver counters, in get-info serialization order.
#[derive(Debug, Clone)]
pub struct DriverInfo {
    /// The station address programmed into (or read from) the MAC.
    pub address: EthernetAddress,

    /// Frames delivered to a protocol handler.
    pub rx_frames: u32,
    /// Broadcast frames delivered.
    pub rx_broadcast: u32,
    /// Multicast frames delivered.
    pub rx_multicast: u32,
    /// Frames rejected for a bad frame check sequence.
    pub fcs_errors: u32,
    /// Frames below the minimum Ethernet length.
    pub rx_runt: u32,
    /// Frames above the maximum Ethernet length.
    pub rx_too_long: u32,
    /// Hash collisions with addresses we are not listening to.
    pub rx_unwanted: u32,
    /// Frames with no registered protocol handler.
    pub rx_unknown_protocol: u32,
    /// Receive overflows / packet-counter saturation events.
    pub rx_internal_errors: u32,

    /// Frames transmitted successfully.
    pub tx_frames: u32,
    /// Transmissions deferred at least once by a busy medium.
    pub tx_deferred: u32,
    /// Transmissions that collided at least once.
    pub tx_collisions: u32,
    /// Collided exactly once.
    pub tx_single_collisions: u32,
    /// Collided more than once.
    pub tx_multi_collisions: u32,
    /// Aborted: deferral timeout.
    pub tx_excessive_deferrals: u32,
    /// Aborted: retransmission limit.
    pub tx_excessive_collisions: u32,
    /// Aborted: late collision.
    pub tx_late_collisions: u32,
    /// Aborted for none of the above reasons.
    pub tx_internal_errors: u32,

    /// Interrupts with no recognizable cause.
    pub spurious_interrupts: u32,
    /// Highest pending-packet count observed in the receive ring.
    pub rx_pending_packets_hwm: u32,
    /// Highest pending byte count observed in the receive ring.
    pub rx_pending_bytes_hwm: u32,
}

/// Serialized size of the full info block: 6 address bytes, 2 bytes of
/// padding, then 22 big-endian u32 counters.
pub const INFO_LEN: usize = 8 + 22 * 4;

impl Default for DriverInfo {
    fn default() -> Self {
        Self::new(EthernetAddress([0; 6]))
    }
}

impl DriverInfo {
    /// Fresh block for `address` with all counters at zero.
    pub fn new(address: EthernetAddress) -> Self {
        Self {
            address,
            rx_frames: 0,
            rx_broadcast: 0,
            rx_multicast: 0,
            fcs_errors: 0,
            rx_runt: 0,
            rx_too_long: 0,
            rx_unwanted: 0,
            rx_unknown_protocol: 0,
            rx_internal_errors: 0,
            tx_frames: 0,
            tx_deferred: 0,
            tx_collisions: 0,
            tx_single_collisions: 0,
            tx_multi_collisions: 0,
            tx_excessive_deferrals: 0,
            tx_excessive_collisions: 0,
            tx_late_collisions: 0,
            tx_internal_errors: 0,
            spurious_interrupts: 0,
            rx_pending_packets_hwm: 0,
            rx_pending_bytes_hwm: 0,
        }
    }

    /// Raise a high-water mark to `seen` if it exceeds the recorded value.
    pub(crate) fn raise_hwm(mark: &mut u32, seen: u32) {
        if seen > *mark {
            *mark = seen;
        }
    }

    /// Copy the info block into `out`, truncating to the caller's buffer.
    ///
    /// Returns the number of bytes written. Counters are big-endian and the
    /// layout is stable: address, padding, then the counters in declaration
    /// order.
    pub fn write_to(&self, out: &mut [u8]) -> usize {
        let mut block = [0u8; INFO_LEN];
        block[..6].copy_from_slice(self.address.as_bytes());

        let counters = [
            self.rx_frames,
            self.rx_broadcast,
            self.rx_multicast,
            self.fcs_errors,
            self.rx_runt,
            self.rx_too_long,
            self.rx_unwanted,
            self.rx_unknown_protocol,
            self.rx_internal_errors,
            self.tx_frames,
            self.tx_deferred,
            self.tx_collisions,
            self.tx_single_collisions,
            self.tx_multi_collisions,
            self.tx_excessive_deferrals,
            self.tx_excessive_collisions,
            self.tx_late_collisions,
            self.tx_internal_errors,
            self.spurious_interrupts,
            self.rx_pending_packets_hwm,
            self.rx_pending_bytes_hwm,
            0, // reserved
        ];
        for (i, c) in counters.iter().enumerate() {
            block[8 + i * 4..8 + i * 4 + 4].copy_from_slice(&c.to_be_bytes());
        }

        let len = out.len().min(INFO_LEN);
        out[..len].copy_from_slice(&block[..len]);
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_to_truncates() {
        let mut info = DriverInfo::new(EthernetAddress([2, 0, 0, 0, 0, 1]));
        info.rx_frames = 7;

        let mut small = [0u8; 10];
        assert_eq!(info.write_to(&mut small), 10);
        assert_eq!(&small[..6], &[2, 0, 0, 0, 0, 1]);

        let mut full = [0u8; INFO_LEN + 16];
        assert_eq!(info.write_to(&mut full), INFO_LEN);
        // rx_frames is the first counter after the padded address.
        assert_eq!(&full[8..12], &7u32.to_be_bytes());
        assert_eq!(&full[INFO_LEN..], &[0u8; 16]);
    }

    #[test]
    fn test_hwm_only_rises() {
        let mut mark = 5;
        DriverInfo::raise_hwm(&mut mark, 3);
        assert_eq!(mark, 5);
        DriverInfo::raise_hwm(&mut mark, 9);
        assert_eq!(mark, 9);
    }
}
