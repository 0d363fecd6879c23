//! Interrupt dispatcher.
//!
//! Split into two halves because the bottom half touches user memory
//! (statistics, protocol-handler state) and must not run at interrupt time
//! while virtual memory is active: a page fault inside the handler would
//! double-fault. The top half classifies causes with chip interrupts
//! masked; paging-sensitive causes are pushed to the bottom half, either
//! inline (no paging) or through the host's deferred-execution queue.
//!
//! Masking discipline: whoever finishes handling re-enables the interrupt
//! output. If the bottom half is deferred, the top half leaves interrupts
//! masked and the bottom half unmasks on every exit path.

use log::{debug, warn};

use crate::bus::ChipBus;
use crate::driver::Driver;
use crate::error::{DeferRefused, TxFault};
use crate::regs::{Eie, Eir, EtxStat};

/// What the top half did with an interrupt assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsrStatus {
    /// A cause was handled, or the bottom half was scheduled for it.
    Handled,
    /// Nothing was done; the hardware will re-assert and the host should
    /// offer the interrupt again (shared-line pass-through, deferral
    /// retry).
    NotHandled,
}

/// Services the host framework provides to the driver.
///
/// One implementation per platform; the driver never assumes more than
/// these four operations.
pub trait HostInterface {
    /// True while virtual memory is active and user memory may be paged
    /// out at interrupt time.
    fn paging_active(&self) -> bool {
        false
    }

    /// Busy-wait for at least `us` microseconds (bring-up delays only).
    fn delay_us(&self, us: u32);

    /// Queue [`Driver::isr_bottom`] to run in a paging-safe context.
    ///
    /// `Err(DeferRefused)` when the queue is full; the driver then backs
    /// off and the same causes retry on the next hardware assertion.
    fn defer_bottom_half(&self) -> Result<(), DeferRefused>;

    /// Single-slot asynchronous completion signal for the outstanding
    /// transmit. Invoked exactly once per transmit, never concurrently.
    fn transmit_complete(&self, result: Result<(), TxFault>);
}

/// Causes that must be handled in the bottom half.
const USER_CAUSES: Eir = Eir::TXIF.union(Eir::TXABTIF).union(Eir::PKTIF);

impl<'h, B: ChipBus> Driver<'h, B> {
    /// Interrupt top half. Runs with controller interrupts masked; safe in
    /// a restricted execution context (no user-memory access).
    pub fn isr_top<H: HostInterface>(&mut self, host: &H) -> IsrStatus {
        self.chip.disable_irq(Eie::INTIE);
        let causes = self.chip.irq_state();
        let mut handled = IsrStatus::NotHandled;

        if causes.contains(Eir::LINKIF) {
            // Track the autonegotiated duplex; fully handled here.
            self.chip.duplex_sync();
            self.chip.clear_irq(Eir::LINKIF);
            debug!(
                "link {} ({} duplex)",
                if self.chip.link_up() { "up" } else { "down" },
                if self.chip.full_duplex() { "full" } else { "half" },
            );
            handled = IsrStatus::Handled;
        }

        if causes.intersects(Eir::RXABTIF | Eir::PCFULIF) {
            // A packet was dropped on the floor. No recovery needed beyond
            // draining the ring, which the packet-pending cause drives.
            self.info.rx_internal_errors += 1;
            warn!("rx overflow (causes {:?})", causes);
            self.chip.clear_irq(Eir::RXABTIF | Eir::PCFULIF);
            handled = IsrStatus::Handled;
        }

        if causes.intersects(USER_CAUSES) {
            if host.paging_active() {
                if host.defer_bottom_half().is_err() {
                    // Queue full. Leave the causes asserted, unmask, and
                    // let the re-raised interrupt retry. Not a failure.
                    self.chip.enable_irq(Eie::INTIE);
                    return IsrStatus::NotHandled;
                }
                // Deferred: the bottom half unmasks when it runs.
            } else {
                self.isr_bottom(host);
            }
            return IsrStatus::Handled;
        }

        if handled == IsrStatus::NotHandled {
            self.info.spurious_interrupts += 1;
            debug!("spurious interrupt");
        }
        self.chip.enable_irq(Eie::INTIE);
        handled
    }

    /// Interrupt bottom half: the user-memory-touching part.
    ///
    /// Entered with interrupts masked, directly from the top half or later
    /// from the host's deferred-execution context. Re-enables interrupts
    /// on every path out.
    pub fn isr_bottom<H: HostInterface>(&mut self, host: &H) {
        let causes = self.chip.irq_state();

        if causes.contains(Eir::TXIF) {
            let status = self.chip.tx_status();
            let collisions = self.chip.tx_collision_count();
            if status.contains(EtxStat::DEFER) {
                self.info.tx_deferred += 1;
            }
            if collisions >= 1 {
                self.info.tx_collisions += 1;
                if collisions == 1 {
                    self.info.tx_single_collisions += 1;
                } else {
                    self.info.tx_multi_collisions += 1;
                }
            }
            self.info.tx_frames += 1;
            // Acknowledge before signaling: once the completion fires the
            // host may start another transmit, and a stale cause bit would
            // mis-attribute its completion.
            self.chip.clear_irq(Eir::TXIF);
            host.transmit_complete(Ok(()));
        }

        if causes.contains(Eir::TXABTIF) {
            let status = self.chip.tx_status();
            if status.contains(EtxStat::EXDEFER) {
                self.info.tx_excessive_deferrals += 1;
            } else if status.contains(EtxStat::MAXCOL) {
                self.info.tx_excessive_collisions += 1;
            } else if status.contains(EtxStat::LATECOL) {
                self.info.tx_late_collisions += 1;
            } else {
                self.info.tx_internal_errors += 1;
            }
            warn!("tx abort, status {:?}", status);
            self.chip.clear_irq(Eir::TXABTIF);
            host.transmit_complete(Err(TxFault::ExcessCollisions));
        }

        // PKTIF follows the pending-packet counter and cannot be cleared
        // directly; drain until the counter, and with it the cause, drops.
        while self.chip.irq_state().contains(Eir::PKTIF) {
            self.handle_packet();
        }

        self.chip.enable_irq(Eie::INTIE);
    }
}
