//! Seams to the CAN transceiver, the network stack and the clock.
//!
//! None of these calls may block indefinitely: receives are polls and bus
//! transmits are bounded by a timeout.

use caneth::CanFrame;
use core::fmt::Debug;
use core::net::SocketAddr;
use core::time::Duration;

use crate::config::BitRate;

/// CAN transceiver driver.
pub trait CanEndpoint {
    type Error: Debug;

    /// Arm the transceiver at `bit_rate`.
    fn start(&mut self, bit_rate: BitRate) -> Result<(), Self::Error>;

    /// Disarm the transceiver. Stopping an idle transceiver is a no-op.
    fn stop(&mut self);

    /// Queue a frame, waiting at most `timeout` for room.
    fn transmit(
        &mut self,
        frame: &CanFrame,
        timeout: Duration,
    ) -> Result<(), Self::Error>;

    /// Next received frame, `None` when the receive queue is empty.
    fn receive(&mut self) -> Result<Option<CanFrame>, Self::Error>;
}

/// Unacknowledged datagram link.
pub trait NetworkEndpoint {
    type Error: Debug;

    fn open(&mut self) -> Result<(), Self::Error>;

    fn close(&mut self);

    /// Send one datagram to `remote`.
    fn send_to(
        &mut self,
        remote: SocketAddr,
        datagram: &[u8],
    ) -> Result<(), Self::Error>;

    /// Copy the next pending datagram into `buf`, returning the number of
    /// bytes copied, or `None` when nothing is pending.
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;
}

/// Suspends the forwarding loop between cycles.
pub trait Delay {
    fn delay(&mut self, interval: Duration);
}

impl<F: FnMut(Duration)> Delay for F {
    fn delay(&mut self, interval: Duration) {
        self(interval)
    }
}
