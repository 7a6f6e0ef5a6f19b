//! Idle timer service
//!
//! Receive pumps that use [`FrameBoundary::IdleTimer`](crate::FrameBoundary::IdleTimer)
//! need a periodic tick. The adapter asks a [`TickTimer`] to start a repeating
//! timer per device, and expects the timer callback to dispatch
//! [`Event::IdleTick`](crate::Event::IdleTick) for that device.
//!
//! # Example
//!
//! ```
//! use usbh_cdc::{DeviceId, TickTimer, LineCoding, timer};
//!
//! struct SoftTimers;
//!
//! impl TickTimer for SoftTimers {
//!     fn start(&mut self, device: DeviceId, period_us: u32) {
//!         // os_timer_start(device, period_us)...
//!     }
//!     fn stop(&mut self, device: DeviceId) {
//!         // os_timer_stop(device)...
//!     }
//! }
//!
//! // 115200 baud, 8N1
//! assert_eq!(timer::tick_period_us(&LineCoding::new()), 2_784);
//! ```

use crate::{line_coding::LineCoding, registry::DeviceId};

/// Shortest tick period, in microseconds
pub const MIN_TICK_US: u32 = 1_000;

/// Longest tick period, in microseconds
pub const MAX_TICK_US: u32 = 10_000;

/// Character times that must pass without progress before a frame ends
///
/// The detector needs two samples, so a frame ends between one and two
/// periods after the last byte.
pub const IDLE_BYTE_TIMES: u32 = 32;

/// A periodic timer service, one timer per device
pub trait TickTimer {
    /// Start (or restart) the repeating timer for `device`
    fn start(&mut self, device: DeviceId, period_us: u32);

    /// Stop the timer for `device`
    ///
    /// Stopping a stopped timer has no effect.
    fn stop(&mut self, device: DeviceId);
}

/// Compute the idle tick period for a line coding
///
/// The period spans [`IDLE_BYTE_TIMES`] characters, and saturates between
/// [`MIN_TICK_US`] and [`MAX_TICK_US`].
pub fn tick_period_us(coding: &LineCoding) -> u32 {
    coding
        .byte_time_us()
        .saturating_mul(IDLE_BYTE_TIMES)
        .clamp(MIN_TICK_US, MAX_TICK_US)
}

#[cfg(test)]
mod test {
    use super::{tick_period_us, MAX_TICK_US, MIN_TICK_US};
    use crate::line_coding::LineCoding;

    #[test]
    fn period_saturates() {
        let fast = LineCoding {
            baud_rate: 3_000_000,
            ..LineCoding::new()
        };
        assert_eq!(tick_period_us(&fast), MIN_TICK_US);

        let slow = LineCoding {
            baud_rate: 2400,
            ..LineCoding::new()
        };
        assert_eq!(tick_period_us(&slow), MAX_TICK_US);
    }

    #[test]
    fn period_tracks_byte_time() {
        let coding = LineCoding {
            baud_rate: 57_600,
            ..LineCoding::new()
        };
        // 174us * 32
        assert_eq!(tick_period_us(&coding), 5_568);
    }
}
