//! Receive frame boundaries
//!
//! A bulk IN transfer has no end-of-message marker. Some transports finish a
//! transfer on a short packet, and report it through a completion. Others keep
//! the transfer open until the buffer fills. For those, the receive pump
//! samples the transfer's progress on a periodic tick, and asks a
//! [`FrameBoundaryDetector`] if the frame ended.

/// Strategy selection, part of the device [`Config`](crate::Config)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum FrameBoundary {
    /// Poll the received byte count, and end the frame when it stops moving
    IdleTimer,
    /// Trust the transport to complete on short packets; no polling
    ShortPacket,
}

/// Decides when a receive transfer holds a complete frame
pub trait FrameBoundaryDetector {
    /// Returns `true` if the detector needs periodic samples
    fn needs_tick(&self) -> bool;

    /// Sample the byte count of the in-flight transfer
    ///
    /// Returns `true` when the transfer should be treated as complete.
    fn sample(&mut self, received: usize) -> bool;

    /// Forget all samples; called whenever a new transfer is armed
    fn reset(&mut self);
}

/// Ends a frame when the byte count is non-zero, and unchanged between two
/// consecutive samples
#[derive(Debug, Default)]
pub struct IdleTimeout {
    last: usize,
}

impl FrameBoundaryDetector for IdleTimeout {
    fn needs_tick(&self) -> bool {
        true
    }

    fn sample(&mut self, received: usize) -> bool {
        if received != 0 && received == self.last {
            true
        } else {
            self.last = received;
            false
        }
    }

    fn reset(&mut self) {
        self.last = 0;
    }
}

/// Never ends a frame from a sample
#[derive(Debug, Default)]
pub struct ShortPacket;

impl FrameBoundaryDetector for ShortPacket {
    fn needs_tick(&self) -> bool {
        false
    }

    fn sample(&mut self, _: usize) -> bool {
        false
    }

    fn reset(&mut self) {}
}

/// The detector chosen by a [`FrameBoundary`]
#[derive(Debug)]
pub(crate) enum Detector {
    Idle(IdleTimeout),
    Short(ShortPacket),
}

impl Detector {
    pub fn new(boundary: FrameBoundary) -> Self {
        match boundary {
            FrameBoundary::IdleTimer => Detector::Idle(IdleTimeout::default()),
            FrameBoundary::ShortPacket => Detector::Short(ShortPacket),
        }
    }

    fn inner(&mut self) -> &mut dyn FrameBoundaryDetector {
        match self {
            Detector::Idle(idle) => idle,
            Detector::Short(short) => short,
        }
    }
}

impl FrameBoundaryDetector for Detector {
    fn needs_tick(&self) -> bool {
        matches!(self, Detector::Idle(_))
    }

    fn sample(&mut self, received: usize) -> bool {
        self.inner().sample(received)
    }

    fn reset(&mut self) {
        self.inner().reset()
    }
}
