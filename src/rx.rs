//! Receive pump
//!
//! The receive pump keeps one bulk IN transfer posted while the device is
//! attached. Each transfer lands in a staging buffer. When the transfer
//! completes, or when the frame detector decides the stream went idle, the
//! pump moves the staged bytes into the RX ring buffer and posts the next
//! transfer.
//!
//! If the ring buffer can't take every staged byte, the excess is dropped and
//! the pump stops. A reader that drains the ring buffer re-arms it.

use alloc::boxed::Box;

use crate::{
    frame::{Detector, FrameBoundary, FrameBoundaryDetector},
    pipe::{PipeId, Rejected, TransferState, Transport},
    ring::RingBuffer,
    transfer::{self, Outcome, Tag, TransferError, TransferRequest},
};

/// Receive pump state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum RxState {
    /// No transfer outstanding
    Idle,
    /// A bulk IN transfer is armed into the staging buffer
    ReceivePosted,
}

/// The result of moving staged bytes into the ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Delivery {
    /// Bytes stored in the ring buffer
    pub stored: usize,
    /// Bytes that didn't fit
    pub dropped: usize,
}

/// What happened to a transfer handed back to the pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RxResult {
    Delivered(Delivery),
    Failed(TransferError),
}

pub(crate) struct RxPump {
    state: RxState,
    /// `None` while the transport owns the buffer
    staging: Option<Box<[u8]>>,
    size: usize,
    detector: Detector,
}

impl RxPump {
    pub fn new(size: usize, boundary: FrameBoundary) -> Self {
        RxPump {
            state: RxState::Idle,
            staging: Some(transfer::staging(size)),
            size,
            detector: Detector::new(boundary),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == RxState::Idle
    }

    /// Returns `true` if the pump wants idle ticks
    pub fn needs_tick(&self) -> bool {
        self.detector.needs_tick()
    }

    /// Change the frame boundary strategy
    pub fn set_boundary(&mut self, boundary: FrameBoundary) {
        self.detector = Detector::new(boundary);
    }

    /// Replace the staging buffer with one of `size` bytes
    ///
    /// Only valid while idle. Returns `false` if the transport still owns
    /// the current buffer.
    pub fn resize(&mut self, size: usize) -> bool {
        if !self.is_idle() || self.staging.is_none() {
            return false;
        }
        self.staging = Some(transfer::staging(size));
        self.size = size;
        true
    }

    /// Post a receive transfer
    ///
    /// Returns `true` if a transfer is posted when this call returns.
    pub fn arm<T: Transport>(&mut self, tag: Tag, pipe: PipeId, transport: &mut T) -> bool {
        if self.state == RxState::ReceivePosted {
            return true;
        }
        let Some(buffer) = self.staging.take() else {
            return false;
        };
        self.detector.reset();
        let request = TransferRequest::new(tag, buffer, self.size);
        match transport.submit(pipe, request) {
            Ok(()) => {
                self.state = RxState::ReceivePosted;
                true
            }
            Err(Rejected(request)) => {
                warn!("RX submit rejected on pipe {}", pipe.0);
                self.staging = Some(request.into_buffer());
                false
            }
        }
    }

    /// Sample the in-flight transfer on an idle tick
    ///
    /// Returns a delivery if the detector ended the frame, and the transport
    /// handed the transfer back.
    pub fn on_tick<T: Transport>(
        &mut self,
        pipe: PipeId,
        transport: &mut T,
        ring: &mut RingBuffer,
    ) -> Option<Delivery> {
        if self.state != RxState::ReceivePosted || !self.detector.needs_tick() {
            return None;
        }
        // A finished transfer reports through its completion.
        if let TransferState::Done | TransferState::Error(_) = transport.state(pipe) {
            return None;
        }
        let received = transport.progress(pipe);
        if !self.detector.sample(received) {
            return None;
        }
        // If the transport can't recall the transfer, the completion is
        // already on its way.
        let request = transport.abort(pipe)?;
        trace!("RX idle after {} bytes", received);
        Some(self.drain(request, received, ring))
    }

    /// Accept a completed transfer from the transport
    pub fn on_complete(
        &mut self,
        request: TransferRequest,
        outcome: Outcome,
        ring: &mut RingBuffer,
    ) -> RxResult {
        match outcome {
            Outcome::Done(received) => RxResult::Delivered(self.drain(request, received, ring)),
            Outcome::Failed(error) => {
                self.state = RxState::Idle;
                self.staging = Some(request.into_buffer());
                RxResult::Failed(error)
            }
        }
    }

    /// Cancel the posted transfer, if any
    ///
    /// Returns `true` if the pump is idle, and owns its buffer, after the call.
    /// If the transport can't recall the transfer, the pump stays posted until
    /// the completion arrives.
    pub fn stop<T: Transport>(&mut self, pipe: PipeId, transport: &mut T) -> bool {
        if self.state == RxState::ReceivePosted {
            let Some(request) = transport.abort(pipe) else {
                return false;
            };
            self.staging = Some(request.into_buffer());
            self.state = RxState::Idle;
        }
        self.staging.is_some()
    }

    fn drain(&mut self, request: TransferRequest, received: usize, ring: &mut RingBuffer) -> Delivery {
        self.state = RxState::Idle;
        let count = received.min(request.len());
        let stored = ring.put(&request.data()[..count]);
        self.staging = Some(request.into_buffer());
        Delivery {
            stored,
            dropped: count - stored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Delivery, RxPump, RxResult};
    use crate::{
        frame::FrameBoundary,
        pipe::TransferState,
        ring::RingBuffer,
        testing::{self, MockTransport},
        transfer::{Outcome, TransferError},
    };
    use usb_device::UsbDirection;

    #[test]
    fn idle_frame_ends_once() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        let mut ring = RingBuffer::new(64);
        let mut rx = RxPump::new(64, FrameBoundary::IdleTimer);

        assert!(rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport));
        assert!(!rx.is_idle());
        transport.receive(pipe, &[0xAA; 32]);

        assert_eq!(rx.on_tick(pipe, &mut transport, &mut ring), None);
        let delivery = rx.on_tick(pipe, &mut transport, &mut ring);
        assert_eq!(
            delivery,
            Some(Delivery {
                stored: 32,
                dropped: 0
            })
        );
        assert_eq!(ring.data_len(), 32);
        assert!(rx.is_idle());

        // Re-armed transfer reports no progress
        assert!(rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport));
        assert_eq!(rx.on_tick(pipe, &mut transport, &mut ring), None);
        assert_eq!(rx.on_tick(pipe, &mut transport, &mut ring), None);
    }

    #[test]
    fn growing_count_keeps_frame_open() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        let mut ring = RingBuffer::new(64);
        let mut rx = RxPump::new(64, FrameBoundary::IdleTimer);
        rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport);

        transport.receive(pipe, b"abc");
        assert_eq!(rx.on_tick(pipe, &mut transport, &mut ring), None);
        transport.receive(pipe, b"def");
        assert_eq!(rx.on_tick(pipe, &mut transport, &mut ring), None);
        assert!(rx.on_tick(pipe, &mut transport, &mut ring).is_some());

        let mut buffer = [0; 8];
        assert_eq!(ring.get(&mut buffer), 6);
        assert_eq!(&buffer[..6], b"abcdef");
    }

    #[test]
    fn overflow_drops_excess() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        let mut ring = RingBuffer::new(16);
        ring.put(&[0; 10]);
        let mut rx = RxPump::new(16, FrameBoundary::ShortPacket);
        rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport);

        transport.receive(pipe, &[1; 12]);
        let completion = transport.complete(pipe);
        let result = rx.on_complete(completion.request, completion.outcome, &mut ring);
        assert_eq!(
            result,
            RxResult::Delivered(Delivery {
                stored: 6,
                dropped: 6
            })
        );
        assert!(ring.is_full());
    }

    #[test]
    fn short_packet_ignores_ticks() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        let mut ring = RingBuffer::new(16);
        let mut rx = RxPump::new(16, FrameBoundary::ShortPacket);
        rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport);
        transport.receive(pipe, &[1; 4]);
        for _ in 0..4 {
            assert_eq!(rx.on_tick(pipe, &mut transport, &mut ring), None);
        }
        assert!(!rx.is_idle());
    }

    #[test]
    fn rejected_submit_stays_idle() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        transport.reject_submits = true;
        let mut rx = RxPump::new(16, FrameBoundary::IdleTimer);
        assert!(!rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport));
        assert!(rx.is_idle());

        transport.reject_submits = false;
        assert!(rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport));
    }

    #[test]
    fn failed_transfer_returns_buffer() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        let mut ring = RingBuffer::new(16);
        let mut rx = RxPump::new(16, FrameBoundary::IdleTimer);
        rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport);

        let completion = transport.fail(pipe, TransferError::Stall);
        assert_eq!(completion.outcome, Outcome::Failed(TransferError::Stall));
        let result = rx.on_complete(completion.request, completion.outcome, &mut ring);
        assert_eq!(result, RxResult::Failed(TransferError::Stall));
        assert!(rx.is_idle());
        assert!(rx.resize(32));
    }

    #[test]
    fn stop_reclaims_buffer() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        let mut rx = RxPump::new(16, FrameBoundary::IdleTimer);
        rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport);
        assert!(!rx.resize(8));
        assert!(rx.stop(pipe, &mut transport));
        assert!(rx.is_idle());
        assert!(transport.in_flight(pipe).is_none());
    }

    #[test]
    fn stop_waits_for_unrecallable_transfer() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        transport.abortable = false;
        let mut ring = RingBuffer::new(16);
        let mut rx = RxPump::new(16, FrameBoundary::IdleTimer);
        rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport);
        assert!(!rx.stop(pipe, &mut transport));
        assert!(!rx.is_idle());

        let completion = transport.complete(pipe);
        rx.on_complete(completion.request, completion.outcome, &mut ring);
        assert!(rx.stop(pipe, &mut transport));
    }

    #[test]
    fn finished_transfer_waits_for_completion() {
        let mut transport = MockTransport::new();
        let pipe = transport.pipe_in();
        let mut ring = RingBuffer::new(64);
        let mut rx = RxPump::new(64, FrameBoundary::IdleTimer);
        rx.arm(testing::tag(UsbDirection::In), pipe, &mut transport);

        transport.receive(pipe, b"abc");
        transport.set_state(pipe, TransferState::Error(TransferError::Other));
        assert_eq!(rx.on_tick(pipe, &mut transport, &mut ring), None);
        assert_eq!(rx.on_tick(pipe, &mut transport, &mut ring), None);
        assert!(transport.in_flight(pipe).is_some());
        assert!(ring.is_empty());

        let completion = transport.fail(pipe, TransferError::Other);
        let result = rx.on_complete(completion.request, completion.outcome, &mut ring);
        assert_eq!(result, RxResult::Failed(TransferError::Other));
        assert!(rx.is_idle());
    }
}
