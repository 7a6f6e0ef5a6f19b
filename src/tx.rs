//! Transmit pump
//!
//! The transmit pump copies the oldest bytes of the TX ring buffer into its
//! staging buffer, and submits them as one bulk OUT transfer. The bytes stay in
//! the ring buffer until the transfer completes, so a partial completion only
//! consumes what the device accepted. The next chunk starts with the rest.

use alloc::boxed::Box;

use crate::{
    pipe::{PipeId, Rejected, Transport},
    ring::RingBuffer,
    transfer::{self, Outcome, Tag, TransferError, TransferRequest},
};

/// Transmit pump state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TxState {
    /// No transfer outstanding
    Idle,
    /// A bulk OUT transfer is in flight
    SendPosted,
}

/// The result of a [`TxPump::kick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kick {
    /// A transfer of this many bytes is now in flight
    Posted(usize),
    /// A transfer was already in flight
    Busy,
    /// The ring buffer is empty
    Empty,
    /// The transport refused the transfer
    Rejected,
}

/// What happened to a transfer handed back to the pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxResult {
    /// The device accepted this many bytes
    Sent(usize),
    /// The transfer failed; the chunk was abandoned
    Failed(TransferError),
}

pub(crate) struct TxPump {
    state: TxState,
    staging: Option<Box<[u8]>>,
    chunk: usize,
    in_flight: usize,
}

impl TxPump {
    pub fn new(chunk: usize) -> Self {
        TxPump {
            state: TxState::Idle,
            staging: Some(transfer::staging(chunk)),
            chunk,
            in_flight: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == TxState::Idle
    }

    /// Returns the number of ring buffer bytes owned by the in-flight transfer
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Replace the staging buffer with one of `chunk` bytes
    ///
    /// Returns `false` if a transfer is in flight.
    pub fn resize(&mut self, chunk: usize) -> bool {
        if !self.is_idle() || self.staging.is_none() {
            return false;
        }
        self.staging = Some(transfer::staging(chunk));
        self.chunk = chunk;
        true
    }

    /// Start sending the oldest buffered bytes, if idle
    pub fn kick<T: Transport>(
        &mut self,
        tag: Tag,
        pipe: PipeId,
        transport: &mut T,
        ring: &RingBuffer,
    ) -> Kick {
        if self.state == TxState::SendPosted {
            return Kick::Busy;
        }
        if ring.is_empty() {
            return Kick::Empty;
        }
        let Some(mut buffer) = self.staging.take() else {
            return Kick::Busy;
        };
        let limit = self.chunk.min(buffer.len());
        let count = ring.peek(&mut buffer[..limit]);
        match transport.submit(pipe, TransferRequest::new(tag, buffer, count)) {
            Ok(()) => {
                self.state = TxState::SendPosted;
                self.in_flight = count;
                trace!("TX posted {} bytes", count);
                Kick::Posted(count)
            }
            Err(Rejected(request)) => {
                warn!("TX submit rejected on pipe {}", pipe.0);
                self.staging = Some(request.into_buffer());
                Kick::Rejected
            }
        }
    }

    /// Accept a completed transfer from the transport
    ///
    /// Consumes the sent bytes from `ring`. A failed transfer abandons the
    /// whole chunk.
    pub fn on_complete(
        &mut self,
        request: TransferRequest,
        outcome: Outcome,
        ring: &mut RingBuffer,
    ) -> TxResult {
        self.state = TxState::Idle;
        self.staging = Some(request.into_buffer());
        let in_flight = core::mem::take(&mut self.in_flight);
        match outcome {
            Outcome::Done(sent) => TxResult::Sent(ring.skip(sent.min(in_flight))),
            Outcome::Failed(error) => {
                ring.skip(in_flight);
                TxResult::Failed(error)
            }
        }
    }

    /// Cancel the in-flight transfer
    ///
    /// Returns `true` if the pump is idle, and owns its buffer, after the call.
    /// The unsent chunk stays in the ring buffer.
    pub fn abort<T: Transport>(&mut self, pipe: PipeId, transport: &mut T) -> bool {
        if self.state == TxState::SendPosted {
            let Some(request) = transport.abort(pipe) else {
                return false;
            };
            self.staging = Some(request.into_buffer());
            self.state = TxState::Idle;
            self.in_flight = 0;
        }
        self.staging.is_some()
    }
}
