//! Bulk transfer requests and completions
//!
//! A [`TransferRequest`] owns the staging buffer for one bulk transfer. The
//! pumps move a request into the [`Transport`](crate::Transport) when they
//! submit it, and the transport moves it back in a [`Completion`] (or from
//! [`abort()`](crate::Transport::abort)). While a request is in flight, the
//! transport is the only owner of its memory. Nothing else can free it.

use alloc::{boxed::Box, vec};
use usb_device::UsbDirection;

use crate::registry::DeviceId;

/// Identifies the device and pump that submitted a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Tag {
    /// The device that owns the pump
    pub device: DeviceId,
    /// `In` for the receive pump, `Out` for the transmit pump
    pub direction: UsbDirection,
}

/// One bulk transfer, and the memory it moves
pub struct TransferRequest {
    tag: Tag,
    buffer: Box<[u8]>,
    len: usize,
}

impl TransferRequest {
    pub(crate) fn new(tag: Tag, buffer: Box<[u8]>, len: usize) -> Self {
        let len = len.min(buffer.len());
        TransferRequest { tag, buffer, len }
    }

    /// Returns the tag that routes the completion back to its pump
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Returns the transfer direction
    pub fn direction(&self) -> UsbDirection {
        self.tag.direction
    }

    /// Returns the number of bytes to send, or the number of bytes
    /// the transport may receive
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bytes to send on an OUT pipe
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// The memory an IN pipe receives into
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.len]
    }

    pub(crate) fn into_buffer(self) -> Box<[u8]> {
        self.buffer
    }
}

/// Allocate a zeroed staging buffer
pub(crate) fn staging(size: usize) -> Box<[u8]> {
    vec![0; size.max(1)].into_boxed_slice()
}

/// Reasons a pipe reports a failed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TransferError {
    /// The device kept NAKing until the transport gave up
    Nak,
    /// The endpoint is halted
    Stall,
    /// Transaction, babble, or data bus errors
    Other,
}

/// How a transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Outcome {
    /// The transfer finished, moving this many bytes
    Done(usize),
    /// The pipe reported an error
    Failed(TransferError),
}

/// A finished transfer, handed back by the transport
pub struct Completion {
    /// The request, with ownership of its staging buffer
    pub request: TransferRequest,
    /// What happened on the bus
    pub outcome: Outcome,
}

impl Completion {
    pub fn new(request: TransferRequest, outcome: Outcome) -> Self {
        Completion { request, outcome }
    }
}
