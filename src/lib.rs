//! A USB host CDC serial bridge
//!
//! `usbh-cdc` turns the bulk pipes of a USB CDC ACM device into a byte-stream
//! character device. It sits between a USB host stack, which enumerates devices
//! and moves transfers, and an OS device layer, which exposes
//! `open`/`read`/`write`/`ioctl` to applications.
//!
//! The crate doesn't touch hardware. You provide
//!
//! - a [`Transport`] that opens pipes and runs transfers,
//! - a [`CharDevices`] registry that publishes devices and wakes waiting tasks,
//! - a [`TickTimer`] that drives idle-frame detection.
//!
//! Then, give them to a [`DeviceAdapter`]. Call [`attach`](DeviceAdapter::attach)
//! when the host stack finds a CDC device, and forward transfer completions
//! and timer ticks through [`dispatch`](DeviceAdapter::dispatch).
//!
//! # Receive framing
//!
//! Bulk IN transfers have no end-of-message marker. If your transport can't
//! finish a transfer on a short packet, the adapter samples the transfer's
//! progress on an idle tick. Once the received count stops moving, the bytes
//! are delivered. See [`FrameBoundary`].
//!
//! # Memory
//!
//! Ring buffers and staging buffers are allocated when a device attaches, so
//! you need a global allocator. A staging buffer moves into the transport with
//! each [`TransferRequest`], and comes back in a [`Completion`].
//!
//! # Features
//!
//! - `defmt-03` derives `defmt::Format` on public types.
//! - `cortex-m` selects the single-core `critical-section` implementation from
//!   `cortex-m`.

#![no_std]

extern crate alloc;

#[cfg(feature = "defmt-03")]
extern crate defmt_03 as defmt;

#[macro_use]
mod log;

mod adapter;
mod class;
mod frame;
mod line_coding;
mod pipe;
mod registry;
mod ring;
mod rx;
mod transfer;
mod tx;

pub mod timer;

#[cfg(test)]
mod testing;

pub use adapter::{CharDevices, Config, DeviceAdapter, DeviceFlags, Event, Ioctl, Stats};
pub use class::{ClassState, DeviceInfo, EndpointInfo, InterfaceInfo, InterfaceQuirk, QUIRKS};
pub use frame::{FrameBoundary, FrameBoundaryDetector, IdleTimeout, ShortPacket};
pub use line_coding::{DataBits, LineCoding, Parity, StopBits, LINE_CODING_SIZE};
pub use pipe::{setup_packet, ControlStatus, PipeId, Rejected, TransferState, Transport};
pub use registry::{DeviceId, HostId};
pub use ring::RingBuffer;
pub use timer::TickTimer;
pub use transfer::{Completion, Outcome, Tag, TransferError, TransferRequest};

/// Errors returned by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error {
    /// A transfer failed on the bus
    Transfer(TransferError),
    /// The operation conflicts with a transfer in flight, or with an open device
    Busy,
    /// The device detached, or the id was never valid
    NotAttached,
    /// The device isn't open
    NotOpen,
    /// No CDC interface, or the interface lacks bulk endpoints
    NoInterface,
    /// Every device slot is taken
    NoSlot,
    /// The transport couldn't open a pipe
    Pipe,
    /// The character device registry refused the device
    Register,
}

impl From<TransferError> for Error {
    fn from(err: TransferError) -> Self {
        Error::Transfer(err)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Transfer(TransferError::Nak) => f.write_str("transfer NAKed"),
            Error::Transfer(TransferError::Stall) => f.write_str("endpoint stalled"),
            Error::Transfer(TransferError::Other) => f.write_str("transfer error"),
            Error::Busy => f.write_str("device busy"),
            Error::NotAttached => f.write_str("device not attached"),
            Error::NotOpen => f.write_str("device not open"),
            Error::NoInterface => f.write_str("no CDC interface"),
            Error::NoSlot => f.write_str("no free device slot"),
            Error::Pipe => f.write_str("cannot open pipe"),
            Error::Register => f.write_str("device registration refused"),
        }
    }
}
