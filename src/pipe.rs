//! The pipe layer
//!
//! The CDC bridge doesn't touch host controller registers. It expects a
//! [`Transport`] that opens pipes, runs transfers, and issues control
//! requests on its behalf. A transport is usually a thin layer over a vendor
//! host stack; see the trait documentation for the contract.

use usb_device::{
    control::Request,
    endpoint::{EndpointAddress, EndpointType},
};

use crate::{
    registry::HostId,
    transfer::{TransferError, TransferRequest},
};

/// A host channel bound to one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct PipeId(pub u8);

/// The state of the most recent transfer on a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TransferState {
    /// Nothing submitted
    Idle,
    /// A transfer is on the bus
    Pending,
    /// The last transfer finished
    Done,
    /// The last transfer failed
    Error(TransferError),
}

/// Progress of a control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ControlStatus {
    /// The request completed
    Ok,
    /// The request is still running; issue the same request again later
    Busy,
    /// The device stalled the request
    NotSupported,
    /// The request failed on the bus
    Error,
}

/// The transport rejected a submission
///
/// The request comes back to the caller, with its buffer.
pub struct Rejected(pub TransferRequest);

/// A USB host transport
///
/// # Contract
///
/// - `submit()` takes ownership of the request. The transport keeps it until the
///   transfer finishes, then hands it back in a [`Completion`](crate::Completion)
///   through [`DeviceAdapter::dispatch`](crate::DeviceAdapter::dispatch). The
///   transport must never call `dispatch` from inside one of these methods.
/// - An IN transfer of `n` bytes may finish early on a short packet. The
///   transport reports the received count in [`Outcome::Done`](crate::Outcome::Done).
///   Transports that can't detect short packets never finish early; the idle
///   timer handles those.
/// - `progress()` reports the bytes received so far by the in-flight transfer.
///   It's zero right after `submit()`.
/// - `abort()` cancels the in-flight transfer and returns its request. After
///   `abort()` returns `Some`, no completion will arrive for that request.
///   Return `None` if nothing is in flight, or if the transfer can't be
///   recalled (its completion will still be dispatched later).
/// - `control()` is polled. Issue the request on the first call and return
///   [`ControlStatus::Busy`] until it finishes. On an IN data stage, fill `data`.
///
/// # Example
///
/// A transport that throws everything away.
///
/// ```
/// use usbh_cdc::{ControlStatus, HostId, PipeId, Rejected, Transport, TransferRequest, TransferState};
/// use usb_device::{control::Request, endpoint::{EndpointAddress, EndpointType}};
///
/// struct Null;
///
/// impl Transport for Null {
///     fn open_pipe(&mut self, _: HostId, ep: EndpointAddress, _: EndpointType, _: u16) -> Option<PipeId> {
///         Some(PipeId(ep.index() as u8))
///     }
///     fn close_pipe(&mut self, _: PipeId) {}
///     fn submit(&mut self, _: PipeId, request: TransferRequest) -> Result<(), Rejected> {
///         Err(Rejected(request))
///     }
///     fn progress(&self, _: PipeId) -> usize { 0 }
///     fn state(&self, _: PipeId) -> TransferState { TransferState::Idle }
///     fn abort(&mut self, _: PipeId) -> Option<TransferRequest> { None }
///     fn control(&mut self, _: HostId, _: &Request, _: &mut [u8]) -> ControlStatus {
///         ControlStatus::NotSupported
///     }
/// }
/// ```
pub trait Transport {
    /// Open a pipe to `endpoint` on the device attached to `host`
    ///
    /// Returns `None` if there are no free host channels.
    fn open_pipe(
        &mut self,
        host: HostId,
        endpoint: EndpointAddress,
        kind: EndpointType,
        max_packet_size: u16,
    ) -> Option<PipeId>;

    /// Close a pipe, releasing its host channel
    fn close_pipe(&mut self, pipe: PipeId);

    /// Start a bulk transfer
    fn submit(&mut self, pipe: PipeId, request: TransferRequest) -> Result<(), Rejected>;

    /// Returns the number of bytes moved by the in-flight transfer
    fn progress(&self, pipe: PipeId) -> usize;

    /// Returns the state of the most recent transfer
    ///
    /// Idle ticks skip a receive that's `Done` or `Error`, and wait for its
    /// completion instead.
    fn state(&self, pipe: PipeId) -> TransferState;

    /// Cancel the in-flight transfer, and return its request
    fn abort(&mut self, pipe: PipeId) -> Option<TransferRequest>;

    /// Run (or continue) a control request on the default pipe
    fn control(&mut self, host: HostId, setup: &Request, data: &mut [u8]) -> ControlStatus;
}

/// Encode a setup packet
///
/// Transports that talk to raw host channels need the 8-byte wire form of the
/// requests this crate builds.
pub fn setup_packet(request: &Request) -> [u8; 8] {
    let request_type = (request.direction as u8 & 0x80)
        | ((request.request_type as u8) << 5)
        | (request.recipient as u8);
    let value = request.value.to_le_bytes();
    let index = request.index.to_le_bytes();
    let length = request.length.to_le_bytes();
    [
        request_type,
        request.request,
        value[0],
        value[1],
        index[0],
        index[1],
        length[0],
        length[1],
    ]
}
