//! Host-side test doubles

use alloc::{collections::VecDeque, vec::Vec};

use usb_device::{
    control::Request,
    endpoint::{EndpointAddress, EndpointType},
    UsbDirection,
};

use crate::{
    adapter::CharDevices,
    line_coding::{LineCoding, LINE_CODING_SIZE},
    pipe::{ControlStatus, PipeId, Rejected, TransferState, Transport},
    registry::{DeviceId, HostId},
    timer::TickTimer,
    transfer::{Completion, Outcome, Tag, TransferError, TransferRequest},
    Error,
};

pub fn tag(direction: UsbDirection) -> Tag {
    Tag {
        device: DeviceId::from_raw(0, 1),
        direction,
    }
}

struct MockPipe {
    host: HostId,
    endpoint: EndpointAddress,
    open: bool,
    in_flight: Option<TransferRequest>,
    progress: usize,
    state: TransferState,
}

/// A transport that runs transfers when the test says so
pub struct MockTransport {
    pipes: Vec<MockPipe>,
    /// Refuse every `submit()`
    pub reject_submits: bool,
    /// `abort()` returns the in-flight request
    pub abortable: bool,
    /// Maximum number of open pipes
    pub pipe_limit: usize,
    /// Statuses returned by the next `control()` calls; `Ok` once empty
    pub control_script: VecDeque<ControlStatus>,
    /// Every control request, in order
    pub control_log: Vec<Request>,
    /// The GET_LINE_CODING reply; `None` echoes the last SET_LINE_CODING
    pub line_coding: Option<[u8; LINE_CODING_SIZE]>,
    last_set: [u8; LINE_CODING_SIZE],
    /// Bytes accepted on OUT pipes
    pub sent: Vec<u8>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            pipes: Vec::new(),
            reject_submits: false,
            abortable: true,
            pipe_limit: 8,
            control_script: VecDeque::new(),
            control_log: Vec::new(),
            line_coding: None,
            last_set: [0; LINE_CODING_SIZE],
            sent: Vec::new(),
        }
    }

    /// Open a bulk IN pipe on host 0
    pub fn pipe_in(&mut self) -> PipeId {
        self.open_pipe(HostId(0), EndpointAddress::from(0x81), EndpointType::Bulk, 64)
            .unwrap()
    }

    /// Open a bulk OUT pipe on host 0
    pub fn pipe_out(&mut self) -> PipeId {
        self.open_pipe(HostId(0), EndpointAddress::from(0x01), EndpointType::Bulk, 64)
            .unwrap()
    }

    /// Find the open pipe bound to `endpoint` on `host`
    pub fn find_pipe(&self, host: HostId, endpoint: u8) -> Option<PipeId> {
        self.pipes
            .iter()
            .position(|pipe| {
                pipe.open && pipe.host == host && u8::from(pipe.endpoint) == endpoint
            })
            .map(|index| PipeId(index as u8))
    }

    pub fn open_pipes(&self) -> usize {
        self.pipes.iter().filter(|pipe| pipe.open).count()
    }

    pub fn in_flight(&self, pipe: PipeId) -> Option<&TransferRequest> {
        self.pipes[pipe.0 as usize].in_flight.as_ref()
    }

    /// The device sends `data` into the in-flight IN transfer
    ///
    /// Returns the number of bytes that fit.
    pub fn receive(&mut self, pipe: PipeId, data: &[u8]) -> usize {
        let pipe = &mut self.pipes[pipe.0 as usize];
        let request = pipe.in_flight.as_mut().unwrap();
        let buffer = &mut request.data_mut()[pipe.progress..];
        let count = buffer.len().min(data.len());
        buffer[..count].copy_from_slice(&data[..count]);
        pipe.progress += count;
        count
    }

    /// Finish the in-flight transfer
    ///
    /// IN transfers report the bytes received so far. OUT transfers
    /// report the whole request.
    pub fn complete(&mut self, pipe: PipeId) -> Completion {
        let sent = {
            let pipe = &self.pipes[pipe.0 as usize];
            let request = pipe.in_flight.as_ref().unwrap();
            match request.direction() {
                UsbDirection::In => pipe.progress,
                UsbDirection::Out => request.len(),
            }
        };
        self.complete_partial(pipe, sent)
    }

    /// Finish the in-flight transfer, moving `count` bytes
    pub fn complete_partial(&mut self, pipe: PipeId, count: usize) -> Completion {
        let pipe = &mut self.pipes[pipe.0 as usize];
        let request = pipe.in_flight.take().unwrap();
        if request.direction() == UsbDirection::Out {
            self.sent.extend_from_slice(&request.data()[..count]);
        }
        pipe.progress = 0;
        pipe.state = TransferState::Done;
        Completion::new(request, Outcome::Done(count))
    }

    /// Report `state` on `pipe` without finishing the in-flight transfer
    pub fn set_state(&mut self, pipe: PipeId, state: TransferState) {
        self.pipes[pipe.0 as usize].state = state;
    }

    pub fn fail(&mut self, pipe: PipeId, error: TransferError) -> Completion {
        let pipe = &mut self.pipes[pipe.0 as usize];
        let request = pipe.in_flight.take().unwrap();
        pipe.progress = 0;
        pipe.state = TransferState::Error(error);
        Completion::new(request, Outcome::Failed(error))
    }
}

impl Transport for MockTransport {
    fn open_pipe(
        &mut self,
        host: HostId,
        endpoint: EndpointAddress,
        _: EndpointType,
        _: u16,
    ) -> Option<PipeId> {
        if self.open_pipes() >= self.pipe_limit {
            return None;
        }
        let pipe = MockPipe {
            host,
            endpoint,
            open: true,
            in_flight: None,
            progress: 0,
            state: TransferState::Idle,
        };
        match self.pipes.iter().position(|pipe| !pipe.open) {
            Some(index) => {
                self.pipes[index] = pipe;
                Some(PipeId(index as u8))
            }
            None => {
                self.pipes.push(pipe);
                Some(PipeId(self.pipes.len() as u8 - 1))
            }
        }
    }

    fn close_pipe(&mut self, pipe: PipeId) {
        let pipe = &mut self.pipes[pipe.0 as usize];
        pipe.open = false;
        pipe.state = TransferState::Idle;
    }

    fn submit(&mut self, pipe: PipeId, request: TransferRequest) -> Result<(), Rejected> {
        let reject = self.reject_submits;
        let pipe = &mut self.pipes[pipe.0 as usize];
        if reject || !pipe.open || pipe.in_flight.is_some() {
            return Err(Rejected(request));
        }
        pipe.in_flight = Some(request);
        pipe.progress = 0;
        pipe.state = TransferState::Pending;
        Ok(())
    }

    fn progress(&self, pipe: PipeId) -> usize {
        self.pipes[pipe.0 as usize].progress
    }

    fn state(&self, pipe: PipeId) -> TransferState {
        self.pipes[pipe.0 as usize].state
    }

    fn abort(&mut self, pipe: PipeId) -> Option<TransferRequest> {
        if !self.abortable {
            return None;
        }
        let pipe = &mut self.pipes[pipe.0 as usize];
        let request = pipe.in_flight.take()?;
        pipe.progress = 0;
        pipe.state = TransferState::Idle;
        Some(request)
    }

    fn control(&mut self, _: HostId, setup: &Request, data: &mut [u8]) -> ControlStatus {
        self.control_log.push(*setup);
        let status = self.control_script.pop_front().unwrap_or(ControlStatus::Ok);
        if status == ControlStatus::Ok {
            match setup.request {
                0x20 => self.last_set.copy_from_slice(&data[..LINE_CODING_SIZE]),
                0x21 => data[..LINE_CODING_SIZE]
                    .copy_from_slice(&self.line_coding.unwrap_or(self.last_set)),
                _ => {}
            }
        }
        status
    }
}

/// Records every character device callback
#[derive(Default)]
pub struct Recorder {
    pub registered: Vec<(&'static str, DeviceId)>,
    pub unregistered: Vec<DeviceId>,
    pub rx_ready: Vec<DeviceId>,
    pub tx_done: Vec<DeviceId>,
    pub line_codings: Vec<(DeviceId, LineCoding)>,
    /// Refuse the next registration
    pub refuse: bool,
}

impl CharDevices for Recorder {
    fn register(&mut self, name: &'static str, device: DeviceId) -> Result<(), Error> {
        if core::mem::take(&mut self.refuse) {
            return Err(Error::Register);
        }
        self.registered.push((name, device));
        Ok(())
    }

    fn unregister(&mut self, device: DeviceId) {
        self.unregistered.push(device);
    }

    fn notify_rx_ready(&mut self, device: DeviceId) {
        self.rx_ready.push(device);
    }

    fn notify_tx_done(&mut self, device: DeviceId) {
        self.tx_done.push(device);
    }

    fn line_coding_changed(&mut self, device: DeviceId, coding: &LineCoding) {
        self.line_codings.push((device, *coding));
    }
}

/// Tracks running timers
#[derive(Default)]
pub struct Timers {
    pub running: Vec<(DeviceId, u32)>,
    pub starts: usize,
}

impl Timers {
    pub fn period(&self, device: DeviceId) -> Option<u32> {
        self.running
            .iter()
            .find(|(id, _)| *id == device)
            .map(|(_, period)| *period)
    }
}

impl TickTimer for Timers {
    fn start(&mut self, device: DeviceId, period_us: u32) {
        self.stop(device);
        self.running.push((device, period_us));
        self.starts += 1;
    }

    fn stop(&mut self, device: DeviceId) {
        self.running.retain(|(id, _)| *id != device);
    }
}
