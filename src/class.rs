//! CDC ACM class driver
//!
//! [`CdcClass`] tracks one attached device: the interface it bound to, the
//! pipes it opened, and the state of its class requests. The adapter drives it
//! with [`Event::Process`](crate::Event::Process). Each call to
//! [`CdcClass::process`] runs at most one step of a control request.
//!
//! ```text
//!            set_line_coding()
//!   Idle ─────────────────────────► SetLineCoding
//!    ▲ ▲                                  │ Ok
//!    │ │      match / mismatch            ▼
//!    │ └─────────────────────────── GetLastLineCoding
//!    │
//!    │ CLEAR_FEATURE Ok
//!    └──────────────────────────── Error ◄── transfer or control failure
//! ```
//!
//! `TransferData` stands in for `Idle` while the data pumps run.

use usb_device::{
    control::{Recipient, Request, RequestType},
    endpoint::{EndpointAddress, EndpointType},
    UsbDirection,
};

use crate::{
    line_coding::{LineCoding, LINE_CODING_SIZE},
    pipe::{ControlStatus, PipeId, Transport},
    registry::HostId,
    Error,
};

/// Communications interface class code
pub const CDC_CLASS: u8 = 0x02;
/// Abstract control model subclass code
pub const ACM_SUBCLASS: u8 = 0x02;
/// AT command protocol code
pub const AT_COMMAND_PROTOCOL: u8 = 0x01;
/// Data interface class code
pub const DATA_CLASS: u8 = 0x0A;

const SET_LINE_CODING: u8 = 0x20;
const GET_LINE_CODING: u8 = 0x21;

/// Control failures halt the default pipe
fn ctrl_ep0() -> EndpointAddress {
    EndpointAddress::from_parts(0, UsbDirection::Out)
}

fn is_acm(interface: &InterfaceInfo) -> bool {
    interface.class == CDC_CLASS && interface.sub_class == ACM_SUBCLASS
}

/// One endpoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: EndpointAddress,
    pub kind: EndpointType,
    pub max_packet_size: u16,
}

/// One interface descriptor, and its endpoints
#[derive(Debug, Clone, Copy)]
pub struct InterfaceInfo<'a> {
    pub number: u8,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub endpoints: &'a [EndpointInfo],
}

/// The parts of a device's descriptors needed to bind a CDC interface
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo<'a> {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interfaces: &'a [InterfaceInfo<'a>],
}

/// Forces an interface number for matching devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceQuirk {
    pub vendor_id: u16,
    pub vendor_mask: u16,
    pub product_id: u16,
    pub product_mask: u16,
    pub interface: u8,
}

impl InterfaceQuirk {
    const fn exact(vendor_id: u16, product_id: u16, interface: u8) -> Self {
        InterfaceQuirk {
            vendor_id,
            vendor_mask: 0xFFFF,
            product_id,
            product_mask: 0xFFFF,
            interface,
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        (vendor_id & self.vendor_mask) == (self.vendor_id & self.vendor_mask)
            && (product_id & self.product_mask) == (self.product_id & self.product_mask)
    }
}

/// Devices whose serial function isn't found by a class search
pub const QUIRKS: &[InterfaceQuirk] = &[
    // Quectel EC20 / EC25
    InterfaceQuirk::exact(0x2C7C, 0x0125, 2),
    // Quectel RM500Q
    InterfaceQuirk::exact(0x2C7C, 0x0800, 2),
    // WCH CH340
    InterfaceQuirk::exact(0x1A86, 0x7523, 0),
];

/// The interface and endpoints chosen for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Selection {
    pub interface: u8,
    pub notify: Option<EndpointInfo>,
    pub data_in: EndpointInfo,
    pub data_out: EndpointInfo,
}

/// Pick the serial interface of `device`
///
/// The quirk table wins. Otherwise, take the first ACM interface, preferring
/// one that speaks AT commands. If that interface has no bulk endpoints, the
/// next data class interface supplies them.
pub(crate) fn select_interface(device: &DeviceInfo) -> Result<Selection, Error> {
    let interfaces = device.interfaces;
    let position = match QUIRKS
        .iter()
        .find(|quirk| quirk.matches(device.vendor_id, device.product_id))
    {
        Some(quirk) => interfaces
            .iter()
            .position(|itf| itf.number == quirk.interface),
        None => interfaces
            .iter()
            .position(|itf| is_acm(itf) && itf.protocol == AT_COMMAND_PROTOCOL)
            .or_else(|| interfaces.iter().position(is_acm)),
    };
    let position = position.ok_or(Error::NoInterface)?;
    let interface = &interfaces[position];

    let mut notify = None;
    let mut data_in = None;
    let mut data_out = None;
    classify(interface, &mut notify, &mut data_in, &mut data_out);
    if data_in.is_none() || data_out.is_none() {
        if let Some(data) = interfaces[position + 1..]
            .iter()
            .find(|itf| itf.class == DATA_CLASS)
        {
            classify(data, &mut notify, &mut data_in, &mut data_out);
        }
    }

    match (data_in, data_out) {
        (Some(data_in), Some(data_out)) => Ok(Selection {
            interface: interface.number,
            notify,
            data_in,
            data_out,
        }),
        _ => {
            debug!("Interface {} has no bulk endpoints", interface.number);
            Err(Error::NoInterface)
        }
    }
}

fn classify(
    interface: &InterfaceInfo,
    notify: &mut Option<EndpointInfo>,
    data_in: &mut Option<EndpointInfo>,
    data_out: &mut Option<EndpointInfo>,
) {
    for ep in interface.endpoints {
        let slot = match (ep.kind, ep.address.direction()) {
            (EndpointType::Interrupt, UsbDirection::In) => &mut *notify,
            (EndpointType::Bulk, UsbDirection::In) => &mut *data_in,
            (EndpointType::Bulk, UsbDirection::Out) => &mut *data_out,
            _ => continue,
        };
        slot.get_or_insert(*ep);
    }
}

/// Class request state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ClassState {
    Idle,
    /// SET_LINE_CODING is in progress
    SetLineCoding,
    /// GET_LINE_CODING is reading back the applied line coding
    GetLastLineCoding,
    /// Pumps are moving data; no class request pending
    TransferData,
    /// A pipe halted, and needs CLEAR_FEATURE
    Error,
}

/// Something the adapter needs to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClassEvent {
    /// The device confirmed this line coding
    LineCodingChanged(LineCoding),
    /// The halted endpoint was cleared
    Recovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Channel {
    pub pipe: PipeId,
    pub address: EndpointAddress,
}

fn open(transport: &mut impl Transport, host: HostId, ep: &EndpointInfo) -> Result<Channel, Error> {
    let pipe = transport
        .open_pipe(host, ep.address, ep.kind, ep.max_packet_size)
        .ok_or(Error::Pipe)?;
    Ok(Channel {
        pipe,
        address: ep.address,
    })
}

pub(crate) struct CdcClass {
    host: HostId,
    interface: u8,
    notify: Option<Channel>,
    data_in: Channel,
    data_out: Channel,
    state: ClassState,
    data_active: bool,
    requested: LineCoding,
    /// Set when a line coding request arrives, or is cut short, during `Error`
    resume_line_coding: bool,
    observed: Option<LineCoding>,
    halted: Option<EndpointAddress>,
    control: [u8; LINE_CODING_SIZE],
}

impl CdcClass {
    /// Open the pipes of a selected interface
    ///
    /// If any pipe fails to open, the pipes opened so far are closed.
    pub fn open_pipes(
        transport: &mut impl Transport,
        host: HostId,
        selection: &Selection,
    ) -> Result<Self, Error> {
        let notify = selection
            .notify
            .as_ref()
            .map(|ep| open(transport, host, ep))
            .transpose()?;
        let data_in = match open(transport, host, &selection.data_in) {
            Ok(channel) => channel,
            Err(err) => {
                if let Some(notify) = notify {
                    transport.close_pipe(notify.pipe);
                }
                return Err(err);
            }
        };
        let data_out = match open(transport, host, &selection.data_out) {
            Ok(channel) => channel,
            Err(err) => {
                transport.close_pipe(data_in.pipe);
                if let Some(notify) = notify {
                    transport.close_pipe(notify.pipe);
                }
                return Err(err);
            }
        };
        debug!(
            "Bound interface {} (IN {:?}, OUT {:?})",
            selection.interface, data_in.pipe, data_out.pipe
        );
        Ok(CdcClass {
            host,
            interface: selection.interface,
            notify,
            data_in,
            data_out,
            state: ClassState::Idle,
            data_active: false,
            requested: LineCoding::new(),
            resume_line_coding: false,
            observed: None,
            halted: None,
            control: [0; LINE_CODING_SIZE],
        })
    }

    /// Close every pipe opened by `open_pipes`
    pub fn close_pipes(&self, transport: &mut impl Transport) {
        transport.close_pipe(self.data_in.pipe);
        transport.close_pipe(self.data_out.pipe);
        if let Some(notify) = self.notify {
            transport.close_pipe(notify.pipe);
        }
    }

    pub fn state(&self) -> ClassState {
        self.state
    }

    pub fn host(&self) -> HostId {
        self.host
    }

    pub fn interface(&self) -> u8 {
        self.interface
    }

    pub fn data_in(&self) -> PipeId {
        self.data_in.pipe
    }

    pub fn data_out(&self) -> PipeId {
        self.data_out.pipe
    }

    /// Returns the line coding last confirmed by the device
    pub fn observed(&self) -> Option<LineCoding> {
        self.observed
    }

    /// Returns `true` if the pumps may run
    pub fn accepts_data(&self) -> bool {
        self.state != ClassState::Error
    }

    /// Schedule SET_LINE_CODING, followed by a GET_LINE_CODING read-back
    pub fn set_line_coding(&mut self, coding: LineCoding) {
        self.requested = coding;
        if self.state == ClassState::Error {
            self.resume_line_coding = true;
        } else {
            self.state = ClassState::SetLineCoding;
        }
    }

    pub fn data_started(&mut self) {
        self.data_active = true;
        if self.state == ClassState::Idle {
            self.state = ClassState::TransferData;
        }
    }

    pub fn data_stopped(&mut self) {
        self.data_active = false;
        if self.state == ClassState::TransferData {
            self.state = ClassState::Idle;
        }
    }

    /// Note a failed transfer on a data pipe
    pub fn transfer_failed(&mut self, direction: UsbDirection) {
        let address = match direction {
            UsbDirection::In => self.data_in.address,
            UsbDirection::Out => self.data_out.address,
        };
        self.fail(address);
    }

    /// Run one step of the pending class request
    pub fn process(&mut self, transport: &mut impl Transport) -> Option<ClassEvent> {
        match self.state {
            ClassState::Idle | ClassState::TransferData => None,
            ClassState::SetLineCoding => {
                self.control = self.requested.to_bytes();
                let setup = self.class_request(UsbDirection::Out, SET_LINE_CODING);
                match transport.control(self.host, &setup, &mut self.control) {
                    ControlStatus::Ok => {
                        self.control = [0; LINE_CODING_SIZE];
                        self.state = ClassState::GetLastLineCoding;
                    }
                    ControlStatus::Busy => {}
                    _status => {
                        warn!("SET_LINE_CODING failed: {:?}", _status);
                        self.fail(ctrl_ep0());
                    }
                }
                None
            }
            ClassState::GetLastLineCoding => {
                let setup = self.class_request(UsbDirection::In, GET_LINE_CODING);
                match transport.control(self.host, &setup, &mut self.control) {
                    ControlStatus::Ok => {
                        self.state = self.resting();
                        if self.control == self.requested.to_bytes() {
                            self.observed = Some(self.requested);
                            Some(ClassEvent::LineCodingChanged(self.requested))
                        } else {
                            debug!("Line coding read-back differs: {:?}", self.control);
                            self.observed = LineCoding::from_bytes(&self.control);
                            None
                        }
                    }
                    ControlStatus::Busy => None,
                    _status => {
                        warn!("GET_LINE_CODING failed: {:?}", _status);
                        self.fail(ctrl_ep0());
                        None
                    }
                }
            }
            ClassState::Error => {
                let halted = self.halted.unwrap_or_else(ctrl_ep0);
                let setup = Request {
                    direction: UsbDirection::Out,
                    request_type: RequestType::Standard,
                    recipient: Recipient::Endpoint,
                    request: Request::CLEAR_FEATURE,
                    value: Request::FEATURE_ENDPOINT_HALT,
                    index: u8::from(halted) as u16,
                    length: 0,
                };
                match transport.control(self.host, &setup, &mut []) {
                    ControlStatus::Ok => {
                        debug!("Cleared halt on endpoint {:#x}", u8::from(halted));
                        self.halted = None;
                        self.state = if core::mem::take(&mut self.resume_line_coding) {
                            ClassState::SetLineCoding
                        } else {
                            self.resting()
                        };
                        Some(ClassEvent::Recovered)
                    }
                    ControlStatus::Busy => None,
                    _status => {
                        warn!("CLEAR_FEATURE failed: {:?}", _status);
                        None
                    }
                }
            }
        }
    }

    fn fail(&mut self, address: EndpointAddress) {
        if matches!(
            self.state,
            ClassState::SetLineCoding | ClassState::GetLastLineCoding
        ) {
            self.resume_line_coding = true;
        }
        if self.state != ClassState::Error {
            self.halted = Some(address);
            self.state = ClassState::Error;
        }
    }

    fn resting(&self) -> ClassState {
        if self.data_active {
            ClassState::TransferData
        } else {
            ClassState::Idle
        }
    }

    fn class_request(&self, direction: UsbDirection, request: u8) -> Request {
        Request {
            direction,
            request_type: RequestType::Class,
            recipient: Recipient::Interface,
            request,
            value: 0,
            index: self.interface as u16,
            length: LINE_CODING_SIZE as u16,
        }
    }
}
