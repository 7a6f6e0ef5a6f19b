//! Character device adapter
//!
//! [`DeviceAdapter`] owns every attached CDC device. It presents each one as a
//! byte-stream character device, and it's the only way into the pumps and the
//! class driver. The host stack, the timer service, and application tasks all
//! call into the same adapter:
//!
//! - the host stack calls [`attach`](DeviceAdapter::attach) and
//!   [`detach`](DeviceAdapter::detach) on hotplug, and dispatches
//!   [`Event::Completed`] and [`Event::Process`],
//! - the timer service dispatches [`Event::IdleTick`],
//! - tasks call `open`, `read`, `write`, `ioctl`, and `close`.
//!
//! Every call runs inside a critical section, so it's safe to call from
//! interrupts. None of them block. Tasks that want to wait for data should
//! wait on an OS primitive that's signalled from [`CharDevices`].
//!
//! The adapter calls into its transport, its character devices, and its timer
//! while holding the critical section. Those implementations must not call
//! back into the adapter.

use core::cell::RefCell;

use critical_section::Mutex;
use usb_device::UsbDirection;

use crate::{
    class::{self, CdcClass, ClassEvent, ClassState, DeviceInfo},
    frame::FrameBoundary,
    line_coding::LineCoding,
    pipe::Transport,
    registry::{DeviceId, HostId, Registry},
    ring::RingBuffer,
    rx::{Delivery, RxPump, RxResult},
    timer::{self, TickTimer},
    transfer::{Completion, Tag},
    tx::{Kick, TxPump, TxResult},
    Error,
};

/// Per-device configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// Line coding requested at attach, or by `Configure`
    pub line_coding: LineCoding,
    /// RX ring buffer and receive transfer size, in bytes
    pub rx_bufsz: usize,
    /// TX ring buffer and transmit chunk size, in bytes
    pub tx_bufsz: usize,
    /// On detach, keep the device until an in-flight transmit completes
    ///
    /// When `false`, detach cancels the transmit instead. If the transport
    /// can't cancel it, detach returns [`Error::Busy`].
    pub delayed_close: bool,
    pub frame_boundary: FrameBoundary,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            line_coding: LineCoding::new(),
            rx_bufsz: 64,
            tx_bufsz: 64,
            delayed_close: true,
            frame_boundary: FrameBoundary::IdleTimer,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

bitflags::bitflags! {
    /// Device status
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceFlags: u8 {
        /// A transmit transfer is in flight
        const TX_BUSY = 1 << 0;
        /// The device detached, and waits for its transfers to return
        const CLOSING = 1 << 1;
        /// The idle timer is running
        const RX_TIMER = 1 << 2;
        /// The idle timer was stopped by [`Ioctl::Suspend`]
        const SUSPENDED = 1 << 3;
    }
}

/// Device counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Stats {
    /// Bytes stored in the RX ring buffer since attach
    pub rx_count: usize,
    /// Bytes accepted by `write()` since the TX ring buffer last drained
    pub tx_count: usize,
    /// Received bytes dropped because the RX ring buffer was full
    pub dropped: usize,
}

/// Device control requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Ioctl {
    /// Replace the device configuration
    ///
    /// Buffer sizes can only change while the device is closed, and no
    /// transmit is in flight. A new line coding is sent to the device.
    Configure(Config),
    /// Send a new line coding to the device
    SetLineCoding(LineCoding),
    /// Discard received bytes
    FlushRx,
    /// Discard bytes that aren't yet handed to the transport
    FlushTx,
    /// Stop the idle timer
    Suspend,
    /// Restart the idle timer
    Resume,
    /// Returns the number of bytes ready to read
    Available,
}

/// Inputs from the host stack and the timer service
pub enum Event {
    /// The transport finished a transfer
    Completed(Completion),
    /// The idle timer for a device fired
    IdleTick(DeviceId),
    /// Run the device's class driver
    ///
    /// The host stack should dispatch this from its processing loop.
    Process(DeviceId),
}

/// The character device registry
///
/// Notifications run inside the adapter's critical section. Signal an OS
/// primitive, and return.
pub trait CharDevices {
    /// Publish a new character device
    fn register(&mut self, name: &'static str, device: DeviceId) -> Result<(), Error>;

    /// Withdraw a character device
    fn unregister(&mut self, device: DeviceId);

    /// Bytes are ready to read; also signalled when the device detaches
    fn notify_rx_ready(&mut self, device: DeviceId);

    /// The transmit ring buffer drained; also signalled when the device detaches
    fn notify_tx_done(&mut self, device: DeviceId);

    /// The device confirmed a new line coding
    fn line_coding_changed(&mut self, device: DeviceId, coding: &LineCoding) {
        let _ = (device, coding);
    }
}

struct DeviceHandle {
    rx: RingBuffer,
    tx: RingBuffer,
    ref_count: usize,
    flags: DeviceFlags,
    stats: Stats,
}

struct Device {
    name: &'static str,
    config: Config,
    class: CdcClass,
    handle: DeviceHandle,
    rx: RxPump,
    tx: TxPump,
}

impl Device {
    fn new(name: &'static str, config: Config, class: CdcClass) -> Self {
        Device {
            name,
            config,
            class,
            handle: DeviceHandle {
                rx: RingBuffer::new(config.rx_bufsz),
                tx: RingBuffer::new(config.tx_bufsz),
                ref_count: 0,
                flags: DeviceFlags::empty(),
                stats: Stats::default(),
            },
            rx: RxPump::new(config.rx_bufsz, config.frame_boundary),
            tx: TxPump::new(config.tx_bufsz),
        }
    }

    fn is_closing(&self) -> bool {
        self.handle.flags.contains(DeviceFlags::CLOSING)
    }

    /// Post a receive, unless the class is recovering or the device is going away
    fn arm_rx(&mut self, id: DeviceId, transport: &mut impl Transport) -> bool {
        if self.is_closing() || !self.class.accepts_data() {
            return false;
        }
        let tag = Tag {
            device: id,
            direction: UsbDirection::In,
        };
        self.rx.arm(tag, self.class.data_in(), transport)
    }

    /// Start sending buffered bytes, if the transmit pump is idle
    fn kick_tx(&mut self, id: DeviceId, transport: &mut impl Transport) {
        if !self.is_closing() && self.class.accepts_data() {
            let tag = Tag {
                device: id,
                direction: UsbDirection::Out,
            };
            if let Kick::Rejected = self.tx.kick(tag, self.class.data_out(), transport, &self.handle.tx) {
                debug!("{}: TX deferred", self.name);
            }
        }
        self.handle
            .flags
            .set(DeviceFlags::TX_BUSY, !self.tx.is_idle());
    }

    /// Account for bytes moved into the RX ring buffer, and post the next receive
    fn delivered(
        &mut self,
        id: DeviceId,
        delivery: Delivery,
        transport: &mut impl Transport,
        devices: &mut impl CharDevices,
    ) {
        let stats = &mut self.handle.stats;
        stats.rx_count += delivery.stored;
        stats.dropped += delivery.dropped;
        if delivery.stored > 0 {
            devices.notify_rx_ready(id);
        }
        if delivery.dropped > 0 {
            warn!("{}: RX overrun, dropped {} bytes", self.name, delivery.dropped);
        } else if !self.handle.rx.is_full() {
            self.arm_rx(id, transport);
        }
    }

    fn start_timer(&mut self, id: DeviceId, timer: &mut impl TickTimer) {
        let flags = &mut self.handle.flags;
        if self.rx.needs_tick()
            && !flags.intersects(DeviceFlags::SUSPENDED | DeviceFlags::CLOSING)
        {
            let coding = self.class.observed().unwrap_or(self.config.line_coding);
            timer.start(id, timer::tick_period_us(&coding));
            flags.insert(DeviceFlags::RX_TIMER);
        }
    }

    fn stop_timer(&mut self, id: DeviceId, timer: &mut impl TickTimer) {
        if self.handle.flags.contains(DeviceFlags::RX_TIMER) {
            timer.stop(id);
            self.handle.flags.remove(DeviceFlags::RX_TIMER);
        }
    }

    /// Returns `true` once no transfer holds one of this device's buffers
    fn is_quiet(&self) -> bool {
        self.rx.is_idle() && self.tx.is_idle()
    }

    fn configure(
        &mut self,
        id: DeviceId,
        config: Config,
        transport: &mut impl Transport,
        timer: &mut impl TickTimer,
    ) -> Result<(), Error> {
        let resize = config.rx_bufsz != self.config.rx_bufsz || config.tx_bufsz != self.config.tx_bufsz;
        if resize {
            if self.handle.ref_count > 0 || !self.tx.is_idle() {
                return Err(Error::Busy);
            }
            if !self.rx.stop(self.class.data_in(), transport) {
                return Err(Error::Busy);
            }
            self.rx.resize(config.rx_bufsz);
            self.tx.resize(config.tx_bufsz);
            self.handle.rx = RingBuffer::new(config.rx_bufsz);
            self.handle.tx = RingBuffer::new(config.tx_bufsz);
            debug!(
                "{}: buffers resized to {}/{}",
                self.name, config.rx_bufsz, config.tx_bufsz
            );
        }
        if config.frame_boundary != self.config.frame_boundary {
            if !self.rx.stop(self.class.data_in(), transport) {
                return Err(Error::Busy);
            }
            self.rx.set_boundary(config.frame_boundary);
        }
        let line_coding_changed = config.line_coding != self.config.line_coding;
        self.config = config;

        self.stop_timer(id, timer);
        self.start_timer(id, timer);
        if line_coding_changed {
            self.class.set_line_coding(config.line_coding);
        }
        self.arm_rx(id, transport);
        Ok(())
    }
}

struct Inner<T, C, S, const N: usize> {
    transport: T,
    devices: C,
    timer: S,
    registry: Registry<Device, N>,
}

impl<T: Transport, C, S, const N: usize> Inner<T, C, S, N> {
    /// Release a device that no longer has transfers in flight
    fn finalize(&mut self, id: DeviceId) {
        if let Some(device) = self.registry.remove(id) {
            device.class.close_pipes(&mut self.transport);
            debug!("{}: released", device.name);
        }
    }
}

/// Look up a device that's still attached
fn live<const N: usize>(registry: &mut Registry<Device, N>, id: DeviceId) -> Result<&mut Device, Error> {
    registry
        .get_mut(id)
        .filter(|device| !device.is_closing())
        .ok_or(Error::NotAttached)
}

/// Look up an attached device that's open
fn opened<const N: usize>(registry: &mut Registry<Device, N>, id: DeviceId) -> Result<&mut Device, Error> {
    let device = live(registry, id)?;
    if device.handle.ref_count == 0 {
        return Err(Error::NotOpen);
    }
    Ok(device)
}

/// Bridges attached CDC devices to character devices
///
/// `N` is the number of devices that can be attached at once. Each host
/// port supports one device.
///
/// # Example
///
/// ```
/// use usbh_cdc::{DeviceAdapter, CharDevices, DeviceId, Error};
/// # use usbh_cdc::{ControlStatus, HostId, PipeId, Rejected, Transport, TransferRequest, TransferState, TickTimer};
/// # use usb_device::{control::Request, endpoint::{EndpointAddress, EndpointType}};
/// # struct HostStack;
/// # impl Transport for HostStack {
/// #     fn open_pipe(&mut self, _: HostId, _: EndpointAddress, _: EndpointType, _: u16) -> Option<PipeId> { None }
/// #     fn close_pipe(&mut self, _: PipeId) {}
/// #     fn submit(&mut self, _: PipeId, r: TransferRequest) -> Result<(), Rejected> { Err(Rejected(r)) }
/// #     fn progress(&self, _: PipeId) -> usize { 0 }
/// #     fn state(&self, _: PipeId) -> TransferState { TransferState::Idle }
/// #     fn abort(&mut self, _: PipeId) -> Option<TransferRequest> { None }
/// #     fn control(&mut self, _: HostId, _: &Request, _: &mut [u8]) -> ControlStatus { ControlStatus::Ok }
/// # }
/// # struct Timers;
/// # impl TickTimer for Timers {
/// #     fn start(&mut self, _: DeviceId, _: u32) {}
/// #     fn stop(&mut self, _: DeviceId) {}
/// # }
///
/// struct Devfs;
///
/// impl CharDevices for Devfs {
///     fn register(&mut self, name: &'static str, device: DeviceId) -> Result<(), Error> {
///         // devfs_add(name, device)...
///         Ok(())
///     }
///     fn unregister(&mut self, device: DeviceId) {}
///     fn notify_rx_ready(&mut self, device: DeviceId) {}
///     fn notify_tx_done(&mut self, device: DeviceId) {}
/// }
///
/// let adapter: DeviceAdapter<_, _, _> = DeviceAdapter::new(HostStack, Devfs, Timers);
/// ```
pub struct DeviceAdapter<T, C, S, const N: usize = 2> {
    inner: Mutex<RefCell<Inner<T, C, S, N>>>,
}

impl<T, C, S, const N: usize> DeviceAdapter<T, C, S, N>
where
    T: Transport,
    C: CharDevices,
    S: TickTimer,
{
    pub fn new(transport: T, devices: C, timer: S) -> Self {
        DeviceAdapter {
            inner: Mutex::new(RefCell::new(Inner {
                transport,
                devices,
                timer,
                registry: Registry::new(),
            })),
        }
    }

    /// Interrupt-safe, mutable access to the adapter state
    fn with_inner<R>(&self, func: impl FnOnce(&mut Inner<T, C, S, N>) -> R) -> R {
        critical_section::with(|cs| {
            let inner = self.inner.borrow(cs);
            let mut inner = inner.borrow_mut();
            func(&mut *inner)
        })
    }

    /// Access the transport
    pub fn with_transport<R>(&self, func: impl FnOnce(&mut T) -> R) -> R {
        self.with_inner(|inner| func(&mut inner.transport))
    }

    /// Access the character device registry
    pub fn with_char_devices<R>(&self, func: impl FnOnce(&mut C) -> R) -> R {
        self.with_inner(|inner| func(&mut inner.devices))
    }

    /// Access the timer service
    pub fn with_timer<R>(&self, func: impl FnOnce(&mut S) -> R) -> R {
        self.with_inner(|inner| func(&mut inner.timer))
    }

    /// Bind a newly enumerated device
    ///
    /// Selects the CDC interface, opens its pipes, and registers a character
    /// device called `name`. Then, the adapter requests the configured line
    /// coding, starts the idle timer, and posts the first receive.
    pub fn attach(
        &self,
        host: HostId,
        info: &DeviceInfo,
        name: &'static str,
        config: Config,
    ) -> Result<DeviceId, Error> {
        let selection = class::select_interface(info)?;
        self.with_inner(|inner| {
            if inner.registry.find(host).is_some() {
                return Err(Error::Busy);
            }
            let class = CdcClass::open_pipes(&mut inner.transport, host, &selection)?;
            let id = match inner.registry.insert(host, Device::new(name, config, class)) {
                Ok(id) => id,
                Err(device) => {
                    device.class.close_pipes(&mut inner.transport);
                    return Err(Error::NoSlot);
                }
            };
            if let Err(err) = inner.devices.register(name, id) {
                inner.finalize(id);
                return Err(err);
            }

            let device = inner.registry.get_mut(id).ok_or(Error::NotAttached)?;
            device.class.set_line_coding(config.line_coding);
            device.start_timer(id, &mut inner.timer);
            device.arm_rx(id, &mut inner.transport);
            device.class.data_started();
            debug!("{}: attached on host {}", name, host.0);
            Ok(id)
        })
    }

    /// Unbind the device attached to `host`
    ///
    /// The character device goes away immediately, and blocked readers and
    /// writers are woken. Buffers still held by the transport are released
    /// when their transfers return.
    pub fn detach(&self, host: HostId) -> Result<(), Error> {
        self.with_inner(|inner| {
            let id = inner.registry.find(host).ok_or(Error::NotAttached)?;
            let device = inner.registry.get_mut(id).ok_or(Error::NotAttached)?;
            if device.is_closing() {
                return Ok(());
            }
            if !device.tx.is_idle()
                && !device.config.delayed_close
                && !device.tx.abort(device.class.data_out(), &mut inner.transport)
            {
                return Err(Error::Busy);
            }

            device.stop_timer(id, &mut inner.timer);
            device.rx.stop(device.class.data_in(), &mut inner.transport);
            device.class.data_stopped();
            device.handle.flags.insert(DeviceFlags::CLOSING);
            inner.devices.notify_rx_ready(id);
            inner.devices.notify_tx_done(id);
            inner.devices.unregister(id);

            if device.is_quiet() {
                inner.finalize(id);
            } else {
                debug!("{}: close delayed", device.name);
            }
            Ok(())
        })
    }

    /// Take a reference to the character device
    pub fn open(&self, id: DeviceId) -> Result<(), Error> {
        self.with_inner(|inner| {
            let device = live(&mut inner.registry, id)?;
            device.handle.ref_count += 1;
            Ok(())
        })
    }

    /// Drop a reference to the character device
    ///
    /// The last close discards unread bytes. Buffered transmit bytes are
    /// still sent.
    pub fn close(&self, id: DeviceId) -> Result<(), Error> {
        self.with_inner(|inner| {
            let transport = &mut inner.transport;
            let device = live(&mut inner.registry, id)?;
            let handle = &mut device.handle;
            handle.ref_count = handle.ref_count.checked_sub(1).ok_or(Error::NotOpen)?;
            if handle.ref_count == 0 {
                handle.rx.reset();
                if device.rx.is_idle() {
                    device.arm_rx(id, transport);
                }
            }
            Ok(())
        })
    }

    /// Move received bytes into `buffer`
    ///
    /// Returns the number of bytes read, which is zero when nothing arrived.
    pub fn read(&self, id: DeviceId, buffer: &mut [u8]) -> Result<usize, Error> {
        self.with_inner(|inner| {
            let transport = &mut inner.transport;
            let device = opened(&mut inner.registry, id)?;
            let count = device.handle.rx.get(buffer);
            if count > 0 && device.rx.is_idle() {
                device.arm_rx(id, transport);
            }
            Ok(count)
        })
    }

    /// Queue `data` for transmission
    ///
    /// Returns the number of bytes accepted. It's less than `data.len()` when
    /// the TX ring buffer fills, and zero when it's full.
    pub fn write(&self, id: DeviceId, data: &[u8]) -> Result<usize, Error> {
        self.with_inner(|inner| {
            let transport = &mut inner.transport;
            let device = opened(&mut inner.registry, id)?;
            let count = device.handle.tx.put(data);
            device.handle.stats.tx_count += count;
            device.kick_tx(id, transport);
            Ok(count)
        })
    }

    /// Control the device
    ///
    /// [`Ioctl::Available`] returns the number of bytes ready to read. Every
    /// other request returns zero.
    pub fn ioctl(&self, id: DeviceId, request: Ioctl) -> Result<usize, Error> {
        self.with_inner(|inner| {
            let transport = &mut inner.transport;
            let timer = &mut inner.timer;
            let device = live(&mut inner.registry, id)?;
            match request {
                Ioctl::Configure(config) => device.configure(id, config, transport, timer)?,
                Ioctl::SetLineCoding(coding) => {
                    device.config.line_coding = coding;
                    device.class.set_line_coding(coding);
                }
                Ioctl::FlushRx => {
                    device.handle.rx.reset();
                    if device.rx.is_idle() {
                        device.arm_rx(id, transport);
                    }
                }
                Ioctl::FlushTx => {
                    let in_flight = device.tx.in_flight();
                    device.handle.tx.truncate(in_flight);
                }
                Ioctl::Suspend => {
                    device.stop_timer(id, timer);
                    device.handle.flags.insert(DeviceFlags::SUSPENDED);
                }
                Ioctl::Resume => {
                    device.handle.flags.remove(DeviceFlags::SUSPENDED);
                    if !device.handle.flags.contains(DeviceFlags::RX_TIMER) {
                        device.start_timer(id, timer);
                    }
                }
                Ioctl::Available => return Ok(device.handle.rx.data_len()),
            }
            Ok(0)
        })
    }

    /// Handle a completion, an idle tick, or a class processing request
    pub fn dispatch(&self, event: Event) {
        self.with_inner(|inner| match event {
            Event::Completed(completion) => Self::completed(inner, completion),
            Event::IdleTick(id) => {
                let Ok(device) = live(&mut inner.registry, id) else {
                    return;
                };
                if device.handle.flags.contains(DeviceFlags::SUSPENDED) {
                    return;
                }
                let pipe = device.class.data_in();
                if let Some(delivery) = device.rx.on_tick(pipe, &mut inner.transport, &mut device.handle.rx) {
                    device.delivered(id, delivery, &mut inner.transport, &mut inner.devices);
                }
            }
            Event::Process(id) => {
                let Ok(device) = live(&mut inner.registry, id) else {
                    return;
                };
                match device.class.process(&mut inner.transport) {
                    Some(ClassEvent::LineCodingChanged(coding)) => {
                        debug!("{}: line coding {} baud", device.name, coding.baud_rate);
                        if device.handle.flags.contains(DeviceFlags::RX_TIMER) {
                            inner.timer.start(id, timer::tick_period_us(&coding));
                        }
                        inner.devices.line_coding_changed(id, &coding);
                    }
                    Some(ClassEvent::Recovered) => {
                        if device.rx.is_idle() && !device.handle.rx.is_full() {
                            device.arm_rx(id, &mut inner.transport);
                        }
                        device.kick_tx(id, &mut inner.transport);
                    }
                    None => {}
                }
            }
        })
    }

    fn completed(inner: &mut Inner<T, C, S, N>, completion: Completion) {
        let Completion { request, outcome } = completion;
        let id = request.tag().device;
        let Some(device) = inner.registry.get_mut(id) else {
            debug!("Completion for a released device");
            return;
        };

        match request.direction() {
            UsbDirection::In => {
                if device.rx.is_idle() {
                    warn!("{}: unexpected RX completion", device.name);
                    return;
                }
                match device.rx.on_complete(request, outcome, &mut device.handle.rx) {
                    _ if device.is_closing() => {}
                    RxResult::Delivered(delivery) => {
                        device.delivered(id, delivery, &mut inner.transport, &mut inner.devices)
                    }
                    RxResult::Failed(_err) => {
                        warn!("{}: RX failed: {:?}", device.name, _err);
                        device.class.transfer_failed(UsbDirection::In);
                    }
                }
            }
            UsbDirection::Out => {
                if device.tx.is_idle() {
                    warn!("{}: unexpected TX completion", device.name);
                    return;
                }
                match device.tx.on_complete(request, outcome, &mut device.handle.tx) {
                    TxResult::Sent(_count) => {
                        trace!("{}: sent {} bytes", device.name, _count);
                    }
                    TxResult::Failed(_err) => {
                        warn!("{}: TX failed: {:?}", device.name, _err);
                        device.class.transfer_failed(UsbDirection::Out);
                    }
                }
                if !device.is_closing() {
                    device.kick_tx(id, &mut inner.transport);
                    if device.tx.is_idle() && device.handle.tx.is_empty() {
                        device.handle.flags.remove(DeviceFlags::TX_BUSY);
                        device.handle.stats.tx_count = 0;
                        inner.devices.notify_tx_done(id);
                    }
                }
            }
        }

        if device.is_closing() && device.is_quiet() {
            inner.finalize(id);
        }
    }

    /// Returns the device counters
    pub fn stats(&self, id: DeviceId) -> Result<Stats, Error> {
        self.with_inner(|inner| live(&mut inner.registry, id).map(|device| device.handle.stats))
    }

    /// Returns the active configuration
    pub fn config(&self, id: DeviceId) -> Result<Config, Error> {
        self.with_inner(|inner| live(&mut inner.registry, id).map(|device| device.config))
    }

    /// Returns the device status flags
    ///
    /// Unlike the other accessors, this resolves devices that are waiting
    /// on a delayed close.
    pub fn flags(&self, id: DeviceId) -> Result<DeviceFlags, Error> {
        self.with_inner(|inner| {
            inner
                .registry
                .get_mut(id)
                .map(|device| device.handle.flags)
                .ok_or(Error::NotAttached)
        })
    }

    /// Returns the state of the device's class driver
    pub fn class_state(&self, id: DeviceId) -> Result<ClassState, Error> {
        self.with_inner(|inner| live(&mut inner.registry, id).map(|device| device.class.state()))
    }

    /// Returns the line coding last confirmed by the device
    pub fn line_coding(&self, id: DeviceId) -> Result<Option<LineCoding>, Error> {
        self.with_inner(|inner| live(&mut inner.registry, id).map(|device| device.class.observed()))
    }

    /// Find the device attached to `host`
    pub fn find(&self, host: HostId) -> Option<DeviceId> {
        self.with_inner(|inner| inner.registry.find(host))
    }

    /// Returns the interface number bound on `id`
    pub fn interface(&self, id: DeviceId) -> Result<u8, Error> {
        self.with_inner(|inner| live(&mut inner.registry, id).map(|device| device.class.interface()))
    }

    /// Returns the host port of `id`
    pub fn host(&self, id: DeviceId) -> Result<HostId, Error> {
        self.with_inner(|inner| live(&mut inner.registry, id).map(|device| device.class.host()))
    }
}
