use {
    crate::{udev::Udev, utils::signal::Signal},
    std::{
        ffi::{CStr, CString},
        rc::Rc,
    },
    uapi::{c, OwnedFd},
};

/// The session collaborator.
///
/// Implementations typically wrap libseat or logind. The backend only needs
/// the seat identity, the active flag, device opening, and event delivery.
pub trait Session {
    /// Whether the session currently holds the devices.
    fn active(&self) -> bool;

    /// The name of the seat this session runs on. Empty disables seat
    /// filtering during device enumeration.
    fn seat_name(&self) -> String;

    /// The hardware-database handle used for device enumeration.
    fn udev(&self) -> &Rc<Udev>;

    /// Opens a device node. Returns nothing if the session cannot grant
    /// access to the device.
    fn open_device(&self, devnode: &CStr) -> Option<Rc<SessionDevice>>;

    /// Drains any pending session events, firing the signals below.
    fn dispatch_pending_events(&self);

    fn events(&self) -> &SessionEvents;
}

#[derive(Default)]
pub struct SessionEvents {
    /// Fired whenever the active flag changes.
    pub change_active: Signal<()>,
}

/// A device handle granted by the session.
pub struct SessionDevice {
    pub fd: Rc<OwnedFd>,
    pub devnode: CString,
    pub devnum: c::dev_t,
    pub events: SessionDeviceEvents,
}

#[derive(Default)]
pub struct SessionDeviceEvents {
    pub change: Signal<DeviceChange>,
    pub remove: Signal<()>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceChange {
    Hotplug,
}
