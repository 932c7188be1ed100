#![allow(non_camel_case_types)]

use {
    crate::utils::oserror::OsError,
    std::{ffi::CStr, marker::PhantomData, ptr, rc::Rc},
    thiserror::Error,
    uapi::{c, Errno, IntoUstr},
};

#[repr(transparent)]
struct udev(u8);
#[repr(transparent)]
struct udev_enumerate(u8);
#[repr(transparent)]
struct udev_list_entry(u8);
#[repr(transparent)]
struct udev_device(u8);

#[link(name = "udev")]
extern "C" {
    fn udev_new() -> *mut udev;
    fn udev_unref(udev: *mut udev) -> *mut udev;

    fn udev_enumerate_new(udev: *mut udev) -> *mut udev_enumerate;
    fn udev_enumerate_unref(udev_enumerate: *mut udev_enumerate) -> *mut udev_enumerate;
    fn udev_enumerate_add_match_subsystem(
        udev_enumerate: *mut udev_enumerate,
        subsystem: *const c::c_char,
    ) -> c::c_int;
    fn udev_enumerate_add_match_sysname(
        udev_enumerate: *mut udev_enumerate,
        sysname: *const c::c_char,
    ) -> c::c_int;
    fn udev_enumerate_scan_devices(udev_enumerate: *mut udev_enumerate) -> c::c_int;
    fn udev_enumerate_get_list_entry(udev_enumerate: *mut udev_enumerate) -> *mut udev_list_entry;

    fn udev_list_entry_get_next(list_entry: *mut udev_list_entry) -> *mut udev_list_entry;
    fn udev_list_entry_get_name(list_entry: *mut udev_list_entry) -> *const c::c_char;

    fn udev_device_new_from_syspath(
        udev: *mut udev,
        syspath: *const c::c_char,
    ) -> *mut udev_device;
    fn udev_device_ref(udev_device: *mut udev_device) -> *mut udev_device;
    fn udev_device_unref(udev_device: *mut udev_device) -> *mut udev_device;
    fn udev_device_get_sysname(udev_device: *mut udev_device) -> *const c::c_char;
    fn udev_device_get_devnode(udev_device: *mut udev_device) -> *const c::c_char;
    fn udev_device_get_syspath(udev_device: *mut udev_device) -> *const c::c_char;
    fn udev_device_get_devnum(udev_device: *mut udev_device) -> c::dev_t;
    fn udev_device_get_action(udev_device: *mut udev_device) -> *const c::c_char;
    fn udev_device_get_subsystem(udev_device: *mut udev_device) -> *const c::c_char;
    fn udev_device_get_is_initialized(udev_device: *mut udev_device) -> c::c_int;
    fn udev_device_get_parent_with_subsystem_devtype(
        udev_device: *mut udev_device,
        subsystem: *const c::c_char,
        devtype: *const c::c_char,
    ) -> *mut udev_device;
    fn udev_device_get_property_value(
        udev_device: *mut udev_device,
        key: *const c::c_char,
    ) -> *const c::c_char;
    fn udev_device_get_sysattr_value(
        udev_device: *mut udev_device,
        sysattr: *const c::c_char,
    ) -> *const c::c_char;
}

#[derive(Debug, Error)]
pub enum UdevError {
    #[error("Could not create a new udev instance")]
    New(#[source] OsError),
    #[error("Could not create a new udev_enumerate instance")]
    NewEnumerate(#[source] OsError),
    #[error("Could not add a match rule to a udev_enumerate")]
    EnumerateAddMatch(#[source] OsError),
    #[error("Could not list devices of a udev_enumerate")]
    EnumerateGetListEntry(#[source] OsError),
    #[error("Could not scan devices of a udev_enumerate")]
    ScanDevices(#[source] OsError),
    #[error("Could not create a udev_device from a syspath")]
    DeviceFromSyspath(#[source] OsError),
    #[error("The device has no parent")]
    DeviceParent(#[source] OsError),
}

pub struct Udev {
    udev: *mut udev,
}

pub struct UdevEnumerate {
    _udev: Rc<Udev>,
    enumerate: *mut udev_enumerate,
}

pub struct UdevListEntry<'a> {
    list_entry: *mut udev_list_entry,
    _phantom: PhantomData<&'a mut ()>,
}

pub struct UdevDevice {
    udev: Rc<Udev>,
    device: *mut udev_device,
}

impl Udev {
    pub fn new() -> Result<Self, UdevError> {
        let res = unsafe { udev_new() };
        if res.is_null() {
            return Err(UdevError::New(Errno::default().into()));
        }
        Ok(Self { udev: res })
    }

    pub fn create_enumerate(self: &Rc<Self>) -> Result<UdevEnumerate, UdevError> {
        let res = unsafe { udev_enumerate_new(self.udev) };
        if res.is_null() {
            return Err(UdevError::NewEnumerate(Errno::default().into()));
        }
        Ok(UdevEnumerate {
            _udev: self.clone(),
            enumerate: res,
        })
    }

    pub fn create_device_from_syspath<'a>(
        self: &Rc<Self>,
        syspath: impl IntoUstr<'a>,
    ) -> Result<UdevDevice, UdevError> {
        let syspath = syspath.into_ustr();
        let res = unsafe { udev_device_new_from_syspath(self.udev, syspath.as_ptr()) };
        if res.is_null() {
            return Err(UdevError::DeviceFromSyspath(Errno::default().into()));
        }
        Ok(UdevDevice {
            udev: self.clone(),
            device: res,
        })
    }
}

impl Drop for Udev {
    fn drop(&mut self) {
        unsafe {
            udev_unref(self.udev);
        }
    }
}

impl UdevEnumerate {
    pub fn add_match_subsystem(&self, subsystem: &CStr) -> Result<(), UdevError> {
        let res = unsafe { udev_enumerate_add_match_subsystem(self.enumerate, subsystem.as_ptr()) };
        if res < 0 {
            Err(UdevError::EnumerateAddMatch(Errno(-res).into()))
        } else {
            Ok(())
        }
    }

    pub fn add_match_sysname(&self, sysname: &CStr) -> Result<(), UdevError> {
        let res = unsafe { udev_enumerate_add_match_sysname(self.enumerate, sysname.as_ptr()) };
        if res < 0 {
            Err(UdevError::EnumerateAddMatch(Errno(-res).into()))
        } else {
            Ok(())
        }
    }

    pub fn scan_devices(&self) -> Result<(), UdevError> {
        let res = unsafe { udev_enumerate_scan_devices(self.enumerate) };
        if res < 0 {
            Err(UdevError::ScanDevices(Errno(-res).into()))
        } else {
            Ok(())
        }
    }

    pub fn get_list_entry(&mut self) -> Result<Option<UdevListEntry>, UdevError> {
        let res = unsafe { udev_enumerate_get_list_entry(self.enumerate) };
        if res.is_null() {
            let err = Errno::default();
            if err.0 == c::ENODATA {
                Ok(None)
            } else {
                Err(UdevError::EnumerateGetListEntry(err.into()))
            }
        } else {
            Ok(Some(UdevListEntry {
                list_entry: res,
                _phantom: Default::default(),
            }))
        }
    }
}

impl Drop for UdevEnumerate {
    fn drop(&mut self) {
        unsafe {
            udev_enumerate_unref(self.enumerate);
        }
    }
}

impl<'a> UdevListEntry<'a> {
    pub fn next(self) -> Option<Self> {
        unsafe {
            let res = udev_list_entry_get_next(self.list_entry);
            if res.is_null() {
                None
            } else {
                Some(Self {
                    list_entry: res,
                    _phantom: Default::default(),
                })
            }
        }
    }

    pub fn name(&self) -> &CStr {
        unsafe {
            let s = udev_list_entry_get_name(self.list_entry);
            CStr::from_ptr(s)
        }
    }
}

macro_rules! strfn {
    ($f:ident, $raw:ident) => {
        pub fn $f(&self) -> Option<&CStr> {
            let res = unsafe { $raw(self.device) };
            if res.is_null() {
                None
            } else {
                unsafe { Some(CStr::from_ptr(res)) }
            }
        }
    };
}

impl UdevDevice {
    strfn!(sysname, udev_device_get_sysname);
    strfn!(syspath, udev_device_get_syspath);
    strfn!(devnode, udev_device_get_devnode);
    strfn!(action, udev_device_get_action);
    strfn!(subsystem, udev_device_get_subsystem);

    pub fn devnum(&self) -> c::dev_t {
        unsafe { udev_device_get_devnum(self.device) }
    }

    pub fn is_initialized(&self) -> bool {
        unsafe { udev_device_get_is_initialized(self.device) != 0 }
    }

    pub fn parent_with_subsystem(&self, subsystem: &CStr) -> Result<UdevDevice, UdevError> {
        let res = unsafe {
            udev_device_get_parent_with_subsystem_devtype(
                self.device,
                subsystem.as_ptr(),
                ptr::null(),
            )
        };
        if res.is_null() {
            return Err(UdevError::DeviceParent(Errno::default().into()));
        }
        unsafe {
            udev_device_ref(res);
        }
        Ok(UdevDevice {
            udev: self.udev.clone(),
            device: res,
        })
    }

    pub fn property(&self, prop: &CStr) -> Option<&CStr> {
        let prop = unsafe { udev_device_get_property_value(self.device, prop.as_ptr()) };
        if prop.is_null() {
            None
        } else {
            unsafe { Some(CStr::from_ptr(prop)) }
        }
    }

    pub fn sysattr(&self, sysattr: &CStr) -> Option<&CStr> {
        let attr = unsafe { udev_device_get_sysattr_value(self.device, sysattr.as_ptr()) };
        if attr.is_null() {
            None
        } else {
            unsafe { Some(CStr::from_ptr(attr)) }
        }
    }

    pub fn seat(&self) -> &CStr {
        self.property(c"ID_SEAT").unwrap_or(c"seat0")
    }

    pub fn boot_vga(&self) -> bool {
        match self.parent_with_subsystem(c"pci") {
            Ok(parent) => parent
                .sysattr(c"boot_vga")
                .map(|v| v.to_bytes() == b"1")
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

impl Drop for UdevDevice {
    fn drop(&mut self) {
        unsafe {
            udev_device_unref(self.device);
        }
    }
}
