pub mod sys;

use {
    crate::{
        utils::{errorfmt::ErrorFmt, oserror::OsError, stack::Stack, syncqueue::SyncQueue},
        video::{
            drm::sys::{
                drm_event, drm_event_vblank, drm_format_modifier, drm_format_modifier_blob,
                drm_mode_modeinfo, gem_close, get_cap, get_version, mode_addfb2, mode_atomic,
                mode_closefb, mode_create_blob, mode_cursor2, mode_destroy_blob, mode_get_resources,
                mode_getconnector, mode_getcrtc, mode_getencoder, mode_getplane,
                mode_getplaneresources, mode_getpropblob, mode_getproperty, mode_obj_getproperties,
                mode_obj_setproperty, mode_page_flip, mode_rmfb, mode_setcrtc, prime_fd_to_handle,
                set_client_cap, DRM_CAP_CURSOR_HEIGHT, DRM_CAP_CURSOR_WIDTH,
                DRM_EVENT_FLIP_COMPLETE, DRM_MODE_FLAG_DBLSCAN, DRM_MODE_FLAG_INTERLACE,
                DRM_MODE_OBJECT_BLOB, DRM_MODE_OBJECT_CONNECTOR, DRM_MODE_OBJECT_CRTC,
                DRM_MODE_OBJECT_ENCODER, DRM_MODE_OBJECT_FB, DRM_MODE_OBJECT_MODE,
                DRM_MODE_OBJECT_PLANE, DRM_MODE_OBJECT_PROPERTY, FORMAT_BLOB_CURRENT,
            },
            Modifier,
        },
    },
    bstr::{BString, ByteSlice},
    indexmap::IndexSet,
    std::{
        cell::RefCell,
        fmt::{Debug, Display, Formatter},
        mem::{self, MaybeUninit},
        rc::Rc,
    },
    thiserror::Error,
    uapi::{c, OwnedFd, Pod},
};

#[derive(Debug, Error)]
pub enum DrmError {
    #[error("Could not perform drm property ioctl")]
    GetProperty(#[source] OsError),
    #[error("Could not perform drm getencoder ioctl")]
    GetEncoder(#[source] OsError),
    #[error("Could not perform drm getresources ioctl")]
    GetResources(#[source] OsError),
    #[error("Could not perform drm getplaneresources ioctl")]
    GetPlaneResources(#[source] OsError),
    #[error("Could not perform drm getplane ioctl")]
    GetPlane(#[source] OsError),
    #[error("Could not perform drm getcrtc ioctl")]
    GetCrtc(#[source] OsError),
    #[error("Could not perform drm setcrtc ioctl")]
    SetCrtc(#[source] OsError),
    #[error("Could not perform drm page-flip ioctl")]
    PageFlip(#[source] OsError),
    #[error("Could not perform drm cursor ioctl")]
    SetCursor(#[source] OsError),
    #[error("Could not set a drm object property")]
    SetProperty(#[source] OsError),
    #[error("Could not create a blob")]
    CreateBlob(#[source] OsError),
    #[error("Could not perform drm getconnector ioctl")]
    GetConnector(#[source] OsError),
    #[error("Could not perform drm getpropblob ioctl")]
    GetPropBlob(#[source] OsError),
    #[error("Property has an invalid size")]
    InvalidBlobSize,
    #[error("Could not perform drm properties ioctl")]
    GetProperties(#[source] OsError),
    #[error("Could not perform drm atomic ioctl")]
    Atomic(#[source] OsError),
    #[error("Drm property has an unknown type {0}")]
    UnknownPropertyType(u32),
    #[error("Range property does not have exactly two values")]
    RangeValues,
    #[error("Object property does not have exactly one value")]
    ObjectValues,
    #[error("Object does not have the required property {0}")]
    MissingProperty(Box<str>),
    #[error("Property {0} is not a range property")]
    NotARange(Box<str>),
    #[error("Plane has an unknown type {0}")]
    UnknownPlaneType(BString),
    #[error("Plane has an invalid type {0}")]
    InvalidPlaneType(u64),
    #[error("Plane type property has an invalid property type")]
    InvalidPlaneTypeProperty,
    #[error("Could not create a framebuffer")]
    AddFb(#[source] OsError),
    #[error("Could not convert prime fd to gem handle")]
    GemHandle(#[source] OsError),
    #[error("Could not read events from the drm fd")]
    ReadEvents(#[source] OsError),
    #[error("Read invalid data from drm device")]
    InvalidRead,
    #[error("Could not determine the drm version")]
    Version(#[source] OsError),
    #[error("Format of IN_FORMATS property is invalid")]
    InFormats,
    #[error("Modeset commit carries no mode timings")]
    NoModeInfo,
}

/// A handle to a DRM device.
///
/// The fd is owned by the session layer; this wrapper never closes it.
pub struct Drm {
    fd: Rc<OwnedFd>,
}

impl Drm {
    pub fn open_existing(fd: Rc<OwnedFd>) -> Self {
        Self { fd }
    }

    pub fn fd(&self) -> &Rc<OwnedFd> {
        &self.fd
    }

    pub fn raw(&self) -> c::c_int {
        self.fd.raw()
    }

    pub fn version(&self) -> Result<DrmVersion, DrmError> {
        get_version(self.fd.raw()).map_err(DrmError::Version)
    }

    /// Checks whether the device can drive display pipelines at all.
    pub fn is_kms(&self) -> bool {
        match mode_get_resources(self.fd.raw()) {
            Ok(r) => !r.crtcs.is_empty() && !r.connectors.is_empty() && !r.encoders.is_empty(),
            Err(_) => false,
        }
    }
}

pub struct DrmMaster {
    drm: Drm,
    u32_bufs: Stack<Vec<u32>>,
    u64_bufs: Stack<Vec<u64>>,
    events: SyncQueue<DrmEvent>,
    buf: RefCell<Box<[u8]>>,
}

impl Debug for DrmMaster {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.drm.raw())
    }
}

impl DrmMaster {
    pub fn new(fd: Rc<OwnedFd>) -> Self {
        Self {
            drm: Drm::open_existing(fd),
            u32_bufs: Default::default(),
            u64_bufs: Default::default(),
            events: Default::default(),
            buf: RefCell::new(vec![0u8; 1024].into_boxed_slice()),
        }
    }

    pub fn drm(&self) -> &Drm {
        &self.drm
    }

    pub fn raw(&self) -> c::c_int {
        self.drm.raw()
    }

    pub fn get_cap(&self, cap: u64) -> Result<u64, OsError> {
        get_cap(self.raw(), cap)
    }

    pub fn set_client_cap(&self, cap: u64, value: u64) -> Result<(), OsError> {
        set_client_cap(self.raw(), cap, value)
    }

    pub fn get_cursor_size(&self) -> Result<(u64, u64), OsError> {
        let width = self.get_cap(DRM_CAP_CURSOR_WIDTH)?;
        let height = self.get_cap(DRM_CAP_CURSOR_HEIGHT)?;
        Ok((width, height))
    }

    pub fn get_resources(&self) -> Result<DrmCardResources, DrmError> {
        mode_get_resources(self.raw())
    }

    pub fn get_planes(&self) -> Result<Vec<DrmPlane>, DrmError> {
        mode_getplaneresources(self.raw())
    }

    pub fn get_plane_info(&self, plane: DrmPlane) -> Result<DrmPlaneInfo, DrmError> {
        mode_getplane(self.raw(), plane.0)
    }

    pub fn get_encoder_info(&self, encoder: DrmEncoder) -> Result<DrmEncoderInfo, DrmError> {
        mode_getencoder(self.raw(), encoder.0)
    }

    pub fn get_crtc_info(&self, crtc: DrmCrtc) -> Result<DrmCrtcInfo, DrmError> {
        mode_getcrtc(self.raw(), crtc.0)
    }

    pub fn get_connector_info(
        &self,
        connector: DrmConnector,
        force: bool,
    ) -> Result<DrmConnectorInfo, DrmError> {
        mode_getconnector(self.raw(), connector.0, force)
    }

    pub fn get_property(&self, prop: DrmProperty) -> Result<DrmPropertyDefinition, DrmError> {
        mode_getproperty(self.raw(), prop)
    }

    pub fn get_properties<T: DrmObject>(&self, t: T) -> Result<Vec<DrmPropertyValue>, DrmError> {
        mode_obj_getproperties(self.raw(), t.id(), T::TYPE)
    }

    pub fn set_property<T: DrmObject>(
        &self,
        t: T,
        prop: DrmProperty,
        value: u64,
    ) -> Result<(), DrmError> {
        mode_obj_setproperty(self.raw(), t.id(), T::TYPE, prop.0, value)
            .map_err(DrmError::SetProperty)
    }

    pub fn set_crtc(
        &self,
        crtc: DrmCrtc,
        fb: DrmFb,
        connectors: &[u32],
        mode: Option<&drm_mode_modeinfo>,
    ) -> Result<(), DrmError> {
        mode_setcrtc(self.raw(), crtc.0, fb.0, connectors, mode).map_err(DrmError::SetCrtc)
    }

    pub fn page_flip(
        &self,
        crtc: DrmCrtc,
        fb: DrmFb,
        flags: u32,
        user_data: u64,
    ) -> Result<(), DrmError> {
        mode_page_flip(self.raw(), crtc.0, fb.0, flags, user_data).map_err(DrmError::PageFlip)
    }

    pub fn set_cursor(
        &self,
        crtc: DrmCrtc,
        handle: u32,
        width: u32,
        height: u32,
    ) -> Result<(), DrmError> {
        mode_cursor2(self.raw(), crtc.0, handle, width, height).map_err(DrmError::SetCursor)
    }

    pub fn gem_handle(&self, fd: c::c_int) -> Result<u32, DrmError> {
        prime_fd_to_handle(self.raw(), fd).map_err(DrmError::GemHandle)
    }

    pub fn gem_close(&self, handle: u32) -> Result<(), OsError> {
        gem_close(self.raw(), handle)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_fb2(
        &self,
        width: u32,
        height: u32,
        format: u32,
        flags: u32,
        handles: [u32; 4],
        strides: [u32; 4],
        offsets: [u32; 4],
        modifiers: [u64; 4],
    ) -> Result<DrmFb, DrmError> {
        mode_addfb2(
            self.raw(),
            width,
            height,
            format,
            flags,
            handles,
            strides,
            offsets,
            modifiers,
        )
        .map_err(DrmError::AddFb)
    }

    pub fn rm_fb(&self, fb: DrmFb) -> Result<(), OsError> {
        mode_rmfb(self.raw(), fb)
    }

    pub fn close_fb(&self, fb: DrmFb) -> Result<(), OsError> {
        mode_closefb(self.raw(), fb)
    }

    pub fn create_blob<T>(self: &Rc<Self>, t: &T) -> Result<PropBlob, DrmError> {
        match mode_create_blob(self.raw(), t) {
            Ok(b) => Ok(PropBlob {
                master: self.clone(),
                id: b,
            }),
            Err(e) => Err(DrmError::CreateBlob(e)),
        }
    }

    pub fn getblob<T: Pod>(&self, blob: DrmBlob) -> Result<T, DrmError> {
        let mut t = MaybeUninit::<T>::uninit();
        match mode_getpropblob(self.raw(), blob.0, &mut t) {
            Err(e) => Err(DrmError::GetPropBlob(e)),
            Ok(n) if n != size_of::<T>() => Err(DrmError::InvalidBlobSize),
            _ => unsafe { Ok(t.assume_init()) },
        }
    }

    pub fn getblob_bytes(&self, blob: DrmBlob) -> Result<Vec<u8>, DrmError> {
        let mut size = match mode_getpropblob(self.raw(), blob.0, &mut [0u8; 0][..]) {
            Ok(n) => n,
            Err(e) => return Err(DrmError::GetPropBlob(e)),
        };
        loop {
            let mut vec = vec![0u8; size];
            let n = match mode_getpropblob(self.raw(), blob.0, &mut vec[..]) {
                Ok(n) => n,
                Err(e) => return Err(DrmError::GetPropBlob(e)),
            };
            if n <= size {
                vec.truncate(n);
                return Ok(vec);
            }
            size = n;
        }
    }

    pub fn get_in_formats(&self, blob: DrmBlob) -> Result<Vec<InFormat>, DrmError> {
        let blob = self.getblob_bytes(blob)?;
        parse_in_formats(&blob)
    }

    pub fn change(self: &Rc<Self>) -> Change {
        let mut res = Change {
            master: self.clone(),
            objects: self.u32_bufs.pop().unwrap_or_default(),
            object_lengths: self.u32_bufs.pop().unwrap_or_default(),
            props: self.u32_bufs.pop().unwrap_or_default(),
            values: self.u64_bufs.pop().unwrap_or_default(),
        };
        res.objects.clear();
        res.object_lengths.clear();
        res.props.clear();
        res.values.clear();
        res
    }

    /// Drains readable kernel events into the internal queue.
    ///
    /// The fd must be in non-blocking mode.
    pub fn read_events(&self) -> Result<(), DrmError> {
        let mut buf = self.buf.borrow_mut();
        loop {
            let n = match uapi::read(self.raw(), &mut buf[..]) {
                Ok(b) => b.len(),
                Err(e) if e.0 == c::EAGAIN => return Ok(()),
                Err(e) => return Err(DrmError::ReadEvents(e.into())),
            };
            if n == 0 {
                return Ok(());
            }
            let mut data = &buf[..n];
            while !data.is_empty() {
                let header: drm_event = match uapi::pod_read_init(data) {
                    Ok(e) => e,
                    _ => return Err(DrmError::InvalidRead),
                };
                let len = header.length as usize;
                if len > data.len() {
                    return Err(DrmError::InvalidRead);
                }
                if header.ty == DRM_EVENT_FLIP_COMPLETE {
                    let event: drm_event_vblank = match uapi::pod_read_init(data) {
                        Ok(e) => e,
                        _ => return Err(DrmError::InvalidRead),
                    };
                    self.events.push(DrmEvent::FlipComplete {
                        tv_sec: event.tv_sec,
                        tv_usec: event.tv_usec,
                        sequence: event.sequence,
                        crtc_id: DrmCrtc(event.crtc_id),
                        user_data: event.user_data,
                    });
                }
                data = &data[len..];
            }
        }
    }

    pub fn next_event(&self) -> Option<DrmEvent> {
        self.events.pop()
    }
}

pub enum DrmEvent {
    FlipComplete {
        tv_sec: u32,
        tv_usec: u32,
        sequence: u32,
        crtc_id: DrmCrtc,
        user_data: u64,
    },
}

pub struct InFormat {
    pub format: u32,
    pub modifiers: IndexSet<Modifier>,
}

fn parse_in_formats(blob: &[u8]) -> Result<Vec<InFormat>, DrmError> {
    let header: drm_format_modifier_blob = match uapi::pod_read_init(blob) {
        Ok(h) => h,
        Err(_) => {
            log::error!("Header of IN_FORMATS blob doesn't fit in the blob");
            return Err(DrmError::InFormats);
        }
    };
    if header.version != FORMAT_BLOB_CURRENT {
        log::error!(
            "Header of IN_FORMATS has an invalid version: {}",
            header.version
        );
        return Err(DrmError::InFormats);
    }
    let formats_start = header.formats_offset as usize;
    let formats_end =
        formats_start.wrapping_add((header.count_formats as usize).wrapping_mul(size_of::<u32>()));
    let modifiers_start = header.modifiers_offset as usize;
    let modifiers_end = modifiers_start.wrapping_add(
        (header.count_modifiers as usize).wrapping_mul(size_of::<drm_format_modifier>()),
    );
    if blob.len() < formats_end || formats_end < formats_start {
        log::error!("Formats of IN_FORMATS blob don't fit in the blob");
        return Err(DrmError::InFormats);
    }
    if blob.len() < modifiers_end || modifiers_end < modifiers_start {
        log::error!("Modifiers of IN_FORMATS blob don't fit in the blob");
        return Err(DrmError::InFormats);
    }
    let mut formats: Vec<_> = uapi::pod_iter::<u32, _>(&blob[formats_start..formats_end])
        .unwrap()
        .map(|f| InFormat {
            format: f,
            modifiers: IndexSet::new(),
        })
        .collect();
    let modifiers =
        uapi::pod_iter::<drm_format_modifier, _>(&blob[modifiers_start..modifiers_end]).unwrap();
    for modifier in modifiers {
        let offset = modifier.offset as usize;
        let mut indices = modifier.formats;
        while indices != 0 {
            let idx = indices.trailing_zeros();
            indices &= !(1 << idx);
            let idx = idx as usize + offset;
            if idx >= formats.len() {
                log::error!("Modifier offset is out of bounds");
                return Err(DrmError::InFormats);
            }
            formats[idx].modifiers.insert(modifier.modifier);
        }
    }
    Ok(formats)
}

#[derive(Debug)]
pub struct DrmPropertyDefinition {
    pub id: DrmProperty,
    pub name: BString,
    pub immutable: bool,
    pub ty: DrmPropertyType,
}

#[derive(Debug, Clone)]
pub enum DrmPropertyType {
    Range { min: u64, max: u64 },
    SignedRange { min: i64, max: i64 },
    Object { ty: u32 },
    Blob,
    Enum {
        values: Vec<DrmPropertyEnumValue>,
        bitmask: bool,
    },
}

#[derive(Debug, Clone)]
pub struct DrmPropertyEnumValue {
    pub value: u64,
    pub name: BString,
}

#[derive(Debug)]
pub struct DrmPropertyValue {
    pub id: DrmProperty,
    pub value: u64,
}

pub trait DrmObject {
    const TYPE: u32;
    const NONE: Self;
    fn id(&self) -> u32;
    fn is_some(&self) -> bool;
    fn is_none(&self) -> bool;
}

macro_rules! drm_obj {
    ($name:ident, $ty:expr) => {
        #[repr(transparent)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
        pub struct $name(pub u32);

        impl DrmObject for $name {
            const TYPE: u32 = $ty;
            const NONE: Self = Self(0);

            fn id(&self) -> u32 {
                self.0
            }

            fn is_some(&self) -> bool {
                self.0 != 0
            }

            fn is_none(&self) -> bool {
                self.0 == 0
            }
        }
    };
}
drm_obj!(DrmCrtc, DRM_MODE_OBJECT_CRTC);
drm_obj!(DrmConnector, DRM_MODE_OBJECT_CONNECTOR);
drm_obj!(DrmEncoder, DRM_MODE_OBJECT_ENCODER);
drm_obj!(DrmMode, DRM_MODE_OBJECT_MODE);
drm_obj!(DrmProperty, DRM_MODE_OBJECT_PROPERTY);
drm_obj!(DrmFb, DRM_MODE_OBJECT_FB);
drm_obj!(DrmBlob, DRM_MODE_OBJECT_BLOB);
drm_obj!(DrmPlane, DRM_MODE_OBJECT_PLANE);

#[derive(Debug)]
pub struct DrmCardResources {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub crtcs: Vec<DrmCrtc>,
    pub connectors: Vec<DrmConnector>,
    pub encoders: Vec<DrmEncoder>,
}

#[derive(Debug)]
pub struct DrmPlaneInfo {
    pub possible_crtcs: u32,
    pub format_types: Vec<u32>,
}

#[derive(Debug)]
pub struct DrmEncoderInfo {
    pub crtc_id: DrmCrtc,
    pub possible_crtcs: u32,
}

#[derive(Debug)]
pub struct DrmCrtcInfo {
    pub gamma_size: u32,
    pub mode: Option<DrmModeInfo>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DrmModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,

    pub vrefresh: u32,

    pub flags: u32,
    pub ty: u32,
    pub name: BString,
}

impl DrmModeInfo {
    pub fn create_blob(&self, master: &Rc<DrmMaster>) -> Result<PropBlob, DrmError> {
        let raw = self.to_raw();
        master.create_blob(&raw)
    }

    pub fn to_raw(&self) -> drm_mode_modeinfo {
        let mut name = [0u8; sys::DRM_DISPLAY_MODE_LEN];
        let len = (name.len() - 1).min(self.name.len());
        name[..len].copy_from_slice(&self.name.as_bytes()[..len]);
        drm_mode_modeinfo {
            clock: self.clock,
            hdisplay: self.hdisplay,
            hsync_start: self.hsync_start,
            hsync_end: self.hsync_end,
            htotal: self.htotal,
            hskew: self.hskew,
            vdisplay: self.vdisplay,
            vsync_start: self.vsync_start,
            vsync_end: self.vsync_end,
            vtotal: self.vtotal,
            vscan: self.vscan,
            vrefresh: self.vrefresh,
            flags: self.flags,
            ty: self.ty,
            name,
        }
    }

    /// The refresh rate in millihertz, rounded to nearest.
    pub fn refresh_rate_millihz(&self) -> u32 {
        let htotal = self.htotal as u64;
        let vtotal = self.vtotal as u64;
        if htotal == 0 || vtotal == 0 {
            return 0;
        }
        let mut refresh = (self.clock as u64 * 1_000_000 / htotal + vtotal / 2) / vtotal;
        if self.flags & DRM_MODE_FLAG_INTERLACE != 0 {
            refresh *= 2;
        }
        if self.flags & DRM_MODE_FLAG_DBLSCAN != 0 {
            refresh /= 2;
        }
        if self.vscan > 1 {
            refresh /= self.vscan as u64;
        }
        refresh as u32
    }

    /// Compares the timing-relevant fields, ignoring name and type.
    pub fn same_timings(&self, other: &Self) -> bool {
        self.clock == other.clock
            && self.hdisplay == other.hdisplay
            && self.hsync_start == other.hsync_start
            && self.hsync_end == other.hsync_end
            && self.htotal == other.htotal
            && self.hskew == other.hskew
            && self.vdisplay == other.vdisplay
            && self.vsync_start == other.vsync_start
            && self.vsync_end == other.vsync_end
            && self.vtotal == other.vtotal
            && self.vscan == other.vscan
            && self.flags == other.flags
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DrmVersion {
    pub version_major: i32,
    pub version_minor: i32,
    pub version_patchlevel: i32,
    pub name: BString,
    pub date: BString,
    pub desc: BString,
}

#[derive(Debug)]
pub struct DrmConnectorInfo {
    pub encoders: Vec<DrmEncoder>,
    pub modes: Vec<DrmModeInfo>,

    pub encoder_id: DrmEncoder,
    pub connector_type: u32,
    pub connector_type_id: u32,

    pub connection: u32,
    pub mm_width: u32,
    pub mm_height: u32,
    pub subpixel: u32,
}

pub struct Change {
    master: Rc<DrmMaster>,
    objects: Vec<u32>,
    object_lengths: Vec<u32>,
    props: Vec<u32>,
    values: Vec<u64>,
}

pub struct ObjectChange<'a> {
    change: &'a mut Change,
}

impl Change {
    pub fn commit(&self, flags: u32, user_data: u64) -> Result<(), DrmError> {
        mode_atomic(
            self.master.raw(),
            flags,
            &self.objects,
            &self.object_lengths,
            &self.props,
            &self.values,
            user_data,
        )
    }

    pub fn change_object<T, F>(&mut self, obj: T, f: F)
    where
        T: DrmObject,
        F: FnOnce(&mut ObjectChange),
    {
        let old_len = self.props.len();
        let mut oc = ObjectChange { change: self };
        f(&mut oc);
        if self.props.len() > old_len {
            let new = (self.props.len() - old_len) as u32;
            if self.objects.last() == Some(&obj.id()) {
                *self.object_lengths.last_mut().unwrap() += new;
            } else {
                self.objects.push(obj.id());
                self.object_lengths.push(new);
            }
        }
    }

    #[cfg(test)]
    fn parts(&self) -> (&[u32], &[u32], &[u32], &[u64]) {
        (
            &self.objects,
            &self.object_lengths,
            &self.props,
            &self.values,
        )
    }
}

impl<'a> ObjectChange<'a> {
    pub fn change(&mut self, property_id: DrmProperty, value: u64) {
        self.change.props.push(property_id.0);
        self.change.values.push(value);
    }
}

impl Drop for Change {
    fn drop(&mut self) {
        self.master.u32_bufs.push(mem::take(&mut self.objects));
        self.master
            .u32_bufs
            .push(mem::take(&mut self.object_lengths));
        self.master.u32_bufs.push(mem::take(&mut self.props));
        self.master.u64_bufs.push(mem::take(&mut self.values));
    }
}

#[derive(Debug)]
pub struct PropBlob {
    master: Rc<DrmMaster>,
    id: DrmBlob,
}

impl PropBlob {
    pub fn id(&self) -> DrmBlob {
        self.id
    }
}

impl Drop for PropBlob {
    fn drop(&mut self) {
        if let Err(e) = mode_destroy_blob(self.master.raw(), self.id) {
            log::error!("Could not destroy blob: {}", ErrorFmt(e));
        }
    }
}

#[expect(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConnectorType {
    Unknown(u32),
    VGA,
    DVII,
    DVID,
    DVIA,
    Composite,
    SVIDEO,
    LVDS,
    Component,
    _9PinDIN,
    DisplayPort,
    HDMIA,
    HDMIB,
    TV,
    eDP,
    VIRTUAL,
    DSI,
    DPI,
    WRITEBACK,
    SPI,
    USB,
}

impl ConnectorType {
    pub fn from_drm(v: u32) -> Self {
        match v {
            sys::DRM_MODE_CONNECTOR_VGA => Self::VGA,
            sys::DRM_MODE_CONNECTOR_DVII => Self::DVII,
            sys::DRM_MODE_CONNECTOR_DVID => Self::DVID,
            sys::DRM_MODE_CONNECTOR_DVIA => Self::DVIA,
            sys::DRM_MODE_CONNECTOR_Composite => Self::Composite,
            sys::DRM_MODE_CONNECTOR_SVIDEO => Self::SVIDEO,
            sys::DRM_MODE_CONNECTOR_LVDS => Self::LVDS,
            sys::DRM_MODE_CONNECTOR_Component => Self::Component,
            sys::DRM_MODE_CONNECTOR_9PinDIN => Self::_9PinDIN,
            sys::DRM_MODE_CONNECTOR_DisplayPort => Self::DisplayPort,
            sys::DRM_MODE_CONNECTOR_HDMIA => Self::HDMIA,
            sys::DRM_MODE_CONNECTOR_HDMIB => Self::HDMIB,
            sys::DRM_MODE_CONNECTOR_TV => Self::TV,
            sys::DRM_MODE_CONNECTOR_eDP => Self::eDP,
            sys::DRM_MODE_CONNECTOR_VIRTUAL => Self::VIRTUAL,
            sys::DRM_MODE_CONNECTOR_DSI => Self::DSI,
            sys::DRM_MODE_CONNECTOR_DPI => Self::DPI,
            sys::DRM_MODE_CONNECTOR_WRITEBACK => Self::WRITEBACK,
            sys::DRM_MODE_CONNECTOR_SPI => Self::SPI,
            sys::DRM_MODE_CONNECTOR_USB => Self::USB,
            _ => Self::Unknown(v),
        }
    }
}

impl Display for ConnectorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown(n) => return write!(f, "Unknown({})", n),
            Self::VGA => "VGA",
            Self::DVII => "DVI-I",
            Self::DVID => "DVI-D",
            Self::DVIA => "DVI-A",
            Self::Composite => "Composite",
            Self::SVIDEO => "SVIDEO",
            Self::LVDS => "LVDS",
            Self::Component => "Component",
            Self::_9PinDIN => "DIN",
            Self::DisplayPort => "DP",
            Self::HDMIA => "HDMI-A",
            Self::HDMIB => "HDMI-B",
            Self::TV => "TV",
            Self::eDP => "eDP",
            Self::VIRTUAL => "Virtual",
            Self::DSI => "DSI",
            Self::DPI => "DPI",
            Self::WRITEBACK => "Writeback",
            Self::SPI => "SPI",
            Self::USB => "USB",
        };
        f.write_str(s)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ConnectorStatus {
    Connected,
    Disconnected,
    Unknown,
    Other(u32),
}

impl ConnectorStatus {
    pub fn from_drm(v: u32) -> Self {
        match v {
            sys::CONNECTOR_STATUS_CONNECTED => Self::Connected,
            sys::CONNECTOR_STATUS_DISCONNECTED => Self::Disconnected,
            sys::CONNECTOR_STATUS_UNKNOWN => Self::Unknown,
            _ => Self::Other(v),
        }
    }
}

#[cfg(test)]
mod tests;
