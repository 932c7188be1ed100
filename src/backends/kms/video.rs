use {
    crate::{
        backend::{OutputMode, OutputState, SubpixelMode},
        backends::kms::{fb::KmsFb, output::KmsOutput, DrmCaps, KmsBackend},
        format,
        utils::{clonecell::CloneCell, errorfmt::ErrorFmt},
        video::{
            drm::{
                sys::{
                    drm_mode_modeinfo, DRM_MODE_FLAG_INTERLACE, DRM_MODE_SUBPIXEL_HORIZONTAL_BGR,
                    DRM_MODE_SUBPIXEL_HORIZONTAL_RGB, DRM_MODE_SUBPIXEL_NONE,
                    DRM_MODE_SUBPIXEL_VERTICAL_BGR, DRM_MODE_SUBPIXEL_VERTICAL_RGB,
                    DRM_MODE_TYPE_PREFERRED,
                },
                ConnectorStatus, ConnectorType, DrmBlob, DrmConnector, DrmConnectorInfo, DrmCrtc,
                DrmError, DrmMaster, DrmModeInfo, DrmObject, DrmPlane, DrmProperty,
                DrmPropertyDefinition, DrmPropertyType, DrmEncoder, PropBlob,
            },
            Modifier, INVALID_MODIFIER, LINEAR_MODIFIER,
        },
    },
    ahash::AHashMap,
    bstr::{BString, ByteSlice},
    indexmap::IndexSet,
    std::{
        cell::{Cell, RefCell},
        rc::{Rc, Weak},
    },
};

#[derive(Debug)]
pub struct MutableProperty<T: Copy> {
    pub id: DrmProperty,
    pub value: Cell<T>,
}

impl<T: Copy> MutableProperty<T> {
    pub fn map<U: Copy, F>(self, f: F) -> MutableProperty<U>
    where
        F: FnOnce(T) -> U,
    {
        MutableProperty {
            id: self.id,
            value: Cell::new(f(self.value.into_inner())),
        }
    }
}

pub(super) struct CollectedProperties {
    props: AHashMap<BString, (DrmPropertyDefinition, u64)>,
}

impl CollectedProperties {
    pub fn collect<T: DrmObject + Copy>(
        master: &Rc<DrmMaster>,
        t: T,
    ) -> Result<Self, DrmError> {
        let mut props = AHashMap::new();
        for prop in master.get_properties(t)? {
            let def = master.get_property(prop.id)?;
            props.insert(def.name.clone(), (def, prop.value));
        }
        Ok(Self { props })
    }

    pub fn get(&self, name: &str) -> Result<MutableProperty<u64>, DrmError> {
        match self.props.get(name.as_bytes().as_bstr()) {
            Some((def, value)) => Ok(MutableProperty {
                id: def.id,
                value: Cell::new(*value),
            }),
            _ => Err(DrmError::MissingProperty(name.to_string().into_boxed_str())),
        }
    }

    pub fn get_opt(&self, name: &str) -> Option<MutableProperty<u64>> {
        self.get(name).ok()
    }

    /// The bounds of a range property.
    pub fn range(&self, name: &str) -> Result<(u64, u64), DrmError> {
        match self.props.get(name.as_bytes().as_bstr()) {
            Some((def, _)) => match def.ty {
                DrmPropertyType::Range { min, max } => Ok((min, max)),
                _ => Err(DrmError::NotARange(name.to_string().into_boxed_str())),
            },
            _ => Err(DrmError::MissingProperty(name.to_string().into_boxed_str())),
        }
    }

    pub fn def(&self, name: &str) -> Option<&(DrmPropertyDefinition, u64)> {
        self.props.get(name.as_bytes().as_bstr())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PlaneType {
    Overlay,
    Primary,
    Cursor,
}

#[derive(Debug, Clone)]
pub struct PlaneFormat {
    pub format: u32,
    pub modifiers: IndexSet<Modifier>,
}

pub struct PlaneAtomicProps {
    pub crtc_id: MutableProperty<DrmCrtc>,
    pub fb_id: DrmProperty,
    pub crtc_x: MutableProperty<i32>,
    pub crtc_y: MutableProperty<i32>,
    pub crtc_w: MutableProperty<i32>,
    pub crtc_h: MutableProperty<i32>,
    pub src_x: MutableProperty<u32>,
    pub src_y: MutableProperty<u32>,
    pub src_w: MutableProperty<u32>,
    pub src_h: MutableProperty<u32>,
}

pub struct KmsPlane {
    pub id: DrmPlane,
    pub master: Rc<DrmMaster>,

    pub ty: PlaneType,
    pub possible_crtcs: u32,
    pub formats: RefCell<Vec<PlaneFormat>>,

    /// Present when the kernel exposes the atomic plane properties.
    pub atomic: Option<PlaneAtomicProps>,

    pub front: CloneCell<Option<Rc<KmsFb>>>,
    pub back: CloneCell<Option<Rc<KmsFb>>>,
}

pub struct KmsCrtc {
    pub id: DrmCrtc,
    pub idx: usize,
    pub master: Rc<DrmMaster>,

    pub gamma_size: u32,

    pub active: Option<MutableProperty<bool>>,
    pub mode_id: Option<MutableProperty<DrmBlob>>,
    pub vrr_enabled: Option<MutableProperty<bool>>,

    pub primary: CloneCell<Option<Rc<KmsPlane>>>,
    pub cursor: CloneCell<Option<Rc<KmsPlane>>>,

    /// The refresh rate of the current mode in millihertz.
    pub refresh: Cell<u32>,
    pub mode_blob: CloneCell<Option<Rc<PropBlob>>>,
}

pub struct KmsConnector {
    pub id: DrmConnector,
    pub master: Rc<DrmMaster>,
    pub backend: Weak<KmsBackend>,

    pub name: String,
    pub connector_type: ConnectorType,
    pub connector_type_id: u32,

    pub status: Cell<ConnectorStatus>,
    pub possible_crtcs: u32,

    pub crtc_id: Option<MutableProperty<DrmCrtc>>,
    pub vrr_capable_prop: Option<DrmProperty>,
    pub max_bpc_prop: Option<DrmProperty>,
    pub non_desktop_prop: Option<DrmProperty>,
    pub edid_prop: Option<DrmProperty>,

    pub crtc: CloneCell<Option<Rc<KmsCrtc>>>,

    pub modes: RefCell<Vec<Rc<OutputMode>>>,
    pub fallback_mode: RefCell<Option<DrmModeInfo>>,

    pub vrr_capable: Cell<bool>,
    pub max_bpc_bounds: Cell<(u64, u64)>,
    pub mm_width: Cell<u32>,
    pub mm_height: Cell<u32>,
    pub subpixel: Cell<SubpixelMode>,
    pub non_desktop: Cell<bool>,

    pub make: RefCell<String>,
    pub model: RefCell<String>,
    pub serial: RefCell<String>,

    pub is_page_flip_pending: Cell<bool>,
    pub pending_cursor_fb: CloneCell<Option<Rc<KmsFb>>>,

    pub output: CloneCell<Option<Rc<KmsOutput>>>,
}

pub(super) fn create_crtc(
    master: &Rc<DrmMaster>,
    id: DrmCrtc,
    idx: usize,
) -> Result<KmsCrtc, DrmError> {
    let info = master.get_crtc_info(id)?;
    let props = CollectedProperties::collect(master, id)?;
    Ok(KmsCrtc {
        id,
        idx,
        master: master.clone(),
        gamma_size: info.gamma_size,
        active: props.get_opt("ACTIVE").map(|p| p.map(|v| v == 1)),
        mode_id: props
            .get_opt("MODE_ID")
            .map(|p| p.map(|v| DrmBlob(v as u32))),
        vrr_enabled: props.get_opt("VRR_ENABLED").map(|p| p.map(|v| v == 1)),
        primary: Default::default(),
        cursor: Default::default(),
        refresh: Cell::new(0),
        mode_blob: Default::default(),
    })
}

pub(super) fn create_plane(
    master: &Rc<DrmMaster>,
    id: DrmPlane,
    caps: &DrmCaps,
) -> Result<KmsPlane, DrmError> {
    let info = master.get_plane_info(id)?;
    let props = CollectedProperties::collect(master, id)?;

    let ty = match props.def("type") {
        Some((def, val)) => match &def.ty {
            DrmPropertyType::Enum { values, .. } => 'ty: {
                for v in values {
                    if v.value == *val {
                        match v.name.as_bytes() {
                            b"Overlay" => break 'ty PlaneType::Overlay,
                            b"Primary" => break 'ty PlaneType::Primary,
                            b"Cursor" => break 'ty PlaneType::Cursor,
                            _ => return Err(DrmError::UnknownPlaneType(v.name.to_owned())),
                        }
                    }
                }
                return Err(DrmError::InvalidPlaneType(*val));
            }
            _ => return Err(DrmError::InvalidPlaneTypeProperty),
        },
        _ => return Err(DrmError::MissingProperty("type".to_string().into_boxed_str())),
    };
    log::debug!("Plane {} has type {:?}", id.0, ty);

    let mut formats = Vec::with_capacity(info.format_types.len());
    for fmt in info.format_types {
        let mut modifiers = IndexSet::new();
        modifiers.insert(LINEAR_MODIFIER);
        // Cursor planes cannot scan out anything but linear buffers.
        if ty != PlaneType::Cursor {
            modifiers.insert(INVALID_MODIFIER);
        }
        log::trace!("Plane {} format {:?}", id.0, format::debug(fmt));
        formats.push(PlaneFormat {
            format: fmt,
            modifiers,
        });
    }

    if ty != PlaneType::Cursor && caps.supports_addfb2_modifiers {
        if let Some(in_formats) = props.get_opt("IN_FORMATS") {
            let blob = DrmBlob(in_formats.value.get() as u32);
            for in_format in master.get_in_formats(blob)? {
                let pos = formats.iter().position(|f| f.format == in_format.format);
                match pos {
                    Some(pos) => {
                        formats[pos].modifiers.extend(in_format.modifiers);
                    }
                    None => formats.push(PlaneFormat {
                        format: in_format.format,
                        modifiers: in_format.modifiers,
                    }),
                }
            }
        }
    }

    let atomic = (|| {
        Some(PlaneAtomicProps {
            crtc_id: props.get_opt("CRTC_ID")?.map(|v| DrmCrtc(v as u32)),
            fb_id: props.get_opt("FB_ID")?.id,
            crtc_x: props.get_opt("CRTC_X")?.map(|v| v as i32),
            crtc_y: props.get_opt("CRTC_Y")?.map(|v| v as i32),
            crtc_w: props.get_opt("CRTC_W")?.map(|v| v as i32),
            crtc_h: props.get_opt("CRTC_H")?.map(|v| v as i32),
            src_x: props.get_opt("SRC_X")?.map(|v| v as u32),
            src_y: props.get_opt("SRC_Y")?.map(|v| v as u32),
            src_w: props.get_opt("SRC_W")?.map(|v| v as u32),
            src_h: props.get_opt("SRC_H")?.map(|v| v as u32),
        })
    })();

    Ok(KmsPlane {
        id,
        master: master.clone(),
        ty,
        possible_crtcs: info.possible_crtcs,
        formats: RefCell::new(formats),
        atomic,
        front: Default::default(),
        back: Default::default(),
    })
}

impl KmsBackend {
    /// Scans all kernel connectors, creating trackers for new ids and
    /// driving connect/disconnect transitions for known ones.
    pub fn scan_connectors(self: &Rc<Self>) {
        log::debug!(
            "Scanning connectors for {}",
            self.gpu.devnode.to_bytes().as_bstr()
        );
        let resources = match self.master.get_resources() {
            Ok(r) => r,
            Err(e) => {
                log::error!("Could not scan connectors: {}", ErrorFmt(e));
                return;
            }
        };
        for id in resources.connectors {
            let info = match self.master.get_connector_info(id, true) {
                Ok(i) => i,
                Err(e) => {
                    log::error!("Could not fetch connector {}: {}", id.0, ErrorFmt(e));
                    continue;
                }
            };
            let connector = match self.connectors.get(&id) {
                Some(c) => c,
                None => match create_connector(self, id, &info) {
                    Ok(c) => {
                        let c = Rc::new(c);
                        self.connectors.set(id, c.clone());
                        c
                    }
                    Err(e) => {
                        log::error!("Connector {} failed initializing: {}", id.0, ErrorFmt(e));
                        continue;
                    }
                },
            };
            let new_status = ConnectorStatus::from_drm(info.connection);
            log::trace!(
                "Connector {} connection state: {:?}",
                connector.name,
                new_status
            );
            let old_status = connector.status.get();
            if old_status != ConnectorStatus::Connected && new_status == ConnectorStatus::Connected
            {
                log::debug!("Connector {} connected", connector.name);
                connector.connect(self, &info);
            } else if old_status == ConnectorStatus::Connected
                && new_status == ConnectorStatus::Disconnected
            {
                log::debug!("Connector {} disconnected", connector.name);
                connector.disconnect();
            }
        }
    }
}

fn possible_crtcs(master: &Rc<DrmMaster>, encoders: &[DrmEncoder]) -> u32 {
    let mut mask = 0;
    for encoder in encoders {
        match master.get_encoder_info(*encoder) {
            Ok(info) => mask |= info.possible_crtcs,
            Err(e) => log::warn!("Could not inspect encoder {}: {}", encoder.0, ErrorFmt(e)),
        }
    }
    mask
}

fn create_connector(
    backend: &Rc<KmsBackend>,
    id: DrmConnector,
    info: &DrmConnectorInfo,
) -> Result<KmsConnector, DrmError> {
    let master = &backend.master;
    let props = CollectedProperties::collect(master, id)?;
    let connector_type = ConnectorType::from_drm(info.connector_type);
    let name = format!("{}-{}", connector_type, info.connector_type_id);

    let possible = possible_crtcs(master, &info.encoders);
    if possible == 0 {
        log::error!("Connector {} has no possible crtcs", name);
    }

    let crtc_id = props.get_opt("CRTC_ID").map(|p| p.map(|v| DrmCrtc(v as u32)));
    let max_bpc_prop = props.get_opt("max bpc").map(|p| p.id);
    let max_bpc_bounds = match max_bpc_prop {
        Some(_) => match props.range("max bpc") {
            Ok(bounds) => bounds,
            Err(e) => {
                log::error!("Failed to check max bpc: {}", ErrorFmt(e));
                (0, 0)
            }
        },
        _ => (0, 0),
    };

    let connector = KmsConnector {
        id,
        master: master.clone(),
        backend: Rc::downgrade(backend),
        name,
        connector_type,
        connector_type_id: info.connector_type_id,
        status: Cell::new(ConnectorStatus::Disconnected),
        possible_crtcs: possible,
        crtc_id,
        vrr_capable_prop: props.get_opt("vrr_capable").map(|p| p.id),
        max_bpc_prop,
        non_desktop_prop: props.get_opt("non-desktop").map(|p| p.id),
        edid_prop: props.get_opt("EDID").map(|p| p.id),
        crtc: Default::default(),
        modes: Default::default(),
        fallback_mode: Default::default(),
        vrr_capable: Cell::new(false),
        max_bpc_bounds: Cell::new(max_bpc_bounds),
        mm_width: Cell::new(0),
        mm_height: Cell::new(0),
        subpixel: Cell::new(SubpixelMode::Unknown),
        non_desktop: Cell::new(false),
        make: Default::default(),
        model: Default::default(),
        serial: Default::default(),
        is_page_flip_pending: Cell::new(false),
        pending_cursor_fb: Default::default(),
        output: Default::default(),
    };
    connector.crtc.set(connector.current_crtc(backend, info));
    Ok(connector)
}

impl KmsConnector {
    /// The crtc currently driving this connector, resolved via the CRTC_ID
    /// property or the active encoder.
    fn current_crtc(&self, backend: &Rc<KmsBackend>, info: &DrmConnectorInfo) -> Option<Rc<KmsCrtc>> {
        let crtc_id = if let Some(prop) = &self.crtc_id {
            prop.value.get()
        } else if info.encoder_id.is_some() {
            match self.master.get_encoder_info(info.encoder_id) {
                Ok(i) => i.crtc_id,
                Err(e) => {
                    log::error!("Could not inspect the active encoder: {}", ErrorFmt(e));
                    return None;
                }
            }
        } else {
            return None;
        };
        if crtc_id.is_none() {
            return None;
        }
        let crtcs = backend.crtcs.borrow();
        let crtc = crtcs.iter().find(|c| c.id == crtc_id).cloned();
        if crtc.is_none() {
            log::error!("Failed to find a crtc with id {}", crtc_id.0);
        }
        crtc
    }

    /// Reads the current value of one of this connector's properties.
    fn fresh_prop_value(&self, prop: DrmProperty) -> Option<u64> {
        let values = match self.master.get_properties(self.id) {
            Ok(v) => v,
            Err(e) => {
                log::error!("Could not read connector properties: {}", ErrorFmt(e));
                return None;
            }
        };
        values.into_iter().find(|v| v.id == prop).map(|v| v.value)
    }

    /// The mode currently programmed on this connector's crtc.
    fn current_mode(&self) -> Option<DrmModeInfo> {
        let crtc = self.crtc.get()?;
        if let Some(mode_id) = &crtc.mode_id {
            let blob = mode_id.value.get();
            if blob.is_none() {
                return None;
            }
            return match self.master.getblob::<drm_mode_modeinfo>(blob) {
                Ok(m) => Some(m.into()),
                Err(e) => {
                    log::debug!("Could not read the current mode blob: {}", ErrorFmt(e));
                    None
                }
            };
        }
        match self.master.get_crtc_info(crtc.id) {
            Ok(info) => info.mode,
            Err(e) => {
                log::debug!("Could not read the current crtc state: {}", ErrorFmt(e));
                None
            }
        }
    }

    fn parse_edid(&self, _data: &[u8]) {
        // TODO: parse make/model/serial out of the EDID blocks
    }

    pub(super) fn connect(self: &Rc<Self>, backend: &Rc<KmsBackend>, info: &DrmConnectorInfo) {
        if self.output.is_some() {
            log::debug!(
                "Not connecting connector {} because it's already connected",
                self.name
            );
            return;
        }
        log::debug!(
            "Connecting connector {}, crtc id {}",
            self.name,
            self.crtc.get().map(|c| c.id.0 as i64).unwrap_or(-1)
        );

        let output = Rc::new(KmsOutput {
            name: self.name.clone(),
            description: Default::default(),
            connector: Rc::downgrade(self),
            backend: Rc::downgrade(backend),
            state: RefCell::new(OutputState::default()),
            swapchain: Default::default(),
            needs_frame: Cell::new(true),
            events: Default::default(),
        });

        let current_mode = self.current_mode();
        let mut modes = self.modes.borrow_mut();
        modes.clear();
        let mut state = output.state.borrow_mut();

        for (i, drm_mode) in info.modes.iter().enumerate() {
            if drm_mode.flags & DRM_MODE_FLAG_INTERLACE != 0 {
                log::debug!("Skipping mode {} because it's interlaced", i);
                continue;
            }
            if i == 1 {
                *self.fallback_mode.borrow_mut() = Some(drm_mode.clone());
            }
            let refresh = drm_mode.refresh_rate_millihz();
            let mode = Rc::new(OutputMode {
                width: drm_mode.hdisplay as i32,
                height: drm_mode.vdisplay as i32,
                refresh_rate_millihz: refresh,
                preferred: drm_mode.ty & DRM_MODE_TYPE_PREFERRED != 0,
                info: Some(drm_mode.clone()),
            });
            if let Some(current) = &current_mode {
                if current.same_timings(drm_mode) {
                    state.mode = Some(mode.clone());
                    if let Some(crtc) = self.crtc.get() {
                        crtc.refresh.set(refresh);
                    }
                }
            }
            log::debug!(
                "Mode {}: {}x{}@{:.2}Hz{}",
                i,
                mode.width,
                mode.height,
                refresh as f64 / 1000.0,
                if mode.preferred { " (preferred)" } else { "" },
            );
            modes.push(mode);
        }
        drop(state);
        drop(modes);

        self.mm_width.set(info.mm_width);
        self.mm_height.set(info.mm_height);
        log::debug!(
            "Physical size {}x{} (mm)",
            info.mm_width,
            info.mm_height
        );
        self.subpixel.set(match info.subpixel {
            DRM_MODE_SUBPIXEL_NONE => SubpixelMode::None,
            DRM_MODE_SUBPIXEL_HORIZONTAL_RGB => SubpixelMode::HorizontalRgb,
            DRM_MODE_SUBPIXEL_HORIZONTAL_BGR => SubpixelMode::HorizontalBgr,
            DRM_MODE_SUBPIXEL_VERTICAL_RGB => SubpixelMode::VerticalRgb,
            DRM_MODE_SUBPIXEL_VERTICAL_BGR => SubpixelMode::VerticalBgr,
            _ => SubpixelMode::Unknown,
        });

        if let Some(prop) = self.non_desktop_prop {
            if let Some(value) = self.fresh_prop_value(prop) {
                if value == 1 {
                    log::debug!("Connector {} is a non-desktop display", self.name);
                }
                self.non_desktop.set(value == 1);
            }
        }

        let can_do_vrr = 'vrr: {
            let prop = match self.vrr_capable_prop {
                Some(p) => p,
                _ => break 'vrr false,
            };
            let crtc = match self.crtc.get() {
                Some(c) => c,
                _ => break 'vrr false,
            };
            if crtc.vrr_enabled.is_none() {
                break 'vrr false;
            }
            self.fresh_prop_value(prop) == Some(1)
        };
        self.vrr_capable.set(can_do_vrr);

        if let Some(prop) = self.edid_prop {
            if let Some(blob) = self.fresh_prop_value(prop) {
                match self.master.getblob_bytes(DrmBlob(blob as u32)) {
                    Ok(edid) => self.parse_edid(&edid),
                    Err(e) => log::debug!("Could not read the EDID: {}", ErrorFmt(e)),
                }
            }
        }

        let description = format!(
            "{} {} {} ({})",
            self.make.borrow(),
            self.model.borrow(),
            self.serial.borrow(),
            self.name,
        );
        log::debug!("Description: {}", description);
        *output.description.borrow_mut() = description;

        self.status.set(ConnectorStatus::Connected);
        self.output.set(Some(output.clone()));

        if !backend.ready.get() {
            return;
        }

        // The swapchain can only be created once the allocator is attached.
        if let Some(allocator) = backend.allocator.get() {
            let swapchain = allocator.create_swapchain();
            swapchain.configure_scanout();
            output.swapchain.set(Some(swapchain));
        }
        backend.events.new_output.emit(&output);
        output.schedule_frame();
    }

    pub(super) fn disconnect(self: &Rc<Self>) {
        let output = match self.output.take() {
            Some(o) => o,
            _ => {
                log::debug!(
                    "Not disconnecting connector {} because it's already disconnected",
                    self.name
                );
                return;
            }
        };
        output.events.destroy.emit(&());
        // A completion that is still in flight is dropped by the handler.
        self.is_page_flip_pending.set(false);
        self.status.set(ConnectorStatus::Disconnected);
    }
}
