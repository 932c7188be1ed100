pub mod atomic;
pub mod commit;
pub mod cvt;
pub mod fb;
pub mod legacy;
pub mod output;
pub mod present;
pub mod video;

use {
    crate::{
        backend::Allocator,
        backends::kms::{
            atomic::AtomicImpl,
            commit::{CommitData, KmsImpl},
            legacy::LegacyImpl,
            output::KmsOutput,
            video::{create_crtc, create_plane, KmsConnector, KmsCrtc, KmsPlane, PlaneFormat, PlaneType},
        },
        session::{DeviceChange, Session, SessionDevice},
        udev::UdevError,
        utils::{
            clonecell::CloneCell, copyhashmap::CopyHashMap, errorfmt::ErrorFmt,
            nonblock::set_nonblock, oserror::OsError, signal::Signal, syncqueue::SyncQueue,
        },
        video::{
            dmabuf::DmaBufId,
            drm::{
                sys::{
                    DRM_CAP_ADDFB2_MODIFIERS, DRM_CAP_ASYNC_PAGE_FLIP, DRM_CAP_CRTC_IN_VBLANK_EVENT,
                    DRM_CAP_CURSOR_HEIGHT, DRM_CAP_CURSOR_WIDTH, DRM_CAP_PRIME,
                    DRM_CAP_TIMESTAMP_MONOTONIC, DRM_CLIENT_CAP_ATOMIC,
                    DRM_CLIENT_CAP_UNIVERSAL_PLANES, DRM_PRIME_CAP_IMPORT,
                },
                Drm, DrmConnector, DrmError, DrmMaster,
            },
        },
    },
    bstr::ByteSlice,
    std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        env,
        rc::Rc,
        thread,
        time::{Duration, Instant},
    },
    thiserror::Error,
    uapi::c,
};

/// The width of the possible_crtcs bitmask.
pub const MAX_CRTCS: usize = 32;

#[derive(Debug, Error)]
pub enum KmsError {
    #[error("The session did not become active in time")]
    SessionTimeout,
    #[error("The session is not active")]
    SessionInactive,
    #[error("Found no usable GPU")]
    NoGpus,
    #[error("The device cannot import prime buffers")]
    NoPrimeImport,
    #[error("The device does not report crtcs in vblank events")]
    NoCrtcInVblankEvent,
    #[error("The device has no monotonic timestamp clock")]
    NoMonotonicClock,
    #[error("Could not enable universal planes")]
    UniversalPlanes(#[source] OsError),
    #[error("Could not make the drm fd non-blocking")]
    Nonblock(#[source] OsError),
    #[error("Cannot support more than {} crtcs", MAX_CRTCS)]
    TooManyCrtcs,
    #[error("Could not read the device resources")]
    GetResources(#[source] DrmError),
    #[error("Could not inspect a plane")]
    CreatePlane(#[source] DrmError),
    #[error("Could not inspect a crtc")]
    CreateCrtc(#[source] DrmError),
    #[error("The output has been destroyed")]
    OutputDefunct,
    #[error("No crtc attached to the output")]
    NoCrtc,
    #[error("No mode on enable commit")]
    NoModeOnEnable,
    #[error("The connector has no VRR support")]
    NoVrrSupport,
    #[error("The device has no immediate presentation support")]
    NoAsyncFlipSupport,
    #[error("No buffer committed")]
    NoBuffer,
    #[error("Cannot commit when a page-flip is awaiting")]
    PageFlipPending,
    #[error("The buffer has no dmabuf")]
    NoDmaBuf,
    #[error("The buffer was previously rejected by KMS")]
    Unimportable,
    #[error("The buffer has an explicit modifier but the device does not support modifiers")]
    ModifierUnsupported,
    #[error("Could not convert a prime fd to a gem handle")]
    GemHandle(#[source] DrmError),
    #[error("Could not import the buffer into KMS")]
    ImportFb(#[source] DrmError),
    #[error("The kernel rejected the commit")]
    Commit(#[source] DrmError),
    #[error(transparent)]
    Drm(#[from] DrmError),
    #[error(transparent)]
    Udev(#[from] UdevError),
}

#[derive(Copy, Clone, Debug)]
pub struct DrmCaps {
    pub supports_async_page_flip: bool,
    pub supports_addfb2_modifiers: bool,
    pub cursor_width: u64,
    pub cursor_height: u64,
}

#[derive(Default)]
pub struct KmsBackendEvents {
    pub new_output: Signal<Rc<KmsOutput>>,
}

pub struct KmsBackend {
    pub(super) session: Rc<dyn Session>,
    pub(super) gpu: Rc<SessionDevice>,
    pub(super) master: Rc<DrmMaster>,
    pub(super) caps: DrmCaps,
    pub(super) engine: Rc<dyn KmsImpl>,
    pub(super) crtcs: RefCell<Vec<Rc<KmsCrtc>>>,
    pub(super) planes: RefCell<Vec<Rc<KmsPlane>>>,
    pub(super) connectors: CopyHashMap<DrmConnector, Rc<KmsConnector>>,
    pub(super) unimportable: CopyHashMap<DmaBufId, ()>,
    pub(super) idle_frames: SyncQueue<Rc<KmsOutput>>,
    pub(super) ready: Cell<bool>,
    pub(super) allocator: CloneCell<Option<Rc<dyn Allocator>>>,
    pub events: KmsBackendEvents,
}

impl KmsBackend {
    /// Tries to bring up a DRM backend on the session's seat.
    ///
    /// Waits up to five seconds for the session to become active, picks the
    /// first enumerated GPU, probes its capabilities, enumerates its display
    /// pipeline, and scans connectors. Connected connectors get an output,
    /// but output-added events are deferred until [`on_ready`].
    ///
    /// [`on_ready`]: Self::on_ready
    pub fn attempt(session: &Rc<dyn Session>) -> Result<Rc<Self>, KmsError> {
        if !session.active() {
            log::debug!("Session is not active, waiting for 5s");
            let started = Instant::now();
            while !session.active() {
                thread::sleep(Duration::from_millis(250));
                session.dispatch_pending_events();
                if started.elapsed() >= Duration::from_secs(5) {
                    log::debug!("Session timeout reached");
                    break;
                }
            }
            if !session.active() {
                return Err(KmsError::SessionTimeout);
            }
        }

        let gpus = scan_gpus(session)?;
        if gpus.is_empty() {
            log::error!("Found no gpus to use, cannot continue");
            return Err(KmsError::NoGpus);
        }
        log::debug!("Found {} GPUs", gpus.len());

        // Multi-gpu setups are not supported. The boot gpu sorts first.
        let gpu = gpus[0].clone();
        let master = Rc::new(DrmMaster::new(gpu.fd.clone()));
        set_nonblock(master.raw()).map_err(KmsError::Nonblock)?;

        match master.drm().version() {
            Ok(v) => log::debug!(
                "Starting backend for {} with driver {}",
                gpu.devnode.to_bytes().as_bstr(),
                v.name,
            ),
            Err(e) => log::warn!("Could not read the driver version: {}", ErrorFmt(e)),
        }

        let (caps, engine) = check_features(&master)?;

        let slf = Rc::new(Self {
            session: session.clone(),
            gpu,
            master,
            caps,
            engine,
            crtcs: Default::default(),
            planes: Default::default(),
            connectors: Default::default(),
            unimportable: Default::default(),
            idle_frames: Default::default(),
            ready: Cell::new(false),
            allocator: Default::default(),
            events: Default::default(),
        });

        slf.init_resources()?;
        slf.register_listeners();
        slf.scan_connectors();

        Ok(slf)
    }

    pub fn caps(&self) -> &DrmCaps {
        &self.caps
    }

    /// The fd the host event loop should poll for readability.
    pub fn poll_fd(&self) -> c::c_int {
        self.master.raw()
    }

    pub fn drm_fd(&self) -> c::c_int {
        self.master.raw()
    }

    /// Drains kernel events and fires queued idle callbacks exactly once.
    pub fn dispatch_events(self: &Rc<Self>) {
        if let Err(e) = self.master.read_events() {
            log::error!(
                "Could not read events from the drm fd {}: {}",
                self.master.raw(),
                ErrorFmt(e)
            );
        }
        while let Some(event) = self.master.next_event() {
            self.handle_drm_event(event);
        }
        let frames = self.idle_frames.take();
        for output in frames {
            output.events.frame.emit(&());
        }
    }

    /// Attaches the allocator and emits output-added events for all outputs
    /// that connected before the consumer was ready to receive them.
    pub fn on_ready(self: &Rc<Self>, allocator: &Rc<dyn Allocator>) {
        self.allocator.set(Some(allocator.clone()));
        self.ready.set(true);
        let connectors: Vec<_> = self.connectors.lock().values().cloned().collect();
        for connector in connectors {
            let output = match connector.output.get() {
                Some(o) => o,
                _ => continue,
            };
            log::debug!("Announcing output {}", output.name);
            let swapchain = allocator.create_swapchain();
            swapchain.configure_scanout();
            output.swapchain.set(Some(swapchain));
            output.needs_frame.set(true);
            self.events.new_output.emit(&output);
        }
    }

    /// The format list of the first primary plane.
    pub fn render_formats(&self) -> Vec<PlaneFormat> {
        self.plane_formats(PlaneType::Primary)
    }

    /// The format list of the first cursor plane.
    pub fn cursor_formats(&self) -> Vec<PlaneFormat> {
        self.plane_formats(PlaneType::Cursor)
    }

    fn plane_formats(&self, ty: PlaneType) -> Vec<PlaneFormat> {
        for plane in self.planes.borrow().iter() {
            if plane.ty == ty {
                return plane.formats.borrow().clone();
            }
        }
        vec![]
    }

    fn init_resources(self: &Rc<Self>) -> Result<(), KmsError> {
        let resources = self.master.get_resources().map_err(KmsError::GetResources)?;
        log::debug!("Found {} crtcs", resources.crtcs.len());
        if resources.crtcs.len() > MAX_CRTCS {
            log::error!("Cannot support more than {} crtcs", MAX_CRTCS);
            return Err(KmsError::TooManyCrtcs);
        }
        let mut crtcs = Vec::with_capacity(resources.crtcs.len());
        for (idx, id) in resources.crtcs.iter().enumerate() {
            match create_crtc(&self.master, *id, idx) {
                Ok(c) => crtcs.push(Rc::new(c)),
                Err(e) => return Err(KmsError::CreateCrtc(e)),
            }
        }
        let plane_ids = self.master.get_planes()?;
        log::debug!("Found {} planes", plane_ids.len());
        let mut planes = Vec::with_capacity(plane_ids.len());
        for id in plane_ids {
            match create_plane(&self.master, id, &self.caps) {
                Ok(p) => planes.push(Rc::new(p)),
                Err(e) => return Err(KmsError::CreatePlane(e)),
            }
        }
        // First-fit assignment, one primary and one cursor per crtc.
        for plane in &planes {
            for (idx, crtc) in crtcs.iter().enumerate() {
                if plane.possible_crtcs & (1 << idx) == 0 {
                    continue;
                }
                match plane.ty {
                    PlaneType::Primary if crtc.primary.is_none() => {
                        crtc.primary.set(Some(plane.clone()));
                        break;
                    }
                    PlaneType::Cursor if crtc.cursor.is_none() => {
                        crtc.cursor.set(Some(plane.clone()));
                        break;
                    }
                    _ => {}
                }
            }
        }
        *self.crtcs.borrow_mut() = crtcs;
        *self.planes.borrow_mut() = planes;
        Ok(())
    }

    fn register_listeners(self: &Rc<Self>) {
        let slf = Rc::downgrade(self);
        self.gpu.events.change.subscribe(move |change| {
            let slf = match slf.upgrade() {
                Some(s) => s,
                _ => return,
            };
            if *change == DeviceChange::Hotplug {
                log::debug!(
                    "Got a hotplug event for {}",
                    slf.gpu.devnode.to_bytes().as_bstr()
                );
                slf.scan_connectors();
            }
        });
        let slf = Rc::downgrade(self);
        self.gpu.events.remove.subscribe(move |_| {
            let slf = match slf.upgrade() {
                Some(s) => s,
                _ => return,
            };
            // All downstream state is stale after this. Unsupported.
            log::error!(
                "Gpu {} was removed, this is not handled",
                slf.gpu.devnode.to_bytes().as_bstr()
            );
        });
        let slf = Rc::downgrade(self);
        self.session.events().change_active.subscribe(move |_| {
            let slf = match slf.upgrade() {
                Some(s) => s,
                _ => return,
            };
            if slf.session.active() {
                slf.restore_after_vt();
            }
        });
    }

    /// Reprograms the display pipeline after the session regained the
    /// devices.
    fn restore_after_vt(self: &Rc<Self>) {
        log::debug!("Restoring after VT switch");
        self.scan_connectors();
        let connectors: Vec<_> = self.connectors.lock().values().cloned().collect();
        for connector in &connectors {
            let crtc = match connector.crtc.get() {
                Some(c) => c,
                _ => continue,
            };
            log::debug!("Resetting crtc {}", crtc.id.0);
            if let Err(e) = self.engine.reset(connector) {
                log::error!("Crtc {} failed reset: {}", crtc.id.0, ErrorFmt(e));
            }
        }
        for connector in &connectors {
            let crtc = match connector.crtc.get() {
                Some(c) => c,
                _ => continue,
            };
            let output = match connector.output.get() {
                Some(o) => o,
                _ => continue,
            };
            let state = output.state.borrow();
            let mode_info = match state.mode() {
                Some(mode) => match &mode.info {
                    Some(info) => info.clone(),
                    None => cvt::calculate_mode(mode.width, mode.height, mode.refresh_rate_millihz),
                },
                None => {
                    log::debug!("Crtc {} has no mode to restore", crtc.id.0);
                    continue;
                }
            };
            log::debug!(
                "Restoring crtc {} with clock {} hdisplay {} vdisplay {} vrefresh {}",
                crtc.id.0,
                mode_info.clock,
                mode_info.hdisplay,
                mode_info.vdisplay,
                mode_info.vrefresh,
            );
            let data = CommitData {
                main_fb: crtc.primary.get().and_then(|p| p.front.get()),
                cursor_fb: None,
                committed: 0,
                modeset: true,
                blocking: true,
                test: false,
                flags: 0,
                enable: state.enabled,
                adaptive_sync: state.adaptive_sync,
                mode_info: Some(mode_info),
            };
            drop(state);
            if let Err(e) = self.engine.commit(connector, &data) {
                log::error!("Crtc {} failed restore: {}", crtc.id.0, ErrorFmt(e));
            }
        }
    }
}

fn check_features(master: &Rc<DrmMaster>) -> Result<(DrmCaps, Rc<dyn KmsImpl>), KmsError> {
    let cursor_width = master.get_cap(DRM_CAP_CURSOR_WIDTH).unwrap_or(64);
    let cursor_height = master.get_cap(DRM_CAP_CURSOR_HEIGHT).unwrap_or(64);

    match master.get_cap(DRM_CAP_PRIME) {
        Ok(v) if v & DRM_PRIME_CAP_IMPORT != 0 => {}
        _ => {
            log::error!("Prime buffer import is unsupported");
            return Err(KmsError::NoPrimeImport);
        }
    }
    match master.get_cap(DRM_CAP_CRTC_IN_VBLANK_EVENT) {
        Ok(v) if v != 0 => {}
        _ => {
            log::error!("Crtc ids in vblank events are unsupported");
            return Err(KmsError::NoCrtcInVblankEvent);
        }
    }
    match master.get_cap(DRM_CAP_TIMESTAMP_MONOTONIC) {
        Ok(v) if v != 0 => {}
        _ => {
            log::error!("Monotonic timestamps are unsupported");
            return Err(KmsError::NoMonotonicClock);
        }
    }
    if let Err(e) = master.set_client_cap(DRM_CLIENT_CAP_UNIVERSAL_PLANES, 1) {
        log::error!("Universal planes are unsupported");
        return Err(KmsError::UniversalPlanes(e));
    }

    let supports_async_page_flip = matches!(master.get_cap(DRM_CAP_ASYNC_PAGE_FLIP), Ok(1));
    let supports_addfb2_modifiers = matches!(master.get_cap(DRM_CAP_ADDFB2_MODIFIERS), Ok(1));
    log::debug!("supports_async_page_flip: {}", supports_async_page_flip);
    log::debug!("supports_addfb2_modifiers: {}", supports_addfb2_modifiers);

    let caps = DrmCaps {
        supports_async_page_flip,
        supports_addfb2_modifiers,
        cursor_width,
        cursor_height,
    };

    let engine: Rc<dyn KmsImpl> = 'engine: {
        if env::var_os("SCANOUT_NO_ATOMIC").map(|v| v == "1").unwrap_or(false) {
            log::info!("Atomic modesetting disabled by SCANOUT_NO_ATOMIC");
        } else if master.set_client_cap(DRM_CLIENT_CAP_ATOMIC, 1).is_ok() {
            break 'engine AtomicImpl::new(master, &caps);
        } else {
            log::debug!("Atomic modesetting is unsupported");
        }
        LegacyImpl::new(master, &caps)
    };
    log::debug!("Using the {} commit engine", engine.name());

    Ok((caps, engine))
}

fn scan_gpus(session: &Rc<dyn Session>) -> Result<Vec<Rc<SessionDevice>>, KmsError> {
    let udev = session.udev();
    let mut enumerate = udev.create_enumerate()?;
    enumerate.add_match_subsystem(c"drm")?;
    enumerate.add_match_sysname(c"card[0-9]*")?;
    enumerate.scan_devices()?;
    let seat_name = session.seat_name();
    let mut devices = VecDeque::new();
    let mut entry_opt = enumerate.get_list_entry()?;
    while let Some(entry) = entry_opt.take() {
        'dev: {
            let dev = match udev.create_device_from_syspath(entry.name()) {
                Ok(d) => d,
                Err(e) => {
                    log::warn!("Skipping device {:?}: {}", entry.name(), ErrorFmt(e));
                    break 'dev;
                }
            };
            log::debug!("Enumerated device {:?}", entry.name());
            let seat = dev.seat();
            if !seat_name.is_empty() && seat.to_bytes() != seat_name.as_bytes() {
                log::debug!(
                    "Skipping device {:?} because seat {:?} doesn't match our {}",
                    entry.name(),
                    seat,
                    seat_name,
                );
                break 'dev;
            }
            let devnode = match dev.devnode() {
                Some(n) => n,
                None => {
                    log::warn!("Skipping device {:?}, no devnode", entry.name());
                    break 'dev;
                }
            };
            let session_dev = match session.open_device(devnode) {
                Some(d) => d,
                None => {
                    log::warn!("Skipping device {:?}, could not open", entry.name());
                    break 'dev;
                }
            };
            if !Drm::open_existing(session_dev.fd.clone()).is_kms() {
                log::warn!("Skipping device {:?}, not a KMS device", entry.name());
                break 'dev;
            }
            if dev.boot_vga() {
                devices.push_front(session_dev);
            } else {
                devices.push_back(session_dev);
            }
        }
        entry_opt = entry.next();
    }
    Ok(devices.into_iter().collect())
}
