use {
    crate::{
        backend::{
            OutputMode, OutputState, PresentEvent, PresentationMode, SubpixelMode, Swapchain,
            STATE_BUFFER, STATE_ENABLED, STATE_FORMAT, STATE_MODE,
        },
        backends::kms::{
            commit::{CommitData, KmsImpl},
            cvt,
            fb::KmsFb,
            video::KmsConnector,
            KmsBackend, KmsError,
        },
        utils::{
            bitflags::BitflagsExt, clonecell::CloneCell, errorfmt::ErrorFmt, signal::Signal,
        },
        video::drm::sys::{DRM_MODE_PAGE_FLIP_ASYNC, DRM_MODE_PAGE_FLIP_EVENT},
    },
    std::{
        cell::{Cell, RefCell},
        rc::{Rc, Weak},
    },
};

#[derive(Default)]
pub struct KmsOutputEvents {
    pub present: Signal<PresentEvent>,
    pub frame: Signal<()>,
    pub commit: Signal<()>,
    pub destroy: Signal<()>,
}

/// The compositor-facing side of a connected connector.
///
/// Exists only while the connector is connected. A destroy event fires
/// before the output is released on disconnect.
pub struct KmsOutput {
    pub name: String,
    pub description: RefCell<String>,
    pub connector: Weak<KmsConnector>,
    pub backend: Weak<KmsBackend>,
    pub state: RefCell<OutputState>,
    pub swapchain: CloneCell<Option<Rc<dyn Swapchain>>>,
    pub needs_frame: Cell<bool>,
    pub events: KmsOutputEvents,
}

pub(super) struct CommitDisposition {
    pub needs_reconfig: bool,
    pub blocking: bool,
    pub flags: u32,
}

/// Classifies a commit per the rules of the commit engine contract:
/// reconfiguration is needed when enablement, format, or mode change;
/// such commits block, as do commits without a buffer. Flip flags only
/// apply to real commits.
pub(super) fn classify_commit(
    committed: u32,
    enabled: bool,
    presentation_mode: PresentationMode,
    test: bool,
) -> CommitDisposition {
    let needs_reconfig = committed.intersects(STATE_ENABLED | STATE_FORMAT | STATE_MODE);
    let blocking = needs_reconfig || !committed.contains(STATE_BUFFER);
    let mut flags = 0;
    if !test {
        if enabled {
            flags |= DRM_MODE_PAGE_FLIP_EVENT;
        }
        if presentation_mode == PresentationMode::Immediate {
            flags |= DRM_MODE_PAGE_FLIP_ASYNC;
        }
    }
    CommitDisposition {
        needs_reconfig,
        blocking,
        flags,
    }
}

impl KmsOutput {
    /// Validates the pending state without applying it.
    pub fn test(self: &Rc<Self>) -> Result<(), KmsError> {
        self.commit_state(true)
    }

    /// Applies the pending state.
    pub fn commit(self: &Rc<Self>) -> Result<(), KmsError> {
        self.commit_state(false)
    }

    pub fn max_cursor_size(&self) -> (u64, u64) {
        match self.backend.upgrade() {
            Some(b) => (b.caps.cursor_width, b.caps.cursor_height),
            _ => (0, 0),
        }
    }

    pub fn modes(&self) -> Vec<Rc<OutputMode>> {
        match self.connector.upgrade() {
            Some(c) => c.modes.borrow().clone(),
            _ => vec![],
        }
    }

    pub fn physical_size_mm(&self) -> (u32, u32) {
        match self.connector.upgrade() {
            Some(c) => (c.mm_width.get(), c.mm_height.get()),
            _ => (0, 0),
        }
    }

    pub fn subpixel(&self) -> SubpixelMode {
        match self.connector.upgrade() {
            Some(c) => c.subpixel.get(),
            _ => SubpixelMode::Unknown,
        }
    }

    pub fn vrr_capable(&self) -> bool {
        match self.connector.upgrade() {
            Some(c) => c.vrr_capable.get(),
            _ => false,
        }
    }

    pub fn non_desktop(&self) -> bool {
        match self.connector.upgrade() {
            Some(c) => c.non_desktop.get(),
            _ => false,
        }
    }

    /// Requests a frame event on the next dispatch turn. No-op while a
    /// page-flip is outstanding; its completion produces the frame event.
    pub fn schedule_frame(self: &Rc<Self>) {
        let connector = match self.connector.upgrade() {
            Some(c) => c,
            _ => return,
        };
        if connector.is_page_flip_pending.get() {
            return;
        }
        if let Some(backend) = self.backend.upgrade() {
            backend.idle_frames.push(self.clone());
        }
    }

    fn commit_state(self: &Rc<Self>, test: bool) -> Result<(), KmsError> {
        let backend = match self.backend.upgrade() {
            Some(b) => b,
            _ => return Err(KmsError::OutputDefunct),
        };
        let connector = match self.connector.upgrade() {
            Some(c) => c,
            _ => return Err(KmsError::OutputDefunct),
        };

        if !backend.session.active() {
            log::error!("Session inactive");
            return Err(KmsError::SessionInactive);
        }
        let crtc = match connector.crtc.get() {
            Some(c) => c,
            _ => {
                log::error!("No crtc attached to output {}", self.name);
                return Err(KmsError::NoCrtc);
            }
        };

        let state = self.state.borrow();
        let committed = state.committed;

        if committed.contains(STATE_ENABLED) && state.enabled && state.mode().is_none() {
            log::error!("No mode on enable commit");
            return Err(KmsError::NoModeOnEnable);
        }
        if state.adaptive_sync && !connector.vrr_capable.get() {
            log::error!("Output {} has no VRR support", self.name);
            return Err(KmsError::NoVrrSupport);
        }
        if state.presentation_mode == PresentationMode::Immediate
            && !backend.caps.supports_async_page_flip
        {
            log::error!("No immediate presentation support in the backend");
            return Err(KmsError::NoAsyncFlipSupport);
        }
        if committed.contains(STATE_BUFFER) && state.buffer.is_none() {
            log::error!("No buffer committed");
            return Err(KmsError::NoBuffer);
        }

        let disposition = classify_commit(committed, state.enabled, state.presentation_mode, test);

        if !test {
            if disposition.needs_reconfig {
                match (state.enabled, state.mode()) {
                    (true, Some(mode)) => log::debug!(
                        "Modesetting {} with {}x{}@{:.2}Hz",
                        self.name,
                        mode.width,
                        mode.height,
                        mode.refresh_rate_millihz as f64 / 1000.0,
                    ),
                    _ => log::debug!("Disabling output {}", self.name),
                }
            }
            if !disposition.blocking && connector.is_page_flip_pending.get() {
                log::error!("Cannot commit when a page-flip is awaiting");
                return Err(KmsError::PageFlipPending);
            }
        }

        let mut main_fb = None;
        if let Some(buffer) = &state.buffer {
            log::trace!("Committed a buffer, updating state");
            let buf_id = buffer.dmabuf().map(|d| d.id);
            let mut fb = None;
            if let Some(primary) = crtc.primary.get() {
                if let Some(back) = primary.back.get() {
                    if buf_id == Some(back.dmabuf_id()) {
                        log::trace!("Crtc's back buffer matches committed");
                        fb = Some(back);
                    }
                }
                if fb.is_none() {
                    if let Some(front) = primary.front.get() {
                        if buf_id == Some(front.dmabuf_id()) {
                            log::trace!("Crtc's front buffer matches committed");
                            fb = Some(front);
                        }
                    }
                }
            }
            let fb = match fb {
                Some(fb) => fb,
                None => match KmsFb::create(&backend, buffer) {
                    Ok(fb) => fb,
                    Err(e) => {
                        log::error!("Buffer failed to import to KMS");
                        return Err(e);
                    }
                },
            };
            main_fb = Some(fb);
        }

        let mode_info = match state.mode() {
            Some(mode) => match &mode.info {
                Some(info) => Some(info.clone()),
                None => Some(cvt::calculate_mode(
                    mode.width,
                    mode.height,
                    mode.refresh_rate_millihz,
                )),
            },
            None => None,
        };

        let data = CommitData {
            main_fb,
            cursor_fb: connector.pending_cursor_fb.get(),
            mode_info,
            committed,
            modeset: disposition.needs_reconfig,
            blocking: disposition.blocking,
            test,
            flags: disposition.flags,
            enable: state.enabled,
            adaptive_sync: state.adaptive_sync,
        };
        drop(state);

        let res = connector.commit_state(&backend.engine, &data);

        self.events.commit.emit(&());
        self.state.borrow_mut().committed = 0;

        res
    }
}

impl KmsConnector {
    pub(super) fn commit_state(
        self: &Rc<Self>,
        engine: &Rc<dyn KmsImpl>,
        data: &CommitData,
    ) -> Result<(), KmsError> {
        let res = engine.commit(self, data);
        match &res {
            Ok(_) if !data.test => self.apply_commit(data),
            Ok(_) => {}
            Err(e) => log::error!("Commit failed: {}", ErrorFmt(e)),
        }
        res.map_err(KmsError::Commit)
    }

    /// Rotates the framebuffer references after an applied commit. Failed
    /// and test commits leave them untouched.
    fn apply_commit(&self, data: &CommitData) {
        let crtc = match self.crtc.get() {
            Some(c) => c,
            _ => return,
        };
        if let Some(primary) = crtc.primary.get() {
            primary.back.set(primary.front.get());
            primary.front.set(data.main_fb.clone());
        }
        if let Some(cursor) = crtc.cursor.get() {
            cursor.back.set(cursor.front.get());
            cursor.front.set(data.cursor_fb.clone());
        }
        self.pending_cursor_fb.take();
        if data.committed.contains(STATE_MODE) {
            if let Some(info) = &data.mode_info {
                crtc.refresh.set(info.refresh_rate_millihz());
            }
        }
    }
}

#[cfg(test)]
mod tests;
