use {
    crate::{
        backend::STATE_ADAPTIVE_SYNC,
        backends::kms::{
            commit::{CommitData, KmsImpl},
            video::{KmsConnector, KmsCrtc, KmsPlane, PlaneAtomicProps},
            DrmCaps,
        },
        utils::bitflags::BitflagsExt,
        video::drm::{
            sys::{
                DRM_MODE_ATOMIC_ALLOW_MODESET, DRM_MODE_ATOMIC_NONBLOCK, DRM_MODE_ATOMIC_TEST_ONLY,
                DRM_MODE_PAGE_FLIP_EVENT,
            },
            Change, DrmBlob, DrmCrtc, DrmError, DrmMaster, DrmObject, PropBlob,
        },
    },
    std::rc::Rc,
};

/// The atomic commit engine. A drop-in replacement for the legacy one that
/// submits the whole connector state in a single request.
pub struct AtomicImpl {
    master: Rc<DrmMaster>,
    caps: DrmCaps,
}

impl AtomicImpl {
    pub fn new(master: &Rc<DrmMaster>, caps: &DrmCaps) -> Rc<Self> {
        Rc::new(Self {
            master: master.clone(),
            caps: *caps,
        })
    }
}

fn missing(name: &str) -> DrmError {
    DrmError::MissingProperty(name.to_string().into_boxed_str())
}

struct PlaneChanges {
    crtc_id: DrmCrtc,
    crtc_w: i32,
    crtc_h: i32,
    src_w: u32,
    src_h: u32,
}

fn apply_plane_values(props: &PlaneAtomicProps, changes: &PlaneChanges) {
    props.crtc_id.value.set(changes.crtc_id);
    props.crtc_x.value.set(0);
    props.crtc_y.value.set(0);
    props.crtc_w.value.set(changes.crtc_w);
    props.crtc_h.value.set(changes.crtc_h);
    props.src_x.value.set(0);
    props.src_y.value.set(0);
    props.src_w.value.set(changes.src_w);
    props.src_h.value.set(changes.src_h);
}

impl AtomicImpl {
    fn enable_plane(
        &self,
        change: &mut Change,
        plane: &Rc<KmsPlane>,
        crtc: &Rc<KmsCrtc>,
        fb: u32,
        width: i32,
        height: i32,
    ) -> Result<PlaneChanges, DrmError> {
        let props = plane.atomic.as_ref().ok_or_else(|| missing("FB_ID"))?;
        change.change_object(plane.id, |c| {
            c.change(props.fb_id, fb as u64);
            c.change(props.crtc_id.id, crtc.id.0 as u64);
            c.change(props.crtc_x.id, 0);
            c.change(props.crtc_y.id, 0);
            c.change(props.crtc_w.id, width as u64);
            c.change(props.crtc_h.id, height as u64);
            c.change(props.src_x.id, 0);
            c.change(props.src_y.id, 0);
            c.change(props.src_w.id, (width as u64) << 16);
            c.change(props.src_h.id, (height as u64) << 16);
        });
        Ok(PlaneChanges {
            crtc_id: crtc.id,
            crtc_w: width,
            crtc_h: height,
            src_w: (width as u32) << 16,
            src_h: (height as u32) << 16,
        })
    }

    fn disable_plane(&self, change: &mut Change, plane: &Rc<KmsPlane>) -> Result<PlaneChanges, DrmError> {
        let props = plane.atomic.as_ref().ok_or_else(|| missing("FB_ID"))?;
        change.change_object(plane.id, |c| {
            c.change(props.fb_id, 0);
            c.change(props.crtc_id.id, 0);
        });
        Ok(PlaneChanges {
            crtc_id: DrmCrtc::NONE,
            crtc_w: 0,
            crtc_h: 0,
            src_w: 0,
            src_h: 0,
        })
    }
}

impl KmsImpl for AtomicImpl {
    fn name(&self) -> &'static str {
        "atomic"
    }

    fn commit(&self, connector: &Rc<KmsConnector>, data: &CommitData) -> Result<(), DrmError> {
        let crtc = match connector.crtc.get() {
            Some(c) => c,
            _ => return Ok(()),
        };

        let mut change = self.master.change();
        let mut new_mode_blob: Option<Rc<PropBlob>> = None;
        let mut primary_changes = None;
        let mut cursor_changes = None;

        if data.modeset {
            let crtc_id_prop = connector.crtc_id.as_ref().ok_or_else(|| missing("CRTC_ID"))?;
            let active = crtc.active.as_ref().ok_or_else(|| missing("ACTIVE"))?;
            let mode_id = crtc.mode_id.as_ref().ok_or_else(|| missing("MODE_ID"))?;
            if data.enable {
                let mode = data.mode_info.as_ref().ok_or(DrmError::NoModeInfo)?;
                let blob = Rc::new(mode.create_blob(&self.master)?);
                change.change_object(connector.id, |c| {
                    c.change(crtc_id_prop.id, crtc.id.0 as u64);
                });
                change.change_object(crtc.id, |c| {
                    c.change(active.id, 1);
                    c.change(mode_id.id, blob.id().0 as u64);
                });
                new_mode_blob = Some(blob);
            } else {
                change.change_object(connector.id, |c| {
                    c.change(crtc_id_prop.id, 0);
                });
                change.change_object(crtc.id, |c| {
                    c.change(active.id, 0);
                    c.change(mode_id.id, 0);
                });
            }
        }

        if data.committed.contains(STATE_ADAPTIVE_SYNC) {
            if let Some(vrr) = &crtc.vrr_enabled {
                change.change_object(crtc.id, |c| {
                    c.change(vrr.id, data.adaptive_sync as u64);
                });
            }
        }

        if let Some(primary) = crtc.primary.get() {
            if data.modeset && !data.enable {
                primary_changes = Some((primary.clone(), self.disable_plane(&mut change, &primary)?));
            } else if let Some(fb) = &data.main_fb {
                if data.modeset {
                    let mode = data.mode_info.as_ref().ok_or(DrmError::NoModeInfo)?;
                    let changes = self.enable_plane(
                        &mut change,
                        &primary,
                        &crtc,
                        fb.id().0,
                        mode.hdisplay as i32,
                        mode.vdisplay as i32,
                    )?;
                    primary_changes = Some((primary.clone(), changes));
                } else {
                    let props = primary.atomic.as_ref().ok_or_else(|| missing("FB_ID"))?;
                    change.change_object(primary.id, |c| {
                        c.change(props.fb_id, fb.id().0 as u64);
                    });
                }
            }
        }

        if let Some(cursor) = crtc.cursor.get() {
            if let Some(fb) = &data.cursor_fb {
                let changes = self.enable_plane(
                    &mut change,
                    &cursor,
                    &crtc,
                    fb.id().0,
                    self.caps.cursor_width as i32,
                    self.caps.cursor_height as i32,
                )?;
                cursor_changes = Some((cursor.clone(), changes));
            }
        }

        let mut flags = data.flags;
        if data.test {
            flags |= DRM_MODE_ATOMIC_TEST_ONLY;
        }
        if data.modeset {
            flags |= DRM_MODE_ATOMIC_ALLOW_MODESET;
        }
        if !data.blocking {
            flags |= DRM_MODE_ATOMIC_NONBLOCK;
        }

        change.commit(flags, connector.id.0 as u64)?;

        if !data.test {
            if data.modeset {
                if let Some(crtc_id_prop) = &connector.crtc_id {
                    crtc_id_prop.value.set(match data.enable {
                        true => crtc.id,
                        false => DrmCrtc::NONE,
                    });
                }
                if let Some(active) = &crtc.active {
                    active.value.set(data.enable);
                }
                if let Some(mode_id) = &crtc.mode_id {
                    mode_id.value.set(
                        new_mode_blob
                            .as_ref()
                            .map(|b| b.id())
                            .unwrap_or(DrmBlob::NONE),
                    );
                }
                crtc.mode_blob.set(new_mode_blob);
            }
            if data.committed.contains(STATE_ADAPTIVE_SYNC) {
                if let Some(vrr) = &crtc.vrr_enabled {
                    vrr.value.set(data.adaptive_sync);
                }
            }
            if let Some((plane, changes)) = &primary_changes {
                if let Some(props) = &plane.atomic {
                    apply_plane_values(props, changes);
                }
            }
            if let Some((plane, changes)) = &cursor_changes {
                if let Some(props) = &plane.atomic {
                    apply_plane_values(props, changes);
                }
            }
            if !data.blocking && data.flags.contains(DRM_MODE_PAGE_FLIP_EVENT) {
                connector.is_page_flip_pending.set(true);
            }
        }

        Ok(())
    }

    fn reset(&self, connector: &Rc<KmsConnector>) -> Result<(), DrmError> {
        let crtc = match connector.crtc.get() {
            Some(c) => c,
            _ => return Ok(()),
        };
        let mut change = self.master.change();
        if let Some(crtc_id_prop) = &connector.crtc_id {
            change.change_object(connector.id, |c| {
                c.change(crtc_id_prop.id, 0);
            });
        }
        if let (Some(active), Some(mode_id)) = (&crtc.active, &crtc.mode_id) {
            change.change_object(crtc.id, |c| {
                c.change(active.id, 0);
                c.change(mode_id.id, 0);
            });
        }
        for plane in [crtc.primary.get(), crtc.cursor.get()].into_iter().flatten() {
            self.disable_plane(&mut change, &plane)?;
        }
        change.commit(DRM_MODE_ATOMIC_ALLOW_MODESET, 0)?;

        if let Some(crtc_id_prop) = &connector.crtc_id {
            crtc_id_prop.value.set(DrmCrtc::NONE);
        }
        if let Some(active) = &crtc.active {
            active.value.set(false);
        }
        if let Some(mode_id) = &crtc.mode_id {
            mode_id.value.set(DrmBlob::NONE);
        }
        crtc.mode_blob.take();
        for plane in [crtc.primary.get(), crtc.cursor.get()].into_iter().flatten() {
            if let Some(props) = &plane.atomic {
                props.crtc_id.value.set(DrmCrtc::NONE);
            }
        }
        // Completions submitted by the previous configuration are stale.
        connector.is_page_flip_pending.set(false);
        Ok(())
    }
}
