use {
    crate::{
        backend::STATE_ADAPTIVE_SYNC,
        backends::kms::{
            commit::{CommitData, KmsImpl},
            video::KmsConnector,
            DrmCaps,
        },
        utils::bitflags::BitflagsExt,
        video::drm::{
            sys::DRM_MODE_PAGE_FLIP_EVENT, DrmError, DrmFb, DrmMaster, DrmObject,
        },
    },
    std::rc::Rc,
};

/// The baseline commit engine built on SETCRTC and PAGE_FLIP.
pub struct LegacyImpl {
    master: Rc<DrmMaster>,
    caps: DrmCaps,
}

impl LegacyImpl {
    pub fn new(master: &Rc<DrmMaster>, caps: &DrmCaps) -> Rc<Self> {
        Rc::new(Self {
            master: master.clone(),
            caps: *caps,
        })
    }
}

impl KmsImpl for LegacyImpl {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn commit(&self, connector: &Rc<KmsConnector>, data: &CommitData) -> Result<(), DrmError> {
        let crtc = match connector.crtc.get() {
            Some(c) => c,
            _ => return Ok(()),
        };

        // There is no way to validate a commit without applying it.
        if data.test {
            return Ok(());
        }

        let main_fb = data.main_fb.as_ref().map(|f| f.id()).unwrap_or(DrmFb::NONE);

        if data.modeset {
            let mode = match (&data.mode_info, data.enable) {
                (Some(m), true) => Some(m.to_raw()),
                _ => None,
            };
            let connectors = [connector.id.0];
            let connectors: &[u32] = match data.enable {
                true => &connectors,
                false => &[],
            };
            self.master
                .set_crtc(crtc.id, main_fb, connectors, mode.as_ref())?;
        }

        if data.committed.contains(STATE_ADAPTIVE_SYNC) {
            if let Some(vrr) = &crtc.vrr_enabled {
                self.master
                    .set_property(crtc.id, vrr.id, data.adaptive_sync as u64)?;
                vrr.value.set(data.adaptive_sync);
            }
        }

        if let Some(cursor_fb) = &data.cursor_fb {
            self.master.set_cursor(
                crtc.id,
                cursor_fb.bo_handle(),
                self.caps.cursor_width as u32,
                self.caps.cursor_height as u32,
            )?;
        }

        if !data.modeset {
            if let Some(fb) = &data.main_fb {
                self.master
                    .page_flip(crtc.id, fb.id(), data.flags, connector.id.0 as u64)?;
                if data.flags.contains(DRM_MODE_PAGE_FLIP_EVENT) && !data.blocking {
                    connector.is_page_flip_pending.set(true);
                }
            }
        }

        Ok(())
    }

    fn reset(&self, _connector: &Rc<KmsConnector>) -> Result<(), DrmError> {
        // The restore modeset reprograms the whole pipeline; there is no
        // leftover atomic state to drop.
        Ok(())
    }
}
