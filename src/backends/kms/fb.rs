use {
    crate::{
        backend::Buffer,
        backends::kms::{KmsBackend, KmsError},
        format,
        utils::errorfmt::ErrorFmt,
        video::{
            dmabuf::{DmaBuf, DmaBufId},
            drm::{sys::DRM_MODE_FB_MODIFIERS, DrmFb, DrmMaster, DrmObject},
            INVALID_MODIFIER, LINEAR_MODIFIER,
        },
    },
    std::{cell::Cell, rc::Rc},
    uapi::c,
};

/// A buffer imported into KMS.
///
/// The gem handles created during the import stay open for the lifetime of
/// the device. Closing them early races with driver bookkeeping on some
/// drivers.
pub struct KmsFb {
    master: Rc<DrmMaster>,
    id: Cell<DrmFb>,
    buffer: Rc<dyn Buffer>,
    dmabuf_id: DmaBufId,
    bo_handles: [Cell<u32>; 4],
    dropped: Cell<bool>,
    handles_closed: Cell<bool>,
}

impl KmsFb {
    pub fn create(backend: &Rc<KmsBackend>, buffer: &Rc<dyn Buffer>) -> Result<Rc<Self>, KmsError> {
        let dmabuf = match buffer.dmabuf() {
            Some(d) => d.clone(),
            _ => {
                log::error!("Buffer submitted has no dmabuf");
                return Err(KmsError::NoDmaBuf);
            }
        };
        if backend.unimportable.contains(&dmabuf.id) {
            log::error!("Buffer submitted is unimportable");
            return Err(KmsError::Unimportable);
        }
        let fb = Rc::new(Self {
            master: backend.master.clone(),
            id: Cell::new(DrmFb::NONE),
            buffer: buffer.clone(),
            dmabuf_id: dmabuf.id,
            bo_handles: Default::default(),
            dropped: Cell::new(false),
            handles_closed: Cell::new(false),
        });
        for (i, plane) in dmabuf.planes.iter().enumerate() {
            match fb.master.gem_handle(plane.fd.raw()) {
                Ok(handle) => {
                    log::trace!(
                        "Fb plane {} has fd {}, got handle {}",
                        i,
                        plane.fd.raw(),
                        handle
                    );
                    fb.bo_handles[i].set(handle);
                }
                Err(e) => {
                    log::error!("Could not convert prime fd to gem handle: {}", ErrorFmt(&e));
                    fb.drop_fb();
                    return Err(KmsError::GemHandle(e));
                }
            }
        }
        match fb.submit(backend, &dmabuf) {
            Ok(id) => fb.id.set(id),
            Err(e) => {
                log::error!("Failed to submit the buffer to KMS: {}", ErrorFmt(&e));
                backend.unimportable.set(dmabuf.id, ());
                fb.drop_fb();
                return Err(e);
            }
        }
        log::trace!("New framebuffer {}", fb.id.get().0);
        Ok(fb)
    }

    fn submit(&self, backend: &Rc<KmsBackend>, dmabuf: &DmaBuf) -> Result<DrmFb, KmsError> {
        let mut handles = [0; 4];
        let mut strides = [0; 4];
        let mut offsets = [0; 4];
        let mut modifiers = [0; 4];
        for (i, plane) in dmabuf.planes.iter().enumerate() {
            handles[i] = self.bo_handles[i].get();
            strides[i] = plane.stride;
            offsets[i] = plane.offset;
        }
        if backend.caps.supports_addfb2_modifiers && dmabuf.modifier != INVALID_MODIFIER {
            for modifier in modifiers.iter_mut().take(dmabuf.planes.len()) {
                *modifier = dmabuf.modifier;
            }
            log::trace!(
                "Importing {}x{} buffer with format {:?} and modifier {:#x}",
                dmabuf.width,
                dmabuf.height,
                format::debug(dmabuf.format.drm),
                dmabuf.modifier,
            );
            self.master
                .add_fb2(
                    dmabuf.width as u32,
                    dmabuf.height as u32,
                    dmabuf.format.drm,
                    DRM_MODE_FB_MODIFIERS,
                    handles,
                    strides,
                    offsets,
                    modifiers,
                )
                .map_err(KmsError::ImportFb)
        } else {
            if dmabuf.modifier != INVALID_MODIFIER && dmabuf.modifier != LINEAR_MODIFIER {
                log::error!("Buffer has an explicit modifier but the device does not support modifiers");
                return Err(KmsError::ModifierUnsupported);
            }
            log::trace!(
                "Importing {}x{} buffer with format {:?} without modifiers",
                dmabuf.width,
                dmabuf.height,
                format::debug(dmabuf.format.drm),
            );
            self.master
                .add_fb2(
                    dmabuf.width as u32,
                    dmabuf.height as u32,
                    dmabuf.format.drm,
                    0,
                    handles,
                    strides,
                    offsets,
                    modifiers,
                )
                .map_err(KmsError::ImportFb)
        }
    }

    pub fn id(&self) -> DrmFb {
        self.id.get()
    }

    pub fn dmabuf_id(&self) -> DmaBufId {
        self.dmabuf_id
    }

    pub fn buffer(&self) -> &Rc<dyn Buffer> {
        &self.buffer
    }

    /// The gem handle of the first plane.
    pub fn bo_handle(&self) -> u32 {
        self.bo_handles[0].get()
    }

    fn drop_fb(&self) {
        if self.dropped.replace(true) {
            return;
        }
        let id = self.id.replace(DrmFb::NONE);
        if id.is_none() {
            return;
        }
        log::trace!("Dropping framebuffer {}", id.0);
        if let Err(e) = self.master.close_fb(id) {
            if e.0 != c::EINVAL {
                log::error!("Could not close the framebuffer: {}", ErrorFmt(e));
            } else if let Err(e) = self.master.rm_fb(id) {
                log::error!("Could not remove the framebuffer: {}", ErrorFmt(e));
            }
        }
    }

    /// Releases the gem handles.
    ///
    /// Only safe once nothing scans out of the buffer and the driver has
    /// settled. Never called on the commit path.
    pub fn close_handles(&self) {
        if self.handles_closed.replace(true) {
            return;
        }
        for handle in &self.bo_handles {
            let handle = handle.replace(0);
            if handle == 0 {
                continue;
            }
            if let Err(e) = self.master.gem_close(handle) {
                log::error!("Could not close a gem handle: {}", ErrorFmt(e));
            }
        }
    }
}

impl Drop for KmsFb {
    fn drop(&mut self) {
        self.drop_fb();
    }
}
