use {
    crate::{
        backend::{
            PresentEvent, PRESENT_HW_CLOCK, PRESENT_HW_COMPLETION, PRESENT_VSYNC, PRESENT_ZEROCOPY,
        },
        backends::kms::KmsBackend,
        video::drm::{ConnectorStatus, DrmConnector, DrmCrtc, DrmEvent},
    },
    std::rc::Rc,
};

impl KmsBackend {
    pub(super) fn handle_drm_event(self: &Rc<Self>, event: DrmEvent) {
        match event {
            DrmEvent::FlipComplete {
                tv_sec,
                tv_usec,
                sequence,
                crtc_id,
                user_data,
            } => self.handle_flip_complete(tv_sec, tv_usec, sequence, crtc_id, user_data),
        }
    }

    fn handle_flip_complete(
        self: &Rc<Self>,
        tv_sec: u32,
        tv_usec: u32,
        sequence: u32,
        crtc_id: DrmCrtc,
        user_data: u64,
    ) {
        // The commit carried the kernel connector id as its user data.
        let connector = match self.connectors.get(&DrmConnector(user_data as u32)) {
            Some(c) => c,
            _ => return,
        };
        log::trace!(
            "Page-flip event seq {} sec {} usec {} crtc {}",
            sequence,
            tv_sec,
            tv_usec,
            crtc_id.0,
        );
        let crtc = match connector.crtc.get() {
            Some(c) => c,
            _ => {
                log::debug!("Ignoring a page-flip event from a disabled crtc / connector");
                return;
            }
        };
        if connector.status.get() != ConnectorStatus::Connected {
            log::debug!("Ignoring a page-flip event from a disabled crtc / connector");
            return;
        }
        connector.is_page_flip_pending.set(false);

        let output = match connector.output.get() {
            Some(o) => o,
            _ => return,
        };
        let refresh = crtc.refresh.get();
        let refresh_ns = match refresh {
            0 => 0,
            r => (1_000_000_000_000u64 / r as u64) as u32,
        };
        let presented = self.session.active();
        output.events.present.emit(&PresentEvent {
            presented,
            tv_sec: tv_sec as u64,
            tv_nsec: tv_usec * 1000,
            seq: sequence,
            refresh_ns,
            flags: PRESENT_VSYNC | PRESENT_HW_CLOCK | PRESENT_HW_COMPLETION | PRESENT_ZEROCOPY,
        });
        if presented {
            output.events.frame.emit(&());
        }
    }
}
