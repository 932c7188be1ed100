use {
    crate::{
        backends::kms::{fb::KmsFb, video::KmsConnector},
        video::drm::{DrmError, DrmModeInfo},
    },
    std::rc::Rc,
};

/// Everything a commit engine needs to program one connector.
pub struct CommitData {
    pub main_fb: Option<Rc<KmsFb>>,
    pub cursor_fb: Option<Rc<KmsFb>>,
    /// Absent only for disable commits.
    pub mode_info: Option<DrmModeInfo>,
    /// The committed bitmask of the originating output state.
    pub committed: u32,
    pub modeset: bool,
    pub blocking: bool,
    pub test: bool,
    /// DRM_MODE_PAGE_FLIP_* flags.
    pub flags: u32,
    pub enable: bool,
    pub adaptive_sync: bool,
}

/// The commit engine. The sole mutator of hardware state.
///
/// Both implementations honor the same contract: a successful non-test
/// commit has been accepted by the kernel in one submission, a failed one
/// has not touched hardware state. Non-blocking commits with the page-flip
/// event flag set mark the connector's flip as pending.
pub trait KmsImpl {
    fn name(&self) -> &'static str;

    fn commit(&self, connector: &Rc<KmsConnector>, data: &CommitData) -> Result<(), DrmError>;

    /// Drops whatever configuration a previous master left behind so that
    /// the following restore commits start from scratch.
    fn reset(&self, connector: &Rc<KmsConnector>) -> Result<(), DrmError>;
}
