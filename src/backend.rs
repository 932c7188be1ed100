use {
    crate::video::{dmabuf::DmaBuf, drm::DrmModeInfo},
    std::rc::Rc,
};

/// A display mode advertised by an output.
#[derive(Debug, Clone)]
pub struct OutputMode {
    pub width: i32,
    pub height: i32,
    /// The refresh rate in millihertz. 60 Hz is stored as 60_000.
    pub refresh_rate_millihz: u32,
    pub preferred: bool,
    /// The raw kernel timings. Absent for consumer-supplied custom modes,
    /// in which case timings are synthesized.
    pub info: Option<DrmModeInfo>,
}

pub const STATE_ENABLED: u32 = 1 << 0;
pub const STATE_MODE: u32 = 1 << 1;
pub const STATE_FORMAT: u32 = 1 << 2;
pub const STATE_BUFFER: u32 = 1 << 3;
pub const STATE_ADAPTIVE_SYNC: u32 = 1 << 4;
pub const STATE_PRESENTATION_MODE: u32 = 1 << 5;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PresentationMode {
    /// Present on the next vblank.
    #[default]
    Vsync,
    /// Present as soon as possible, tearing if necessary.
    Immediate,
}

/// The compositor-facing state of an output.
///
/// Consumers fill in the fields they want to change, set the matching bits
/// in `committed`, and call [`KmsOutput::commit`]. The mask is cleared after
/// every commit attempt.
///
/// [`KmsOutput::commit`]: crate::backends::kms::KmsOutput::commit
#[derive(Default)]
pub struct OutputState {
    pub committed: u32,
    pub enabled: bool,
    pub mode: Option<Rc<OutputMode>>,
    pub custom_mode: Option<Rc<OutputMode>>,
    pub format: u32,
    pub buffer: Option<Rc<dyn Buffer>>,
    pub adaptive_sync: bool,
    pub presentation_mode: PresentationMode,
}

impl OutputState {
    pub fn mode(&self) -> Option<&Rc<OutputMode>> {
        self.mode.as_ref().or(self.custom_mode.as_ref())
    }
}

pub const PRESENT_VSYNC: u32 = 1 << 0;
pub const PRESENT_HW_CLOCK: u32 = 1 << 1;
pub const PRESENT_HW_COMPLETION: u32 = 1 << 2;
pub const PRESENT_ZEROCOPY: u32 = 1 << 3;

/// Reports a buffer reaching the screen.
#[derive(Copy, Clone, Debug)]
pub struct PresentEvent {
    /// False when the commit completed while the session was inactive.
    pub presented: bool,
    pub tv_sec: u64,
    pub tv_nsec: u32,
    pub seq: u32,
    /// The refresh interval in nanoseconds, 0 if unknown.
    pub refresh_ns: u32,
    pub flags: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SubpixelMode {
    Unknown,
    None,
    HorizontalRgb,
    HorizontalBgr,
    VerticalRgb,
    VerticalBgr,
}

/// A scanout-capable buffer supplied by the consumer.
pub trait Buffer {
    fn dmabuf(&self) -> Option<&DmaBuf>;
}

/// The allocator collaborator. Only used to attach swapchains to outputs
/// when the consumer signals readiness.
pub trait Allocator {
    fn create_swapchain(&self) -> Rc<dyn Swapchain>;
}

pub trait Swapchain {
    /// Marks the swapchain buffers for scanout use.
    fn configure_scanout(&self);

    fn acquire(&self) -> Option<Rc<dyn Buffer>>;
}
