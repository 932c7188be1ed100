use {
    crate::{format::Format, video::Modifier},
    std::rc::Rc,
    uapi::OwnedFd,
};

linear_ids!(DmaBufIds, DmaBufId);

#[derive(Clone)]
pub struct DmaBufPlane {
    pub offset: u32,
    pub stride: u32,
    pub fd: Rc<OwnedFd>,
}

#[derive(Clone)]
pub struct DmaBuf {
    pub id: DmaBufId,
    pub width: i32,
    pub height: i32,
    pub format: &'static Format,
    pub modifier: Modifier,
    pub planes: Vec<DmaBufPlane>,
}
