use {
    ahash::AHashMap,
    once_cell::sync::Lazy,
    std::fmt::{self, Debug, Formatter},
};

#[derive(Copy, Clone, Debug)]
pub struct Format {
    pub name: &'static str,
    pub drm: u32,
    pub bpp: u32,
    pub has_alpha: bool,
    pub opaque: Option<&'static Format>,
}

impl PartialEq for Format {
    fn eq(&self, other: &Self) -> bool {
        self.drm == other.drm
    }
}

impl Eq for Format {}

const fn fourcc(name: &[u8; 4]) -> u32 {
    (name[0] as u32) | (name[1] as u32) << 8 | (name[2] as u32) << 16 | (name[3] as u32) << 24
}

static FORMATS_MAP: Lazy<AHashMap<u32, &'static Format>> = Lazy::new(|| {
    let mut map = AHashMap::new();
    for &format in FORMATS {
        assert!(map.insert(format.drm, format).is_none());
    }
    map
});

pub fn formats() -> &'static AHashMap<u32, &'static Format> {
    &FORMATS_MAP
}

/// Formats a fourcc for log messages, whether we know it or not.
pub fn debug(fourcc: u32) -> impl Debug {
    DebugFourcc(fourcc)
}

struct DebugFourcc(u32);

impl Debug for DebugFourcc {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(format) = FORMATS_MAP.get(&self.0) {
            return f.write_str(format.name);
        }
        let bytes = self.0.to_le_bytes();
        for b in bytes {
            if !b.is_ascii_alphanumeric() {
                return write!(f, "0x{:08x}", self.0);
            }
        }
        write!(
            f,
            "{}{}{}{}",
            bytes[0] as char, bytes[1] as char, bytes[2] as char, bytes[3] as char
        )
    }
}

pub static ARGB8888: &Format = &Format {
    name: "argb8888",
    drm: fourcc(b"AR24"),
    bpp: 32,
    has_alpha: true,
    opaque: Some(XRGB8888),
};

pub static XRGB8888: &Format = &Format {
    name: "xrgb8888",
    drm: fourcc(b"XR24"),
    bpp: 32,
    has_alpha: false,
    opaque: None,
};

static ABGR8888: &Format = &Format {
    name: "abgr8888",
    drm: fourcc(b"AB24"),
    bpp: 32,
    has_alpha: true,
    opaque: Some(XBGR8888),
};

static XBGR8888: &Format = &Format {
    name: "xbgr8888",
    drm: fourcc(b"XB24"),
    bpp: 32,
    has_alpha: false,
    opaque: None,
};

static RGB565: &Format = &Format {
    name: "rgb565",
    drm: fourcc(b"RG16"),
    bpp: 16,
    has_alpha: false,
    opaque: None,
};

static ARGB2101010: &Format = &Format {
    name: "argb2101010",
    drm: fourcc(b"AR30"),
    bpp: 32,
    has_alpha: true,
    opaque: Some(XRGB2101010),
};

static XRGB2101010: &Format = &Format {
    name: "xrgb2101010",
    drm: fourcc(b"XR30"),
    bpp: 32,
    has_alpha: false,
    opaque: None,
};

static ABGR2101010: &Format = &Format {
    name: "abgr2101010",
    drm: fourcc(b"AB30"),
    bpp: 32,
    has_alpha: true,
    opaque: Some(XBGR2101010),
};

static XBGR2101010: &Format = &Format {
    name: "xbgr2101010",
    drm: fourcc(b"XB30"),
    bpp: 32,
    has_alpha: false,
    opaque: None,
};

static ABGR16161616F: &Format = &Format {
    name: "abgr16161616f",
    drm: fourcc(b"AB4H"),
    bpp: 64,
    has_alpha: true,
    opaque: Some(XBGR16161616F),
};

static XBGR16161616F: &Format = &Format {
    name: "xbgr16161616f",
    drm: fourcc(b"XB4H"),
    bpp: 64,
    has_alpha: false,
    opaque: None,
};

static FORMATS: &[&Format] = &[
    ARGB8888,
    XRGB8888,
    ABGR8888,
    XBGR8888,
    RGB565,
    ARGB2101010,
    XRGB2101010,
    ABGR2101010,
    XBGR2101010,
    ABGR16161616F,
    XBGR16161616F,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_codes() {
        assert_eq!(XRGB8888.drm, 0x34325258);
        assert_eq!(ARGB8888.drm, 0x34325241);
    }

    #[test]
    fn map_lookup() {
        assert_eq!(formats().get(&XRGB8888.drm).unwrap().name, "xrgb8888");
        assert!(formats().get(&0).is_none());
    }

    #[test]
    fn debug_unknown_fourcc() {
        assert_eq!(format!("{:?}", debug(fourcc(b"NV12"))), "NV12");
        assert_eq!(format!("{:?}", debug(3)), "0x00000003");
    }
}
