use {
    std::{
        error::Error,
        ffi::CStr,
        fmt::{Display, Formatter},
    },
    uapi::{
        c::{self, c_int},
        Errno,
    },
};

#[derive(Debug, Eq, PartialEq)]
pub struct OsError(pub c::c_int);

impl From<Errno> for OsError {
    fn from(e: Errno) -> Self {
        Self(e.0)
    }
}

impl From<c_int> for OsError {
    fn from(v: c_int) -> Self {
        Self(v)
    }
}

impl Default for OsError {
    fn default() -> Self {
        Errno::default().into()
    }
}

impl Error for OsError {}

impl Display for OsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // strerror is fine here, the crate is single threaded.
        let msg = unsafe {
            let msg = c::strerror(self.0);
            if msg.is_null() {
                "unknown error"
            } else {
                CStr::from_ptr(msg).to_str().unwrap_or("unknown error")
            }
        };
        write!(f, "{} (os error {})", msg, self.0)
    }
}
