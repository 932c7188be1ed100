pub mod bitflags;
pub mod clonecell;
pub mod copyhashmap;
pub mod errorfmt;
pub mod nonblock;
pub mod numcell;
pub mod oserror;
pub mod ptr_ext;
pub mod signal;
pub mod stack;
pub mod syncqueue;

cfg_if::cfg_if! {
    if #[cfg(target_env = "musl")] {
        pub type IoctlNumber = uapi::c::c_int;
    } else {
        pub type IoctlNumber = uapi::c::c_ulong;
    }
}
