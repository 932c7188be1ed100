//! A display backend library for wayland compositors.
//!
//! The crate enumerates GPUs, tracks their display pipelines, imports client
//! buffers as scanout framebuffers, and drives mode-setting and page-flip
//! commits. The consumer supplies a [`session::Session`], polls
//! [`backends::kms::KmsBackend::poll_fd`], and reacts to output events.

#[macro_use]
mod macros;

pub mod backend;
pub mod backends;
pub mod format;
pub mod session;
pub mod udev;
mod utils;
pub mod video;

pub use crate::{
    backend::{Allocator, Buffer, OutputMode, OutputState, PresentEvent, Swapchain},
    backends::kms::{KmsBackend, KmsError},
    utils::{errorfmt::ErrorFmt, signal::Signal},
    video::dmabuf::{DmaBuf, DmaBufIds, DmaBufPlane},
};
