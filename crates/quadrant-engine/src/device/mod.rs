//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring the Surface (swapchain)
//! - acquiring frames and presenting them
//! - mapping presentation failures to [`PresentError`]

mod error;
mod frame;
mod gpu;
mod init;
mod surface;

pub use error::PresentError;
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
