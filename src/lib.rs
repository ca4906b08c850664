// SPDX-License-Identifier: MPL-2.0

//! becam - camera capture behind a flat C ABI
//!
//! Enumerates video capture devices, reads their stream formats, opens one
//! at a chosen format and hands out frames, either pushed to a host callback
//! or pulled on demand.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Capture core and platform backends
//! - [`media`]: Pixel encoding metadata
//! - [`ffi`]: Exported C functions and fixed-layout types
//! - [`config`]: Configuration loaded from `BECAM_CONFIG`
//! - [`errors`]: Error taxonomy shared by every backend
//!
//! # Example
//!
//! ```no_run
//! use becam::{CaptureManager, Config, StreamFormat};
//! use becam::backends::camera::gstreamer::GstPlatform;
//!
//! let config = Config::load();
//! let manager = CaptureManager::new(GstPlatform::new(&config)?, config);
//! let device = manager.list_devices()?.remove(0);
//! manager.open_device(&device.identity, &StreamFormat::auto(), None)?;
//! let frame = manager.get_frame()?;
//! println!("{} bytes", frame.data.len());
//! manager.close_device()?;
//! # Ok::<(), becam::CaptureError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod ffi;
pub mod logging;
pub mod media;

// Re-export commonly used types
pub use backends::camera::{
    CaptureManager, CaptureSession, DeviceDescriptor, FourCc, Frame, StreamFormat,
};
pub use config::{Config, FormatPolicy};
pub use errors::{CaptureError, CaptureResult, ErrorKind};
