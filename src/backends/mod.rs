// SPDX-License-Identifier: MPL-2.0

//! Capture backends
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Capture core (camera)               │
//! │  directory · capabilities · pipeline ·      │
//! │  delivery · session · manager               │
//! └────────────────────┬────────────────────────┘
//!                      │ CapturePlatform
//!          ┌───────────┴───────────┐
//!  ┌───────┴────────┐     ┌────────┴───────┐
//!  │   GStreamer    │     │ Virtual camera │
//!  │ (desktop OS)   │     │ (scripted)     │
//!  └────────────────┘     └────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Capture core and the GStreamer platform
//! - [`virtual_camera`]: Scripted platform with failure injection

pub mod camera;
pub mod virtual_camera;
