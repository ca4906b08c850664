// SPDX-License-Identifier: GPL-3.0-only

//! Device directory
//!
//! Lists the capture devices attached right now. Nothing is cached: every
//! call re-reads the platform, so callers must re-resolve by identity.

use super::types::{DeviceDescriptor, DeviceProperty};
use super::{CapturePlatform, DeviceMoniker};
use crate::errors::{CaptureError, CaptureResult, ErrorKind};
use tracing::{debug, warn};

/// Enumerate attached capture devices in platform order.
///
/// An empty category is a successful empty list. Entries whose identity
/// cannot be resolved are skipped; missing name or location only leaves
/// that field empty.
pub fn list_devices<P: CapturePlatform>(platform: &P) -> CaptureResult<Vec<DeviceDescriptor>> {
    let monikers = platform
        .enumerate_video_inputs()
        .map_err(|e| e.at(ErrorKind::Enumeration))?;

    let mut devices = Vec::with_capacity(monikers.len());
    for (index, moniker) in monikers.iter().enumerate() {
        let Some(identity) = moniker.display_name() else {
            warn!(index, "Skipping video input without identity");
            continue;
        };

        let descriptor = DeviceDescriptor {
            identity,
            display_name: moniker.read_property(DeviceProperty::FriendlyName),
            location_info: moniker.read_property(DeviceProperty::LocationInfo),
        };
        debug!(
            identity = %descriptor.identity,
            name = ?descriptor.display_name,
            location = ?descriptor.location_info,
            "Found video input"
        );
        devices.push(descriptor);
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Re-enumerate and find the entry whose identity matches exactly
pub(crate) fn find_moniker<P: CapturePlatform>(
    platform: &P,
    identity: &str,
) -> CaptureResult<P::Moniker> {
    let monikers = platform
        .enumerate_video_inputs()
        .map_err(|e| e.at(ErrorKind::Enumeration))?;

    monikers
        .into_iter()
        .find(|m| m.display_name().as_deref() == Some(identity))
        .ok_or_else(|| {
            CaptureError::new(
                ErrorKind::DeviceNotFound,
                format!("no video input with identity '{}'", identity),
            )
        })
}
