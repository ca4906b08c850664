// SPDX-License-Identifier: GPL-3.0-only

//! Device discovery and caps expansion
//!
//! Devices come from a `Video/Source` device monitor. Each caps structure is
//! expanded into one capability entry per (encoding, framerate) pair, so a
//! device's list reads like the flat table a hardware driver reports.

use crate::backends::camera::types::{FourCc, Framerate, MediaKind, RawCapability, VideoHeader};
use crate::constants::gst_names;
use crate::errors::{PlatformError, PlatformResult};
use crate::media::Codec;
use ::gstreamer as gst;
use gst::prelude::*;
use tracing::debug;

/// Property keys tried, in order, for a device's identity
const IDENTITY_KEYS: [&str; 4] = ["device.path", "api.v4l2.path", "object.path", "node.name"];

/// Property keys tried, in order, for a device's location
const LOCATION_KEYS: [&str; 4] = [
    "device.bus_path",
    "v4l2.device.bus_info",
    "api.v4l2.cap.bus_info",
    "sysfs.path",
];

/// Snapshot the devices currently offered by the video source providers
pub(super) fn monitor_devices() -> PlatformResult<Vec<gst::Device>> {
    let monitor = gst::DeviceMonitor::new();
    monitor.add_filter(Some(gst_names::VIDEO_SOURCE_CLASS), None);

    monitor
        .start()
        .map_err(|e| PlatformError::failed(format!("failed to start device monitor: {}", e)))?;
    let devices: Vec<gst::Device> = monitor.devices().into_iter().collect();
    monitor.stop();

    debug!(count = devices.len(), "Device monitor snapshot");
    Ok(devices)
}

fn string_property(device: &gst::Device, keys: &[&str]) -> Option<String> {
    let props = device.properties()?;
    keys.iter()
        .find_map(|key| props.get::<String>(*key).ok())
        .filter(|value| !value.is_empty())
}

pub(super) fn identity_of(device: &gst::Device) -> Option<String> {
    string_property(device, &IDENTITY_KEYS)
}

pub(super) fn location_of(device: &gst::Device) -> Option<String> {
    string_property(device, &LOCATION_KEYS)
}

pub(super) fn friendly_name_of(device: &gst::Device) -> Option<String> {
    let name = device.display_name();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Expand a device's caps into capability entries, in caps order
pub(super) fn capability_entries(device: &gst::Device) -> Vec<RawCapability> {
    let Some(caps) = device.caps() else {
        return Vec::new();
    };
    caps.iter().flat_map(structure_entries).collect()
}

fn structure_entries(s: &gst::StructureRef) -> Vec<RawCapability> {
    let encodings: Vec<FourCc> = match s.name().as_str() {
        "image/jpeg" => vec![FourCc::MJPG],
        "video/x-h264" => vec![FourCc::H264],
        "video/x-raw" => string_values(s, "format")
            .iter()
            .filter_map(|name| fourcc_for_gst_format(name))
            .collect(),
        _ => {
            return vec![RawCapability {
                media: MediaKind::Other,
                header: None,
            }];
        }
    };

    // Ranged sizes carry no concrete format block
    let (Ok(width), Ok(height)) = (s.get::<i32>("width"), s.get::<i32>("height")) else {
        return vec![RawCapability {
            media: MediaKind::Video,
            header: None,
        }];
    };

    let rates = frame_rates(s);
    let mut entries = Vec::with_capacity(encodings.len() * rates.len());
    for encoding in &encodings {
        for rate in &rates {
            entries.push(RawCapability {
                media: MediaKind::Video,
                header: Some(VideoHeader {
                    width,
                    height,
                    avg_time_per_frame: rate.frame_interval(),
                    compression: *encoding,
                }),
            });
        }
    }
    entries
}

fn string_values(s: &gst::StructureRef, field: &str) -> Vec<String> {
    if let Ok(value) = s.get::<String>(field) {
        return vec![value];
    }
    match s.get::<gst::List>(field) {
        Ok(list) => list
            .iter()
            .filter_map(|v| v.get::<String>().ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn frame_rates(s: &gst::StructureRef) -> Vec<Framerate> {
    let to_rate = |f: gst::Fraction| {
        Framerate::new(
            u32::try_from(f.numer()).unwrap_or(0),
            u32::try_from(f.denom()).unwrap_or(1),
        )
    };

    if let Ok(fraction) = s.get::<gst::Fraction>("framerate") {
        return vec![to_rate(fraction)];
    }
    if let Ok(list) = s.get::<gst::List>("framerate") {
        let rates: Vec<Framerate> = list
            .iter()
            .filter_map(|v| v.get::<gst::Fraction>().ok())
            .map(to_rate)
            .collect();
        if !rates.is_empty() {
            return rates;
        }
    }
    if let Ok(range) = s.get::<gst::FractionRange>("framerate") {
        return vec![to_rate(range.max())];
    }
    vec![Framerate::from_int(0)]
}

/// Map a GStreamer raw format name onto a fourcc
pub(super) fn fourcc_for_gst_format(name: &str) -> Option<FourCc> {
    match Codec::from_fourcc(name) {
        Codec::Unknown => FourCc::parse(name),
        codec => FourCc::parse(codec.fourcc()),
    }
}
