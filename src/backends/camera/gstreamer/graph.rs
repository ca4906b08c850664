// SPDX-License-Identifier: GPL-3.0-only

//! Owned graph resources and their release
//!
//! Each handle undoes exactly one acquisition when dropped.

use crate::backends::camera::types::{RawCapability, StreamFormat};
use crate::errors::{PlatformError, PlatformResult};
use crate::media::Codec;
use ::gstreamer as gst;
use gst::prelude::*;
use gstreamer_video::{VideoCapsBuilder, VideoFormat};
use std::ops::Range;
use tracing::debug;

/// The capture pipeline; its bus is the control interface
pub struct GstGraph {
    pub(super) pipeline: gst::Pipeline,
}

impl GstGraph {
    /// First error posted on the bus, translated. Negotiation failures are
    /// kept distinct so they surface as connect errors.
    pub(super) fn take_bus_error(&self) -> Option<PlatformError> {
        let bus = self.pipeline.bus()?;
        let message = bus.pop_filtered(&[gst::MessageType::Error])?;
        let gst::MessageView::Error(err) = message.view() else {
            return None;
        };

        let error = err.error();
        let debug_text = err.debug().map(|d| d.to_string()).unwrap_or_default();
        if error.matches(gst::StreamError::NotNegotiated) || debug_text.contains("not-negotiated")
        {
            Some(PlatformError::NotNegotiated(error.to_string()))
        } else {
            Some(PlatformError::Failed(format!("{} ({})", error, debug_text)))
        }
    }
}

impl Drop for GstGraph {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

/// A bound device together with its source element
pub struct GstDevice {
    pub(super) element: gst::Element,
    pub(super) caps: Option<gst::Caps>,
    pub(super) capabilities: Vec<RawCapability>,
}

impl Drop for GstDevice {
    fn drop(&mut self) {
        let _ = self.element.set_state(gst::State::Null);
    }
}

/// Grabber (capsfilter) or terminator (fakesink)
pub struct GstNode {
    pub(super) element: gst::Element,
}

/// Membership of an element in the pipeline
pub struct GstAttachment {
    pub(super) pipeline: gst::Pipeline,
    pub(super) element: gst::Element,
}

impl Drop for GstAttachment {
    fn drop(&mut self) {
        let _ = self.element.set_state(gst::State::Null);
        if let Err(e) = self.pipeline.remove(&self.element) {
            debug!(element = %self.element.name(), error = %e, "Element already removed");
        }
    }
}

/// A link between two elements
pub struct GstLink {
    pub(super) src: gst::Element,
    pub(super) sink: gst::Element,
}

impl Drop for GstLink {
    fn drop(&mut self) {
        self.src.unlink(&self.sink);
    }
}

/// An installed buffer probe
pub struct GstRegistration {
    pub(super) pad: gst::Pad,
    pub(super) probe: Option<gst::PadProbeId>,
}

impl Drop for GstRegistration {
    fn drop(&mut self) {
        if let Some(probe) = self.probe.take() {
            self.pad.remove_probe(probe);
        }
    }
}

/// Caps a grabber accepts for this format
pub(super) fn caps_for_format(format: &StreamFormat) -> PlatformResult<gst::Caps> {
    let codec = format.codec();
    let builder = match codec {
        Codec::MJPEG => VideoCapsBuilder::for_encoding("image/jpeg"),
        Codec::H264 => VideoCapsBuilder::for_encoding("video/x-h264"),
        _ => {
            let video_format = codec
                .gst_video_format()
                .map(VideoFormat::from_string)
                .filter(|f| *f != VideoFormat::Unknown)
                .ok_or_else(|| {
                    PlatformError::failed(format!(
                        "encoding {} has no GStreamer equivalent",
                        format.encoding
                    ))
                })?;
            VideoCapsBuilder::new().format(video_format)
        }
    };

    let width = i32::try_from(format.width)
        .map_err(|_| PlatformError::failed(format!("width {} out of range", format.width)))?;
    let height = i32::try_from(format.height)
        .map_err(|_| PlatformError::failed(format!("height {} out of range", format.height)))?;
    let mut builder = builder.width(width).height(height);
    if format.fps > 0 {
        builder = builder.framerate_range(framerate_range(format.fps)?);
    }

    Ok(builder.build())
}

/// Every rate that truncates to `fps`, so 15/2 and 30000/1001 match 7 and 29
fn framerate_range(fps: u32) -> PlatformResult<Range<gst::Fraction>> {
    let low = i32::try_from(fps)
        .ok()
        .filter(|n| *n < i32::MAX)
        .ok_or_else(|| PlatformError::failed(format!("fps {} out of range", fps)))?;
    Ok(gst::Fraction::new(low, 1)..gst::Fraction::new(low + 1, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::FourCc;

    #[test]
    fn test_mjpg_caps() {
        gst::init().unwrap();
        let caps = caps_for_format(&StreamFormat::new(1280, 720, 30, FourCc::MJPG)).unwrap();
        let s = caps.structure(0).unwrap();
        assert_eq!(s.name().as_str(), "image/jpeg");
        assert_eq!(s.get::<i32>("width").unwrap(), 1280);
        let range = s.get::<gst::FractionRange>("framerate").unwrap();
        assert_eq!(range.min(), gst::Fraction::new(30, 1));
        assert!(range.max() < gst::Fraction::new(31, 1));
    }

    #[test]
    fn test_raw_caps_carry_format() {
        gst::init().unwrap();
        let caps = caps_for_format(&StreamFormat::new(640, 480, 15, FourCc::YUY2)).unwrap();
        let s = caps.structure(0).unwrap();
        assert_eq!(s.name().as_str(), "video/x-raw");
        assert_eq!(s.get::<String>("format").unwrap(), "YUY2");
    }

    #[test]
    fn test_fps_out_of_range_is_rejected() {
        gst::init().unwrap();
        let format = StreamFormat::new(640, 480, u32::MAX, FourCc::MJPG);
        assert!(caps_for_format(&format).is_err());
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        gst::init().unwrap();
        let format = StreamFormat::new(640, 480, 30, FourCc::parse("ZZZZ").unwrap());
        assert!(caps_for_format(&format).is_err());
    }
}
