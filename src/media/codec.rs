// SPDX-License-Identifier: GPL-3.0-only

//! Codec metadata for camera pixel encodings

use std::fmt;

/// Pixel encodings a capture device may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    // ===== Compressed formats =====
    /// Motion JPEG - Frame-by-frame JPEG compression
    MJPEG,
    /// H.264/AVC - Interframe compression
    H264,

    // ===== Packed YUV 4:2:2 formats =====
    /// YUY2 4:2:2 - Packed YUV (Y0 U Y1 V), also known as YUYV
    YUY2,
    /// UYVY 4:2:2 - Packed YUV (U Y0 V Y1)
    UYVY,
    /// YVYU 4:2:2 - Packed YUV (Y0 V Y1 U)
    YVYU,

    // ===== Planar/Semi-planar YUV 4:2:0 formats =====
    /// NV12 4:2:0 - Semi-planar YUV (Y plane + interleaved UV)
    NV12,
    /// I420 4:2:0 - Planar YUV (Y + U + V planes)
    I420,
    /// YV12 4:2:0 - Planar YUV (Y + V + U planes)
    YV12,

    // ===== RGB formats =====
    RGB24,
    BGR24,
    RGB32,
    BGR32,

    /// GREY/Y8 - 8-bit grayscale
    GREY,

    /// Unknown/unsupported codec
    Unknown,
}

impl Codec {
    /// Parse codec from FourCC string
    pub fn from_fourcc(fourcc: &str) -> Self {
        match fourcc.trim().to_uppercase().as_str() {
            "MJPG" | "JPEG" => Self::MJPEG,
            "H264" | "AVC1" => Self::H264,

            "YUY2" | "YUYV" => Self::YUY2,
            "UYVY" => Self::UYVY,
            "YVYU" => Self::YVYU,

            "NV12" => Self::NV12,
            "I420" | "IYUV" => Self::I420,
            "YV12" => Self::YV12,

            // V4L2 and GStreamer naming both show up here
            "RGB" | "RGB3" | "RGB24" => Self::RGB24,
            "BGR" | "BGR3" | "BGR24" => Self::BGR24,
            "RGBA" | "RGBX" | "RGB4" | "RGB32" => Self::RGB32,
            "BGRA" | "BGRX" | "BGR4" | "BGR32" => Self::BGR32,

            "GREY" | "GRAY8" | "Y8" | "Y800" => Self::GREY,

            _ => Self::Unknown,
        }
    }

    /// Canonical FourCC for this codec
    pub fn fourcc(&self) -> &'static str {
        match self {
            Self::MJPEG => "MJPG",
            Self::H264 => "H264",
            Self::YUY2 => "YUY2",
            Self::UYVY => "UYVY",
            Self::YVYU => "YVYU",
            Self::NV12 => "NV12",
            Self::I420 => "I420",
            Self::YV12 => "YV12",
            Self::RGB24 => "RGB3",
            Self::BGR24 => "BGR3",
            Self::RGB32 => "RGB4",
            Self::BGR32 => "BGR4",
            Self::GREY => "GREY",
            Self::Unknown => "UNKN",
        }
    }

    /// GStreamer `video/x-raw` format string, for raw codecs only
    pub fn gst_video_format(&self) -> Option<&'static str> {
        match self {
            Self::YUY2 => Some("YUY2"),
            Self::UYVY => Some("UYVY"),
            Self::YVYU => Some("YVYU"),
            Self::NV12 => Some("NV12"),
            Self::I420 => Some("I420"),
            Self::YV12 => Some("YV12"),
            Self::RGB24 => Some("RGB"),
            Self::BGR24 => Some("BGR"),
            Self::RGB32 => Some("RGBx"),
            Self::BGR32 => Some("BGRx"),
            Self::GREY => Some("GRAY8"),
            Self::MJPEG | Self::H264 | Self::Unknown => None,
        }
    }

    /// Check if this is a raw/uncompressed format
    pub fn is_raw(&self) -> bool {
        self.gst_video_format().is_some()
    }

    /// Check if samples arrive compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::MJPEG | Self::H264)
    }

    /// File extension used when a frame is written out as-is
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::MJPEG => "jpg",
            Self::H264 => "h264",
            _ => "raw",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}
