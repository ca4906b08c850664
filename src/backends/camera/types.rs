// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera backends

use crate::constants::TICKS_PER_SECOND;
use crate::errors::{CaptureError, ErrorKind};
use crate::media::Codec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A capture device found during one enumeration pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Opaque identity, re-resolvable by later calls
    pub identity: String,
    /// Human-readable name, not guaranteed unique
    pub display_name: Option<String>,
    /// Topological location (bus path etc.)
    pub location_info: Option<String>,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{} ({})", name, self.identity),
            None => write!(f, "{}", self.identity),
        }
    }
}

/// Named device properties a backend can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    FriendlyName,
    LocationInfo,
}

/// Four-character code identifying sample packing
///
/// Stored as the four bytes in display order; the integer form is little-endian,
/// so `MJPG` is `0x47504A4D`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const MJPG: FourCc = FourCc(*b"MJPG");
    pub const YUY2: FourCc = FourCc(*b"YUY2");
    pub const NV12: FourCc = FourCc(*b"NV12");
    pub const H264: FourCc = FourCc(*b"H264");

    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Parse one to four ASCII characters, padding short codes with spaces
    pub fn parse(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 || !bytes.iter().all(|b| b.is_ascii_graphic()) {
            return None;
        }
        let mut code = [b' '; 4];
        code[..bytes.len()].copy_from_slice(bytes);
        Some(Self(code))
    }

    pub fn codec(&self) -> Codec {
        Codec::from_fourcc(&self.to_string())
    }

    /// Same code, or two known aliases of one codec (MJPG and JPEG, YUY2 and YUYV)
    pub fn is_equivalent(&self, other: &FourCc) -> bool {
        if self == other {
            return true;
        }
        let codec = self.codec();
        codec != Codec::Unknown && codec == other.codec()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: String = self
            .0
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        f.write_str(text.trim_end())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({:?}, {:#010x})", self.to_string(), self.to_u32())
    }
}

impl FromStr for FourCc {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FourCc::parse(s).ok_or_else(|| {
            CaptureError::new(ErrorKind::InvalidParam, format!("invalid fourcc '{}'", s))
        })
    }
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Convert a time-per-frame in 100 ns ticks. A zero or negative
    /// interval yields 0 fps.
    pub fn from_frame_interval(ticks: i64) -> Self {
        if ticks <= 0 {
            return Self::from_int(0);
        }
        let denom = u32::try_from(ticks).unwrap_or(u32::MAX);
        Self::new(TICKS_PER_SECOND as u32, denom)
    }

    /// Time-per-frame in 100 ns ticks (0 for 0 fps)
    pub fn frame_interval(&self) -> i64 {
        if self.num == 0 {
            return 0;
        }
        TICKS_PER_SECOND * i64::from(self.denom) / i64::from(self.num)
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Whole frames per second, truncated
    pub fn as_int(&self) -> u32 {
        self.num / self.denom
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show decimal for non-integer framerates (NTSC)
        if self.denom != 1 && self.num % self.denom != 0 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.as_int())
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// One supported stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub encoding: FourCc,
}

impl StreamFormat {
    pub fn new(width: u32, height: u32, fps: u32, encoding: FourCc) -> Self {
        Self {
            width,
            height,
            fps,
            encoding,
        }
    }

    /// Request that lets the library pick the format
    pub fn auto() -> Self {
        Self::new(0, 0, 0, FourCc::MJPG)
    }

    /// Build from a hardware header. Negative heights only signal row order.
    pub fn from_header(header: &VideoHeader) -> Self {
        Self {
            width: header.width.unsigned_abs(),
            height: header.height.unsigned_abs(),
            fps: Framerate::from_frame_interval(header.avg_time_per_frame).as_int(),
            encoding: header.compression,
        }
    }

    /// A request with any zero dimension or rate asks for automatic selection
    pub fn is_auto(&self) -> bool {
        self.width == 0 || self.height == 0 || self.fps == 0
    }

    /// Exact match on size and rate, alias-aware match on encoding
    pub fn is_compatible(&self, other: &StreamFormat) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.fps == other.fps
            && self.encoding.is_equivalent(&other.encoding)
    }

    pub fn framerate(&self) -> Framerate {
        Framerate::from_int(self.fps)
    }

    pub fn codec(&self) -> Codec {
        self.encoding.codec()
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {}fps {}",
            self.width, self.height, self.fps, self.encoding
        )
    }
}

/// Major type of a capability entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Other,
}

/// Video format block of a capability entry, as the hardware reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoHeader {
    pub width: i32,
    /// Negative values signal top-down row order
    pub height: i32,
    /// 100 ns ticks per frame
    pub avg_time_per_frame: i64,
    pub compression: FourCc,
}

/// One capability entry before filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCapability {
    pub media: MediaKind,
    /// Absent when the entry carries no usable format block
    pub header: Option<VideoHeader>,
}

impl RawCapability {
    pub fn video(width: i32, height: i32, fps: u32, compression: FourCc) -> Self {
        Self {
            media: MediaKind::Video,
            header: Some(VideoHeader {
                width,
                height,
                avg_time_per_frame: Framerate::from_int(fps).frame_interval(),
                compression,
            }),
        }
    }

    /// The stream format of an accepted entry
    pub fn stream_format(&self) -> Option<StreamFormat> {
        match (self.media, &self.header) {
            (MediaKind::Video, Some(header)) => Some(StreamFormat::from_header(header)),
            _ => None,
        }
    }
}

/// Borrowed frame bytes, valid only during one delivery call
#[derive(Debug, Clone, Copy)]
pub struct FrameBuffer<'a> {
    data: &'a [u8],
}

impl<'a> FrameBuffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Closed,
    Opening,
    Running,
    Closing,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Closed => write!(f, "closed"),
            RunState::Opening => write!(f, "opening"),
            RunState::Running => write!(f, "running"),
            RunState::Closing => write!(f, "closing"),
        }
    }
}

/// Role of a node added to the graph after the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Grabber,
    Terminator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_integer_is_little_endian() {
        assert_eq!(FourCc::MJPG.to_u32(), 0x47504A4D);
        assert_eq!(FourCc::from_u32(0x47504A4D), FourCc::MJPG);
    }

    #[test]
    fn test_fourcc_parse() {
        assert_eq!(FourCc::parse("MJPG"), Some(FourCc::MJPG));
        assert_eq!(FourCc::parse("Y8").unwrap().to_string(), "Y8");
        assert_eq!(FourCc::parse(""), None);
        assert_eq!(FourCc::parse("MJPEG"), None);
        assert!("ab c".parse::<FourCc>().is_err());
    }

    #[test]
    fn test_fourcc_aliases_are_equivalent() {
        let jpeg = FourCc::parse("JPEG").unwrap();
        let yuyv = FourCc::parse("YUYV").unwrap();
        assert!(FourCc::MJPG.is_equivalent(&jpeg));
        assert!(FourCc::YUY2.is_equivalent(&yuyv));
        assert!(!FourCc::MJPG.is_equivalent(&FourCc::YUY2));

        let a = FourCc::parse("ABCD").unwrap();
        let b = FourCc::parse("WXYZ").unwrap();
        assert!(a.is_equivalent(&a));
        assert!(!a.is_equivalent(&b));
    }

    #[test]
    fn test_frame_interval_conversion() {
        assert_eq!(Framerate::from_frame_interval(333_333).as_int(), 30);
        assert_eq!(Framerate::from_frame_interval(166_666).as_int(), 60);
        assert_eq!(Framerate::from_frame_interval(0).as_int(), 0);
        assert_eq!(Framerate::from_frame_interval(-5).as_int(), 0);
        assert_eq!(Framerate::from_int(30).frame_interval(), 333_333);
        assert_eq!(Framerate::from_int(0).frame_interval(), 0);
    }

    #[test]
    fn test_zero_denominator_guard() {
        let rate = Framerate::new(30, 0);
        assert_eq!(rate.denom, 1);
        assert_eq!(rate.as_int(), 30);
    }

    #[test]
    fn test_negative_height_is_normalized() {
        let header = VideoHeader {
            width: 640,
            height: -480,
            avg_time_per_frame: 333_333,
            compression: FourCc::YUY2,
        };
        let format = StreamFormat::from_header(&header);
        assert_eq!(format.height, 480);
        assert_eq!(format.fps, 30);
    }

    #[test]
    fn test_entries_without_header_are_rejected() {
        let no_header = RawCapability {
            media: MediaKind::Video,
            header: None,
        };
        let audio = RawCapability {
            media: MediaKind::Other,
            header: RawCapability::video(640, 480, 30, FourCc::YUY2).header,
        };
        assert_eq!(no_header.stream_format(), None);
        assert_eq!(audio.stream_format(), None);
        assert!(
            RawCapability::video(640, 480, 30, FourCc::YUY2)
                .stream_format()
                .is_some()
        );
    }

    #[test]
    fn test_auto_and_compatible() {
        let listed = StreamFormat::new(1280, 720, 30, FourCc::MJPG);
        let jpeg = StreamFormat::new(1280, 720, 30, FourCc::parse("JPEG").unwrap());
        assert!(listed.is_compatible(&jpeg));
        assert!(!listed.is_compatible(&StreamFormat::new(1280, 720, 60, FourCc::MJPG)));
        assert!(StreamFormat::new(0, 720, 30, FourCc::MJPG).is_auto());
        assert!(!listed.is_auto());
    }
}
