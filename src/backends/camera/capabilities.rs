// SPDX-License-Identifier: GPL-3.0-only

//! Capability resolver and format matching

use super::CapturePlatform;
use super::directory::find_moniker;
use super::types::{FourCc, StreamFormat};
use crate::config::FormatPolicy;
use crate::errors::{CaptureError, CaptureResult, ErrorKind};
use tracing::{debug, warn};

/// Read the stream formats of the device with this identity.
///
/// The device is looked up again on every call. Entries that are not video
/// or carry no format block are skipped silently, as are entries that fail
/// to read. Failing to get the entry count fails the call. The result keeps
/// query order and duplicates.
pub fn resolve_formats<P: CapturePlatform>(
    platform: &P,
    identity: &str,
) -> CaptureResult<Vec<StreamFormat>> {
    let moniker = find_moniker(platform, identity)?;
    let device = platform
        .bind(&moniker)
        .map_err(|e| e.at(ErrorKind::CapabilityQuery))?;
    read_formats(platform, &device)
}

/// Read every accepted capability entry of an already bound device
pub(crate) fn read_formats<P: CapturePlatform>(
    platform: &P,
    device: &P::Device,
) -> CaptureResult<Vec<StreamFormat>> {
    let count = platform
        .capability_count(device)
        .map_err(|e| e.at(ErrorKind::CapabilityQuery))?;

    let mut formats = Vec::with_capacity(count);
    for index in 0..count {
        let raw = match platform.capability(device, index) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(index, error = %e, "Skipping unreadable capability entry");
                continue;
            }
        };
        match raw.stream_format() {
            Some(format) => formats.push(format),
            None => debug!(index, media = ?raw.media, "Skipping non-video capability entry"),
        }
    }

    debug!(count, accepted = formats.len(), "Capability query complete");
    Ok(formats)
}

/// Decide which format to hand to the pipeline builder.
///
/// An auto request (any zero field) picks the listed format most similar to
/// `default_format`. A concrete request must be listed under
/// [`FormatPolicy::Strict`] and passes through untouched under
/// [`FormatPolicy::AllowUnlisted`].
pub fn select_format(
    formats: &[StreamFormat],
    request: &StreamFormat,
    policy: FormatPolicy,
    default_format: &StreamFormat,
) -> CaptureResult<StreamFormat> {
    if request.is_auto() {
        return most_similar(formats, default_format).ok_or_else(|| {
            CaptureError::new(
                ErrorKind::NoMatchingFormat,
                "device lists no stream formats",
            )
        });
    }

    match policy {
        FormatPolicy::AllowUnlisted => Ok(*request),
        FormatPolicy::Strict => formats
            .iter()
            .find(|f| f.is_compatible(request))
            .map(|_| *request)
            .ok_or_else(|| {
                CaptureError::new(
                    ErrorKind::NoMatchingFormat,
                    format!("{} is not in the device's format list", request),
                )
            }),
    }
}

/// Pick the listed format closest to `target`.
///
/// A device with a single format always gets that format. Otherwise an exact
/// match wins, then formats grouped by encoding (target encoding first):
/// same resolution (first listed), else the smallest resolution larger than
/// the target (highest rate), else the largest smaller one (highest rate).
pub fn most_similar(formats: &[StreamFormat], target: &StreamFormat) -> Option<StreamFormat> {
    if let [only] = formats {
        return Some(*only);
    }
    if let Some(exact) = formats.iter().find(|f| f.is_compatible(target)) {
        return Some(*exact);
    }

    let mut encodings: Vec<FourCc> = Vec::new();
    if formats.iter().any(|f| f.encoding.is_equivalent(&target.encoding)) {
        encodings.push(target.encoding);
    }
    for format in formats {
        if !encodings.iter().any(|e| e.is_equivalent(&format.encoding)) {
            encodings.push(format.encoding);
        }
    }

    encodings.iter().find_map(|encoding| {
        let group: Vec<&StreamFormat> = formats
            .iter()
            .filter(|f| f.encoding.is_equivalent(encoding))
            .collect();
        closest_in_group(&group, target)
    })
}

fn closest_in_group(group: &[&StreamFormat], target: &StreamFormat) -> Option<StreamFormat> {
    if let Some(same) = group
        .iter()
        .find(|f| f.width == target.width && f.height == target.height)
    {
        return Some(**same);
    }

    let larger = group
        .iter()
        .filter(|f| f.width > target.width && f.height > target.height)
        .min_by(|a, b| {
            (a.width, a.height)
                .cmp(&(b.width, b.height))
                .then(b.fps.cmp(&a.fps))
        });
    if let Some(format) = larger {
        return Some(**format);
    }

    group
        .iter()
        .max_by(|a, b| a.pixel_count().cmp(&b.pixel_count()).then(a.fps.cmp(&b.fps)))
        .map(|f| **f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, fps: u32, code: &str) -> StreamFormat {
        StreamFormat::new(width, height, fps, FourCc::parse(code).unwrap())
    }

    fn target() -> StreamFormat {
        fmt(1280, 720, 60, "MJPG")
    }

    #[test]
    fn test_single_format_always_wins() {
        let formats = [fmt(320, 240, 15, "YUY2")];
        assert_eq!(most_similar(&formats, &target()), Some(formats[0]));
    }

    #[test]
    fn test_same_resolution_other_rate() {
        let formats = [
            fmt(640, 480, 30, "MJPG"),
            fmt(1280, 720, 30, "MJPG"),
            fmt(1280, 720, 15, "MJPG"),
        ];
        assert_eq!(most_similar(&formats, &target()), Some(fmt(1280, 720, 30, "MJPG")));
    }

    #[test]
    fn test_smallest_larger_resolution_with_highest_rate() {
        let formats = [
            fmt(640, 480, 30, "MJPG"),
            fmt(3840, 2160, 30, "MJPG"),
            fmt(1920, 1080, 15, "MJPG"),
            fmt(1920, 1080, 30, "MJPG"),
        ];
        assert_eq!(most_similar(&formats, &target()), Some(fmt(1920, 1080, 30, "MJPG")));
    }

    #[test]
    fn test_largest_smaller_resolution() {
        let formats = [
            fmt(320, 240, 30, "MJPG"),
            fmt(640, 480, 15, "MJPG"),
            fmt(640, 480, 30, "MJPG"),
        ];
        assert_eq!(most_similar(&formats, &target()), Some(fmt(640, 480, 30, "MJPG")));
    }

    #[test]
    fn test_target_encoding_preferred_over_better_resolution() {
        let formats = [fmt(1280, 720, 60, "YUY2"), fmt(640, 480, 30, "MJPG")];
        assert_eq!(most_similar(&formats, &target()), Some(fmt(640, 480, 30, "MJPG")));
    }

    #[test]
    fn test_falls_back_to_other_encoding() {
        let formats = [fmt(640, 480, 30, "YUY2"), fmt(1280, 720, 10, "NV12")];
        assert_eq!(most_similar(&formats, &target()), Some(fmt(640, 480, 30, "YUY2")));
    }

    #[test]
    fn test_empty_list_has_no_match() {
        assert_eq!(most_similar(&[], &target()), None);
        let err = select_format(&[], &fmt(0, 0, 0, "MJPG"), FormatPolicy::Strict, &target())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoMatchingFormat);
    }

    #[test]
    fn test_strict_policy_rejects_unlisted() {
        let formats = [fmt(640, 480, 30, "YUY2")];
        let request = fmt(1280, 720, 30, "MJPG");
        let err = select_format(&formats, &request, FormatPolicy::Strict, &target()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoMatchingFormat);

        let chosen =
            select_format(&formats, &request, FormatPolicy::AllowUnlisted, &target()).unwrap();
        assert_eq!(chosen, request);
    }

    #[test]
    fn test_strict_policy_accepts_alias() {
        let formats = [fmt(640, 480, 30, "YUYV")];
        let request = fmt(640, 480, 30, "YUY2");
        let chosen = select_format(&formats, &request, FormatPolicy::Strict, &target()).unwrap();
        assert_eq!(chosen, request);
    }

    #[test]
    fn test_auto_request_uses_default_target() {
        let formats = [fmt(640, 480, 30, "MJPG"), fmt(1280, 720, 30, "MJPG")];
        let chosen =
            select_format(&formats, &fmt(0, 0, 0, "MJPG"), FormatPolicy::Strict, &target())
                .unwrap();
        assert_eq!(chosen, fmt(1280, 720, 30, "MJPG"));
    }
}
