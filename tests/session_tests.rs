// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the session lifecycle on the virtual platform

use becam::backends::camera::{FrameBuffer, FrameSink, RunState};
use becam::backends::virtual_camera::{FailurePoint, ResourceKind, VirtualDevice, VirtualPlatform};
use becam::{CaptureSession, Config, ErrorKind, FormatPolicy, FourCc, StreamFormat};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Acquisition order of a complete open
const ACQUISITION_ORDER: [ResourceKind; 10] = [
    ResourceKind::Device,
    ResourceKind::Graph,
    ResourceKind::SourceMembership,
    ResourceKind::Grabber,
    ResourceKind::GrabberMembership,
    ResourceKind::Terminator,
    ResourceKind::TerminatorMembership,
    ResourceKind::SourceLink,
    ResourceKind::SinkLink,
    ResourceKind::Callback,
];

#[derive(Default)]
struct CountingSink {
    frames: AtomicUsize,
}

impl FrameSink for CountingSink {
    fn deliver(&self, frame: FrameBuffer<'_>) {
        assert!(!frame.is_empty());
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

fn listed_format() -> StreamFormat {
    StreamFormat::new(640, 480, 30, FourCc::YUY2)
}

fn platform() -> Arc<VirtualPlatform> {
    Arc::new(
        VirtualPlatform::new()
            .with_device(VirtualDevice::new("cam0").with_format(640, 480, 30, FourCc::YUY2))
            .with_frame_interval(Duration::from_millis(2)),
    )
}

/// Skips capability resolution so the ledger only sees graph construction
fn unlisted_config() -> Config {
    Config {
        format_policy: FormatPolicy::AllowUnlisted,
        ..Config::default()
    }
}

#[test]
fn test_open_close_reaches_running_and_back() {
    let platform = platform();
    let mut session = CaptureSession::new(Arc::clone(&platform), &Config::default());
    assert_eq!(session.state(), RunState::Closed);

    let format = session
        .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
        .unwrap();
    assert_eq!(format, listed_format());
    assert_eq!(session.state(), RunState::Running);
    assert_eq!(session.selected_device(), Some("cam0"));
    assert_eq!(session.requested_format(), Some(&listed_format()));

    session.close().unwrap();
    assert_eq!(session.state(), RunState::Closed);
    assert_eq!(session.selected_device(), None);
    assert_eq!(platform.ledger().outstanding(), 0);
}

#[test]
fn test_close_releases_in_reverse_acquisition_order() {
    let platform = platform();
    let mut session = CaptureSession::new(Arc::clone(&platform), &unlisted_config());
    session
        .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
        .unwrap();
    assert_eq!(platform.ledger().acquired(), ACQUISITION_ORDER.to_vec());

    session.close().unwrap();
    let mut expected = ACQUISITION_ORDER.to_vec();
    expected.reverse();
    assert_eq!(platform.ledger().released(), expected);
}

#[test]
fn test_close_is_idempotent() {
    let platform = platform();
    let mut session = CaptureSession::new(Arc::clone(&platform), &Config::default());

    // Closing a never-opened session succeeds
    session.close().unwrap();

    session
        .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
        .unwrap();
    session.close().unwrap();
    let released = platform.ledger().released().len();

    session.close().unwrap();
    assert_eq!(session.state(), RunState::Closed);
    assert_eq!(platform.ledger().released().len(), released);
}

#[test]
fn test_second_open_is_rejected() {
    let platform = platform();
    let mut session = CaptureSession::new(Arc::clone(&platform), &Config::default());
    session
        .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
        .unwrap();
    let outstanding = platform.ledger().outstanding();

    let err = session
        .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceAlreadyOpen);
    assert_eq!(session.state(), RunState::Running);
    assert_eq!(platform.ledger().outstanding(), outstanding);
}

#[test]
fn test_empty_identity_is_invalid() {
    let platform = platform();
    let mut session = CaptureSession::new(Arc::clone(&platform), &Config::default());
    let err = session
        .open("", &listed_format(), Arc::new(CountingSink::default()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParam);
    assert!(platform.ledger().events().is_empty());
}

#[test]
fn test_repeated_open_close_leaks_nothing() {
    let platform = platform();
    let mut session = CaptureSession::new(Arc::clone(&platform), &Config::default());

    for _ in 0..25 {
        session
            .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
            .unwrap();
        session.close().unwrap();
        assert_eq!(platform.ledger().outstanding(), 0);
    }
    for kind in ACQUISITION_ORDER {
        assert_eq!(platform.ledger().outstanding_of(kind), 0, "{:?}", kind);
    }
}

#[test]
fn test_drop_closes_session() {
    let platform = platform();
    let sink = Arc::new(CountingSink::default());
    {
        let mut session = CaptureSession::new(Arc::clone(&platform), &Config::default());
        session.open("cam0", &listed_format(), sink.clone()).unwrap();
    }
    assert_eq!(platform.ledger().outstanding(), 0);
    // The session no longer holds the sink
    assert_eq!(Arc::strong_count(&sink), 1);
}

#[test]
fn test_failure_at_each_step_rolls_back_completed_prefix() {
    let cases = [
        (FailurePoint::Bind, ErrorKind::Bind, 0),
        (FailurePoint::CreateGraph, ErrorKind::GraphBuilder, 1),
        (FailurePoint::AddSource, ErrorKind::AddFilter, 2),
        (FailurePoint::CreateGrabber, ErrorKind::GrabberCreate, 3),
        (FailurePoint::ConfigureGrabber, ErrorKind::SetFormat, 4),
        (FailurePoint::AddGrabber, ErrorKind::AddFilter, 4),
        (FailurePoint::CreateTerminator, ErrorKind::TerminatorCreate, 5),
        (FailurePoint::AddTerminator, ErrorKind::AddFilter, 6),
        (FailurePoint::ConnectSourceGrabber, ErrorKind::Connect, 7),
        (FailurePoint::ConnectGrabberTerminator, ErrorKind::Connect, 8),
        (FailurePoint::RegisterCallback, ErrorKind::Callback, 9),
        (FailurePoint::Run, ErrorKind::Run, 10),
    ];

    for (point, kind, completed) in cases {
        let platform = platform();
        platform.fail_at(point);
        let mut session = CaptureSession::new(Arc::clone(&platform), &unlisted_config());

        let err = session
            .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
            .unwrap_err();
        assert_eq!(err.kind(), kind, "{:?}", point);
        assert_eq!(session.state(), RunState::Closed, "{:?}", point);

        let prefix = &ACQUISITION_ORDER[..completed];
        assert_eq!(platform.ledger().acquired(), prefix.to_vec(), "{:?}", point);

        let mut expected = prefix.to_vec();
        expected.reverse();
        assert_eq!(platform.ledger().released(), expected, "{:?}", point);
        assert_eq!(platform.ledger().outstanding(), 0, "{:?}", point);

        // The session is usable again once the fault clears
        platform.clear_failure();
        session
            .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
            .unwrap();
        session.close().unwrap();
        assert_eq!(platform.ledger().outstanding(), 0, "{:?}", point);
    }
}

#[test]
fn test_unknown_device_acquires_nothing() {
    let platform = platform();
    let mut session = CaptureSession::new(Arc::clone(&platform), &unlisted_config());
    let err = session
        .open("cam9", &listed_format(), Arc::new(CountingSink::default()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
    assert!(platform.ledger().events().is_empty());
}

#[test]
fn test_enumeration_failure_during_open() {
    let platform = platform();
    platform.fail_at(FailurePoint::Enumerate);
    let mut session = CaptureSession::new(Arc::clone(&platform), &unlisted_config());
    let err = session
        .open("cam0", &listed_format(), Arc::new(CountingSink::default()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Enumeration);
    assert_eq!(session.state(), RunState::Closed);
}
