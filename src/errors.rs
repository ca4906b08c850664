// SPDX-License-Identifier: GPL-3.0-only

//! Error types for capture operations
//!
//! Every backend failure is translated at its call site into one [`ErrorKind`]
//! plus free-text detail. The kind carries a static description that lives for
//! the whole process, so it can be handed across the C boundary as a plain
//! pointer without allocation.

use std::ffi::CStr;
use std::fmt;
use thiserror::Error;

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type alias for backend calls, before translation
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Closed set of failure causes reported by the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Identity no longer present during bind/resolve
    DeviceNotFound,
    /// The video-input category could not be enumerated
    Enumeration,
    /// Capability count could not be read
    CapabilityQuery,
    /// Device was found but could not be bound to a source
    Bind,
    /// Graph container or its control interface could not be created
    GraphBuilder,
    /// A node could not be inserted into the graph
    AddFilter,
    /// The grabber node could not be created
    GrabberCreate,
    /// The grabber rejected the requested stream format
    SetFormat,
    /// The terminating sink could not be created
    TerminatorCreate,
    /// Two endpoints could not be connected (usually an unsupported format)
    Connect,
    /// The frame callback could not be installed on the grabber
    Callback,
    /// The graph could not be started
    Run,
    /// No listed stream format matches the request
    NoMatchingFormat,
    /// Operation requires an open device
    DeviceNotOpen,
    /// A device is already open on this session
    DeviceAlreadyOpen,
    /// Caller passed an invalid argument
    InvalidParam,
    /// Caller passed a null handle
    HandleEmpty,
    /// No frame has been delivered yet
    FrameEmpty,
    /// No new frame arrived since the last one was read
    FrameNotUpdated,
    /// Unexpected internal failure (e.g. a panic caught at the boundary)
    Internal,
}

impl ErrorKind {
    /// All kinds, in status-code order
    pub const ALL: [ErrorKind; 20] = [
        ErrorKind::DeviceNotFound,
        ErrorKind::Enumeration,
        ErrorKind::CapabilityQuery,
        ErrorKind::Bind,
        ErrorKind::GraphBuilder,
        ErrorKind::AddFilter,
        ErrorKind::GrabberCreate,
        ErrorKind::SetFormat,
        ErrorKind::TerminatorCreate,
        ErrorKind::Connect,
        ErrorKind::Callback,
        ErrorKind::Run,
        ErrorKind::NoMatchingFormat,
        ErrorKind::DeviceNotOpen,
        ErrorKind::DeviceAlreadyOpen,
        ErrorKind::InvalidParam,
        ErrorKind::HandleEmpty,
        ErrorKind::FrameEmpty,
        ErrorKind::FrameNotUpdated,
        ErrorKind::Internal,
    ];

    /// Stable human-readable description with static lifetime
    pub fn description(&self) -> &'static CStr {
        match self {
            ErrorKind::DeviceNotFound => c"device not found",
            ErrorKind::Enumeration => c"failed to enum device",
            ErrorKind::CapabilityQuery => c"failed to get stream capabilities",
            ErrorKind::Bind => c"failed to bind device",
            ErrorKind::GraphBuilder => c"failed to build graph",
            ErrorKind::AddFilter => c"failed to add filter",
            ErrorKind::GrabberCreate => c"failed to create grabber",
            ErrorKind::SetFormat => c"failed to set media type",
            ErrorKind::TerminatorCreate => c"failed to create graph terminator",
            ErrorKind::Connect => c"failed to connect filters",
            ErrorKind::Callback => c"failed to register frame callback",
            ErrorKind::Run => c"failed to run graph",
            ErrorKind::NoMatchingFormat => c"no matching stream format",
            ErrorKind::DeviceNotOpen => c"device not open",
            ErrorKind::DeviceAlreadyOpen => c"device already open",
            ErrorKind::InvalidParam => c"invalid parameter",
            ErrorKind::HandleEmpty => c"handle is empty",
            ErrorKind::FrameEmpty => c"frame is empty",
            ErrorKind::FrameNotUpdated => c"frame not updated",
            ErrorKind::Internal => c"internal error",
        }
    }

    /// Description as a `&str` (all descriptions are ASCII)
    pub fn as_str(&self) -> &'static str {
        self.description().to_str().unwrap_or("unknown error")
    }

    /// Whether this kind is produced while wiring the capture graph
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            ErrorKind::Bind
                | ErrorKind::GraphBuilder
                | ErrorKind::AddFilter
                | ErrorKind::GrabberCreate
                | ErrorKind::SetFormat
                | ErrorKind::TerminatorCreate
                | ErrorKind::Connect
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Library error: a cause from the closed taxonomy plus detail text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct CaptureError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl CaptureError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<ErrorKind> for CaptureError {
    fn from(kind: ErrorKind) -> Self {
        CaptureError::new(kind, kind.as_str())
    }
}

/// Failure reported by a backend before it is mapped onto [`ErrorKind`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Generic backend failure
    #[error("{0}")]
    Failed(String),
    /// The graph could not agree on a stream format
    #[error("stream negotiation failed: {0}")]
    NotNegotiated(String),
}

impl PlatformError {
    pub fn failed(msg: impl Into<String>) -> Self {
        PlatformError::Failed(msg.into())
    }

    /// Translate into the library taxonomy for the step that failed.
    ///
    /// Negotiation failures always surface as [`ErrorKind::Connect`], even when
    /// the backend only detects them once the graph starts.
    pub fn at(self, kind: ErrorKind) -> CaptureError {
        match self {
            PlatformError::Failed(detail) => CaptureError::new(kind, detail),
            PlatformError::NotNegotiated(detail) => CaptureError::new(
                ErrorKind::Connect,
                format!("stream negotiation failed: {}", detail),
            ),
        }
    }
}
