// SPDX-License-Identifier: GPL-3.0-only

//! Capture session lifecycle
//!
//! `Closed → Opening → Running → Closing → Closed`. Open either reaches
//! Running or leaves nothing behind. Close stops production before the
//! callback object is released, which is what keeps a late frame from
//! reaching freed state.

use super::CapturePlatform;
use super::capabilities::{resolve_formats, select_format};
use super::delivery::{FrameSink, FrameTrampoline};
use super::pipeline::{PipelineHandle, build_pipeline};
use super::types::{RunState, StreamFormat};
use crate::config::{Config, FormatPolicy};
use crate::errors::{CaptureError, CaptureResult, ErrorKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Installed callback together with the trampoline it points at.
/// The registration drops first.
struct CallbackHandle<P: CapturePlatform> {
    registration: P::Registration,
    trampoline: Arc<FrameTrampoline>,
}

/// Everything that exists only while Running
struct LiveCapture<P: CapturePlatform> {
    callback: CallbackHandle<P>,
    pipeline: PipelineHandle<P>,
    target: Arc<dyn FrameSink>,
}

/// One device capture, opened and closed explicitly
pub struct CaptureSession<P: CapturePlatform> {
    platform: Arc<P>,
    policy: FormatPolicy,
    default_format: StreamFormat,
    state: RunState,
    selected_device: Option<String>,
    requested_format: Option<StreamFormat>,
    live: Option<LiveCapture<P>>,
}

impl<P: CapturePlatform> CaptureSession<P> {
    pub fn new(platform: Arc<P>, config: &Config) -> Self {
        Self {
            platform,
            policy: config.format_policy,
            default_format: config.default_format.to_stream_format(),
            state: RunState::Closed,
            selected_device: None,
            requested_format: None,
            live: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == RunState::Running
    }

    /// Identity of the open device
    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    /// Format the open graph was built with (after automatic selection)
    pub fn requested_format(&self) -> Option<&StreamFormat> {
        self.requested_format.as_ref()
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    /// Open a device and start delivering frames to `target`.
    ///
    /// # Arguments
    /// * `identity` - Device identity from a listing
    /// * `request` - Requested format; any zero field selects automatically
    /// * `target` - Receives every frame on the platform's scheduler thread
    ///
    /// # Returns
    /// * `Ok(StreamFormat)` - The format the graph runs with
    /// * `Err(CaptureError)` - Nothing was left acquired and the session is Closed
    pub fn open(
        &mut self,
        identity: &str,
        request: &StreamFormat,
        target: Arc<dyn FrameSink>,
    ) -> CaptureResult<StreamFormat> {
        if self.state != RunState::Closed {
            return Err(CaptureError::new(
                ErrorKind::DeviceAlreadyOpen,
                format!("session is {}", self.state),
            ));
        }
        if identity.is_empty() {
            return Err(CaptureError::new(ErrorKind::InvalidParam, "empty device identity"));
        }

        info!(identity, request = %request, "Opening capture session");
        self.state = RunState::Opening;

        match self.start(identity, request, target) {
            Ok(live) => {
                let format = *live.pipeline.format();
                self.selected_device = Some(identity.to_string());
                self.requested_format = Some(format);
                self.live = Some(live);
                self.state = RunState::Running;
                info!(identity, format = %format, "Capture session running");
                Ok(format)
            }
            Err(e) => {
                self.state = RunState::Closed;
                warn!(
                    identity,
                    error = %e,
                    graph_rolled_back = e.kind.is_construction(),
                    "Failed to open capture session"
                );
                Err(e)
            }
        }
    }

    fn start(
        &self,
        identity: &str,
        request: &StreamFormat,
        target: Arc<dyn FrameSink>,
    ) -> CaptureResult<LiveCapture<P>> {
        let platform = self.platform.as_ref();

        let format = if request.is_auto() || self.policy == FormatPolicy::Strict {
            let formats = resolve_formats(platform, identity)?;
            select_format(&formats, request, self.policy, &self.default_format)?
        } else {
            *request
        };

        let pipeline = build_pipeline(platform, identity, &format)?;

        let trampoline = Arc::new(FrameTrampoline::new(&target));
        let registration = platform
            .register_callback(pipeline.grabber(), Arc::clone(&trampoline))
            .map_err(|e| e.at(ErrorKind::Callback))?;
        let callback = CallbackHandle {
            registration,
            trampoline,
        };
        debug!("Frame callback registered");

        if let Err(e) = platform.run(pipeline.graph()) {
            // A graph that failed to start may still be partially running
            if let Err(stop_err) = platform.stop(pipeline.graph()) {
                debug!(error = %stop_err, "Stop after failed start");
            }
            return Err(e.at(ErrorKind::Run));
        }

        Ok(LiveCapture {
            callback,
            pipeline,
            target,
        })
    }

    /// Stop capture and release everything open acquired.
    ///
    /// A no-op on a Closed session. A graph that already stopped on its own
    /// (device unplugged) is not an error.
    pub fn close(&mut self) -> CaptureResult<()> {
        let Some(live) = self.live.take() else {
            self.reset();
            return Ok(());
        };

        info!(identity = ?self.selected_device, "Closing capture session");
        self.state = RunState::Closing;

        if let Err(e) = self.platform.stop(live.pipeline.graph()) {
            warn!(error = %e, "Graph did not stop cleanly");
        }

        let LiveCapture {
            callback,
            pipeline,
            target,
        } = live;
        let CallbackHandle {
            registration,
            trampoline,
        } = callback;
        drop(registration);
        drop(trampoline);
        drop(pipeline);
        drop(target);

        self.reset();
        info!("Capture session closed");
        Ok(())
    }

    fn reset(&mut self) {
        self.selected_device = None;
        self.requested_format = None;
        self.state = RunState::Closed;
    }
}

impl<P: CapturePlatform> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl<P: CapturePlatform> std::fmt::Debug for CaptureSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state)
            .field("selected_device", &self.selected_device)
            .field("requested_format", &self.requested_format)
            .finish()
    }
}
