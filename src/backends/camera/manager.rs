// SPDX-License-Identifier: GPL-3.0-only

//! Capture manager
//!
//! The manager provides:
//! - Thread-safe access to one capture session
//! - Pull-mode frame access on top of the delivery channel
//! - Tracking of frame buffers lent out across the C boundary

use super::CapturePlatform;
use super::capabilities::resolve_formats;
use super::delivery::{DeliveryTarget, Frame, FrameSink, HostSink, LatestFrame};
use super::directory::list_devices;
use super::session::CaptureSession;
use super::types::{DeviceDescriptor, RunState, StreamFormat};
use crate::config::Config;
use crate::errors::{CaptureError, CaptureResult, ErrorKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Camera capture manager
///
/// Owns one session plus the latest-frame slot every session delivers into.
/// Thread-safe and can be shared across threads.
pub struct CaptureManager<P: CapturePlatform> {
    platform: Arc<P>,
    config: Config,
    session: Mutex<CaptureSession<P>>,
    latest: Arc<LatestFrame>,
    /// Frames handed out by [`CaptureManager::lend_frame`], keyed by address
    lent: Mutex<HashMap<usize, Box<[u8]>>>,
}

impl<P: CapturePlatform> CaptureManager<P> {
    /// Create a new manager
    ///
    /// # Arguments
    /// * `platform` - Capture framework to use
    /// * `config` - Format policy, defaults and timeouts
    pub fn new(platform: P, config: Config) -> Self {
        Self::with_platform(Arc::new(platform), config)
    }

    pub fn with_platform(platform: Arc<P>, config: Config) -> Self {
        info!(policy = ?config.format_policy, "Creating capture manager");

        let session = CaptureSession::new(Arc::clone(&platform), &config);
        Self {
            platform,
            config,
            session: Mutex::new(session),
            latest: Arc::new(LatestFrame::new()),
            lent: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    fn session(&self) -> MutexGuard<'_, CaptureSession<P>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enumerate attached capture devices
    pub fn list_devices(&self) -> CaptureResult<Vec<DeviceDescriptor>> {
        list_devices(self.platform.as_ref())
    }

    /// Get supported formats for a device
    pub fn formats(&self, identity: &str) -> CaptureResult<Vec<StreamFormat>> {
        resolve_formats(self.platform.as_ref(), identity)
    }

    /// Open a device. Frames go to `host` first (if any), then to the
    /// latest-frame slot read by [`CaptureManager::get_frame`].
    pub fn open_device(
        &self,
        identity: &str,
        format: &StreamFormat,
        host: Option<HostSink>,
    ) -> CaptureResult<StreamFormat> {
        let mut session = self.session();
        if session.state() != RunState::Closed {
            return Err(CaptureError::new(
                ErrorKind::DeviceAlreadyOpen,
                format!("'{}' is open", session.selected_device().unwrap_or_default()),
            ));
        }

        self.latest.reset();
        let target: Arc<dyn FrameSink> =
            Arc::new(DeliveryTarget::new(Arc::clone(&self.latest), host));
        session.open(identity, format, target)
    }

    /// Close the open device. Closing when nothing is open succeeds.
    pub fn close_device(&self) -> CaptureResult<()> {
        self.session().close()
    }

    pub fn is_open(&self) -> bool {
        self.session().is_open()
    }

    pub fn state(&self) -> RunState {
        self.session().state()
    }

    /// Get current device
    pub fn current_device(&self) -> Option<String> {
        self.session().selected_device().map(str::to_string)
    }

    /// Get current format
    pub fn current_format(&self) -> Option<StreamFormat> {
        self.session().requested_format().copied()
    }

    /// Pull a frame newer than the last one pulled, waiting up to the
    /// configured timeout.
    pub fn get_frame(&self) -> CaptureResult<Frame> {
        if !self.is_open() {
            return Err(CaptureError::from(ErrorKind::DeviceNotOpen));
        }
        self.latest.take(self.config.frame_wait_timeout())
    }

    /// Pull a frame and keep it alive until [`CaptureManager::release_frame`].
    ///
    /// Returns the address and length of the kept buffer.
    pub fn lend_frame(&self) -> CaptureResult<(*const u8, usize)> {
        let frame = self.get_frame()?;
        let data = frame.data.into_boxed_slice();
        let ptr = data.as_ptr();
        let len = data.len();

        self.lent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ptr as usize, data);
        Ok((ptr, len))
    }

    /// Release a buffer returned by [`CaptureManager::lend_frame`]
    pub fn release_frame(&self, ptr: *const u8) -> CaptureResult<()> {
        let released = self
            .lent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(ptr as usize));
        match released {
            Some(_) => Ok(()),
            None => Err(CaptureError::new(
                ErrorKind::InvalidParam,
                "frame was not handed out by this handle",
            )),
        }
    }

    /// Number of lent frames not yet released
    pub fn outstanding_frames(&self) -> usize {
        self.lent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Frames lost because a pull held the slot while a new one arrived
    pub fn dropped_frames(&self) -> u64 {
        self.latest.dropped()
    }
}

impl<P: CapturePlatform> Drop for CaptureManager<P> {
    fn drop(&mut self) {
        let _ = self.session().close();
        let outstanding = self.outstanding_frames();
        if outstanding > 0 {
            debug!(outstanding, "Releasing frames never returned by the host");
        }
    }
}

impl<P: CapturePlatform> std::fmt::Debug for CaptureManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session();
        f.debug_struct("CaptureManager")
            .field("state", &session.state())
            .field("device", &session.selected_device())
            .finish()
    }
}
