// SPDX-License-Identifier: GPL-3.0-only

//! Virtual capture platform
//!
//! Scripted devices for exercising the capture core without hardware. Every
//! platform step can be made to fail, every resource is recorded in a
//! [`ResourceLedger`], and a producer thread stands in for the platform's
//! frame scheduler.
//!
//! # Example
//! ```rust
//! use becam::backends::virtual_camera::{VirtualDevice, VirtualPlatform};
//! use becam::backends::camera::{FourCc, list_devices};
//!
//! let platform = VirtualPlatform::new()
//!     .with_device(VirtualDevice::new("virtual-0").with_format(640, 480, 30, FourCc::YUY2));
//! let devices = list_devices(&platform).unwrap();
//! assert_eq!(devices[0].identity, "virtual-0");
//! ```

mod ledger;

pub use ledger::{LedgerEvent, ResourceKind, ResourceLedger};

use crate::backends::camera::delivery::FrameTrampoline;
use crate::backends::camera::types::{DeviceProperty, FourCc, NodeRole, RawCapability, StreamFormat};
use crate::backends::camera::{CapturePlatform, DeviceMoniker};
use crate::constants::timing;
use crate::errors::{PlatformError, PlatformResult};
use ledger::LedgerToken;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Platform step at which a failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Enumerate,
    CapabilityCount,
    CapabilityEntry(usize),
    Bind,
    CreateGraph,
    AddSource,
    CreateGrabber,
    ConfigureGrabber,
    AddGrabber,
    CreateTerminator,
    AddTerminator,
    ConnectSourceGrabber,
    ConnectGrabberTerminator,
    RegisterCallback,
    Run,
}

/// Description of one scripted device
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDevice {
    pub identity: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub capabilities: Vec<RawCapability>,
    /// Bytes delivered as every frame
    pub payload: Vec<u8>,
    /// Runs but never produces a frame
    pub stalled: bool,
    /// Connects with formats missing from `capabilities`
    pub accepts_unlisted: bool,
}

impl VirtualDevice {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: Some(identity.to_string()),
            name: Some(format!("Virtual Camera ({})", identity)),
            location: None,
            capabilities: Vec::new(),
            payload: vec![0x5a; 64],
            stalled: false,
            accepts_unlisted: false,
        }
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = name.map(str::to_string);
        self
    }

    pub fn with_location(mut self, location: Option<&str>) -> Self {
        self.location = location.map(str::to_string);
        self
    }

    pub fn without_identity(mut self) -> Self {
        self.identity = None;
        self
    }

    pub fn with_format(mut self, width: i32, height: i32, fps: u32, encoding: FourCc) -> Self {
        self.capabilities
            .push(RawCapability::video(width, height, fps, encoding));
        self
    }

    pub fn with_capability(mut self, capability: RawCapability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn accepting_unlisted(mut self) -> Self {
        self.accepts_unlisted = true;
        self
    }

    fn lists(&self, format: &StreamFormat) -> bool {
        self.capabilities
            .iter()
            .filter_map(RawCapability::stream_format)
            .any(|listed| listed.is_compatible(format))
    }
}

type CallbackSlot = Arc<Mutex<Option<Arc<FrameTrampoline>>>>;

/// Capture platform over scripted devices
pub struct VirtualPlatform {
    devices: Mutex<Vec<VirtualDevice>>,
    failure: Mutex<Option<FailurePoint>>,
    ledger: ResourceLedger,
    graphs: Mutex<Vec<Weak<GraphState>>>,
    frame_interval: Option<Duration>,
}

impl Default for VirtualPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualPlatform {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            ledger: ResourceLedger::new(),
            graphs: Mutex::new(Vec::new()),
            frame_interval: None,
        }
    }

    pub fn with_device(self, device: VirtualDevice) -> Self {
        self.add_device(device);
        self
    }

    /// Deliver at a fixed interval instead of the negotiated rate
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    pub fn add_device(&self, device: VirtualDevice) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(device);
    }

    /// Remove a device and halt any graph it is streaming into, as an
    /// unplug would
    pub fn unplug(&self, identity: &str) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|d| d.identity.as_deref() != Some(identity));

        let graphs = self.graphs.lock().unwrap_or_else(PoisonError::into_inner);
        for state in graphs.iter().filter_map(Weak::upgrade) {
            let source = state.source.lock().unwrap_or_else(PoisonError::into_inner);
            if source.as_ref().and_then(|d| d.identity.as_deref()) == Some(identity) {
                drop(source);
                state.halt();
            }
        }
        info!(identity, "Virtual device unplugged");
    }

    /// Make the given step fail until cleared
    pub fn fail_at(&self, point: FailurePoint) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(point);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    fn check(&self, point: FailurePoint) -> PlatformResult<()> {
        if *self.failure.lock().unwrap_or_else(PoisonError::into_inner) == Some(point) {
            return Err(PlatformError::failed(format!(
                "injected failure at {:?}",
                point
            )));
        }
        Ok(())
    }
}

/// Entry of the scripted video-input category
pub struct VirtualMoniker {
    device: VirtualDevice,
}

impl DeviceMoniker for VirtualMoniker {
    fn display_name(&self) -> Option<String> {
        self.device.identity.clone()
    }

    fn read_property(&self, property: DeviceProperty) -> Option<String> {
        match property {
            DeviceProperty::FriendlyName => self.device.name.clone(),
            DeviceProperty::LocationInfo => self.device.location.clone(),
        }
    }
}

pub struct VirtualDeviceHandle {
    device: VirtualDevice,
    _token: LedgerToken,
}

struct GraphState {
    source: Mutex<Option<VirtualDevice>>,
    grabber: Mutex<Option<CallbackSlot>>,
    format: Mutex<Option<StreamFormat>>,
    stop: Arc<AtomicBool>,
    producer: Mutex<Option<JoinHandle<()>>>,
    frames: Arc<AtomicU64>,
}

impl GraphState {
    /// Stop the producer thread and wait for it to exit
    fn halt(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let producer = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = producer {
            let _ = handle.join();
        }
    }
}

pub struct VirtualGraph {
    state: Arc<GraphState>,
    _token: LedgerToken,
}

impl VirtualGraph {
    /// Frames the producer has handed to the callback so far
    pub fn frames_produced(&self) -> u64 {
        self.state.frames.load(Ordering::SeqCst)
    }
}

impl Drop for VirtualGraph {
    fn drop(&mut self) {
        self.state.halt();
    }
}

pub struct VirtualNode {
    role: NodeRole,
    format: Mutex<Option<StreamFormat>>,
    callback: CallbackSlot,
    _token: LedgerToken,
}

pub struct VirtualAttachment {
    _token: LedgerToken,
}

pub struct VirtualLink {
    _token: LedgerToken,
}

pub struct VirtualRegistration {
    slot: CallbackSlot,
    _token: LedgerToken,
}

impl Drop for VirtualRegistration {
    fn drop(&mut self) {
        // Waits for an in-flight delivery, which holds the slot
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl CapturePlatform for VirtualPlatform {
    type Moniker = VirtualMoniker;
    type Device = VirtualDeviceHandle;
    type Graph = VirtualGraph;
    type Node = VirtualNode;
    type Attachment = VirtualAttachment;
    type Link = VirtualLink;
    type Registration = VirtualRegistration;

    fn enumerate_video_inputs(&self) -> PlatformResult<Vec<VirtualMoniker>> {
        self.check(FailurePoint::Enumerate)?;
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(devices
            .iter()
            .cloned()
            .map(|device| VirtualMoniker { device })
            .collect())
    }

    fn bind(&self, moniker: &VirtualMoniker) -> PlatformResult<VirtualDeviceHandle> {
        self.check(FailurePoint::Bind)?;
        Ok(VirtualDeviceHandle {
            device: moniker.device.clone(),
            _token: self.ledger.acquire(ResourceKind::Device),
        })
    }

    fn capability_count(&self, device: &VirtualDeviceHandle) -> PlatformResult<usize> {
        self.check(FailurePoint::CapabilityCount)?;
        Ok(device.device.capabilities.len())
    }

    fn capability(&self, device: &VirtualDeviceHandle, index: usize) -> PlatformResult<RawCapability> {
        self.check(FailurePoint::CapabilityEntry(index))?;
        device
            .device
            .capabilities
            .get(index)
            .copied()
            .ok_or_else(|| PlatformError::failed(format!("no capability {}", index)))
    }

    fn create_graph(&self) -> PlatformResult<VirtualGraph> {
        self.check(FailurePoint::CreateGraph)?;
        let state = Arc::new(GraphState {
            source: Mutex::new(None),
            grabber: Mutex::new(None),
            format: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            producer: Mutex::new(None),
            frames: Arc::new(AtomicU64::new(0)),
        });

        let mut graphs = self.graphs.lock().unwrap_or_else(PoisonError::into_inner);
        graphs.retain(|g| g.strong_count() > 0);
        graphs.push(Arc::downgrade(&state));

        Ok(VirtualGraph {
            state,
            _token: self.ledger.acquire(ResourceKind::Graph),
        })
    }

    fn add_source(
        &self,
        graph: &VirtualGraph,
        device: &VirtualDeviceHandle,
    ) -> PlatformResult<VirtualAttachment> {
        self.check(FailurePoint::AddSource)?;
        *graph
            .state
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(device.device.clone());
        Ok(VirtualAttachment {
            _token: self.ledger.acquire(ResourceKind::SourceMembership),
        })
    }

    fn create_grabber(&self) -> PlatformResult<VirtualNode> {
        self.check(FailurePoint::CreateGrabber)?;
        Ok(VirtualNode {
            role: NodeRole::Grabber,
            format: Mutex::new(None),
            callback: Arc::new(Mutex::new(None)),
            _token: self.ledger.acquire(ResourceKind::Grabber),
        })
    }

    fn configure_grabber(&self, grabber: &VirtualNode, format: &StreamFormat) -> PlatformResult<()> {
        self.check(FailurePoint::ConfigureGrabber)?;
        *grabber.format.lock().unwrap_or_else(PoisonError::into_inner) = Some(*format);
        Ok(())
    }

    fn create_terminator(&self) -> PlatformResult<VirtualNode> {
        self.check(FailurePoint::CreateTerminator)?;
        Ok(VirtualNode {
            role: NodeRole::Terminator,
            format: Mutex::new(None),
            callback: Arc::new(Mutex::new(None)),
            _token: self.ledger.acquire(ResourceKind::Terminator),
        })
    }

    fn add_node(
        &self,
        graph: &VirtualGraph,
        node: &VirtualNode,
        role: NodeRole,
    ) -> PlatformResult<VirtualAttachment> {
        if node.role != role {
            return Err(PlatformError::failed(format!(
                "{:?} node added as {:?}",
                node.role, role
            )));
        }
        let kind = match role {
            NodeRole::Grabber => {
                self.check(FailurePoint::AddGrabber)?;
                *graph
                    .state
                    .grabber
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&node.callback));
                *graph.state.format.lock().unwrap_or_else(PoisonError::into_inner) =
                    *node.format.lock().unwrap_or_else(PoisonError::into_inner);
                ResourceKind::GrabberMembership
            }
            NodeRole::Terminator => {
                self.check(FailurePoint::AddTerminator)?;
                ResourceKind::TerminatorMembership
            }
        };
        Ok(VirtualAttachment {
            _token: self.ledger.acquire(kind),
        })
    }

    fn connect_source(
        &self,
        _graph: &VirtualGraph,
        device: &VirtualDeviceHandle,
        grabber: &VirtualNode,
    ) -> PlatformResult<VirtualLink> {
        self.check(FailurePoint::ConnectSourceGrabber)?;

        let format = *grabber.format.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(format) = format else {
            return Err(PlatformError::NotNegotiated("grabber has no media type".into()));
        };
        if !device.device.accepts_unlisted && !device.device.lists(&format) {
            return Err(PlatformError::NotNegotiated(format!(
                "device does not offer {}",
                format
            )));
        }

        Ok(VirtualLink {
            _token: self.ledger.acquire(ResourceKind::SourceLink),
        })
    }

    fn connect_nodes(
        &self,
        _graph: &VirtualGraph,
        _from: &VirtualNode,
        _to: &VirtualNode,
    ) -> PlatformResult<VirtualLink> {
        self.check(FailurePoint::ConnectGrabberTerminator)?;
        Ok(VirtualLink {
            _token: self.ledger.acquire(ResourceKind::SinkLink),
        })
    }

    fn register_callback(
        &self,
        grabber: &VirtualNode,
        trampoline: Arc<FrameTrampoline>,
    ) -> PlatformResult<VirtualRegistration> {
        self.check(FailurePoint::RegisterCallback)?;
        *grabber
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(trampoline);
        Ok(VirtualRegistration {
            slot: Arc::clone(&grabber.callback),
            _token: self.ledger.acquire(ResourceKind::Callback),
        })
    }

    fn run(&self, graph: &VirtualGraph) -> PlatformResult<()> {
        self.check(FailurePoint::Run)?;

        let state = &graph.state;
        let source = state
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| PlatformError::failed("graph has no source"))?;
        let slot = state
            .grabber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| PlatformError::failed("graph has no grabber"))?;
        let fps = state
            .format
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|f| f.fps)
            .unwrap_or(0);

        let interval = self.frame_interval.unwrap_or(if fps > 0 {
            Duration::from_secs(1) / fps
        } else {
            timing::FALLBACK_FRAME_INTERVAL
        });

        state.stop.store(false, Ordering::SeqCst);
        let stop = Arc::clone(&state.stop);
        let frames = Arc::clone(&state.frames);
        let handle = thread::Builder::new()
            .name("virtual-camera".into())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    if !source.stalled {
                        let callback = slot.lock().unwrap_or_else(PoisonError::into_inner);
                        if let Some(trampoline) = callback.as_ref() {
                            trampoline.on_buffer(&source.payload);
                            frames.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    thread::sleep(interval);
                }
            })
            .map_err(|e| PlatformError::failed(format!("failed to spawn producer: {}", e)))?;

        *state.producer.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        debug!(?interval, "Virtual graph running");
        Ok(())
    }

    fn stop(&self, graph: &VirtualGraph) -> PlatformResult<()> {
        graph.state.halt();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moniker_properties_are_independent() {
        let platform = VirtualPlatform::new().with_device(
            VirtualDevice::new("a")
                .with_name(None)
                .with_location(Some("usb-1")),
        );
        let monikers = platform.enumerate_video_inputs().unwrap();
        assert_eq!(monikers[0].display_name().as_deref(), Some("a"));
        assert_eq!(monikers[0].read_property(DeviceProperty::FriendlyName), None);
        assert_eq!(
            monikers[0].read_property(DeviceProperty::LocationInfo).as_deref(),
            Some("usb-1")
        );
    }

    #[test]
    fn test_injected_failure_is_reported() {
        let platform = VirtualPlatform::new();
        platform.fail_at(FailurePoint::CreateGraph);
        assert!(platform.create_graph().is_err());
        platform.clear_failure();
        assert!(platform.create_graph().is_ok());
    }

    #[test]
    fn test_unlisted_format_fails_to_connect() {
        let platform = VirtualPlatform::new()
            .with_device(VirtualDevice::new("a").with_format(640, 480, 30, FourCc::YUY2));
        let moniker = platform.enumerate_video_inputs().unwrap().remove(0);
        let device = platform.bind(&moniker).unwrap();
        let grabber = platform.create_grabber().unwrap();
        let graph = platform.create_graph().unwrap();
        platform
            .configure_grabber(&grabber, &StreamFormat::new(1280, 720, 30, FourCc::MJPG))
            .unwrap();

        let err = platform.connect_source(&graph, &device, &grabber).err().unwrap();
        assert!(matches!(err, PlatformError::NotNegotiated(_)));
    }

    fn produced_after_running(device: VirtualDevice) -> u64 {
        use crate::backends::camera::delivery::{DeliveryTarget, FrameSink, LatestFrame};

        let platform = VirtualPlatform::new()
            .with_device(device)
            .with_frame_interval(Duration::from_millis(2));
        let moniker = platform.enumerate_video_inputs().unwrap().remove(0);
        let device = platform.bind(&moniker).unwrap();
        let graph = platform.create_graph().unwrap();
        let _source = platform.add_source(&graph, &device).unwrap();
        let grabber = platform.create_grabber().unwrap();
        platform
            .configure_grabber(&grabber, &StreamFormat::new(640, 480, 30, FourCc::YUY2))
            .unwrap();
        let _member = platform.add_node(&graph, &grabber, NodeRole::Grabber).unwrap();
        let target: Arc<dyn FrameSink> =
            Arc::new(DeliveryTarget::new(Arc::new(LatestFrame::new()), None));
        let _callback = platform
            .register_callback(&grabber, Arc::new(FrameTrampoline::new(&target)))
            .unwrap();

        platform.run(&graph).unwrap();
        thread::sleep(Duration::from_millis(50));
        platform.stop(&graph).unwrap();
        graph.frames_produced()
    }

    #[test]
    fn test_stalled_device_produces_nothing() {
        let listed = || VirtualDevice::new("a").with_format(640, 480, 30, FourCc::YUY2);
        assert_eq!(produced_after_running(listed().stalled()), 0);
        assert!(produced_after_running(listed()) > 0);
    }
}
