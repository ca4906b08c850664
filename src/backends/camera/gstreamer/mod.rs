// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture platform
//!
//! Maps the capture graph onto GStreamer:
//!
//! - video-input category: a device monitor filtered on `Video/Source`
//! - bound device: the element created by the device's provider
//! - graph: a `gst::Pipeline`, with its bus as the control interface
//! - grabber: a `capsfilter` carrying the requested caps, with a buffer probe
//!   on its src pad as the frame callback
//! - terminator: a non-syncing `fakesink`
//!
//! Frames are delivered on GStreamer's streaming thread.

mod enumeration;
mod graph;

pub use graph::{GstAttachment, GstDevice, GstGraph, GstLink, GstNode, GstRegistration};

use super::delivery::FrameTrampoline;
use super::types::{DeviceProperty, NodeRole, RawCapability, StreamFormat};
use super::{CapturePlatform, DeviceMoniker};
use crate::config::Config;
use crate::constants::gst_names;
use crate::errors::{CaptureError, CaptureResult, ErrorKind, PlatformError, PlatformResult};
use ::gstreamer as gst;
use gst::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One device offered by the device monitor
pub struct GstMoniker {
    device: gst::Device,
}

impl DeviceMoniker for GstMoniker {
    fn display_name(&self) -> Option<String> {
        enumeration::identity_of(&self.device)
    }

    fn read_property(&self, property: DeviceProperty) -> Option<String> {
        match property {
            DeviceProperty::FriendlyName => enumeration::friendly_name_of(&self.device),
            DeviceProperty::LocationInfo => enumeration::location_of(&self.device),
        }
    }
}

/// Desktop capture platform on GStreamer
#[derive(Debug, Clone)]
pub struct GstPlatform {
    start_timeout: Duration,
    stop_timeout: Duration,
}

impl GstPlatform {
    /// Initialize GStreamer and create the platform
    pub fn new(config: &Config) -> CaptureResult<Self> {
        gst::init().map_err(|e| {
            CaptureError::new(
                ErrorKind::Internal,
                format!("failed to initialize GStreamer: {}", e),
            )
        })?;
        info!(version = %gst::version_string(), "GStreamer capture platform ready");

        Ok(Self {
            start_timeout: config.start_timeout(),
            stop_timeout: config.stop_timeout(),
        })
    }

    /// State-change wait, clamped to the longest time GStreamer can express
    fn clock_time(duration: Duration) -> gst::ClockTime {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        gst::ClockTime::from_nseconds(nanos.min(gst::ClockTime::MAX.nseconds()))
    }
}

fn make_element(factory: &str, name: &str) -> PlatformResult<gst::Element> {
    gst::ElementFactory::make(factory)
        .name(name)
        .build()
        .map_err(|e| PlatformError::failed(format!("failed to create {}: {}", factory, e)))
}

impl CapturePlatform for GstPlatform {
    type Moniker = GstMoniker;
    type Device = GstDevice;
    type Graph = GstGraph;
    type Node = GstNode;
    type Attachment = GstAttachment;
    type Link = GstLink;
    type Registration = GstRegistration;

    fn enumerate_video_inputs(&self) -> PlatformResult<Vec<GstMoniker>> {
        let devices = enumeration::monitor_devices()?;
        Ok(devices
            .into_iter()
            .map(|device| GstMoniker { device })
            .collect())
    }

    fn bind(&self, moniker: &GstMoniker) -> PlatformResult<GstDevice> {
        let element = moniker
            .device
            .create_element(Some(gst_names::SOURCE))
            .map_err(|e| PlatformError::failed(format!("device refused element: {}", e)))?;

        Ok(GstDevice {
            element,
            caps: moniker.device.caps(),
            capabilities: enumeration::capability_entries(&moniker.device),
        })
    }

    fn capability_count(&self, device: &GstDevice) -> PlatformResult<usize> {
        Ok(device.capabilities.len())
    }

    fn capability(&self, device: &GstDevice, index: usize) -> PlatformResult<RawCapability> {
        device.capabilities.get(index).copied().ok_or_else(|| {
            PlatformError::failed(format!("capability index {} out of range", index))
        })
    }

    fn create_graph(&self) -> PlatformResult<GstGraph> {
        let pipeline = gst::Pipeline::with_name(gst_names::PIPELINE);
        if pipeline.bus().is_none() {
            return Err(PlatformError::failed("pipeline has no bus"));
        }
        Ok(GstGraph { pipeline })
    }

    fn add_source(&self, graph: &GstGraph, device: &GstDevice) -> PlatformResult<GstAttachment> {
        graph
            .pipeline
            .add(&device.element)
            .map_err(|e| PlatformError::failed(format!("failed to add source: {}", e)))?;
        Ok(GstAttachment {
            pipeline: graph.pipeline.clone(),
            element: device.element.clone(),
        })
    }

    fn create_grabber(&self) -> PlatformResult<GstNode> {
        Ok(GstNode {
            element: make_element("capsfilter", gst_names::GRABBER)?,
        })
    }

    fn configure_grabber(&self, grabber: &GstNode, format: &StreamFormat) -> PlatformResult<()> {
        let caps = graph::caps_for_format(format)?;
        debug!(caps = %caps, "Configuring grabber");
        grabber.element.set_property("caps", &caps);
        Ok(())
    }

    fn create_terminator(&self) -> PlatformResult<GstNode> {
        let element = make_element("fakesink", gst_names::TERMINATOR)?;
        element.set_property("sync", false);
        Ok(GstNode { element })
    }

    fn add_node(
        &self,
        graph: &GstGraph,
        node: &GstNode,
        role: NodeRole,
    ) -> PlatformResult<GstAttachment> {
        graph
            .pipeline
            .add(&node.element)
            .map_err(|e| PlatformError::failed(format!("failed to add {:?}: {}", role, e)))?;
        Ok(GstAttachment {
            pipeline: graph.pipeline.clone(),
            element: node.element.clone(),
        })
    }

    fn connect_source(
        &self,
        _graph: &GstGraph,
        device: &GstDevice,
        grabber: &GstNode,
    ) -> PlatformResult<GstLink> {
        // Catch a format the device never offers here rather than at start
        let wanted = grabber.element.property::<gst::Caps>("caps");
        if let Some(offered) = &device.caps
            && !offered.can_intersect(&wanted)
        {
            return Err(PlatformError::NotNegotiated(format!(
                "device does not offer {}",
                wanted
            )));
        }

        device
            .element
            .link(&grabber.element)
            .map_err(|e| PlatformError::NotNegotiated(e.to_string()))?;
        Ok(GstLink {
            src: device.element.clone(),
            sink: grabber.element.clone(),
        })
    }

    fn connect_nodes(
        &self,
        _graph: &GstGraph,
        from: &GstNode,
        to: &GstNode,
    ) -> PlatformResult<GstLink> {
        from.element
            .link(&to.element)
            .map_err(|e| PlatformError::failed(e.to_string()))?;
        Ok(GstLink {
            src: from.element.clone(),
            sink: to.element.clone(),
        })
    }

    fn register_callback(
        &self,
        grabber: &GstNode,
        trampoline: Arc<FrameTrampoline>,
    ) -> PlatformResult<GstRegistration> {
        let pad = grabber
            .element
            .static_pad("src")
            .ok_or_else(|| PlatformError::failed("grabber has no src pad"))?;

        let probe = pad
            .add_probe(gst::PadProbeType::BUFFER, move |_pad, info| {
                if let Some(buffer) = info.buffer()
                    && let Ok(map) = buffer.map_readable()
                {
                    trampoline.on_buffer(map.as_slice());
                }
                gst::PadProbeReturn::Ok
            })
            .ok_or_else(|| PlatformError::failed("failed to install buffer probe"))?;

        Ok(GstRegistration {
            pad,
            probe: Some(probe),
        })
    }

    fn run(&self, graph: &GstGraph) -> PlatformResult<()> {
        debug!("Setting pipeline to PLAYING state");
        if let Err(e) = graph.pipeline.set_state(gst::State::Playing) {
            return Err(graph
                .take_bus_error()
                .unwrap_or_else(|| PlatformError::failed(format!("failed to start: {}", e))));
        }

        // Wait for state change to complete
        let (result, state, pending) = graph
            .pipeline
            .state(Self::clock_time(self.start_timeout));
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");

        if let Some(err) = graph.take_bus_error() {
            return Err(err);
        }
        if result.is_err() || state != gst::State::Playing {
            return Err(PlatformError::failed(format!(
                "pipeline reached {:?} instead of Playing",
                state
            )));
        }
        Ok(())
    }

    fn stop(&self, graph: &GstGraph) -> PlatformResult<()> {
        graph
            .pipeline
            .set_state(gst::State::Null)
            .map_err(|e| PlatformError::failed(format!("failed to stop pipeline: {}", e)))?;

        let (result, state, _) = graph.pipeline.state(Self::clock_time(self.stop_timeout));
        match result {
            Ok(_) => debug!(state = ?state, "Pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline state change had issues"),
        }
        Ok(())
    }
}
