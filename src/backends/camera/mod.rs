// SPDX-License-Identifier: GPL-3.0-only

//! Capture core and its platform seam
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ C ABI / CLI         │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureManager      │  ← Thread-safe handle, pull-mode frames
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureSession      │  ← open/close lifecycle, rollback
//! └──────────┬──────────┘
//!            │  directory → capabilities → pipeline → delivery
//!            ▼
//! ┌─────────────────────┐
//! │ CapturePlatform     │  ← OS seam
//! └──────────┬──────────┘
//!            │
//!       ┌────┴──────┐
//!       ▼           ▼
//!  ┌─────────┐ ┌─────────┐
//!  │GStreamer│ │ Virtual │
//!  └─────────┘ └─────────┘
//! ```
//!
//! Every resource a platform hands out is an owned value that releases
//! itself on drop. The core never calls an explicit release, so partial
//! construction unwinds through ordinary scope exit.

pub mod capabilities;
pub mod delivery;
pub mod directory;
pub mod gstreamer;
pub mod manager;
pub mod pipeline;
pub mod session;
pub mod types;

pub use capabilities::{most_similar, resolve_formats, select_format};
pub use delivery::{DeliveryTarget, Frame, FrameSink, FrameTrampoline, HostSink, LatestFrame};
pub use directory::list_devices;
pub use manager::CaptureManager;
pub use pipeline::{PipelineHandle, build_pipeline};
pub use session::CaptureSession;
pub use types::*;

use crate::errors::PlatformResult;
use std::sync::Arc;

/// One entry of the video-input category
pub trait DeviceMoniker {
    /// The entry's identity string, if it can be resolved
    fn display_name(&self) -> Option<String>;

    /// Read one named property; a missing property is `None`
    fn read_property(&self, property: DeviceProperty) -> Option<String>;
}

/// OS capture framework reached by the core
///
/// Resources are returned as owned handles. Dropping a handle releases the
/// underlying resource; dropping an attachment removes the node from its
/// graph, dropping a link disconnects it, dropping a registration removes
/// the frame callback.
pub trait CapturePlatform: Send + Sync {
    type Moniker: DeviceMoniker;
    /// A bound device, usable as a source node
    type Device: Send;
    /// Graph container together with its control interface
    type Graph: Send;
    /// Grabber or terminator node
    type Node: Send;
    /// Membership of a node in a graph
    type Attachment: Send;
    /// Connection between two endpoints
    type Link: Send;
    /// Installed frame callback
    type Registration: Send;

    // ===== Enumeration =====

    /// Enumerate the video-input category. An empty category is `Ok(vec![])`.
    fn enumerate_video_inputs(&self) -> PlatformResult<Vec<Self::Moniker>>;

    /// Bind an entry to a device usable as a source
    fn bind(&self, moniker: &Self::Moniker) -> PlatformResult<Self::Device>;

    // ===== Capabilities =====

    /// Number of capability entries on the device's output endpoint
    fn capability_count(&self, device: &Self::Device) -> PlatformResult<usize>;

    /// Read capability entry `index`
    fn capability(&self, device: &Self::Device, index: usize) -> PlatformResult<RawCapability>;

    // ===== Graph construction =====

    fn create_graph(&self) -> PlatformResult<Self::Graph>;

    /// Insert the device into the graph as its source node
    fn add_source(&self, graph: &Self::Graph, device: &Self::Device)
    -> PlatformResult<Self::Attachment>;

    fn create_grabber(&self) -> PlatformResult<Self::Node>;

    /// Apply the stream format to a grabber that has not joined a graph yet
    ///
    /// # Arguments
    /// * `grabber` - Node returned by [`CapturePlatform::create_grabber`]
    /// * `format` - Format the grabber accepts on its input endpoint
    fn configure_grabber(&self, grabber: &Self::Node, format: &StreamFormat) -> PlatformResult<()>;

    fn create_terminator(&self) -> PlatformResult<Self::Node>;

    fn add_node(
        &self,
        graph: &Self::Graph,
        node: &Self::Node,
        role: NodeRole,
    ) -> PlatformResult<Self::Attachment>;

    /// Connect the source's output endpoint to the grabber's input endpoint
    fn connect_source(
        &self,
        graph: &Self::Graph,
        device: &Self::Device,
        grabber: &Self::Node,
    ) -> PlatformResult<Self::Link>;

    /// Connect `from`'s output endpoint to `to`'s input endpoint
    fn connect_nodes(
        &self,
        graph: &Self::Graph,
        from: &Self::Node,
        to: &Self::Node,
    ) -> PlatformResult<Self::Link>;

    // ===== Live phase =====

    /// Install the frame callback on the grabber. The platform scheduler
    /// calls [`FrameTrampoline::on_buffer`] from its own thread.
    fn register_callback(
        &self,
        grabber: &Self::Node,
        trampoline: Arc<FrameTrampoline>,
    ) -> PlatformResult<Self::Registration>;

    /// Start the graph and block until it runs or fails
    fn run(&self, graph: &Self::Graph) -> PlatformResult<()>;

    /// Stop the graph. Must succeed on a graph that already stopped itself.
    fn stop(&self, graph: &Self::Graph) -> PlatformResult<()>;
}
