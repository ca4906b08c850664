// SPDX-License-Identifier: GPL-3.0-only

//! Capture graph construction
//!
//! Builds source → grabber → terminator. Each acquired resource is held in
//! a local declared in acquisition order, so an early return drops the
//! completed prefix in reverse. The first error is the one returned; release
//! itself cannot fail.

use super::CapturePlatform;
use super::directory::find_moniker;
use super::types::{NodeRole, StreamFormat};
use crate::errors::{CaptureResult, ErrorKind};
use tracing::debug;

/// A wired capture graph, ready to run but not started
///
/// Fields drop top to bottom, which is the reverse of the order they were
/// acquired in.
// Links, attachments and the terminator are only held for their drop
#[allow(dead_code)]
pub struct PipelineHandle<P: CapturePlatform> {
    sink_link: P::Link,
    source_link: P::Link,
    terminator_attachment: P::Attachment,
    terminator: P::Node,
    grabber_attachment: P::Attachment,
    grabber: P::Node,
    source_attachment: P::Attachment,
    graph: P::Graph,
    device: P::Device,
    format: StreamFormat,
}

impl<P: CapturePlatform> PipelineHandle<P> {
    pub fn graph(&self) -> &P::Graph {
        &self.graph
    }

    pub fn grabber(&self) -> &P::Node {
        &self.grabber
    }

    pub fn device(&self) -> &P::Device {
        &self.device
    }

    /// Format the grabber was configured with
    pub fn format(&self) -> &StreamFormat {
        &self.format
    }
}

impl<P: CapturePlatform> std::fmt::Debug for PipelineHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Wire a capture graph for the device with this identity.
///
/// # Arguments
/// * `platform` - Capture framework to build on
/// * `identity` - Identity from a device listing, resolved again here
/// * `format` - Stream format the grabber is configured with
///
/// # Returns
/// * `Ok(PipelineHandle)` - Graph fully connected, not yet running
/// * `Err(CaptureError)` - The step that failed; everything acquired before it
///   has been released
pub fn build_pipeline<P: CapturePlatform>(
    platform: &P,
    identity: &str,
    format: &StreamFormat,
) -> CaptureResult<PipelineHandle<P>> {
    debug!(identity, format = %format, "Building capture graph");

    let moniker = find_moniker(platform, identity)?;
    let device = platform
        .bind(&moniker)
        .map_err(|e| e.at(ErrorKind::Bind))?;
    debug!("Device bound");

    let graph = platform
        .create_graph()
        .map_err(|e| e.at(ErrorKind::GraphBuilder))?;

    let source_attachment = platform
        .add_source(&graph, &device)
        .map_err(|e| e.at(ErrorKind::AddFilter))?;
    debug!("Source added to graph");

    // The format must be set before the grabber joins the graph, otherwise
    // negotiation starts from the grabber's default type
    let grabber = platform
        .create_grabber()
        .map_err(|e| e.at(ErrorKind::GrabberCreate))?;
    platform
        .configure_grabber(&grabber, format)
        .map_err(|e| e.at(ErrorKind::SetFormat))?;

    let grabber_attachment = platform
        .add_node(&graph, &grabber, NodeRole::Grabber)
        .map_err(|e| e.at(ErrorKind::AddFilter))?;
    debug!("Grabber added to graph");

    let terminator = platform
        .create_terminator()
        .map_err(|e| e.at(ErrorKind::TerminatorCreate))?;
    let terminator_attachment = platform
        .add_node(&graph, &terminator, NodeRole::Terminator)
        .map_err(|e| e.at(ErrorKind::AddFilter))?;
    debug!("Terminator added to graph");

    let source_link = platform
        .connect_source(&graph, &device, &grabber)
        .map_err(|e| e.at(ErrorKind::Connect))?;
    let sink_link = platform
        .connect_nodes(&graph, &grabber, &terminator)
        .map_err(|e| e.at(ErrorKind::Connect))?;
    debug!("Capture graph connected");

    Ok(PipelineHandle {
        sink_link,
        source_link,
        terminator_attachment,
        terminator,
        grabber_attachment,
        grabber,
        source_attachment,
        graph,
        device,
        format: *format,
    })
}
