// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing capture devices with their formats
//! - Capturing a number of frames to files

use becam::backends::camera::gstreamer::GstPlatform;
use becam::{CaptureManager, Config, DeviceDescriptor, ErrorKind, FourCc, StreamFormat};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Format requested on the command line
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub encoding: FourCc,
}

impl CaptureRequest {
    fn stream_format(&self) -> StreamFormat {
        StreamFormat::new(self.width, self.height, self.fps, self.encoding)
    }
}

/// How long to keep retrying a frame pull before giving up
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default folder name for captured frames
const DEFAULT_SAVE_FOLDER: &str = "becam";

fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

fn manager(config: Config) -> Result<CaptureManager<GstPlatform>, Box<dyn std::error::Error>> {
    let platform = GstPlatform::new(&config)?;
    Ok(CaptureManager::new(platform, config))
}

/// List all capture devices
pub fn list_devices(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let manager = manager(config)?;
    let devices = manager.list_devices()?;

    if devices.is_empty() {
        println!("No capture devices found.");
        return Ok(());
    }

    println!("Capture devices:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!(
            "  [{}] {}",
            index,
            device.display_name.as_deref().unwrap_or("(unnamed)")
        );
        println!("      Identity: {}", device.identity);
        if let Some(location) = &device.location_info {
            println!("      Location: {}", location);
        }

        match manager.formats(&device.identity) {
            Ok(formats) if formats.is_empty() => println!("      Formats: none"),
            Ok(formats) => {
                println!("      Formats:");
                for format in &formats {
                    println!("        {}", format);
                }
            }
            Err(err) => println!("      Formats: unavailable ({})", err),
        }
        println!();
    }

    Ok(())
}

/// Pick a device by list index or by identity
fn resolve_device(devices: &[DeviceDescriptor], selector: &str) -> Option<DeviceDescriptor> {
    if let Ok(index) = selector.parse::<usize>()
        && let Some(device) = devices.get(index)
    {
        return Some(device.clone());
    }
    devices.iter().find(|d| d.identity == selector).cloned()
}

fn frame_path(dir: &Path, index: u32, format: &StreamFormat) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!(
        "frame_{}_{}.{}",
        timestamp,
        index,
        format.codec().file_extension()
    ))
}

/// Open a device, write `frames` frames to `output`, then close it
pub fn capture(
    config: Config,
    selector: &str,
    request: CaptureRequest,
    frames: u32,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output.unwrap_or_else(default_output_dir);
    let manager = manager(config)?;
    let devices = manager.list_devices()?;
    if devices.is_empty() {
        return Err("No capture devices found".into());
    }

    let device = resolve_device(&devices, selector)
        .ok_or_else(|| format!("No device matches '{}'", selector))?;
    println!("Using device: {}", device);

    std::fs::create_dir_all(&output)?;

    let format = manager.open_device(&device.identity, &request.stream_format(), None)?;
    println!("Capture format: {}", format);
    println!("Capturing... (press Ctrl+C to stop early)");

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    for index in 0..frames {
        if stop_flag.load(Ordering::SeqCst) {
            println!("Stopping early...");
            break;
        }

        let deadline = Instant::now() + CAPTURE_TIMEOUT;
        let frame = loop {
            match manager.get_frame() {
                Ok(frame) => break frame,
                Err(err)
                    if matches!(err.kind(), ErrorKind::FrameEmpty | ErrorKind::FrameNotUpdated)
                        && Instant::now() < deadline =>
                {
                    continue;
                }
                Err(err) => {
                    let _ = manager.close_device();
                    return Err(err.into());
                }
            }
        };

        let path = frame_path(&output, index, &format);
        std::fs::write(&path, &frame.data)?;
        println!(
            "Frame {} saved: {} ({} bytes)",
            frame.sequence,
            path.display(),
            frame.data.len()
        );
    }

    manager.close_device()?;
    Ok(())
}
