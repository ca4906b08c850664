// SPDX-License-Identifier: GPL-3.0-only

use becam::{Config, FourCc, logging};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "becam")]
#[command(about = "Capture frames from video devices")]
#[command(version = env!("BECAM_GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices and their formats
    List,

    /// Open a device and write frames to disk
    Capture {
        /// Device index (from 'becam list') or identity
        #[arg(short, long, default_value = "0")]
        device: String,

        /// Frame width (0 selects automatically)
        #[arg(long, default_value = "0")]
        width: u32,

        /// Frame height (0 selects automatically)
        #[arg(long, default_value = "0")]
        height: u32,

        /// Frames per second (0 selects automatically)
        #[arg(long, default_value = "0")]
        fps: u32,

        /// Pixel format as a FourCC, e.g. MJPG or YUY2
        #[arg(short, long, default_value = "MJPG")]
        format: FourCc,

        /// Number of frames to write
        #[arg(short = 'n', long, default_value = "1")]
        frames: u32,

        /// Output directory (default: ~/Pictures/becam)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the configured filter, e.g. RUST_LOG=becam=debug
    let config = logging::init_from(Config::try_load());

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_devices(config),
        Commands::Capture {
            device,
            width,
            height,
            fps,
            format,
            frames,
            output,
        } => cli::capture(
            config,
            &device,
            cli::CaptureRequest {
                width,
                height,
                fps,
                encoding: format,
            },
            frames,
            output,
        ),
    }
}
