// SPDX-License-Identifier: GPL-3.0-only

use capture_ring::backends::camera::PixelFormat;
use capture_ring::constants::app_info;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "capture-ring")]
#[command(about = "Rotate, preview and persist camera frames into a ring of 500 JPEG files")]
#[command(version = app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Nv21,
    Nv12,
}

impl From<FormatArg> for PixelFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Nv21 => PixelFormat::Nv21,
            FormatArg::Nv12 => PixelFormat::Nv12,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture pipeline
    Run {
        /// Output directory (default: ~/Pictures/capture-ring)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many frames
        #[arg(short = 'n', long)]
        frames: Option<u64>,

        /// Read raw frames from a file instead of the test pattern
        #[arg(short, long, requires_all = ["width", "height"])]
        input: Option<PathBuf>,

        /// Frame width of the input file (sensor orientation)
        #[arg(long)]
        width: Option<u32>,

        /// Frame height of the input file (sensor orientation)
        #[arg(long)]
        height: Option<u32>,

        /// Restart the input file when it runs out
        #[arg(long = "loop", requires = "input")]
        looping: bool,

        /// Chroma order of the captured frames
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Never drop save jobs when the disk falls behind
        #[arg(long)]
        unbounded_backlog: bool,

        /// Periodically write the latest preview as raw RGB565 to this file
        #[arg(long)]
        preview_dump: Option<PathBuf>,
    },

    /// Rotate and encode a single raw frame
    Rotate {
        /// Raw semi-planar 4:2:0 frame
        #[arg(short, long)]
        input: PathBuf,

        /// Frame width (sensor orientation)
        #[arg(long)]
        width: u32,

        /// Frame height (sensor orientation)
        #[arg(long)]
        height: u32,

        /// Output JPEG path
        #[arg(short, long)]
        output: PathBuf,

        /// Chroma order of the frame
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=capture_ring=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            output,
            frames,
            input,
            width,
            height,
            looping,
            format,
            unbounded_backlog,
            preview_dump,
        } => cli::run_capture(cli::RunArgs {
            output,
            frames,
            input: input.zip(width.zip(height)),
            looping,
            pixel_format: format.map(PixelFormat::from),
            unbounded_backlog,
            preview_dump,
        }),
        Commands::Rotate {
            input,
            width,
            height,
            output,
            format,
        } => cli::rotate_file(
            &input,
            width,
            height,
            &output,
            format.map(PixelFormat::from),
        ),
        Commands::Config { save } => cli::print_config(save),
    }
}
