//! CLI Module
//!
//! Offline front end for the looper core: scripted demos, looping a WAV
//! file, and config validation.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Layerloop - multi-layer looper core
#[derive(Parser, Debug)]
#[command(name = "layerloop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine config (JSON); defaults are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a scripted multi-layer performance of generated tones
    #[command(name = "demo")]
    Demo {
        /// Output WAV file
        output: PathBuf,

        /// Length of the first recording in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f32,

        /// Use Layer mixing instead of Track mixing
        #[arg(long)]
        layer_mode: bool,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 24)]
        bits: u16,
    },

    /// Record a WAV file as layer 1 and render several passes of the loop
    #[command(name = "loop")]
    Loop {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Loop passes to render after recording
        #[arg(short, long, default_value_t = 4)]
        passes: usize,

        /// Use Layer mixing instead of Track mixing
        #[arg(long)]
        layer_mode: bool,

        /// Compound a saturation stage into an override layer every pass
        #[arg(long)]
        additive: bool,

        /// Saturation drive for --additive, 0-1
        #[arg(long, default_value_t = 0.3)]
        drive: f32,

        /// Add a feedback delay after the loop, in milliseconds
        #[arg(long)]
        delay_ms: Option<f32>,

        /// Playback speed, 0.25-4
        #[arg(long, default_value_t = 1.0)]
        speed: f32,

        /// Play the loop backwards
        #[arg(long)]
        reverse: bool,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 24)]
        bits: u16,
    },

    /// Validate a JSON engine config
    #[command(name = "check-config")]
    CheckConfig {
        /// Config file to validate
        path: PathBuf,

        /// Write the default config to `path` first
        #[arg(long)]
        write_default: bool,
    },
}
