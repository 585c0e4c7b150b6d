//! Layerloop CLI
//!
//! Command-line interface for offline looper runs.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use layerloop::cli::{commands, Cli, Commands};
use layerloop::EngineConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Layerloop v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(cmd, config),
        None => {
            println!("Layerloop v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: EngineConfig) -> Result<()> {
    match cmd {
        Commands::Demo {
            output,
            seconds,
            layer_mode,
            bits,
        } => commands::demo(config, &output, seconds, layer_mode, bits),
        Commands::Loop {
            input,
            output,
            passes,
            layer_mode,
            additive,
            drive,
            delay_ms,
            speed,
            reverse,
            bits,
        } => commands::loop_file(
            config, &input, &output, passes, layer_mode, additive, drive, delay_ms, speed,
            reverse, bits,
        ),
        Commands::CheckConfig {
            path,
            write_default,
        } => commands::check_config(&path, write_default),
    }
}
