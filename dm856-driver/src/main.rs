//! Interactive programmer for DM856 stepper drivers.
//!
//! Connects to the driver over Modbus RTU and offers a single-key menu to
//! list and set parameters, save them to EEPROM, and run the self-tests.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use cli::Menu;
use dm856_driver::{DeviceDriver, ProgrammerConfig};

const DEFAULT_CONFIG: &str = "dm856.json5";

/// Modbus RTU programmer for DM856 stepper drivers.
#[derive(Parser, Debug)]
#[command(name = "dm856-tool")]
#[command(about = "Configure and self-test a DM856 stepper driver over Modbus RTU")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format). Defaults to dm856.json5 when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the serial port path.
    #[arg(short, long)]
    port: Option<String>,

    /// Override the baud rate.
    #[arg(short, long)]
    baud_rate: Option<u32>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> Result<ProgrammerConfig> {
    let config = match &args.config {
        Some(path) => ProgrammerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            ProgrammerConfig::load_from_file(DEFAULT_CONFIG)
                .with_context(|| format!("Failed to load config from {:?}", DEFAULT_CONFIG))?
        }
        None => ProgrammerConfig::default(),
    };

    let config = config.with_overrides(args.port.clone(), args.baud_rate);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    // Initialize logging
    let log_config = config
        .logging
        .with_level_override(args.log_level.as_deref());
    dm856_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting dm856-tool");

    let driver = DeviceDriver::open(&config.serial)
        .with_context(|| format!("Cannot open serial port {}", config.serial.port))?;

    let input = BufReader::new(tokio::io::stdin()).lines();
    let mut menu = Menu::new(driver, input, std::io::stdout());
    let outcome = menu.run().await;

    if let Err(e) = menu.into_driver().close().await {
        error!("Failed to close serial link: {}", e);
    }
    info!("dm856-tool stopped");

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "dm856-tool",
            "--port",
            "/dev/ttyACM1",
            "--baud-rate",
            "19200",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(args.baud_rate, Some(19200));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ serial: {{ port: '/dev/ttyS0', baud_rate: 9600 }} }}").unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            port: None,
            baud_rate: Some(57600),
            log_level: None,
        };

        let config = load_config(&args).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyS0");
        assert_eq!(config.serial.baud_rate, 57600);
    }

    #[test]
    fn test_explicit_missing_config_fails() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/dm856.json5")),
            port: None,
            baud_rate: None,
            log_level: None,
        };

        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_override_rejects_zero_baud_rate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();
        let args = Args {
            config: Some(file.path().to_path_buf()),
            port: None,
            baud_rate: Some(0),
            log_level: None,
        };
        assert!(load_config(&args).is_err());
    }
}
