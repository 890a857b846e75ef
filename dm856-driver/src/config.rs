//! Configuration for the DM856 programmer.

use serde::{Deserialize, Serialize};
use std::path::Path;

use dm856_common::{Error as ConfigError, LoggingConfig};

/// Complete programmer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgrammerConfig {
    /// Serial link to the driver
    #[serde(default)]
    pub serial: SerialConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port settings.
///
/// Framing is fixed by the device: 8 data bits, no parity, 2 stop bits,
/// no flow control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate (default: 38400)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    38400
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl ProgrammerConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ProgrammerConfig = dm856_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file values.
    pub fn with_overrides(mut self, port: Option<String>, baud_rate: Option<u32>) -> Self {
        if let Some(port) = port {
            self.serial.port = port;
        }
        if let Some(baud_rate) = baud_rate {
            self.serial.baud_rate = baud_rate;
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::validation("Serial port cannot be empty"));
        }

        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation(format!(
                "Serial port '{}': baud_rate must be greater than 0",
                self.serial.port
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm856_common::LogFormat;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            serial: { port: "/dev/ttyS1", baud_rate: 115200 },
            logging: { level: "debug", format: "json" }
        }"#;

        let config: ProgrammerConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.serial.port, "/dev/ttyS1");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_defaults() {
        let config: ProgrammerConfig = json5::from_str("{}").unwrap();

        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 38400);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_serial_section() {
        let config: ProgrammerConfig =
            json5::from_str(r#"{ serial: { port: "COM3" } }"#).unwrap();

        assert_eq!(config.serial.port, "COM3");
        assert_eq!(config.serial.baud_rate, 38400);
    }

    #[test]
    fn test_overrides() {
        let config = ProgrammerConfig::default()
            .with_overrides(Some("/dev/ttyACM0".to_string()), Some(9600));

        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 9600);

        let untouched = ProgrammerConfig::default().with_overrides(None, None);
        assert_eq!(untouched.serial, SerialConfig::default());
    }

    #[test]
    fn test_validate_empty_port() {
        let config: ProgrammerConfig = json5::from_str(r#"{ serial: { port: " " } }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_baud_rate() {
        let config: ProgrammerConfig =
            json5::from_str(r#"{ serial: { baud_rate: 0 } }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_load_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ serial: {{ port: '' }} }}").unwrap();

        assert!(ProgrammerConfig::load_from_file(file.path()).is_err());
    }
}
