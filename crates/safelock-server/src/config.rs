//! Server configuration.
//!
//! Three layers, highest priority first: command-line flags, the TOML file
//! named by `--config`, built-in defaults.
//!
//! ```toml
//! listen = "0.0.0.0:8080"
//! eeprom = "/var/lib/safelock/region"
//! gpio_root = "/sys/class/gpio"
//! chip_id = 0xC0FFEE
//! update_dir = "/var/lib/safelock/updates"
//!
//! [[networks]]
//! name = "home"
//! credential = "hunter2"
//! ```

use std::{fs, path::PathBuf};

use clap::Parser;
use safelock_core::NetworkCredentials;
use serde::Deserialize;

use crate::ServerError;

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Default location of the persistent region.
pub const DEFAULT_EEPROM: &str = "safelock.eeprom";

/// Default sysfs GPIO root.
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Command-line arguments.
#[derive(Debug, Default, Parser)]
#[command(name = "safelock-server")]
#[command(about = "Network-attached safe lock")]
pub struct Args {
    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub listen: Option<String>,

    /// File holding the persistent region
    #[arg(long)]
    pub eeprom: Option<PathBuf>,

    /// Directory containing the gpioN value files
    #[arg(long)]
    pub gpio_root: Option<PathBuf>,

    /// Hardware id used to name the standalone network
    #[arg(long)]
    pub chip_id: Option<u32>,

    /// Directory watched for firmware images while update mode is on
    #[arg(long)]
    pub update_dir: Option<PathBuf>,
}

/// One reachable network in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkEntry {
    /// Network name
    pub name: String,
    /// Network credential
    #[serde(default)]
    pub credential: String,
}

/// Contents of the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Address to listen on
    pub listen: Option<String>,
    /// File holding the persistent region
    pub eeprom: Option<PathBuf>,
    /// sysfs GPIO root
    pub gpio_root: Option<PathBuf>,
    /// Hardware id
    pub chip_id: Option<u32>,
    /// Firmware drop directory
    pub update_dir: Option<PathBuf>,
    /// Networks the host radio can reach
    pub networks: Vec<NetworkEntry>,
}

impl FileConfig {
    /// Parse config file contents.
    pub fn parse(text: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(text)?)
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen: String,
    /// File holding the persistent region
    pub eeprom: PathBuf,
    /// sysfs GPIO root
    pub gpio_root: PathBuf,
    /// Hardware id
    pub chip_id: u32,
    /// Firmware drop directory, if updates are accepted
    pub update_dir: Option<PathBuf>,
    /// Networks the host radio can reach; empty means any
    pub networks: Vec<NetworkCredentials>,
}

impl ServerConfig {
    /// Read the file named by `--config`, if any, and layer the flags on top.
    pub fn load(args: Args) -> Result<Self, ServerError> {
        let file = match &args.config {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|err| {
                    ServerError::Config(format!("cannot read {}: {err}", path.display()))
                })?;
                FileConfig::parse(&text)?
            },
            None => FileConfig::default(),
        };
        Ok(Self::merge(args, file))
    }

    /// Layer `args` over `file` over defaults.
    pub fn merge(args: Args, file: FileConfig) -> Self {
        Self {
            listen: args.listen.or(file.listen).unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            eeprom: args.eeprom.or(file.eeprom).unwrap_or_else(|| DEFAULT_EEPROM.into()),
            gpio_root: args.gpio_root.or(file.gpio_root).unwrap_or_else(|| DEFAULT_GPIO_ROOT.into()),
            chip_id: args.chip_id.or(file.chip_id).unwrap_or(0),
            update_dir: args.update_dir.or(file.update_dir),
            networks: file
                .networks
                .into_iter()
                .map(|entry| NetworkCredentials { name: entry.name, credential: entry.credential })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_flags() {
        let config = ServerConfig::merge(Args::default(), FileConfig::default());
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.eeprom, PathBuf::from(DEFAULT_EEPROM));
        assert_eq!(config.gpio_root, PathBuf::from(DEFAULT_GPIO_ROOT));
        assert_eq!(config.chip_id, 0);
        assert!(config.update_dir.is_none());
        assert!(config.networks.is_empty());
    }

    #[test]
    fn file_values_parsed() {
        let file = FileConfig::parse(
            r#"
            listen = "0.0.0.0:80"
            chip_id = 0xC0FFEE

            [[networks]]
            name = "home"
            credential = "hunter2"

            [[networks]]
            name = "cafe"
            "#,
        )
        .unwrap();

        let config = ServerConfig::merge(Args::default(), file);
        assert_eq!(config.listen, "0.0.0.0:80");
        assert_eq!(config.chip_id, 0x00C0_FFEE);
        assert_eq!(config.networks, vec![
            NetworkCredentials { name: "home".into(), credential: "hunter2".into() },
            NetworkCredentials { name: "cafe".into(), credential: String::new() },
        ]);
    }

    #[test]
    fn flags_win_over_file() {
        let file = FileConfig { listen: Some("0.0.0.0:80".into()), chip_id: Some(1), ..Default::default() };
        let args = Args { listen: Some("127.0.0.1:9000".into()), ..Default::default() };

        let config = ServerConfig::merge(args, file);
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.chip_id, 1);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result = FileConfig::parse("listen = \"x\"\nport = 80\n");
        assert!(matches!(result, Err(ServerError::ConfigFile(_))));
    }

    #[test]
    fn config_file_loaded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safelock.toml");
        fs::write(&path, "eeprom = \"/tmp/region\"\n").unwrap();

        let args = Args { config: Some(path), ..Default::default() };
        let config = ServerConfig::load(args).unwrap();
        assert_eq!(config.eeprom, PathBuf::from("/tmp/region"));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let args = Args { config: Some("/nonexistent/safelock.toml".into()), ..Default::default() };
        let err = ServerConfig::load(args).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/safelock.toml"));
    }

    #[test]
    fn cli_parses_flags() {
        let args = Args::parse_from(["safelock-server", "--listen", "0.0.0.0:1", "--chip-id", "42"]);
        assert_eq!(args.listen.as_deref(), Some("0.0.0.0:1"));
        assert_eq!(args.chip_id, Some(42));
    }
}
