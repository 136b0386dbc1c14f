//! CLI argument definitions for the Parley server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Parley - a chat assistant server with live search and news grounding.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the database and the local API token.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLEY_CONFIG env var > ~/.parley/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PARLEY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// `config_port` already carries any `PARLEY_PORT` override.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        match self.port {
            Some(p) => p,
            None if config_port != 0 => config_port,
            None => 3040,
        }
    }

    /// Data directory: --data-dir flag, else the configured value.
    pub fn resolve_data_dir(&self, config_dir: &str) -> PathBuf {
        match self.data_dir {
            Some(ref p) => p.clone(),
            None => expand_home(config_dir),
        }
    }

    /// Log level: --log-level flag, else the configured value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var(var).ok().map(PathBuf::from)
}

fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".parley").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("parley").chain(list.iter().copied()))
    }

    #[test]
    fn test_no_flags() {
        let cli = args(&[]);
        assert!(cli.config.is_none());
        assert_eq!(cli.resolve_port(3040), 3040);
        assert_eq!(cli.resolve_log_level("info"), "info");
    }

    #[test]
    fn test_flags_win_over_config() {
        let cli = args(&["--port", "9000", "-l", "debug", "-d", "/tmp/parley"]);
        assert_eq!(cli.resolve_port(3040), 9000);
        assert_eq!(cli.resolve_log_level("info"), "debug");
        assert_eq!(cli.resolve_data_dir("~/.parley/data"), PathBuf::from("/tmp/parley"));
    }

    #[test]
    fn test_zero_config_port_falls_back() {
        assert_eq!(args(&[]).resolve_port(0), 3040);
    }

    #[test]
    fn test_config_flag() {
        let cli = args(&["-c", "/etc/parley.toml"]);
        assert_eq!(cli.resolve_config_path(), PathBuf::from("/etc/parley.toml"));
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/lib/parley"), PathBuf::from("/var/lib/parley"));
        assert_eq!(expand_home("relative/dir"), PathBuf::from("relative/dir"));
        assert!(!expand_home("~/data").starts_with("~"));
    }
}
