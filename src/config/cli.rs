use super::{LogFormat, LogLevel, Settings};
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

/// Command line flags. Every flag is optional; unset flags fall back to the
/// config file, then to the built-in defaults.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "auto-natpmp")]
#[command(about = "NAT-PMP port forwarding service with port tracking")]
pub struct CliArgs {
    /// TOML config file; flags given here take precedence over it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// File to store the current public port [default: /var/run/auto-natpmp/port]
    #[arg(long)]
    pub port_file: Option<PathBuf>,

    /// Gateway IP address [default: 10.2.0.1]
    #[arg(long)]
    pub gateway_ip: Option<String>,

    /// Port forwarding lifetime in seconds [default: 60]
    #[arg(long)]
    pub lifetime: Option<u64>,

    /// Sleep time between iterations in seconds [default: 45]
    #[arg(long)]
    pub sleep_time: Option<u64>,

    /// Wait before retrying a failed natpmpc call, in seconds [default: 5]
    #[arg(long)]
    pub retry_interval: Option<u64>,

    /// Log file location [default: /var/log/auto-natpmp/auto-natpmp.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Logging level [default: INFO]
    #[arg(long, value_enum, ignore_case = true)]
    pub log_level: Option<LogLevel>,

    /// Log line format [default: compact]
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Local port to forward [default: 0]
    #[arg(long)]
    pub local_port: Option<u16>,

    /// External port to request [default: 1]
    #[arg(long)]
    pub external_port: Option<u16>,

    /// natpmpc binary to invoke [default: natpmpc]
    #[arg(long)]
    pub natpmpc_path: Option<PathBuf>,
}

impl CliArgs {
    /// Loads the config file (if any) and applies the flags on top.
    pub fn into_settings(self) -> Result<Settings> {
        let base = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        Ok(self.apply(base))
    }

    pub fn apply(self, mut settings: Settings) -> Settings {
        if let Some(v) = self.port_file {
            settings.port_file = v;
        }
        if let Some(v) = self.gateway_ip {
            settings.gateway_ip = v;
        }
        if let Some(v) = self.lifetime {
            settings.lifetime = v;
        }
        if let Some(v) = self.sleep_time {
            settings.sleep_time = v;
        }
        if let Some(v) = self.retry_interval {
            settings.retry_interval = v;
        }
        if let Some(v) = self.local_port {
            settings.local_port = v;
        }
        if let Some(v) = self.external_port {
            settings.external_port = v;
        }
        if let Some(v) = self.natpmpc_path {
            settings.natpmpc_path = v;
        }
        if let Some(v) = self.log_file {
            settings.logging.file = v;
        }
        if let Some(v) = self.log_level {
            settings.logging.level = v;
        }
        if let Some(v) = self.log_format {
            settings.logging.format = v;
        }
        settings
    }
}
