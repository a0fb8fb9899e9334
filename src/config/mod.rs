pub mod cli;
pub mod toml_config;

use crate::core::renewal::RenewalSettings;
use crate::utils::error::{NatPmpError, Result};
use crate::utils::validation::{
    validate_file_path, validate_non_empty_string, validate_seconds, Validate,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

pub use cli::CliArgs;

pub const DEFAULT_PORT_FILE: &str = "/var/run/auto-natpmp/port";
pub const DEFAULT_GATEWAY_IP: &str = "10.2.0.1";
pub const DEFAULT_FORWARD_LIFETIME: u64 = 60;
pub const DEFAULT_SLEEP_TIME: u64 = 45;
pub const DEFAULT_RETRY_INTERVAL: u64 = 5;
pub const DEFAULT_LOG_FILE: &str = "/var/log/auto-natpmp/auto-natpmp.log";
pub const DEFAULT_LOCAL_PORT: u16 = 0;
pub const DEFAULT_EXTERNAL_PORT: u16 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// tracing has no level above ERROR, so CRITICAL folds into it.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file: PathBuf,
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_LOG_FILE),
            level: LogLevel::default(),
            format: LogFormat::default(),
        }
    }
}

/// Effective daemon settings after merging defaults, the config file and
/// command line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port_file: PathBuf,
    pub gateway_ip: String,
    pub lifetime: u64,
    pub sleep_time: u64,
    pub retry_interval: u64,
    pub local_port: u16,
    pub external_port: u16,
    pub natpmpc_path: PathBuf,
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port_file: PathBuf::from(DEFAULT_PORT_FILE),
            gateway_ip: DEFAULT_GATEWAY_IP.to_string(),
            lifetime: DEFAULT_FORWARD_LIFETIME,
            sleep_time: DEFAULT_SLEEP_TIME,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            local_port: DEFAULT_LOCAL_PORT,
            external_port: DEFAULT_EXTERNAL_PORT,
            natpmpc_path: PathBuf::from(crate::adapters::natpmpc::DEFAULT_NATPMPC),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    pub fn gateway(&self) -> Result<Ipv4Addr> {
        self.gateway_ip
            .trim()
            .parse()
            .map_err(|e| NatPmpError::InvalidConfigValueError {
                field: "gateway_ip".to_string(),
                value: self.gateway_ip.clone(),
                reason: format!("Not an IPv4 address: {}", e),
            })
    }

    pub fn renewal_settings(&self) -> Result<RenewalSettings> {
        Ok(RenewalSettings {
            gateway: self.gateway()?,
            external_port: self.external_port,
            local_port: self.local_port,
            lifetime: Duration::from_secs(self.lifetime),
            sleep_interval: Duration::from_secs(self.sleep_time),
            retry_interval: Duration::from_secs(self.retry_interval),
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "Gateway={}, Lifetime={}s, Sleep={}s, Retry={}s, PortFile={}, Local Port={}, External Port={}",
            self.gateway_ip,
            self.lifetime,
            self.sleep_time,
            self.retry_interval,
            self.port_file.display(),
            self.local_port,
            self.external_port
        )
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_file_path("port_file", &self.port_file)?;
        validate_file_path("log_file", &self.logging.file)?;
        validate_non_empty_string("natpmpc_path", &self.natpmpc_path.to_string_lossy())?;
        self.gateway()?;

        validate_seconds("lifetime", self.lifetime, 1)?;
        validate_seconds("sleep_time", self.sleep_time, 1)?;
        validate_seconds("retry_interval", self.retry_interval, 1)?;

        // 續約必須在租期到期前完成
        if self.sleep_time >= self.lifetime {
            return Err(NatPmpError::InvalidConfigValueError {
                field: "sleep_time".to_string(),
                value: self.sleep_time.to_string(),
                reason: format!(
                    "Must be shorter than lifetime ({}s) or the mapping lapses between renewals",
                    self.lifetime
                ),
            });
        }

        if self.lifetime > u64::from(u32::MAX) {
            return Err(NatPmpError::InvalidConfigValueError {
                field: "lifetime".to_string(),
                value: self.lifetime.to_string(),
                reason: format!("Value must be at most {}", u32::MAX),
            });
        }

        Ok(())
    }
}
