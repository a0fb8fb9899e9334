use crate::domain::model::Protocol;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NatPmpError {
    #[error("Failed to create port directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("natpmpc command failed for {protocol} ({status}): `{command}`: {stderr}")]
    ToolFailure {
        protocol: Protocol,
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find public port in {protocol} output")]
    PortParse {
        protocol: Protocol,
        output: String,
    },

    #[error("Failed to write port to {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove port file {}: {source}", path.display())]
    FileRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Logging setup error: {message}")]
    LoggingError { message: String },
}

impl NatPmpError {
    /// Transient errors are retried by the renewal loop; everything else
    /// ends the daemon.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NatPmpError::ToolFailure { .. } | NatPmpError::PortParse { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            NatPmpError::DirectoryCreation { .. } | NatPmpError::FileWrite { .. } => {
                "Check that the port file directory is writable by this user"
            }
            NatPmpError::Spawn { .. } => {
                "Install natpmpc (libnatpmp) or point --natpmpc-path at the binary"
            }
            NatPmpError::ToolFailure { .. } | NatPmpError::PortParse { .. } => {
                "Check that the gateway supports NAT-PMP and --gateway-ip is correct"
            }
            NatPmpError::ConfigError { .. }
            | NatPmpError::InvalidConfigValueError { .. }
            | NatPmpError::TomlError(_) => "Review the command line flags and config file",
            NatPmpError::LoggingError { .. } => "Check that the log file location is writable",
            _ => "See the log for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, NatPmpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let tool = NatPmpError::ToolFailure {
            protocol: Protocol::Udp,
            command: "natpmpc -a 1 0 udp 60 -g 10.2.0.1".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "timeout".to_string(),
        };
        assert!(tool.is_transient());

        let spawn = NatPmpError::Spawn {
            command: "natpmpc".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!spawn.is_transient());
    }

    #[test]
    fn test_port_parse_message_names_protocol() {
        let err = NatPmpError::PortParse {
            protocol: Protocol::Tcp,
            output: String::new(),
        };
        assert_eq!(err.to_string(), "Could not find public port in tcp output");
    }

    #[test]
    fn test_logging_error_points_at_log_file() {
        let err = NatPmpError::LoggingError {
            message: "Failed to open log file /var/log/auto-natpmp/auto-natpmp.log".to_string(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().starts_with("Logging setup error: "));
        assert_eq!(
            err.recovery_suggestion(),
            "Check that the log file location is writable"
        );
    }
}
