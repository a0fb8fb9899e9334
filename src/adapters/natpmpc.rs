//! Gateway client backed by the `natpmpc` command line tool from libnatpmp.
//!
//! Each call runs the tool exactly once:
//!
//! ```text
//! natpmpc -a <external_port> <local_port> <udp|tcp> <lifetime> -g <gateway>
//! ```
//!
//! and scans its stdout for `Mapped public port N`.

use crate::domain::model::{MappingRequest, MappingResult, Protocol};
use crate::domain::ports::Gateway;
use crate::utils::error::{NatPmpError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;

pub const DEFAULT_NATPMPC: &str = "natpmpc";

static MAPPED_PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Mapped public port (\d+)").expect("Invalid regex pattern"));

/// Extracts the mapped external port from natpmpc output.
pub fn parse_mapped_port(protocol: Protocol, output: &str) -> Result<u16> {
    MAPPED_PORT_RE
        .captures(output)
        .and_then(|caps| caps[1].parse::<u16>().ok())
        .ok_or_else(|| NatPmpError::PortParse {
            protocol,
            output: output.to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct NatpmpcClient {
    program: PathBuf,
}

impl NatpmpcClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn command_args(request: &MappingRequest) -> Vec<String> {
        vec![
            "-a".to_string(),
            request.external_port.to_string(),
            request.local_port.to_string(),
            request.protocol.as_str().to_string(),
            request.lifetime_seconds.to_string(),
            "-g".to_string(),
            request.gateway.to_string(),
        ]
    }

    fn display_command(&self, args: &[String]) -> String {
        format!("{} {}", self.program.display(), args.join(" "))
    }
}

impl Default for NatpmpcClient {
    fn default() -> Self {
        Self::new(DEFAULT_NATPMPC)
    }
}

#[async_trait]
impl Gateway for NatpmpcClient {
    async fn request_mapping(&self, request: &MappingRequest) -> Result<MappingResult> {
        let args = Self::command_args(request);
        let command = self.display_command(&args);
        tracing::debug!("Running command: {}", command);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| NatPmpError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            tracing::error!(
                "natpmpc command failed for {}: {}",
                request.protocol,
                output.status
            );
            tracing::error!("Error output: {}", stderr);
            return Err(NatPmpError::ToolFailure {
                protocol: request.protocol,
                command,
                status: output.status.to_string(),
                stderr,
            });
        }

        // 成功但沒有任何輸出，視為呼叫失敗
        if stdout.trim().is_empty() {
            tracing::error!("natpmpc produced no output for {}", request.protocol);
            return Err(NatPmpError::ToolFailure {
                protocol: request.protocol,
                command,
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "no output".to_string()
                } else {
                    stderr
                },
            });
        }

        let mapped_external_port = match parse_mapped_port(request.protocol, &stdout) {
            Ok(port) => Some(port),
            Err(e) => {
                tracing::warn!("{}", e);
                tracing::debug!("Full output: {}", stdout);
                None
            }
        };

        Ok(MappingResult {
            protocol: request.protocol,
            mapped_external_port,
            raw_output: stdout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const SAMPLE_OUTPUT: &str = "initnatpmp() returned 0 (SUCCESS)\n\
using gateway : 10.2.0.1\n\
sendpublicaddressrequest returned 2 (SUCCESS)\n\
readnatpmpresponseorretry returned 0 (OK)\n\
Public IP address : 198.51.100.7\n\
epoch = 1712\n\
sendnewportmappingrequest returned 12 (SUCCESS)\n\
readnatpmpresponseorretry returned 0 (OK)\n\
Mapped public port 43517 protocol UDP to local port 0 lifetime 60\n\
epoch = 1712\n\
closenatpmp() returned 0 (SUCCESS)\n";

    #[test]
    fn test_parse_mapped_port() {
        assert_eq!(parse_mapped_port(Protocol::Udp, SAMPLE_OUTPUT).unwrap(), 43517);
    }

    #[test]
    fn test_parse_mapped_port_missing() {
        let err = parse_mapped_port(Protocol::Tcp, "readnatpmpresponseorretry returned -7")
            .unwrap_err();
        assert!(matches!(
            err,
            NatPmpError::PortParse {
                protocol: Protocol::Tcp,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_mapped_port_out_of_range() {
        assert!(parse_mapped_port(Protocol::Udp, "Mapped public port 70000 protocol UDP").is_err());
    }

    #[test]
    fn test_command_args_order() {
        let request = MappingRequest {
            protocol: Protocol::Tcp,
            external_port: 1,
            local_port: 0,
            lifetime_seconds: 60,
            gateway: Ipv4Addr::new(10, 2, 0, 1),
        };
        assert_eq!(
            NatpmpcClient::command_args(&request),
            vec!["-a", "1", "0", "tcp", "60", "-g", "10.2.0.1"]
        );
    }
}
