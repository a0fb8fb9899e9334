use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    /// Token natpmpc expects on its command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Udp => "UDP",
            Protocol::Tcp => "TCP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mapping request sent to the gateway. Built fresh for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRequest {
    pub protocol: Protocol,
    pub external_port: u16,
    pub local_port: u16,
    pub lifetime_seconds: u32,
    pub gateway: Ipv4Addr,
}

/// What came back from a successful gateway negotiation.
///
/// `mapped_external_port` is `None` when the tool succeeded but its output
/// did not contain a mapped port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingResult {
    pub protocol: Protocol,
    pub mapped_external_port: Option<u16>,
    pub raw_output: String,
}

/// Outcome of comparing the UDP and TCP mapping results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Agreed(u16),
    /// The gateway handed out different ports per protocol. TCP wins.
    Mismatch { udp: u16, tcp: u16 },
    Missing,
}

impl Validation {
    pub fn canonical(&self) -> Option<u16> {
        match self {
            Validation::Agreed(port) => Some(*port),
            Validation::Mismatch { tcp, .. } => Some(*tcp),
            Validation::Missing => None,
        }
    }
}

pub fn validate(udp: Option<u16>, tcp: Option<u16>) -> Validation {
    match (udp, tcp) {
        (Some(udp), Some(tcp)) if udp == tcp => Validation::Agreed(tcp),
        (Some(udp), Some(tcp)) => Validation::Mismatch { udp, tcp },
        _ => Validation::Missing,
    }
}
