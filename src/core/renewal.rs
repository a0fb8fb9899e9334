//! The renewal loop that keeps the NAT-PMP mapping alive.
//!
//! Each iteration walks the same states:
//!
//! - **Requesting**: map UDP, then TCP, with identical parameters. A tool
//!   failure on either jumps straight to *RetryBackoff*.
//! - **Validating**: compare the two mapped ports. A mismatch is logged and
//!   the TCP port is used; a missing port skips publication.
//! - **Publishing**: write the canonical port if it differs from the last
//!   published one.
//! - **Sleeping** / **RetryBackoff**: wait `sleep_interval` after a
//!   completed iteration, `retry_interval` after a failed request.
//!
//! Cancellation is checked while requesting and while waiting. A publish
//! that has started always runs to completion. Whether the loop ends on
//! cancellation or on a fatal error, the port file is cleared exactly once
//! on the way out.

use crate::domain::model::{validate, MappingRequest, Protocol, Validation};
use crate::domain::ports::{Gateway, PortStore};
use crate::utils::error::{NatPmpError, Result};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalSettings {
    pub gateway: Ipv4Addr,
    pub external_port: u16,
    pub local_port: u16,
    pub lifetime: Duration,
    pub sleep_interval: Duration,
    pub retry_interval: Duration,
}

impl RenewalSettings {
    pub fn request(&self, protocol: Protocol) -> MappingRequest {
        MappingRequest {
            protocol,
            external_port: self.external_port,
            local_port: self.local_port,
            lifetime_seconds: u32::try_from(self.lifetime.as_secs()).unwrap_or(u32::MAX),
            gateway: self.gateway,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// A new port was written to the store.
    Published(u16),
    /// The canonical port matches what is already published.
    Unchanged(u16),
    /// The store rejected the write; the next iteration tries again.
    PublishFailed(u16),
    /// Both requests ran but at least one port could not be read.
    MissingPort,
    /// The request for this protocol failed.
    Backoff(Protocol),
}

impl IterationOutcome {
    pub fn is_backoff(&self) -> bool {
        matches!(self, IterationOutcome::Backoff(_))
    }
}

enum Requested {
    /// The tool ran; the port is `None` if its output had none.
    Ran(Option<u16>),
    Failed,
}

/// Result of the Requesting state for both protocols.
enum Negotiated {
    Ports { udp: Option<u16>, tcp: Option<u16> },
    Failed(Protocol),
}

pub struct RenewalLoop<G: Gateway, S: PortStore> {
    gateway: G,
    store: S,
    settings: RenewalSettings,
    last_known_port: Option<u16>,
}

impl<G: Gateway, S: PortStore> RenewalLoop<G, S> {
    pub fn new(gateway: G, store: S, settings: RenewalSettings) -> Self {
        Self {
            gateway,
            store,
            settings,
            last_known_port: None,
        }
    }

    pub fn last_known_port(&self) -> Option<u16> {
        self.last_known_port
    }

    /// Runs until `shutdown` is cancelled or a non-transient error occurs,
    /// then clears the published port.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let result = self.drive(&shutdown).await;

        match &result {
            Ok(()) => tracing::info!("Renewal loop stopped, cleaning up"),
            Err(e) => tracing::error!("Unexpected error: {}", e),
        }

        if let Err(e) = self.store.clear().await {
            tracing::error!("Error during cleanup: {}", e);
        }

        result
    }

    async fn drive(&mut self, shutdown: &CancellationToken) -> Result<()> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            let negotiated = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                negotiated = self.negotiate() => negotiated?,
            };
            // 發布不可中途取消，否則 rename 可能在 clear 之後才完成
            let outcome = self.settle(negotiated).await;

            let delay = if outcome.is_backoff() {
                self.settings.retry_interval
            } else {
                self.settings.sleep_interval
            };
            tracing::debug!("Iteration finished with {:?}, waiting {:?}", outcome, delay);

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One Requesting -> Validating -> Publishing pass.
    ///
    /// Only non-transient errors (e.g. natpmpc missing) are returned as `Err`.
    pub async fn run_iteration(&mut self) -> Result<IterationOutcome> {
        let negotiated = self.negotiate().await?;
        Ok(self.settle(negotiated).await)
    }

    /// Requesting: UDP first, TCP only if UDP did not fail.
    async fn negotiate(&self) -> Result<Negotiated> {
        tracing::info!(
            "Running NAT-PMP forwarding at {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let udp = match self.request(Protocol::Udp).await? {
            Requested::Ran(port) => port,
            Requested::Failed => return Ok(Negotiated::Failed(Protocol::Udp)),
        };
        let tcp = match self.request(Protocol::Tcp).await? {
            Requested::Ran(port) => port,
            Requested::Failed => return Ok(Negotiated::Failed(Protocol::Tcp)),
        };

        Ok(Negotiated::Ports { udp, tcp })
    }

    /// Validating and Publishing.
    async fn settle(&mut self, negotiated: Negotiated) -> IterationOutcome {
        let (udp, tcp) = match negotiated {
            Negotiated::Ports { udp, tcp } => (udp, tcp),
            Negotiated::Failed(protocol) => return IterationOutcome::Backoff(protocol),
        };

        let validation = validate(udp, tcp);
        if let Validation::Mismatch { udp, tcp } = validation {
            tracing::warn!("UDP port ({}) does not match TCP port ({})", udp, tcp);
        }
        let Some(port) = validation.canonical() else {
            tracing::warn!("Failed to extract ports from output");
            return IterationOutcome::MissingPort;
        };

        self.publish(port).await
    }

    async fn request(&self, protocol: Protocol) -> Result<Requested> {
        let request = self.settings.request(protocol);
        match self.gateway.request_mapping(&request).await {
            Ok(result) => Ok(Requested::Ran(result.mapped_external_port)),
            Err(NatPmpError::PortParse { .. }) => Ok(Requested::Ran(None)),
            Err(e) if e.is_transient() => {
                tracing::error!("{} forwarding failed, will retry", protocol.label());
                tracing::debug!("{} failure: {}", protocol.label(), e);
                Ok(Requested::Failed)
            }
            Err(e) => Err(e),
        }
    }

    async fn publish(&mut self, port: u16) -> IterationOutcome {
        if self.last_known_port == Some(port) {
            tracing::debug!("Port {} unchanged", port);
            return IterationOutcome::Unchanged(port);
        }

        match self.store.publish(port).await {
            Ok(()) => {
                self.last_known_port = Some(port);
                tracing::info!("Port updated to {}", port);
                IterationOutcome::Published(port)
            }
            Err(e) => {
                tracing::error!("{}", e);
                IterationOutcome::PublishFailed(port)
            }
        }
    }
}
