use crate::domain::model::{MappingRequest, MappingResult};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Talks NAT-PMP to the gateway. One call is one negotiation; no retries.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn request_mapping(&self, request: &MappingRequest) -> Result<MappingResult>;
}

/// Where the current external port is published for other processes.
pub trait PortStore: Send + Sync {
    fn ensure_directory(&self) -> impl std::future::Future<Output = Result<()>> + Send;
    fn publish(&self, port: u16) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Returns whether something was actually removed.
    fn clear(&self) -> impl std::future::Future<Output = Result<bool>> + Send;
}
