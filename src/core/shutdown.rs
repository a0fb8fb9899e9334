use crate::utils::error::{NatPmpError, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Installs SIGTERM and SIGINT handlers and cancels `shutdown` on the first
/// one received.
///
/// The handlers are registered before this returns, so a signal arriving
/// right after startup is never lost.
pub fn listen_for_shutdown(shutdown: CancellationToken) -> Result<JoinHandle<()>> {
    let mut terminate = signal(SignalKind::terminate()).map_err(NatPmpError::Signal)?;
    let mut interrupt = signal(SignalKind::interrupt()).map_err(NatPmpError::Signal)?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
            // 其他路徑已經要求停止
            _ = shutdown.cancelled() => return,
        };
        tracing::info!("Received {} to exit. Cleaning up...", name);
        shutdown.cancel();
    }))
}
