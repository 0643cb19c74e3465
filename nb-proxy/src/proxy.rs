//! Bridge lifecycle
//!
//! Starts one task per channel, waits for a shutdown signal and tears every
//! bridge down. Tasks observe a shared [`CancellationToken`]; any task still
//! running one [`POLL_TICK`] after cancellation is aborted, dropping its
//! sockets and whatever messages they still hold.

use crate::bridge::{BroadcastBridge, HeartbeatBridge, KernelIdentity, RequestReplyBridge};
use crate::message::{Channel, ConnectionInfo};
use crate::signer::SigningKeys;
use crate::{ProxyError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Upper bound on how long a bridge may take to notice shutdown
pub const POLL_TICK: Duration = Duration::from_secs(1);

/// The running set of channel bridges
pub struct Proxy {
    cancel: CancellationToken,
    bridges: JoinSet<()>,
}

impl Proxy {
    /// Spawn all five bridges between `frontend` and `kernel`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(frontend: &ConnectionInfo, kernel: &ConnectionInfo) -> Self {
        let cancel = CancellationToken::new();
        let keys = SigningKeys::new(frontend, kernel);
        let identity = KernelIdentity::generate();
        let mut bridges = JoinSet::new();

        tracing::info!(
            "Bridging {:?} frontend at {} to {:?} kernel at {} (signing: frontend {}, kernel {})",
            frontend.transport,
            frontend.ip,
            kernel.transport,
            kernel.ip,
            if keys.to_frontend.is_disabled() { "off" } else { "on" },
            if keys.to_kernel.is_disabled() { "off" } else { "on" },
        );

        for channel in Channel::REQUEST_REPLY {
            let task = RequestReplyBridge::serve(
                channel,
                frontend.endpoint(channel),
                kernel.endpoint(channel),
                identity.clone(),
                keys.clone(),
                cancel.clone(),
            );
            spawn_bridge(&mut bridges, channel, task);
        }

        let task = BroadcastBridge::serve(
            frontend.endpoint(Channel::IOPub),
            kernel.endpoint(Channel::IOPub),
            keys.to_frontend.clone(),
            cancel.clone(),
        );
        spawn_bridge(&mut bridges, Channel::IOPub, task);

        let task = HeartbeatBridge::serve(
            frontend.endpoint(Channel::Heartbeat),
            kernel.endpoint(Channel::Heartbeat),
            cancel.clone(),
        );
        spawn_bridge(&mut bridges, Channel::Heartbeat, task);

        Self { cancel, bridges }
    }

    /// Wait for every bridge to stop
    pub async fn join(&mut self) {
        while self.bridges.join_next().await.is_some() {}
    }

    /// Stop all bridges, waiting at most [`POLL_TICK`] before aborting them
    pub async fn shutdown(mut self) {
        self.cancel.cancel();

        if tokio::time::timeout(POLL_TICK, self.join()).await.is_err() {
            tracing::warn!("Bridges still running after {:?}, aborting", POLL_TICK);
            self.bridges.abort_all();
            self.join().await;
        }

        tracing::info!("All bridges stopped");
    }

    /// Run until `signals` fires, or until every bridge has failed on its own
    pub async fn run_until_signal(mut self, mut signals: ShutdownSignals) -> Result<()> {
        let outcome = tokio::select! {
            result = signals.recv() => result,
            _ = self.join() => Err(ProxyError::BridgesStopped),
        };

        tracing::info!("Shutting down");
        self.shutdown().await;
        outcome
    }
}

fn spawn_bridge(
    bridges: &mut JoinSet<()>,
    channel: Channel,
    task: impl Future<Output = Result<()>> + Send + 'static,
) {
    bridges.spawn(async move {
        if let Err(err) = task.await {
            tracing::error!("{} bridge failed: {}", channel, err);
        }
    });
}

/// SIGINT and SIGTERM handlers.
///
/// Signals are caught from the moment this is installed, so install it before
/// announcing readiness.
pub struct ShutdownSignals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Must be called from within a tokio runtime
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate()).map_err(ProxyError::Signal)?,
            sigint: signal(SignalKind::interrupt()).map_err(ProxyError::Signal)?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first signal
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Result<()> {
        tokio::select! {
            _ = self.sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = self.sigint.recv() => tracing::info!("Received SIGINT"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Result<()> {
        tokio::signal::ctrl_c().await.map_err(ProxyError::Signal)?;
        tracing::info!("Received Ctrl+C");
        Ok(())
    }
}
