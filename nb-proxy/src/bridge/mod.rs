//! Per-channel ZeroMQ bridges
//!
//! Each bridge owns one frontend-facing and one kernel-facing socket and
//! forwards between them until cancelled or until a socket fails:
//! - [`RequestReplyBridge`] for shell, control and stdin (re-signed both ways)
//! - [`BroadcastBridge`] for iopub (kernel to frontend, re-signed)
//! - [`HeartbeatBridge`] for heartbeats (verbatim both ways)

mod broadcast;
mod heartbeat;
mod request_reply;

pub use broadcast::BroadcastBridge;
pub use heartbeat::HeartbeatBridge;
pub use request_reply::RequestReplyBridge;

use crate::message::Endpoint;
use crate::Result;
use bytes::Bytes;
use std::future::Future;
use std::io::ErrorKind;
use tokio_util::sync::CancellationToken;
use zeromq::util::PeerIdentity;
use zeromq::{Socket, SocketOptions, ZmqMessage};

/// Routing identity the kernel sees for this proxy.
///
/// The kernel answers `input_request`s on stdin using the identity it saw on
/// shell, so every request/reply bridge must present the same one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelIdentity(Bytes);

impl KernelIdentity {
    pub fn generate() -> Self {
        Self(Bytes::copy_from_slice(uuid::Uuid::new_v4().as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn socket_options(&self) -> Result<SocketOptions> {
        let mut options = SocketOptions::default();
        options.peer_identity(PeerIdentity::try_from(self.0.to_vec())?);
        Ok(options)
    }
}

impl From<Bytes> for KernelIdentity {
    fn from(identity: Bytes) -> Self {
        Self(identity)
    }
}

/// Bind `socket` to `endpoint`, returning the endpoint actually bound.
///
/// A socket file left behind by a previous run blocks an IPC bind, so it is
/// removed first.
async fn bind_frontend(socket: &mut impl Socket, endpoint: &Endpoint) -> Result<String> {
    if let Some(path) = endpoint.socket_path() {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!("Removed stale socket file {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => tracing::warn!("Could not remove {}: {}", path.display(), err),
        }
    }

    let bound = socket.bind(&endpoint.to_string()).await?;
    Ok(bound.to_string())
}

/// Rebuild a ZeroMQ message from frames, `None` if there are none
fn into_message(frames: Vec<Bytes>) -> Option<ZmqMessage> {
    ZmqMessage::try_from(frames).ok()
}

/// Run `fut` unless `cancel` fires first
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<Option<T>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        result = fut => result.map(Some),
    }
}
