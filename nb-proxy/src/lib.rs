//! nb-proxy library
//!
//! Bridges a Jupyter frontend to a kernel it did not start. The frontend hands
//! the proxy its own connection file; the kernel's real endpoints and key come
//! from the controlling process's `state.json`. Every message is relayed on its
//! channel and re-signed for the side that receives it.

pub mod bridge;
pub mod message;
pub mod proxy;
pub mod signer;
pub mod state;

use std::path::PathBuf;

// Re-export commonly used types
pub use bridge::{BroadcastBridge, HeartbeatBridge, KernelIdentity, RequestReplyBridge};
pub use message::{Channel, ConnectionInfo, Endpoint, SignatureScheme, Transport};
pub use proxy::{Proxy, ShutdownSignals, POLL_TICK};
pub use signer::{resign, Signer, SigningKeys};
pub use state::load_kernel_info;

/// Main library error type
#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] zeromq::ZmqError),

    #[error("Failed to install signal handler: {0}")]
    Signal(std::io::Error),

    #[error("All bridges stopped")]
    BridgesStopped,
}

pub type Result<T> = std::result::Result<T, ProxyError>;
