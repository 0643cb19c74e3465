//! Jupyter connection info and wire-level constants
//!
//! This module describes how to reach one side of the bridge: the transport,
//! address, per-channel ports and signing key found in a Jupyter connection
//! file, plus the endpoint strings derived from them.

use crate::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Frame separating routing identities from the signed part of a message
pub const DELIMITER: &[u8] = b"<IDS|MSG>";

/// Transport named in a connection file
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Ipc,
}

/// HMAC digest used to sign messages
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    #[default]
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    #[serde(rename = "hmac-sha512")]
    HmacSha512,
}

/// Connection information from Jupyter
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectionInfo {
    pub ip: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub signature_scheme: SignatureScheme,
    #[serde(default)]
    pub key: String,
    pub shell_port: u16,
    pub iopub_port: u16,
    pub stdin_port: u16,
    pub control_port: u16,
    pub hb_port: u16,
}

impl ConnectionInfo {
    /// Load connection info from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ProxyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ProxyError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the endpoint for a given channel
    pub fn endpoint(&self, channel: Channel) -> Endpoint {
        let port = channel.port(self);
        match self.transport {
            Transport::Tcp => Endpoint::Tcp {
                host: self.ip.clone(),
                port,
            },
            // One socket file per channel, sharing the base path in `ip`
            Transport::Ipc => Endpoint::Ipc(PathBuf::from(format!("{}-{}", self.ip, port))),
        }
    }
}

/// A bindable or connectable ZeroMQ endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Ipc(PathBuf),
}

impl Endpoint {
    /// Socket file backing an IPC endpoint
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Endpoint::Ipc(path) => Some(path),
            Endpoint::Tcp { .. } => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

/// The five Jupyter channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Shell,
    Control,
    Stdin,
    IOPub,
    Heartbeat,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Shell,
        Channel::Control,
        Channel::Stdin,
        Channel::IOPub,
        Channel::Heartbeat,
    ];

    /// Channels that carry signed request/reply traffic
    pub const REQUEST_REPLY: [Channel; 3] = [Channel::Shell, Channel::Control, Channel::Stdin];

    pub fn port(self, info: &ConnectionInfo) -> u16 {
        match self {
            Channel::Shell => info.shell_port,
            Channel::Control => info.control_port,
            Channel::Stdin => info.stdin_port,
            Channel::IOPub => info.iopub_port,
            Channel::Heartbeat => info.hb_port,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Shell => "shell",
            Channel::Control => "control",
            Channel::Stdin => "stdin",
            Channel::IOPub => "iopub",
            Channel::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
