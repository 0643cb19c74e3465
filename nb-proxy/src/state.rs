//! Kernel-side connection resolution
//!
//! The controlling `nb` process records the running kernel in `state.json`.
//! The proxy reads it at launch, so a restarted kernel is picked up without
//! reinstalling the kernelspec that launches the proxy.

use crate::message::ConnectionInfo;
use crate::{ProxyError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the state file inside the state directory
pub const STATE_FILE: &str = "state.json";

/// Base name of the kernel's socket files inside an IPC directory
const IPC_SOCKET_STEM: &str = "kernel";

/// The subset of `state.json` the proxy cares about
#[derive(Debug, Deserialize)]
pub struct KernelState {
    /// The kernel's own connection file
    pub connection_file: PathBuf,
    /// Host-side directory holding a sandboxed kernel's IPC sockets
    #[serde(default)]
    pub ipc_dir: Option<PathBuf>,
}

impl KernelState {
    pub fn from_dir(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(STATE_FILE);
        let content = std::fs::read_to_string(&path).map_err(|source| ProxyError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ProxyError::Parse { path, source })
    }

    /// IPC directory, treating an empty path as absent
    fn ipc_dir(&self) -> Option<&Path> {
        self.ipc_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}

/// Load the kernel's connection info, pointing sandboxed kernels at their
/// host-side socket path.
pub fn load_kernel_info(state_dir: &Path) -> Result<ConnectionInfo> {
    let state = KernelState::from_dir(state_dir)?;
    let mut info = ConnectionInfo::from_file(&state.connection_file)?;

    if let Some(ipc_dir) = state.ipc_dir() {
        info.ip = ipc_dir.join(IPC_SOCKET_STEM).to_string_lossy().into_owned();
        tracing::info!("Kernel reachable through IPC directory {}", ipc_dir.display());
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Channel, Transport};
    use serde_json::json;
    use std::fs;

    fn write_json(path: &Path, value: serde_json::Value) {
        fs::write(path, serde_json::to_string(&value).unwrap()).unwrap();
    }

    fn kernel_json(ip: &str, transport: &str) -> serde_json::Value {
        json!({
            "ip": ip,
            "transport": transport,
            "key": "abc",
            "shell_port": 5555,
            "iopub_port": 5556,
            "stdin_port": 5557,
            "control_port": 5558,
            "hb_port": 5559
        })
    }

    #[test]
    fn test_load_kernel_info_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let conn_file = dir.path().join("kernel.json");
        write_json(&conn_file, kernel_json("127.0.0.1", "tcp"));
        write_json(
            &dir.path().join(STATE_FILE),
            json!({"connection_file": conn_file, "notebook": "test.ipynb"}),
        );

        let info = load_kernel_info(dir.path()).unwrap();
        assert_eq!(info.ip, "127.0.0.1");
        assert_eq!(info.shell_port, 5555);
        assert_eq!(info.key, "abc");
    }

    #[test]
    fn test_load_kernel_info_sandboxed() {
        let dir = tempfile::tempdir().unwrap();
        let ipc_dir = dir.path().join("ipc");
        fs::create_dir(&ipc_dir).unwrap();
        let conn_file = dir.path().join("kernel.json");
        write_json(&conn_file, kernel_json("/ipc/kernel", "ipc"));
        write_json(
            &dir.path().join(STATE_FILE),
            json!({
                "connection_file": conn_file,
                "notebook": "test.ipynb",
                "ipc_dir": ipc_dir,
                "sandboxed": true
            }),
        );

        let info = load_kernel_info(dir.path()).unwrap();
        let base = ipc_dir.join("kernel");
        assert_eq!(info.ip, base.to_string_lossy());
        assert_eq!(info.transport, Transport::Ipc);
        assert_eq!(
            info.endpoint(Channel::Shell).socket_path(),
            Some(PathBuf::from(format!("{}-5555", base.display())).as_path())
        );
    }

    #[test]
    fn test_empty_ipc_dir_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let conn_file = dir.path().join("kernel.json");
        write_json(&conn_file, kernel_json("127.0.0.1", "tcp"));
        write_json(
            &dir.path().join(STATE_FILE),
            json!({"connection_file": conn_file, "ipc_dir": ""}),
        );

        let info = load_kernel_info(dir.path()).unwrap();
        assert_eq!(info.ip, "127.0.0.1");
    }

    #[test]
    fn test_missing_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_kernel_info(dir.path());
        assert!(matches!(result, Err(ProxyError::Read { .. })));
    }

    #[test]
    fn test_state_without_connection_file() {
        let dir = tempfile::tempdir().unwrap();
        write_json(&dir.path().join(STATE_FILE), json!({"notebook": "a.ipynb"}));

        let result = load_kernel_info(dir.path());
        assert!(matches!(result, Err(ProxyError::Parse { .. })));
    }

    #[test]
    fn test_missing_kernel_connection_file() {
        let dir = tempfile::tempdir().unwrap();
        write_json(
            &dir.path().join(STATE_FILE),
            json!({"connection_file": dir.path().join("gone.json")}),
        );

        let err = load_kernel_info(dir.path()).unwrap_err();
        assert!(err.to_string().contains("gone.json"));
    }

    #[test]
    fn test_unparseable_state() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILE), "{not json").unwrap();

        let result = load_kernel_info(dir.path());
        assert!(matches!(result, Err(ProxyError::Parse { .. })));
    }
}
