use super::{bind_frontend, into_message, until_cancelled};
use crate::message::Endpoint;
use crate::signer::{resign, Signer};
use crate::Result;
use tokio_util::sync::CancellationToken;
use zeromq::{PubSocket, Socket, SocketRecv, SocketSend, SubSocket};

/// IOPub relay: SUB (connect, kernel) -> PUB (bind, frontend).
///
/// Subscribers that are slow or not yet connected miss messages; nothing is
/// buffered or replayed.
pub struct BroadcastBridge {
    frontend: PubSocket,
    kernel: SubSocket,
    frontend_endpoint: String,
    to_frontend: Signer,
}

impl BroadcastBridge {
    pub async fn open(frontend: &Endpoint, kernel: &Endpoint, to_frontend: Signer) -> Result<Self> {
        // Bind first so subscribers can attach while the kernel is still unreachable
        let mut frontend_socket = PubSocket::new();
        let bound = bind_frontend(&mut frontend_socket, frontend).await?;
        tracing::info!("Bound iopub frontend socket to {}", bound);

        let mut kernel_socket = SubSocket::new();
        kernel_socket.connect(&kernel.to_string()).await?;
        kernel_socket.subscribe("").await?;
        tracing::info!("Subscribed iopub kernel socket to {}", kernel);

        Ok(Self {
            frontend: frontend_socket,
            kernel: kernel_socket,
            frontend_endpoint: bound,
            to_frontend,
        })
    }

    pub async fn serve(
        frontend: Endpoint,
        kernel: Endpoint,
        to_frontend: Signer,
        cancel: CancellationToken,
    ) -> Result<()> {
        match until_cancelled(&cancel, Self::open(&frontend, &kernel, to_frontend)).await? {
            Some(bridge) => bridge.run(cancel).await,
            None => Ok(()),
        }
    }

    pub fn frontend_endpoint(&self) -> &str {
        &self.frontend_endpoint
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                msg = self.kernel.recv() => {
                    // Topic frames sit before the delimiter and are left alone
                    let frames = resign(msg?.into_vec(), &self.to_frontend);
                    tracing::debug!("iopub: kernel -> frontend ({} frames)", frames.len());
                    if let Some(msg) = into_message(frames) {
                        self.frontend.send(msg).await?;
                    }
                }
            }
        }

        tracing::info!("iopub bridge stopped");
        Ok(())
    }
}
