use super::{bind_frontend, into_message, until_cancelled};
use crate::message::Endpoint;
use crate::Result;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use zeromq::{DealerSocket, RouterSocket, Socket, SocketRecv, SocketSend};

/// Heartbeat relay: frames pass through untouched in both directions.
///
/// Like [`super::RequestReplyBridge`], replies go to the last client that
/// pinged.
pub struct HeartbeatBridge {
    frontend: RouterSocket,
    kernel: DealerSocket,
    frontend_endpoint: String,
    client: Option<Bytes>,
}

impl HeartbeatBridge {
    pub async fn open(frontend: &Endpoint, kernel: &Endpoint) -> Result<Self> {
        let mut frontend_socket = RouterSocket::new();
        let bound = bind_frontend(&mut frontend_socket, frontend).await?;
        tracing::info!("Bound heartbeat frontend socket to {}", bound);

        let mut kernel_socket = DealerSocket::new();
        kernel_socket.connect(&kernel.to_string()).await?;
        tracing::info!("Connected heartbeat kernel socket to {}", kernel);

        Ok(Self {
            frontend: frontend_socket,
            kernel: kernel_socket,
            frontend_endpoint: bound,
            client: None,
        })
    }

    pub async fn serve(
        frontend: Endpoint,
        kernel: Endpoint,
        cancel: CancellationToken,
    ) -> Result<()> {
        match until_cancelled(&cancel, Self::open(&frontend, &kernel)).await? {
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
                msg = self.frontend.recv() => {
                    let mut frames = msg?.into_vec();
                    if frames.is_empty() {
                        continue;
                    }
                    self.client = Some(frames.remove(0));
                    if let Some(msg) = into_message(frames) {
                        self.kernel.send(msg).await?;
                    }
                }
                msg = self.kernel.recv() => {
                    let mut frames = msg?.into_vec();
                    let Some(client) = self.client.clone() else {
                        continue;
                    };
                    frames.insert(0, client);
                    if let Some(msg) = into_message(frames) {
                        if let Err(err) = self.frontend.send(msg).await {
                            tracing::warn!("heartbeat: dropping echo for frontend: {}", err);
                        }
                    }
                }
            }
        }

        tracing::info!("heartbeat bridge stopped");
        Ok(())
    }
}
