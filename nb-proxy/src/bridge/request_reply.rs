use super::{bind_frontend, into_message, until_cancelled, KernelIdentity};
use crate::message::{Channel, Endpoint};
use crate::signer::{resign, SigningKeys};
use crate::Result;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use zeromq::{DealerSocket, RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// ROUTER (bind, frontend) <-> DEALER (connect, kernel) bridge for the shell,
/// control and stdin channels.
///
/// Only one frontend client is served at a time: replies go to whichever
/// client sent the most recent request. A second concurrently connected
/// frontend will see its replies misrouted.
pub struct RequestReplyBridge {
    channel: Channel,
    frontend: RouterSocket,
    kernel: DealerSocket,
    frontend_endpoint: String,
    keys: SigningKeys,
    /// ROUTER identity of the frontend that spoke last
    client: Option<Bytes>,
}

impl RequestReplyBridge {
    /// Bind the frontend side and connect to the kernel under `identity`
    pub async fn open(
        channel: Channel,
        frontend: &Endpoint,
        kernel: &Endpoint,
        identity: &KernelIdentity,
        keys: SigningKeys,
    ) -> Result<Self> {
        let mut frontend_socket = RouterSocket::new();
        let bound = bind_frontend(&mut frontend_socket, frontend).await?;
        tracing::info!("Bound {} frontend socket to {}", channel, bound);

        let mut kernel_socket = DealerSocket::with_options(identity.socket_options()?);
        kernel_socket.connect(&kernel.to_string()).await?;
        tracing::info!("Connected {} kernel socket to {}", channel, kernel);

        Ok(Self {
            channel,
            frontend: frontend_socket,
            kernel: kernel_socket,
            frontend_endpoint: bound,
            keys,
            client: None,
        })
    }

    /// Open and run the bridge, giving up as soon as `cancel` fires
    pub async fn serve(
        channel: Channel,
        frontend: Endpoint,
        kernel: Endpoint,
        identity: KernelIdentity,
        keys: SigningKeys,
        cancel: CancellationToken,
    ) -> Result<()> {
        let opened = until_cancelled(
            &cancel,
            Self::open(channel, &frontend, &kernel, &identity, keys),
        )
        .await?;

        match opened {
            Some(bridge) => bridge.run(cancel).await,
            None => Ok(()),
        }
    }

    /// Endpoint the frontend socket actually bound to
    pub fn frontend_endpoint(&self) -> &str {
        &self.frontend_endpoint
    }

    /// Forward messages until cancelled or a socket fails
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                msg = self.frontend.recv() => self.forward_to_kernel(msg?).await?,
                msg = self.kernel.recv() => self.forward_to_frontend(msg?).await,
            }
        }

        tracing::info!("{} bridge stopped", self.channel);
        Ok(())
    }

    async fn forward_to_kernel(&mut self, msg: ZmqMessage) -> Result<()> {
        let mut frames = msg.into_vec();
        if frames.is_empty() {
            return Ok(());
        }

        // ROUTER prepends exactly one identity frame
        self.client = Some(frames.remove(0));

        let frames = resign(frames, &self.keys.to_kernel);
        tracing::debug!("{}: frontend -> kernel ({} frames)", self.channel, frames.len());

        if let Some(msg) = into_message(frames) {
            self.kernel.send(msg).await?;
        }
        Ok(())
    }

    async fn forward_to_frontend(&mut self, msg: ZmqMessage) {
        let Some(client) = self.client.clone() else {
            tracing::debug!("{}: no frontend client yet, dropping kernel message", self.channel);
            return;
        };

        let mut frames = resign(msg.into_vec(), &self.keys.to_frontend);
        tracing::debug!("{}: kernel -> frontend ({} frames)", self.channel, frames.len());
        frames.insert(0, client);

        if let Some(msg) = into_message(frames) {
            // An unroutable identity means the client went away
            if let Err(err) = self.frontend.send(msg).await {
                tracing::warn!("{}: dropping reply for frontend: {}", self.channel, err);
            }
        }
    }
}
