//! Channel-backed transport.
//!
//! Splits a connection into a [`ChannelTransport`], owned by the client, and
//! a [`LinkEndpoint`], owned by whatever task drives the radio. Command frames
//! flow to the endpoint over an mpsc channel; notifications flow back through
//! [`LinkEndpoint::notify`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::notification::NotificationQueue;
use crate::transport::Transport;

/// Default depth of the outbound command channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct Link {
    queue: Option<NotificationQueue>,
    connected: bool,
}

fn lock(link: &Mutex<Link>) -> MutexGuard<'_, Link> {
    link.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client side of a channel-backed link.
pub struct ChannelTransport {
    outbound: mpsc::Sender<Bytes>,
    link: Arc<Mutex<Link>>,
}

/// Radio side of a channel-backed link.
pub struct LinkEndpoint {
    commands: mpsc::Receiver<Bytes>,
    link: Arc<Mutex<Link>>,
}

impl ChannelTransport {
    /// Creates a connected pair with the given outbound capacity.
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, LinkEndpoint) {
        let (outbound, commands) = mpsc::channel(capacity);
        let link = Arc::new(Mutex::new(Link::default()));
        (
            Self {
                outbound,
                link: Arc::clone(&link),
            },
            LinkEndpoint { commands, link },
        )
    }
}

impl Transport for ChannelTransport {
    fn connect(&mut self, notifications: NotificationQueue) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.outbound.is_closed() {
                return Err(Error::Connection {
                    message: "link endpoint dropped".into(),
                });
            }
            let mut link = lock(&self.link);
            link.queue = Some(notifications);
            link.connected = true;
            tracing::info!("channel link connected");
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut link = lock(&self.link);
            if link.connected {
                tracing::info!("channel link disconnected");
            }
            link.connected = false;
            link.queue = None;
            Ok(())
        })
    }

    fn write_command(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.is_connected() {
                return Err(Error::NotConnected);
            }
            tracing::trace!("write: {}", hex::encode(&data));
            self.outbound
                .send(data)
                .await
                .map_err(|_| Error::Connection {
                    message: "link endpoint closed".into(),
                })
        })
    }

    fn is_connected(&self) -> bool {
        lock(&self.link).connected
    }
}

impl LinkEndpoint {
    /// Receives the next command frame written by the client.
    ///
    /// Returns `None` once the transport is dropped.
    pub async fn recv_command(&mut self) -> Option<Bytes> {
        self.commands.recv().await
    }

    /// Forwards a device notification to the client.
    ///
    /// Returns false if the link is not connected; the frame is dropped.
    pub fn notify(&self, frame: Bytes) -> bool {
        let link = lock(&self.link);
        match (&link.queue, link.connected) {
            (Some(queue), true) => {
                queue.push(frame);
                true
            }
            _ => {
                tracing::trace!("dropping notification on idle link");
                false
            }
        }
    }

    /// Reports that the radio link was lost.
    ///
    /// Marks the transport disconnected and fails any pending read.
    pub fn link_lost(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("link lost: {reason}");
        let mut link = lock(&self.link);
        link.connected = false;
        if let Some(queue) = link.queue.take() {
            queue.reset(Error::Connection { message: reason });
        }
    }
}
