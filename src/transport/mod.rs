//! Transport layer for tag communication.
//!
//! The wireless link itself (pairing, discovery, GATT plumbing) lives outside
//! this crate. A transport only has to deliver command frames to the device
//! and push every notification it receives into the [`NotificationQueue`]
//! handed to [`Transport::connect`].

pub mod channel;
#[cfg(test)]
pub(crate) mod mock;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::notification::NotificationQueue;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Connects to the device. Inbound notifications go to `notifications`.
    fn connect(&mut self, notifications: NotificationQueue) -> BoxFuture<'_, Result<()>>;

    /// Disconnects from the device.
    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Writes one command frame.
    ///
    /// Fails with [`crate::Error::NotConnected`] before `connect`.
    fn write_command(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;
}

pub use channel::{ChannelTransport, LinkEndpoint};
