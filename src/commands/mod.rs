//! Command handlers for tag operations.
//!
//! This module provides the request/response plumbing shared by every
//! operation, plus the small one-shot commands. The multi-frame operations
//! live in [`config`] and [`upload`].
//!
//! Only one logical operation runs at a time: each public operation holds the
//! operation lock from its first write until its last response, and starts by
//! discarding stale notifications left over from an aborted predecessor.

pub mod config;
pub mod upload;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, MutexGuard};

use crate::client::ClientConfig;
use crate::error::Result;
use crate::event::{Event, EventDispatcher};
use crate::notification::NotificationQueue;
use crate::protocol::{Opcode, command, parse_firmware_version, validate_ack};
use crate::transport::Transport;
use crate::types::FirmwareVersion;

/// Command handler for tag operations.
pub struct CommandHandler<T> {
    transport: Arc<Mutex<T>>,
    queue: NotificationQueue,
    dispatcher: EventDispatcher,
    operation: Mutex<()>,
    response_timeout: Duration,
    refresh_timeout: Duration,
    compression_level: u8,
}

impl<T: Transport> CommandHandler<T> {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(
        transport: Arc<Mutex<T>>,
        queue: NotificationQueue,
        dispatcher: EventDispatcher,
        config: &ClientConfig,
    ) -> Self {
        Self {
            transport,
            queue,
            dispatcher,
            operation: Mutex::new(()),
            response_timeout: config.response_timeout,
            refresh_timeout: config.refresh_timeout,
            compression_level: config.compression_level,
        }
    }

    /// Returns the per-response timeout.
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Returns the display refresh timeout.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    /// Starts a logical operation.
    ///
    /// Waits for any running operation to finish, then drops stale frames.
    async fn begin(&self) -> MutexGuard<'_, ()> {
        let guard = self.operation.lock().await;
        self.queue.clear();
        guard
    }

    /// Writes one frame to the transport.
    async fn send(&self, frame: Bytes) -> Result<()> {
        tracing::trace!("send: {}", hex::encode(&frame));
        let mut transport = self.transport.lock().await;
        transport.write_command(frame).await
    }

    /// Reads the next notification frame.
    async fn recv(&self, timeout: Duration) -> Result<Bytes> {
        let frame = self.queue.pop(timeout).await?;
        tracing::trace!("recv: {}", hex::encode(&frame));
        Ok(frame)
    }

    /// Writes a frame and reads exactly one response.
    async fn request(&self, frame: Bytes) -> Result<Bytes> {
        self.send(frame).await?;
        self.recv(self.response_timeout).await
    }

    /// Writes a frame and checks that the response acknowledges `expected`.
    async fn request_ack(&self, frame: Bytes, expected: Opcode) -> Result<Bytes> {
        let response = self.request(frame).await?;
        validate_ack(&response, expected)?;
        Ok(response)
    }

    // ==================== Device Commands ====================

    /// Reads the firmware version.
    pub async fn read_firmware_version(&self) -> Result<FirmwareVersion> {
        let _op = self.begin().await;
        let response = self
            .request_ack(command::read_firmware_version(), Opcode::ReadFirmwareVersion)
            .await?;
        let version = parse_firmware_version(&response)?;

        tracing::info!("firmware version {version}");
        self.dispatcher.dispatch(Event::FirmwareVersion(version.clone()));
        Ok(version)
    }

    /// Reboots the device.
    ///
    /// The device resets without answering, so no response is awaited.
    pub async fn reboot(&self) -> Result<()> {
        let _op = self.begin().await;
        self.send(command::reboot()).await?;

        tracing::info!("reboot requested");
        self.dispatcher.dispatch(Event::Rebooting);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::ChannelTransport;
    use crate::transport::mock::{ScriptedDevice, Step, connected, reply};

    pub(crate) async fn handler(
        script: Vec<Step>,
        config: &ClientConfig,
    ) -> (CommandHandler<ChannelTransport>, ScriptedDevice, EventDispatcher) {
        let (transport, queue, device) = connected(script).await;
        let dispatcher = EventDispatcher::new(64);
        let handler = CommandHandler::new(
            Arc::new(Mutex::new(transport)),
            queue,
            dispatcher.clone(),
            config,
        );
        (handler, device, dispatcher)
    }

    #[tokio::test]
    async fn test_read_firmware_version() {
        let (handler, device, _) = handler(
            vec![reply(&[0x00, 0x43, 2, 1, 4, b'b', b'e', b'e', b'f'])],
            &ClientConfig::default(),
        )
        .await;

        let version = handler.read_firmware_version().await.unwrap();
        assert_eq!(version.major, 2);
        assert_eq!(version.minor, 1);
        assert_eq!(version.sha, "beef");
        assert_eq!(device.written_opcodes(), vec![0x0043]);
    }

    #[tokio::test]
    async fn test_read_firmware_version_wrong_echo() {
        let (handler, _, _) = handler(
            vec![reply(&[0x00, 0x40, 2, 1, 4, b'b', b'e', b'e', b'f'])],
            &ClientConfig::default(),
        )
        .await;

        assert!(matches!(
            handler.read_firmware_version().await,
            Err(Error::AckMismatch {
                expected: 0x0043,
                actual: 0x0040
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_firmware_version_timeout() {
        let config = ClientConfig::default().response_timeout(Duration::from_millis(500));
        let (handler, _, _) = handler(vec![Step::Silent], &config).await;

        assert!(matches!(
            handler.read_firmware_version().await,
            Err(Error::Timeout { timeout_ms: 500 })
        ));
    }

    #[tokio::test]
    async fn test_reboot_does_not_wait() {
        let (handler, device, dispatcher) = handler(vec![], &ClientConfig::default()).await;
        let mut events = dispatcher.subscribe();

        handler.reboot().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(device.written_opcodes(), vec![0x000F]);
        assert!(matches!(events.try_recv(), Some(Event::Rebooting)));
    }

    #[tokio::test]
    async fn test_stale_frames_discarded_between_operations() {
        let (handler, _, _) = handler(
            vec![
                // the first command gets an extra, stale frame
                crate::transport::mock::reply_all(&[
                    &[0x00, 0x43, 1, 0, 1, b'a'],
                    &[0x00, 0x43, 9, 9, 1, b'z'],
                ]),
                reply(&[0x00, 0x43, 1, 1, 1, b'b']),
            ],
            &ClientConfig::default(),
        )
        .await;

        assert_eq!(handler.read_firmware_version().await.unwrap().sha, "a");
        let second = handler.read_firmware_version().await.unwrap();
        assert_eq!((second.minor, second.sha.as_str()), (1, "b"));
    }
}
