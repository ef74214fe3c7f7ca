//! Main [`Tag`] client implementation.
//!
//! This module provides the high-level [`Tag`] client that combines
//! transport, notification queue, event handling and commands into a unified
//! interface.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::commands::CommandHandler;
use crate::commands::upload::{UploadOptions, UploadReport};
use crate::encoding::{DEFAULT_COMPRESSION_LEVEL, ImageEncoder, RawImage};
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher, Subscription};
use crate::notification::NotificationQueue;
use crate::transport::Transport;
use crate::types::{FirmwareVersion, GlobalConfig};

/// Default timeout for a single response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for a display refresh.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Client settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bound on each response read.
    pub response_timeout: Duration,
    /// Bound on the refresh wait, also used to re-wait a silent chunk.
    pub refresh_timeout: Duration,
    /// zlib level for compressed uploads.
    pub compression_level: u8,
    /// Events buffered per subscriber.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Sets the response timeout.
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the refresh timeout.
    #[must_use]
    pub const fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Sets the compression level, clamped to 0-10.
    #[must_use]
    pub const fn compression_level(mut self, level: u8) -> Self {
        self.compression_level = if level > 10 { 10 } else { level };
        self
    }

    /// Sets the event capacity.
    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// Client for communicating with an e-paper tag.
pub struct Tag<T> {
    transport: Arc<Mutex<T>>,
    queue: NotificationQueue,
    dispatcher: EventDispatcher,
    commands: CommandHandler<T>,

    // Last config read from or written to the device
    config: Arc<RwLock<Option<GlobalConfig>>>,
}

impl<T: Transport> Tag<T> {
    /// Creates a new client with default settings (not yet connected).
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Creates a new client with custom settings.
    #[must_use]
    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        let dispatcher = EventDispatcher::new(config.event_capacity);
        let queue = NotificationQueue::new();
        let transport = Arc::new(Mutex::new(transport));

        let commands = CommandHandler::new(
            Arc::clone(&transport),
            queue.clone(),
            dispatcher.clone(),
            &config,
        );

        Self {
            transport,
            queue,
            dispatcher,
            commands,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Opens the transport and routes its notifications to this client.
    pub async fn connect(&mut self) -> Result<()> {
        {
            let mut transport = self.transport.lock().await;
            transport.connect(self.queue.clone()).await?;
        }

        tracing::info!("connected");
        self.dispatcher.dispatch(Event::Connected);
        Ok(())
    }

    /// Closes the transport and fails any pending read.
    ///
    /// The pending read fails even if the transport reports an error.
    pub async fn disconnect(&mut self) -> Result<()> {
        let closed = {
            let mut transport = self.transport.lock().await;
            transport.disconnect().await
        };
        self.queue.reset(Error::Connection {
            message: "disconnected".into(),
        });
        closed?;

        tracing::info!("disconnected");
        self.dispatcher.dispatch(Event::Disconnected);
        Ok(())
    }

    /// Returns true if connected.
    pub async fn is_connected(&self) -> bool {
        let transport = self.transport.lock().await;
        transport.is_connected()
    }

    /// Returns the cached device configuration, if any.
    pub async fn config(&self) -> Option<GlobalConfig> {
        self.config.read().await.clone()
    }

    /// Returns the command handler for direct command access.
    #[must_use]
    pub const fn commands(&self) -> &CommandHandler<T> {
        &self.commands
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    // ==================== High-Level Device Methods ====================

    /// Reads the device configuration and caches it.
    pub async fn interrogate(&self) -> Result<GlobalConfig> {
        let config = self.commands.read_config().await?;
        *self.config.write().await = Some(config.clone());
        Ok(config)
    }

    /// Reads the firmware version.
    pub async fn read_firmware_version(&self) -> Result<FirmwareVersion> {
        self.commands.read_firmware_version().await
    }

    /// Reboots the device.
    ///
    /// The cached config is kept; the device comes back with the same one.
    pub async fn reboot(&self) -> Result<()> {
        self.commands.reboot().await
    }

    /// Writes a configuration and caches it on success.
    ///
    /// The device applies it after a reboot.
    pub async fn write_config(&self, config: &GlobalConfig) -> Result<()> {
        self.commands.write_config(config).await?;
        *self.config.write().await = Some(config.clone());
        Ok(())
    }

    /// Encodes and uploads an image to the primary display.
    ///
    /// Interrogates the device first if no config is cached.
    pub async fn upload_image(
        &self,
        image: &RawImage,
        encoder: &dyn ImageEncoder,
        options: &UploadOptions,
    ) -> Result<UploadReport> {
        let cached = self.config().await;
        let config = match cached {
            Some(config) => config,
            None => self.interrogate().await?,
        };
        let display = config.primary_display().ok_or_else(|| Error::Encoding {
            message: "device reports no display".into(),
        })?;

        self.commands
            .upload_image(image, encoder, display, options)
            .await
    }

    /// Uploads already-encoded panel bytes.
    pub async fn upload_encoded(
        &self,
        data: &[u8],
        options: &UploadOptions,
    ) -> Result<UploadReport> {
        self.commands.upload_encoded(data, options).await
    }
}
