//! # inkwire
//!
//! A Rust protocol engine for battery-powered e-paper display tags.
//!
//! This library reads and writes a tag's configuration, queries its
//! firmware, and uploads images to its panel over any link that can carry
//! command frames out and notification frames back.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Bit-exact codec for the tag's TLV configuration format
//! - Chunked config read/write and image upload with automatic compression
//! - Event stream for upload progress and lifecycle changes
//!
//! ## Quick Start
//!
//! ```no_run
//! use inkwire::{ChannelTransport, Tag, UploadOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), inkwire::Error> {
//!     // The endpoint is driven by the task that owns the radio
//!     let (transport, _endpoint) = ChannelTransport::pair(16);
//!     let mut tag = Tag::new(transport);
//!     tag.connect().await?;
//!
//!     let config = tag.interrogate().await?;
//!     if let Some(display) = config.primary_display() {
//!         println!("Panel: {}x{}", display.pixel_width, display.pixel_height);
//!     }
//!
//!     let firmware = tag.read_firmware_version().await?;
//!     println!("Firmware: {firmware}");
//!
//!     let image = vec![0xFF; 296 * 128 / 8];
//!     tag.upload_encoded(&image, &UploadOptions::default()).await?;
//!
//!     tag.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Wire format: opcodes, frame builders, record codecs, TLV stream
//! - [`types`] - Data structures (config records, display properties)
//! - [`notification`] - Queue bridging device notifications to timed reads
//! - [`transport`] - Transport trait and a channel-backed implementation
//! - [`event`] - Async event system for progress and lifecycle notifications
//! - [`encoding`] - Image encoder seam and zlib compression
//! - [`commands`] - Config and upload orchestration
//! - [`client`] - High-level [`Tag`] client

pub mod client;
pub mod commands;
pub mod encoding;
pub mod error;
pub mod event;
pub mod notification;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{ClientConfig, Tag};
pub use commands::CommandHandler;
pub use commands::upload::{
    ChunkOutcome, UploadOptions, UploadReport, UploadState, UploadStrategy,
};
pub use encoding::{ImageEncoder, RawImage};
pub use error::{ConfigError, Error, FrameError, Result};
pub use event::{Event, EventDispatcher, EventFilter, EventKind, Subscription};
pub use notification::NotificationQueue;
pub use protocol::{Opcode, RecordKind};
pub use transport::{ChannelTransport, LinkEndpoint, Transport};
pub use types::{
    BinaryInputs, ColorScheme, DataBus, DisplayConfig, DitherMode, FirmwareVersion, GlobalConfig,
    LedConfig, ManufacturerData, PowerMode, PowerOption, RefreshMode, SensorData, SystemConfig,
};
