//! Event system for lifecycle and progress notifications.
//!
//! Events are advisory: they report what an operation is doing but never
//! influence it. Subscribers that fall behind skip events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::commands::upload::{UploadReport, UploadState};
use crate::types::{FirmwareVersion, GlobalConfig};

/// Event types that can be dispatched.
#[derive(Debug, Clone)]
pub enum Event {
    /// Connection established.
    Connected,
    /// Connection closed.
    Disconnected,
    /// Configuration read from the device.
    ConfigLoaded(Box<GlobalConfig>),
    /// Configuration written to the device.
    ConfigWritten {
        /// Serialized config size.
        bytes: usize,
        /// Frames sent.
        frames: usize,
    },
    /// Firmware version read from the device.
    FirmwareVersion(FirmwareVersion),
    /// Reboot command sent.
    Rebooting,
    /// Upload moved to a new phase.
    UploadPhase(UploadState),
    /// An image chunk was acknowledged.
    UploadProgress {
        /// Bytes acknowledged so far.
        sent: usize,
        /// Bytes to send in data frames.
        total: usize,
    },
    /// Upload finished and the display refreshed.
    UploadCompleted(Box<UploadReport>),
    /// Upload aborted.
    UploadFailed {
        /// Error description.
        message: String,
    },
}

/// Event categories for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connected and disconnected.
    Connection,
    /// Config loaded or written.
    Config,
    /// Firmware version read.
    Firmware,
    /// Reboot sent.
    Reboot,
    /// Upload phase changes.
    UploadPhase,
    /// Acknowledged upload chunks.
    UploadProgress,
    /// Upload completed or failed.
    UploadResult,
}

impl Event {
    /// Returns the category of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected | Self::Disconnected => EventKind::Connection,
            Self::ConfigLoaded(_) | Self::ConfigWritten { .. } => EventKind::Config,
            Self::FirmwareVersion(_) => EventKind::Firmware,
            Self::Rebooting => EventKind::Reboot,
            Self::UploadPhase(_) => EventKind::UploadPhase,
            Self::UploadProgress { .. } => EventKind::UploadProgress,
            Self::UploadCompleted(_) | Self::UploadFailed { .. } => EventKind::UploadResult,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event, or `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::trace!("subscriber lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next already-dispatched event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Subscription filter for specific event kinds.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by event kinds.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self { kinds: Some(kinds) }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.kinds
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.kind()))
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No subscribers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Waits for an event matching the filter with timeout.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let mut subscription = self.subscribe();

        tokio::select! {
            biased;
            result = async {
                loop {
                    match subscription.recv().await {
                        Some(event) if filter.matches(&event) => return Some(event),
                        Some(_) => {}
                        None => return None,
                    }
                }
            } => result,
            () = tokio::time::sleep(timeout) => None,
        }
    }
}
