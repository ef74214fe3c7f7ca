//! Bridge from push-style device notifications to timeout-bounded reads.
//!
//! The transport's notify callback calls [`NotificationQueue::push`]; the
//! command handler calls [`NotificationQueue::pop`]. The protocol is strictly
//! request/response, so at most one reader waits at a time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

struct Waiter {
    id: u64,
    tx: oneshot::Sender<Result<Bytes>>,
}

#[derive(Default)]
struct State {
    buffer: VecDeque<Bytes>,
    waiter: Option<Waiter>,
    next_id: u64,
}

/// FIFO of inbound frames with a single timeout-bounded waiter.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct NotificationQueue {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("NotificationQueue")
            .field("buffered", &state.buffer.len())
            .field("waiting", &state.waiter.is_some())
            .finish()
    }
}

impl NotificationQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers a frame to the waiting reader, or buffers it.
    pub fn push(&self, frame: Bytes) {
        tracing::trace!("notification: {}", hex::encode(&frame));

        let mut state = self.lock();
        let frame = match state.waiter.take() {
            Some(waiter) => match waiter.tx.send(Ok(frame)) {
                Ok(()) => return,
                // reader went away; keep the frame for the next one
                Err(returned) => match returned {
                    Ok(frame) => frame,
                    Err(_) => return,
                },
            },
            None => frame,
        };
        state.buffer.push_back(frame);
    }

    /// Returns the next frame, waiting at most `timeout` for one to arrive.
    pub async fn pop(&self, timeout: Duration) -> Result<Bytes> {
        let (id, mut rx) = {
            let mut state = self.lock();
            if let Some(frame) = state.buffer.pop_front() {
                return Ok(frame);
            }
            if state.waiter.as_ref().is_some_and(|w| !w.tx.is_closed()) {
                return Err(Error::protocol(
                    "a read is already pending on the notification queue",
                ));
            }

            let (tx, rx) = oneshot::channel();
            let id = state.next_id;
            state.next_id = state.next_id.wrapping_add(1);
            state.waiter = Some(Waiter { id, tx });
            (id, rx)
        };

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Connection {
                message: "notification queue closed".into(),
            }),
            Err(_) => {
                let mut state = self.lock();
                if state.waiter.as_ref().is_some_and(|w| w.id == id) {
                    state.waiter = None;
                    return Err(Error::timeout(timeout));
                }
                drop(state);
                // a push or reset won the race against the timer
                rx.try_recv().unwrap_or_else(|_| Err(Error::timeout(timeout)))
            }
        }
    }

    /// Drops all buffered frames and fails the pending reader with `reason`.
    pub fn reset(&self, reason: Error) {
        let mut state = self.lock();
        let dropped = state.buffer.len();
        state.buffer.clear();
        if let Some(waiter) = state.waiter.take() {
            let _ = waiter.tx.send(Err(reason));
        }
        if dropped > 0 {
            tracing::debug!("notification queue reset, dropped {dropped} frames");
        }
    }

    /// Drops all buffered frames, leaving a pending reader untouched.
    ///
    /// Returns the number of frames dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.buffer.len();
        state.buffer.clear();
        if dropped > 0 {
            tracing::debug!("discarded {dropped} stale notifications");
        }
        dropped
    }

    /// Returns the number of buffered frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Returns true if no frames are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
