//! Scripted device for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::notification::NotificationQueue;
use crate::transport::Transport;
use crate::transport::channel::{ChannelTransport, LinkEndpoint};

/// What the device does after receiving one command frame.
pub(crate) enum Step {
    /// Notify these frames immediately.
    Reply(Vec<Bytes>),
    /// Notify these frames after a delay.
    ReplyAfter(Duration, Vec<Bytes>),
    /// Say nothing.
    Silent,
}

/// Shorthand for a single-frame reply.
pub(crate) fn reply(frame: &[u8]) -> Step {
    Step::Reply(vec![Bytes::copy_from_slice(frame)])
}

/// Shorthand for a multi-frame reply.
pub(crate) fn reply_all(frames: &[&[u8]]) -> Step {
    Step::Reply(frames.iter().map(|f| Bytes::copy_from_slice(f)).collect())
}

/// Handle to a device task that answers commands from a script.
#[derive(Clone)]
pub(crate) struct ScriptedDevice {
    written: Arc<Mutex<Vec<Bytes>>>,
}

impl ScriptedDevice {
    /// Spawns the device loop on `endpoint`.
    pub(crate) fn spawn(mut endpoint: LinkEndpoint, script: Vec<Step>) -> Self {
        let written = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&written);
        let mut script: VecDeque<Step> = script.into();

        tokio::spawn(async move {
            while let Some(frame) = endpoint.recv_command().await {
                log.lock().unwrap().push(frame);
                match script.pop_front() {
                    Some(Step::Reply(frames)) => {
                        for f in frames {
                            endpoint.notify(f);
                        }
                    }
                    Some(Step::ReplyAfter(delay, frames)) => {
                        tokio::time::sleep(delay).await;
                        for f in frames {
                            endpoint.notify(f);
                        }
                    }
                    Some(Step::Silent) | None => {}
                }
            }
        });

        Self { written }
    }

    /// Returns every frame the client wrote so far.
    pub(crate) fn written(&self) -> Vec<Bytes> {
        self.written.lock().unwrap().clone()
    }

    /// Returns the opcodes of every frame written so far.
    pub(crate) fn written_opcodes(&self) -> Vec<u16> {
        self.written()
            .iter()
            .map(|f| u16::from_be_bytes([f[0], f[1]]))
            .collect()
    }
}

/// Builds a connected transport and queue answered by `script`.
pub(crate) async fn connected(
    script: Vec<Step>,
) -> (ChannelTransport, NotificationQueue, ScriptedDevice) {
    let (mut transport, endpoint) = ChannelTransport::pair(16);
    let queue = NotificationQueue::new();
    transport.connect(queue.clone()).await.unwrap();
    let device = ScriptedDevice::spawn(endpoint, script);
    (transport, queue, device)
}
