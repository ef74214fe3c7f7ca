//! Image upload.
//!
//! An upload walks through a fixed sequence of phases:
//!
//! ```text
//! Idle -> AwaitStartAck -> SendingChunks -> AwaitEndAck -> AwaitRefresh -> Done
//! ```
//!
//! Any error moves it to `Failed`. The device may finish on its own while
//! chunks are still being sent by answering a chunk with the end opcode; the
//! end frame is then skipped and the upload goes straight to waiting for the
//! refresh.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::commands::CommandHandler;
use crate::encoding::{ImageEncoder, RawImage, compress, prepare_for_display};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::protocol::{MAX_COMPRESSED_SIZE, Opcode, Response, UPLOAD_CHUNK_SIZE, command};
use crate::transport::Transport;
use crate::types::{DisplayConfig, DitherMode, RefreshMode};

/// Phase of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Nothing sent yet.
    Idle,
    /// Start frame sent, waiting for its ack.
    AwaitStartAck,
    /// Writing data frames.
    SendingChunks,
    /// End frame sent, waiting for its ack.
    AwaitEndAck,
    /// Waiting for the panel to finish refreshing.
    AwaitRefresh,
    /// Refresh complete.
    Done,
    /// Aborted by an error.
    Failed,
}

/// How the image bytes are carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// zlib stream, head in the start frame.
    Compressed,
    /// Raw bytes, all in data frames.
    Uncompressed,
}

/// Caller options for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Refresh mode sent with the end frame.
    pub refresh_mode: RefreshMode,
    /// Dither mode passed to the image encoder.
    pub dither_mode: DitherMode,
    /// Try the compressed strategy first.
    pub compress: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            refresh_mode: RefreshMode::Full,
            dither_mode: DitherMode::Burkes,
            compress: true,
        }
    }
}

impl UploadOptions {
    /// Sets the refresh mode.
    #[must_use]
    pub const fn refresh_mode(mut self, mode: RefreshMode) -> Self {
        self.refresh_mode = mode;
        self
    }

    /// Sets the dither mode.
    #[must_use]
    pub const fn dither_mode(mut self, mode: DitherMode) -> Self {
        self.dither_mode = mode;
        self
    }

    /// Enables or disables compression.
    #[must_use]
    pub const fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Result of the chunk loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Every chunk was acknowledged.
    Completed { chunks_sent: usize },
    /// The device answered a chunk with the end opcode.
    AutoCompleted { chunks_sent: usize },
}

impl ChunkOutcome {
    /// Returns the number of data frames written.
    #[must_use]
    pub const fn chunks_sent(&self) -> usize {
        match self {
            Self::Completed { chunks_sent } | Self::AutoCompleted { chunks_sent } => *chunks_sent,
        }
    }

    /// Returns true if the device ended the transfer itself.
    #[must_use]
    pub const fn is_auto_completed(&self) -> bool {
        matches!(self, Self::AutoCompleted { .. })
    }
}

/// Summary of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// How the image was carried.
    pub strategy: UploadStrategy,
    /// Size of the encoded image before compression.
    pub image_size: usize,
    /// Image bytes put on the wire, start frame included.
    pub bytes_sent: usize,
    /// Data frames written.
    pub chunks: usize,
    /// True if the device ended the transfer before the end frame.
    pub auto_completed: bool,
    /// Time from the start frame to the refresh notification.
    pub elapsed: Duration,
}

/// Start frame plus whatever must follow in data frames.
#[derive(Debug)]
struct UploadPlan {
    strategy: UploadStrategy,
    start: Bytes,
    /// Image bytes carried by the start frame.
    head: usize,
    remaining: Bytes,
}

/// Picks the strategy and builds the start frame.
fn plan_upload(data: &[u8], compress_requested: bool, level: u8) -> UploadPlan {
    if compress_requested {
        let compressed = compress(data, level);
        match u32::try_from(data.len()) {
            Ok(original_size) if compressed.len() < MAX_COMPRESSED_SIZE => {
                let (start, head) = command::upload_start_compressed(original_size, &compressed);
                tracing::debug!(
                    "compressed {} -> {} bytes, {head} in start frame",
                    data.len(),
                    compressed.len()
                );
                return UploadPlan {
                    strategy: UploadStrategy::Compressed,
                    start,
                    head,
                    remaining: Bytes::copy_from_slice(&compressed[head..]),
                };
            }
            _ => tracing::debug!(
                "compressed size {} not below {MAX_COMPRESSED_SIZE}, sending uncompressed",
                compressed.len()
            ),
        }
    }

    UploadPlan {
        strategy: UploadStrategy::Uncompressed,
        start: command::upload_start_uncompressed(),
        head: 0,
        remaining: Bytes::copy_from_slice(data),
    }
}

fn unexpected(response: &Response<'_>, phase: &str) -> Error {
    Error::protocol(format!(
        "unexpected opcode 0x{:04x} while {phase}",
        response.raw_opcode()
    ))
}

struct UploadRun<'a, T> {
    handler: &'a CommandHandler<T>,
    state: UploadState,
}

impl<T: Transport> UploadRun<'_, T> {
    fn enter(&mut self, next: UploadState) {
        tracing::debug!("upload {:?} -> {next:?}", self.state);
        self.state = next;
        self.handler.dispatcher.dispatch(Event::UploadPhase(next));
    }

    async fn execute(&mut self, data: &[u8], options: &UploadOptions) -> Result<UploadReport> {
        if data.is_empty() {
            return Err(Error::Encoding {
                message: "nothing to upload".into(),
            });
        }
        let started = Instant::now();
        let handler = self.handler;
        let plan = plan_upload(data, options.compress, handler.compression_level);

        self.enter(UploadState::AwaitStartAck);
        handler.request_ack(plan.start, Opcode::UploadStart).await?;

        self.enter(UploadState::SendingChunks);
        let outcome = handler.send_chunks(&plan.remaining).await?;

        if outcome.is_auto_completed() {
            tracing::info!(
                "device completed upload after {} chunks",
                outcome.chunks_sent()
            );
        } else {
            self.enter(UploadState::AwaitEndAck);
            handler
                .request_ack(command::upload_end(options.refresh_mode), Opcode::UploadEnd)
                .await?;
        }

        self.enter(UploadState::AwaitRefresh);
        handler.wait_for_refresh().await?;
        self.enter(UploadState::Done);

        let body_sent = (outcome.chunks_sent() * UPLOAD_CHUNK_SIZE).min(plan.remaining.len());
        Ok(UploadReport {
            strategy: plan.strategy,
            image_size: data.len(),
            bytes_sent: plan.head + body_sent,
            chunks: outcome.chunks_sent(),
            auto_completed: outcome.is_auto_completed(),
            elapsed: started.elapsed(),
        })
    }
}

impl<T: Transport> CommandHandler<T> {
    /// Encodes `image` for `display` and uploads it.
    ///
    /// Encoding errors are raised before anything is sent.
    pub async fn upload_image(
        &self,
        image: &RawImage,
        encoder: &dyn ImageEncoder,
        display: &DisplayConfig,
        options: &UploadOptions,
    ) -> Result<UploadReport> {
        let data = prepare_for_display(encoder, image, display, options.dither_mode)?;
        self.upload_encoded(&data, options).await
    }

    /// Uploads already-encoded panel bytes and waits for the refresh.
    pub async fn upload_encoded(
        &self,
        data: &[u8],
        options: &UploadOptions,
    ) -> Result<UploadReport> {
        let _op = self.begin().await;
        let mut run = UploadRun {
            handler: self,
            state: UploadState::Idle,
        };

        match run.execute(data, options).await {
            Ok(report) => {
                tracing::info!(
                    "upload done: {} bytes {:?} in {} chunks, {:?}",
                    report.image_size,
                    report.strategy,
                    report.chunks,
                    report.elapsed
                );
                self.dispatcher
                    .dispatch(Event::UploadCompleted(Box::new(report.clone())));
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("upload failed during {:?}: {e}", run.state);
                run.enter(UploadState::Failed);
                self.dispatcher.dispatch(Event::UploadFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Sends `data` in data frames, one response per frame.
    ///
    /// A frame that gets no answer within the response timeout is waited on
    /// once more for the refresh timeout, since the device may be refreshing
    /// inline. Only meaningful after a start frame was acked; runs as its own
    /// operation, so it never interleaves with another one.
    pub async fn send_data_chunks(&self, data: &[u8]) -> Result<ChunkOutcome> {
        let _op = self.begin().await;
        self.send_chunks(data).await
    }

    async fn send_chunks(&self, data: &[u8]) -> Result<ChunkOutcome> {
        let total = data.len();
        let mut sent = 0;
        let mut chunks_sent = 0;

        for chunk in data.chunks(UPLOAD_CHUNK_SIZE) {
            self.send(command::upload_data(chunk)?).await?;
            chunks_sent += 1;

            let frame = match self.recv(self.response_timeout).await {
                Ok(frame) => frame,
                Err(e) if e.is_timeout() => {
                    tracing::warn!(
                        "no response to chunk {chunks_sent}, waiting up to {:?}",
                        self.refresh_timeout
                    );
                    self.recv(self.refresh_timeout).await?
                }
                Err(e) => return Err(e),
            };

            let response = Response::parse(&frame)?;
            match response.opcode {
                Opcode::UploadData => {
                    sent += chunk.len();
                    tracing::trace!("chunk {chunks_sent} acked, {sent}/{total}");
                    self.dispatcher
                        .dispatch(Event::UploadProgress { sent, total });
                }
                Opcode::UploadEnd => return Ok(ChunkOutcome::AutoCompleted { chunks_sent }),
                Opcode::Reboot
                | Opcode::ReadConfig
                | Opcode::WriteConfig
                | Opcode::WriteConfigChunk
                | Opcode::ReadFirmwareVersion
                | Opcode::UploadStart
                | Opcode::RefreshComplete
                | Opcode::RefreshTimeout => {
                    return Err(unexpected(&response, "sending image data"));
                }
            }
        }

        Ok(ChunkOutcome::Completed { chunks_sent })
    }

    /// Waits for the device to report the end of the display refresh.
    async fn wait_for_refresh(&self) -> Result<()> {
        let frame = self.recv(self.refresh_timeout).await?;
        let response = Response::parse(&frame)?;
        match response.opcode {
            Opcode::RefreshComplete => Ok(()),
            Opcode::RefreshTimeout => Err(Error::RefreshTimeout),
            Opcode::Reboot
            | Opcode::ReadConfig
            | Opcode::WriteConfig
            | Opcode::WriteConfigChunk
            | Opcode::ReadFirmwareVersion
            | Opcode::UploadStart
            | Opcode::UploadData
            | Opcode::UploadEnd => Err(unexpected(&response, "waiting for refresh")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::commands::tests::handler;
    use crate::encoding::decompress;
    use crate::event::Subscription;
    use crate::transport::mock::{Step, reply, reply_all};

    const START_ACK: &[u8] = &[0x80, 0x70];
    const DATA_ACK: &[u8] = &[0x80, 0x71];
    const END_ACK: &[u8] = &[0x80, 0x72];
    const REFRESH_DONE: &[u8] = &[0x00, 0x73];
    const REFRESH_TIMEOUT: &[u8] = &[0x00, 0x74];

    /// Bytes that deflate can't shrink.
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_F491_u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state.to_le_bytes()[0]
            })
            .collect()
    }

    fn drain(events: &mut Subscription) -> Vec<Event> {
        std::iter::from_fn(|| events.try_recv()).collect()
    }

    fn phases(events: &[Event]) -> Vec<UploadState> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::UploadPhase(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plan_compressed_fits_in_start_frame() {
        let data = vec![0u8; 2000];
        let plan = plan_upload(&data, true, 6);

        assert_eq!(plan.strategy, UploadStrategy::Compressed);
        assert!(plan.remaining.is_empty());
        assert_eq!(&plan.start[..2], &[0x00, 0x70]);
        assert_eq!(&plan.start[2..6], &2000u32.to_le_bytes());
        assert_eq!(decompress(&plan.start[6..]).unwrap(), data);
    }

    #[test]
    fn test_plan_compressed_spills_into_chunks() {
        let data = noise(1000);
        let plan = plan_upload(&data, true, 6);

        assert_eq!(plan.strategy, UploadStrategy::Compressed);
        assert_eq!(plan.start.len(), 200);
        assert_eq!(plan.head, 194);

        let mut stream = plan.start[6..].to_vec();
        stream.extend_from_slice(&plan.remaining);
        assert_eq!(decompress(&stream).unwrap(), data);
    }

    #[test]
    fn test_plan_falls_back_when_compression_does_not_help() {
        let data = noise(60 * 1024);
        let plan = plan_upload(&data, true, 6);

        assert_eq!(plan.strategy, UploadStrategy::Uncompressed);
        assert_eq!(&plan.start[..], &[0x00, 0x70]);
        assert_eq!(plan.remaining.len(), data.len());
    }

    #[test]
    fn test_plan_uncompressed_when_not_requested() {
        let plan = plan_upload(&[0u8; 100], false, 6);
        assert_eq!(plan.strategy, UploadStrategy::Uncompressed);
        assert_eq!(plan.head, 0);
        assert_eq!(plan.remaining.len(), 100);
    }

    #[tokio::test]
    async fn test_chunk_sender_auto_completion() {
        let (handler, device, _) = handler(
            vec![reply(DATA_ACK), reply(&[0x00, 0x72]), reply(DATA_ACK)],
            &ClientConfig::default(),
        )
        .await;

        let outcome = handler.send_data_chunks(&[0xAB; 600]).await.unwrap();

        assert_eq!(outcome, ChunkOutcome::AutoCompleted { chunks_sent: 2 });
        assert_eq!(device.written_opcodes(), vec![0x0071, 0x0071]);
    }

    #[tokio::test]
    async fn test_chunk_sender_unexpected_opcode() {
        let (handler, _, _) =
            handler(vec![reply(&[0x00, 0x43])], &ClientConfig::default()).await;

        assert!(matches!(
            handler.send_data_chunks(&[0; 10]).await,
            Err(Error::Protocol { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_sender_recovers_late_ack() {
        let (handler, device, _) = handler(
            vec![
                reply(DATA_ACK),
                Step::ReplyAfter(Duration::from_secs(8), vec![Bytes::from_static(DATA_ACK)]),
            ],
            &ClientConfig::default(),
        )
        .await;

        let outcome = handler.send_data_chunks(&[1; 300]).await.unwrap();

        assert_eq!(outcome, ChunkOutcome::Completed { chunks_sent: 2 });
        assert_eq!(device.written().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_sender_gives_up_after_refresh_timeout() {
        let config = ClientConfig::default().refresh_timeout(Duration::from_secs(20));
        let (handler, _, _) = handler(vec![Step::Silent], &config).await;

        assert!(matches!(
            handler.send_data_chunks(&[1; 10]).await,
            Err(Error::Timeout { timeout_ms: 20_000 })
        ));
    }

    #[tokio::test]
    async fn test_upload_uncompressed() {
        let (handler, device, dispatcher) = handler(
            vec![
                reply(START_ACK),
                reply(DATA_ACK),
                reply(DATA_ACK),
                reply(DATA_ACK),
                reply_all(&[END_ACK, REFRESH_DONE]),
            ],
            &ClientConfig::default(),
        )
        .await;
        let mut events = dispatcher.subscribe();
        let options = UploadOptions::default()
            .compress(false)
            .refresh_mode(RefreshMode::Fast);

        let report = handler.upload_encoded(&[7; 500], &options).await.unwrap();

        assert_eq!(report.strategy, UploadStrategy::Uncompressed);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.bytes_sent, 500);
        assert!(!report.auto_completed);

        let written = device.written();
        assert_eq!(
            device.written_opcodes(),
            vec![0x0070, 0x0071, 0x0071, 0x0071, 0x0072]
        );
        assert_eq!(&written[0][..], &[0x00, 0x70]);
        assert_eq!(written[1].len(), 2 + 230);
        assert_eq!(written[3].len(), 2 + 40);
        assert_eq!(&written[4][..], &[0x00, 0x72, 0x01]);

        let events = drain(&mut events);
        assert_eq!(
            phases(&events),
            vec![
                UploadState::AwaitStartAck,
                UploadState::SendingChunks,
                UploadState::AwaitEndAck,
                UploadState::AwaitRefresh,
                UploadState::Done,
            ]
        );
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::UploadProgress { sent, total } => Some((*sent, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(230, 500), (460, 500), (500, 500)]);
        assert!(matches!(events.last(), Some(Event::UploadCompleted(_))));
    }

    #[tokio::test]
    async fn test_upload_compressed_in_start_frame() {
        let (handler, device, _) = handler(
            vec![reply(START_ACK), reply_all(&[END_ACK, REFRESH_DONE])],
            &ClientConfig::default(),
        )
        .await;

        let report = handler
            .upload_encoded(&[0; 4000], &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(report.strategy, UploadStrategy::Compressed);
        assert_eq!(report.chunks, 0);
        assert_eq!(device.written_opcodes(), vec![0x0070, 0x0072]);
        assert_eq!(&device.written()[1][..], &[0x00, 0x72, 0x00]);
    }

    #[tokio::test]
    async fn test_upload_auto_completion_skips_end_frame() {
        let (handler, device, _) = handler(
            vec![
                reply(START_ACK),
                reply(DATA_ACK),
                reply_all(&[&[0x00, 0x72], REFRESH_DONE]),
            ],
            &ClientConfig::default(),
        )
        .await;

        let report = handler
            .upload_encoded(&[3; 690], &UploadOptions::default().compress(false))
            .await
            .unwrap();

        assert!(report.auto_completed);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.bytes_sent, 460);
        assert_eq!(device.written_opcodes(), vec![0x0070, 0x0071, 0x0071]);
    }

    #[tokio::test]
    async fn test_upload_refresh_timeout() {
        let (handler, _, dispatcher) = handler(
            vec![reply(START_ACK), reply_all(&[END_ACK, REFRESH_TIMEOUT])],
            &ClientConfig::default(),
        )
        .await;
        let mut events = dispatcher.subscribe();

        let err = handler
            .upload_encoded(&[0; 100], &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RefreshTimeout));
        let events = drain(&mut events);
        assert_eq!(phases(&events).last(), Some(&UploadState::Failed));
        assert!(matches!(events.last(), Some(Event::UploadFailed { .. })));
    }

    #[tokio::test]
    async fn test_upload_start_ack_mismatch() {
        let (handler, device, _) =
            handler(vec![reply(&[0x00, 0x71])], &ClientConfig::default()).await;

        let err = handler
            .upload_encoded(&[0; 100], &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::AckMismatch {
                expected: 0x0070,
                actual: 0x0071
            }
        ));
        assert_eq!(device.written_opcodes(), vec![0x0070]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_start_ack_timeout() {
        let (handler, device, dispatcher) =
            handler(vec![Step::Silent], &ClientConfig::default()).await;
        let mut events = dispatcher.subscribe();

        let err = handler
            .upload_encoded(&[0; 100], &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { timeout_ms: 5000 }));
        assert_eq!(device.written_opcodes(), vec![0x0070]);
        assert_eq!(phases(&drain(&mut events)).last(), Some(&UploadState::Failed));
    }

    #[tokio::test]
    async fn test_upload_end_ack_mismatch() {
        let (handler, device, dispatcher) = handler(
            vec![reply(START_ACK), reply(&[0x80, 0x73])],
            &ClientConfig::default(),
        )
        .await;
        let mut events = dispatcher.subscribe();

        let err = handler
            .upload_encoded(&[0; 100], &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::AckMismatch {
                expected: 0x0072,
                actual: 0x8073
            }
        ));
        assert_eq!(device.written_opcodes(), vec![0x0070, 0x0072]);
        assert_eq!(phases(&drain(&mut events)).last(), Some(&UploadState::Failed));
    }

    #[tokio::test]
    async fn test_upload_refresh_unexpected_opcode() {
        let (handler, _, dispatcher) = handler(
            vec![reply(START_ACK), reply_all(&[END_ACK, &[0x80, 0x71]])],
            &ClientConfig::default(),
        )
        .await;
        let mut events = dispatcher.subscribe();

        let err = handler
            .upload_encoded(&[0; 100], &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol { .. }));
        let events = drain(&mut events);
        assert_eq!(phases(&events).last(), Some(&UploadState::Failed));
        assert!(matches!(events.last(), Some(Event::UploadFailed { .. })));
    }

    #[tokio::test]
    async fn test_direct_chunks_wait_for_running_upload() {
        let (handler, device, _) = handler(
            vec![
                Step::ReplyAfter(Duration::from_millis(50), vec![Bytes::from_static(START_ACK)]),
                reply_all(&[END_ACK, REFRESH_DONE]),
                reply(DATA_ACK),
            ],
            &ClientConfig::default(),
        )
        .await;

        let options = UploadOptions::default();
        let (upload, chunks) = tokio::join!(
            handler.upload_encoded(&[0; 100], &options),
            async {
                tokio::task::yield_now().await;
                handler.send_data_chunks(&[1; 10]).await
            }
        );

        assert!(upload.is_ok());
        assert_eq!(chunks.unwrap(), ChunkOutcome::Completed { chunks_sent: 1 });
        assert_eq!(device.written_opcodes(), vec![0x0070, 0x0072, 0x0071]);
    }

    #[tokio::test]
    async fn test_upload_rejects_empty() {
        let (handler, device, _) = handler(vec![], &ClientConfig::default()).await;
        assert!(matches!(
            handler.upload_encoded(&[], &UploadOptions::default()).await,
            Err(Error::Encoding { .. })
        ));
        assert!(device.written().is_empty());
    }
}
