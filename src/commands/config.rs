//! Config read (interrogate) and write.
//!
//! A config read answers with a first frame
//! `[echo:2] [total_len:2 LE] [payload...]` followed by continuation frames
//! `[marker:2] [payload...]` until `total_len` payload bytes have arrived.
//! The concatenated payload is the wrapped TLV blob.
//!
//! A config write sends the frames of [`command::write_config`], waiting for
//! an ack after each one.

use bytes::{Buf, BytesMut};

use crate::commands::CommandHandler;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::protocol::{
    MAX_CONFIG_SIZE, Opcode, command, parse_config_response, serialize_config, strip_echo,
    validate_ack,
};
use crate::transport::Transport;
use crate::types::GlobalConfig;

/// Size of the echo plus length header on the first read frame.
const FIRST_FRAME_HEADER: usize = 4;

/// Size of the marker on continuation read frames.
const CONTINUATION_MARKER: usize = 2;

/// Accumulates the payload of a chunked config read.
#[derive(Debug)]
pub struct ConfigAssembler {
    total: usize,
    data: BytesMut,
}

impl ConfigAssembler {
    /// Starts from the first response frame.
    pub fn from_first_frame(frame: &[u8]) -> Result<Self> {
        validate_ack(frame, Opcode::ReadConfig)?;
        if frame.len() < FIRST_FRAME_HEADER {
            return Err(Error::protocol(format!(
                "config response too short for length header: {} bytes",
                frame.len()
            )));
        }

        let mut body = strip_echo(frame, Opcode::ReadConfig);
        let total = usize::from(body.get_u16_le());
        if total > MAX_CONFIG_SIZE {
            return Err(Error::SizeLimit {
                size: total,
                max: MAX_CONFIG_SIZE,
            });
        }

        let mut assembler = Self {
            total,
            data: BytesMut::with_capacity(total),
        };
        assembler.append(body);
        Ok(assembler)
    }

    /// Adds a continuation frame.
    pub fn push_continuation(&mut self, frame: &[u8]) -> Result<()> {
        let Some(payload) = frame.get(CONTINUATION_MARKER..) else {
            return Err(Error::protocol(format!(
                "config continuation too short: {} bytes",
                frame.len()
            )));
        };
        self.append(payload);
        Ok(())
    }

    fn append(&mut self, payload: &[u8]) {
        let take = payload.len().min(self.remaining());
        if take < payload.len() {
            tracing::debug!(
                "dropping {} bytes past declared config length {}",
                payload.len() - take,
                self.total
            );
        }
        self.data.extend_from_slice(&payload[..take]);
    }

    /// Returns the declared total length.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Returns how many payload bytes are still expected.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total - self.data.len()
    }

    /// Returns true once the declared length has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the assembled payload.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.data.to_vec()
    }
}

/// Reassembles a config read from already-received frames.
///
/// Frames after the declared length is reached are ignored.
pub fn reassemble_config_response<I, F>(first: &[u8], next: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut assembler = ConfigAssembler::from_first_frame(first)?;
    let mut frames = next.into_iter();
    while !assembler.is_complete() {
        let Some(frame) = frames.next() else {
            return Err(Error::protocol(format!(
                "config response ended {} bytes short of {}",
                assembler.remaining(),
                assembler.total()
            )));
        };
        assembler.push_continuation(frame.as_ref())?;
    }
    Ok(assembler.finish())
}

impl<T: Transport> CommandHandler<T> {
    /// Reads and parses the device configuration.
    pub async fn read_config(&self) -> Result<GlobalConfig> {
        let _op = self.begin().await;

        let first = self.request(command::read_config()).await?;
        let mut assembler = ConfigAssembler::from_first_frame(&first)?;
        let mut frames = 1;
        while !assembler.is_complete() {
            let frame = self.recv(self.response_timeout).await?;
            assembler.push_continuation(&frame)?;
            frames += 1;
        }

        let data = assembler.finish();
        tracing::debug!("config read: {} bytes in {frames} frames", data.len());

        let config = parse_config_response(&data)?;
        tracing::info!(
            "config loaded: version {}, {} displays",
            config.version,
            config.displays.len()
        );
        self.dispatcher
            .dispatch(Event::ConfigLoaded(Box::new(config.clone())));
        Ok(config)
    }

    /// Serializes and writes a configuration.
    ///
    /// Stops at the first frame whose ack doesn't match; earlier frames have
    /// already been applied by the device.
    pub async fn write_config(&self, config: &GlobalConfig) -> Result<()> {
        let _op = self.begin().await;

        let data = serialize_config(config)?;
        let command = command::write_config(&data)?;
        let count = command.frame_count();

        for (index, frame) in command.frames().enumerate() {
            let expected = if index == 0 {
                Opcode::WriteConfig
            } else {
                Opcode::WriteConfigChunk
            };
            if let Err(e) = self.request_ack(frame, expected).await {
                tracing::warn!("config write aborted at frame {}/{count}: {e}", index + 1);
                return Err(e);
            }
        }

        tracing::info!("config written: {} bytes in {count} frames", data.len());
        self.dispatcher.dispatch(Event::ConfigWritten {
            bytes: data.len(),
            frames: count,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::commands::tests::handler;
    use crate::protocol::crc16;
    use crate::transport::mock::{Step, reply, reply_all};
    use crate::types::{DisplayConfig, SystemConfig};

    fn first_frame(total: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x00, 0x40];
        frame.extend_from_slice(&total.to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    fn continuation(payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x00, 0x40];
        frame.extend_from_slice(payload);
        frame
    }

    /// Wraps a TLV body the way the device answers a read.
    fn wrapped(version: u8, body: &[u8]) -> Vec<u8> {
        let total = u16::try_from(3 + body.len() + 2).unwrap();
        let mut data = total.to_le_bytes().to_vec();
        data.push(version);
        data.extend_from_slice(body);
        let crc = crc16(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        data
    }

    fn sample_config() -> GlobalConfig {
        let mut config = GlobalConfig::new(1);
        config.system = Some(SystemConfig {
            ic_type: 1,
            communication_modes: 3,
            ..SystemConfig::default()
        });
        config.displays.push(DisplayConfig {
            pixel_width: 296,
            pixel_height: 128,
            ..DisplayConfig::default()
        });
        config
    }

    #[test]
    fn test_reassemble_500_bytes() {
        let payload: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let first = first_frame(500, &payload[..196]);
        let rest = [
            continuation(&payload[196..346]),
            continuation(&payload[346..496]),
            continuation(&payload[496..]),
        ];

        let data = reassemble_config_response(&first, &rest).unwrap();
        assert_eq!(data.len(), 500);
        assert_eq!(data, payload);
    }

    #[test]
    fn test_reassemble_single_frame() {
        let first = first_frame(3, &[1, 2, 3]);
        let data = reassemble_config_response(&first, Vec::<Vec<u8>>::new()).unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[test]
    fn test_reassemble_drops_excess() {
        let first = first_frame(4, &[1, 2]);
        let rest = [continuation(&[3, 4, 5, 6]), continuation(&[7])];
        let data = reassemble_config_response(&first, &rest).unwrap();
        assert_eq!(data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_reassemble_short_first_frame() {
        assert!(matches!(
            reassemble_config_response(&[0x00, 0x40, 0x05], Vec::<Vec<u8>>::new()),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_reassemble_wrong_echo() {
        let mut first = first_frame(2, &[1, 2]);
        first[1] = 0x43;
        assert!(matches!(
            reassemble_config_response(&first, Vec::<Vec<u8>>::new()),
            Err(Error::AckMismatch { .. })
        ));
    }

    #[test]
    fn test_reassemble_missing_frames() {
        let first = first_frame(10, &[1, 2]);
        let rest = [continuation(&[3])];
        assert!(matches!(
            reassemble_config_response(&first, &rest),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_reassemble_rejects_oversized_total() {
        let first = first_frame(5000, &[0; 8]);
        assert!(matches!(
            reassemble_config_response(&first, Vec::<Vec<u8>>::new()),
            Err(Error::SizeLimit { size: 5000, .. })
        ));
    }

    #[tokio::test]
    async fn test_read_config() {
        let serialized = serialize_config(&sample_config()).unwrap();
        // TLV body: skip reserved + version, drop CRC
        let body = &serialized[3..serialized.len() - 2];
        let data = wrapped(1, body);
        let total = u16::try_from(data.len()).unwrap();

        let (head, tail) = data.split_at(20);
        let first = first_frame(total, head);
        let second = continuation(tail);

        let (handler, device, dispatcher) = handler(
            vec![reply_all(&[&first, &second])],
            &ClientConfig::default(),
        )
        .await;
        let mut events = dispatcher.subscribe();

        let config = handler.read_config().await.unwrap();
        assert!(config.loaded);
        assert_eq!(config, sample_config());
        assert_eq!(device.written_opcodes(), vec![0x0040]);
        assert!(matches!(events.try_recv(), Some(Event::ConfigLoaded(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_config_times_out_mid_sequence() {
        let first = first_frame(100, &[0; 10]);
        let (handler, _, _) = handler(vec![reply(&first)], &ClientConfig::default()).await;

        assert!(handler.read_config().await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_write_config_single_frame() {
        let (handler, device, _) =
            handler(vec![reply(&[0x80, 0x41])], &ClientConfig::default()).await;

        handler.write_config(&sample_config()).await.unwrap();

        let written = device.written();
        assert_eq!(written.len(), 1);
        assert_eq!(&written[0][..2], &[0x00, 0x41]);
        assert_eq!(&written[0][2..], &serialize_config(&sample_config()).unwrap()[..]);
    }

    #[tokio::test]
    async fn test_write_config_multi_frame() {
        let mut config = sample_config();
        for _ in 0..3 {
            config.displays.push(DisplayConfig::default());
        }
        let data = serialize_config(&config).unwrap();
        let chunks = command::write_config(&data).unwrap().frame_count();
        assert!(chunks > 1);

        let mut script = vec![reply(&[0x00, 0x41])];
        script.extend((1..chunks).map(|_| reply(&[0x80, 0x42])));
        let (handler, device, dispatcher) = handler(script, &ClientConfig::default()).await;
        let mut events = dispatcher.subscribe();

        handler.write_config(&config).await.unwrap();

        let mut expected = vec![0x0041];
        expected.extend(std::iter::repeat_n(0x0042, chunks - 1));
        assert_eq!(device.written_opcodes(), expected);
        assert!(matches!(
            events.try_recv(),
            Some(Event::ConfigWritten { frames, .. }) if frames == chunks
        ));
    }

    #[tokio::test]
    async fn test_write_config_ack_mismatch_aborts() {
        let mut config = sample_config();
        for _ in 0..3 {
            config.displays.push(DisplayConfig::default());
        }
        let (handler, device, _) = handler(
            vec![reply(&[0x00, 0x41]), reply(&[0x00, 0x73]), reply(&[0x00, 0x42])],
            &ClientConfig::default(),
        )
        .await;

        let err = handler.write_config(&config).await.unwrap_err();
        assert!(matches!(
            err,
            Error::AckMismatch {
                expected: 0x0042,
                actual: 0x0073
            }
        ));
        assert_eq!(device.written_opcodes(), vec![0x0041, 0x0042]);
    }

    #[tokio::test]
    async fn test_write_config_rejects_invalid() {
        let mut config = sample_config();
        config.leds = vec![Default::default(); 5];
        let (handler, device, _) = handler(Vec::<Step>::new(), &ClientConfig::default()).await;

        assert!(matches!(
            handler.write_config(&config).await,
            Err(Error::Config(_))
        ));
        assert!(device.written().is_empty());
    }
}
