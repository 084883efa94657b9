//! Line-framed duplex channel to the device
//!
//! Wraps any async byte stream (a serial port in production, an in-memory
//! duplex in tests) and exposes it as newline-delimited text with a bounded
//! read timeout.

use bytes::BytesMut;
use futures::StreamExt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::codec::{Decoder, FramedRead};

use super::{TransportError, LINE_TERMINATOR, MAX_LINE_LENGTH};

/// Splits device output on `\n`, dropping a trailing `\r`.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, so a
/// burst of line noise shows up as an unrecognized line instead of ending
/// the session.
#[derive(Debug, Clone)]
pub struct DeviceLineCodec {
    max_length: usize,
    /// Where to resume the newline search on the next call
    next_index: usize,
}

impl DeviceLineCodec {
    /// Codec rejecting lines longer than `max_length` bytes
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }
}

impl Default for DeviceLineCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for DeviceLineCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, TransportError> {
        match buf[self.next_index..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let line = buf.split_to(end + 1);
                Ok(Some(decode_text(&line[..end])))
            }
            None if buf.len() > self.max_length => {
                self.next_index = 0;
                buf.clear();
                Err(TransportError::LineTooLong(self.max_length))
            }
            None => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, TransportError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if buf.is_empty() {
            return Ok(None);
        }
        // Final line without terminator
        let rest = buf.split_to(buf.len());
        Ok(Some(decode_text(&rest)))
    }
}

/// Duplex text channel to the device
pub struct LineChannel<T> {
    reader: FramedRead<ReadHalf<T>, DeviceLineCodec>,
    writer: WriteHalf<T>,
    read_timeout: Duration,
}

impl<T> LineChannel<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Wrap a byte stream; every read is bounded by `read_timeout`
    pub fn new(io: T, read_timeout: Duration) -> Self {
        let (read_half, write_half) = tokio::io::split(io);
        Self {
            reader: FramedRead::new(read_half, DeviceLineCodec::default()),
            writer: write_half,
            read_timeout,
        }
    }

    /// The configured read bound
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Send a command followed by `\r\n`
    pub async fn send_command(&mut self, command: &str) -> Result<(), TransportError> {
        tracing::debug!(command, "sending command");
        let frame = format!("{command}{LINE_TERMINATOR}");
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read the next line.
    ///
    /// Returns `Ok(None)` at end of stream. Cancel safe: a partially
    /// received line stays buffered if the future is dropped.
    pub async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        match tokio::time::timeout(self.read_timeout, self.reader.next()).await {
            Err(_) => Err(TransportError::ReadTimeout(self.read_timeout)),
            Ok(None) => Ok(None),
            Ok(Some(line)) => line.map(Some),
        }
    }

    /// Shut down the write side and release the stream
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_codec_strips_crlf() {
        let mut codec = DeviceLineCodec::default();
        let mut buf = BytesMut::from(&b"OK\r\nNG 01\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("OK".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("NG 01".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_codec_partial_line() {
        let mut codec = DeviceLineCodec::default();
        let mut buf = BytesMut::from(&b"CO2=4"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"00,HUM=50.0,TMP=22.0\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("CO2=400,HUM=50.0,TMP=22.0".to_string())
        );
    }

    #[test]
    fn test_codec_invalid_utf8_is_replaced() {
        let mut codec = DeviceLineCodec::default();
        let mut buf = BytesMut::from(&b"\xffOK\r\n"[..]);
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.ends_with("OK"));
    }

    #[test]
    fn test_codec_rejects_overlong_line() {
        let mut codec = DeviceLineCodec::new(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::LineTooLong(8))
        ));
    }

    #[test]
    fn test_codec_eof_flushes_unterminated_line() {
        let mut codec = DeviceLineCodec::default();
        let mut buf = BytesMut::from(&b"OK STP"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("OK STP".to_string()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[tokio::test]
    async fn test_channel_send_appends_crlf() {
        let (local, mut device) = tokio::io::duplex(64);
        let mut channel = LineChannel::new(local, Duration::from_secs(1));

        channel.send_command("STA").await.unwrap();

        let mut buf = [0u8; 5];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"STA\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_read_timeout() {
        let (local, _device) = tokio::io::duplex(64);
        let mut channel = LineChannel::new(local, Duration::from_secs(10));

        let result = channel.read_line().await;
        assert!(matches!(result, Err(TransportError::ReadTimeout(_))));
    }

    #[tokio::test]
    async fn test_channel_end_of_stream() {
        let (local, device) = tokio::io::duplex(64);
        let mut channel = LineChannel::new(local, Duration::from_secs(1));
        drop(device);

        assert!(channel.read_line().await.unwrap().is_none());
    }
}
