//! Device-under-test console access.
//!
//! The runner only needs two things from the board: block until a console line
//! containing some text shows up, and hand back everything printed before that line.
//! [`Dut`] captures exactly that. [`LineDut`] implements it over any async line source,
//! which is how both the serial console and in-memory captures are read.
//!
//! # Example
//!
//! ```no_run
//! use coex_bench::dut::{Dut, SerialConnector, DutConnector};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn demo() -> coex_bench::error::AppResult<()> {
//! let connector = SerialConnector::new("/dev/ttyUSB0", 115_200);
//! let mut dut = connector.connect("balanced", Path::new("build_balanced")).await?;
//! dut.expect("Starting speed test suite", Duration::from_secs(60)).await?;
//! dut.expect("Test suite complete.", Duration::from_secs(240)).await?;
//! println!("{}", dut.before());
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, HarnessError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::trace;

/// Line-oriented console of a device under test.
#[async_trait]
pub trait Dut: Send {
    /// Reads console output until a line containing `pattern` appears.
    ///
    /// Returns the matching line. Output read before it (since the previous match)
    /// becomes available through [`Dut::before`].
    ///
    /// # Errors
    /// [`HarnessError::DeviceTimeout`] when `timeout` elapses first,
    /// [`HarnessError::DeviceClosed`] when the output ends first.
    async fn expect(&mut self, pattern: &str, timeout: Duration) -> AppResult<String>;

    /// Output captured between the last two matches.
    fn before(&self) -> &str;
}

/// Opens the console of the board running a given profile.
#[async_trait]
pub trait DutConnector: Send + Sync {
    /// Opens a fresh console for `profile`, whose build output lives in `build_dir`.
    async fn connect(&self, profile: &str, build_dir: &Path) -> AppResult<Box<dyn Dut>>;
}

/// [`Dut`] over an async buffered reader.
pub struct LineDut<R> {
    reader: R,
    line: Vec<u8>,
    pending: String,
    before: String,
}

impl<R> LineDut<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Wraps a line reader; nothing is consumed until the first `expect`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            pending: String::new(),
            before: String::new(),
        }
    }

    /// Next complete line, or the unterminated tail at end of stream.
    async fn next_line(&mut self) -> AppResult<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.line).await?;
        if read == 0 && self.line.is_empty() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        Ok(Some(text))
    }

    async fn read_until_match(&mut self, pattern: &str) -> AppResult<String> {
        while let Some(line) = self.next_line().await? {
            trace!(target: "dut", "{}", line.trim_end());
            if line.contains(pattern) {
                self.before = std::mem::take(&mut self.pending);
                return Ok(line.trim_end().to_string());
            }
            self.pending.push_str(&line);
            if !line.ends_with('\n') {
                self.pending.push('\n');
            }
        }
        Err(HarnessError::DeviceClosed {
            pattern: pattern.to_string(),
        })
    }
}

#[async_trait]
impl<R> Dut for LineDut<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn expect(&mut self, pattern: &str, timeout: Duration) -> AppResult<String> {
        match tokio::time::timeout(timeout, self.read_until_match(pattern)).await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::DeviceTimeout {
                pattern: pattern.to_string(),
                timeout,
            }),
        }
    }

    fn before(&self) -> &str {
        &self.before
    }
}

/// Connects to the board over its serial console (8N1, no flow control).
///
/// Flashing the profile's firmware is done beforehand by the build tooling; the
/// connector only attaches to the console.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baud_rate: u32,
}

impl SerialConnector {
    /// Connector for `port` at `baud_rate`, 8N1 without flow control.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }
}

#[cfg(feature = "instrument_serial")]
#[async_trait]
impl DutConnector for SerialConnector {
    async fn connect(&self, profile: &str, build_dir: &Path) -> AppResult<Box<dyn Dut>> {
        use tokio::io::BufReader;
        use tokio_serial::SerialPortBuilderExt;

        tracing::info!(
            profile,
            port = %self.port,
            baud = self.baud_rate,
            build_dir = %build_dir.display(),
            "opening device console"
        );

        let port = tokio_serial::new(&self.port, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| HarnessError::SerialOpen {
                port: self.port.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(LineDut::new(BufReader::new(port))))
    }
}

#[cfg(not(feature = "instrument_serial"))]
#[async_trait]
impl DutConnector for SerialConnector {
    async fn connect(&self, _profile: &str, _build_dir: &Path) -> AppResult<Box<dyn Dut>> {
        Err(HarnessError::SerialFeatureDisabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    fn dut_from(text: &'static str) -> LineDut<BufReader<&'static [u8]>> {
        LineDut::new(BufReader::new(text.as_bytes()))
    }

    #[tokio::test]
    async fn before_holds_text_between_matches() {
        let mut dut = dut_from(
            "boot noise\nI (1) t: Starting speed test suite (3 tests)\nrow one\nrow two\nI (9) t: Test suite complete.\n",
        );

        let start = dut
            .expect("Starting speed test suite", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(start, "I (1) t: Starting speed test suite (3 tests)");
        assert_eq!(dut.before(), "boot noise\n");

        dut.expect("Test suite complete.", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(dut.before(), "row one\nrow two\n");
    }

    #[tokio::test]
    async fn end_of_stream_is_device_closed() {
        let mut dut = dut_from("only\nsome lines");
        let err = dut
            .expect("never printed", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::DeviceClosed { ref pattern } if pattern == "never printed"));
    }

    #[tokio::test]
    async fn unterminated_last_line_can_match() {
        let mut dut = dut_from("a\nTest suite complete.");
        assert!(dut
            .expect("Test suite complete.", Duration::from_secs(1))
            .await
            .is_ok());
        assert_eq!(dut.before(), "a\n");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let bytes: &'static [u8] = b"caf\xff\nStart\n";
        let mut dut = LineDut::new(BufReader::new(bytes));
        dut.expect("Start", Duration::from_secs(1)).await.unwrap();
        assert!(dut.before().starts_with("caf"));
        assert!(dut.before().contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let (console, mut board) = tokio::io::duplex(64);
        board.write_all(b"booting\n").await.unwrap();
        let mut dut = LineDut::new(BufReader::new(console));

        let err = dut
            .expect("Starting speed test suite", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::DeviceTimeout { .. }));
        assert_eq!(dut.before(), "");
        drop(board);
    }
}
