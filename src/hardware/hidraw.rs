// MIT License - Copyright (c) 2026 Peter Wright
// Linux hidraw capture device (USB telephony adapter)

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bitflags::bitflags;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{AlarmError, Result};
use crate::hardware::{CaptureDevice, Sample};

bitflags! {
    /// Status byte of a line-status HID report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReportFlags: u8 {
        /// Line is off hook
        const OFF_HOOK = 0x80;
    }
}

/// Report digit bytes at or above this value are passed through unshifted.
const DIGIT_SHIFT_LIMIT: u8 = 11;

/// Samples buffered between the reader thread and the daemon loop.
const SAMPLE_QUEUE: usize = 256;

impl Sample {
    /// Decode a 2-byte `[digit, status]` HID report.
    ///
    /// Digit bytes 1-10 carry DTMF 0-9; 0 means no tone. Bytes 11-15 are the
    /// remaining hex digits as-is. Anything larger is treated as no tone.
    pub fn from_report(report: [u8; 2]) -> Self {
        let [digit_byte, status_byte] = report;
        let off_hook = ReportFlags::from_bits_truncate(status_byte).contains(ReportFlags::OFF_HOOK);
        let digit = if digit_byte < DIGIT_SHIFT_LIMIT {
            digit_byte.checked_sub(1)
        } else if digit_byte <= 0x0f {
            Some(digit_byte)
        } else {
            None
        };
        Self { off_hook, digit }
    }
}

/// Capture device backed by a `/dev/hidrawN` node.
///
/// The node is read on a dedicated thread; samples reach the async side over
/// a channel so `next_sample` stays cancel-safe.
pub struct HidrawCapture {
    path: PathBuf,
    rx: mpsc::Receiver<std::io::Result<Sample>>,
    handshake_command: Option<String>,
    handshake: Option<Child>,
}

impl HidrawCapture {
    /// Open the device node and start the reader thread.
    pub fn open(path: impl AsRef<Path>, handshake_command: Option<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let (tx, rx) = mpsc::channel(SAMPLE_QUEUE);

        let thread_path = path.clone();
        std::thread::Builder::new()
            .name("hidraw-reader".into())
            .spawn(move || read_reports(file, &thread_path, tx))?;

        info!("Capture device {} opened", path.display());
        Ok(Self {
            path,
            rx,
            handshake_command,
            handshake: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `ENODEV`: the adapter was unplugged.
const ENODEV: i32 = 19;

/// Pause before reading again after a transient read error.
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Whether a read error means the device is gone for good.
fn is_device_gone(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::UnexpectedEof || err.raw_os_error() == Some(ENODEV)
}

fn read_reports<R: Read>(mut reader: R, path: &Path, tx: mpsc::Sender<std::io::Result<Sample>>) {
    let mut report = [0u8; 2];
    loop {
        let item = match reader.read_exact(&mut report) {
            Ok(()) => Ok(Sample::from_report(report)),
            Err(e) if is_device_gone(&e) => {
                error!("Capture device {}: {}", path.display(), e);
                Err(e)
            }
            Err(e) => {
                warn!("Capture device {}: read error: {}, retrying", path.display(), e);
                std::thread::sleep(READ_RETRY_DELAY);
                continue;
            }
        };
        let gone = item.is_err();
        if tx.blocking_send(item).is_err() {
            debug!("Capture reader: receiver dropped");
            break;
        }
        if gone {
            break;
        }
    }
}

impl CaptureDevice for HidrawCapture {
    async fn next_sample(&mut self) -> Result<Sample> {
        match self.rx.recv().await {
            Some(item) => Ok(item?),
            None => Err(AlarmError::ChannelClosed),
        }
    }

    async fn begin_handshake(&mut self) -> Result<()> {
        let Some(cmd) = &self.handshake_command else {
            return Ok(());
        };
        info!("Handshake Initiated");
        let child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .kill_on_drop(true)
            .spawn()?;
        self.handshake = Some(child);
        Ok(())
    }

    async fn end_handshake(&mut self) -> Result<()> {
        let Some(mut child) = self.handshake.take() else {
            return Ok(());
        };
        let status = child.wait().await?;
        if status.success() {
            info!("Handshake Complete");
        } else {
            warn!("Handshake command exited with {status}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_no_tone() {
        let s = Sample::from_report([0x00, 0x80]);
        assert!(s.off_hook);
        assert_eq!(s.digit, None);
    }

    #[test]
    fn test_report_shifted_digits() {
        assert_eq!(Sample::from_report([0x01, 0x80]).digit, Some(0));
        assert_eq!(Sample::from_report([0x0a, 0x80]).digit, Some(9));
    }

    #[test]
    fn test_report_unshifted_digits() {
        assert_eq!(Sample::from_report([0x0b, 0x00]).digit, Some(11));
        assert_eq!(Sample::from_report([0x0f, 0x00]).digit, Some(15));
        assert_eq!(Sample::from_report([0x10, 0x00]).digit, None);
    }

    #[test]
    fn test_report_on_hook() {
        let s = Sample::from_report([0x05, 0x7f]);
        assert!(!s.off_hook);
        assert_eq!(s.digit, Some(4));
    }

    #[tokio::test]
    async fn test_capture_reads_reports_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hidraw0");
        std::fs::write(&path, [0x02, 0x80, 0x00, 0x00]).unwrap();

        let mut capture = HidrawCapture::open(&path, None).unwrap();
        assert_eq!(capture.next_sample().await.unwrap(), Sample::new(true, Some(1)));
        assert_eq!(capture.next_sample().await.unwrap(), Sample::new(false, None));
        // EOF surfaces as an I/O error, then the channel closes
        assert!(matches!(capture.next_sample().await, Err(AlarmError::Io(_))));
        assert!(matches!(capture.next_sample().await, Err(AlarmError::ChannelClosed)));
    }

    /// Fails once with a transient error, then serves `data`.
    struct FlakyReader {
        failed: bool,
        data: std::io::Cursor<Vec<u8>>,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::from_raw_os_error(5)); // EIO
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn test_device_gone_errors() {
        assert!(is_device_gone(&std::io::Error::from(ErrorKind::UnexpectedEof)));
        assert!(is_device_gone(&std::io::Error::from_raw_os_error(ENODEV)));
        assert!(!is_device_gone(&std::io::Error::from_raw_os_error(5)));
        assert!(!is_device_gone(&std::io::Error::from(ErrorKind::TimedOut)));
    }

    #[test]
    fn test_reader_survives_transient_error() {
        let reader = FlakyReader {
            failed: false,
            data: std::io::Cursor::new(vec![0x03, 0x80]),
        };
        let (tx, mut rx) = mpsc::channel(8);
        read_reports(reader, Path::new("/dev/hidraw-test"), tx);

        assert_eq!(rx.try_recv().unwrap().unwrap(), Sample::new(true, Some(2)));
        let eof = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(eof.kind(), ErrorKind::UnexpectedEof);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handshake_without_command_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hidraw0");
        std::fs::write(&path, []).unwrap();

        let mut capture = HidrawCapture::open(&path, None).unwrap();
        capture.begin_handshake().await.unwrap();
        capture.end_handshake().await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_command_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hidraw0");
        let marker = dir.path().join("played");
        std::fs::write(&path, []).unwrap();

        let cmd = format!("touch {}", marker.display());
        let mut capture = HidrawCapture::open(&path, Some(cmd)).unwrap();
        capture.begin_handshake().await.unwrap();
        capture.end_handshake().await.unwrap();
        assert!(marker.exists());
    }
}
