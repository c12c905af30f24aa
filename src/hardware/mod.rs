// MIT License - Copyright (c) 2026 Peter Wright
// Hardware collaborators

pub mod gpio;
pub mod hidraw;

use crate::error::Result;

pub use gpio::SysfsKeyswitch;
pub use hidraw::{HidrawCapture, ReportFlags};

/// One line-status sample from the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Whether the line is currently off the hook.
    pub off_hook: bool,
    /// DTMF digit (0-15) heard since the previous sample, if any.
    pub digit: Option<u8>,
}

impl Sample {
    pub fn new(off_hook: bool, digit: Option<u8>) -> Self {
        Self { off_hook, digit }
    }
}

/// Source of line-status samples for the telephone line the panel dials into.
///
/// `next_sample` must be cancel-safe: the daemon races it against other
/// sources and treats its first completion as the start of a call.
#[allow(async_fn_in_trait)]
pub trait CaptureDevice {
    async fn next_sample(&mut self) -> Result<Sample>;

    /// Start the receiver handshake once a call has been validated.
    async fn begin_handshake(&mut self) -> Result<()> {
        Ok(())
    }

    /// Wait for the handshake started by `begin_handshake` to finish.
    async fn end_handshake(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The panel's temporary keyswitch input; each toggle flips arm state.
#[allow(async_fn_in_trait)]
pub trait Keyswitch {
    async fn toggle(&mut self) -> Result<()>;
}
