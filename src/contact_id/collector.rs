// MIT License - Copyright (c) 2026 Peter Wright
// Call-in validation and Contact ID message collection

use tracing::{debug, info};

use crate::constants::{CHECKSUM_MODULUS, CONTACT_ID_LEN, UNDETECTABLE_NIBBLES, ZERO_DIGIT_WEIGHT};
use crate::error::Result;
use crate::hardware::{CaptureDevice, Sample};

/// A Contact ID message as heard on the line, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Lowercase hex nibbles.
    pub code: String,
    /// Whether the message checksum verified.
    pub valid: bool,
}

impl RawMessage {
    pub fn new(code: impl Into<String>, valid: bool) -> Self {
        Self {
            code: code.into(),
            valid,
        }
    }
}

/// Checksum weight of one nibble.
pub fn nibble_weight(digit: u8) -> u32 {
    if digit == 0 {
        ZERO_DIGIT_WEIGHT
    } else {
        u32::from(digit)
    }
}

/// Contact ID checksum of a hex digit string; `None` if it is not hex.
pub fn checksum(code: &str) -> Option<u32> {
    code.chars()
        .map(|c| c.to_digit(16).map(|d| nibble_weight(d as u8)))
        .sum()
}

/// Whether a complete message's checksum verifies.
pub fn is_valid(code: &str) -> bool {
    checksum(code).is_some_and(|sum| sum % CHECKSUM_MODULUS == 0)
}

fn hex_nibble(digit: u8) -> char {
    char::from_digit(u32::from(digit), 16).unwrap_or('?')
}

/// Accumulates nibbles into 16-digit messages.
#[derive(Debug, Default)]
struct MessageBuffer {
    code: String,
    checksum: u32,
    messages: Vec<RawMessage>,
}

impl MessageBuffer {
    fn push(&mut self, digit: u8) {
        self.checksum += nibble_weight(digit);
        self.code.push(hex_nibble(digit));
        if self.code.len() == CONTACT_ID_LEN {
            let valid = self.checksum % CHECKSUM_MODULUS == 0;
            self.emit(valid);
        }
    }

    fn emit(&mut self, valid: bool) {
        let code = std::mem::take(&mut self.code);
        self.messages.push(RawMessage { code, valid });
        self.checksum = 0;
    }

    /// Flush whatever is left after hang-up.
    ///
    /// The capture adapter cannot detect the two highest DTMF tones, so a
    /// message one nibble short is completed with whichever of them makes the
    /// checksum verify.
    fn finish(mut self) -> Vec<RawMessage> {
        if self.code.len() == CONTACT_ID_LEN - 1 {
            let fill = UNDETECTABLE_NIBBLES
                .into_iter()
                .find(|&v| (self.checksum + nibble_weight(v)) % CHECKSUM_MODULUS == 0);
            if let Some(v) = fill {
                debug!("Completing short message {} with nibble {v:x}", self.code);
                self.code.push(hex_nibble(v));
                self.emit(true);
            }
        }
        if !self.code.is_empty() {
            self.emit(false);
        }
        self.messages
    }
}

/// Drives one call from first sample to hang-up.
#[derive(Debug, Clone)]
pub struct Collector {
    phone_number: String,
}

impl Collector {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into().to_lowercase(),
        }
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    /// Handle a call whose first sample has already been read.
    ///
    /// Returns `None` when the caller is not the panel or hangs up before
    /// dialing the receiver number.
    pub async fn handle_call<C: CaptureDevice>(
        &self,
        device: &mut C,
        first: Sample,
    ) -> Result<Option<Vec<RawMessage>>> {
        if !self.validate_call_in(device, first).await? {
            return Ok(None);
        }
        self.collect(device).await.map(Some)
    }

    /// Watch the dialed digits until the receiver number shows up.
    async fn validate_call_in<C: CaptureDevice>(&self, device: &mut C, first: Sample) -> Result<bool> {
        let width = self.phone_number.len();
        let mut window: String = "0".repeat(width);
        let mut sample = first;

        if sample.off_hook {
            info!("Phone Off The Hook");
        }

        while sample.off_hook {
            if let Some(digit) = sample.digit {
                debug!("Digit {digit}");
                window.push(hex_nibble(digit));
                if window.len() > width {
                    window.remove(0);
                }
                debug!("Number {window}");
            }
            if window == self.phone_number {
                info!("Alarm Call In Received");
                return Ok(true);
            }
            sample = device.next_sample().await?;
        }

        info!("Phone On The Hook");
        Ok(false)
    }

    /// Read Contact ID messages until hang-up, with the handshake running.
    async fn collect<C: CaptureDevice>(&self, device: &mut C) -> Result<Vec<RawMessage>> {
        info!("Collecting Alarm Codes");
        device.begin_handshake().await?;

        let mut buffer = MessageBuffer::default();
        let read = Self::read_until_hang_up(device, &mut buffer).await;
        let ended = device.end_handshake().await;
        read?;
        info!("Alarm Hung Up");
        ended?;
        Ok(buffer.finish())
    }

    async fn read_until_hang_up<C: CaptureDevice>(device: &mut C, buffer: &mut MessageBuffer) -> Result<()> {
        loop {
            let sample = device.next_sample().await?;
            if !sample.off_hook {
                return Ok(());
            }
            if let Some(digit) = sample.digit {
                buffer.push(digit);
            }
        }
    }
}
