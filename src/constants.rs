// MIT License - Copyright (c) 2026 Peter Wright
// Protocol and timing constants

use std::time::Duration;

/// Number of hex nibbles in a complete Contact ID message.
///
/// Layout: `AAAA MT Q EEE GG ZZZ S`
/// - `AAAA` account number
/// - `MT` message type (18 or 98)
/// - `Q` event qualifier (1 = new event, 3 = restore / closing, 6 = status)
/// - `EEE` event code
/// - `GG` group / partition
/// - `ZZZ` zone or user number
/// - `S` checksum nibble
pub const CONTACT_ID_LEN: usize = 16;

/// Shortest message the decoder will attempt to interpret (checksum nibble missing).
pub const MIN_DECODE_LEN: usize = 15;

/// Sum of all nibbles must be a multiple of this for a valid message.
pub const CHECKSUM_MODULUS: u32 = 15;

/// A `0` nibble counts as 10 in the checksum.
pub const ZERO_DIGIT_WEIGHT: u32 = 10;

/// Nibbles the capture device cannot report reliably, tried in order when
/// completing a message that arrived one nibble short.
pub const UNDETECTABLE_NIBBLES: [u8; 2] = [14, 13];

/// Character offsets into a Contact ID message.
pub const QUALIFIER_OFFSET: usize = 6;
pub const EVENT_CODE_RANGE: std::ops::Range<usize> = 7..10;
pub const ZONE_RANGE: std::ops::Range<usize> = 12..15;

/// How long an arm/disarm request may wait for the panel's Open/Close report.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(300);

/// Read timeout for a single control-channel request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Keyswitch pulse length.
pub const KEYSWITCH_PULSE: Duration = Duration::from_secs(2);

/// Control-channel framing: fixed-width decimal length prefix.
pub const FRAME_HEADER_LEN: usize = 5;
pub const MAX_FRAME_LEN: usize = 99_999;

/// Default history window when a request carries no options.
pub const DEFAULT_HISTORY_OFFSET: i64 = 0;
pub const DEFAULT_HISTORY_LIMIT: i64 = 10;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/alarm_socket";
pub const DEFAULT_DATA_FILE_PATH: &str = "/var/lib/alarmd/alarm_status.json";
pub const DEFAULT_CAPTURE_DEVICE: &str = "/dev/hidraw0";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/alarmd.toml";

/// Synthetic event code used for keyswitch confirmation failures.
pub const KEYSWITCH_EVENT_CODE: &str = "KSW";
pub const KEYSWITCH_ARM_QUALIFIER: &str = "ARM";
pub const KEYSWITCH_DISARM_QUALIFIER: &str = "DIS";
