// MIT License - Copyright (c) 2026 Peter Wright
// Receiver error types

/// All errors that can occur in the alarm receiver library.
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid history range: offset={offset} limit={limit} (offset must be >= 0, limit >= 1)")]
    InvalidRange { offset: i64, limit: i64 },

    #[error("Frame too large: {len} bytes (max: {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Invalid frame header: {header:?}")]
    InvalidFrameHeader { header: String },

    #[error("Control request timed out")]
    RequestTimeout,

    #[error("Arm/disarm is not configured")]
    KeyswitchUnavailable,

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Channel closed")]
    ChannelClosed,
}

impl AlarmError {
    /// Whether this error only affects a single control connection.
    ///
    /// The daemon loop drops the offending connection and keeps serving.
    pub fn is_connection_local(&self) -> bool {
        matches!(
            self,
            AlarmError::Io(_)
                | AlarmError::Json(_)
                | AlarmError::FrameTooLarge { .. }
                | AlarmError::InvalidFrameHeader { .. }
                | AlarmError::RequestTimeout
        )
    }
}

pub type Result<T> = std::result::Result<T, AlarmError>;
