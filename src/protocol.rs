// MIT License - Copyright (c) 2026 Peter Wright
// Control channel wire protocol

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::constants::{DEFAULT_HISTORY_LIMIT, DEFAULT_HISTORY_OFFSET, FRAME_HEADER_LEN, MAX_FRAME_LEN};
use crate::error::{AlarmError, Result};

/// Commands accepted on the control socket.
///
/// # Framing
///
/// Every message in either direction is a 5-digit zero-padded ASCII decimal
/// length followed by that many bytes of UTF-8 JSON:
///
/// ```text
/// 00017{"command":"arm"}
/// ```
///
/// One request and one response per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    /// Toggle the keyswitch to arm.
    Arm,
    /// Toggle the keyswitch to disarm.
    Disarm,
    /// Arm, marking the resulting Close report as automatic.
    AutoArm,
    /// Disarm, but only if the system was armed with `auto-arm`.
    AutoDisarm,
    /// Current arm/system status.
    Status,
    /// Page of the event history, newest first.
    History,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Arm => "arm",
            Command::Disarm => "disarm",
            Command::AutoArm => "auto-arm",
            Command::AutoDisarm => "auto-disarm",
            Command::Status => "status",
            Command::History => "history",
        }
    }
}

/// Paging options for `history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOptions {
    #[serde(default = "default_offset")]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_offset() -> i64 {
    DEFAULT_HISTORY_OFFSET
}
fn default_limit() -> i64 {
    DEFAULT_HISTORY_LIMIT
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            offset: DEFAULT_HISTORY_OFFSET,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<HistoryOptions>,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            options: None,
        }
    }

    pub fn history(offset: i64, limit: i64) -> Self {
        Self {
            command: Command::History,
            options: Some(HistoryOptions { offset, limit }),
        }
    }
}

/// Reply to a [`Request`]. `error` is `false` on success and the error
/// message otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(with = "error_flag")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl Response {
    pub fn ok(response: impl Serialize) -> Result<Self> {
        Ok(Self {
            error: None,
            response: Some(serde_json::to_value(response)?),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            response: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// `false` ⇄ `None`, `"message"` ⇄ `Some(message)`.
mod error_flag {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Message(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            None => s.serialize_bool(false),
            Some(msg) => s.serialize_str(msg),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Flag::deserialize(d)? {
            Flag::Bool(false) => None,
            Flag::Bool(true) => Some("error".to_string()),
            Flag::Message(msg) => Some(msg),
        })
    }
}

/// Read one frame's payload.
pub async fn read_frame_bytes<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let len = parse_header(&header)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Read and decode one frame.
pub async fn read_frame<R: AsyncRead + Unpin, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let payload = read_frame_bytes(reader).await?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Encode and write one frame.
pub async fn write_frame<W: AsyncWrite + Unpin, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let frame = encode_frame(value)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Length-prefixed JSON encoding of `value`.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    if json.len() > MAX_FRAME_LEN {
        return Err(AlarmError::FrameTooLarge {
            len: json.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let mut frame = format!("{:0width$}", json.len(), width = FRAME_HEADER_LEN).into_bytes();
    frame.extend_from_slice(&json);
    Ok(frame)
}

fn parse_header(header: &[u8; FRAME_HEADER_LEN]) -> Result<usize> {
    let invalid = || AlarmError::InvalidFrameHeader {
        header: String::from_utf8_lossy(header).into_owned(),
    };
    if !header.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    std::str::from_utf8(header)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)
}

/// Send a single request to the daemon listening at `path`.
pub async fn send_request(path: impl AsRef<Path>, request: &Request) -> Result<Response> {
    let mut stream = UnixStream::connect(path).await?;
    write_frame(&mut stream, request).await?;
    read_frame(&mut stream).await
}
