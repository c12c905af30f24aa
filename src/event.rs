// MIT License - Copyright (c) 2026 Peter Wright
// Contact ID event model

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Classification of a decoded report.
///
/// Serialized as the short code used in history and on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    /// A - Alarm
    #[serde(rename = "A")]
    Alarm,
    /// T - Trouble (tamper, lockout)
    #[serde(rename = "T")]
    Trouble,
    /// MA - Miscellaneous trouble (power, phone line, faults)
    #[serde(rename = "MA")]
    MiscTrouble,
    /// O - Open (disarmed)
    #[serde(rename = "O")]
    Open,
    /// AO - Open caused by an automatic disarm request
    #[serde(rename = "AO")]
    AutoOpen,
    /// C - Close (armed)
    #[serde(rename = "C")]
    Close,
    /// AC - Close caused by an automatic arm request
    #[serde(rename = "AC")]
    AutoClose,
    /// R - Restoral of a previously reported condition
    #[serde(rename = "R")]
    Restoral,
    /// S - Status report (condition still present)
    #[serde(rename = "S")]
    Status,
    /// E - Informational event
    #[serde(rename = "E")]
    Event,
    /// U - Unknown / undecodable
    #[serde(rename = "U")]
    Unknown,
}

impl ReportType {
    /// The wire/history code (e.g. "A", "MA", "AC").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alarm => "A",
            Self::Trouble => "T",
            Self::MiscTrouble => "MA",
            Self::Open => "O",
            Self::AutoOpen => "AO",
            Self::Close => "C",
            Self::AutoClose => "AC",
            Self::Restoral => "R",
            Self::Status => "S",
            Self::Event => "E",
            Self::Unknown => "U",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::AutoOpen)
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close | Self::AutoClose)
    }

    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::AutoOpen | Self::AutoClose)
    }

    pub fn is_trouble(&self) -> bool {
        matches!(self, Self::Trouble | Self::MiscTrouble)
    }

    /// Whether events of this type take part in active-event bookkeeping.
    ///
    /// Openings and closings are tracked by the arm status instead, and
    /// unknown or purely informational reports have nothing to clear.
    pub fn is_tracked(&self) -> bool {
        !(self.is_open()
            || self.is_close()
            || matches!(self, Self::Unknown | Self::Event))
    }

    /// The automatic counterpart of an Open/Close type.
    pub fn automatic(&self) -> Option<Self> {
        match self {
            Self::Open => Some(Self::AutoOpen),
            Self::Close => Some(Self::AutoClose),
            _ => None,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decoded (or synthesized) report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    /// Three-digit Contact ID event code (empty for undecodable messages).
    pub event_code: String,
    /// Three-digit zone or user number (empty for undecodable messages).
    pub zone_or_user: String,
    pub description: String,
    /// The raw hex digit string as received.
    pub raw: String,
}

impl Event {
    pub fn new(
        timestamp: i64,
        report_type: ReportType,
        event_code: impl Into<String>,
        zone_or_user: impl Into<String>,
        description: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            report_type,
            event_code: event_code.into(),
            zone_or_user: zone_or_user.into(),
            description: description.into(),
            raw: raw.into(),
        }
    }

    /// Active-event identity: event code followed by zone/user.
    pub fn key(&self) -> String {
        format!("{}{}", self.event_code, self.zone_or_user)
    }

    /// Copy of this event re-labelled as caused by an automatic request.
    ///
    /// Returns `None` for anything other than Open/Close.
    pub fn as_automatic(&self) -> Option<Self> {
        let report_type = self.report_type.automatic()?;
        Some(Self {
            report_type,
            description: format!("Automatic {}", self.description),
            ..self.clone()
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.report_type, self.description)
    }
}

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Hands out strictly increasing timestamps for events created in one batch.
///
/// Two reports decoded from the same call must never share a timestamp, or
/// the arm-status monotonicity check would drop the second one.
#[derive(Debug, Default)]
pub struct BatchClock {
    last: Option<i64>,
}

impl BatchClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> i64 {
        self.next_from(now_micros())
    }

    fn next_from(&mut self, now: i64) -> i64 {
        let ts = match self.last {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last = Some(ts);
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_type_serde_codes() {
        assert_eq!(serde_json::to_string(&ReportType::MiscTrouble).unwrap(), "\"MA\"");
        assert_eq!(serde_json::to_string(&ReportType::AutoClose).unwrap(), "\"AC\"");
        let parsed: ReportType = serde_json::from_str("\"R\"").unwrap();
        assert_eq!(parsed, ReportType::Restoral);
    }

    #[test]
    fn test_tracked_types() {
        assert!(ReportType::Alarm.is_tracked());
        assert!(ReportType::Trouble.is_tracked());
        assert!(ReportType::MiscTrouble.is_tracked());
        assert!(ReportType::Restoral.is_tracked());
        assert!(!ReportType::Open.is_tracked());
        assert!(!ReportType::AutoClose.is_tracked());
        assert!(!ReportType::Unknown.is_tracked());
        assert!(!ReportType::Event.is_tracked());
    }

    #[test]
    fn test_as_automatic() {
        let ev = Event::new(1, ReportType::Close, "401", "040", "System Armed User 040", "");
        let auto = ev.as_automatic().unwrap();
        assert_eq!(auto.report_type, ReportType::AutoClose);
        assert_eq!(auto.description, "Automatic System Armed User 040");
        assert_eq!(auto.key(), "401040");

        let alarm = Event::new(1, ReportType::Alarm, "130", "001", "Zone Alarm", "");
        assert!(alarm.as_automatic().is_none());
    }

    #[test]
    fn test_event_json_field_names() {
        let ev = Event::new(7, ReportType::Trouble, "383", "070", "Keypad 1 Tamper", "abc");
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["type"], "T");
        assert_eq!(value["event_code"], "383");
        assert_eq!(value["zone_or_user"], "070");
        assert_eq!(value["timestamp"], 7);
    }

    #[test]
    fn test_batch_clock_strictly_increasing() {
        let mut clock = BatchClock::new();
        assert_eq!(clock.next_from(100), 100);
        assert_eq!(clock.next_from(100), 101);
        assert_eq!(clock.next_from(50), 102);
        assert_eq!(clock.next_from(500), 500);
    }
}
