// MIT License - Copyright (c) 2026 Peter Wright
// Contact ID message → event decoding

use std::collections::HashMap;

use tracing::debug;

use crate::constants::{EVENT_CODE_RANGE, MIN_DECODE_LEN, QUALIFIER_OFFSET, ZONE_RANGE};
use crate::contact_id::collector::RawMessage;
use crate::contact_id::table::{self, EventEntry, Match};
use crate::event::{BatchClock, Event, ReportType};

/// Turns collected Contact ID messages into events.
///
/// Decoding is best-effort: short messages become `Unknown` events and
/// checksum failures are flagged in the description, but nothing is dropped.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    zone_names: HashMap<u32, String>,
}

impl Decoder {
    pub fn new(zone_names: HashMap<u32, String>) -> Self {
        Self { zone_names }
    }

    /// Decode every message of one call, preserving call order.
    pub fn decode(&self, messages: &[RawMessage]) -> Vec<Event> {
        let mut clock = BatchClock::new();
        messages
            .iter()
            .map(|msg| self.decode_message(msg, clock.next()))
            .collect()
    }

    /// Decode a single message stamped with `timestamp`.
    pub fn decode_message(&self, msg: &RawMessage, timestamp: i64) -> Event {
        let code = msg.code.as_str();
        if code.len() < MIN_DECODE_LEN {
            return Event::new(
                timestamp,
                ReportType::Unknown,
                "",
                "",
                format!("Invalid Length: {} (len {})", code, code.len()),
                code,
            );
        }

        let flag = code.chars().nth(QUALIFIER_OFFSET).unwrap_or('?');
        let event_code = code.get(EVENT_CODE_RANGE).unwrap_or_default();
        let zone_or_user = code.get(ZONE_RANGE).unwrap_or_default();

        let (report_type, mut description) = match table::resolve(event_code, zone_or_user) {
            Some((entry, matched)) => {
                let (report_type, mut description) = describe(entry, flag);
                match matched {
                    Match::Exact => {}
                    Match::Zone => {
                        description.push_str(&format!(
                            " {} ({})",
                            self.zone_name(zone_or_user),
                            zone_or_user
                        ));
                    }
                    Match::User => description.push_str(&format!(" User {zone_or_user}")),
                }
                (report_type, description)
            }
            None => (ReportType::Unknown, format!("Unknown Event - {code}")),
        };

        if !msg.valid {
            description.push_str(&format!(" -- Checksum Mismatch! {code}"));
        }

        debug!("Decoded {code}: {report_type} {description}");
        Event::new(timestamp, report_type, event_code, zone_or_user, description, code)
    }

    /// Configured name for a zone, or `Zone <code>` when none is configured.
    fn zone_name(&self, zone_code: &str) -> String {
        zone_code
            .parse::<u32>()
            .ok()
            .and_then(|id| self.zone_names.get(&id))
            .cloned()
            .unwrap_or_else(|| format!("Zone {zone_code}"))
    }
}

/// Classification and description for the qualifier digit `flag`.
///
/// Entries only list the qualifiers with their own wording; the rest are
/// derived from the new-event description.
fn describe(entry: &EventEntry, flag: char) -> (ReportType, String) {
    if let Some((report_type, description)) = entry.report(flag) {
        return (report_type, description.to_string());
    }

    let base = entry.base_description();
    match flag {
        '1' => (ReportType::Event, base.to_string()),
        '3' => (ReportType::Restoral, format!("{base} Restoral")),
        '6' => (ReportType::Status, format!("{base} Status")),
        other => (
            ReportType::Unknown,
            format!("{base} Unknown Event Type ({other})"),
        ),
    }
}
