// MIT License - Copyright (c) 2026 Peter Wright
// DSC Contact ID event table

use crate::event::ReportType;

/// How a table entry matches the zone/user field of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier<'a> {
    /// Only this exact three-digit zone/user number.
    Exact(&'a str),
    /// Any zone (`ZZZ` in DSC documentation).
    AnyZone,
    /// Any user code (`UUU` in DSC documentation).
    AnyUser,
}

/// One row of the event table.
///
/// `reports` maps the message's event qualifier digit ('1' new, '3' restore,
/// '6' status) to a classification and description. Every entry has a '1'
/// report; other qualifiers are derived from it when not listed.
#[derive(Debug, Clone, Copy)]
pub struct EventEntry {
    pub event_code: &'static str,
    pub qualifier: Qualifier<'static>,
    pub reports: &'static [(char, ReportType, &'static str)],
}

impl EventEntry {
    /// The report listed for `flag`, if the entry has one.
    pub fn report(&self, flag: char) -> Option<(ReportType, &'static str)> {
        self.reports
            .iter()
            .find(|(f, _, _)| *f == flag)
            .map(|(_, t, d)| (*t, *d))
    }

    /// Description of the new-event ('1') report.
    pub fn base_description(&self) -> &'static str {
        self.report('1').map(|(_, d)| d).unwrap_or("")
    }
}

use Qualifier::{AnyUser, AnyZone, Exact};
use ReportType::{Alarm, Close, Event, MiscTrouble, Open, Restoral, Trouble};

macro_rules! entry {
    ($code:literal, $qual:expr, [$(($flag:literal, $ty:expr, $desc:literal)),+ $(,)?]) => {
        EventEntry {
            event_code: $code,
            qualifier: $qual,
            reports: &[$(($flag, $ty, $desc)),+],
        }
    };
}

/// Event codes reported by DSC PowerSeries panels (PC1616/PC1832/PC1864/PC9155).
pub static EVENT_TABLE: &[EventEntry] = &[
    entry!("100", Exact("000"), [('1', Alarm, "Aux Key Alarm")]),
    entry!("100", AnyZone, [('1', Alarm, "24 Hr Medical")]),
    entry!("101", AnyZone, [('1', Alarm, "24 Hr Emergency (non-medical)")]),
    entry!("102", Exact("000"), [('1', Alarm, "Fail to Report In")]),
    entry!("110", Exact("000"), [('1', Alarm, "[F] Key Alarm")]),
    entry!("110", AnyZone, [('1', Alarm, "24 Hr Fire")]),
    entry!("120", Exact("000"), [('1', Alarm, "Panic Key Alarm")]),
    entry!("120", AnyZone, [('1', Alarm, "24 Hr Panic")]),
    entry!("121", Exact("000"), [('1', Alarm, "Duress Alarm")]),
    entry!("130", AnyZone, [('1', Alarm, "Zone Alarm")]),
    entry!("139", Exact("000"), [('1', Alarm, "Cross Zone Alarm")]),
    entry!("140", AnyZone, [('1', Alarm, "24 Hr Supervisory Buzzer")]),
    entry!("145", Exact("000"), [('1', Trouble, "General System Tamper (Case/Cover Tamper Alarm)")]),
    entry!("150", AnyZone, [('1', Alarm, "24 Hr Supervisory")]),
    entry!("151", AnyZone, [('1', Alarm, "24 Hr Gas")]),
    entry!("154", AnyZone, [('1', Alarm, "24 Hr Water")]),
    entry!("159", AnyZone, [('1', Alarm, "24 Hr Freeze")]),
    entry!("162", AnyZone, [('1', Alarm, "24 Hr CO Alarm")]),
    entry!("300", Exact("000"), [('1', MiscTrouble, "General System Trouble")]),
    entry!("300", Exact("001"), [('1', MiscTrouble, "General Alternate Communicator Trouble")]),
    entry!("301", Exact("000"), [('1', MiscTrouble, "AC Line Trouble")]),
    entry!("302", Exact("000"), [('1', MiscTrouble, "Battery Trouble")]),
    entry!("312", Exact("000"), [('1', MiscTrouble, "Auxiliary Power Trouble")]),
    entry!("330", Exact("000"), [('1', MiscTrouble, "Alternate Communicator Fault")]),
    entry!("350", Exact("001"), [('1', MiscTrouble, "Alternate Communicator Receiver 1 Trouble")]),
    entry!("350", Exact("002"), [('1', MiscTrouble, "Alternate Communicator Receiver 2 Trouble")]),
    entry!("350", Exact("003"), [('1', MiscTrouble, "Alternate Communicator Receiver 3 Trouble")]),
    entry!("350", Exact("004"), [('1', MiscTrouble, "Alternate Communicator Receiver 4 Trouble")]),
    entry!("351", Exact("000"), [('1', MiscTrouble, "Phone Line Failure")]),
    entry!("354", Exact("000"), [('1', MiscTrouble, "Phone #1-4 FTC")]),
    entry!("373", Exact("000"), [('1', MiscTrouble, "Fire Trouble")]),
    entry!("374", AnyZone, [('1', Close, "Exit Fault")]),
    entry!("378", Exact("000"), [('1', Alarm, "Burglary Not Verified")]),
    entry!("380", Exact("070"), [('1', MiscTrouble, "Keypad 1 Fault")]),
    entry!("380", Exact("071"), [('1', MiscTrouble, "Keypad 2 Fault")]),
    entry!("380", Exact("072"), [('1', MiscTrouble, "Keypad 3 Fault")]),
    entry!("380", Exact("073"), [('1', MiscTrouble, "Keypad 4 Fault")]),
    entry!("380", Exact("080"), [('1', MiscTrouble, "Siren 1 Fault")]),
    entry!("380", Exact("081"), [('1', MiscTrouble, "Siren 2 Fault")]),
    entry!("380", Exact("082"), [('1', MiscTrouble, "Siren 3 Fault")]),
    entry!("380", Exact("083"), [('1', MiscTrouble, "Siren 4 Fault")]),
    entry!("380", AnyZone, [('1', MiscTrouble, "Zone Fault")]),
    entry!("383", Exact("070"), [('1', Trouble, "Keypad 1 Tamper")]),
    entry!("383", Exact("071"), [('1', Trouble, "Keypad 2 Tamper")]),
    entry!("383", Exact("072"), [('1', Trouble, "Keypad 3 Tamper")]),
    entry!("383", Exact("073"), [('1', Trouble, "Keypad 4 Tamper")]),
    entry!("383", Exact("080"), [('1', Trouble, "Siren 1 Tamper")]),
    entry!("383", Exact("081"), [('1', Trouble, "Siren 2 Tamper")]),
    entry!("383", Exact("082"), [('1', Trouble, "Siren 3 Tamper")]),
    entry!("383", Exact("083"), [('1', Trouble, "Siren 4 Tamper")]),
    entry!("383", AnyZone, [('1', Trouble, "Zone Tamper")]),
    entry!("384", Exact("000"), [('1', MiscTrouble, "Wireless Device Low Battery Trouble")]),
    entry!("384", AnyZone, [('1', MiscTrouble, "Wireless Zone Low Battery Trouble")]),
    entry!("400", Exact("000"), [('1', Open, "Special Disarming"), ('3', Close, "Special Arming")]),
    entry!("401", AnyUser, [('1', Open, "System Disarmed"), ('3', Close, "System Armed")]),
    entry!("406", AnyUser, [('1', Alarm, "Alarm Cleared")]),
    entry!("411", Exact("000"), [('1', MiscTrouble, "DLS Lead In")]),
    entry!("412", Exact("000"), [('1', MiscTrouble, "DLS Lead Out")]),
    entry!("453", Exact("000"), [('1', Open, "Late to Open")]),
    entry!("456", Exact("000"), [('1', Close, "Partial Arming")]),
    entry!("458", Exact("000"), [('1', Event, "Disarm After Alarm")]),
    entry!("459", AnyUser, [('1', Alarm, "Alarm Within 2 min of Arming")]),
    entry!("461", Exact("000"), [('1', Trouble, "Keypad Lockout")]),
    entry!("570", AnyZone, [('1', Close, "Zone Bypass")]),
    entry!("601", Exact("000"), [('1', Event, "System Test")]),
    entry!("602", Exact("000"), [('1', Event, "Periodic Test")]),
    entry!("607", AnyUser, [('1', Event, "Walk Test Begin"), ('3', Restoral, "Walk Test End")]),
    entry!("627", Exact("000"), [('1', MiscTrouble, "Installer Lead In")]),
    entry!("628", Exact("000"), [('1', MiscTrouble, "Installer Lead Out")]),
    entry!("654", Exact("000"), [('1', MiscTrouble, "Delinquency")]),
];

/// Find the entry for `event_code` with exactly `qualifier`.
pub fn lookup(event_code: &str, qualifier: Qualifier<'_>) -> Option<&'static EventEntry> {
    EVENT_TABLE
        .iter()
        .find(|e| e.event_code == event_code && e.qualifier == qualifier)
}

/// Which kind of table entry satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    Exact,
    Zone,
    User,
}

/// Resolve a message's event code and zone/user field.
///
/// Exact entries win; otherwise the any-zone entry, then the any-user entry.
pub fn resolve(event_code: &str, zone_or_user: &str) -> Option<(&'static EventEntry, Match)> {
    if let Some(entry) = lookup(event_code, Exact(zone_or_user)) {
        return Some((entry, Match::Exact));
    }
    if let Some(entry) = lookup(event_code, AnyZone) {
        return Some((entry, Match::Zone));
    }
    lookup(event_code, AnyUser).map(|entry| (entry, Match::User))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_has_new_event_report() {
        for entry in EVENT_TABLE {
            assert!(
                entry.report('1').is_some(),
                "entry {} {:?} lacks a '1' report",
                entry.event_code,
                entry.qualifier
            );
        }
    }

    #[test]
    fn test_no_duplicate_entries() {
        for (i, a) in EVENT_TABLE.iter().enumerate() {
            for b in &EVENT_TABLE[i + 1..] {
                assert!(
                    !(a.event_code == b.event_code && a.qualifier == b.qualifier),
                    "duplicate entry {} {:?}",
                    a.event_code,
                    a.qualifier
                );
            }
        }
    }

    #[test]
    fn test_exact_beats_zone_wildcard() {
        let (entry, m) = resolve("380", "071").unwrap();
        assert_eq!(m, Match::Exact);
        assert_eq!(entry.base_description(), "Keypad 2 Fault");

        let (entry, m) = resolve("380", "005").unwrap();
        assert_eq!(m, Match::Zone);
        assert_eq!(entry.base_description(), "Zone Fault");
    }

    #[test]
    fn test_user_wildcard() {
        let (entry, m) = resolve("401", "040").unwrap();
        assert_eq!(m, Match::User);
        assert_eq!(entry.report('3'), Some((ReportType::Close, "System Armed")));
        assert_eq!(entry.report('1'), Some((ReportType::Open, "System Disarmed")));
    }

    #[test]
    fn test_unknown_code() {
        assert!(resolve("999", "000").is_none());
        // 102 only exists for zone 000
        assert!(resolve("102", "001").is_none());
    }
}
