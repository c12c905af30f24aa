// MIT License - Copyright (c) 2026 Peter Wright
// Persistent alarm status store

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::constants::{KEYSWITCH_ARM_QUALIFIER, KEYSWITCH_DISARM_QUALIFIER, KEYSWITCH_EVENT_CODE};
use crate::error::{AlarmError, Result};
use crate::event::{Event, ReportType};

/// Arm state of the protected premises as far as the receiver knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmStatus {
    #[default]
    Disarmed,
    /// Keyswitch toggled to arm; waiting for the panel's Close report.
    Arming,
    Armed,
    /// Keyswitch toggled to disarm; waiting for the panel's Open report.
    Disarming,
}

impl ArmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::Arming => "arming",
            Self::Armed => "armed",
            Self::Disarming => "disarming",
        }
    }

    /// Whether a keyswitch request is waiting for confirmation.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Arming | Self::Disarming)
    }
}

impl fmt::Display for ArmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate condition derived from the active events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    #[default]
    Ok,
    Alarm,
    Trouble,
}

/// The `status` control command's view of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub arm_status: ArmStatus,
    pub arm_status_time: i64,
    pub auto_arm: bool,
    pub system_status: SystemStatus,
}

/// On-disk form of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StatusRecord {
    arm_status: ArmStatus,
    arm_status_time: i64,
    auto_arm: bool,
    system_status: SystemStatus,
    history: Vec<Event>,
    active_events: BTreeMap<String, Event>,
}

/// Arm state, outstanding conditions and event history, persisted after
/// every change.
#[derive(Debug)]
pub struct AlarmStatus {
    path: PathBuf,
    notify_auto_events: bool,
    record: StatusRecord,
}

impl AlarmStatus {
    /// Load the store from `path`, starting fresh if the file is missing or
    /// unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Loading alarm status from {}", path.display());
        let record = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Alarm status file {} is malformed ({e}), starting fresh", path.display());
                    StatusRecord::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No alarm status file at {}, starting fresh", path.display());
                StatusRecord::default()
            }
            Err(e) => {
                warn!("Unable to read alarm status from {}: {e}, starting fresh", path.display());
                StatusRecord::default()
            }
        };
        Self {
            path,
            notify_auto_events: false,
            record,
        }
    }

    /// Whether Open/Close reports caused by automatic requests are returned
    /// for notification.
    pub fn with_notify_auto_events(mut self, notify: bool) -> Self {
        self.notify_auto_events = notify;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn arm_status(&self) -> ArmStatus {
        self.record.arm_status
    }

    pub fn arm_status_time(&self) -> i64 {
        self.record.arm_status_time
    }

    pub fn auto_arm(&self) -> bool {
        self.record.auto_arm
    }

    pub fn system_status(&self) -> SystemStatus {
        self.record.system_status
    }

    pub fn history(&self) -> &[Event] {
        &self.record.history
    }

    pub fn active_events(&self) -> &BTreeMap<String, Event> {
        &self.record.active_events
    }

    pub fn set_arm_status(&mut self, arm_status: ArmStatus) {
        self.record.arm_status = arm_status;
    }

    pub fn set_auto_arm(&mut self, auto_arm: bool) {
        self.record.auto_arm = auto_arm;
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            arm_status: self.record.arm_status,
            arm_status_time: self.record.arm_status_time,
            auto_arm: self.record.auto_arm,
            system_status: self.record.system_status,
        }
    }

    /// Window of the history, newest first.
    pub fn history_slice(&self, offset: i64, limit: i64) -> Result<Vec<Event>> {
        if offset < 0 || limit < 1 {
            return Err(AlarmError::InvalidRange { offset, limit });
        }
        let (offset, limit) = (
            usize::try_from(offset).unwrap_or(usize::MAX),
            usize::try_from(limit).unwrap_or(usize::MAX),
        );
        Ok(self
            .record
            .history
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Apply one call's worth of events (or a synthetic event) in order.
    ///
    /// Returns the events that should be passed on to notifiers.
    pub fn add_new_events(&mut self, events: Vec<Event>) -> Vec<Event> {
        if events.is_empty() {
            info!("Home Alarm Calling: Empty Code List!");
        } else {
            info!("Home Alarm Calling");
        }

        let mut notify_events = Vec::with_capacity(events.len());
        for raw in events {
            let event = match self.automatic_counterpart(&raw) {
                Some(auto) => auto,
                None => raw,
            };
            let notify = self.notify_auto_events || !event.report_type.is_automatic();
            log_event(&event, notify);

            self.record.history.push(event.clone());
            if self.update_arm_status(&event) {
                self.clear_keyswitch_failures();
            }
            self.update_active_events(&event);

            if notify {
                notify_events.push(event);
            }
        }

        self.update_system_status();
        self.save();
        notify_events
    }

    /// The automatic rewrite of `event`, if it confirms an automatic request.
    fn automatic_counterpart(&self, event: &Event) -> Option<Event> {
        if self.record.auto_arm && self.record.arm_status.is_pending() {
            event.as_automatic()
        } else {
            None
        }
    }

    /// Returns true when the event changed the arm status.
    fn update_arm_status(&mut self, event: &Event) -> bool {
        let rt = event.report_type;
        if !(rt.is_open() || rt.is_close()) {
            return false;
        }
        if event.timestamp <= self.record.arm_status_time {
            debug!(
                "Ignoring stale {} (timestamp {} <= {})",
                rt, event.timestamp, self.record.arm_status_time
            );
            return false;
        }
        self.record.arm_status_time = event.timestamp;
        if rt.is_open() {
            self.record.arm_status = ArmStatus::Disarmed;
            self.record.auto_arm = false;
        } else {
            self.record.arm_status = ArmStatus::Armed;
        }
        true
    }

    fn update_active_events(&mut self, event: &Event) {
        if !event.report_type.is_tracked() {
            return;
        }
        let key = event.key();
        match event.report_type {
            ReportType::Restoral => {
                self.record.active_events.remove(&key);
            }
            // A status report confirms a condition; it must not downgrade it
            ReportType::Status => {
                let entry = self.record.active_events.entry(key).or_insert_with(|| event.clone());
                let report_type = entry.report_type;
                *entry = Event {
                    report_type,
                    ..event.clone()
                };
            }
            _ => {
                self.record.active_events.insert(key, event.clone());
            }
        }
    }

    fn clear_keyswitch_failures(&mut self) {
        for qualifier in [KEYSWITCH_ARM_QUALIFIER, KEYSWITCH_DISARM_QUALIFIER] {
            let key = format!("{KEYSWITCH_EVENT_CODE}{qualifier}");
            if self.record.active_events.remove(&key).is_some() {
                debug!("Cleared keyswitch failure {key}");
            }
        }
    }

    fn update_system_status(&mut self) {
        let active = self.record.active_events.values();
        self.record.system_status = active.fold(SystemStatus::Ok, |status, event| {
            match (status, event.report_type) {
                (SystemStatus::Alarm, _) | (_, ReportType::Alarm) => SystemStatus::Alarm,
                (_, rt) if rt.is_trouble() => SystemStatus::Trouble,
                (status, _) => status,
            }
        });
    }

    /// Write the whole store to disk atomically.
    pub fn persist(&self) -> Result<()> {
        let tmp = self.tmp_path();
        let json = serde_json::to_string_pretty(&self.record)?;
        let result = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            if tmp.exists() {
                let _ = std::fs::remove_file(&tmp);
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Persist, logging rather than returning failures.
    pub fn save(&self) {
        debug!("Saving alarm status to {}", self.path.display());
        if let Err(e) = self.persist() {
            error!("Unable to save alarm data: {e}");
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

fn log_event(event: &Event, notify: bool) {
    if notify {
        info!("{}: {}", event.report_type, event.description);
    } else {
        info!(
            "{}: {} - Automatic event, skipping notification",
            event.report_type, event.description
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, AlarmStatus) {
        let dir = tempfile::tempdir().unwrap();
        let status = AlarmStatus::load(dir.path().join("alarm_status.json"));
        (dir, status)
    }

    fn ev(ts: i64, rt: ReportType, code: &str, zone: &str, desc: &str) -> Event {
        Event::new(ts, rt, code, zone, desc, "")
    }

    fn close(ts: i64) -> Event {
        ev(ts, ReportType::Close, "401", "040", "System Armed User 040")
    }

    fn open(ts: i64) -> Event {
        ev(ts, ReportType::Open, "401", "040", "System Disarmed User 040")
    }

    #[test]
    fn test_fresh_store() {
        let (_dir, status) = store();
        assert_eq!(
            status.status_snapshot(),
            StatusSnapshot {
                arm_status: ArmStatus::Disarmed,
                arm_status_time: 0,
                auto_arm: false,
                system_status: SystemStatus::Ok,
            }
        );
        assert!(status.history().is_empty());
        assert!(status.active_events().is_empty());
    }

    #[test]
    fn test_restoral_removes_exactly_its_key() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![
            ev(1, ReportType::Alarm, "130", "003", "Zone Alarm Zone 003 (003)"),
            ev(2, ReportType::Alarm, "130", "004", "Zone Alarm Zone 004 (004)"),
        ]);
        assert_eq!(status.system_status(), SystemStatus::Alarm);

        status.add_new_events(vec![ev(3, ReportType::Restoral, "130", "003", "Zone Alarm Restoral")]);
        assert_eq!(status.active_events().len(), 1);
        assert!(status.active_events().contains_key("130004"));

        // Restoring again is a no-op
        status.add_new_events(vec![ev(4, ReportType::Restoral, "130", "003", "Zone Alarm Restoral")]);
        assert_eq!(status.active_events().len(), 1);
        assert_eq!(status.history().len(), 4);
    }

    #[test]
    fn test_same_key_collapses() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![
            ev(1, ReportType::MiscTrouble, "302", "000", "Battery Trouble"),
            ev(2, ReportType::Status, "302", "000", "Battery Trouble Status"),
        ]);
        assert_eq!(status.active_events().len(), 1);
        let active = &status.active_events()["302000"];
        assert_eq!(active.report_type, ReportType::MiscTrouble);
        assert_eq!(active.description, "Battery Trouble Status");
        assert_eq!(active.timestamp, 2);
        assert_eq!(status.system_status(), SystemStatus::Trouble);
    }

    #[test]
    fn test_status_report_keeps_alarm_outstanding() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![ev(1, ReportType::Alarm, "130", "003", "Zone Alarm Zone 003 (003)")]);
        assert_eq!(status.system_status(), SystemStatus::Alarm);

        status.add_new_events(vec![ev(
            2,
            ReportType::Status,
            "130",
            "003",
            "Zone Alarm Status Zone 003 (003)",
        )]);
        assert_eq!(status.system_status(), SystemStatus::Alarm);
        assert_eq!(status.active_events()["130003"].report_type, ReportType::Alarm);

        status.add_new_events(vec![ev(3, ReportType::Restoral, "130", "003", "Zone Alarm Restoral")]);
        assert_eq!(status.system_status(), SystemStatus::Ok);
    }

    #[test]
    fn test_status_report_without_condition() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![ev(1, ReportType::Status, "302", "000", "Battery Trouble Status")]);
        assert_eq!(status.active_events()["302000"].report_type, ReportType::Status);
        assert_eq!(status.system_status(), SystemStatus::Ok);
    }

    #[test]
    fn test_untracked_types() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![
            close(1),
            ev(2, ReportType::Unknown, "", "", "Invalid Length: 12 (len 2)"),
            ev(3, ReportType::Event, "602", "000", "Periodic Test"),
        ]);
        assert!(status.active_events().is_empty());
        assert_eq!(status.system_status(), SystemStatus::Ok);
    }

    #[test]
    fn test_alarm_beats_trouble() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![ev(1, ReportType::Trouble, "383", "070", "Keypad 1 Tamper")]);
        assert_eq!(status.system_status(), SystemStatus::Trouble);
        status.add_new_events(vec![ev(2, ReportType::Alarm, "130", "001", "Zone Alarm")]);
        assert_eq!(status.system_status(), SystemStatus::Alarm);
        status.add_new_events(vec![ev(3, ReportType::Restoral, "130", "001", "Zone Alarm Restoral")]);
        assert_eq!(status.system_status(), SystemStatus::Trouble);
        status.add_new_events(vec![ev(4, ReportType::Restoral, "383", "070", "Keypad 1 Tamper Restoral")]);
        assert_eq!(status.system_status(), SystemStatus::Ok);
    }

    #[test]
    fn test_monotonic_arm_status() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![close(20), open(10)]);
        assert_eq!(status.arm_status(), ArmStatus::Armed);
        assert_eq!(status.arm_status_time(), 20);

        // Equal timestamps are stale too
        status.add_new_events(vec![open(20)]);
        assert_eq!(status.arm_status(), ArmStatus::Armed);

        status.add_new_events(vec![open(21)]);
        assert_eq!(status.arm_status(), ArmStatus::Disarmed);
        // Stale events still land in history
        assert_eq!(status.history().len(), 4);
    }

    #[test]
    fn test_close_while_arming() {
        let (_dir, mut status) = store();
        status.set_arm_status(ArmStatus::Arming);
        let notify = status.add_new_events(vec![close(5)]);
        assert_eq!(status.arm_status(), ArmStatus::Armed);
        assert_eq!(notify.len(), 1);
        assert_eq!(notify[0].report_type, ReportType::Close);
    }

    #[test]
    fn test_automatic_events_marked_and_suppressed() {
        let (_dir, mut status) = store();
        status.set_arm_status(ArmStatus::Arming);
        status.set_auto_arm(true);

        let notify = status.add_new_events(vec![close(5)]);
        assert!(notify.is_empty());
        let last = status.history().last().unwrap();
        assert_eq!(last.report_type, ReportType::AutoClose);
        assert_eq!(last.description, "Automatic System Armed User 040");
        assert_eq!(status.arm_status(), ArmStatus::Armed);
        assert!(status.auto_arm());

        // Not pending any more, so a later open is a manual one
        let notify = status.add_new_events(vec![open(6)]);
        assert_eq!(notify.len(), 1);
        assert_eq!(notify[0].report_type, ReportType::Open);
        assert!(!status.auto_arm());
    }

    #[test]
    fn test_automatic_events_notified_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut status =
            AlarmStatus::load(dir.path().join("s.json")).with_notify_auto_events(true);
        status.set_arm_status(ArmStatus::Disarming);
        status.set_auto_arm(true);

        let notify = status.add_new_events(vec![open(5)]);
        assert_eq!(notify.len(), 1);
        assert_eq!(notify[0].report_type, ReportType::AutoOpen);
        assert_eq!(status.arm_status(), ArmStatus::Disarmed);
    }

    #[test]
    fn test_confirmation_clears_keyswitch_failure() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![ev(
            1,
            ReportType::Trouble,
            KEYSWITCH_EVENT_CODE,
            KEYSWITCH_ARM_QUALIFIER,
            "Unable to Arm System",
        )]);
        assert_eq!(status.system_status(), SystemStatus::Trouble);

        status.add_new_events(vec![close(2)]);
        assert!(status.active_events().is_empty());
        assert_eq!(status.system_status(), SystemStatus::Ok);
    }

    #[test]
    fn test_history_slice_newest_first() {
        let (_dir, mut status) = store();
        let events: Vec<Event> = (1..=5)
            .map(|i| ev(i, ReportType::Event, "602", "000", &format!("Periodic Test {i}")))
            .collect();
        status.add_new_events(events);

        let slice = status.history_slice(0, 2).unwrap();
        let ts: Vec<i64> = slice.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![5, 4]);

        let slice = status.history_slice(3, 10).unwrap();
        let ts: Vec<i64> = slice.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![2, 1]);

        assert!(status.history_slice(10, 5).unwrap().is_empty());
    }

    #[test]
    fn test_history_slice_invalid_range() {
        let (_dir, mut status) = store();
        status.add_new_events(vec![close(1)]);
        let before = status.status_snapshot();

        assert!(matches!(
            status.history_slice(-1, 5),
            Err(AlarmError::InvalidRange { offset: -1, limit: 5 })
        ));
        assert!(matches!(
            status.history_slice(0, 0),
            Err(AlarmError::InvalidRange { .. })
        ));
        assert_eq!(status.status_snapshot(), before);
        assert_eq!(status.history().len(), 1);
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarm_status.json");
        {
            let mut status = AlarmStatus::load(&path);
            status.add_new_events(vec![
                close(7),
                ev(8, ReportType::Alarm, "130", "002", "Zone Alarm Zone 002 (002)"),
            ]);
        }
        assert!(!dir.path().join("alarm_status.json.tmp").exists());

        let status = AlarmStatus::load(&path);
        assert_eq!(status.arm_status(), ArmStatus::Armed);
        assert_eq!(status.arm_status_time(), 7);
        assert_eq!(status.system_status(), SystemStatus::Alarm);
        assert_eq!(status.history().len(), 2);

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["arm_status"], "armed");
        assert_eq!(on_disk["active_events"]["130002"]["type"], "A");
    }

    #[test]
    fn test_empty_batch_still_persists() {
        let (dir, mut status) = store();
        let notify = status.add_new_events(Vec::new());
        assert!(notify.is_empty());
        assert!(dir.path().join("alarm_status.json").exists());
    }

    #[test]
    fn test_malformed_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarm_status.json");
        std::fs::write(&path, "{ not json").unwrap();
        let status = AlarmStatus::load(&path);
        assert_eq!(status.arm_status(), ArmStatus::Disarmed);
        assert!(status.history().is_empty());
    }

    #[test]
    fn test_failed_persist_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        // Target is a directory, so the rename fails
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("child"), "x").unwrap();

        let status = AlarmStatus::load(&path);
        assert!(status.persist().is_err());
        assert!(!dir.path().join("occupied.tmp").exists());
    }
}
