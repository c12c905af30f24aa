// MIT License - Copyright (c) 2026 Peter Wright
// Arm/disarm requests and confirmation timeout

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::{KEYSWITCH_ARM_QUALIFIER, KEYSWITCH_DISARM_QUALIFIER, KEYSWITCH_EVENT_CODE};
use crate::error::{AlarmError, Result};
use crate::event::{now_micros, Event, ReportType};
use crate::hardware::Keyswitch;
use crate::status::{AlarmStatus, ArmStatus};

/// Issues keyswitch toggles on behalf of control requests.
///
/// The panel only confirms a toggle by calling in with an Open/Close report,
/// so each request leaves the store in `arming`/`disarming` until that report
/// arrives or [`ArmController::abort_pending`] gives up on it.
#[derive(Debug)]
pub struct ArmController<K> {
    keyswitch: Option<K>,
}

impl<K: Keyswitch> ArmController<K> {
    pub fn new(keyswitch: Option<K>) -> Self {
        Self { keyswitch }
    }

    pub fn is_configured(&self) -> bool {
        self.keyswitch.is_some()
    }

    pub async fn request_arm(&mut self, status: &mut AlarmStatus, auto: bool) -> Result<String> {
        let keyswitch = self.keyswitch.as_mut().ok_or(AlarmError::KeyswitchUnavailable)?;

        let current = status.arm_status();
        if matches!(current, ArmStatus::Armed | ArmStatus::Arming) {
            let msg = format!("System already {current}, ignoring request");
            info!("{msg}");
            return Ok(msg);
        }

        let msg = if auto {
            "Arming system in auto mode...".to_string()
        } else {
            "Arming system...".to_string()
        };
        info!("{msg}");

        keyswitch.toggle().await?;
        status.set_arm_status(ArmStatus::Arming);
        status.set_auto_arm(auto);
        status.save();
        Ok(msg)
    }

    pub async fn request_disarm(&mut self, status: &mut AlarmStatus, auto: bool) -> Result<String> {
        let keyswitch = self.keyswitch.as_mut().ok_or(AlarmError::KeyswitchUnavailable)?;

        let current = status.arm_status();
        if matches!(current, ArmStatus::Disarmed | ArmStatus::Disarming) {
            let msg = format!("System already {current}, ignoring request");
            info!("{msg}");
            return Ok(msg);
        }

        if auto && !status.auto_arm() {
            let msg = "System manually armed, skipping auto disarm".to_string();
            info!("{msg}");
            return Ok(msg);
        }

        let msg = "Disarming system...".to_string();
        info!("{msg}");

        keyswitch.toggle().await?;
        status.set_auto_arm(false);
        // An arm that was never confirmed produces no Open report when undone
        if current == ArmStatus::Arming {
            status.set_arm_status(ArmStatus::Disarmed);
        } else {
            status.set_arm_status(ArmStatus::Disarming);
        }
        status.save();
        Ok(msg)
    }

    /// Give up on an unconfirmed request, reverting the arm status and
    /// recording a trouble event. Returns the events to notify.
    pub fn abort_pending(&self, status: &mut AlarmStatus) -> Vec<Event> {
        let (description, qualifier) = match status.arm_status() {
            ArmStatus::Disarming => {
                status.set_arm_status(ArmStatus::Armed);
                ("Unable to Disarm System", KEYSWITCH_DISARM_QUALIFIER)
            }
            ArmStatus::Arming => {
                status.set_arm_status(ArmStatus::Disarmed);
                status.set_auto_arm(false);
                ("Unable to Arm System", KEYSWITCH_ARM_QUALIFIER)
            }
            other => {
                debug!("No pending request to abort (status {other})");
                return Vec::new();
            }
        };

        warn!("{description}: no confirmation from panel");
        let event = Event::new(
            now_micros(),
            ReportType::Trouble,
            KEYSWITCH_EVENT_CODE,
            qualifier,
            description,
            "",
        );
        status.add_new_events(vec![event])
    }
}

/// Deadline for the panel to confirm a keyswitch request.
///
/// Armed when the store enters `arming`/`disarming`, cancelled when it
/// leaves; the deadline is fixed at the transition and unrelated traffic
/// does not extend it.
#[derive(Debug, Clone)]
pub struct ConfirmationWindow {
    timeout: Duration,
    armed_for: Option<ArmStatus>,
    deadline: Option<Instant>,
}

impl ConfirmationWindow {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            armed_for: None,
            deadline: None,
        }
    }

    /// Bring the window in line with the store's current arm status.
    pub fn sync(&mut self, arm_status: ArmStatus) {
        if !arm_status.is_pending() {
            if self.deadline.take().is_some() {
                debug!("Confirmation window closed ({arm_status})");
            }
            self.armed_for = None;
            return;
        }
        if self.armed_for != Some(arm_status) {
            debug!("Confirmation window opened for {arm_status} ({:?})", self.timeout);
            self.armed_for = Some(arm_status);
            self.deadline = Some(Instant::now() + self.timeout);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}
