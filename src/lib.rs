// MIT License - Copyright (c) 2026 Peter Wright
// Alarm central station receiver
//
//! # alarmd
//!
//! A home alarm central station receiver. The alarm panel dials a telephone
//! line attached to a USB telephony adapter and reports events using the DSC
//! Contact ID protocol; `alarmd` answers, decodes the reports, tracks arm
//! state and outstanding alarms, and forwards events to notifiers. A local
//! Unix socket accepts arm/disarm/status/history requests, with arming done
//! by pulsing the panel's keyswitch input from a GPIO line.
//!
//! ## Quick Start
//!
//! ```no_run
//! use alarmd::{Config, Daemon, HidrawCapture, LogNotifier, SysfsKeyswitch};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("/etc/alarmd.toml")?;
//!     let capture = HidrawCapture::open(&config.receiver.capture_device, None)?;
//!
//!     let mut daemon =
//!         Daemon::new(config.daemon_config(), capture, None::<SysfsKeyswitch>, LogNotifier)?;
//!     daemon
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod contact_id;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod event;
pub mod hardware;
pub mod notify;
pub mod protocol;
pub mod status;

// Re-exports for convenience
pub use config::{Config, DaemonConfig, DaemonConfigBuilder};
pub use contact_id::{Collector, Decoder, RawMessage};
pub use controller::{ArmController, ConfirmationWindow};
pub use daemon::{ControlListener, Daemon};
pub use error::{AlarmError, Result};
pub use event::{Event, ReportType};
pub use hardware::{CaptureDevice, HidrawCapture, Keyswitch, Sample, SysfsKeyswitch};
pub use notify::{LogNotifier, MqttAlarmEvent, MqttNotifier, Notifier, NotifierSet};
pub use protocol::{Command, HistoryOptions, Request, Response};
pub use status::{AlarmStatus, ArmStatus, StatusSnapshot, SystemStatus};
