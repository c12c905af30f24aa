// MIT License - Copyright (c) 2026 Peter Wright
// Sysfs GPIO keyswitch

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{AlarmError, Result};
use crate::hardware::Keyswitch;

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Keyswitch driven through a sysfs GPIO line wired to the panel's
/// temporary keyswitch zone.
#[derive(Debug, Clone)]
pub struct SysfsKeyswitch {
    pin: u32,
    value_path: PathBuf,
    pulse: Duration,
}

impl SysfsKeyswitch {
    /// Export `pin` (if needed) under the system GPIO root and configure it as
    /// an output.
    pub async fn open(pin: u32, pulse: Duration) -> Result<Self> {
        Self::open_at(SYSFS_GPIO_ROOT, pin, pulse).await
    }

    /// Like [`SysfsKeyswitch::open`] with an explicit sysfs root.
    pub async fn open_at(root: impl AsRef<Path>, pin: u32, pulse: Duration) -> Result<Self> {
        let root = root.as_ref();
        let pin_dir = root.join(format!("gpio{pin}"));

        if !tokio::fs::try_exists(&pin_dir).await? {
            debug!("Exporting GPIO {pin}");
            tokio::fs::write(root.join("export"), pin.to_string()).await?;
        }
        tokio::fs::write(pin_dir.join("direction"), "out").await?;

        info!("Keyswitch on GPIO {pin} ready");
        Ok(Self {
            pin,
            value_path: pin_dir.join("value"),
            pulse,
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    async fn read_value(&self) -> Result<bool> {
        let raw = tokio::fs::read_to_string(&self.value_path).await?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(AlarmError::Config {
                reason: format!("GPIO {} has unexpected value {other:?}", self.pin),
            }),
        }
    }

    async fn invert(&self) -> Result<()> {
        let level = !self.read_value().await?;
        tokio::fs::write(&self.value_path, if level { "1" } else { "0" }).await?;
        Ok(())
    }
}

impl Keyswitch for SysfsKeyswitch {
    async fn toggle(&mut self) -> Result<()> {
        debug!("Pulsing keyswitch on GPIO {} for {:?}", self.pin, self.pulse);
        self.invert().await?;
        tokio::time::sleep(self.pulse).await;
        self.invert().await
    }
}
