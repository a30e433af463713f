//! Platform detection and OS-specific utilities.
//!
//! `Platform` describes the host the binary runs on (used for data
//! directories). `DeviceOs` describes the device profile the notification
//! pipeline targets, which decides channel and permission behaviour.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{RkError, RkResult};

/// Detected host operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Detect the current platform at compile time.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Get the platform-specific application data directory.
    ///
    /// - Windows: `%APPDATA%/Rentkar`
    /// - macOS: `~/Library/Application Support/Rentkar`
    /// - Linux: `~/.local/share/Rentkar`
    pub fn data_dir() -> RkResult<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| RkError::Config("could not determine data directory".into()))?;
        Ok(base.join(constants::APP_NAME))
    }

    /// Get the platform-specific configuration directory.
    pub fn config_dir() -> RkResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| RkError::Config("could not determine config directory".into()))?;
        Ok(base.join(constants::APP_NAME))
    }

    /// Get a human-readable platform name.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Device OS profile for push and local notification behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOs {
    Android,
    Ios,
    Desktop,
}

impl DeviceOs {
    /// Whether notifications must be posted to a pre-created channel.
    pub fn requires_notification_channel(&self) -> bool {
        matches!(self, DeviceOs::Android)
    }

    /// Whether showing notifications needs an explicit runtime grant on
    /// the given OS version.
    ///
    /// Android only asks from API level 33 on; older versions grant the
    /// permission at install time. iOS always asks.
    pub fn requires_runtime_permission(&self, os_version: u32) -> bool {
        match self {
            DeviceOs::Android => os_version >= constants::ANDROID_RUNTIME_PERMISSION_API_LEVEL,
            DeviceOs::Ios => true,
            DeviceOs::Desktop => false,
        }
    }

    /// Host name a development build uses to reach the backend on the
    /// developer machine. The Android emulator sees the host as 10.0.2.2.
    pub fn dev_host(&self) -> &'static str {
        match self {
            DeviceOs::Android => "10.0.2.2",
            DeviceOs::Ios | DeviceOs::Desktop => "localhost",
        }
    }
}

impl std::fmt::Display for DeviceOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceOs::Android => write!(f, "android"),
            DeviceOs::Ios => write!(f, "ios"),
            DeviceOs::Desktop => write!(f, "desktop"),
        }
    }
}
