//! Device records produced by the quarry.
//!
//! A [`DeviceProfile`] is the only thing the quarry hands to its caller. It is
//! serialisable so a storage collaborator can persist it as-is:
//!
//! ```json
//! {"model":"Pixel 6","brand":"Google","os_version":"14","firmware":null,
//!  "security_patch":null,"boot_mode":"adb","serial":"ABC123"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Model placeholder for devices seen only through download mode.
pub const DOWNLOAD_MODE_MODEL: &str = "Samsung Device";
/// Brand placeholder for devices seen only through download mode.
pub const DOWNLOAD_MODE_BRAND: &str = "Samsung";
/// Model placeholder for devices seen only in emergency download.
pub const EDL_MODEL: &str = "Qualcomm EDL Device";
/// Brand placeholder for devices seen only in emergency download.
pub const EDL_BRAND: &str = "Qualcomm";
/// Brand used when the debug bridge reports an empty brand.
pub const UNKNOWN_BRAND: &str = "unknown";

/// Transport mode a device currently exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    /// Booted OS reachable through the debug bridge.
    Adb,
    /// Bootloader.
    Fastboot,
    /// Userspace fastboot running from recovery.
    Fastbootd,
    /// Vendor download mode (heimdall).
    Download,
    /// Qualcomm emergency download, detected from USB ids only.
    Edl,
}

impl BootMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootMode::Adb => "adb",
            BootMode::Fastboot => "fastboot",
            BootMode::Fastbootd => "fastbootd",
            BootMode::Download => "download",
            BootMode::Edl => "edl",
        }
    }

    /// Whether partitions can be flashed through the bootloader tool.
    pub fn is_bootloader(&self) -> bool {
        matches!(self, BootMode::Fastboot | BootMode::Fastbootd)
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised description of the quarried device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub model: String,
    pub brand: String,
    pub os_version: Option<String>,
    pub firmware: Option<String>,
    pub security_patch: Option<String>,
    pub boot_mode: BootMode,
    /// Absent for modes without an addressable serial (download, EDL).
    pub serial: Option<String>,
}

impl DeviceProfile {
    /// Fixed profile for a device that answered heimdall's `detect`.
    pub fn download_mode() -> Self {
        Self {
            model: DOWNLOAD_MODE_MODEL.to_string(),
            brand: DOWNLOAD_MODE_BRAND.to_string(),
            os_version: None,
            firmware: None,
            security_patch: None,
            boot_mode: BootMode::Download,
            serial: None,
        }
    }

    /// Fixed profile for a device found in the USB table in EDL mode.
    pub fn emergency_download() -> Self {
        Self {
            model: EDL_MODEL.to_string(),
            brand: EDL_BRAND.to_string(),
            os_version: None,
            firmware: None,
            security_patch: None,
            boot_mode: BootMode::Edl,
            serial: None,
        }
    }

    /// One-line human summary, e.g. `Google Pixel 6 [adb, ABC123]`.
    pub fn summary(&self) -> String {
        match &self.serial {
            Some(serial) => format!(
                "{} {} [{}, {}]",
                self.brand, self.model, self.boot_mode, serial
            ),
            None => format!("{} {} [{}]", self.brand, self.model, self.boot_mode),
        }
    }
}

/// Mode a device was enumerated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateMode {
    Adb,
    Fastboot,
}

impl fmt::Display for CandidateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateMode::Adb => f.write_str("adb"),
            CandidateMode::Fastboot => f.write_str("fastboot"),
        }
    }
}

/// An enumerated device awaiting selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDevice {
    pub serial: String,
    pub mode: CandidateMode,
}

impl CandidateDevice {
    pub fn new(serial: impl Into<String>, mode: CandidateMode) -> Self {
        Self {
            serial: serial.into(),
            mode,
        }
    }
}

/// Merge per-backend enumeration results, debug-bridge devices first.
pub fn merge_candidates(adb: Vec<String>, fastboot: Vec<String>) -> Vec<CandidateDevice> {
    adb.into_iter()
        .map(|serial| CandidateDevice::new(serial, CandidateMode::Adb))
        .chain(
            fastboot
                .into_iter()
                .map(|serial| CandidateDevice::new(serial, CandidateMode::Fastboot)),
        )
        .collect()
}

/// Identity of a backend wrapper instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendDescriptor {
    pub name: &'static str,
    pub verbs: &'static [&'static str],
    pub serial: Option<String>,
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.serial {
            Some(serial) => write!(f, "{} ({})", self.name, serial),
            None => f.write_str(self.name),
        }
    }
}
