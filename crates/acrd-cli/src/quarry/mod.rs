//! Device quarry: find the attached device and describe it.
//!
//! A quarry walks an ordered list of strategies until one yields a
//! [`DeviceProfile`]:
//!
//! 1. [`Strategy::Enumerate`]: ask `adb` and `fastboot` for attached devices,
//!    let the operator pick when there are several, then read the profile
//!    through the matching tool.
//! 2. [`Strategy::DownloadMode`]: ask `heimdall` whether a device sits in
//!    download mode.
//! 3. [`Strategy::UsbHeuristic`]: look for a Qualcomm EDL device in the USB
//!    table.
//!
//! Backend failures along the way are handed to the [`ErrorAdvisor`] and the
//! next strategy runs. Only [`QuarryError::NoDeviceFound`] and operator
//! selection errors reach the caller.
//!
//! A quarry pinned to a serial only enumerates. The fallback strategies find
//! devices that have no serial, so they can never match it.

pub mod extract;
pub mod select;
pub mod usb;

use std::fmt;

use acrd_core::advice::failure_prompt;
use acrd_core::device::{merge_candidates, CandidateDevice, CandidateMode, DeviceProfile};
use acrd_core::error::QuarryError;
use acrd_core::usb::{find_edl, UsbId};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::advisor::ErrorAdvisor;
use crate::config::ToolPaths;
use crate::tools::{AdbWrapper, FastbootWrapper, HeimdallWrapper, ProcessInvoker};

pub use select::{LinePicker, Picker};

/// One way of finding a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Enumerate,
    DownloadMode,
    UsbHeuristic,
}

impl Strategy {
    pub const DEFAULT_ORDER: [Strategy; 3] = [
        Strategy::Enumerate,
        Strategy::DownloadMode,
        Strategy::UsbHeuristic,
    ];

    /// Whether the devices this strategy finds carry a serial.
    pub fn yields_serial(self) -> bool {
        matches!(self, Strategy::Enumerate)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Enumerate => f.write_str("enumerate"),
            Strategy::DownloadMode => f.write_str("download-mode"),
            Strategy::UsbHeuristic => f.write_str("usb-heuristic"),
        }
    }
}

/// An advisor answer collected during a quarry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advice {
    pub tool: String,
    pub error: String,
    pub suggestion: String,
}

/// List devices on both serial-addressable transports, adb first.
///
/// A failing enumeration is logged and counts as no devices.
pub async fn enumerate(paths: &ToolPaths, invoker: ProcessInvoker) -> Vec<CandidateDevice> {
    let adb = AdbWrapper::list_devices(&paths.adb, invoker)
        .await
        .unwrap_or_else(|failure| {
            warn!("adb enumeration failed: {}", failure);
            Vec::new()
        });
    let fastboot = FastbootWrapper::list_devices(&paths.fastboot, invoker)
        .await
        .unwrap_or_else(|failure| {
            warn!("fastboot enumeration failed: {}", failure);
            Vec::new()
        });
    merge_candidates(adb, fastboot)
}

/// One device identification attempt.
pub struct Quarry<A, P> {
    paths: ToolPaths,
    invoker: ProcessInvoker,
    advisor: A,
    picker: P,
    serial: Option<String>,
    advice: Vec<Advice>,
    usb_ids: fn() -> Vec<UsbId>,
}

impl<A: ErrorAdvisor, P: Picker> Quarry<A, P> {
    pub fn new(paths: ToolPaths, invoker: ProcessInvoker, advisor: A, picker: P) -> Self {
        Self {
            paths,
            invoker,
            advisor,
            picker,
            serial: None,
            advice: Vec::new(),
            usb_ids: usb::list_usb_ids,
        }
    }

    /// Pick `serial` among enumerated devices instead of prompting.
    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial;
        self
    }

    /// Advisor answers collected so far.
    pub fn advice(&self) -> &[Advice] {
        &self.advice
    }

    pub async fn run(&mut self) -> Result<DeviceProfile, QuarryError> {
        let span = info_span!("quarry", id = %Uuid::new_v4());
        self.run_strategies().instrument(span).await
    }

    async fn run_strategies(&mut self) -> Result<DeviceProfile, QuarryError> {
        for strategy in Strategy::DEFAULT_ORDER {
            debug!("Trying strategy {}", strategy);
            if let Some(profile) = self.probe(strategy).await? {
                info!("Found {} via {}", profile.summary(), strategy);
                return Ok(profile);
            }
        }
        Err(QuarryError::NoDeviceFound)
    }

    /// Run one strategy. `Ok(None)` means try the next one.
    pub async fn probe(
        &mut self,
        strategy: Strategy,
    ) -> Result<Option<DeviceProfile>, QuarryError> {
        if self.serial.is_some() && !strategy.yields_serial() {
            debug!("Skipping {}: it cannot match a serial", strategy);
            return Ok(None);
        }

        match strategy {
            Strategy::Enumerate => self.probe_enumerated().await,
            Strategy::DownloadMode => Ok(self.probe_download_mode().await),
            Strategy::UsbHeuristic => Ok(self.probe_usb_table()),
        }
    }

    async fn probe_enumerated(&mut self) -> Result<Option<DeviceProfile>, QuarryError> {
        let candidates = enumerate(&self.paths, self.invoker).await;
        let serial = self.serial.as_deref();
        if candidates.is_empty() {
            debug!("No adb or fastboot devices");
            return match serial {
                Some(serial) => Err(QuarryError::UnknownSerial(serial.to_string())),
                None => Ok(None),
            };
        }

        let candidate = select::choose(&mut self.picker, candidates, serial).await?;
        match extract::profile_for(&candidate, &self.paths, self.invoker).await {
            Ok(profile) => Ok(Some(profile)),
            Err(err) => {
                warn!("Could not read profile of {}: {}", candidate.serial, err);
                let tool = match candidate.mode {
                    CandidateMode::Adb => "adb",
                    CandidateMode::Fastboot => "fastboot",
                };
                let task = format!("read the profile of device {}", candidate.serial);
                self.consult(tool, &err.to_string(), &task).await;
                Ok(None)
            }
        }
    }

    async fn probe_download_mode(&mut self) -> Option<DeviceProfile> {
        let detected = match HeimdallWrapper::new(&self.paths.heimdall, self.invoker) {
            Ok(heimdall) => {
                debug!("Probing {}", heimdall.descriptor());
                heimdall.detect().await
            }
            Err(failure) => Err(failure),
        };

        match detected {
            Ok(true) => Some(DeviceProfile::download_mode()),
            Ok(false) => None,
            Err(failure) if failure.is_not_found() => {
                debug!("heimdall unavailable: {}", failure);
                None
            }
            Err(failure) => {
                warn!("Download mode detection failed: {}", failure);
                self.consult(
                    "heimdall",
                    &failure.to_string(),
                    "detect a device in download mode",
                )
                .await;
                None
            }
        }
    }

    fn probe_usb_table(&self) -> Option<DeviceProfile> {
        let ids = (self.usb_ids)();
        let id = find_edl(&ids)?;
        info!("USB device {} is in emergency download mode", id);
        Some(DeviceProfile::emergency_download())
    }

    /// Ask the advisor about a backend failure. Never fails.
    async fn consult(&mut self, tool: &str, error: &str, task: &str) {
        let prompt = failure_prompt(tool, error, task);
        match self.advisor.suggest(&prompt).await {
            Ok(suggestion) => {
                info!("Advisor suggestion for {}: {}", tool, suggestion);
                self.advice.push(Advice {
                    tool: tool.to_string(),
                    error: error.to_string(),
                    suggestion,
                });
            }
            Err(e) => warn!("Error advisor failed: {:#}", e),
        }
    }
}
