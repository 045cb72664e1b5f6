//! Download-mode (`heimdall`) wrapper.
//!
//! Download mode has no serial to address and no property store; heimdall
//! talks to whichever device is in download mode.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use acrd_core::device::BackendDescriptor;
use acrd_core::error::ToolFailure;
use tracing::debug;

use super::{ProcessInvoker, ToolWrapper};

const VERBS: &[&str] = &["detect", "print-pit", "flash"];

/// What `heimdall detect` prints when a device answers.
pub const DETECTED_MARKER: &str = "Device detected";

#[derive(Debug, Clone)]
pub struct HeimdallWrapper {
    tool: ToolWrapper,
}

impl HeimdallWrapper {
    pub fn new(path: impl Into<PathBuf>, invoker: ProcessInvoker) -> Result<Self, ToolFailure> {
        Ok(Self {
            tool: ToolWrapper::new(path, invoker)?,
        })
    }

    pub fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: "heimdall",
            verbs: VERBS,
            serial: None,
        }
    }

    /// Whether a device is in download mode.
    ///
    /// heimdall exits non-zero when nothing is attached; that is `Ok(false)`.
    pub async fn detect(&self) -> Result<bool, ToolFailure> {
        match self.tool.run(&["detect"]).await {
            Ok(invocation) => Ok(invocation.stdout.contains(DETECTED_MARKER)),
            Err(failure @ ToolFailure::NonZeroExit { .. }) => {
                debug!("heimdall detect: {}", failure);
                Ok(false)
            }
            Err(failure) => Err(failure),
        }
    }

    /// Download the partition table and return heimdall's listing of it.
    pub async fn print_pit(&self) -> Result<String, ToolFailure> {
        let invocation = self.tool.run(&["print-pit", "--no-reboot"]).await?;
        Ok(invocation.stdout.trim().to_string())
    }

    /// Write `file` to the partition named `partition` in the PIT.
    pub async fn flash(&self, partition: &str, file: &Path) -> Result<(), ToolFailure> {
        let flag = format!("--{}", partition);
        self.tool
            .run(&[OsStr::new("flash"), OsStr::new(&flag), file.as_os_str()])
            .await
            .map(|_| ())
    }
}
