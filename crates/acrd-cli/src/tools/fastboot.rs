//! Bootloader (`fastboot`) wrapper.
//!
//! fastboot prints variable values and progress on stderr, so every value
//! read here combines both streams.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use acrd_core::device::BackendDescriptor;
use acrd_core::error::ToolFailure;
use acrd_core::parse::{combine_streams, parse_fastboot_devices, parse_getvar_value};
use tracing::debug;

use super::{Invocation, ProcessInvoker, ToolWrapper, Transport};

const VERBS: &[&str] = &["devices", "getvar", "flash", "boot"];

/// `fastboot`, optionally bound to one device serial.
#[derive(Debug, Clone)]
pub struct FastbootWrapper {
    tool: ToolWrapper,
    serial: Option<String>,
}

impl FastbootWrapper {
    pub fn new(
        path: impl Into<PathBuf>,
        invoker: ProcessInvoker,
        serial: Option<String>,
    ) -> Result<Self, ToolFailure> {
        Ok(Self {
            tool: ToolWrapper::new(path, invoker)?,
            serial,
        })
    }

    /// Serials of devices sitting in the bootloader or fastbootd.
    pub async fn list_devices(
        path: &Path,
        invoker: ProcessInvoker,
    ) -> Result<Vec<String>, ToolFailure> {
        let tool = ToolWrapper::new(path, invoker)?;
        match tool.run(&["devices"]).await {
            Ok(invocation) => Ok(parse_fastboot_devices(&invocation.stdout)),
            Err(failure @ ToolFailure::NonZeroExit { .. }) => {
                debug!("fastboot devices failed: {}", failure);
                Ok(Vec::new())
            }
            Err(failure) => Err(failure),
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    async fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Invocation, ToolFailure> {
        let mut full: Vec<OsString> = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = &self.serial {
            full.push("-s".into());
            full.push(serial.into());
        }
        full.extend(args.iter().map(|arg| arg.as_ref().to_os_string()));
        self.tool.run(&full).await
    }

    /// `getvar <name>` output, e.g. `unlocked: yes`.
    pub async fn try_getvar(&self, name: &str) -> Result<String, ToolFailure> {
        let invocation = self.run(&["getvar", name]).await?;
        Ok(combine_streams(&invocation.stdout, &invocation.stderr))
    }

    /// `getvar <name>` output; `None` when the bootloader could not be asked.
    pub async fn getvar(&self, name: &str) -> Option<String> {
        self.try_getvar(name)
            .await
            .map_err(|failure| debug!("getvar {} failed: {}", name, failure))
            .ok()
    }

    /// Write `file` to `partition`. Success is the tool's exit status.
    pub async fn flash(&self, partition: &str, file: &Path) -> Result<(), ToolFailure> {
        self.run(&[OsStr::new("flash"), OsStr::new(partition), file.as_os_str()])
            .await
            .map(|_| ())
    }

    /// Boot `image` without flashing it.
    pub async fn boot(&self, image: &Path) -> Result<(), ToolFailure> {
        self.run(&[OsStr::new("boot"), image.as_os_str()])
            .await
            .map(|_| ())
    }
}

impl Transport for FastbootWrapper {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: "fastboot",
            verbs: VERBS,
            serial: self.serial.clone(),
        }
    }

    /// The parsed value of variable `key`; empty when it was not reported.
    async fn read_field(&self, key: &str) -> Result<String, ToolFailure> {
        let output = self.try_getvar(key).await?;
        Ok(parse_getvar_value(&output, key).unwrap_or_default())
    }
}
