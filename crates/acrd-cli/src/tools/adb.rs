//! Debug-bridge (`adb`) wrapper.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use acrd_core::device::BackendDescriptor;
use acrd_core::error::ToolFailure;
use acrd_core::parse::{combine_streams, parse_adb_devices};
use tracing::debug;

use super::{Invocation, ProcessInvoker, ToolWrapper, Transport};

const VERBS: &[&str] = &[
    "devices", "getprop", "shell", "pull", "push", "install", "logcat", "dmesg",
];

/// `adb`, optionally bound to one device serial.
#[derive(Debug, Clone)]
pub struct AdbWrapper {
    tool: ToolWrapper,
    serial: Option<String>,
}

impl AdbWrapper {
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

    /// Serials of devices in the `device` state.
    ///
    /// Anything short of a missing tool or a stuck transport yields an empty
    /// list: a failed enumeration found nothing.
    pub async fn list_devices(
        path: &Path,
        invoker: ProcessInvoker,
    ) -> Result<Vec<String>, ToolFailure> {
        let tool = ToolWrapper::new(path, invoker)?;
        match tool.run(&["devices"]).await {
            Ok(invocation) => Ok(parse_adb_devices(&invocation.stdout)),
            Err(failure @ ToolFailure::NonZeroExit { .. }) => {
                debug!("adb devices failed: {}", failure);
                Ok(Vec::new())
            }
            Err(failure) => Err(failure),
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn args<S: AsRef<OsStr>>(&self, args: &[S]) -> Vec<OsString> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = &self.serial {
            full.push(OsString::from("-s"));
            full.push(OsString::from(serial));
        }
        full.extend(args.iter().map(|arg| arg.as_ref().to_os_string()));
        full
    }

    async fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Invocation, ToolFailure> {
        self.tool.run(&self.args(args)).await
    }

    async fn stdout<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<String, ToolFailure> {
        Ok(self.run(args).await?.stdout.trim().to_string())
    }

    /// `getprop <key>`, keeping the failure for diagnostics.
    pub async fn try_get_prop(&self, key: &str) -> Result<String, ToolFailure> {
        self.stdout(&["shell", "getprop", key]).await
    }

    /// `getprop <key>`; `None` when the device could not be asked.
    pub async fn get_prop(&self, key: &str) -> Option<String> {
        self.try_get_prop(key)
            .await
            .map_err(|failure| debug!("getprop {} failed: {}", key, failure))
            .ok()
    }

    /// Run `command` in the device shell and return its combined output.
    ///
    /// A failing remote command still returns its output. `None` means adb
    /// itself could not reach the device.
    pub async fn shell(&self, command: &str) -> Option<String> {
        let invocation = self
            .tool
            .output(&self.args(&["shell", command]))
            .await
            .map_err(|failure| debug!("adb shell failed: {}", failure))
            .ok()?;

        if !invocation.success()
            && invocation.stdout.trim().is_empty()
            && invocation.stderr.trim_start().starts_with("error:")
        {
            debug!("adb could not reach the device: {}", invocation.stderr.trim());
            return None;
        }
        Some(combine_streams(&invocation.stdout, &invocation.stderr))
    }

    pub async fn pull(&self, remote: &str, local: &Path) -> Result<String, ToolFailure> {
        self.stdout(&[OsStr::new("pull"), OsStr::new(remote), local.as_os_str()])
            .await
    }

    pub async fn push(&self, local: &Path, remote: &str) -> Result<String, ToolFailure> {
        self.stdout(&[OsStr::new("push"), local.as_os_str(), OsStr::new(remote)])
            .await
    }

    pub async fn install(&self, apk: &Path) -> Result<String, ToolFailure> {
        self.stdout(&[OsStr::new("install"), apk.as_os_str()]).await
    }

    /// Dump the current logcat buffer (`logcat -d`).
    pub async fn logcat(&self, options: &[String]) -> Result<String, ToolFailure> {
        let mut args = vec!["logcat".to_string(), "-d".to_string()];
        args.extend(options.iter().cloned());
        self.stdout(args.as_slice()).await
    }

    pub async fn dmesg(&self) -> Option<String> {
        self.shell("dmesg").await
    }
}

impl Transport for AdbWrapper {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: "adb",
            verbs: VERBS,
            serial: self.serial.clone(),
        }
    }

    async fn read_field(&self, key: &str) -> Result<String, ToolFailure> {
        self.try_get_prop(key).await
    }
}
