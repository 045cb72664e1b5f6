//! Typed wrappers over the device tools.
//!
//! One wrapper per transport. A wrapper checks its tool path when it is
//! constructed and is bound to at most one device serial for its lifetime.

pub mod adb;
pub mod fastboot;
pub mod heimdall;
pub mod invoker;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use acrd_core::device::BackendDescriptor;
use acrd_core::error::ToolFailure;

pub use adb::AdbWrapper;
pub use fastboot::FastbootWrapper;
pub use heimdall::HeimdallWrapper;
pub use invoker::{Invocation, ProcessInvoker};

/// A verified tool path plus the invoker used to run it.
#[derive(Debug, Clone)]
pub struct ToolWrapper {
    path: PathBuf,
    invoker: ProcessInvoker,
}

impl ToolWrapper {
    /// Fails with `NotFound` if `path` is not an executable file.
    pub fn new(path: impl Into<PathBuf>, invoker: ProcessInvoker) -> Result<Self, ToolFailure> {
        let path = path.into();
        invoker::ensure_executable(&path)?;
        Ok(Self { path, invoker })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the tool, requiring a zero exit status.
    pub async fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Invocation, ToolFailure> {
        self.invoker.run(&self.path, args).await
    }

    /// Run the tool, returning its output whatever the exit status.
    pub async fn output<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Invocation, ToolFailure> {
        self.invoker.output(&self.path, args).await
    }
}

/// What the quarry needs from a serial-addressable transport.
///
/// `read_field` futures are not `Send`; a quarry runs on one task.
pub trait Transport {
    fn descriptor(&self) -> BackendDescriptor;

    /// Read the value of one device field (a property or a variable).
    async fn read_field(&self, key: &str) -> Result<String, ToolFailure>;
}
