//! Per-backend profile extraction.

use acrd_core::device::{BootMode, CandidateDevice, CandidateMode, DeviceProfile, UNKNOWN_BRAND};
use acrd_core::error::QuarryError;
use acrd_core::parse::{is_userspace, non_empty};
use tracing::debug;

use crate::config::ToolPaths;
use crate::tools::{AdbWrapper, FastbootWrapper, ProcessInvoker, Transport};

const PROP_MODEL: &str = "ro.product.model";
const PROP_BRAND: &str = "ro.product.brand";
const PROP_RELEASE: &str = "ro.build.version.release";
const PROP_INCREMENTAL: &str = "ro.build.version.incremental";
const PROP_SECURITY_PATCH: &str = "ro.build.version.security_patch";

const VAR_PRODUCT: &str = "product";
const VAR_IS_USERSPACE: &str = "is-userspace";
const VAR_BOOTLOADER_VERSION: &str = "version-bootloader";

/// A field the profile cannot do without.
async fn require_field<T: Transport>(transport: &T, key: &str) -> Result<String, QuarryError> {
    let value = transport.read_field(key).await?;
    non_empty(Some(value)).ok_or_else(|| {
        QuarryError::extraction(
            transport.descriptor().to_string(),
            format!("{} is empty", key),
        )
    })
}

/// A field that degrades to `None` on any failure.
///
/// adb has [`AdbWrapper::get_prop`] for this; fastboot variables need the
/// value pulled out of the `name: value` line first.
async fn optional_field<T: Transport>(transport: &T, key: &str) -> Option<String> {
    match transport.read_field(key).await {
        Ok(value) => non_empty(Some(value)),
        Err(failure) => {
            debug!("{}: {} unavailable: {}", transport.descriptor(), key, failure);
            None
        }
    }
}

/// Profile of a device booted into the OS.
pub async fn adb_profile(adb: &AdbWrapper) -> Result<DeviceProfile, QuarryError> {
    let model = require_field(adb, PROP_MODEL).await?;
    let brand = non_empty(adb.get_prop(PROP_BRAND).await)
        .unwrap_or_else(|| UNKNOWN_BRAND.to_string());

    Ok(DeviceProfile {
        model,
        brand,
        os_version: non_empty(adb.get_prop(PROP_RELEASE).await),
        firmware: non_empty(adb.get_prop(PROP_INCREMENTAL).await),
        security_patch: non_empty(adb.get_prop(PROP_SECURITY_PATCH).await),
        boot_mode: BootMode::Adb,
        serial: adb.serial().map(String::from),
    })
}

/// Profile of a device in the bootloader or fastbootd.
///
/// The bootloader only knows its product name, which doubles as the brand.
pub async fn fastboot_profile(fastboot: &FastbootWrapper) -> Result<DeviceProfile, QuarryError> {
    let model = require_field(fastboot, VAR_PRODUCT).await?;

    let boot_mode = match fastboot.getvar(VAR_IS_USERSPACE).await {
        Some(output) if is_userspace(&output) => BootMode::Fastbootd,
        _ => BootMode::Fastboot,
    };

    Ok(DeviceProfile {
        brand: model.clone(),
        model,
        os_version: None,
        firmware: optional_field(fastboot, VAR_BOOTLOADER_VERSION).await,
        security_patch: None,
        boot_mode,
        serial: fastboot.serial().map(String::from),
    })
}

/// Bind a fresh wrapper to `candidate` and read its profile.
pub async fn profile_for(
    candidate: &CandidateDevice,
    paths: &ToolPaths,
    invoker: ProcessInvoker,
) -> Result<DeviceProfile, QuarryError> {
    let serial = Some(candidate.serial.clone());
    match candidate.mode {
        CandidateMode::Adb => {
            let adb = AdbWrapper::new(&paths.adb, invoker, serial)?;
            adb_profile(&adb).await
        }
        CandidateMode::Fastboot => {
            let fastboot = FastbootWrapper::new(&paths.fastboot, invoker, serial)?;
            fastboot_profile(&fastboot).await
        }
    }
}
