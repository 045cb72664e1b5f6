//! Operations dispatched by boot mode.
//!
//! Each action takes a quarried [`DeviceProfile`] and picks the tool that can
//! talk to the device in its current mode:
//!
//! | Mode | flash | boot | diagnose |
//! |------|-------|------|----------|
//! | adb | refused | refused | root check, patch level |
//! | fastboot / fastbootd | `fastboot flash` | `fastboot boot` | unlock state |
//! | download | `heimdall flash` | refused | PIT read |
//! | edl | refused | refused | skipped |

use std::fmt;
use std::path::Path;

use acrd_core::device::{BootMode, DeviceProfile};
use acrd_core::parse::parse_getvar_value;
use anyhow::{bail, ensure, Context};
use serde::Serialize;
use tracing::info;

use crate::config::ToolPaths;
use crate::tools::{AdbWrapper, FastbootWrapper, HeimdallWrapper, ProcessInvoker};

const ROOT_PROBE: &str = "su -c 'echo rooted'";
const ROOT_MARKER: &str = "rooted";
const PIT_ENTRY_MARKER: &str = "Partition Name:";

/// Tool that flashes a device in `mode`, if any.
pub fn flash_tool(mode: BootMode) -> Option<&'static str> {
    match mode {
        BootMode::Fastboot | BootMode::Fastbootd => Some("fastboot"),
        BootMode::Download => Some("heimdall"),
        BootMode::Adb | BootMode::Edl => None,
    }
}

fn refuse(profile: &DeviceProfile, verb: &str) -> anyhow::Error {
    match profile.boot_mode {
        BootMode::Adb => anyhow::anyhow!(
            "cannot {} {} while it runs Android; reboot it first ('adb reboot bootloader')",
            verb,
            profile.summary()
        ),
        BootMode::Edl => anyhow::anyhow!(
            "cannot {} {}: emergency download mode needs a vendor programmer, which acrd does not drive",
            verb,
            profile.summary()
        ),
        mode => anyhow::anyhow!("cannot {} a device in {} mode", verb, mode),
    }
}

/// Write `file` to `partition` with the tool matching the device mode.
pub async fn flash(
    profile: &DeviceProfile,
    paths: &ToolPaths,
    invoker: ProcessInvoker,
    partition: &str,
    file: &Path,
) -> anyhow::Result<()> {
    ensure!(file.is_file(), "image {} does not exist", file.display());

    match profile.boot_mode {
        BootMode::Fastboot | BootMode::Fastbootd => {
            let serial = profile.serial.clone();
            let fastboot = FastbootWrapper::new(&paths.fastboot, invoker, serial)?;
            fastboot
                .flash(partition, file)
                .await
                .with_context(|| format!("fastboot could not flash {}", partition))?;
        }
        BootMode::Download => {
            let heimdall = HeimdallWrapper::new(&paths.heimdall, invoker)?;
            heimdall
                .flash(partition, file)
                .await
                .with_context(|| format!("heimdall could not flash {}", partition))?;
        }
        BootMode::Adb | BootMode::Edl => return Err(refuse(profile, "flash")),
    }

    info!("Flashed {} to {} on {}", file.display(), partition, profile.summary());
    Ok(())
}

/// Boot `image` once without writing it. Bootloader modes only.
pub async fn boot(
    profile: &DeviceProfile,
    paths: &ToolPaths,
    invoker: ProcessInvoker,
    image: &Path,
) -> anyhow::Result<()> {
    ensure!(image.is_file(), "image {} does not exist", image.display());
    if !profile.boot_mode.is_bootloader() {
        return Err(refuse(profile, "boot an image on"));
    }

    let fastboot = FastbootWrapper::new(&paths.fastboot, invoker, profile.serial.clone())?;
    fastboot
        .boot(image)
        .await
        .with_context(|| format!("fastboot could not boot {}", image.display()))?;
    info!("Booted {} on {}", image.display(), profile.summary());
    Ok(())
}

/// Partition table of the device in download mode.
pub async fn print_pit(paths: &ToolPaths, invoker: ProcessInvoker) -> anyhow::Result<String> {
    let heimdall = HeimdallWrapper::new(&paths.heimdall, invoker)?;
    if !heimdall.detect().await? {
        bail!("no device in download mode");
    }
    Ok(heimdall.print_pit().await?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Skipped,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => f.write_str("PASS"),
            CheckStatus::Warn => f.write_str("WARN"),
            CheckStatus::Skipped => f.write_str("SKIP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

/// Profile plus mode-specific health checks.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub profile: DeviceProfile,
    pub checks: Vec<Check>,
}

pub async fn diagnose(
    profile: DeviceProfile,
    paths: &ToolPaths,
    invoker: ProcessInvoker,
) -> anyhow::Result<Diagnosis> {
    let checks = match profile.boot_mode {
        BootMode::Adb => {
            let adb = AdbWrapper::new(&paths.adb, invoker, profile.serial.clone())?;
            vec![root_check(&adb).await, patch_check(&profile)]
        }
        BootMode::Fastboot | BootMode::Fastbootd => {
            let serial = profile.serial.clone();
            let fastboot = FastbootWrapper::new(&paths.fastboot, invoker, serial)?;
            vec![unlock_check(&fastboot).await]
        }
        BootMode::Download => {
            let heimdall = HeimdallWrapper::new(&paths.heimdall, invoker)?;
            vec![pit_check(&heimdall).await]
        }
        BootMode::Edl => vec![Check::new(
            "edl",
            CheckStatus::Skipped,
            "no checks run in emergency download mode",
        )],
    };

    Ok(Diagnosis { profile, checks })
}

async fn root_check(adb: &AdbWrapper) -> Check {
    match adb.shell(ROOT_PROBE).await {
        Some(output) if output.lines().any(|line| line.trim() == ROOT_MARKER) => {
            Check::new("root", CheckStatus::Pass, "su is available")
        }
        Some(_) => Check::new("root", CheckStatus::Warn, "device is not rooted"),
        None => Check::new("root", CheckStatus::Warn, "device did not answer"),
    }
}

fn patch_check(profile: &DeviceProfile) -> Check {
    match &profile.security_patch {
        Some(patch) => Check::new("security-patch", CheckStatus::Pass, patch.clone()),
        None => Check::new("security-patch", CheckStatus::Warn, "patch level not reported"),
    }
}

async fn unlock_check(fastboot: &FastbootWrapper) -> Check {
    let Some(output) = fastboot.getvar("unlocked").await else {
        return Check::new("bootloader-unlock", CheckStatus::Warn, "unlock state unavailable");
    };
    match parse_getvar_value(&output, "unlocked") {
        Some(value) if value.contains("yes") => {
            Check::new("bootloader-unlock", CheckStatus::Pass, "bootloader is unlocked")
        }
        _ => Check::new("bootloader-unlock", CheckStatus::Warn, "bootloader is locked"),
    }
}

async fn pit_check(heimdall: &HeimdallWrapper) -> Check {
    match heimdall.print_pit().await {
        Ok(pit) => {
            let entries = pit.lines().filter(|line| line.contains(PIT_ENTRY_MARKER)).count();
            Check::new(
                "partition-table",
                CheckStatus::Pass,
                format!("{} partitions", entries),
            )
        }
        Err(failure) => Check::new("partition-table", CheckStatus::Warn, failure.to_string()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{write_tool, TempDir};

    fn paths(dir: &TempDir) -> ToolPaths {
        ToolPaths {
            adb: dir.path().join("adb"),
            fastboot: dir.path().join("fastboot"),
            heimdall: dir.path().join("heimdall"),
        }
    }

    fn profile(mode: BootMode, serial: Option<&str>) -> DeviceProfile {
        DeviceProfile {
            model: "oriole".into(),
            brand: "google".into(),
            os_version: None,
            firmware: None,
            security_patch: None,
            boot_mode: mode,
            serial: serial.map(String::from),
        }
    }

    fn image(dir: &TempDir) -> std::path::PathBuf {
        let image = dir.path().join("boot.img");
        std::fs::write(&image, b"ANDROID!").unwrap();
        image
    }

    #[tokio::test]
    async fn test_flash_in_bootloader_uses_fastboot() {
        let dir = TempDir::new("actions-flash-fastboot");
        write_tool(&dir, "fastboot", "true");
        let image = image(&dir);

        let device = profile(BootMode::Fastbootd, Some("FB01"));
        flash(&device, &paths(&dir), ProcessInvoker::default(), "boot", &image)
            .await
            .unwrap();

        assert_eq!(
            dir.calls(),
            vec![format!("fastboot -s FB01 flash boot {}", image.display())]
        );
    }

    #[tokio::test]
    async fn test_flash_in_download_mode_uses_heimdall() {
        let dir = TempDir::new("actions-flash-heimdall");
        write_tool(&dir, "heimdall", "true");
        let image = image(&dir);

        flash(
            &DeviceProfile::download_mode(),
            &paths(&dir),
            ProcessInvoker::default(),
            "BOOT",
            &image,
        )
        .await
        .unwrap();

        assert_eq!(
            dir.calls(),
            vec![format!("heimdall flash --BOOT {}", image.display())]
        );
    }

    #[tokio::test]
    async fn test_flash_refused_in_adb_and_edl() {
        let dir = TempDir::new("actions-flash-refused");
        write_tool(&dir, "adb", "true");
        let image = image(&dir);

        let err = flash(
            &profile(BootMode::Adb, Some("S1")),
            &paths(&dir),
            ProcessInvoker::default(),
            "boot",
            &image,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("adb reboot bootloader"));

        let err = flash(
            &DeviceProfile::emergency_download(),
            &paths(&dir),
            ProcessInvoker::default(),
            "boot",
            &image,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("emergency download"));
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn test_flash_failure_keeps_tool_error() {
        let dir = TempDir::new("actions-flash-fail");
        write_tool(
            &dir,
            "fastboot",
            "echo \"FAILED (remote: 'partition not found')\" >&2; exit 1",
        );
        let image = image(&dir);

        let err = flash(
            &profile(BootMode::Fastboot, None),
            &paths(&dir),
            ProcessInvoker::default(),
            "vendor_boot",
            &image,
        )
        .await
        .unwrap_err();
        assert!(format!("{:#}", err).contains("partition not found"));
        assert!(err.downcast_ref::<acrd_core::error::ToolFailure>().is_some());
    }

    #[tokio::test]
    async fn test_missing_image_is_rejected_before_running_tools() {
        let dir = TempDir::new("actions-no-image");
        write_tool(&dir, "fastboot", "true");

        let err = boot(
            &profile(BootMode::Fastboot, None),
            &paths(&dir),
            ProcessInvoker::default(),
            &dir.missing("twrp.img"),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(dir.calls().is_empty());
    }

    #[tokio::test]
    async fn test_boot_only_in_bootloader() {
        let dir = TempDir::new("actions-boot");
        write_tool(&dir, "fastboot", "true");
        let image = image(&dir);

        let invoker = ProcessInvoker::default();
        let bootloader = profile(BootMode::Fastboot, Some("FB01"));
        boot(&bootloader, &paths(&dir), invoker, &image).await.unwrap();

        let download = DeviceProfile::download_mode();
        assert!(boot(&download, &paths(&dir), invoker, &image).await.is_err());
        assert_eq!(dir.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_diagnose_adb_root_and_patch() {
        let dir = TempDir::new("actions-diagnose-adb");
        write_tool(&dir, "adb", "echo rooted");

        let mut device = profile(BootMode::Adb, Some("S1"));
        device.security_patch = Some("2024-05-05".into());
        let diagnosis = diagnose(device, &paths(&dir), ProcessInvoker::default())
            .await
            .unwrap();

        assert_eq!(
            diagnosis.checks,
            vec![
                Check::new("root", CheckStatus::Pass, "su is available"),
                Check::new("security-patch", CheckStatus::Pass, "2024-05-05"),
            ]
        );
        assert_eq!(dir.calls(), vec!["adb -s S1 shell su -c 'echo rooted'"]);
    }

    #[tokio::test]
    async fn test_diagnose_adb_not_rooted() {
        let dir = TempDir::new("actions-diagnose-noroot");
        write_tool(
            &dir,
            "adb",
            "echo '/system/bin/sh: su: inaccessible or not found'; exit 127",
        );

        let device = profile(BootMode::Adb, Some("S1"));
        let diagnosis = diagnose(device, &paths(&dir), ProcessInvoker::default())
            .await
            .unwrap();
        assert_eq!(diagnosis.checks[0].status, CheckStatus::Warn);
        assert_eq!(diagnosis.checks[1].status, CheckStatus::Warn);
    }

    #[tokio::test]
    async fn test_diagnose_fastboot_unlock_state() {
        let dir = TempDir::new("actions-diagnose-fastboot");
        write_tool(&dir, "fastboot", "echo 'unlocked: yes' >&2");

        let device = profile(BootMode::Fastboot, Some("FB01"));
        let diagnosis = diagnose(device, &paths(&dir), ProcessInvoker::default())
            .await
            .unwrap();
        assert_eq!(diagnosis.checks.len(), 1);
        assert_eq!(diagnosis.checks[0].status, CheckStatus::Pass);
        assert_eq!(diagnosis.checks[0].detail, "bootloader is unlocked");
    }

    #[tokio::test]
    async fn test_diagnose_download_reads_pit() {
        let dir = TempDir::new("actions-diagnose-pit");
        write_tool(
            &dir,
            "heimdall",
            "echo 'Partition Name: BOOT'; echo 'Partition Name: RECOVERY'",
        );

        let device = DeviceProfile::download_mode();
        let diagnosis = diagnose(device, &paths(&dir), ProcessInvoker::default())
            .await
            .unwrap();
        assert_eq!(diagnosis.checks[0].status, CheckStatus::Pass);
        assert_eq!(diagnosis.checks[0].detail, "2 partitions");
    }

    #[tokio::test]
    async fn test_diagnose_edl_is_skipped() {
        let dir = TempDir::new("actions-diagnose-edl");

        let device = DeviceProfile::emergency_download();
        let diagnosis = diagnose(device, &paths(&dir), ProcessInvoker::default())
            .await
            .unwrap();
        assert_eq!(diagnosis.checks[0].status, CheckStatus::Skipped);
    }

    #[test]
    fn test_flash_tool_by_mode() {
        assert_eq!(flash_tool(BootMode::Fastbootd), Some("fastboot"));
        assert_eq!(flash_tool(BootMode::Download), Some("heimdall"));
        assert_eq!(flash_tool(BootMode::Adb), None);
        assert_eq!(flash_tool(BootMode::Edl), None);
    }
}
