//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ToolOverrides;

/// Identify attached Android devices and drive them through the right tool.
///
/// acrd looks for a device over adb, fastboot, heimdall download mode and the
/// USB table (Qualcomm EDL), in that order, and dispatches flashing, booting
/// and diagnostics to the tool that matches the mode it found.
#[derive(Debug, Parser)]
#[command(name = "acrd", version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Args)]
pub struct GlobalArgs {
    /// Path to adb [env: ACRD_ADB]
    #[arg(long, global = true, value_name = "PATH")]
    pub adb: Option<PathBuf>,

    /// Path to fastboot [env: ACRD_FASTBOOT]
    #[arg(long, global = true, value_name = "PATH")]
    pub fastboot: Option<PathBuf>,

    /// Path to heimdall [env: ACRD_HEIMDALL]
    #[arg(long, global = true, value_name = "PATH")]
    pub heimdall: Option<PathBuf>,

    /// Command that answers failure prompts [env: ACRD_ADVISOR_CMD]
    #[arg(long, global = true, value_name = "PATH")]
    pub advisor: Option<PathBuf>,

    /// Seconds a single tool call may run (0 disables the limit)
    #[arg(long, global = true, default_value_t = 30, value_name = "SECS")]
    pub tool_timeout: u64,

    /// Seconds to wait for a device selection (0 waits forever)
    #[arg(long, global = true, default_value_t = 120, value_name = "SECS")]
    pub prompt_timeout: u64,

    /// Log tool invocations
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn tool_overrides(&self) -> ToolOverrides {
        ToolOverrides {
            adb: self.adb.clone(),
            fastboot: self.fastboot.clone(),
            heimdall: self.heimdall.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Identify the attached device and print its profile
    #[command(after_help = "\
Examples:
  acrd quarry                           # Probe adb, fastboot, download mode, EDL
  acrd quarry --json                    # Profile as JSON for storage
  acrd quarry --serial R58M12ABCDE      # Pick a device without prompting")]
    Quarry(QuarryArgs),

    /// List devices visible to adb and fastboot
    Devices(DevicesArgs),

    /// Read an Android property over adb
    Getprop(GetpropArgs),

    /// Read a bootloader variable over fastboot
    Getvar(GetvarArgs),

    /// Run a command in the device shell
    #[command(after_help = "\
Examples:
  acrd shell id                         # Who is the shell user
  acrd shell ls -l /sdcard              # Arguments after the command are passed through")]
    Shell(ShellArgs),

    /// Copy a file from the device
    Pull(PullArgs),

    /// Copy a file to the device
    Push(PushArgs),

    /// Install an APK
    Install(InstallArgs),

    /// Dump the log buffer
    #[command(after_help = "\
Examples:
  acrd logcat                           # Whole buffer
  acrd logcat -- -t 200 '*:E'           # Last 200 lines, errors only")]
    Logcat(LogcatArgs),

    /// Print the kernel log (may need root)
    Dmesg(DmesgArgs),

    /// Flash an image with the tool matching the device mode
    #[command(after_help = "\
The device is quarried first:
  fastboot / fastbootd   fastboot flash <partition> <file>
  download               heimdall flash --<PARTITION> <file>
  adb, edl               refused

Examples:
  acrd flash boot boot.img              # Bootloader
  acrd flash RECOVERY twrp.img          # Samsung download mode (PIT name)")]
    Flash(FlashArgs),

    /// Boot an image without flashing it (bootloader only)
    Boot(BootArgs),

    /// Print the partition table of a device in download mode
    Pit,

    /// Identify the device and run mode-specific health checks
    Diagnose(DiagnoseArgs),

    /// Ask the configured advisor about a failure
    #[command(after_help = "\
Examples:
  acrd advise fastboot \"FAILED (remote: 'not allowed')\" \"flash boot\"")]
    Advise(AdviseArgs),
}

/// Device selection shared by commands that talk to one device.
#[derive(Debug, Clone, clap::Args)]
pub struct TargetArgs {
    /// Use the device with this serial instead of prompting
    #[arg(short, long)]
    pub serial: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct QuarryArgs {
    /// Print the profile as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct DevicesArgs {
    /// Print the candidates as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct GetpropArgs {
    /// Property name (e.g., ro.product.model)
    pub key: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct GetvarArgs {
    /// Variable name (e.g., product, unlocked, all)
    pub name: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct ShellArgs {
    /// Command and arguments to run on the device
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct PullArgs {
    /// Path on the device
    pub remote: String,

    /// Local destination
    pub local: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct PushArgs {
    /// Local file
    pub local: PathBuf,

    /// Destination on the device
    pub remote: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct InstallArgs {
    /// APK to install
    pub apk: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct LogcatArgs {
    /// Extra logcat options (after --)
    #[arg(last = true)]
    pub options: Vec<String>,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct DmesgArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct FlashArgs {
    /// Partition name (fastboot name, or PIT name in download mode)
    pub partition: String,

    /// Image file to write
    pub file: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct BootArgs {
    /// Image file to boot
    pub image: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct DiagnoseArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, clap::Args)]
pub struct AdviseArgs {
    /// Tool that failed (adb, fastboot, heimdall)
    pub tool: String,

    /// Error text it printed
    pub error: String,

    /// What was being attempted
    pub task: String,
}
