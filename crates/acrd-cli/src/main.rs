//! acrd CLI entry point.

mod actions;
mod advisor;
mod args;
mod config;
mod quarry;
mod tools;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use acrd_core::advice::failure_prompt;
use acrd_core::device::{CandidateDevice, CandidateMode, DeviceProfile};
use acrd_core::error::{ErrorReport, QuarryError, ToolFailure};
use anyhow::Context;
use clap::Parser;
use tracing::{error, warn};

use crate::actions::Diagnosis;
use crate::advisor::{ConfiguredAdvisor, ErrorAdvisor};
use crate::args::{Cli, Commands, TargetArgs};
use crate::config::{advisor_command, timeout_from_secs, ToolPaths};
use crate::quarry::{Advice, LinePicker, Quarry};
use crate::tools::{AdbWrapper, FastbootWrapper, ProcessInvoker};

fn main() {
    let cli = Cli::parse();

    let level = if cli.global.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let json = wants_json(&cli.command);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(cli));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_background();

    if let Err(e) = result {
        let report = error_report(&e);
        if json {
            match serde_json::to_string_pretty(&report) {
                Ok(body) => println!("{}", body),
                Err(_) => error!("{}", report),
            }
        } else {
            error!("{}", report);
        }
        std::process::exit(1);
    }
}

fn wants_json(command: &Commands) -> bool {
    match command {
        Commands::Quarry(args) => args.json,
        Commands::Devices(args) => args.json,
        Commands::Diagnose(args) => args.json,
        _ => false,
    }
}

/// Map an application error onto the machine-readable taxonomy.
fn error_report(err: &anyhow::Error) -> ErrorReport {
    if let Some(quarry) = err.downcast_ref::<QuarryError>() {
        return quarry.report();
    }
    if let Some(failure) = err.downcast_ref::<ToolFailure>() {
        let mut report = ErrorReport::from(failure.clone());
        report.message = format!("{:#}", err);
        return report;
    }
    ErrorReport::internal(format!("{:#}", err))
}

/// Everything a command needs, resolved once from flags and environment.
struct Session {
    paths: ToolPaths,
    invoker: ProcessInvoker,
    advisor: ConfiguredAdvisor,
    prompt_timeout: Option<Duration>,
}

impl Session {
    fn from_cli(cli: &Cli) -> Self {
        let invoker = ProcessInvoker::new(timeout_from_secs(cli.global.tool_timeout));
        let paths = ToolPaths::resolve(&cli.global.tool_overrides());
        let advisor = ConfiguredAdvisor::from_command(
            advisor_command(cli.global.advisor.as_deref()),
            invoker,
        );
        tracing::debug!("Tool paths: {:?}", paths);

        Self {
            paths,
            invoker,
            advisor,
            prompt_timeout: timeout_from_secs(cli.global.prompt_timeout),
        }
    }

    async fn quarry(&self, target: &TargetArgs) -> Result<DeviceProfile, QuarryError> {
        let mut quarry = Quarry::new(
            self.paths.clone(),
            self.invoker,
            self.advisor.clone(),
            LinePicker::stdio(self.prompt_timeout),
        )
        .with_serial(target.serial.clone());

        let result = quarry.run().await;
        print_advice(quarry.advice());
        result
    }

    /// Enumerate and pick one device reachable in `mode`.
    async fn select(
        &self,
        target: &TargetArgs,
        mode: CandidateMode,
    ) -> Result<CandidateDevice, QuarryError> {
        let candidates: Vec<CandidateDevice> = quarry::enumerate(&self.paths, self.invoker)
            .await
            .into_iter()
            .filter(|candidate| candidate.mode == mode)
            .collect();
        let mut picker = LinePicker::stdio(self.prompt_timeout);
        quarry::select::choose(&mut picker, candidates, target.serial.as_deref()).await
    }

    async fn adb(&self, target: &TargetArgs) -> anyhow::Result<AdbWrapper> {
        let device = self.select(target, CandidateMode::Adb).await?;
        Ok(AdbWrapper::new(&self.paths.adb, self.invoker, Some(device.serial))?)
    }

    async fn fastboot(&self, target: &TargetArgs) -> anyhow::Result<FastbootWrapper> {
        let device = self.select(target, CandidateMode::Fastboot).await?;
        Ok(FastbootWrapper::new(&self.paths.fastboot, self.invoker, Some(device.serial))?)
    }

    /// Print the advisor's take on a failed operation, then hand the error back.
    async fn advise_on(&self, tool: &str, err: anyhow::Error, task: &str) -> anyhow::Error {
        let prompt = failure_prompt(tool, &format!("{:#}", err), task);
        match self.advisor.suggest(&prompt).await {
            Ok(suggestion) => print_advice(&[Advice {
                tool: tool.to_string(),
                error: err.to_string(),
                suggestion,
            }]),
            Err(e) => warn!("Error advisor failed: {:#}", e),
        }
        err
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let session = Session::from_cli(&cli);

    match cli.command {
        Commands::Quarry(args) => {
            let profile = session.quarry(&args.target).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                print_profile(&profile);
            }
        }
        Commands::Devices(args) => {
            let candidates = quarry::enumerate(&session.paths, session.invoker).await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&candidates)?);
            } else if candidates.is_empty() {
                eprintln!("No adb or fastboot devices attached");
            } else {
                for candidate in &candidates {
                    println!("{}\t{}", candidate.serial, candidate.mode);
                }
            }
        }
        Commands::Getprop(args) => {
            let adb = session.adb(&args.target).await?;
            println!("{}", adb.try_get_prop(&args.key).await?);
        }
        Commands::Getvar(args) => {
            let fastboot = session.fastboot(&args.target).await?;
            println!("{}", fastboot.try_getvar(&args.name).await?);
        }
        Commands::Shell(args) => {
            let adb = session.adb(&args.target).await?;
            let command = args.command.join(" ");
            let serial = adb.serial().unwrap_or("the device").to_string();
            let output = adb
                .shell(&command)
                .await
                .with_context(|| format!("adb could not reach {}", serial))?;
            println!("{}", output);
        }
        Commands::Pull(args) => {
            let adb = session.adb(&args.target).await?;
            println!("{}", adb.pull(&args.remote, &args.local).await?);
        }
        Commands::Push(args) => {
            let adb = session.adb(&args.target).await?;
            println!("{}", adb.push(&args.local, &args.remote).await?);
        }
        Commands::Install(args) => {
            let adb = session.adb(&args.target).await?;
            println!("{}", adb.install(&args.apk).await?);
        }
        Commands::Logcat(args) => {
            let adb = session.adb(&args.target).await?;
            println!("{}", adb.logcat(&args.options).await?);
        }
        Commands::Dmesg(args) => {
            let adb = session.adb(&args.target).await?;
            let output = adb.dmesg().await.context("adb could not reach the device")?;
            println!("{}", output);
        }
        Commands::Flash(args) => {
            let profile = session.quarry(&args.target).await?;
            let tool = actions::flash_tool(profile.boot_mode).unwrap_or("acrd");
            let task = format!("flash {} to partition {}", args.file.display(), args.partition);
            if let Err(e) = actions::flash(
                &profile,
                &session.paths,
                session.invoker,
                &args.partition,
                &args.file,
            )
            .await
            {
                return Err(session.advise_on(tool, e, &task).await);
            }
            println!("Flashed {} on {}", args.partition, profile.summary());
        }
        Commands::Boot(args) => {
            let profile = session.quarry(&args.target).await?;
            let task = format!("boot {}", args.image.display());
            if let Err(e) =
                actions::boot(&profile, &session.paths, session.invoker, &args.image).await
            {
                return Err(session.advise_on("fastboot", e, &task).await);
            }
            println!("Booted {} on {}", args.image.display(), profile.summary());
        }
        Commands::Pit => {
            println!("{}", actions::print_pit(&session.paths, session.invoker).await?);
        }
        Commands::Diagnose(args) => {
            let profile = session.quarry(&args.target).await?;
            let diagnosis = actions::diagnose(profile, &session.paths, session.invoker).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&diagnosis)?);
            } else {
                print_diagnosis(&diagnosis);
            }
        }
        Commands::Advise(args) => {
            let prompt = failure_prompt(&args.tool, &args.error, &args.task);
            println!("{}", session.advisor.suggest(&prompt).await?);
        }
    }

    Ok(())
}

fn print_profile(profile: &DeviceProfile) {
    let unknown = "-";
    println!("Model:          {}", profile.model);
    println!("Brand:          {}", profile.brand);
    println!("Android:        {}", profile.os_version.as_deref().unwrap_or(unknown));
    println!("Firmware:       {}", profile.firmware.as_deref().unwrap_or(unknown));
    println!("Security patch: {}", profile.security_patch.as_deref().unwrap_or(unknown));
    println!("Boot mode:      {}", profile.boot_mode);
    println!("Serial:         {}", profile.serial.as_deref().unwrap_or(unknown));
}

fn print_diagnosis(diagnosis: &Diagnosis) {
    println!("{}", diagnosis.profile.summary());
    for check in &diagnosis.checks {
        println!("  [{}] {}: {}", check.status, check.name, check.detail);
    }
}

/// Advice goes to stderr so `--json` output stays parseable.
fn print_advice(advice: &[Advice]) {
    for item in advice {
        eprintln!("hint ({}): {}", item.tool, item.suggestion);
    }
}
