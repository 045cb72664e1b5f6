//! Error advisors.
//!
//! An advisor turns a failure description into remediation text for the
//! technician. It is only consulted when a backend fails and its answer never
//! changes what the quarry does next.

use std::path::PathBuf;
use std::time::Duration;

use acrd_core::advice::{truncate_prompt, MAX_PROMPT_LEN};
use acrd_core::error::ToolFailure;
use acrd_core::parse::strip_code_fences;
use anyhow::{anyhow, bail, Context};
use tracing::{debug, warn};

use crate::tools::{ProcessInvoker, ToolWrapper};

/// Source of remediation suggestions.
///
/// The returned future is not `Send`. Await it on the calling task (the
/// binary drives everything through `Runtime::block_on`), never through
/// `tokio::spawn`.
pub trait ErrorAdvisor {
    async fn suggest(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Keyword rules checked in order; the first match wins.
const RULES: &[(&[&str], &str)] = &[
    (
        &["unauthorized"],
        "Unlock the screen, accept the \"Allow USB debugging\" dialog and retry. If no dialog appears, revoke USB debugging authorisations in Developer options and reconnect.",
    ),
    (
        &["no permissions", "insufficient permissions", "permission denied"],
        "The current user cannot open the USB device. Install the Android udev rules (or add a rule for the device's vendor id), replug the cable and retry.",
    ),
    (
        &["tool not found", "no such file"],
        "Install the Android platform-tools (adb, fastboot) or heimdall, or point acrd at them with --adb/--fastboot/--heimdall or ACRD_TOOLS_DIR.",
    ),
    (
        &["did not finish within", "timed out", "timeout"],
        "The USB transport stopped answering. Replug the device, try another port or cable, and raise --tool-timeout for slow operations.",
    ),
    (
        &["offline"],
        "adb sees the device but it is offline. Restart the server with 'adb kill-server', replug the device and accept the debugging prompt.",
    ),
    (
        &["failed to detect", "libusb", "claim interface"],
        "heimdall could not claim the device. Close Samsung Kies/Smart Switch, make sure the device shows the download-mode screen and retry as a user with USB access.",
    ),
    (
        &["failed (remote", "not allowed", "locked"],
        "The bootloader refused the command. Check that the bootloader is unlocked ('acrd getvar unlocked') and that the partition name is correct.",
    ),
    (
        &["empty", "did not report"],
        "The device answered without identifying itself. Wait until it has finished booting, then retry.",
    ),
];

const FALLBACK: &str = "Check the cable, the USB port and the device state, then retry. Re-run with -v to see the exact tool invocations.";

/// Rule-table advisor that works without any external service.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAdvisor;

impl OfflineAdvisor {
    pub fn advise(prompt: &str) -> &'static str {
        let haystack = prompt.to_lowercase();
        RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|keyword| haystack.contains(keyword)))
            .map(|(_, advice)| *advice)
            .unwrap_or(FALLBACK)
    }
}

impl ErrorAdvisor for OfflineAdvisor {
    async fn suggest(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(Self::advise(prompt).to_string())
    }
}

/// Advisor backed by an operator-configured command.
///
/// The command receives the prompt as its only argument and answers on
/// stdout. Failed or empty answers are retried with exponential backoff.
#[derive(Debug, Clone)]
pub struct CommandAdvisor {
    tool: ToolWrapper,
    attempts: u32,
    backoff: Duration,
}

impl CommandAdvisor {
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

    pub fn new(path: impl Into<PathBuf>, invoker: ProcessInvoker) -> Result<Self, ToolFailure> {
        Ok(Self {
            tool: ToolWrapper::new(path, invoker)?,
            attempts: Self::DEFAULT_ATTEMPTS,
            backoff: Self::DEFAULT_BACKOFF,
        })
    }

    async fn ask(&self, prompt: &str) -> anyhow::Result<String> {
        let invocation = self.tool.run(&[prompt]).await?;
        let reply = strip_code_fences(&invocation.stdout);
        if reply.is_empty() {
            bail!("{} returned an empty reply", self.tool.path().display());
        }
        Ok(reply)
    }
}

impl ErrorAdvisor for CommandAdvisor {
    async fn suggest(&self, prompt: &str) -> anyhow::Result<String> {
        let prompt = truncate_prompt(prompt, MAX_PROMPT_LEN);
        let mut delay = self.backoff;
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            match self.ask(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    debug!("Advisor attempt {}/{} failed: {:#}", attempt, self.attempts, e);
                    last_error = Some(e);
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("advisor was never asked")))
            .with_context(|| format!("advisor gave no answer after {} attempts", self.attempts))
    }
}

/// The advisor selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredAdvisor {
    Offline(OfflineAdvisor),
    Command(CommandAdvisor),
}

impl ConfiguredAdvisor {
    /// Use `command` when it is usable, the rule table otherwise.
    pub fn from_command(command: Option<PathBuf>, invoker: ProcessInvoker) -> Self {
        let Some(command) = command else {
            return Self::Offline(OfflineAdvisor);
        };

        match CommandAdvisor::new(command, invoker) {
            Ok(advisor) => Self::Command(advisor),
            Err(failure) => {
                warn!("Advisor command unusable, using built-in rules: {}", failure);
                Self::Offline(OfflineAdvisor)
            }
        }
    }
}

impl ErrorAdvisor for ConfiguredAdvisor {
    async fn suggest(&self, prompt: &str) -> anyhow::Result<String> {
        match self {
            ConfiguredAdvisor::Offline(advisor) => advisor.suggest(prompt).await,
            ConfiguredAdvisor::Command(advisor) => advisor.suggest(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acrd_core::advice::failure_prompt;

    #[tokio::test]
    async fn test_offline_rules_match_failure_text() {
        let prompt = failure_prompt(
            "adb",
            "adb exited with status 1: error: device unauthorized.",
            "read the device profile",
        );
        let advice = OfflineAdvisor.suggest(&prompt).await.unwrap();
        assert!(advice.contains("USB debugging"));
    }

    #[test]
    fn test_offline_first_rule_wins_and_fallback() {
        assert!(OfflineAdvisor::advise("fastboot did not finish within 30s").contains("--tool-timeout"));
        assert!(OfflineAdvisor::advise("FAILED (remote: 'not allowed in locked state')")
            .contains("unlocked"));
        assert_eq!(OfflineAdvisor::advise("something odd"), FALLBACK);
    }

    #[test]
    fn test_missing_command_falls_back_to_offline() {
        let advisor = ConfiguredAdvisor::from_command(
            Some(PathBuf::from("/nonexistent/acrd-advise")),
            ProcessInvoker::default(),
        );
        assert!(matches!(advisor, ConfiguredAdvisor::Offline(_)));
        assert!(matches!(
            ConfiguredAdvisor::from_command(None, ProcessInvoker::default()),
            ConfiguredAdvisor::Offline(_)
        ));
    }

    #[cfg(unix)]
    mod command {
        use super::*;
        use crate::test_support::{write_tool, TempDir};

        fn advisor(dir: &TempDir, body: &str) -> CommandAdvisor {
            let tool = write_tool(dir, "advise", body);
            let mut advisor = CommandAdvisor::new(tool, ProcessInvoker::default()).unwrap();
            advisor.backoff = Duration::from_millis(1);
            advisor
        }

        #[tokio::test]
        async fn test_reply_is_stripped_of_code_fences() {
            let dir = TempDir::new("advisor-fence");
            let advisor = advisor(&dir, "printf '```text\\nReplug the cable.\\n```\\n'");

            let reply = advisor.suggest("adb failed").await.unwrap();
            assert_eq!(reply, "Replug the cable.");
            assert_eq!(dir.calls(), vec!["advise adb failed"]);
        }

        #[tokio::test]
        async fn test_failures_are_retried() {
            let dir = TempDir::new("advisor-retry");
            let advisor = advisor(&dir, "echo 'service unavailable' >&2; exit 1");

            let err = advisor.suggest("adb failed").await.unwrap_err();
            assert!(format!("{:#}", err).contains("after 3 attempts"));
            assert_eq!(dir.calls().len(), 3);
        }

        #[tokio::test]
        async fn test_empty_reply_is_an_error() {
            let dir = TempDir::new("advisor-empty");
            let advisor = advisor(&dir, "true");

            assert!(advisor.suggest("adb failed").await.is_err());
        }

        #[tokio::test]
        async fn test_long_prompt_is_truncated() {
            let dir = TempDir::new("advisor-long");
            let advisor = advisor(&dir, "printf '%s' \"$1\" | wc -c");

            let reply = advisor.suggest(&"x".repeat(MAX_PROMPT_LEN * 2)).await.unwrap();
            assert_eq!(reply.trim().parse::<usize>().unwrap(), MAX_PROMPT_LEN);
        }
    }
}
