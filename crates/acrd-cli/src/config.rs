//! Tool path and timeout resolution.
//!
//! Priority for each tool path:
//! 1. Command-line flag (`--adb`, `--fastboot`, `--heimdall`)
//! 2. Environment variable (`ACRD_ADB`, `ACRD_FASTBOOT`, `ACRD_HEIMDALL`)
//! 3. The bundled copy under the tools directory, if present
//! 4. A match on `PATH`
//! 5. The bundled path anyway, so the failure names where we looked
//!
//! The tools directory is `ACRD_TOOLS_DIR`, else `~/.acrd/tools`, else
//! `./tools`. Bundled layout:
//!
//! ```text
//! tools/adb/platform-tools/adb
//! tools/fastboot/platform-tools/fastboot
//! tools/heimdall/heimdall
//! ```

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Explicit tool paths given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ToolOverrides {
    pub adb: Option<PathBuf>,
    pub fastboot: Option<PathBuf>,
    pub heimdall: Option<PathBuf>,
}

/// Resolved locations of the device tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub adb: PathBuf,
    pub fastboot: PathBuf,
    pub heimdall: PathBuf,
}

impl ToolPaths {
    pub fn resolve(overrides: &ToolOverrides) -> Self {
        Self::resolve_in(overrides, env::var_os("PATH").as_deref())
    }

    /// Resolve against an explicit `PATH`-style search list.
    fn resolve_in(overrides: &ToolOverrides, search: Option<&OsStr>) -> Self {
        Self {
            adb: resolve_tool(
                overrides.adb.as_deref(),
                "ACRD_ADB",
                "adb",
                &["adb", "platform-tools"],
                search,
            ),
            fastboot: resolve_tool(
                overrides.fastboot.as_deref(),
                "ACRD_FASTBOOT",
                "fastboot",
                &["fastboot", "platform-tools"],
                search,
            ),
            heimdall: resolve_tool(
                overrides.heimdall.as_deref(),
                "ACRD_HEIMDALL",
                "heimdall",
                &["heimdall"],
                search,
            ),
        }
    }
}

fn resolve_tool(
    flag: Option<&Path>,
    var: &str,
    name: &str,
    bundled_dirs: &[&str],
    search: Option<&OsStr>,
) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }

    if let Some(path) = env_path(var) {
        return path;
    }

    let bundled = bundled_dirs
        .iter()
        .fold(tools_dir(), |dir, part| dir.join(part))
        .join(executable_name(name));
    if bundled.is_file() {
        return bundled;
    }

    if let Some(search) = search {
        let cwd = env::current_dir().unwrap_or_default();
        match which::which_in(name, Some(search), cwd) {
            Ok(found) => {
                tracing::debug!("Using {} from PATH: {}", name, found.display());
                return found;
            }
            Err(e) => tracing::debug!("{} not on PATH: {}", name, e),
        }
    }

    bundled
}

/// Read a path from the environment, ignoring empty values.
fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn executable_name(name: &str) -> String {
    format!("{}{}", name, env::consts::EXE_SUFFIX)
}

/// Directory holding bundled tool copies.
pub fn tools_dir() -> PathBuf {
    if let Some(dir) = env_path("ACRD_TOOLS_DIR") {
        return dir;
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".acrd").join("tools");
    }

    PathBuf::from("tools")
}

/// External advisor command: the flag if given, else `ACRD_ADVISOR_CMD`.
pub fn advisor_command(flag: Option<&Path>) -> Option<PathBuf> {
    flag.map(Path::to_path_buf)
        .or_else(|| env_path("ACRD_ADVISOR_CMD"))
}

/// Seconds from the command line; `0` disables the deadline.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use super::*;

    const TOOL_VARS: &[&str] = &[
        "ACRD_ADB",
        "ACRD_FASTBOOT",
        "ACRD_HEIMDALL",
        "ACRD_TOOLS_DIR",
        "ACRD_ADVISOR_CMD",
    ];

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Clears the `ACRD_*` variables for one test and restores them on drop.
    ///
    /// Every test that touches the environment holds one of these, so env
    /// writes never race.
    struct ScopedEnv {
        saved: Vec<(&'static str, Option<OsString>)>,
        _lock: MutexGuard<'static, ()>,
    }

    impl ScopedEnv {
        fn clean() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let saved = TOOL_VARS.iter().map(|&var| (var, env::var_os(var))).collect();
            let scoped = Self { saved, _lock: lock };
            for var in TOOL_VARS {
                scoped.unset(var);
            }
            scoped
        }

        fn set(&self, var: &str, value: impl AsRef<OsStr>) {
            // SAFETY: `_lock` is held, no other test thread touches the environment.
            unsafe { env::set_var(var, value) }
        }

        fn unset(&self, var: &str) {
            // SAFETY: `_lock` is held, no other test thread touches the environment.
            unsafe { env::remove_var(var) }
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            for (var, value) in &self.saved {
                match value {
                    Some(value) => self.set(var, value),
                    None => self.unset(var),
                }
            }
        }
    }

    fn resolve_with(search: Option<&OsStr>) -> ToolPaths {
        ToolPaths::resolve_in(&ToolOverrides::default(), search)
    }

    #[test]
    fn test_flag_beats_env() {
        let env = ScopedEnv::clean();
        env.set("ACRD_ADB", "/from/env/adb");

        let overrides = ToolOverrides {
            adb: Some(PathBuf::from("/from/flag/adb")),
            ..Default::default()
        };
        assert_eq!(
            ToolPaths::resolve(&overrides).adb,
            PathBuf::from("/from/flag/adb")
        );
    }

    #[test]
    fn test_env_beats_tools_dir() {
        let env = ScopedEnv::clean();
        env.set("ACRD_FASTBOOT", "/from/env/fastboot");
        env.set("ACRD_TOOLS_DIR", "/opt/acrd-tools");

        assert_eq!(resolve_with(None).fastboot, PathBuf::from("/from/env/fastboot"));
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let env = ScopedEnv::clean();
        env.set("ACRD_HEIMDALL", "");
        env.set("ACRD_TOOLS_DIR", "/nonexistent/acrd-tools");

        assert_eq!(
            resolve_with(None).heimdall,
            PathBuf::from("/nonexistent/acrd-tools/heimdall").join(executable_name("heimdall"))
        );
    }

    #[test]
    fn test_missing_tool_falls_back_to_bundled_path() {
        let env = ScopedEnv::clean();
        env.set("ACRD_TOOLS_DIR", "/nonexistent/acrd-tools");

        let paths = resolve_with(Some(OsStr::new("/nonexistent/bin")));
        assert_eq!(
            paths.adb,
            PathBuf::from("/nonexistent/acrd-tools/adb/platform-tools").join(executable_name("adb"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_bundled_copy_beats_path() {
        use crate::test_support::{write_tool, TempDir};

        let env = ScopedEnv::clean();
        let tools = TempDir::new("config-bundled");
        let bin = TempDir::new("config-path");
        let bundled_dir = tools.path().join("fastboot").join("platform-tools");
        std::fs::create_dir_all(&bundled_dir).unwrap();
        std::fs::write(bundled_dir.join("fastboot"), "").unwrap();
        write_tool(&bin, "fastboot", "true");
        env.set("ACRD_TOOLS_DIR", tools.path());

        let paths = resolve_with(Some(bin.path().as_os_str()));
        assert_eq!(paths.fastboot, bundled_dir.join("fastboot"));
    }

    #[cfg(unix)]
    #[test]
    fn test_path_search() {
        use crate::test_support::{write_tool, TempDir};

        let env = ScopedEnv::clean();
        env.set("ACRD_TOOLS_DIR", "/nonexistent/acrd-tools");
        let bin = TempDir::new("config-search");
        let adb = write_tool(&bin, "adb", "true");

        let search = env::join_paths([Path::new("/nonexistent/bin"), bin.path()]).unwrap();
        assert_eq!(resolve_with(Some(search.as_os_str())).adb, adb);
    }

    #[cfg(unix)]
    #[test]
    fn test_path_search_skips_non_executable_match() {
        use std::os::unix::fs::PermissionsExt;

        use crate::test_support::{write_tool, TempDir};

        let env = ScopedEnv::clean();
        env.set("ACRD_TOOLS_DIR", "/nonexistent/acrd-tools");
        let shadow = TempDir::new("config-shadow");
        let plain = shadow.path().join("adb");
        std::fs::write(&plain, "not a program").unwrap();
        std::fs::set_permissions(&plain, std::fs::Permissions::from_mode(0o644)).unwrap();
        let bin = TempDir::new("config-real");
        let adb = write_tool(&bin, "adb", "true");

        let search = env::join_paths([shadow.path(), bin.path()]).unwrap();
        assert_eq!(resolve_with(Some(search.as_os_str())).adb, adb);
    }

    #[test]
    fn test_tools_dir_home_fallback() {
        let _env = ScopedEnv::clean();

        let dir = tools_dir();
        assert!(dir.ends_with(".acrd/tools") || dir == PathBuf::from("tools"));
    }

    #[test]
    fn test_advisor_command_precedence() {
        let env = ScopedEnv::clean();
        assert_eq!(advisor_command(None), None);

        env.set("ACRD_ADVISOR_CMD", "/usr/local/bin/advise");
        assert_eq!(
            advisor_command(Some(Path::new("/opt/advise"))),
            Some(PathBuf::from("/opt/advise"))
        );
        assert_eq!(
            advisor_command(None),
            Some(PathBuf::from("/usr/local/bin/advise"))
        );
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        assert_eq!(timeout_from_secs(0), None);
        assert_eq!(timeout_from_secs(30), Some(Duration::from_secs(30)));
    }
}
