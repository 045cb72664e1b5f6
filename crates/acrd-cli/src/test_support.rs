//! Fake device tools for tests.
//!
//! Tools are small `/bin/sh` scripts written into a private temp directory.
//! Each script appends its argument vector to `calls.log` next to it, so tests
//! can assert what was (or was not) invoked.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DIR: AtomicU64 = AtomicU64::new(0);

/// Temp directory removed on drop.
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new(label: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "acrd-{}-{}-{}",
            label,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        Self(dir)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// A path inside the directory that does not exist.
    pub fn missing(&self, name: &str) -> PathBuf {
        self.0.join(format!("missing-{}", name))
    }

    /// Lines of `calls.log`, one per tool invocation.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.0.join("calls.log"))
            .map(|log| log.lines().map(String::from).collect())
            .unwrap_or_default()
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Write an executable shell script named `name` running `body`.
#[cfg(unix)]
pub fn write_tool(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join(name);
    let script = format!(
        "#!/bin/sh\necho \"{} $*\" >> \"${{0%/*}}/calls.log\"\n{}\n",
        name, body
    );
    std::fs::write(&path, script).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake tool");
    path
}
