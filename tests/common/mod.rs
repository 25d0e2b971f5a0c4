//! Shared test infrastructure for integration tests.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// A throwaway git repository driven through the compiled binary.
pub struct ScratchRepo {
    _temp: TempDir,
    pub root: PathBuf,
}

/// Captured result of one binary invocation.
pub struct RunResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ScratchRepo {
    pub fn init() -> anyhow::Result<Self> {
        let temp = TempDir::new()?;
        let root = temp.path().join("repo");
        std::fs::create_dir_all(&root)?;
        let repo = Self { _temp: temp, root };
        repo.git(&["init", "-b", "main"])?;
        repo.git(&["config", "user.name", "Seed Author"])?;
        repo.git(&["config", "user.email", "seed@example.com"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn git(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            anyhow::bail!(
                "git {args:?} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> anyhow::Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn remove_file(&self, rel: &str) -> anyhow::Result<()> {
        std::fs::remove_file(self.root.join(rel))?;
        Ok(())
    }

    pub fn commit_all(&self, subject: &str) -> anyhow::Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-m", subject])?;
        Ok(())
    }

    /// Run the compiled `recommit` binary inside the scratch repo.
    pub fn recommit(&self, args: &[&str]) -> anyhow::Result<RunResult> {
        let output = Command::new(env!("CARGO_BIN_EXE_recommit"))
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()?;
        Ok(RunResult {
            ok: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Check if git is available; skip test if not.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}
