//! Explicit git session handle.
//!
//! All subprocess access to the repository goes through one `GitSession`
//! passed down from the command layer, so nothing reads ambient global
//! state and the planning core can run against a fake provider instead.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub struct GitSession {
    git: PathBuf,
    repo_root: PathBuf,
}

impl GitSession {
    /// Open a session rooted at the repository containing the current
    /// working directory.
    pub fn open() -> Result<Self> {
        let git = which::which("git").context("locate git executable")?;
        let probe = Command::new(&git)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .context("run git rev-parse --show-toplevel")?;
        if !probe.status.success() {
            return Err(anyhow!(
                "not inside a git repository: {}",
                String::from_utf8_lossy(&probe.stderr).trim()
            ));
        }
        let repo_root = PathBuf::from(String::from_utf8_lossy(&probe.stdout).trim());
        Ok(Self { git, repo_root })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Resolve a CLI-supplied path against the repository root.
    pub fn workspace_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    /// Run git with the given args, returning the raw output regardless of
    /// exit status.
    pub fn run(&self, args: &[&str]) -> Result<Output> {
        self.run_with_env(args, &[])
    }

    pub fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
        let mut command = Command::new(&self.git);
        command.args(args).current_dir(&self.repo_root);
        for (key, value) in env {
            command.env(key, value);
        }
        command
            .output()
            .with_context(|| format!("run git {}", args.join(" ")))
    }

    /// Run git and require success, returning stdout as text.
    pub fn read(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        self.require_success(args, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a mutating git command and require success.
    pub fn exec(&self, args: &[&str]) -> Result<()> {
        let output = self.run(args)?;
        self.require_success(args, &output)
    }

    pub fn exec_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<()> {
        let output = self.run_with_env(args, env)?;
        self.require_success(args, &output)
    }

    /// Refuse to continue with uncommitted local changes.
    pub fn ensure_clean_worktree(&self) -> Result<()> {
        let status = self.read(&["status", "--porcelain"])?;
        if !status.trim().is_empty() {
            return Err(anyhow!(
                "working tree is not clean; commit or stash changes before rewriting"
            ));
        }
        Ok(())
    }

    fn require_success(&self, args: &[&str], output: &Output) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }
        Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}
