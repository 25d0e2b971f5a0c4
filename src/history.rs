//! Source changeset model and retrieval from the repository.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::git::GitSession;

/// File-level change kind, serialized as the git name-status letter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    #[serde(rename = "A")]
    Added,
    #[serde(rename = "M")]
    Modified,
    #[serde(rename = "D")]
    Deleted,
    #[serde(rename = "T")]
    TypeChanged,
    #[serde(rename = "R")]
    Renamed,
    #[serde(rename = "C")]
    Copied,
}

impl OpKind {
    fn from_status(status: &str) -> Result<Self> {
        match status.as_bytes().first() {
            Some(b'A') => Ok(OpKind::Added),
            Some(b'M') => Ok(OpKind::Modified),
            Some(b'D') => Ok(OpKind::Deleted),
            Some(b'T') => Ok(OpKind::TypeChanged),
            Some(b'R') => Ok(OpKind::Renamed),
            Some(b'C') => Ok(OpKind::Copied),
            _ => Err(anyhow!("unsupported name-status code {status:?}")),
        }
    }

    /// Rename and copy operations carry two paths.
    pub fn is_transfer(self) -> bool {
        matches!(self, OpKind::Renamed | OpKind::Copied)
    }
}

/// One file-level change. Simple kinds carry `path`; renames and copies
/// always carry `old_path` and `new_path` instead.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    pub status: String,
}

impl Operation {
    pub fn simple(kind: OpKind, path: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            kind,
            path: Some(path.into()),
            old_path: None,
            new_path: None,
            status: status.into(),
        }
    }

    pub fn transfer(
        kind: OpKind,
        old_path: impl Into<String>,
        new_path: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: None,
            old_path: Some(old_path.into()),
            new_path: Some(new_path.into()),
            status: status.into(),
        }
    }

    /// Paths touched by this operation, destination first for transfers.
    pub fn touched_paths(&self) -> Vec<&str> {
        match (&self.path, &self.old_path, &self.new_path) {
            (Some(path), _, _) => vec![path.as_str()],
            (None, Some(old_path), Some(new_path)) => vec![new_path.as_str(), old_path.as_str()],
            _ => Vec::new(),
        }
    }
}

/// One source commit: opaque id, subject line, and its flat file diff
/// against the parent (or the empty tree for the root commit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChangeset {
    pub id: String,
    pub subject: String,
    pub operations: Vec<Operation>,
}

impl SourceChangeset {
    /// Operation count; the natural ceiling for how far this changeset can
    /// be expanded.
    pub fn weight(&self) -> usize {
        self.operations.len()
    }
}

/// Parse `git diff-tree --name-status` output into operations.
pub fn parse_name_status(diff_text: &str) -> Result<Vec<Operation>> {
    let mut operations = Vec::new();
    for raw_line in diff_text.lines() {
        if raw_line.trim().is_empty() {
            continue;
        }
        let mut fields = raw_line.split('\t');
        let Some(status) = fields.next() else {
            continue;
        };
        let kind = OpKind::from_status(status)
            .with_context(|| format!("invalid name-status line: {raw_line}"))?;
        if kind.is_transfer() {
            let (Some(old_path), Some(new_path)) = (fields.next(), fields.next()) else {
                return Err(anyhow!("invalid rename/copy line: {raw_line}"));
            };
            operations.push(Operation::transfer(kind, old_path, new_path, status));
        } else {
            let Some(path) = fields.next() else {
                return Err(anyhow!("invalid name-status line: {raw_line}"));
            };
            operations.push(Operation::simple(kind, path, status));
        }
    }
    Ok(operations)
}

/// Read-side history access. The planning core only sees this trait, so
/// tests inject a fake provider and never touch a real repository.
pub trait HistoryProvider {
    /// Non-merge changesets reachable from `source_ref`, oldest first.
    fn changesets(&self, source_ref: &str) -> Result<Vec<SourceChangeset>>;

    /// First-parent ancestor ids of `source_ref`, oldest first.
    fn first_parent_chain(&self, source_ref: &str) -> Result<Vec<String>>;

    /// Commit id a tag currently points at, if the tag exists.
    fn tag_commit(&self, tag_name: &str) -> Result<Option<String>>;

    /// Tree id of `source_ref`.
    fn tree_id(&self, source_ref: &str) -> Result<String>;
}

/// `HistoryProvider` backed by a live git session.
pub struct GitHistoryProvider<'a> {
    session: &'a GitSession,
}

impl<'a> GitHistoryProvider<'a> {
    pub fn new(session: &'a GitSession) -> Self {
        Self { session }
    }
}

impl HistoryProvider for GitHistoryProvider<'_> {
    fn changesets(&self, source_ref: &str) -> Result<Vec<SourceChangeset>> {
        let listing = self
            .session
            .read(&["rev-list", "--reverse", "--no-merges", source_ref])?;
        let mut changesets = Vec::new();
        for id in listing.lines().filter(|line| !line.trim().is_empty()) {
            let subject = self
                .session
                .read(&["show", "-s", "--format=%s", id])?
                .trim()
                .to_string();
            let diff = self.session.read(&[
                "diff-tree",
                "--root",
                "--no-commit-id",
                "--name-status",
                "-r",
                "-M",
                id,
            ])?;
            let mut operations =
                parse_name_status(&diff).with_context(|| format!("parse diff of {id}"))?;
            if operations.is_empty() {
                // Keep empty changesets representable with weight 1.
                operations.push(Operation::simple(OpKind::Modified, ".", "M"));
            }
            changesets.push(SourceChangeset {
                id: id.to_string(),
                subject,
                operations,
            });
        }
        Ok(changesets)
    }

    fn first_parent_chain(&self, source_ref: &str) -> Result<Vec<String>> {
        let listing = self
            .session
            .read(&["rev-list", "--first-parent", "--reverse", source_ref])?;
        Ok(listing
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    fn tag_commit(&self, tag_name: &str) -> Result<Option<String>> {
        let refname = format!("refs/tags/{tag_name}");
        let verify = self
            .session
            .run(&["show-ref", "--tags", "--verify", &refname])?;
        if !verify.status.success() {
            return Ok(None);
        }
        let id = self.session.read(&["rev-list", "-n", "1", tag_name])?;
        Ok(Some(id.trim().to_string()))
    }

    fn tree_id(&self, source_ref: &str) -> Result<String> {
        let treeish = format!("{source_ref}^{{tree}}");
        Ok(self
            .session
            .read(&["rev-parse", &treeish])?
            .trim()
            .to_string())
    }
}
