//! Blueprint replay against the real repository.
//!
//! Replay executes the plan verbatim: it re-derives nothing, so a replayed
//! history can always be traced back to the blueprint that produced it.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::blueprint::{Blueprint, PlannedCommit};
use crate::config::Identity;
use crate::git::GitSession;
use crate::history::{OpKind, Operation};

#[derive(Serialize, Debug)]
pub struct ApplySummary {
    pub rewritten_branch: String,
    pub target_branch: String,
    pub generated_commits: usize,
    pub target_head: String,
}

/// Rebuild the configured target branch from the blueprint.
pub fn run(session: &GitSession, blueprint: &Blueprint) -> Result<ApplySummary> {
    session.ensure_clean_worktree()?;
    let config = &blueprint.config;

    let existing = session.read(&["branch", "--list", &config.rewrite_branch])?;
    if !existing.trim().is_empty() {
        session.exec(&["branch", "-D", &config.rewrite_branch])?;
    }

    session.exec(&["checkout", "--orphan", &config.rewrite_branch])?;
    // Empty worktree and index; nothing to remove is fine on a fresh orphan.
    session.run(&["rm", "-rf", ".", "--ignore-unmatch"])?;

    let mut last_rewritten: BTreeMap<&str, String> = BTreeMap::new();
    for commit in &blueprint.commits {
        for operation in &commit.operations {
            stage_operation(session, &commit.source_commit, operation)?;
        }
        if !index_has_changes(session)? {
            return Err(anyhow!(
                "no staged changes for generated commit #{}",
                commit.index
            ));
        }
        commit_planned(session, &config.identity, commit)?;
        let head = session.read(&["rev-parse", "HEAD"])?;
        last_rewritten.insert(commit.source_commit.as_str(), head.trim().to_string());
    }
    tracing::info!(
        commits = blueprint.commits.len(),
        branch = config.rewrite_branch.as_str(),
        "replayed blueprint"
    );

    for (tag_name, source_commit) in &blueprint.tag_targets {
        // Tags for sources outside this plan are skipped, not failed.
        let Some(new_hash) = last_rewritten.get(source_commit.as_str()) else {
            continue;
        };
        session.exec(&["tag", "-f", tag_name, new_hash])?;
    }

    session.exec(&["checkout", &config.target_branch])?;
    session.exec(&["reset", "--hard", &config.rewrite_branch])?;

    let target_head = session.read(&["rev-parse", "HEAD"])?.trim().to_string();
    Ok(ApplySummary {
        rewritten_branch: config.rewrite_branch.clone(),
        target_branch: config.target_branch.clone(),
        generated_commits: blueprint.commits.len(),
        target_head,
    })
}

fn stage_operation(session: &GitSession, source_commit: &str, operation: &Operation) -> Result<()> {
    match operation.kind {
        OpKind::Added | OpKind::Modified | OpKind::TypeChanged | OpKind::Copied => {
            let path = content_path(operation)?;
            session.exec(&["checkout", source_commit, "--", path])
        }
        OpKind::Deleted => {
            let path = content_path(operation)?;
            session.run(&["rm", "-f", "--ignore-unmatch", "--", path])?;
            Ok(())
        }
        OpKind::Renamed => {
            let old_path = operation
                .old_path
                .as_deref()
                .ok_or_else(|| anyhow!("rename operation missing old_path"))?;
            let new_path = operation
                .new_path
                .as_deref()
                .ok_or_else(|| anyhow!("rename operation missing new_path"))?;
            session.run(&["rm", "-f", "--ignore-unmatch", "--", old_path])?;
            session.exec(&["checkout", source_commit, "--", new_path])
        }
    }
}

/// The path whose content must be materialized: `path` for simple kinds,
/// `new_path` for copies.
fn content_path(operation: &Operation) -> Result<&str> {
    operation
        .path
        .as_deref()
        .or(operation.new_path.as_deref())
        .ok_or_else(|| anyhow!("operation carries no usable path: {operation:?}"))
}

fn commit_planned(session: &GitSession, identity: &Identity, commit: &PlannedCommit) -> Result<()> {
    let env = [
        ("GIT_AUTHOR_NAME", identity.name.as_str()),
        ("GIT_AUTHOR_EMAIL", identity.email.as_str()),
        ("GIT_COMMITTER_NAME", identity.name.as_str()),
        ("GIT_COMMITTER_EMAIL", identity.email.as_str()),
        ("GIT_AUTHOR_DATE", commit.author_date.as_str()),
        ("GIT_COMMITTER_DATE", commit.committer_date.as_str()),
    ];
    session.exec_with_env(&["commit", "-m", &commit.message, "--no-gpg-sign"], &env)
}

fn index_has_changes(session: &GitSession) -> Result<bool> {
    let output = session.run(&["diff", "--cached", "--quiet"])?;
    Ok(!output.status.success())
}
