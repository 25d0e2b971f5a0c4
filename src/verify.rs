//! Post-replay verification of the rewritten branch.
//!
//! Reads the rewritten history back from git and asserts it against the
//! blueprint and config: counts, identity, timestamps, message hygiene,
//! tags, and the final tree. Produces a markdown report plus a summary.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::blueprint::Blueprint;
use crate::calendar;
use crate::config::RewriteConfig;
use crate::git::GitSession;

const MAX_REPORTED_ERRORS: usize = 30;

#[derive(Debug, Clone)]
struct CommitRow {
    hash: String,
    author_date: String,
    committer_date: String,
    author_name: String,
    author_email: String,
    committer_name: String,
    committer_email: String,
    subject: String,
}

struct Check {
    name: &'static str,
    passed: bool,
    detail: String,
}

#[derive(Serialize, Debug)]
pub struct VerifySummary {
    pub passed: bool,
    pub report: String,
    pub commit_count: usize,
    pub target_commit_count: usize,
    pub identity_errors: usize,
    pub date_errors: usize,
    pub message_errors: usize,
    pub missing_tags: Vec<String>,
    pub merge_count: usize,
    pub tree_match: bool,
}

/// Run all checks and write the markdown report.
pub fn run(
    session: &GitSession,
    config: &RewriteConfig,
    blueprint: &Blueprint,
    holidays: &BTreeSet<NaiveDate>,
    report_path: &Path,
) -> Result<VerifySummary> {
    let timezone = config.tz()?;
    let business_days: BTreeSet<NaiveDate> =
        calendar::business_days(config.start_date, config.end_date, holidays)?
            .into_iter()
            .collect();

    let rows = collect_commit_rows(session, &config.target_branch)?;
    let commit_count = rows.len();
    let merge_count: usize = session
        .read(&["rev-list", "--count", "--merges", &config.target_branch])?
        .trim()
        .parse()
        .context("parse merge count")?;

    let mut identity_errors = Vec::new();
    let mut date_errors = Vec::new();
    let mut message_errors = Vec::new();
    let forbidden_terms: Vec<String> = config
        .forbidden_message_terms
        .iter()
        .map(|term| term.to_lowercase())
        .collect();

    for row in &rows {
        check_identity(row, config, &mut identity_errors);
        check_dates(row, config, timezone, &business_days, &mut date_errors);
        check_message(row, &forbidden_terms, &mut message_errors);
    }

    let treeish = format!("{}^{{tree}}", config.target_branch);
    let current_tree = session.read(&["rev-parse", &treeish])?.trim().to_string();
    let tree_match = current_tree == blueprint.meta.source_tree;

    let mut missing_tags = Vec::new();
    for tag_name in &config.tag_names {
        let refname = format!("refs/tags/{tag_name}");
        let check = session.run(&["show-ref", "--tags", "--verify", &refname])?;
        if !check.status.success() {
            missing_tags.push(tag_name.clone());
        }
    }

    let checks = [
        Check {
            name: "Commit count",
            passed: commit_count == config.target_commit_count,
            detail: format!(
                "actual={commit_count}, expected={}",
                config.target_commit_count
            ),
        },
        Check {
            name: "No merge commits",
            passed: merge_count == 0,
            detail: format!("merge_count={merge_count}"),
        },
        Check {
            name: "Identity consistency",
            passed: identity_errors.is_empty(),
            detail: format!("identity_errors={}", identity_errors.len()),
        },
        Check {
            name: "Date constraints",
            passed: date_errors.is_empty(),
            detail: format!("date_errors={}", date_errors.len()),
        },
        Check {
            name: "Message constraints",
            passed: message_errors.is_empty(),
            detail: format!("message_errors={}", message_errors.len()),
        },
        Check {
            name: "Tag presence",
            passed: missing_tags.is_empty(),
            detail: format!("missing_tags={missing_tags:?}"),
        },
        Check {
            name: "Final tree consistency",
            passed: tree_match,
            detail: format!(
                "current_tree={current_tree}, expected_tree={}",
                blueprint.meta.source_tree
            ),
        },
    ];
    let passed = checks.iter().all(|check| check.passed);

    write_report(
        report_path,
        config,
        commit_count,
        &checks,
        &identity_errors,
        &date_errors,
        &message_errors,
    )?;

    Ok(VerifySummary {
        passed,
        report: report_path.display().to_string(),
        commit_count,
        target_commit_count: config.target_commit_count,
        identity_errors: identity_errors.len(),
        date_errors: date_errors.len(),
        message_errors: message_errors.len(),
        missing_tags,
        merge_count,
        tree_match,
    })
}

fn collect_commit_rows(session: &GitSession, branch: &str) -> Result<Vec<CommitRow>> {
    let format = "%H|%aI|%cI|%an|%ae|%cn|%ce|%s";
    let format_arg = format!("--format={format}");
    let listing = session.read(&["log", "--reverse", &format_arg, branch])?;
    let mut rows = Vec::new();
    for raw_row in listing.lines() {
        let parts: Vec<&str> = raw_row.splitn(8, '|').collect();
        let [hash, author_date, committer_date, author_name, author_email, committer_name, committer_email, subject] =
            parts.as_slice()
        else {
            continue;
        };
        rows.push(CommitRow {
            hash: hash.to_string(),
            author_date: author_date.to_string(),
            committer_date: committer_date.to_string(),
            author_name: author_name.to_string(),
            author_email: author_email.to_string(),
            committer_name: committer_name.to_string(),
            committer_email: committer_email.to_string(),
            subject: subject.to_string(),
        });
    }
    Ok(rows)
}

fn check_identity(row: &CommitRow, config: &RewriteConfig, errors: &mut Vec<String>) {
    let identity = &config.identity;
    if row.author_name != identity.name || row.author_email != identity.email {
        errors.push(format!("author mismatch on {}", row.hash));
    }
    if row.committer_name != identity.name || row.committer_email != identity.email {
        errors.push(format!("committer mismatch on {}", row.hash));
    }
}

fn check_dates(
    row: &CommitRow,
    config: &RewriteConfig,
    timezone: Tz,
    business_days: &BTreeSet<NaiveDate>,
    errors: &mut Vec<String>,
) {
    let author = match DateTime::parse_from_rfc3339(&row.author_date) {
        Ok(parsed) => parsed,
        Err(err) => {
            errors.push(format!("unparsable author date on {}: {err}", row.hash));
            return;
        }
    };
    let committer = match DateTime::parse_from_rfc3339(&row.committer_date) {
        Ok(parsed) => parsed,
        Err(err) => {
            errors.push(format!("unparsable committer date on {}: {err}", row.hash));
            return;
        }
    };

    if author != committer {
        errors.push(format!("author/committer date mismatch on {}", row.hash));
    }

    let localized = author.with_timezone(&timezone);
    let local_date = localized.date_naive();
    if !business_days.contains(&local_date) {
        errors.push(format!(
            "non-business day date on {}: {local_date}",
            row.hash
        ));
    }
    if matches!(local_date.weekday(), Weekday::Sat | Weekday::Sun) {
        errors.push(format!("weekend date on {}: {local_date}", row.hash));
    }
    if local_date < config.start_date || local_date > config.end_date {
        errors.push(format!("out-of-range date on {}: {local_date}", row.hash));
    }

    // The recorded offset must agree with the configured timezone: the
    // wall-clock rendering may not shift under conversion.
    let recorded_clock = author.format("%Y-%m-%d %H:%M").to_string();
    let localized_clock = localized.format("%Y-%m-%d %H:%M").to_string();
    if recorded_clock != localized_clock {
        errors.push(format!("timezone mismatch on {}", row.hash));
    }
}

fn check_message(row: &CommitRow, forbidden_terms: &[String], errors: &mut Vec<String>) {
    if !row.subject.is_ascii() {
        errors.push(format!("non-ascii subject on {}", row.hash));
    }
    let lowered = row.subject.to_lowercase();
    for term in forbidden_terms {
        if lowered.contains(term) {
            errors.push(format!("forbidden term {term:?} on {}", row.hash));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn write_report(
    report_path: &Path,
    config: &RewriteConfig,
    commit_count: usize,
    checks: &[Check],
    identity_errors: &[String],
    date_errors: &[String],
    message_errors: &[String],
) -> Result<()> {
    let mut lines = vec![
        "# Rewrite Verification Report".to_string(),
        String::new(),
        format!("- Generated: {}", Utc::now().to_rfc3339()),
        format!("- Branch: `{}`", config.target_branch),
        format!("- Commit count: `{commit_count}`"),
        String::new(),
        "## Checks".to_string(),
    ];
    for check in checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        lines.push(format!("- [{status}] {} - {}", check.name, check.detail));
    }
    push_error_section(&mut lines, "Identity Errors", identity_errors);
    push_error_section(&mut lines, "Date Errors", date_errors);
    push_error_section(&mut lines, "Message Errors", message_errors);

    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(report_path, lines.join("\n") + "\n")
        .with_context(|| format!("write report {}", report_path.display()))?;
    Ok(())
}

fn push_error_section(lines: &mut Vec<String>, title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("## {title}"));
    for error in errors.iter().take(MAX_REPORTED_ERRORS) {
        lines.push(format!("- {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(author_date: &str, committer_date: &str) -> CommitRow {
        CommitRow {
            hash: "abc123".to_string(),
            author_date: author_date.to_string(),
            committer_date: committer_date.to_string(),
            author_name: "Dev Author".to_string(),
            author_email: "dev@example.com".to_string(),
            committer_name: "Dev Author".to_string(),
            committer_email: "dev@example.com".to_string(),
            subject: "feat(core): add engine handling".to_string(),
        }
    }

    fn config() -> RewriteConfig {
        serde_json::from_value(serde_json::json!({
            "start_date": "2024-03-04",
            "end_date": "2024-03-08",
            "timezone": "Europe/Berlin",
            "target_commit_count": 5,
            "holidays_file": "rewrite/holidays.json",
            "daily_slots": {"1": ["10:15"]},
            "identity": {"name": "Dev Author", "email": "dev@example.com"},
            "rewrite_branch": "rewrite/replay",
            "target_branch": "main",
            "tag_names": [],
            "forbidden_message_terms": ["wip"]
        }))
        .expect("test config")
    }

    fn business_days(config: &RewriteConfig) -> BTreeSet<NaiveDate> {
        calendar::business_days(config.start_date, config.end_date, &BTreeSet::new())
            .expect("calendar")
            .into_iter()
            .collect()
    }

    #[test]
    fn accepts_a_compliant_commit() {
        let config = config();
        let timezone = config.tz().expect("timezone");
        let days = business_days(&config);
        let mut errors = Vec::new();
        let row = row("2024-03-05T10:12:00+01:00", "2024-03-05T10:12:00+01:00");
        check_dates(&row, &config, timezone, &days, &mut errors);
        assert!(errors.is_empty(), "{errors:?}");

        check_identity(&row, &config, &mut errors);
        assert!(errors.is_empty(), "{errors:?}");

        check_message(&row, &["wip".to_string()], &mut errors);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn flags_author_committer_divergence() {
        let config = config();
        let timezone = config.tz().expect("timezone");
        let days = business_days(&config);
        let mut errors = Vec::new();
        let row = row("2024-03-05T10:12:00+01:00", "2024-03-05T10:13:00+01:00");
        check_dates(&row, &config, timezone, &days, &mut errors);
        assert!(errors
            .iter()
            .any(|error| error.contains("author/committer date mismatch")));
    }

    #[test]
    fn flags_wrong_offset_for_the_timezone() {
        let config = config();
        let timezone = config.tz().expect("timezone");
        let days = business_days(&config);
        let mut errors = Vec::new();
        // Correct instant, wrong recorded offset: the wall clock shifts
        // under conversion to Europe/Berlin.
        let row = row("2024-03-05T10:12:00+03:00", "2024-03-05T10:12:00+03:00");
        check_dates(&row, &config, timezone, &days, &mut errors);
        assert!(errors.iter().any(|error| error.contains("timezone mismatch")));
    }

    #[test]
    fn flags_weekend_and_out_of_range_dates() {
        let config = config();
        let timezone = config.tz().expect("timezone");
        let days = business_days(&config);
        let mut errors = Vec::new();
        // 2024-03-09 is a Saturday outside the configured range.
        let row = row("2024-03-09T10:12:00+01:00", "2024-03-09T10:12:00+01:00");
        check_dates(&row, &config, timezone, &days, &mut errors);
        assert!(errors.iter().any(|error| error.contains("non-business day")));
        assert!(errors.iter().any(|error| error.contains("weekend date")));
        assert!(errors.iter().any(|error| error.contains("out-of-range date")));
    }

    #[test]
    fn flags_forbidden_terms_and_non_ascii() {
        let mut errors = Vec::new();
        let mut bad = row("2024-03-05T10:12:00+01:00", "2024-03-05T10:12:00+01:00");
        bad.subject = "WIP: caf\u{e9} cleanup".to_string();
        check_message(&bad, &["wip".to_string()], &mut errors);
        assert_eq!(errors.len(), 2);
    }
}
