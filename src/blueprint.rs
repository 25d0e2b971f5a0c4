//! Blueprint document model and assembly.
//!
//! The blueprint is the sole contract with replay: every scheduling and
//! allocation decision is resolved here, and `apply` only executes it.

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::calendar;
use crate::config::RewriteConfig;
use crate::distribute::{allocate_with_caps, split_evenly};
use crate::error::PlanError;
use crate::history::{HistoryProvider, Operation, SourceChangeset};
use crate::message;
use crate::schedule;
use crate::tags;

/// Timestamp rendering used for git author/committer dates.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlueprintMeta {
    pub generated_at: String,
    pub source_ref: String,
    pub source_tree: String,
    pub timezone: String,
    pub target_commit_count: usize,
    pub business_day_count: usize,
    pub base_daily_count: usize,
    pub extra_commit_days: usize,
}

/// Per-source-changeset allocation summary.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SourceSummary {
    pub commit: String,
    pub subject: String,
    pub operation_count: usize,
    pub allocated_commits: usize,
}

/// One fully resolved output commit.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlannedCommit {
    /// 1-based global sequence index.
    pub index: usize,
    pub source_index: usize,
    pub source_commit: String,
    pub source_subject: String,
    /// 1-based group position within the source changeset.
    pub group_index: usize,
    pub group_total: usize,
    pub operations: Vec<Operation>,
    pub author_date: String,
    pub committer_date: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Blueprint {
    pub meta: BlueprintMeta,
    pub config: RewriteConfig,
    pub business_days: Vec<NaiveDate>,
    pub day_commit_counts: Vec<usize>,
    pub source_commits: Vec<SourceSummary>,
    pub tag_targets: BTreeMap<String, String>,
    pub commits: Vec<PlannedCommit>,
}

/// Build the full rewrite plan. Pure apart from provider reads; two runs
/// over the same history and config differ only in `meta.generated_at`.
pub fn build(
    provider: &dyn HistoryProvider,
    config: &RewriteConfig,
    source_ref: &str,
    holidays: &BTreeSet<NaiveDate>,
) -> Result<Blueprint> {
    let timezone = config.tz()?;
    let changesets = provider.changesets(source_ref)?;
    if changesets.is_empty() {
        return Err(anyhow!("no source commits reachable from {source_ref}"));
    }
    let source_tree = provider.tree_id(source_ref)?;

    let target = config.target_commit_count;
    let weights: Vec<usize> = changesets.iter().map(SourceChangeset::weight).collect();
    let allocation = allocate_with_caps(&weights, target)?;

    let mut drafts = Vec::with_capacity(target);
    for (source_index, changeset) in changesets.iter().enumerate() {
        let groups = split_evenly(&changeset.operations, allocation[source_index])?;
        let group_total = groups.len();
        for (offset, operations) in groups.into_iter().enumerate() {
            drafts.push((source_index, offset + 1, group_total, operations));
        }
    }
    if drafts.len() != target {
        return Err(PlanError::BlueprintInconsistent(format!(
            "expanded entry count {} does not match target {target}",
            drafts.len()
        ))
        .into());
    }

    let business_days = calendar::business_days(config.start_date, config.end_date, holidays)?;
    let source_ids: Vec<&str> = drafts
        .iter()
        .map(|(source_index, ..)| changesets[*source_index].id.as_str())
        .collect();
    let schedule =
        schedule::build_schedule(&business_days, &source_ids, &config.daily_slots, timezone)?;

    let mut commits = Vec::with_capacity(target);
    for (position, ((source_index, group_index, group_total, operations), timestamp)) in drafts
        .into_iter()
        .zip(schedule.timestamps.iter())
        .enumerate()
    {
        let changeset = &changesets[source_index];
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let message = message::synthesize(position, &operations);
        commits.push(PlannedCommit {
            index: position + 1,
            source_index,
            source_commit: changeset.id.clone(),
            source_subject: changeset.subject.clone(),
            group_index,
            group_total,
            operations,
            author_date: stamp.clone(),
            committer_date: stamp,
            message,
        });
    }

    let tag_targets = tags::resolve_all(provider, source_ref, &changesets, &config.tag_names)?;

    let source_commits = changesets
        .iter()
        .zip(&allocation)
        .map(|(changeset, &allocated)| SourceSummary {
            commit: changeset.id.clone(),
            subject: changeset.subject.clone(),
            operation_count: changeset.weight(),
            allocated_commits: allocated,
        })
        .collect();

    let blueprint = Blueprint {
        meta: BlueprintMeta {
            generated_at: Utc::now().to_rfc3339(),
            source_ref: source_ref.to_string(),
            source_tree,
            timezone: config.timezone.clone(),
            target_commit_count: target,
            business_day_count: business_days.len(),
            base_daily_count: schedule.base_daily_count,
            extra_commit_days: schedule.extra_commit_days,
        },
        config: config.clone(),
        business_days,
        day_commit_counts: schedule.day_counts,
        source_commits,
        tag_targets,
        commits,
    };
    check_consistency(&blueprint)?;
    Ok(blueprint)
}

/// Structural cross-checks run before the blueprint is emitted. A failure
/// here is an internal bug, not a user-correctable input problem.
fn check_consistency(blueprint: &Blueprint) -> Result<(), PlanError> {
    let target = blueprint.meta.target_commit_count;
    if blueprint.commits.len() != target {
        return Err(inconsistent(format!(
            "planned {} commits for target {target}",
            blueprint.commits.len()
        )));
    }
    if blueprint.day_commit_counts.len() != blueprint.business_days.len() {
        return Err(inconsistent(
            "day counts do not align with the business-day list".to_string(),
        ));
    }
    let day_total: usize = blueprint.day_commit_counts.iter().sum();
    if day_total != target {
        return Err(inconsistent(format!(
            "per-day counts sum to {day_total}, expected {target}"
        )));
    }
    let allocated: usize = blueprint
        .source_commits
        .iter()
        .map(|summary| summary.allocated_commits)
        .sum();
    if allocated != target {
        return Err(inconsistent(format!(
            "allocation summary sums to {allocated}, expected {target}"
        )));
    }

    let mut used_per_date: BTreeMap<String, usize> = BTreeMap::new();
    for (position, commit) in blueprint.commits.iter().enumerate() {
        if commit.index != position + 1 {
            return Err(inconsistent(format!(
                "sequence index {} found at position {}",
                commit.index,
                position + 1
            )));
        }
        if commit.operations.is_empty() {
            return Err(inconsistent(format!(
                "commit #{} carries no operations",
                commit.index
            )));
        }
        if commit.author_date != commit.committer_date {
            return Err(inconsistent(format!(
                "commit #{} author/committer dates differ",
                commit.index
            )));
        }
        let date = commit.author_date.chars().take(10).collect::<String>();
        *used_per_date.entry(date).or_default() += 1;
    }

    for (day, &expected) in blueprint
        .business_days
        .iter()
        .zip(&blueprint.day_commit_counts)
    {
        let key = day.format("%Y-%m-%d").to_string();
        let actual = used_per_date.get(&key).copied().unwrap_or(0);
        if actual != expected {
            return Err(inconsistent(format!(
                "day {key} is used by {actual} commits, assigned {expected}"
            )));
        }
    }
    Ok(())
}

fn inconsistent(detail: String) -> PlanError {
    PlanError::BlueprintInconsistent(detail)
}

pub fn load(path: &Path) -> Result<Blueprint> {
    let bytes = fs::read(path).with_context(|| format!("read blueprint {}", path.display()))?;
    serde_json::from_slice(&bytes).context("parse blueprint JSON")
}

pub fn write(blueprint: &Blueprint, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(blueprint).context("serialize blueprint JSON")?;
    fs::write(path, bytes).with_context(|| format!("write blueprint {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Identity;
    use crate::history::OpKind;

    /// Deterministic in-memory stand-in for the git-backed provider.
    struct FakeProvider {
        changesets: Vec<SourceChangeset>,
        chain: Vec<String>,
        tags: BTreeMap<String, String>,
    }

    impl HistoryProvider for FakeProvider {
        fn changesets(&self, _source_ref: &str) -> Result<Vec<SourceChangeset>> {
            Ok(self.changesets.clone())
        }

        fn first_parent_chain(&self, _source_ref: &str) -> Result<Vec<String>> {
            Ok(self.chain.clone())
        }

        fn tag_commit(&self, tag_name: &str) -> Result<Option<String>> {
            Ok(self.tags.get(tag_name).cloned())
        }

        fn tree_id(&self, _source_ref: &str) -> Result<String> {
            Ok("f00dtree".to_string())
        }
    }

    fn operations(count: usize, prefix: &str) -> Vec<Operation> {
        (0..count)
            .map(|index| Operation::simple(OpKind::Added, format!("src/{prefix}_{index}.rs"), "A"))
            .collect()
    }

    fn provider() -> FakeProvider {
        let changesets = vec![
            SourceChangeset {
                id: "aaa111".to_string(),
                subject: "bootstrap the workspace".to_string(),
                operations: operations(4, "boot"),
            },
            SourceChangeset {
                id: "bbb222".to_string(),
                subject: "add the solver v0.1".to_string(),
                operations: operations(2, "solver"),
            },
            SourceChangeset {
                id: "ccc333".to_string(),
                subject: "final polish".to_string(),
                operations: operations(1, "polish"),
            },
        ];
        let chain = changesets
            .iter()
            .map(|changeset| changeset.id.clone())
            .collect();
        FakeProvider {
            changesets,
            chain,
            tags: BTreeMap::new(),
        }
    }

    fn config() -> RewriteConfig {
        RewriteConfig {
            start_date: "2024-03-04".parse().expect("date"),
            end_date: "2024-03-05".parse().expect("date"),
            timezone: "Europe/Berlin".to_string(),
            target_commit_count: 6,
            holidays_file: "rewrite/holidays.json".to_string(),
            daily_slots: BTreeMap::from([(
                3,
                vec![
                    "09:40".to_string(),
                    "13:10".to_string(),
                    "17:25".to_string(),
                ],
            )]),
            identity: Identity {
                name: "Dev Author".to_string(),
                email: "dev@example.com".to_string(),
            },
            rewrite_branch: "rewrite/replay".to_string(),
            target_branch: "main".to_string(),
            tag_names: vec!["v0.1".to_string()],
            forbidden_message_terms: vec!["wip".to_string()],
        }
    }

    #[test]
    fn builds_a_consistent_plan_end_to_end() {
        let provider = provider();
        let config = config();
        let blueprint =
            build(&provider, &config, "HEAD", &BTreeSet::new()).expect("build blueprint");

        assert_eq!(blueprint.meta.target_commit_count, 6);
        assert_eq!(blueprint.meta.business_day_count, 2);
        assert_eq!(blueprint.commits.len(), 6);
        assert_eq!(blueprint.day_commit_counts, vec![3, 3]);

        // Weights [4,2,1] at target 6 expand to [3,2,1].
        let allocated: Vec<usize> = blueprint
            .source_commits
            .iter()
            .map(|summary| summary.allocated_commits)
            .collect();
        assert_eq!(allocated, vec![3, 2, 1]);

        // Sequence indices are 1..=6 and groups stay contiguous per source.
        for (position, commit) in blueprint.commits.iter().enumerate() {
            assert_eq!(commit.index, position + 1);
            assert!(!commit.operations.is_empty());
            assert_eq!(commit.author_date, commit.committer_date);
            assert!(!commit.message.is_empty());
        }
        let rejoined: Vec<Operation> = blueprint
            .commits
            .iter()
            .filter(|commit| commit.source_commit == "aaa111")
            .flat_map(|commit| commit.operations.clone())
            .collect();
        assert_eq!(rejoined, provider.changesets[0].operations);

        // Berlin timestamps carry the +01:00 winter offset.
        assert!(blueprint
            .commits
            .iter()
            .all(|commit| commit.author_date.ends_with("+0100")));

        // "v0.1" matches the second source subject.
        assert_eq!(
            blueprint.tag_targets.get("v0.1"),
            Some(&"bbb222".to_string())
        );
    }

    #[test]
    fn unreachable_target_fails_before_any_output() {
        let provider = provider();
        let mut config = config();
        config.target_commit_count = 8;
        let err = build(&provider, &config, "HEAD", &BTreeSet::new()).expect_err("over capacity");
        let plan_error = err.downcast::<PlanError>().expect("typed error");
        assert_eq!(
            plan_error,
            PlanError::CapacityExceeded {
                target: 8,
                capacity: 7
            }
        );
    }

    #[test]
    fn plans_are_reproducible_modulo_generated_at() {
        let provider = provider();
        let config = config();
        let mut first =
            build(&provider, &config, "HEAD", &BTreeSet::new()).expect("first build");
        let mut second =
            build(&provider, &config, "HEAD", &BTreeSet::new()).expect("second build");
        first.meta.generated_at = String::new();
        second.meta.generated_at = String::new();
        let first_json = serde_json::to_string(&first).expect("serialize");
        let second_json = serde_json::to_string(&second).expect("serialize");
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn serde_round_trip_preserves_the_plan() {
        let provider = provider();
        let config = config();
        let blueprint = build(&provider, &config, "HEAD", &BTreeSet::new()).expect("build");
        let json = serde_json::to_string_pretty(&blueprint).expect("serialize");
        let back: Blueprint = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.commits.len(), blueprint.commits.len());
        assert_eq!(back.meta.source_tree, blueprint.meta.source_tree);
        assert_eq!(back.day_commit_counts, blueprint.day_commit_counts);
    }
}
