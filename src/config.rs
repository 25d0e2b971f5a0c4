//! Rewrite configuration loading and validation.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::schedule::parse_slot_time;

/// Author/committer identity stamped onto every rewritten commit.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// The rewrite configuration document.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RewriteConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// IANA timezone name, e.g. `Europe/Berlin`.
    pub timezone: String,
    pub target_commit_count: usize,
    /// Excluded-dates JSON document, relative to the repo root.
    pub holidays_file: String,
    /// Slot-time template per commits-per-day count.
    pub daily_slots: BTreeMap<usize, Vec<String>>,
    pub identity: Identity,
    pub rewrite_branch: String,
    pub target_branch: String,
    pub tag_names: Vec<String>,
    /// Enforced by `verify` only; the planner never emits these anyway.
    pub forbidden_message_terms: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct HolidayFile {
    dates: Vec<NaiveDate>,
}

impl RewriteConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("read rewrite config {}", path.display()))?;
        let config: RewriteConfig =
            serde_json::from_slice(&bytes).context("parse rewrite config JSON")?;
        config
            .validate()
            .with_context(|| format!("validate rewrite config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(anyhow!(
                "end_date {} precedes start_date {}",
                self.end_date,
                self.start_date
            ));
        }
        if self.target_commit_count == 0 {
            return Err(anyhow!("target_commit_count must be > 0"));
        }
        self.tz()?;
        for (count, slots) in &self.daily_slots {
            for slot in slots {
                if parse_slot_time(slot).is_none() {
                    return Err(anyhow!(
                        "daily_slots[{count}] contains invalid time {slot:?} (expected HH:MM)"
                    ));
                }
            }
        }
        if self.identity.name.trim().is_empty() || self.identity.email.trim().is_empty() {
            return Err(anyhow!("identity.name and identity.email are required"));
        }
        if self.rewrite_branch.trim().is_empty() || self.target_branch.trim().is_empty() {
            return Err(anyhow!("rewrite_branch and target_branch are required"));
        }
        if self.rewrite_branch == self.target_branch {
            return Err(anyhow!("rewrite_branch must differ from target_branch"));
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| anyhow!("invalid timezone {:?}", self.timezone))
    }

    /// Load the excluded-dates set. A relative `holidays_file` resolves
    /// against the repo root, falling back to the config file's directory.
    pub fn load_holidays(&self, repo_root: &Path, config_path: &Path) -> Result<BTreeSet<NaiveDate>> {
        let raw = Path::new(&self.holidays_file);
        let mut resolved: PathBuf = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            repo_root.join(raw)
        };
        if !resolved.is_file() {
            if let (Some(config_dir), Some(file_name)) = (config_path.parent(), raw.file_name()) {
                let sibling = config_dir.join(file_name);
                if sibling.is_file() {
                    resolved = sibling;
                }
            }
        }
        let bytes = fs::read(&resolved)
            .with_context(|| format!("read holidays file {}", resolved.display()))?;
        let parsed: HolidayFile = serde_json::from_slice(&bytes).context("parse holidays JSON")?;
        Ok(parsed.dates.into_iter().collect())
    }
}
