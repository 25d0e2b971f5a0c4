//! Tag retargeting onto rewrite source changesets.
//!
//! Resolution is an explicit ordered list of strategies, evaluated in
//! sequence until one produces a target. The final strategy always
//! succeeds, so every tag resolves to some designated changeset.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::history::{HistoryProvider, SourceChangeset};

/// Everything a strategy may consult when resolving one tag.
pub struct TagContext<'a> {
    /// Commit the tag currently points at, if the tag exists.
    pub tagged_commit: Option<&'a str>,
    /// First-parent ancestors of the reference history, oldest first.
    pub first_parent_chain: &'a [String],
    /// Designated rewrite sources, oldest first.
    pub changesets: &'a [SourceChangeset],
}

type Strategy = fn(&str, &TagContext<'_>) -> Option<String>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct-source", resolve_direct),
    ("ancestor-walk", resolve_ancestor),
    ("subject-match", resolve_subject),
    ("last-source", resolve_last),
];

/// Resolve one tag to a source changeset id. Returns `None` only when the
/// source set itself is empty.
pub fn resolve_tag(tag_name: &str, context: &TagContext<'_>) -> Option<String> {
    for &(strategy_name, strategy) in STRATEGIES {
        if let Some(target) = strategy(tag_name, context) {
            tracing::debug!(
                tag = tag_name,
                strategy = strategy_name,
                resolved = target.as_str(),
                "tag resolved"
            );
            return Some(target);
        }
    }
    None
}

/// Resolve every configured tag against the live reference history.
pub fn resolve_all(
    provider: &dyn HistoryProvider,
    source_ref: &str,
    changesets: &[SourceChangeset],
    tag_names: &[String],
) -> Result<BTreeMap<String, String>> {
    let first_parent_chain = provider.first_parent_chain(source_ref)?;
    let mut targets = BTreeMap::new();
    for tag_name in tag_names {
        let tagged_commit = provider.tag_commit(tag_name)?;
        let context = TagContext {
            tagged_commit: tagged_commit.as_deref(),
            first_parent_chain: &first_parent_chain,
            changesets,
        };
        if let Some(target) = resolve_tag(tag_name, &context) {
            targets.insert(tag_name.clone(), target);
        }
    }
    Ok(targets)
}

fn is_source(context: &TagContext<'_>, id: &str) -> bool {
    context.changesets.iter().any(|changeset| changeset.id == id)
}

/// The tag already points at a designated source changeset.
fn resolve_direct(_tag_name: &str, context: &TagContext<'_>) -> Option<String> {
    let tagged = context.tagged_commit?;
    is_source(context, tagged).then(|| tagged.to_string())
}

/// The tag points into the ancestor chain: walk backward to the nearest
/// earlier source changeset.
fn resolve_ancestor(_tag_name: &str, context: &TagContext<'_>) -> Option<String> {
    let tagged = context.tagged_commit?;
    let tagged_index = context
        .first_parent_chain
        .iter()
        .position(|ancestor| ancestor.as_str() == tagged)?;
    context.first_parent_chain[..=tagged_index]
        .iter()
        .rev()
        .find(|ancestor| is_source(context, ancestor))
        .cloned()
}

/// The tag name appears in a source subject line.
fn resolve_subject(tag_name: &str, context: &TagContext<'_>) -> Option<String> {
    let needle = tag_name.to_lowercase();
    context
        .changesets
        .iter()
        .find(|changeset| changeset.subject.to_lowercase().contains(&needle))
        .map(|changeset| changeset.id.clone())
}

/// Fall back to the newest source changeset.
fn resolve_last(_tag_name: &str, context: &TagContext<'_>) -> Option<String> {
    context
        .changesets
        .last()
        .map(|changeset| changeset.id.clone())
}
