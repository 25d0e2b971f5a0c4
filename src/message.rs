//! Commit message synthesis.
//!
//! Messages are derived entirely from the operation group and the entry's
//! position in the plan, so replanning the same history always yields the
//! same wording.

use regex::Regex;
use std::path::Path;

use crate::history::{OpKind, Operation};

/// Path-prefix classification rules, in priority order. The longest
/// matching prefix wins; earlier rules win length ties.
const SCOPE_RULES: &[(&str, &str)] = &[
    ("src/bin/", "cli"),
    ("src/", "core"),
    ("crates/", "core"),
    ("lib/", "core"),
    ("config/", "config"),
    ("assets/", "assets"),
    ("resources/", "assets"),
    ("tests/", "tests"),
    ("benches/", "tests"),
    ("scripts/", "tooling"),
    ("tools/", "tooling"),
    ("docs/", "docs"),
];

/// Scopes whose changes read as functional fixes rather than chores.
const FUNCTIONAL_SCOPES: &[&str] = &["cli", "core", "config"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Feat,
    Fix,
    Refactor,
    Chore,
}

impl Category {
    fn label(self) -> &'static str {
        match self {
            Category::Feat => "feat",
            Category::Fix => "fix",
            Category::Refactor => "refactor",
            Category::Chore => "chore",
        }
    }

    fn verbs(self) -> &'static [&'static str] {
        match self {
            Category::Feat => &["add", "introduce", "enable", "expand", "support", "wire"],
            Category::Fix => &["fix", "stabilize", "correct", "resolve", "harden", "adjust"],
            Category::Refactor => &[
                "refactor",
                "streamline",
                "reorganize",
                "simplify",
                "reshape",
                "tidy",
            ],
            Category::Chore => &["update", "align", "polish", "refine", "tune", "improve"],
        }
    }
}

/// Synthesize the one-line message for the entry at `position` (0-based
/// index into the expanded plan).
pub fn synthesize(position: usize, operations: &[Operation]) -> String {
    let mut paths: Vec<&str> = Vec::new();
    for operation in operations {
        paths.extend(operation.touched_paths());
    }

    let scope = infer_scope(&paths);
    let category = infer_category(operations, scope);
    let verbs = category.verbs();
    let verb = verbs[position % verbs.len()];
    let topic = make_topic(&paths, scope);
    format!("{}({}): {} {}", category.label(), scope, verb, topic)
}

fn infer_scope(paths: &[&str]) -> &'static str {
    let mut votes: Vec<(&'static str, usize)> = Vec::new();
    for path in paths {
        let scope = classify_path(path);
        match votes.iter_mut().find(|(seen, _)| *seen == scope) {
            Some((_, count)) => *count += 1,
            None => votes.push((scope, 1)),
        }
    }
    // Majority vote; first-seen order breaks ties.
    let mut best_scope = "workspace";
    let mut best_count = 0usize;
    for (scope, count) in votes {
        if count > best_count {
            best_scope = scope;
            best_count = count;
        }
    }
    best_scope
}

fn classify_path(path: &str) -> &'static str {
    let normalized = path.replace('\\', "/");
    let mut best_scope = "";
    let mut best_len = 0usize;
    for &(prefix, scope) in SCOPE_RULES {
        if normalized.starts_with(prefix) && prefix.len() > best_len {
            best_scope = scope;
            best_len = prefix.len();
        }
    }
    if best_len > 0 {
        return best_scope;
    }
    if normalized.starts_with("README") || normalized.ends_with(".md") {
        return "docs";
    }
    "workspace"
}

fn infer_category(operations: &[Operation], scope: &str) -> Category {
    let all_added = operations.iter().all(|op| op.kind == OpKind::Added);
    if all_added {
        return Category::Feat;
    }
    let all_deleted = operations.iter().all(|op| op.kind == OpKind::Deleted);
    let any_transfer = operations.iter().any(|op| op.kind.is_transfer());
    if all_deleted || any_transfer {
        return Category::Refactor;
    }
    if FUNCTIONAL_SCOPES.contains(&scope) {
        return Category::Fix;
    }
    Category::Chore
}

fn make_topic(paths: &[&str], scope: &str) -> String {
    if let [only] = paths {
        let file_name = Path::new(only)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");
        let collapse = Regex::new("[^A-Za-z0-9]+").expect("regex for topic tokens");
        let token = collapse
            .replace_all(file_name, " ")
            .trim()
            .to_lowercase();
        let token = if token.is_empty() {
            "workspace".to_string()
        } else {
            token
        };
        return format!("{token} handling");
    }

    let fallback = match scope {
        "cli" => "command line behavior",
        "core" => "core module behavior",
        "config" => "configuration defaults",
        "assets" => "asset organization",
        "tests" => "test coverage",
        "tooling" => "tooling workflow",
        "docs" => "project documentation",
        _ => "workspace consistency",
    };
    fallback.to_string()
}
