//! CLI argument parsing for the rewrite workflow.
//!
//! The CLI is intentionally thin: it resolves paths and wires the three
//! workflow steps without embedding policy, so the planning core stays a
//! pure function of its inputs.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default rewrite config location, relative to the repo root.
pub const DEFAULT_CONFIG_PATH: &str = "rewrite/rewrite_config.json";
/// Default blueprint location, relative to the repo root.
pub const DEFAULT_BLUEPRINT_PATH: &str = "rewrite/blueprint.json";
/// Default verification report location, relative to the repo root.
pub const DEFAULT_REPORT_PATH: &str = "rewrite/rewrite_report.md";

/// Root CLI entrypoint for the rewrite workflow.
#[derive(Parser, Debug)]
#[command(
    name = "recommit",
    version,
    about = "Deterministic business-day replanner for linear git history",
    after_help = "Commands:\n  plan --source-ref <ref>   Build a deterministic rewrite blueprint\n  apply                     Replay the blueprint into a rewritten branch\n  verify                    Check the rewritten branch against the blueprint\n\nExamples:\n  recommit plan --source-ref origin/main\n  recommit apply\n  recommit verify",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Plan(PlanArgs),
    Apply(ApplyArgs),
    Verify(VerifyArgs),
}

/// Plan command inputs used to build a blueprint deterministically.
#[derive(Parser, Debug)]
#[command(about = "Build a deterministic rewrite blueprint from a source ref")]
pub struct PlanArgs {
    /// Git ref used as rewrite source (must include the target final tree)
    #[arg(long, value_name = "REF")]
    pub source_ref: String,

    /// Path to the rewrite config JSON
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Output path for the blueprint JSON
    #[arg(long, value_name = "PATH", default_value = DEFAULT_BLUEPRINT_PATH)]
    pub output: PathBuf,
}

/// Apply command inputs used to replay a blueprint.
#[derive(Parser, Debug)]
#[command(about = "Replay a blueprint into a rewritten linear history")]
pub struct ApplyArgs {
    /// Path to the blueprint JSON
    #[arg(long, value_name = "PATH", default_value = DEFAULT_BLUEPRINT_PATH)]
    pub blueprint: PathBuf,
}

/// Verify command inputs used to check the rewritten branch.
#[derive(Parser, Debug)]
#[command(about = "Verify the rewritten branch against blueprint and config")]
pub struct VerifyArgs {
    /// Path to the rewrite config JSON
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Path to the blueprint JSON
    #[arg(long, value_name = "PATH", default_value = DEFAULT_BLUEPRINT_PATH)]
    pub blueprint: PathBuf,

    /// Output path for the markdown report
    #[arg(long, value_name = "PATH", default_value = DEFAULT_REPORT_PATH)]
    pub report: PathBuf,
}
