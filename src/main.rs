use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod apply;
mod blueprint;
mod calendar;
mod cli;
mod config;
mod distribute;
mod error;
mod git;
mod history;
mod message;
mod schedule;
mod tags;
mod verify;

use cli::{ApplyArgs, Command, PlanArgs, RootArgs, VerifyArgs};
use config::RewriteConfig;
use git::GitSession;
use history::GitHistoryProvider;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Plan(args) => cmd_plan(args),
        Command::Apply(args) => cmd_apply(args),
        Command::Verify(args) => cmd_verify(args),
    }
}

fn cmd_plan(args: PlanArgs) -> Result<()> {
    let session = GitSession::open()?;
    let config_path = session.workspace_path(&args.config);
    let config = RewriteConfig::load(&config_path)?;
    let holidays = config.load_holidays(session.repo_root(), &config_path)?;

    let provider = GitHistoryProvider::new(&session);
    let plan = blueprint::build(&provider, &config, &args.source_ref, &holidays)?;

    let output_path = session.workspace_path(&args.output);
    blueprint::write(&plan, &output_path)?;
    tracing::info!(
        commits = plan.commits.len(),
        business_days = plan.business_days.len(),
        "blueprint written"
    );

    let first_day = plan.business_days.first().copied();
    let last_day = plan.business_days.last().copied();
    print_summary(&serde_json::json!({
        "target": plan.meta.target_commit_count,
        "generated": plan.commits.len(),
        "business_days": plan.business_days.len(),
        "date_start": first_day,
        "date_end": last_day,
        "source_tree": plan.meta.source_tree,
        "output": output_path.display().to_string(),
    }))
}

fn cmd_apply(args: ApplyArgs) -> Result<()> {
    let session = GitSession::open()?;
    let blueprint_path = session.workspace_path(&args.blueprint);
    let plan = blueprint::load(&blueprint_path)?;
    let summary = apply::run(&session, &plan)?;
    print_summary(&serde_json::to_value(summary)?)
}

fn cmd_verify(args: VerifyArgs) -> Result<()> {
    let session = GitSession::open()?;
    let config_path = session.workspace_path(&args.config);
    let config = RewriteConfig::load(&config_path)?;
    let holidays = config.load_holidays(session.repo_root(), &config_path)?;
    let blueprint_path = session.workspace_path(&args.blueprint);
    let plan = blueprint::load(&blueprint_path)?;

    let report_path = session.workspace_path(&args.report);
    let summary = verify::run(&session, &config, &plan, &holidays, &report_path)?;
    let passed = summary.passed;
    print_summary(&serde_json::to_value(summary)?)?;
    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
