//! Shipgate - release promotion controller CLI
//!
//! The `shipgate` command decides what a CI run builds, how it is versioned,
//! and which channels the verified artifacts are promoted to.
//!
//! ## Commands
//!
//! - `run`: classify, version, build, verify, gate and publish
//! - `classify`: show how the trigger is classified and what it is eligible for
//! - `version`: resolve and print the version for the trigger
//! - `verify`: strictly verify an existing artifact directory

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use shipgate_ci::PromotionPipeline;
use shipgate_core::{
    append_summary_md, decide, render_summary_md, write_report_json, ArtifactSet,
    PromotionDecision, RunContext, RunSpan, ShipgateConfig, TriggerClassifier, TriggerInputs,
    VerificationResult, Verifier, VersionResolver, VersionString, CONFIG_FILE,
};

#[derive(Parser)]
#[command(name = "shipgate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Release promotion controller", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file
    #[arg(short, long, global = true, env = "SHIPGATE_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full promotion pipeline
    Run {
        #[command(flatten)]
        trigger: TriggerArgs,

        /// Write the run report as JSON
        #[arg(long)]
        report_json: Option<PathBuf>,

        /// Append the Markdown summary to this file
        #[arg(long, env = "GITHUB_STEP_SUMMARY")]
        summary_md: Option<PathBuf>,
    },

    /// Classify the trigger and show its eligibility
    Classify {
        #[command(flatten)]
        trigger: TriggerArgs,
    },

    /// Resolve the version for the trigger
    Version {
        #[command(flatten)]
        trigger: TriggerArgs,
    },

    /// Verify an existing artifact directory
    Verify {
        /// Directory holding the artifacts
        #[arg(long)]
        dir: PathBuf,

        /// Version the artifacts must carry
        #[arg(long)]
        version: String,
    },
}

/// Trigger inputs, normally supplied by the CI runtime's environment.
#[derive(Args, Debug, Clone)]
struct TriggerArgs {
    /// Triggering event name (push, release, workflow_dispatch)
    #[arg(long = "event", env = "GITHUB_EVENT_NAME", default_value = "")]
    event_name: String,

    /// Git ref the run executes on
    #[arg(long = "ref", env = "GITHUB_REF", default_value = "")]
    git_ref: String,

    /// Repository identity as owner/name
    #[arg(long, env = "GITHUB_REPOSITORY", default_value = "")]
    repository: String,

    /// Ref type (tag or branch)
    #[arg(long, env = "GITHUB_REF_TYPE")]
    ref_type: Option<String>,

    /// Release lifecycle action (only `published` promotes)
    #[arg(long, env = "SHIPGATE_RELEASE_ACTION")]
    release_action: Option<String>,

    /// Treat the run as a manual dispatch
    #[arg(
        long = "manual",
        env = "SHIPGATE_MANUAL_DISPATCH",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    manual_dispatch: bool,
}

impl From<TriggerArgs> for TriggerInputs {
    fn from(args: TriggerArgs) -> Self {
        TriggerInputs {
            event_name: args.event_name,
            git_ref: args.git_ref,
            repository: args.repository,
            ref_type: args.ref_type.filter(|s| !s.trim().is_empty()),
            lifecycle_action: args.release_action.filter(|s| !s.trim().is_empty()),
            manual_dispatch: args.manual_dispatch,
        }
    }
}

#[derive(Serialize)]
struct ClassifyOutput {
    context: RunContext,
    /// Decision the gate would take if verification passes.
    if_verified: PromotionDecision,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shipgate_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            trigger,
            report_json,
            summary_md,
        } => {
            cmd_run(
                &cli.config,
                trigger.into(),
                report_json.as_deref(),
                summary_md.as_deref(),
            )
            .await
        }
        Commands::Classify { trigger } => cmd_classify(&cli.config, trigger.into()),
        Commands::Version { trigger } => cmd_version(&cli.config, trigger.into()).await,
        Commands::Verify { dir, version } => cmd_verify(&dir, &version),
    }
}

fn load_config(path: &Path) -> Result<ShipgateConfig> {
    ShipgateConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

async fn cmd_run(
    config_path: &Path,
    inputs: TriggerInputs,
    report_json: Option<&Path>,
    summary_md: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = PromotionPipeline::from_config(&config)?;

    let report = pipeline.run(&inputs).await;

    if let Some(path) = report_json {
        write_report_json(path, &report)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote run report");
    }
    if let Some(path) = summary_md {
        append_summary_md(path, &report)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    println!("{}", render_summary_md(&report));

    if let Some(reason) = report.failure_reason() {
        anyhow::bail!("Promotion run failed: {reason}");
    }
    Ok(())
}

fn cmd_classify(config_path: &Path, inputs: TriggerInputs) -> Result<()> {
    let config = load_config(config_path)?;
    let context = TriggerClassifier::classify(&inputs).context("Failed to classify trigger")?;
    let if_verified = decide(&config.gate_policy(), &context, &VerificationResult::Pass);

    let output = ClassifyOutput {
        context,
        if_verified,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_version(config_path: &Path, inputs: TriggerInputs) -> Result<()> {
    let config = load_config(config_path)?;
    let context = TriggerClassifier::classify(&inputs).context("Failed to classify trigger")?;
    let version = VersionResolver::new(config.version_source())
        .resolve(&context)
        .await
        .context("Failed to resolve version")?;
    println!("{version}");
    Ok(())
}

fn cmd_verify(dir: &Path, version: &str) -> Result<()> {
    let _span = RunSpan::enter(&format!("verify:{}", dir.display()));
    let version = VersionString::parse(version).context("Invalid version")?;
    let set = ArtifactSet::load(dir, version)
        .with_context(|| format!("Failed to read artifacts in {}", dir.display()))?;

    let result = Verifier::verify(&set);
    shipgate_core::obs::emit_verify_finished(&result);
    match &result {
        VerificationResult::Pass => {
            println!("✓ {} artifact(s) verified", set.artifacts().len());
            Ok(())
        }
        VerificationResult::Fail(issues) => {
            for issue in issues {
                println!("✗ {issue}");
            }
            anyhow::bail!("Verification failed with {} issue(s)", issues.len())
        }
    }
}
