mod confirm;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

use nsdoctor::eventbus::{EventFilter, FilteredReceiver};
use nsdoctor::models::{DiagnosticEventType, EventPayload, ExecutionMode, RunReport};
use nsdoctor::{AppConfig, Runner};

/// Failure to connect, authenticate or load configuration.
pub const EXIT_FAILURE: u8 = 3;

/// nsdoctor - find out why namespaces are stuck in Terminating, and unstick them.
#[derive(Parser)]
#[command(
    name = "nsdoctor",
    version,
    about = "Diagnose and remediate Kubernetes namespaces stuck in Terminating",
    long_about = "Diagnose and remediate Kubernetes namespaces stuck in Terminating.\n\n\
                  Blocking conditions are classified as unavailable APIServices, remaining\n\
                  resources, broken admission webhooks and finalizers, and fixed in that order.\n\
                  Every step is idempotent: re-run diagnose after each fix pass."
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a kubeconfig file.
    #[arg(long, global = true)]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context to use.
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// YAML configuration file. Environment variables are used otherwise.
    #[arg(short, long, global = true, env = "NSDOCTOR_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the report as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Explain why namespaces are stuck and print the remediation plan.
    ///
    /// Without a namespace, every namespace currently in Terminating is diagnosed.
    Diagnose {
        /// Namespace to diagnose.
        namespace: Option<String>,
    },

    /// Diagnose, then execute the remediation plan.
    ///
    /// Each step is confirmed interactively unless --yes is given.
    Fix {
        /// Namespace to fix. Defaults to all terminating namespaces.
        namespace: Option<String>,

        /// Show what would be done without changing the cluster.
        #[arg(long)]
        dry_run: bool,

        /// Apply every step without asking.
        #[arg(short, long, conflicts_with = "dry_run")]
        yes: bool,
    },

    /// Summarize cluster-wide conditions that keep namespaces stuck.
    Health,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Unresolved,
    NotFound,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Unresolved => 1,
            Outcome::NotFound => 2,
        }
    }

    pub fn from_run(report: &RunReport) -> Self {
        if report.not_found.is_some() {
            Outcome::NotFound
        } else if report.has_unresolved() {
            Outcome::Unresolved
        } else {
            Outcome::Success
        }
    }
}

impl Cli {
    /// Loads the file or environment configuration, then applies flags.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::from_env()?,
        };

        if let Some(kubeconfig) = &self.kubeconfig {
            config.kube.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(context) = &self.context {
            config.kube.context = Some(context.clone());
        }
        Ok(config)
    }

    pub fn execution_mode(dry_run: bool, yes: bool) -> ExecutionMode {
        match (dry_run, yes) {
            (true, _) => ExecutionMode::DryRun,
            (false, true) => ExecutionMode::Apply,
            (false, false) => ExecutionMode::ApplyWithConfirmation,
        }
    }

    pub async fn execute(&self, config: AppConfig) -> Result<Outcome> {
        let runner = Arc::new(
            Runner::connect(config)
                .await
                .context("failed to connect to the cluster")?,
        );

        let signal_runner = runner.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_runner.stop().await;
            }
        });

        match &self.command {
            Commands::Diagnose { namespace } => {
                let report = runner
                    .diagnose(namespace.as_deref())
                    .await
                    .context("diagnosis failed")?;
                self.print_run(&report)?;
                Ok(Outcome::from_run(&report))
            }
            Commands::Fix {
                namespace,
                dry_run,
                yes,
            } => {
                let mode = Self::execution_mode(*dry_run, *yes);
                info!("Running fix in {:?} mode", mode);
                if mode == ExecutionMode::Apply && !self.json {
                    spawn_progress(&runner);
                }

                let report = runner
                    .fix(namespace.as_deref(), mode, &confirm::prompt_step)
                    .await
                    .context("remediation failed")?;
                if report.cancelled {
                    warn!("Run was cancelled before all steps were applied");
                }
                self.print_run(&report)?;
                Ok(Outcome::from_run(&report))
            }
            Commands::Health => {
                let report = runner.health().await.context("health check failed")?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    ui::print_health(&report);
                }
                Ok(Outcome::Success)
            }
        }
    }

    fn print_run(&self, report: &RunReport) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            ui::print_run_report(report);
        }
        Ok(())
    }
}

/// Streams step results to stderr while an unattended fix runs.
fn spawn_progress(runner: &Runner) {
    let mut receiver = FilteredReceiver::new(
        runner.event_bus().subscribe(),
        EventFilter::new(vec![
            DiagnosticEventType::StepFinished,
            DiagnosticEventType::NamespaceVerified,
        ]),
    );

    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            match event.payload {
                EventPayload::StepFinished(step) => ui::print_step_progress(&step),
                EventPayload::NamespaceVerified(verified) => {
                    ui::print_verification_progress(&verified.namespace, &verified.outcome)
                }
                _ => {}
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsdoctor::models::{
        ClusterView, Diagnosis, ExecutionReport, NamespaceReport, NamespaceSnapshot,
        ResourceInventory, VerificationOutcome,
    };
    use uuid::Uuid;

    fn report_with(verification: Option<VerificationOutcome>) -> RunReport {
        let mut report = RunReport::new(Uuid::new_v4(), None, Some(ExecutionMode::Apply));
        report.cluster = ClusterView::default();
        report.namespaces.push(NamespaceReport {
            diagnosis: Diagnosis {
                snapshot: NamespaceSnapshot::new("test1".to_string(), None, None, None),
                inventory: ResourceInventory::new(),
                blockers: Vec::new(),
                notes: Vec::new(),
            },
            plan: Vec::new(),
            execution: Some(ExecutionReport::default()),
            verification,
        });
        report
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::from_run(&report_with(None)).exit_code(), 0);
        assert_eq!(
            Outcome::from_run(&report_with(Some(VerificationOutcome::Deleted))).exit_code(),
            0
        );
        let incomplete = VerificationOutcome::Incomplete {
            remaining: Vec::new(),
        };
        assert_eq!(
            Outcome::from_run(&report_with(Some(incomplete))).exit_code(),
            1
        );

        let mut missing = RunReport::new(Uuid::new_v4(), Some("nope".to_string()), None);
        missing.not_found = Some("nope".to_string());
        assert_eq!(Outcome::from_run(&missing).exit_code(), 2);
    }

    #[test]
    fn test_execution_mode_flags() {
        assert_eq!(Cli::execution_mode(true, false), ExecutionMode::DryRun);
        assert_eq!(Cli::execution_mode(false, true), ExecutionMode::Apply);
        assert_eq!(
            Cli::execution_mode(false, false),
            ExecutionMode::ApplyWithConfirmation
        );
    }

    #[test]
    fn test_parse_fix_command() {
        let cli = Cli::parse_from(["nsdoctor", "--context", "prod", "fix", "kyverno", "--yes"]);
        assert_eq!(cli.context.as_deref(), Some("prod"));
        match cli.command {
            Commands::Fix {
                namespace,
                dry_run,
                yes,
            } => {
                assert_eq!(namespace.as_deref(), Some("kyverno"));
                assert!(!dry_run);
                assert!(yes);
            }
            _ => panic!("expected fix command"),
        }
    }

    #[test]
    fn test_dry_run_conflicts_with_yes() {
        assert!(Cli::try_parse_from(["nsdoctor", "fix", "--dry-run", "--yes"]).is_err());
    }
}
