//! Human-readable rendering of run and health reports.

use colored::Colorize;

use nsdoctor::models::{
    Diagnosis, ExecutionReport, HealthReport, NamespaceReport, RunReport, StepReport, StepStatus,
    VerificationOutcome,
};

fn print_section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
    println!("{}", "─".repeat(title.chars().count()).bright_black());
}

fn print_note(message: &str) {
    println!("  {} {}", "⚠".yellow().bold(), message.yellow());
}

fn format_age(duration: chrono::Duration) -> String {
    let minutes = duration.num_minutes();
    if minutes < 1 {
        format!("{}s", duration.num_seconds().max(0))
    } else if minutes < 120 {
        format!("{}m", minutes)
    } else if minutes < 48 * 60 {
        format!("{}h", duration.num_hours())
    } else {
        format!("{}d", duration.num_days())
    }
}

fn status_marker(status: &StepStatus) -> colored::ColoredString {
    match status {
        StepStatus::Applied { .. } | StepStatus::AlreadyAbsent => "✓".green().bold(),
        StepStatus::Planned => "•".cyan(),
        StepStatus::Declined | StepStatus::Cancelled => "-".bright_black(),
        StepStatus::Failed { .. } => "✗".red().bold(),
    }
}

pub fn print_run_report(report: &RunReport) {
    if let Some(name) = &report.not_found {
        println!("{} namespace {} not found", "✗".red().bold(), name.bold());
        return;
    }

    if report.namespaces.is_empty() {
        println!("{} no namespace is stuck in Terminating", "✓".green().bold());
        return;
    }

    for note in &report.cluster.notes {
        print_note(note);
    }

    if let Some(shared) = &report.shared_execution {
        if !shared.steps.is_empty() {
            print_section("Cluster-wide steps");
            print_execution(shared);
        }
    }

    for namespace in &report.namespaces {
        print_namespace(namespace);
    }

    println!();
    let blocked = report.blocked_count();
    let summary = format!(
        "{} namespace(s) inspected, {} blocked",
        report.namespaces.len(),
        blocked
    );
    if report.has_unresolved() {
        println!("{} {}", "✗".red().bold(), summary.red());
    } else if blocked > 0 && report.mode.is_none() {
        println!("{} {}", "ℹ".blue().bold(), summary);
    } else {
        println!("{} {}", "✓".green().bold(), summary.green());
    }
    if report.cancelled {
        print_note("run cancelled, remaining steps were not applied");
    }
}

fn print_namespace(report: &NamespaceReport) {
    let diagnosis = &report.diagnosis;
    let snapshot = &diagnosis.snapshot;

    let age = snapshot
        .terminating_for()
        .map(|d| format!(" for {}", format_age(d)))
        .unwrap_or_default();
    print_section(&format!("{} ({}{})", snapshot.name, snapshot.phase, age));

    print_diagnosis(diagnosis);

    if !report.plan.is_empty() && report.execution.is_none() {
        println!("  {}", "Plan:".bold());
        for (i, step) in report.plan.iter().enumerate() {
            println!("    {} {}", format!("{}.", i + 1).bright_black(), step);
        }
    }

    if let Some(execution) = &report.execution {
        println!("  {}", "Execution:".bold());
        print_execution(execution);
    }

    if let Some(outcome) = &report.verification {
        print_verification_progress(snapshot.name.as_str(), outcome);
    }
}

fn print_diagnosis(diagnosis: &Diagnosis) {
    let snapshot = &diagnosis.snapshot;

    for note in &diagnosis.notes {
        print_note(note);
    }

    for condition in snapshot.failing_conditions() {
        println!(
            "  {} {}: {}",
            "condition".bright_black(),
            condition.condition_type,
            condition.message.as_deref().unwrap_or("")
        );
    }

    if !diagnosis.inventory.is_empty() {
        println!("  {}", "Remaining resources:".bold());
        for entry in &diagnosis.inventory.entries {
            let sample = if entry.sample.is_empty() {
                String::new()
            } else {
                format!(" ({})", entry.sample.join(", "))
            };
            println!(
                "    {:>5}  {}{}",
                entry.count,
                entry.kind.qualified_name(),
                sample.bright_black()
            );
        }
    }
    for omitted in &diagnosis.inventory.omitted {
        print_note(&format!("could not count {}", omitted));
    }

    if diagnosis.blockers.is_empty() {
        if snapshot.is_terminating() {
            println!("  {} no blocking condition found", "ℹ".blue().bold());
        }
        return;
    }

    println!("  {}", "Blockers:".bold());
    for blocker in &diagnosis.blockers {
        println!(
            "    {} {}",
            format!("[{}]", blocker.kind()).red(),
            blocker.reason()
        );
    }
}

fn print_execution(execution: &ExecutionReport) {
    for step in &execution.steps {
        println!(
            "    {} {} {}",
            status_marker(&step.status),
            step.step,
            format!("({})", step.status).bright_black()
        );
    }
}

pub fn print_step_progress(step: &StepReport) {
    eprintln!(
        "{} {} {}",
        status_marker(&step.status),
        step.step,
        format!("({})", step.status).bright_black()
    );
}

pub fn print_verification_progress(namespace: &str, outcome: &VerificationOutcome) {
    let line = format!("{}: {}", namespace, outcome);
    if outcome.is_resolved() {
        eprintln!("{} {}", "✓".green().bold(), line.green());
    } else {
        eprintln!("{} {}", "✗".red().bold(), line.red());
        if let VerificationOutcome::Incomplete { remaining } = outcome {
            for blocker in remaining {
                eprintln!("    {} {}", format!("[{}]", blocker.kind()).red(), blocker.reason());
            }
        }
    }
}

pub fn print_health(report: &HealthReport) {
    for note in &report.notes {
        print_note(note);
    }

    print_section("APIServices");
    if report.unavailable_api_services.is_empty() {
        println!("  {} all available", "✓".green().bold());
    }
    for health in &report.unavailable_api_services {
        println!("  {} {}", "✗".red().bold(), health.describe());
    }

    print_section("Admission webhooks");
    if report.broken_webhooks.is_empty() {
        println!("  {} all backing services present", "✓".green().bold());
    }
    for webhook in &report.broken_webhooks {
        let services: Vec<String> = webhook
            .missing_services()
            .chain(webhook.unreachable_services())
            .map(|s| format!("{}/{}", s.namespace, s.name))
            .collect();
        println!(
            "  {} {} {} ({})",
            "✗".red().bold(),
            webhook.kind,
            webhook.name,
            services.join(", ")
        );
    }

    print_section("Terminating namespaces");
    if report.terminating_namespaces.is_empty() {
        println!("  {} none", "✓".green().bold());
    }
    for name in &report.terminating_namespaces {
        println!("  {} {}", "•".yellow(), name);
    }

    println!();
    if report.is_healthy() {
        println!("{} cluster looks healthy", "✓".green().bold());
    } else {
        println!(
            "{} run {} to inspect stuck namespaces",
            "ℹ".blue().bold(),
            "nsdoctor diagnose".bold()
        );
    }
}
