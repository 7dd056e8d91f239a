use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use tracing::warn;

use nsdoctor::models::RemediationStep;

/// Asks on the terminal before each step. Anything but an explicit yes,
/// including a prompt that cannot be shown, declines the step.
pub fn prompt_step(step: &RemediationStep) -> bool {
    let prompt = if step.is_cluster_scoped() {
        format!("{} {}", step, "(cluster-scoped)".yellow())
    } else {
        step.to_string()
    };

    match Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Apply {}?", prompt))
        .default(false)
        .interact()
    {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Could not prompt for {}: {}, declining", step, e);
            false
        }
    }
}
