//! Run Summary
//!
//! Console table and JSON report of a finished provisioning run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use colored::Colorize;
use log::info;
use serde::Serialize;

use crate::config::{FailurePolicy, ProvisionConfig};
use crate::environment::ToolLocation;
use crate::error::ProvisionError;
use crate::execution::{ProvisionRun, StepOutcome, StepResult};

/// Serializable record of one provisioning run.
#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub tool: ToolLocation,
    pub environment: String,
    pub spec_file: PathBuf,
    pub on_error: FailurePolicy,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `created`, `updated`, or `unknown` if the registry could not be read
    pub environment_action: &'static str,
    pub active_before: String,
    pub active_after: String,
    pub succeeded: bool,
    pub steps: Vec<StepResult>,
}

impl RunReport {
    pub fn new(
        config: &ProvisionConfig,
        tool: &ToolLocation,
        run: &ProvisionRun,
        started_at: DateTime<Utc>,
    ) -> Self {
        let environment_action = match run.existed_before {
            Some(true) => "updated",
            Some(false) => "created",
            None => "unknown",
        };

        Self {
            tool: tool.clone(),
            environment: config.environment.clone(),
            spec_file: config.spec_file.clone(),
            on_error: config.on_error,
            dry_run: config.dry_run,
            started_at,
            finished_at: Utc::now(),
            environment_action,
            active_before: run.active_before.clone(),
            active_after: run.active_after.clone(),
            succeeded: run.succeeded(),
            steps: run.steps.clone(),
        }
    }

    /// Writes the report as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ProvisionError> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ProvisionError::ReportIo {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| ProvisionError::ReportIo {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Saved run report to {}", path.display());
        Ok(())
    }

    /// Renders a step table for the console.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\nProvisioning summary for '{}' ({})\n\n",
            self.environment, self.tool.kind
        ));

        for step in &self.steps {
            let status = match &step.outcome {
                StepOutcome::Succeeded => step.outcome.label().green(),
                StepOutcome::Failed(_) => step.outcome.label().red().bold(),
                StepOutcome::Skipped => step.outcome.label().yellow(),
            };
            out.push_str(&format!(
                "  {:<20} {:<8} {:>7} ms",
                step.kind.name(),
                status,
                step.duration_ms
            ));
            if let StepOutcome::Failed(failure) = &step.outcome {
                out.push_str(&format!("  {}", failure));
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "\n  Environment {}: {}\n",
            self.environment_action, self.environment
        ));
        out.push_str(&format!(
            "  Active environment: {} -> {}\n",
            self.active_before, self.active_after
        ));

        let verdict = if self.succeeded {
            "All steps succeeded".green().bold()
        } else {
            "One or more steps failed".red().bold()
        };
        out.push_str(&format!("\n{}\n", verdict));
        out
    }
}
