//! services/api/src/adapters/catalog.rs
//!
//! Runs the external catalog scrape and import commands as child processes.
//! Implements the `CatalogRefresher` port from the `core` crate.

use async_trait::async_trait;
use stylecal_core::domain::{CatalogRefreshReport, StepOutput};
use stylecal_core::ports::{CatalogRefresher, PortError, PortResult};
use tokio::process::Command;
use tracing::{info, warn};

/// One configured external step, e.g. `("scrape", "python -m scraper")`.
#[derive(Debug, Clone)]
pub struct CommandStep {
    pub name: String,
    pub command: String,
}

impl CommandStep {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }
}

/// Runs each step in order with `--scrape_run_id <run_id>` appended.
#[derive(Debug, Clone)]
pub struct CommandCatalogRefresher {
    steps: Vec<CommandStep>,
}

impl CommandCatalogRefresher {
    pub fn new(steps: Vec<CommandStep>) -> Self {
        Self { steps }
    }

    /// Builds the refresher from the optional scrape and import commands,
    /// skipping whichever is unset.
    pub fn from_commands(scrape: Option<&str>, import: Option<&str>) -> Self {
        let steps = [("scrape", scrape), ("import", import)]
            .into_iter()
            .filter_map(|(name, command)| command.map(|c| CommandStep::new(name, c)))
            .collect();
        Self::new(steps)
    }

    async fn run_step(&self, step: &CommandStep, run_id: &str) -> PortResult<StepOutput> {
        let mut parts = step.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| PortError::Unexpected(format!("step '{}' has an empty command", step.name)))?;

        info!("Running catalog step '{}': {}", step.name, step.command);
        let output = Command::new(program)
            .args(parts)
            .arg("--scrape_run_id")
            .arg(run_id)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PortError::Unexpected(format!("failed to start step '{}': {}", step.name, e)))?;

        Ok(StepOutput {
            step: step.name.clone(),
            // A step killed by a signal has no exit code.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl CatalogRefresher for CommandCatalogRefresher {
    async fn refresh(&self, run_id: &str) -> PortResult<CatalogRefreshReport> {
        if self.steps.is_empty() {
            return Err(PortError::Unexpected(
                "no catalog refresh commands are configured".to_string(),
            ));
        }

        let mut report = CatalogRefreshReport {
            run_id: run_id.to_string(),
            steps: Vec::with_capacity(self.steps.len()),
        };
        for step in &self.steps {
            let output = self.run_step(step, run_id).await?;
            let failed = !output.succeeded();
            if failed {
                warn!("Catalog step '{}' exited with {}", output.step, output.exit_code);
            }
            report.steps.push(output);
            if failed {
                break;
            }
        }
        Ok(report)
    }
}
