//! Append-only deployment report and its rendered/persisted forms.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use alloy_core::primitives::Address;
use anyhow::Context;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::plan::{DeploymentStep, StepId};
use crate::value::ResolvedOutput;

/// Terminal state of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RunStatus {
    /// All steps deployed or skipped.
    Completed,
    /// A step errored; remaining steps were not attempted.
    Failed,
    /// The caller cancelled the run between steps.
    Aborted,
}

/// Terminal state of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case", tag = "kind")]
#[strum(serialize_all = "kebab-case")]
pub enum StepOutcome {
    /// Freshly deployed through the backend.
    Deployed { output: ResolvedOutput },
    /// Reused a previously recorded instance; the backend was not called.
    Skipped { output: ResolvedOutput },
    /// Resolution or deployment failed; the cause is preserved.
    Errored { cause: String },
    /// Never attempted because the run failed fast or was cancelled.
    Aborted,
}

impl StepOutcome {
    /// The resolved output, for outcomes that produced one.
    pub fn output(&self) -> Option<&ResolvedOutput> {
        match self {
            StepOutcome::Deployed { output } | StepOutcome::Skipped { output } => Some(output),
            _ => None,
        }
    }
}

/// One report line: the step, the component it targeted, and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: StepId,
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub outcome: StepOutcome,
}

/// Ordered log of per-step outcomes for a single run.
///
/// Created at run start, appended to exactly once per step, and finalized at
/// run end or abort. The finalized report is what callers log, persist and
/// feed back into later runs as seed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// `None` while the run is still in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    records: Vec<StepRecord>,
    #[serde(skip)]
    recorded: BTreeSet<StepId>,
}

impl DeploymentReport {
    /// Start an empty report for a new run.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            status: None,
            records: Vec::new(),
            recorded: BTreeSet::new(),
        }
    }

    /// Append the outcome of one step. Appending the same step twice is an
    /// internal invariant violation.
    pub fn record(
        &mut self,
        step: StepId,
        definition: &DeploymentStep,
        outcome: StepOutcome,
    ) -> Result<(), RunError> {
        if !self.recorded.insert(step) {
            return Err(RunError::DuplicateRecord { step });
        }
        self.records.push(StepRecord {
            step,
            component: definition.component.clone(),
            label: definition.label.clone(),
            outcome,
        });
        Ok(())
    }

    /// Close the report with the run's terminal status.
    pub fn finalize(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self.finished_at = Some(Utc::now());
        self
    }

    /// Per-step records in the order they were appended (execution order).
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Component name to deployed address, for every step that produced an
    /// output. Downstream runs consume this as seed state.
    pub fn address_book(&self) -> BTreeMap<String, Address> {
        self.records
            .iter()
            .filter_map(|r| {
                r.outcome
                    .output()
                    .map(|out| (r.component.clone(), out.address))
            })
            .collect()
    }

    /// Save the report as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment report")?;
        std::fs::write(path, content)
            .context(format!("Failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Deployment report saved");
        Ok(())
    }

    /// Load a previously saved report.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read report from {}", path.display()))?;
        let mut report: Self =
            serde_json::from_str(&content).context("Failed to parse report as JSON")?;
        report.recorded = report.records.iter().map(|r| r.step).collect();
        Ok(report)
    }

    /// Render a human-readable summary table.
    pub fn render(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["step", "component", "outcome", "address", "detail"]);
        for record in &self.records {
            let (address, detail) = match &record.outcome {
                StepOutcome::Deployed { output } | StepOutcome::Skipped { output } => (
                    output.address.to_string(),
                    output
                        .tx_hash
                        .map(|h| format!("tx {h}"))
                        .unwrap_or_default(),
                ),
                StepOutcome::Errored { cause } => (String::new(), cause.clone()),
                StepOutcome::Aborted => (String::new(), "not attempted".to_string()),
            };
            table.add_row(vec![
                Cell::new(record.step),
                Cell::new(record.label.as_deref().unwrap_or(&record.component)),
                Cell::new(&record.outcome),
                Cell::new(address),
                Cell::new(detail),
            ]);
        }
        table
    }
}

impl Default for DeploymentReport {
    fn default() -> Self {
        Self::new()
    }
}
