//! The orchestrator: walks a plan in topological order and executes it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy_core::primitives::Address;
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactRegistry;
use crate::backend::DeployBackend;
use crate::error::RunError;
use crate::plan::DeploymentPlan;
use crate::report::{DeploymentReport, RunStatus, StepOutcome};
use crate::resolve::{Environment, ResolutionTable, resolve_all};
use crate::value::ResolvedOutput;

/// Cooperative cancellation flag, checked between steps only.
///
/// An in-flight deployment is allowed to finish: interrupting it would leave
/// ambiguous external state.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The run aborts before the next step starts.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outputs recorded by a prior partial run, keyed by component name.
///
/// A step whose component appears here is skipped instead of redeployed,
/// which makes re-execution after a partial failure idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedState {
    addresses: BTreeMap<String, Address>,
}

impl SeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_addresses(addresses: BTreeMap<String, Address>) -> Self {
        Self { addresses }
    }

    /// Seed state from a prior run's report: every step that produced an
    /// output is reused.
    pub fn from_report(report: &DeploymentReport) -> Self {
        Self {
            addresses: report.address_book(),
        }
    }

    /// Load seed state from a prior run's saved report.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let report = DeploymentReport::load(path)
            .context(format!("Failed to load seed state from {}", path.display()))?;
        Ok(Self::from_report(&report))
    }

    pub fn get(&self, component: &str) -> Option<Address> {
        self.addresses.get(component).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Walks a validated plan in topological order, deploying each step exactly
/// once through the backend and recording outcomes in the report.
///
/// Execution is strictly sequential: a step's arguments may depend on the
/// live output of an earlier step, and sequential order keeps reporting
/// deterministic.
pub struct Orchestrator<'a, B> {
    registry: &'a ArtifactRegistry,
    backend: &'a B,
    cancel: CancelSignal,
}

impl<'a, B: DeployBackend> Orchestrator<'a, B> {
    pub fn new(registry: &'a ArtifactRegistry, backend: &'a B) -> Self {
        Self {
            registry,
            backend,
            cancel: CancelSignal::new(),
        }
    }

    /// A handle that cancels this orchestrator's run between steps.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Execute the plan and return the finalized report.
    ///
    /// Plan-level errors (an unknown component) abort before any deployment
    /// with zero external effect. A step failure fails the run fast: later
    /// steps are recorded as `Aborted`, already deployed steps are preserved
    /// in the report so a corrected re-run can skip them.
    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        env: &Environment,
        seed: &SeedState,
    ) -> Result<DeploymentReport, RunError> {
        // Validate component references up front, before any side effect.
        for step in plan.steps() {
            self.registry.lookup(&step.component)?;
        }

        tracing::info!(steps = plan.len(), "Starting deployment run...");

        let mut report = DeploymentReport::new();
        let mut table = ResolutionTable::new();
        let mut failed = false;
        let mut cancelled = false;

        for &id in plan.order() {
            let step = plan.step(id);

            if failed || cancelled {
                report.record(id, step, StepOutcome::Aborted)?;
                continue;
            }

            if self.cancel.is_cancelled() {
                tracing::warn!(step = id, "Cancellation requested, aborting remaining steps");
                cancelled = true;
                report.record(id, step, StepOutcome::Aborted)?;
                continue;
            }

            let component = self
                .registry
                .lookup(&step.component)
                .expect("components were validated before the run started");

            // Waiting -> Skipped: reuse a previously recorded instance.
            let prior = seed.get(&step.component).or(component.deployed);
            if let Some(address) = prior {
                tracing::info!(
                    step = id,
                    component = %step.component,
                    %address,
                    "Component already deployed, skipping"
                );
                let output = ResolvedOutput::new(address);
                table.insert(id, output.clone());
                report.record(id, step, StepOutcome::Skipped { output })?;
                continue;
            }

            // Waiting -> Resolving.
            let args = match resolve_all(&step.args, &table, env) {
                Ok(args) => args,
                Err(cause) => {
                    tracing::error!(step = id, component = %step.component, %cause, "Argument resolution failed");
                    failed = true;
                    report.record(
                        id,
                        step,
                        StepOutcome::Errored {
                            cause: cause.to_string(),
                        },
                    )?;
                    continue;
                }
            };

            // Resolving -> Deploying.
            match self.registry.deploy(self.backend, component, &args, env).await {
                Ok(output) => {
                    table.insert(id, output.clone());
                    report.record(id, step, StepOutcome::Deployed { output })?;
                }
                Err(cause) => {
                    tracing::error!(step = id, component = %step.component, %cause, "Deployment failed");
                    failed = true;
                    report.record(
                        id,
                        step,
                        StepOutcome::Errored {
                            cause: cause.to_string(),
                        },
                    )?;
                }
            }
        }

        let status = if failed {
            RunStatus::Failed
        } else if cancelled {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        };

        tracing::info!(%status, "Deployment run finished");
        Ok(report.finalize(status))
    }
}
