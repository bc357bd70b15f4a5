//! rollout-deploy - Dependency-ordered contract deployment library.
//!
//! This crate provides the orchestration core for deploying a set of
//! interdependent contracts: it validates a deployment plan, orders it
//! topologically, resolves constructor arguments against environment
//! constants and earlier outputs, executes each step exactly once through a
//! pluggable backend, and reports the results.

mod artifact;
mod backend;
mod error;
mod plan;
mod planfile;
mod report;
mod resolve;
mod rpc;
mod runner;
mod value;

pub use artifact::{ArtifactRef, ArtifactRegistry, Component};
pub use backend::DeployBackend;
pub use error::{DeploymentFailed, PlanError, ResolutionError, RunError};
pub use plan::{ArgExpr, DeploymentPlan, DeploymentStep, StepId};
pub use planfile::{ComponentSpec, PlanFile};
pub use report::{DeploymentReport, RunStatus, StepOutcome, StepRecord};
pub use resolve::{Environment, ResolutionTable, resolve, resolve_all};
pub use rpc::RpcBackend;
pub use runner::{CancelSignal, Orchestrator, SeedState};
pub use value::{ArgValue, ResolvedOutput};
