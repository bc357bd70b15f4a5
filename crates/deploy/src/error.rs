//! Error taxonomy for plan validation, argument resolution and execution.
//!
//! Plan-level errors are detected before any deployment occurs and carry no
//! side effects. Resolution errors fail the invoking step before its external
//! call. Deployment failures always surface the underlying cause, since a
//! failed external call may still have partial side effects the caller must
//! know about.

use thiserror::Error;

use crate::plan::StepId;

/// Errors detected while registering components or validating a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A component with the same name is already registered.
    #[error("component `{0}` is already registered")]
    DuplicateComponent(String),

    /// A step names a component the registry does not know.
    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    /// The plan's step references form a cycle.
    #[error("deployment plan contains a dependency cycle through step {step}")]
    CyclicDependency { step: StepId },

    /// A step references a step id that does not exist in the plan.
    #[error("step {step} references non-existent step {target}")]
    DanglingReference { step: StepId, target: StepId },
}

/// Errors detected while materializing a step's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// A named environment constant was not supplied by the caller.
    #[error("missing environment constant `{0}`")]
    MissingEnvConstant(String),

    /// A step output was referenced before the step executed, or the output
    /// index is out of range. Unreachable given a correct topological order.
    #[error("output {output} of step {step} is not available for resolution")]
    UnresolvedReference { step: StepId, output: usize },
}

/// Failure raised by the external deploy boundary, with the cause attached.
#[derive(Debug, Error)]
#[error("deployment failed: {0:#}")]
pub struct DeploymentFailed(pub anyhow::Error);

/// Errors that abort a run before or outside of step execution.
#[derive(Debug, Error)]
pub enum RunError {
    /// The plan failed validation; nothing was deployed.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Internal invariant violation: a step was recorded twice.
    #[error("step {step} was recorded twice in the deployment report")]
    DuplicateRecord { step: StepId },
}
