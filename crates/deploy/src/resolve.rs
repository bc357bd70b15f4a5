//! Argument resolution against the environment and prior step outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;
use crate::plan::{ArgExpr, StepId};
use crate::value::{ArgValue, ResolvedOutput};

/// Caller-supplied named constants (addresses, endpoints, credential
/// handles). Missing constants are a reported error, never a silent default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    constants: BTreeMap<String, ArgValue>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_constants(constants: BTreeMap<String, ArgValue>) -> Self {
        Self { constants }
    }

    /// Add a constant, replacing any previous value under the same name.
    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    /// Look up a constant by name.
    pub fn get(&self, name: &str) -> Result<&ArgValue, ResolutionError> {
        self.constants
            .get(name)
            .ok_or_else(|| ResolutionError::MissingEnvConstant(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

/// Outputs of already executed steps, keyed by step id.
///
/// Owned exclusively by one orchestrator run; a step's output is inserted
/// before any dependent step starts resolving.
#[derive(Debug, Clone, Default)]
pub struct ResolutionTable {
    outputs: BTreeMap<StepId, ResolvedOutput>,
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, step: StepId, output: ResolvedOutput) {
        self.outputs.insert(step, output);
    }

    pub fn get(&self, step: StepId) -> Option<&ResolvedOutput> {
        self.outputs.get(&step)
    }
}

/// Evaluate a single argument expression.
pub fn resolve(
    expr: &ArgExpr,
    table: &ResolutionTable,
    env: &Environment,
) -> Result<ArgValue, ResolutionError> {
    match expr {
        ArgExpr::Literal(value) => Ok(value.clone()),
        ArgExpr::EnvConstant(name) => env.get(name).cloned(),
        ArgExpr::StepOutputRef { step, output } => table
            .get(*step)
            .and_then(|resolved| resolved.output(*output))
            .ok_or(ResolutionError::UnresolvedReference {
                step: *step,
                output: *output,
            }),
    }
}

/// Evaluate all of a step's argument expressions, in call order.
pub fn resolve_all(
    args: &[ArgExpr],
    table: &ResolutionTable,
    env: &Environment,
) -> Result<Vec<ArgValue>, ResolutionError> {
    args.iter().map(|expr| resolve(expr, table, env)).collect()
}
