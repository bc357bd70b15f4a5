//! Deployment plans: steps, argument expressions and topological ordering.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::value::ArgValue;

/// Identifier of a step within a plan: its index in the authored step list.
pub type StepId = usize;

/// An argument expression, evaluated per step just before deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgExpr {
    /// A literal value passed through verbatim.
    Literal(ArgValue),
    /// A named constant looked up in the caller-supplied environment.
    EnvConstant(String),
    /// A reference to an output of another step in the same plan.
    StepOutputRef {
        step: StepId,
        #[serde(default)]
        output: usize,
    },
}

impl ArgExpr {
    /// The step this expression depends on, if any.
    pub fn dependency(&self) -> Option<StepId> {
        match self {
            ArgExpr::StepOutputRef { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// One scheduled deployment of a component. Never mutated after plan
/// construction; consumed exactly once during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    /// Name of the component to deploy.
    pub component: String,
    /// Constructor argument expressions, in call order.
    #[serde(default)]
    pub args: Vec<ArgExpr>,
    /// Optional human-readable label used in logs and the report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DeploymentStep {
    /// Create a step for the named component with no arguments.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            args: Vec::new(),
            label: None,
        }
    }

    /// Append an argument expression.
    pub fn arg(mut self, expr: ArgExpr) -> Self {
        self.args.push(expr);
        self
    }

    /// Set the human-readable label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Distinct steps this step depends on, in ascending order.
    pub fn dependencies(&self) -> BTreeSet<StepId> {
        self.args.iter().filter_map(ArgExpr::dependency).collect()
    }
}

/// A validated, topologically ordered deployment plan.
///
/// Steps are read-only inputs; the execution order is fixed at build time so
/// that two runs of the same plan always deploy in the same sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    steps: Vec<DeploymentStep>,
    order: Vec<StepId>,
}

impl DeploymentPlan {
    /// Validate the step list and compute the execution order.
    ///
    /// Ordering is Kahn's algorithm with declaration order as the tie-break
    /// among ready steps, so the result is deterministic and matches source
    /// order whenever dependencies allow it.
    pub fn build(steps: Vec<DeploymentStep>) -> Result<Self, PlanError> {
        // Reject references to steps that do not exist before looking at
        // cycles, so the caller sees the most specific error.
        for (id, step) in steps.iter().enumerate() {
            for target in step.dependencies() {
                if target >= steps.len() {
                    return Err(PlanError::DanglingReference { step: id, target });
                }
            }
        }

        let mut indegree: BTreeMap<StepId, usize> = (0..steps.len()).map(|id| (id, 0)).collect();
        let mut dependents: BTreeMap<StepId, Vec<StepId>> = BTreeMap::new();
        for (id, step) in steps.iter().enumerate() {
            for target in step.dependencies() {
                *indegree.get_mut(&id).unwrap() += 1;
                dependents.entry(target).or_default().push(id);
            }
        }

        // Ready set is ordered by step id, which is declaration order.
        let mut ready: BTreeSet<StepId> = indegree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(steps.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for &dependent in dependents.get(&id).into_iter().flatten() {
                let deg = indegree.get_mut(&dependent).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < steps.len() {
            // Every unordered step sits on or behind a cycle; report the
            // first one for a stable message.
            let step = (0..steps.len())
                .find(|id| !order.contains(id))
                .expect("at least one step is unordered");
            return Err(PlanError::CyclicDependency { step });
        }

        Ok(Self { steps, order })
    }

    /// The execution order as step ids.
    pub fn order(&self) -> &[StepId] {
        &self.order
    }

    /// The authored steps, in declaration order.
    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    /// Look up a step by id.
    pub fn step(&self, id: StepId) -> &DeploymentStep {
        &self.steps[id]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with_deps(component: &str, deps: &[StepId]) -> DeploymentStep {
        deps.iter().fold(DeploymentStep::new(component), |s, &d| {
            s.arg(ArgExpr::StepOutputRef { step: d, output: 0 })
        })
    }

    #[test]
    fn test_empty_plan() {
        let plan = DeploymentPlan::build(Vec::new()).unwrap();
        assert!(plan.is_empty());
        assert!(plan.order().is_empty());
    }

    #[test]
    fn test_declaration_order_without_dependencies() {
        let plan = DeploymentPlan::build(vec![
            DeploymentStep::new("a"),
            DeploymentStep::new("b"),
            DeploymentStep::new("c"),
        ])
        .unwrap();
        assert_eq!(plan.order(), &[0, 1, 2]);
    }

    #[test]
    fn test_references_respected() {
        // Declared backwards: step 0 depends on step 2.
        let plan = DeploymentPlan::build(vec![
            step_with_deps("router", &[2]),
            step_with_deps("pair", &[0, 2]),
            DeploymentStep::new("factory"),
        ])
        .unwrap();
        assert_eq!(plan.order(), &[2, 0, 1]);
    }

    #[test]
    fn test_every_step_after_its_dependencies() {
        let plan = DeploymentPlan::build(vec![
            DeploymentStep::new("a"),
            step_with_deps("b", &[0]),
            step_with_deps("c", &[0]),
            step_with_deps("d", &[1, 2]),
        ])
        .unwrap();

        let position = |id: StepId| plan.order().iter().position(|&o| o == id).unwrap();
        for (id, step) in plan.steps().iter().enumerate() {
            for dep in step.dependencies() {
                assert!(position(dep) < position(id));
            }
        }
    }

    #[test]
    fn test_deterministic_ordering() {
        let steps = vec![
            DeploymentStep::new("a"),
            DeploymentStep::new("b"),
            step_with_deps("c", &[0, 1]),
        ];
        let first = DeploymentPlan::build(steps.clone()).unwrap();
        let second = DeploymentPlan::build(steps).unwrap();
        assert_eq!(first.order(), second.order());
    }

    #[test]
    fn test_cycle_detected() {
        let err = DeploymentPlan::build(vec![
            step_with_deps("a", &[1]),
            step_with_deps("b", &[0]),
        ])
        .unwrap_err();
        assert_eq!(err, PlanError::CyclicDependency { step: 0 });
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let err = DeploymentPlan::build(vec![step_with_deps("a", &[0])]).unwrap_err();
        assert_eq!(err, PlanError::CyclicDependency { step: 0 });
    }

    #[test]
    fn test_dangling_reference() {
        let err = DeploymentPlan::build(vec![step_with_deps("a", &[7])]).unwrap_err();
        assert_eq!(err, PlanError::DanglingReference { step: 0, target: 7 });
    }

    #[test]
    fn test_duplicate_references_counted_once() {
        // Referencing the same dependency twice must not wedge the indegree
        // bookkeeping.
        let plan = DeploymentPlan::build(vec![
            DeploymentStep::new("factory"),
            DeploymentStep::new("router")
                .arg(ArgExpr::StepOutputRef { step: 0, output: 0 })
                .arg(ArgExpr::StepOutputRef { step: 0, output: 1 }),
        ])
        .unwrap();
        assert_eq!(plan.order(), &[0, 1]);
    }
}
