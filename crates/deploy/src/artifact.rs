//! Artifact registry: named components and the external deploy call point.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::backend::DeployBackend;
use crate::error::{DeploymentFailed, PlanError};
use crate::resolve::Environment;
use crate::value::{ArgValue, ResolvedOutput};

/// Opaque handle to deployable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Contract name inside the build artifact.
    pub contract: String,
    /// Creation bytecode.
    pub bytecode: Bytes,
}

impl ArtifactRef {
    pub fn new(contract: impl Into<String>, bytecode: Bytes) -> Self {
        Self {
            contract: contract.into(),
            bytecode,
        }
    }
}

/// A deployable unit. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Unique name the plan refers to.
    pub name: String,
    /// The code to deploy.
    pub artifact: ArtifactRef,
    /// Address of an existing instance to reuse instead of redeploying.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed: Option<Address>,
}

impl Component {
    pub fn new(name: impl Into<String>, artifact: ArtifactRef) -> Self {
        Self {
            name: name.into(),
            artifact,
            deployed: None,
        }
    }

    /// Mark the component as already deployed at the given address.
    pub fn deployed_at(mut self, address: Address) -> Self {
        self.deployed = Some(address);
        self
    }
}

/// Holds component definitions and performs the single external deploy call.
///
/// The registry does not deduplicate deployments; idempotency across runs is
/// the orchestrator's concern (seed state and `deployed` addresses).
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    components: BTreeMap<String, Component>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component definition.
    pub fn register(&mut self, component: Component) -> Result<(), PlanError> {
        if self.components.contains_key(&component.name) {
            return Err(PlanError::DuplicateComponent(component.name));
        }
        self.components.insert(component.name.clone(), component);
        Ok(())
    }

    /// Look up a component by name.
    pub fn lookup(&self, name: &str) -> Result<&Component, PlanError> {
        self.components
            .get(name)
            .ok_or_else(|| PlanError::UnknownComponent(name.to_string()))
    }

    /// Deploy a component through the backend. This is the only place where
    /// I/O occurs; any transport, validation or remote-execution error is
    /// surfaced as [`DeploymentFailed`] with the cause attached.
    pub async fn deploy<B: DeployBackend>(
        &self,
        backend: &B,
        component: &Component,
        args: &[ArgValue],
        env: &Environment,
    ) -> Result<ResolvedOutput, DeploymentFailed> {
        tracing::info!(
            component = %component.name,
            contract = %component.artifact.contract,
            args = args.len(),
            "Deploying component..."
        );

        let output = backend
            .deploy(&component.artifact, args, env)
            .await
            .map_err(DeploymentFailed)?;

        tracing::info!(
            component = %component.name,
            address = %output.address,
            "Deployment done"
        );
        Ok(output)
    }
}
