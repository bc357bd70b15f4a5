//! Declarative TOML plan files.
//!
//! A plan file enumerates the components (with their build artifacts) and the
//! deployment steps, with argument expressions referencing named environment
//! constants instead of inline addresses:
//!
//! ```toml
//! [[components]]
//! name = "factory"
//! artifact = "build/UniLendLbFactory.json"
//!
//! [[components]]
//! name = "router"
//! artifact = "build/UniLendLbRouter.json"
//!
//! [[steps]]
//! component = "factory"
//!
//! [[steps]]
//! component = "router"
//! args = [
//!     { step_output_ref = { step = 0 } },
//!     { env_constant = "swapFactoryAddress" },
//!     { env_constant = "wrappedNativeTokenAddress" },
//! ]
//! ```

use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactRef, ArtifactRegistry, Component};
use crate::error::PlanError;
use crate::plan::{DeploymentPlan, DeploymentStep};

/// A component entry in a plan file. The bytecode comes either from a build
/// artifact JSON file (a `bytecode` field, as Truffle and Hardhat emit) or
/// inline as hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Unique component name, referenced by steps.
    pub name: String,
    /// Contract name; defaults to the component name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Path to a build artifact JSON file, relative to the plan file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// Inline creation bytecode as hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
    /// Address of an already-deployed instance to reuse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// Build artifact JSON, reduced to the fields this tool reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    contract_name: Option<String>,
    bytecode: String,
}

/// The parsed plan file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanFile {
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub steps: Vec<DeploymentStep>,
}

impl PlanFile {
    /// Load a plan file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read plan from {}", path.display()))?;
        let plan: Self = toml::from_str(&content).context("Failed to parse plan file as TOML")?;
        tracing::info!(
            path = %path.display(),
            components = plan.components.len(),
            steps = plan.steps.len(),
            "Plan file loaded"
        );
        Ok(plan)
    }

    /// Validate the steps and compute the execution order.
    ///
    /// Ordering needs no artifacts, so this works (and a dry run can print
    /// the order) before any artifact file is read.
    pub fn build_plan(&self) -> Result<DeploymentPlan, PlanError> {
        DeploymentPlan::build(self.steps.clone())
    }

    /// Resolve artifacts into a component registry. `base_dir` anchors
    /// relative artifact paths.
    pub fn into_registry(self, base_dir: &Path) -> Result<ArtifactRegistry> {
        let mut registry = ArtifactRegistry::new();
        for spec in self.components {
            let component = spec.into_component(base_dir)?;
            registry.register(component)?;
        }
        Ok(registry)
    }
}

impl ComponentSpec {
    fn into_component(self, base_dir: &Path) -> Result<Component> {
        let (contract, bytecode) = match (&self.artifact, &self.bytecode) {
            (Some(path), None) => {
                let path = base_dir.join(path);
                let content = std::fs::read_to_string(&path)
                    .context(format!("Failed to read artifact from {}", path.display()))?;
                let artifact: ArtifactFile = serde_json::from_str(&content)
                    .context(format!("Failed to parse artifact {}", path.display()))?;
                let contract = self
                    .contract
                    .or(artifact.contract_name)
                    .unwrap_or_else(|| self.name.clone());
                (contract, decode_bytecode(&artifact.bytecode)?)
            }
            (None, Some(hex_str)) => (
                self.contract.unwrap_or_else(|| self.name.clone()),
                decode_bytecode(hex_str)?,
            ),
            _ => bail!(
                "component `{}` must specify exactly one of `artifact` or `bytecode`",
                self.name
            ),
        };

        let mut component = Component::new(self.name, ArtifactRef::new(contract, bytecode));
        if let Some(address) = self.address {
            component = component.deployed_at(address);
        }
        Ok(component)
    }
}

fn decode_bytecode(hex_str: &str) -> Result<Bytes> {
    let stripped = hex_str.trim_start_matches("0x");
    let raw = hex::decode(stripped).context("Invalid bytecode hex")?;
    Ok(Bytes::from(raw))
}
