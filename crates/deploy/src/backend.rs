//! The external deploy call boundary.

use std::future::Future;

use anyhow::Result;

use crate::artifact::ArtifactRef;
use crate::resolve::Environment;
use crate::value::{ArgValue, ResolvedOutput};

/// Backend that performs the actual deployment of an artifact.
///
/// This is the sole I/O boundary of the orchestration core. A call may take
/// arbitrarily long (network round-trip) and is never retried by the core;
/// retry policy belongs to the caller, since blind retries risk duplicate
/// side effects.
pub trait DeployBackend: Send + Sync {
    /// Deploy `artifact` with fully resolved constructor arguments and return
    /// the deployed address plus secondary outputs.
    fn deploy(
        &self,
        artifact: &ArtifactRef,
        args: &[ArgValue],
        env: &Environment,
    ) -> impl Future<Output = Result<ResolvedOutput>> + Send;
}
