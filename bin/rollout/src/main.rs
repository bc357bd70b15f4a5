//! rollout is a CLI tool for deploying dependency-ordered contract plans.

mod cli;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Format, Toml},
};

use cli::Cli;
use rollout_deploy::{
    ArgValue, Environment, Orchestrator, PlanFile, RpcBackend, RunStatus, SeedState,
};

/// Process environment variables with this prefix override file-supplied
/// constants; the remainder of the variable name is the constant name.
const ENV_CONSTANT_PREFIX: &str = "ROLLOUT_CONST_";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let base_dir = cli
        .plan
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let plan_file = PlanFile::load(&cli.plan)?;
    let plan = plan_file.build_plan()?;

    // A dry run validates and orders the plan without reading artifacts or
    // touching the backend.
    if cli.dry_run {
        println!("Execution order for {}:", cli.plan.display());
        for (position, &id) in plan.order().iter().enumerate() {
            let step = plan.step(id);
            println!(
                "  {}. step {} -> {}",
                position + 1,
                id,
                step.label.as_deref().unwrap_or(&step.component)
            );
        }
        return Ok(());
    }

    let registry = plan_file.into_registry(&base_dir)?;

    let env = load_environment(&cli)?;
    let seed = match &cli.seed {
        Some(path) => SeedState::load(path)?,
        None => SeedState::new(),
    };

    let from = cli
        .from
        .context("--from is required unless --dry-run is set")?;
    let backend = RpcBackend::new(cli.rpc_url.clone(), from)?;

    let orchestrator = Orchestrator::new(&registry, &backend);

    // Ctrl+C aborts between steps; the in-flight deployment is left to finish.
    let cancel = orchestrator.cancel_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested, finishing the current step");
            cancel.cancel();
        }
    });

    let report = orchestrator.run(&plan, &env, &seed).await?;

    println!("{}", report.render());
    if let Some(out) = &cli.out {
        report.save(out)?;
    }

    let status = report
        .status
        .context("deployment run did not finalize")?;
    if status != RunStatus::Completed {
        anyhow::bail!("deployment run finished with status {status}");
    }
    Ok(())
}

/// Environment constants come from the optional TOML file, overridden by
/// `ROLLOUT_CONST_*` process environment variables.
fn load_environment(cli: &Cli) -> Result<Environment> {
    let mut constants: BTreeMap<String, ArgValue> = match &cli.env_file {
        Some(path) => Figment::new()
            .merge(Toml::file(path))
            .extract()
            .context(format!(
                "Failed to load environment constants from {}",
                path.display()
            ))?,
        None => BTreeMap::new(),
    };

    for (key, value) in std::env::vars() {
        if let Some(name) = key.strip_prefix(ENV_CONSTANT_PREFIX) {
            let value = serde_json::from_value(serde_json::Value::String(value.clone()))
                .unwrap_or(ArgValue::String(value));
            constants.insert(name.to_string(), value);
        }
    }

    Ok(Environment::from_constants(constants))
}
