//! Integration tests for the deployment orchestrator.
//!
//! The deploy boundary is mocked in-process: the mock hands out
//! deterministic addresses and records every call, so tests can assert both
//! on the report and on what actually crossed the boundary.

use std::sync::Mutex;

use alloy_core::primitives::{Address, B256, U256, address};
use anyhow::Result;
use rollout_deploy::{
    ArgExpr, ArgValue, ArtifactRef, ArtifactRegistry, Component, DeployBackend, DeploymentPlan,
    DeploymentStep, Environment, Orchestrator, PlanError, ResolvedOutput, RunError, RunStatus,
    SeedState, StepOutcome,
};

/// Initialize tracing for tests (idempotent across tests in one process).
fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Mock deploy backend with deterministic addresses and optional failure
/// injection per contract name.
#[derive(Default)]
struct MockBackend {
    calls: Mutex<Vec<(String, Vec<ArgValue>)>>,
    fail_on: Option<String>,
}

impl MockBackend {
    fn new() -> Self {
        Self::default()
    }

    fn failing_on(contract: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(contract.to_string()),
        }
    }

    fn calls(&self) -> Vec<(String, Vec<ArgValue>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl DeployBackend for MockBackend {
    async fn deploy(
        &self,
        artifact: &ArtifactRef,
        args: &[ArgValue],
        _env: &Environment,
    ) -> Result<ResolvedOutput> {
        if self.fail_on.as_deref() == Some(artifact.contract.as_str()) {
            anyhow::bail!("simulated deploy failure for {}", artifact.contract);
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push((artifact.contract.clone(), args.to_vec()));
        let n = calls.len() as u8;
        Ok(ResolvedOutput::new(Address::repeat_byte(0xf0 + n)).with_tx_hash(B256::repeat_byte(n)))
    }
}

fn component(name: &str) -> Component {
    Component::new(name, ArtifactRef::new(name, vec![0x60, 0x01].into()))
}

fn registry_of(names: &[&str]) -> ArtifactRegistry {
    let mut registry = ArtifactRegistry::new();
    for name in names {
        registry.register(component(name)).unwrap();
    }
    registry
}

/// The original two-step migration expressed as a plan: a factory with no
/// arguments, then a router taking the factory address plus two named
/// environment constants.
fn factory_router_plan() -> DeploymentPlan {
    DeploymentPlan::build(vec![
        DeploymentStep::new("factory"),
        DeploymentStep::new("router")
            .arg(ArgExpr::StepOutputRef { step: 0, output: 0 })
            .arg(ArgExpr::EnvConstant("swapFactoryAddress".to_string()))
            .arg(ArgExpr::EnvConstant("wrappedNativeTokenAddress".to_string())),
    ])
    .unwrap()
}

fn swap_env() -> Environment {
    Environment::new()
        .with_constant(
            "swapFactoryAddress",
            address!("00000000000000000000000000000000000000aa"),
        )
        .with_constant(
            "wrappedNativeTokenAddress",
            address!("00000000000000000000000000000000000000bb"),
        )
}

#[tokio::test]
async fn test_factory_router_end_to_end() {
    init_test_tracing();
    let registry = registry_of(&["factory", "router"]);
    let backend = MockBackend::new();
    let orchestrator = Orchestrator::new(&registry, &backend);

    let report = orchestrator
        .run(&factory_router_plan(), &swap_env(), &SeedState::new())
        .await
        .unwrap();

    assert_eq!(report.status, Some(RunStatus::Completed));
    let records = report.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].component, "factory");
    assert_eq!(records[1].component, "router");
    assert!(matches!(records[0].outcome, StepOutcome::Deployed { .. }));
    assert!(matches!(records[1].outcome, StepOutcome::Deployed { .. }));

    // The router received the factory's fresh address followed by the two
    // environment constants, in declaration order.
    let calls = backend.calls();
    assert_eq!(calls[0], ("factory".to_string(), vec![]));
    let factory_address = records[0].outcome.output().unwrap().address;
    assert_eq!(
        calls[1].1,
        vec![
            ArgValue::Address(factory_address),
            ArgValue::Address(address!("00000000000000000000000000000000000000aa")),
            ArgValue::Address(address!("00000000000000000000000000000000000000bb")),
        ]
    );
}

#[tokio::test]
async fn test_fail_fast_aborts_dependents() {
    init_test_tracing();
    // Chain a -> b -> c with b failing: a deployed, b errored, c aborted.
    let registry = registry_of(&["a", "b", "c"]);
    let backend = MockBackend::failing_on("b");
    let orchestrator = Orchestrator::new(&registry, &backend);

    let plan = DeploymentPlan::build(vec![
        DeploymentStep::new("a"),
        DeploymentStep::new("b").arg(ArgExpr::StepOutputRef { step: 0, output: 0 }),
        DeploymentStep::new("c").arg(ArgExpr::StepOutputRef { step: 1, output: 0 }),
    ])
    .unwrap();

    let report = orchestrator
        .run(&plan, &Environment::new(), &SeedState::new())
        .await
        .unwrap();

    assert_eq!(report.status, Some(RunStatus::Failed));
    let records = report.records();
    assert!(matches!(records[0].outcome, StepOutcome::Deployed { .. }));
    match &records[1].outcome {
        StepOutcome::Errored { cause } => assert!(cause.contains("simulated deploy failure")),
        other => panic!("expected errored outcome, got {other:?}"),
    }
    assert_eq!(records[2].outcome, StepOutcome::Aborted);

    // Only step a reached the backend.
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn test_seeded_step_is_skipped_and_never_redeployed() {
    init_test_tracing();
    let registry = registry_of(&["factory", "router"]);
    let backend = MockBackend::new();
    let orchestrator = Orchestrator::new(&registry, &backend);

    let factory_address = address!("00000000000000000000000000000000000000f0");
    let seed = SeedState::from_addresses(
        [("factory".to_string(), factory_address)].into_iter().collect(),
    );

    let report = orchestrator
        .run(&factory_router_plan(), &swap_env(), &seed)
        .await
        .unwrap();

    assert_eq!(report.status, Some(RunStatus::Completed));
    match &report.records()[0].outcome {
        StepOutcome::Skipped { output } => assert_eq!(output.address, factory_address),
        other => panic!("expected skipped outcome, got {other:?}"),
    }

    // The backend saw only the router, and the router resolved the seeded
    // factory address.
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "router");
    assert_eq!(calls[0].1[0], ArgValue::Address(factory_address));
}

#[tokio::test]
async fn test_already_deployed_component_is_skipped() {
    init_test_tracing();
    let mut registry = ArtifactRegistry::new();
    let known = address!("00000000000000000000000000000000000000ee");
    registry.register(component("factory").deployed_at(known)).unwrap();

    let backend = MockBackend::new();
    let orchestrator = Orchestrator::new(&registry, &backend);
    let plan = DeploymentPlan::build(vec![DeploymentStep::new("factory")]).unwrap();

    let report = orchestrator
        .run(&plan, &Environment::new(), &SeedState::new())
        .await
        .unwrap();

    assert_eq!(report.status, Some(RunStatus::Completed));
    assert!(backend.calls().is_empty());
    assert_eq!(report.address_book().get("factory"), Some(&known));
}

#[tokio::test]
async fn test_unknown_component_aborts_with_zero_side_effects() {
    init_test_tracing();
    let registry = registry_of(&["factory"]);
    let backend = MockBackend::new();
    let orchestrator = Orchestrator::new(&registry, &backend);

    let plan = DeploymentPlan::build(vec![
        DeploymentStep::new("factory"),
        DeploymentStep::new("router"),
    ])
    .unwrap();

    let err = orchestrator
        .run(&plan, &Environment::new(), &SeedState::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Plan(PlanError::UnknownComponent(name)) if name == "router"
    ));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_missing_env_constant_fails_before_the_external_call() {
    init_test_tracing();
    let registry = registry_of(&["factory", "router"]);
    let backend = MockBackend::new();
    let orchestrator = Orchestrator::new(&registry, &backend);

    // Environment is missing both constants the router needs.
    let report = orchestrator
        .run(&factory_router_plan(), &Environment::new(), &SeedState::new())
        .await
        .unwrap();

    assert_eq!(report.status, Some(RunStatus::Failed));
    match &report.records()[1].outcome {
        StepOutcome::Errored { cause } => {
            assert!(cause.contains("missing environment constant `swapFactoryAddress`"));
        }
        other => panic!("expected errored outcome, got {other:?}"),
    }

    // The factory deployed; the router never reached the backend.
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn test_cancellation_aborts_remaining_steps() {
    init_test_tracing();
    let registry = registry_of(&["factory", "router"]);
    let backend = MockBackend::new();
    let orchestrator = Orchestrator::new(&registry, &backend);

    // Cancel before the run starts: every step is checked between steps, so
    // all of them are aborted and nothing reaches the backend.
    orchestrator.cancel_signal().cancel();

    let report = orchestrator
        .run(&factory_router_plan(), &swap_env(), &SeedState::new())
        .await
        .unwrap();

    assert_eq!(report.status, Some(RunStatus::Aborted));
    for record in report.records() {
        assert_eq!(record.outcome, StepOutcome::Aborted);
    }
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_two_runs_are_deterministic() {
    init_test_tracing();
    let registry = registry_of(&["factory", "router"]);
    let env = swap_env();
    let plan = factory_router_plan();

    let first_backend = MockBackend::new();
    let first = Orchestrator::new(&registry, &first_backend)
        .run(&plan, &env, &SeedState::new())
        .await
        .unwrap();

    let second_backend = MockBackend::new();
    let second = Orchestrator::new(&registry, &second_backend)
        .run(&plan, &env, &SeedState::new())
        .await
        .unwrap();

    assert_eq!(first.records(), second.records());
    assert_eq!(first_backend.calls(), second_backend.calls());
}

#[tokio::test]
async fn test_report_feeds_the_next_run_as_seed_state() {
    init_test_tracing();
    let registry = registry_of(&["a", "b"]);
    let plan = DeploymentPlan::build(vec![
        DeploymentStep::new("a"),
        DeploymentStep::new("b").arg(ArgExpr::StepOutputRef { step: 0, output: 0 }),
    ])
    .unwrap();

    // First run fails at b.
    let failing = MockBackend::failing_on("b");
    let first = Orchestrator::new(&registry, &failing)
        .run(&plan, &Environment::new(), &SeedState::new())
        .await
        .unwrap();
    assert_eq!(first.status, Some(RunStatus::Failed));

    // Corrected re-run skips a and only deploys b.
    let backend = MockBackend::new();
    let seed = SeedState::from_report(&first);
    let second = Orchestrator::new(&registry, &backend)
        .run(&plan, &Environment::new(), &seed)
        .await
        .unwrap();

    assert_eq!(second.status, Some(RunStatus::Completed));
    assert!(matches!(second.records()[0].outcome, StepOutcome::Skipped { .. }));
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(backend.calls()[0].0, "b");
}

#[tokio::test]
async fn test_literal_and_uint_arguments() {
    init_test_tracing();
    let registry = registry_of(&["vault"]);
    let backend = MockBackend::new();
    let orchestrator = Orchestrator::new(&registry, &backend);

    let plan = DeploymentPlan::build(vec![
        DeploymentStep::new("vault")
            .arg(ArgExpr::Literal(ArgValue::Uint(U256::from(1_000u64))))
            .arg(ArgExpr::Literal(ArgValue::Bool(false))),
    ])
    .unwrap();

    let report = orchestrator
        .run(&plan, &Environment::new(), &SeedState::new())
        .await
        .unwrap();

    assert_eq!(report.status, Some(RunStatus::Completed));
    assert_eq!(
        backend.calls()[0].1,
        vec![ArgValue::Uint(U256::from(1_000u64)), ArgValue::Bool(false)]
    );
}
