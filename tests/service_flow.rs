use std::sync::Arc;
use std::time::Duration;

use chem_core::{InMemoryRunStore, RunRepository};
use chem_domain::{Agent, MutationLibrary, RunConfig, RunStatus};
use chemflow_discovery::{DiscoveryConfig, DiscoveryService, ServiceError};
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(30);

fn service() -> (DiscoveryService<Arc<InMemoryRunStore>>, tokio::task::JoinHandle<()>) {
    let library = Arc::new(MutationLibrary::builtin().expect("catálogo"));
    DiscoveryService::start(Arc::new(InMemoryRunStore::new()), library, &DiscoveryConfig::default())
}

#[tokio::test]
async fn submit_returns_immediately_and_worker_completes_the_run() {
    let (svc, _worker) = service();
    let id = svc.submit(RunConfig::new(vec!["CCO".into()], 1, 5, 3)).await.expect("submit");
    let done = svc.wait_for_terminal(id, WAIT).await.expect("terminal");
    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.current_round, 1);
    assert!(done.result_set.as_ref().is_some_and(|r| r.len() <= 3));

    let molecules = assert_ok!(svc.molecules(id).await);
    assert_eq!(molecules[0].structure, "CCO");
    assert_eq!(molecules[0].round, 0);
    assert!(molecules.iter().skip(1).all(|m| m.parent.is_some() && m.round == 1));

    let trace = assert_ok!(svc.trace(id).await);
    assert!(trace.windows(2).all(|w| w[1].seq == w[0].seq + 1));
    assert_eq!(trace.first().map(|t| t.agent.as_str()), Some(Agent::RunStateMachine.as_str()));
    assert!(trace.iter().all(|t| !t.summary.is_empty()));
}

#[tokio::test]
async fn redelivery_of_a_completed_run_writes_nothing() {
    let (svc, _worker) = service();
    let id = svc.submit(RunConfig::new(vec!["Oc1ccccc1".into()], 2, 6, 3)).await.expect("submit");
    let first = svc.wait_for_terminal(id, WAIT).await.expect("terminal");
    let trace_len = svc.trace(id).await.expect("traza").len();

    svc.redeliver(id).expect("redelivery");
    svc.redeliver(id).expect("redelivery");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let again = svc.status(id).await.expect("estado");
    assert_eq!(again.result_set, first.result_set);
    assert_eq!(again.result_fingerprint, first.result_fingerprint);
    assert_eq!(svc.trace(id).await.expect("traza").len(), trace_len);
}

#[tokio::test]
async fn independent_runs_progress_concurrently() {
    let (svc, _worker) = service();
    let seeds = ["CCO", "CCN", "Oc1ccccc1", "Nc1ccccc1"];
    let mut ids = Vec::new();
    for seed in seeds {
        ids.push(svc.submit(RunConfig::new(vec![seed.to_string()], 2, 5, 2)).await.expect("submit"));
    }
    for id in &ids {
        let view = svc.wait_for_terminal(*id, WAIT).await.expect("terminal");
        assert_eq!(view.status, RunStatus::Completed);
    }
    let runs = svc.list_runs().await.expect("listado");
    assert_eq!(runs.len(), seeds.len());
}

#[tokio::test]
async fn invalid_config_is_accepted_then_fails() {
    let (svc, _worker) = service();
    let id = svc.submit(RunConfig::new(vec!["CCO".into()], 0, 5, 9)).await.expect("submit");
    let view = svc.wait_for_terminal(id, WAIT).await.expect("terminal");
    assert_eq!(view.status, RunStatus::Failed);
    assert_eq!(view.current_round, 0);
    let trace = svc.trace(id).await.expect("traza");
    assert_eq!(trace.len(), 1);
    assert!(trace[0].summary.starts_with("failed: invalid run config"));
}

#[tokio::test]
async fn summary_and_cancel_through_the_facade() {
    let (svc, _worker) = service();
    let id = svc.submit(RunConfig::new(vec!["CCO".into()], 1, 5, 3)).await.expect("submit");
    svc.wait_for_terminal(id, WAIT).await.expect("terminal");
    let summary = svc.summary(id).await.expect("resumen");
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.result_count, summary.top_molecules.len());
    // Cancelar una ejecución terminada no la cambia.
    assert_eq!(svc.cancel(id, "late".into()).await.expect("cancel"), RunStatus::Completed);
}

#[tokio::test]
async fn pending_runs_are_recovered_from_the_store() {
    let store = Arc::new(InMemoryRunStore::new());
    let run = chem_domain::Run::new(RunConfig::new(vec!["CCO".into()], 1, 5, 3));
    store.insert_run(&run).expect("insert");

    let library = Arc::new(MutationLibrary::builtin().expect("catálogo"));
    let (svc, _worker) = DiscoveryService::start(Arc::clone(&store), library, &DiscoveryConfig::default());
    assert_eq!(svc.recover_pending().await.expect("recover"), 1);
    let view = svc.wait_for_terminal(run.id, WAIT).await.expect("terminal");
    assert_eq!(view.status, RunStatus::Completed);
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let (svc, _worker) = service();
    let err = svc.status(uuid::Uuid::new_v4()).await.expect_err("desconocida");
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn worker_stops_when_service_is_dropped() {
    let (svc, worker) = service();
    let id = svc.submit(RunConfig::new(vec!["CCO".into()], 1, 5, 3)).await.expect("submit");
    let orchestrator_view = svc.clone();
    drop(svc);
    // Sigue vivo por la copia.
    let done = orchestrator_view.wait_for_terminal(id, WAIT).await.expect("terminal");
    assert_eq!(done.status, RunStatus::Completed);
    drop(orchestrator_view);
    tokio::time::timeout(WAIT, worker).await.expect("worker termina").expect("sin pánico");
}
