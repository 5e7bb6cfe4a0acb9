//! Cola en proceso con entrega al-menos-una-vez y el worker que ejecuta
//! cada unidad de trabajo.
//!
//! La cola solo transporta ids. Cada entrega se ejecuta en
//! `spawn_blocking` (el orquestador es síncrono) y ejecuciones distintas
//! corren en paralelo. Una entrega de una ejecución que ya está en curso
//! en este worker se descarta; la siguiente entrega la encontrará en el
//! estado confirmado.

use std::sync::Arc;
use std::time::Duration;

use chem_core::{PipelineOrchestrator, RunRepository};
use chem_domain::RunStatus;
use dashmap::DashSet;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Extremo de envío de la cola. Clonable.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl TaskQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, run_id: Uuid) -> Result<(), ServiceError> {
        self.tx.send(run_id).map_err(|_| ServiceError::QueueClosed)
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(50 * u64::from(attempt + 1))
}

/// Ejecuta una entrega con reintentos. Solo reintenta cuando el
/// orquestador no pudo ni registrar el fallo de la ejecución.
pub async fn deliver<R>(orchestrator: Arc<PipelineOrchestrator<R>>,
                        run_id: Uuid,
                        retries: u32)
                        -> Result<RunStatus, ServiceError>
    where R: RunRepository + 'static
{
    let mut attempt = 0;
    loop {
        let orch = Arc::clone(&orchestrator);
        match tokio::task::spawn_blocking(move || orch.execute(run_id)).await? {
            Ok(status) => return Ok(status),
            Err(e) if attempt < retries => {
                let delay = backoff(attempt);
                warn!("Entrega de run {} falló (intento {}): {}. Reintento en {:?}",
                      run_id,
                      attempt + 1,
                      e,
                      delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!("Entrega de run {} agotó {} reintentos: {}", run_id, retries, e);
                return Err(e.into());
            }
        }
    }
}

/// Lanza el worker. Termina cuando se cierran todos los `TaskQueue` y las
/// entregas en curso acaban.
pub fn spawn_worker<R>(orchestrator: Arc<PipelineOrchestrator<R>>,
                       mut rx: mpsc::UnboundedReceiver<Uuid>,
                       retries: u32)
                       -> JoinHandle<()>
    where R: RunRepository + 'static
{
    tokio::spawn(async move {
        let in_flight: Arc<DashSet<Uuid>> = Arc::new(DashSet::new());
        let mut tasks = JoinSet::new();
        while let Some(run_id) = rx.recv().await {
            while tasks.try_join_next().is_some() {}
            if !in_flight.insert(run_id) {
                debug!("Run {} ya en curso en este worker, entrega ignorada", run_id);
                continue;
            }
            let orch = Arc::clone(&orchestrator);
            let in_flight = Arc::clone(&in_flight);
            tasks.spawn(async move {
                match deliver(orch, run_id, retries).await {
                    Ok(status) => info!("Run {} entregada: {}", run_id, status),
                    Err(e) => error!("Run {} sin completar la entrega: {}", run_id, e),
                }
                in_flight.remove(&run_id);
            });
        }
        while tasks.join_next().await.is_some() {}
        info!("Cola cerrada, worker detenido");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chem_core::InMemoryRunStore;
    use chem_domain::{MutationLibrary, RunConfig};

    fn orchestrator() -> Arc<PipelineOrchestrator<Arc<InMemoryRunStore>>> {
        let library = Arc::new(MutationLibrary::builtin().expect("catálogo"));
        Arc::new(PipelineOrchestrator::new(Arc::new(InMemoryRunStore::new()), library))
    }

    #[tokio::test]
    async fn delivery_retries_until_failure_is_recorded() {
        let orch = orchestrator();
        let run = orch.submit(RunConfig::new(vec!["CCO".into()], 1, 5, 3)).expect("submit");
        // start y su registro de fallo fallan: el primer intento devuelve Err.
        orch.repository().fail_next_commits(2);
        let status = deliver(Arc::clone(&orch), run.id, 2).await.expect("entrega");
        assert_eq!(status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn delivery_gives_up_after_retries() {
        let orch = orchestrator();
        let run = orch.submit(RunConfig::new(vec!["CCO".into()], 1, 5, 3)).expect("submit");
        orch.repository().fail_next_commits(100);
        let err = deliver(Arc::clone(&orch), run.id, 1).await.expect_err("sin almacenamiento");
        assert!(matches!(err, ServiceError::Orchestration(_)));
        assert_eq!(orch.repository().load_run(run.id).expect("run").status, RunStatus::Pending);
    }

    #[tokio::test]
    async fn closed_queue_rejects_work() {
        let (queue, rx) = TaskQueue::new();
        drop(rx);
        assert!(matches!(queue.enqueue(Uuid::new_v4()), Err(ServiceError::QueueClosed)));
    }
}
