//! `DiscoveryService`: fachada de envío y consulta de ejecuciones.
//!
//! `submit` registra la ejecución PENDING, la encola y devuelve su id sin
//! esperar. Las consultas leen del almacén; ninguna depende de estado en
//! memoria del worker.

use std::sync::Arc;
use std::time::Duration;

use chem_core::{PipelineOrchestrator, RunRepository, RunSummary};
use chem_domain::{MutationLibrary, RunConfig, RunStatus};
use log::info;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::DiscoveryConfig;
use crate::errors::ServiceError;
use crate::views::{MoleculeView, RunStatusView, TraceView};
use crate::worker::{spawn_worker, TaskQueue};

const STATUS_POLL: Duration = Duration::from_millis(20);

pub struct DiscoveryService<R>
    where R: RunRepository + 'static
{
    orchestrator: Arc<PipelineOrchestrator<R>>,
    queue: TaskQueue,
}

impl<R> Clone for DiscoveryService<R> where R: RunRepository + 'static
{
    fn clone(&self) -> Self {
        Self { orchestrator: Arc::clone(&self.orchestrator),
               queue: self.queue.clone() }
    }
}

impl<R> DiscoveryService<R> where R: RunRepository + 'static
{
    /// Arranca el worker en el runtime actual. El `JoinHandle` termina
    /// cuando se sueltan todas las copias del servicio.
    pub fn start(repo: R, library: Arc<MutationLibrary>, config: &DiscoveryConfig) -> (Self, JoinHandle<()>) {
        let orchestrator = Arc::new(PipelineOrchestrator::new(repo, library).with_options(config.orchestrator_options()));
        let (queue, rx) = TaskQueue::new();
        let worker = spawn_worker(Arc::clone(&orchestrator), rx, config.worker_retries);
        info!("Servicio de descubrimiento iniciado ({} reglas)", orchestrator.library().len());
        (Self { orchestrator, queue }, worker)
    }

    pub fn orchestrator(&self) -> &PipelineOrchestrator<R> {
        &self.orchestrator
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ServiceError>
        where F: FnOnce(&PipelineOrchestrator<R>) -> Result<T, ServiceError> + Send + 'static,
              T: Send + 'static
    {
        let orch = Arc::clone(&self.orchestrator);
        tokio::task::spawn_blocking(move || f(&orch)).await?
    }

    /// Registra y encola. No ejecuta nada en la llamada.
    pub async fn submit(&self, config: RunConfig) -> Result<Uuid, ServiceError> {
        let run_id = self.register(config).await?;
        self.queue.enqueue(run_id)?;
        Ok(run_id)
    }

    /// Registra la ejecución PENDING sin encolarla (la recoge otro worker).
    pub async fn register(&self, config: RunConfig) -> Result<Uuid, ServiceError> {
        let run = self.blocking(move |o| Ok(o.submit(config)?)).await?;
        Ok(run.id)
    }

    /// Vuelve a entregar una ejecución (simula la redelivery de la cola).
    pub fn redeliver(&self, run_id: Uuid) -> Result<(), ServiceError> {
        self.queue.enqueue(run_id)
    }

    /// Encola todas las ejecuciones no terminales del almacén.
    pub async fn recover_pending(&self) -> Result<usize, ServiceError> {
        let runs = self.blocking(|o| Ok(o.repository().list_runs()?)).await?;
        let mut count = 0;
        for run in runs.into_iter().filter(|r| !r.status.is_terminal()) {
            self.queue.enqueue(run.id)?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn status(&self, run_id: Uuid) -> Result<RunStatusView, ServiceError> {
        self.blocking(move |o| Ok(o.repository().load_run(run_id)?.into())).await
    }

    pub async fn list_runs(&self) -> Result<Vec<RunStatusView>, ServiceError> {
        self.blocking(|o| Ok(o.repository().list_runs()?.into_iter().map(RunStatusView::from).collect()))
            .await
    }

    pub async fn molecules(&self, run_id: Uuid) -> Result<Vec<MoleculeView>, ServiceError> {
        self.blocking(move |o| Ok(o.repository().molecules(run_id)?.into_iter().map(MoleculeView::from).collect()))
            .await
    }

    pub async fn trace(&self, run_id: Uuid) -> Result<Vec<TraceView>, ServiceError> {
        self.blocking(move |o| Ok(o.repository().trace(run_id)?.into_iter().map(TraceView::from).collect()))
            .await
    }

    pub async fn summary(&self, run_id: Uuid) -> Result<RunSummary, ServiceError> {
        self.blocking(move |o| Ok(o.summary(run_id)?)).await
    }

    pub async fn cancel(&self, run_id: Uuid, reason: String) -> Result<RunStatus, ServiceError> {
        self.blocking(move |o| Ok(o.cancel(run_id, &reason)?)).await
    }

    /// Espera a que la ejecución sea terminal (consultando el almacén).
    pub async fn wait_for_terminal(&self, run_id: Uuid, timeout: Duration) -> Result<RunStatusView, ServiceError> {
        tokio::time::timeout(timeout, self.poll_until_terminal(run_id)).await
                                                                       .map_err(|_| ServiceError::Timeout(run_id))?
    }

    async fn poll_until_terminal(&self, run_id: Uuid) -> Result<RunStatusView, ServiceError> {
        loop {
            let view = self.status(run_id).await?;
            if view.status.is_terminal() {
                return Ok(view);
            }
            tokio::time::sleep(STATUS_POLL).await;
        }
    }
}
