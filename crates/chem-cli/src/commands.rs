//! Ejecución de subcomandos sobre un `DiscoveryService` de cualquier
//! almacén.

use std::fs;
use std::time::Duration;

use chem_core::RunRepository;
use chem_domain::{MutationLibrary, RunConfig};
use chemflow_discovery::{DiscoveryService, ServiceError};
use log::info;
use serde::Serialize;

use crate::cli::{Commands, RunArgs};

/// Fallo de un subcomando con su código de salida.
#[derive(Debug)]
pub struct CommandFailure {
    pub code: i32,
    pub message: String,
}

impl From<ServiceError> for CommandFailure {
    fn from(err: ServiceError) -> Self {
        Self { code: err.exit_code(),
               message: err.to_string() }
    }
}

fn input_error(message: String) -> CommandFailure {
    CommandFailure { code: 3, message }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CommandFailure> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CommandFailure { code: 5,
                                                                                 message: format!("json: {e}") })?;
    println!("{text}");
    Ok(())
}

fn load_submission(args: &RunArgs) -> Result<RunConfig, CommandFailure> {
    let file = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|e| input_error(format!("{}: {e}", path.display())))?;
            Some(serde_json::from_str::<RunConfig>(&raw).map_err(|e| input_error(format!("{}: {e}", path.display())))?)
        }
        None => None,
    };
    args.to_config(file).map_err(input_error)
}

pub async fn dispatch<R>(service: &DiscoveryService<R>,
                         library: &MutationLibrary,
                         command: Commands)
                         -> Result<(), CommandFailure>
    where R: RunRepository + 'static
{
    match command {
        Commands::Run(args) => {
            let config = load_submission(&args)?;
            if args.no_wait {
                let run_id = service.register(config).await?;
                println!("{run_id}");
                return Ok(());
            }
            let run_id = service.submit(config).await?;
            info!("Run {run_id} enviada, esperando");
            let view = service.wait_for_terminal(run_id, Duration::from_secs(args.timeout)).await?;
            print_json(&view)
        }
        Commands::Status(r) => print_json(&service.status(r.run_id).await?),
        Commands::Molecules(r) => print_json(&service.molecules(r.run_id).await?),
        Commands::Trace(args) => {
            let trace = service.trace(args.run_id).await?;
            if args.json {
                return print_json(&trace);
            }
            for entry in trace {
                println!("{:>5}  r{:<3} {:<18} {:<9} {:<9} {}",
                         entry.seq,
                         entry.round,
                         entry.agent,
                         entry.action,
                         entry.outcome.as_str(),
                         entry.summary);
            }
            Ok(())
        }
        Commands::Summary(r) => print_json(&service.summary(r.run_id).await?),
        Commands::Cancel(args) => {
            let status = service.cancel(args.run_id, args.reason).await?;
            println!("{status}");
            Ok(())
        }
        Commands::Runs => print_json(&service.list_runs().await?),
        Commands::Rules => {
            let entries: Vec<_> = library.rules().iter().map(|r| r.entry()).collect();
            print_json(&entries)
        }
    }
}
