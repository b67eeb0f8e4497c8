//! # jobdir - Entry Point
//! src/main.rs
//!
//! CLI sobre una sesión de jobs. Cada subcomando abre la sesión sobre el
//! directorio raíz configurado, hace una operación y termina. Los jobs
//! lanzados con `submit` corren mientras el proceso siga vivo; usar `--wait`
//! para esperarlos.

use clap::{Parser, Subcommand};
use jobdir::commands::CommandJob;
use jobdir::config::{Config, IdKind};
use jobdir::error::{Result, SessionError};
use jobdir::jobs::id::{SequentialIds, UuidIds};
use jobdir::jobs::input::FilesInput;
use jobdir::jobs::{IdAllocator, JobSession, JobState};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobdir", version, about = "Filesystem-backed background job runner")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lanza un programa como job
    Submit {
        /// Id elegido a mano (por defecto se asigna uno)
        #[arg(long)]
        id: Option<String>,

        /// Archivos de entrada que se copian al directorio del job
        #[arg(long = "input")]
        inputs: Vec<PathBuf>,

        /// Resultado que recibe el stdout del programa
        #[arg(long)]
        stdout: Option<String>,

        /// Resultado que recibe el stderr del programa
        #[arg(long)]
        stderr: Option<String>,

        /// Espera a que termine, con este timeout en segundos
        #[arg(long)]
        wait: Option<u64>,

        /// Programa y argumentos
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        program: Vec<String>,
    },

    /// Estado de un job, o de todos si no se da id
    Status { id: Option<String> },

    /// Ids de los jobs, opcionalmente filtrados por estado
    Ids {
        #[arg(long, value_parser = parse_state)]
        state: Option<JobState>,
    },

    /// Cantidad de jobs
    Count,

    /// Imprime un archivo de resultado
    Read { id: String, name: String },

    /// Ruta de un archivo de resultado
    Download { id: String, name: String },

    /// Empaqueta resultados en un zip (todos si no se dan nombres)
    Zip {
        id: String,

        /// Nombre del archivo zip
        #[arg(long)]
        name: Option<String>,

        names: Vec<String>,
    },

    /// Borra un job terminado
    Delete { id: String },

    /// Borra todos los jobs terminados
    DeleteAll,
}

fn parse_state(text: &str) -> std::result::Result<JobState, String> {
    match text {
        "running" => Ok(JobState::Running),
        "completed" => Ok(JobState::Completed),
        "failed" | "error" => Ok(JobState::Failed),
        other => Err(format!("unknown state '{}' (running, completed, failed)", other)),
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.config.log_filter))
        .with_writer(std::io::stderr)
        .init();

    cli.config.log_summary();

    let outcome = match cli.config.ids {
        IdKind::Sequential => cli.config.session(SequentialIds).and_then(|s| dispatch(s, cli.command)),
        IdKind::Uuid => cli.config.session(UuidIds).and_then(|s| dispatch(s, cli.command)),
    };

    if let Err(e) = outcome {
        error!(error = %e, "command failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn dispatch<A: IdAllocator>(session: JobSession<A>, command: Command) -> Result<()> {
    let parse = |text: &str| session.paths().allocator().parse_id(text);

    match command {
        Command::Submit {
            id,
            inputs,
            stdout,
            stderr,
            wait,
            program,
        } => {
            let mut args = program.into_iter();
            let Some(name) = args.next() else {
                return Err(SessionError::io(
                    "invalid submit",
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "no program given"),
                ));
            };

            let mut job = CommandJob::new(name).args(args);
            if let Some(result) = stdout {
                job = job.stdout_to(result);
            }
            if let Some(result) = stderr {
                job = job.stderr_to(result);
            }

            let input = FilesInput::new(inputs);
            let id = match id {
                Some(text) => session.submit_with_id(job, input, parse(&text)?)?,
                None => session.submit(job, input)?,
            };
            println!("{}", id);

            if let Some(secs) = wait {
                let status = session.wait(&id, Duration::from_secs(secs))?;
                print_json(&status)?;
            }
        }

        Command::Status { id: Some(text) } => print_json(&session.status(&parse(&text)?)?)?,
        Command::Status { id: None } => print_json(&session.statuses()?)?,

        Command::Ids { state } => {
            let ids: Vec<A::Id> = match state {
                Some(state) => session.ids_in_state(state)?.into_iter().collect(),
                None => {
                    let mut ids: Vec<A::Id> = session.all_ids()?.into_iter().collect();
                    ids.sort();
                    ids
                }
            };
            for id in ids {
                println!("{}", id);
            }
        }

        Command::Count => println!("{}", session.count_jobs()?),

        Command::Read { id, name } => print!("{}", session.read_text(&parse(&id)?, &name)?),

        Command::Download { id, name } => {
            println!("{}", session.download_path(&parse(&id)?, &name)?.display())
        }

        Command::Zip { id, name, names } => {
            let id = parse(&id)?;
            let path = if names.is_empty() {
                session.download_path_zipped_all(&id, name.as_deref())?
            } else {
                session.download_path_zipped(&id, &names, name.as_deref())?
            };
            println!("{}", path.display());
        }

        Command::Delete { id } => session.delete(&parse(&id)?)?,

        Command::DeleteAll => session.delete_all()?,
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| SessionError::io("failed to encode status", e.into()))?;
    println!("{}", text);
    Ok(())
}
