//! # jobdir
//! src/lib.rs
//!
//! Motor de jobs asíncronos que usa un árbol de directorios como única
//! fuente de verdad: sin base de datos y sin cola de mensajes.
//!
//! ## Arquitectura
//!
//! - `jobs`: motor (ids, rutas, writers, estado, ejecutor, sesión)
//! - `commands`: cuerpos de job incluidos (procesos externos)
//! - `config`: configuración por CLI y variables de entorno
//! - `error`: tipos de error
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use jobdir::commands::CommandJob;
//! use jobdir::jobs::{FilesInput, JobSession};
//! use std::time::Duration;
//!
//! let session = JobSession::new("./runs", ["stdout.txt"])?;
//! let job = CommandJob::new("sh").arg("-c").arg("echo done").stdout_to("stdout.txt");
//! let id = session.submit(job, FilesInput::default())?;
//!
//! let status = session.wait(&id, Duration::from_secs(60))?;
//! println!("{} -> {:?}", id, status.state());
//! # Ok::<(), jobdir::error::SessionError>(())
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod jobs;

pub use error::{JobError, SessionError};
pub use jobs::{IdAllocator, Job, JobContext, JobSession, JobState, JobStatus, ResultWriters};
