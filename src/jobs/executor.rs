//! # Ejecutor en Segundo Plano
//! src/jobs/executor.rs
//!
//! Corre el `run` de un job ya inicializado. Cada paso que falla se anota en
//! el archivo de error y la ejecución sigue con el paso siguiente:
//!
//! 1. Abrir los writers de resultados (si falla, se anota y se termina)
//! 2. Escribir el marcador de inicio
//! 3. Llamar a `run`
//! 4. Cerrar los writers
//! 5. Escribir el marcador de fin
//!
//! Nada de esto llega a quien hizo el submit: el único canal es el archivo
//! de error, visible después con `status`.

use crate::error::JobError;
use crate::jobs::id::IdAllocator;
use crate::jobs::job::{Job, JobContext};
use crate::jobs::limiter::Limiter;
use crate::jobs::paths::PathScheme;
use crate::jobs::status::now_stamp;
use crate::jobs::writers::ResultWriters;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Escribe un marcador de tiempo con el instante actual
pub(crate) fn write_marker(path: &Path) -> std::io::Result<()> {
    fs::write(path, now_stamp())
}

/// Archivo de error de un job; cada fallo se agrega al final
pub(crate) struct ErrorLog {
    job: String,
    path: PathBuf,
}

impl ErrorLog {
    pub(crate) fn new(job: String, path: PathBuf) -> Self {
        Self { job, path }
    }

    /// Agrega un fallo al archivo de error
    pub(crate) fn record(&self, step: &str, err: &dyn Display) {
        warn!(job = %self.job, step, error = %err, "job step failed");

        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{}: {}", step, err));

        if let Err(e) = appended {
            error!(
                job = %self.job,
                path = %self.path.display(),
                error = %e,
                "failed to record job error"
            );
        }
    }
}

/// Ejecuta los pasos de fondo de un job
pub(crate) fn execute<A, J>(
    paths: &PathScheme<A>,
    results: &BTreeSet<String>,
    limiter: Option<&Limiter>,
    ctx: JobContext<A::Id>,
    mut job: J,
) where
    A: IdAllocator,
    J: Job<A::Id>,
{
    let _permit = limiter.map(|l| {
        debug!(job = %ctx.id(), "waiting for a free execution slot");
        l.acquire()
    });

    let id = ctx.id();
    let log = ErrorLog::new(paths.dir_name(id), paths.error_marker_of(id));

    let mut writers = match ResultWriters::open(ctx.dir(), results) {
        Ok(writers) => writers,
        Err(e) => {
            log.record("open result writers", &e);
            return;
        }
    };
    debug!(job = %id, results = writers.len(), "result writers open");

    if let Err(e) = write_marker(&paths.begin_marker_of(id)) {
        log.record("write begin marker", &e);
    }
    info!(job = %id, "job started");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run(&ctx, &mut writers)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log.record("run", &e),
        Err(payload) => log.record("run", &JobError::from_panic(payload)),
    }

    if let Err(e) = writers.close() {
        log.record("close result writers", &e);
    }

    if let Err(e) = write_marker(&paths.end_marker_of(id)) {
        log.record("write end marker", &e);
    }
    info!(job = %id, "job finished");
}
