//! # Contrato de un Job
//! src/jobs/job.rs
//!
//! Un job tiene dos pasos:
//! - `init`: síncrono, durante el submit. Si falla, el submit se deshace.
//! - `run`: en segundo plano, con los writers de resultados ya abiertos.

use crate::error::JobError;
use crate::jobs::writers::ResultWriters;
use std::path::{Path, PathBuf};

/// Id, directorio y resultados del job que se está ejecutando
#[derive(Debug, Clone)]
pub struct JobContext<Id> {
    id: Id,
    dir: PathBuf,
    results: Vec<String>,
}

impl<Id> JobContext<Id> {
    pub fn new(id: Id, dir: PathBuf) -> Self {
        Self {
            id,
            dir,
            results: Vec::new(),
        }
    }

    /// Nombres de resultado que la sesión abrirá para este job
    pub fn with_results<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.results = names.into_iter().collect();
        self
    }

    pub fn result_names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(String::as_str)
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Directorio del job
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Cuerpo de un job con ids de tipo `Id`
pub trait Job<Id>: Send + 'static {
    /// Entrada que recibe `init`
    type Input;

    /// Prepara el job a partir de la entrada
    fn init(&mut self, ctx: &JobContext<Id>, input: Self::Input) -> Result<(), JobError>;

    /// Ejecuta el trabajo largo escribiendo en los writers de resultados
    fn run(&mut self, ctx: &JobContext<Id>, results: &mut ResultWriters) -> Result<(), JobError>;
}
