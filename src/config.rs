//! # Configuración de la Sesión
//! src/config.rs
//!
//! Configuración del motor con soporte para argumentos CLI y variables de
//! entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./jobdir --root /data/runs \
//!   --result flows.csv,costs.csv \
//!   --max-concurrent 4 \
//!   status
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! JOBDIR_ROOT=/data/runs JOBDIR_RESULTS=flows.csv,costs.csv ./jobdir ids
//! ```

use crate::error::{Result, SessionError};
use crate::jobs::id::IdAllocator;
use crate::jobs::paths::validate_result_name;
use crate::jobs::session::JobSession;
use clap::{Args, ValueEnum};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

/// Tipo de id de los jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdKind {
    /// Decimales secuenciales ("0", "1", ...)
    Sequential,
    /// UUID v4
    Uuid,
}

/// Configuración de la sesión de jobs
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Directorio raíz donde vive un directorio por job
    #[arg(long, default_value = "./jobs", env = "JOBDIR_ROOT")]
    pub root: PathBuf,

    /// Nombres de los archivos de resultado de cada job
    #[arg(long = "result", value_delimiter = ',', env = "JOBDIR_RESULTS")]
    pub results: Vec<String>,

    /// Tipo de id de los jobs
    #[arg(long, value_enum, default_value = "sequential", env = "JOBDIR_IDS")]
    pub ids: IdKind,

    /// Máximo de jobs corriendo a la vez (0 = sin límite)
    #[arg(long = "max-concurrent", default_value = "0", env = "JOBDIR_MAX_CONCURRENT")]
    pub max_concurrent: usize,

    /// Filtro de logs (sintaxis de `RUST_LOG`)
    #[arg(long = "log", default_value = "info", env = "RUST_LOG")]
    pub log_filter: String,
}

impl Config {
    /// Valida la configuración
    ///
    /// Retorna errores si hay nombres de resultado inválidos o repetidos
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for name in &self.results {
            validate_result_name(name)?;
            if !seen.insert(name.as_str()) {
                return Err(SessionError::InvalidResultName {
                    name: name.clone(),
                    reason: "name is listed twice".to_string(),
                });
            }
        }

        if self.log_filter.trim().is_empty() {
            return Err(SessionError::io(
                "invalid log filter",
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "filter is empty"),
            ));
        }

        Ok(())
    }

    /// Construye la sesión con el allocator dado
    pub fn session<A: IdAllocator>(&self, ids: A) -> Result<JobSession<A>> {
        self.validate()?;
        let session = JobSession::with_allocator(self.root.clone(), ids, self.results.iter().cloned())?
            .with_max_concurrent(self.max_concurrent);
        Ok(session)
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        let limit = if self.max_concurrent == 0 {
            "unbounded".to_string()
        } else {
            self.max_concurrent.to_string()
        };

        info!(
            root = %self.root.display(),
            results = ?self.results,
            ids = ?self.ids,
            max_concurrent = %limit,
            "configuration loaded"
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            root: PathBuf::from("./jobs"),
            results: Vec::new(),
            ids: IdKind::Sequential,
            max_concurrent: 0,
            log_filter: "info".to_string(),
        }
    }
}
