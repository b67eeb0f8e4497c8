//! # Sesión de Jobs
//! src/jobs/session.rs
//!
//! Orquestador del motor: valida submits, crea los directorios de los jobs,
//! lanza la ejecución en segundo plano y responde consultas, descargas y
//! borrados. Todo el estado se deriva del filesystem en cada consulta.

use crate::error::{JobError, Result, SessionError};
use crate::jobs::executor;
use crate::jobs::id::{IdAllocator, SequentialIds};
use crate::jobs::job::{Job, JobContext};
use crate::jobs::limiter::Limiter;
use crate::jobs::paths::{validate_file_name, validate_result_name, PathScheme};
use crate::jobs::status::{JobState, JobStatus};
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Intervalo entre lecturas del filesystem en `wait`
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Sesión sobre un directorio raíz de jobs
pub struct JobSession<A: IdAllocator = SequentialIds> {
    paths: Arc<PathScheme<A>>,
    results: Arc<BTreeSet<String>>,
    limiter: Option<Limiter>,
}

impl JobSession<SequentialIds> {
    /// Sesión con ids decimales secuenciales
    pub fn new<I, S>(root: impl Into<PathBuf>, results: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_allocator(root, SequentialIds, results)
    }
}

impl<A: IdAllocator> JobSession<A> {
    /// Crea la sesión y el directorio raíz si falta.
    ///
    /// `results` son los nombres de resultado que cada job recibe abiertos.
    pub fn with_allocator<I, S>(root: impl Into<PathBuf>, ids: A, results: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let root = root.into();

        let mut names = BTreeSet::new();
        for name in results {
            let name = name.into();
            validate_result_name(&name)?;
            if !names.insert(name.clone()) {
                return Err(SessionError::InvalidResultName {
                    name,
                    reason: "name is listed twice".to_string(),
                });
            }
        }

        fs::create_dir_all(&root)
            .map_err(|e| SessionError::io(format!("failed to create {}", root.display()), e))?;

        info!(root = %root.display(), results = ?names, "job session ready");

        Ok(Self {
            paths: Arc::new(PathScheme::new(root, ids)),
            results: Arc::new(names),
            limiter: None,
        })
    }

    /// Limita los jobs que corren a la vez (0 = sin límite)
    pub fn with_max_concurrent(mut self, max_running: usize) -> Self {
        self.limiter = if max_running == 0 {
            None
        } else {
            Some(Limiter::new(max_running))
        };
        self
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    pub fn paths(&self) -> &PathScheme<A> {
        &self.paths
    }

    /// Nombres de resultado configurados
    pub fn result_names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(String::as_str)
    }

    // ==================== Consultas ====================

    /// Directorio del job; falla si no existe
    pub fn job_dir(&self, id: &A::Id) -> Result<PathBuf> {
        let dir = self.paths.checked_dir_of(id)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(SessionError::JobNotFound(dir))
        }
    }

    pub fn count_jobs(&self) -> Result<usize> {
        self.paths.count_jobs()
    }

    pub fn all_ids(&self) -> Result<HashSet<A::Id>> {
        self.paths.list_ids()
    }

    pub fn exists(&self, id: &A::Id) -> bool {
        self.paths.exists(id)
    }

    /// Estado de un job según sus marcadores
    pub fn status(&self, id: &A::Id) -> Result<JobStatus<A::Id>> {
        self.job_dir(id)?;
        JobStatus::read(&self.paths, id.clone())
    }

    /// Estado de todos los jobs, ordenados por id.
    ///
    /// Falla con el primer job cuyo estado no se puede leer.
    pub fn statuses(&self) -> Result<Vec<JobStatus<A::Id>>> {
        let ids: BTreeSet<A::Id> = self.all_ids()?.into_iter().collect();
        ids.iter().map(|id| self.status(id)).collect()
    }

    /// Ids de los jobs en el estado dado
    pub fn ids_in_state(&self, state: JobState) -> Result<BTreeSet<A::Id>> {
        Ok(self
            .statuses()?
            .into_iter()
            .filter(|s| s.state() == state)
            .map(|s| s.id)
            .collect())
    }

    // ==================== Resultados ====================

    /// Ruta de un archivo existente dentro del directorio del job
    pub fn download_path(&self, id: &A::Id, name: &str) -> Result<PathBuf> {
        validate_file_name(name)?;
        let dir = self.job_dir(id)?;
        let path = dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(SessionError::ResultNotFound {
                dir,
                name: name.to_string(),
            })
        }
    }

    /// Empaqueta los resultados pedidos en un zip dentro del directorio
    /// del job. Falla con el primer resultado que no exista.
    pub fn download_path_zipped<I, S>(&self, id: &A::Id, names: I, zip_name: Option<&str>) -> Result<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let files = names
            .into_iter()
            .map(|name| self.download_path(id, name.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let zip_path = self.paths.zip(id, &files, zip_name)?;
        debug!(job = %id, archive = %zip_path.display(), files = files.len(), "results archived");
        Ok(zip_path)
    }

    /// Como `download_path_zipped` con todos los resultados configurados
    pub fn download_path_zipped_all(&self, id: &A::Id, zip_name: Option<&str>) -> Result<PathBuf> {
        self.download_path_zipped(id, self.results.iter(), zip_name)
    }

    /// Contenido de un archivo del job como texto
    pub fn read_text(&self, id: &A::Id, name: &str) -> Result<String> {
        let path = self.download_path(id, name)?;
        fs::read_to_string(&path)
            .map_err(|e| SessionError::io(format!("failed to read {}", path.display()), e))
    }

    /// Parsea un archivo del job con `parser`
    pub fn parse_file<R, F>(&self, id: &A::Id, name: &str, parser: F) -> Result<R>
    where
        F: FnOnce(BufReader<File>) -> io::Result<R>,
    {
        let path = self.download_path(id, name)?;
        let file = File::open(&path)
            .map_err(|e| SessionError::io(format!("failed to open {}", path.display()), e))?;
        parser(BufReader::new(file))
            .map_err(|e| SessionError::io(format!("failed to parse {}", path.display()), e))
    }

    // ==================== Submit ====================

    /// Asigna un id nuevo y hace submit del job
    pub fn submit<J>(&self, job: J, input: J::Input) -> Result<A::Id>
    where
        J: Job<A::Id>,
    {
        let (id, dir) = self.paths.reserve_new()?;
        self.launch(job, input, id, dir)
    }

    /// Hace submit del job con un id elegido por quien llama.
    ///
    /// 1. Reserva el directorio (falla con `DuplicateId` si ya existe)
    /// 2. Llama a `init`; si falla se borra el directorio
    /// 3. Lanza la ejecución en segundo plano y retorna sin esperarla
    pub fn submit_with_id<J>(&self, job: J, input: J::Input, id: A::Id) -> Result<A::Id>
    where
        J: Job<A::Id>,
    {
        let dir = match self.paths.reserve(&id) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(job = %id, error = %e, "submission rejected");
                return Err(e);
            }
        };
        self.launch(job, input, id, dir)
    }

    /// `init` y lanzamiento de un job cuyo directorio ya está reservado
    fn launch<J>(&self, mut job: J, input: J::Input, id: A::Id, dir: PathBuf) -> Result<A::Id>
    where
        J: Job<A::Id>,
    {
        let ctx = JobContext::new(id.clone(), dir.clone()).with_results(self.results.iter().cloned());

        let init = panic::catch_unwind(AssertUnwindSafe(|| job.init(&ctx, input)))
            .unwrap_or_else(|payload| Err(JobError::from_panic(payload)));

        if let Err(source) = init {
            warn!(job = %id, error = %source, "job init failed, discarding its directory");
            self.discard(&dir);
            return Err(SessionError::Init {
                id: self.paths.dir_name(&id),
                source,
            });
        }

        let paths = Arc::clone(&self.paths);
        let results = Arc::clone(&self.results);
        let limiter = self.limiter.clone();

        let spawned = thread::Builder::new()
            .name(format!("job-{}", self.paths.dir_name(&id)))
            .spawn(move || executor::execute(&paths, &results, limiter.as_ref(), ctx, job));

        if let Err(e) = spawned {
            self.discard(&dir);
            return Err(SessionError::io(format!("failed to launch job {}", id), e));
        }

        info!(job = %id, dir = %dir.display(), "job submitted");
        Ok(id)
    }

    /// Borra un directorio recién creado cuyo submit no prosperó
    fn discard(&self, dir: &Path) {
        if let Err(e) = fs::remove_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "failed to discard job directory");
        }
    }

    // ==================== Espera ====================

    /// Espera a que el job termine leyendo el filesystem.
    ///
    /// Termina cuando aparece el marcador de fin, o cuando hay archivo de
    /// error sin marcador de inicio (el job no llegó a arrancar).
    pub fn wait(&self, id: &A::Id, timeout: Duration) -> Result<JobStatus<A::Id>> {
        let dir = self.job_dir(id)?;
        let deadline = Instant::now() + timeout;

        loop {
            if self.paths.end_marker_of(id).is_file() {
                return self.status(id);
            }

            let err_path = self.paths.error_marker_of(id);
            if err_path.is_file() && !self.paths.begin_marker_of(id).is_file() {
                let error = fs::read_to_string(&err_path)
                    .map_err(|e| SessionError::io(format!("failed to read {}", err_path.display()), e))?;
                return Err(SessionError::NotStarted { dir, error });
            }

            if Instant::now() >= deadline {
                return Err(SessionError::Timeout(dir));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    // ==================== Borrado ====================

    /// Borra un job terminado
    pub fn delete(&self, id: &A::Id) -> Result<()> {
        self.paths.delete(id)?;
        info!(job = %id, "job deleted");
        Ok(())
    }

    /// Borra todos los jobs; junta los fallos sin deshacer los borrados
    pub fn delete_all(&self) -> Result<()> {
        let errors: Vec<SessionError> = self
            .all_ids()?
            .iter()
            .filter_map(|id| self.delete(id).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            warn!(failed = errors.len(), "some jobs could not be deleted");
            Err(SessionError::Aggregate(errors))
        }
    }
}

impl<A: IdAllocator> Clone for JobSession<A> {
    fn clone(&self) -> Self {
        Self {
            paths: Arc::clone(&self.paths),
            results: Arc::clone(&self.results),
            limiter: self.limiter.clone(),
        }
    }
}

impl<A: IdAllocator> std::fmt::Debug for JobSession<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSession")
            .field("root", &self.paths.root())
            .field("results", &self.results)
            .field("limiter", &self.limiter)
            .finish()
    }
}
