//! # Esquema de Rutas
//! src/jobs/paths.rs
//!
//! Mapea un id de job a su directorio y a las rutas de sus marcadores y
//! resultados. También agrupa las operaciones de filesystem que dependen
//! solo de esas rutas (crear, listar, borrar, empaquetar).
//!
//! ## Layout
//!
//! ```text
//! <root>/<dir_name(id)>/
//!     ___beg___.txt    inicio (yyyy-MM-dd HH:mm:ss)
//!     ___end___.txt    fin; ausente mientras corre
//!     ___err___.txt    log de errores; ausente si no hubo errores
//!     <resultado>      archivos de resultado
//!     <nombre>.zip     creados bajo demanda
//! ```

use crate::error::{Result, SessionError};
use crate::jobs::archive;
use crate::jobs::id::{self, IdAllocator, EXTRA_ATTEMPTS};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const BEGIN_MARKER: &str = "___beg___.txt";
pub const END_MARKER: &str = "___end___.txt";
pub const ERROR_MARKER: &str = "___err___.txt";

/// Nombres reservados que no pueden usarse como resultados
pub const RESERVED_NAMES: [&str; 3] = [BEGIN_MARKER, END_MARKER, ERROR_MARKER];

/// Rutas de los jobs bajo un directorio raíz
#[derive(Debug, Clone)]
pub struct PathScheme<A> {
    root: PathBuf,
    ids: A,
}

impl<A: IdAllocator> PathScheme<A> {
    pub fn new(root: impl Into<PathBuf>, ids: A) -> Self {
        Self {
            root: root.into(),
            ids,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn allocator(&self) -> &A {
        &self.ids
    }

    pub fn dir_name(&self, id: &A::Id) -> String {
        self.ids.to_dir_name(id)
    }

    // ==================== Rutas ====================

    pub fn dir_of(&self, id: &A::Id) -> PathBuf {
        self.root.join(self.ids.to_dir_name(id))
    }

    /// Como `dir_of`, pero falla si el id no es un nombre plano directo
    /// bajo la raíz
    pub fn checked_dir_of(&self, id: &A::Id) -> Result<PathBuf> {
        let name = self.ids.to_dir_name(id);
        id::validate_dir_name(&name)?;

        let dir = self.root.join(&name);
        if dir.parent() != Some(self.root.as_path()) {
            return Err(SessionError::InvalidId {
                name,
                reason: "id resolves outside the root".to_string(),
            });
        }
        Ok(dir)
    }

    pub fn begin_marker_of(&self, id: &A::Id) -> PathBuf {
        self.dir_of(id).join(BEGIN_MARKER)
    }

    pub fn end_marker_of(&self, id: &A::Id) -> PathBuf {
        self.dir_of(id).join(END_MARKER)
    }

    pub fn error_marker_of(&self, id: &A::Id) -> PathBuf {
        self.dir_of(id).join(ERROR_MARKER)
    }

    pub fn result_file_of(&self, id: &A::Id, name: &str) -> PathBuf {
        self.dir_of(id).join(name)
    }

    // ==================== Ids ====================

    pub fn exists(&self, id: &A::Id) -> bool {
        self.checked_dir_of(id).map_or(false, |dir| dir.is_dir())
    }

    pub fn count_jobs(&self) -> Result<usize> {
        Ok(self.list_ids()?.len())
    }

    pub fn list_ids(&self) -> Result<HashSet<A::Id>> {
        id::list_ids(&self.ids, &self.root)
    }

    // ==================== Filesystem ====================

    /// Crea el directorio del job; no hace nada si ya existe
    pub fn create_if_missing(&self, id: &A::Id) -> Result<()> {
        let dir = self.checked_dir_of(id)?;
        fs::create_dir_all(&dir)
            .map_err(|e| SessionError::io(format!("failed to create {}", dir.display()), e))
    }

    /// Reserva el directorio del job.
    ///
    /// La creación no es recursiva y falla si el directorio ya existe, así que
    /// de dos submits concurrentes con el mismo id solo uno gana.
    pub fn reserve(&self, id: &A::Id) -> Result<PathBuf> {
        let dir = self.checked_dir_of(id)?;
        match fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(SessionError::DuplicateId(dir)),
            Err(e) => Err(SessionError::io(format!("failed to create {}", dir.display()), e)),
        }
    }

    /// Asigna un id nuevo y reserva su directorio.
    ///
    /// Un id que choca con una entrada existente (un archivo suelto, o un
    /// submit concurrente que ganó la carrera) se descarta y se pide otro,
    /// hasta `ids existentes + EXTRA_ATTEMPTS` intentos.
    pub fn reserve_new(&self) -> Result<(A::Id, PathBuf)> {
        let mut taken = self.list_ids()?;
        let attempts = taken.len() + EXTRA_ATTEMPTS;

        for _ in 0..attempts {
            let id = self.ids.new_id(&taken)?;
            match self.reserve(&id) {
                Ok(dir) => return Ok((id, dir)),
                Err(SessionError::DuplicateId(dir)) => {
                    debug!(dir = %dir.display(), "id already taken, allocating another");
                    taken.insert(id);
                }
                Err(e) => return Err(e),
            }
        }

        Err(SessionError::IdsExhausted { attempts })
    }

    /// Borra el directorio de un job terminado.
    ///
    /// Requiere el marcador de fin. Primero borra los subdirectorios y luego
    /// el directorio del job; los fallos se acumulan.
    pub fn delete(&self, id: &A::Id) -> Result<()> {
        let dir = self.checked_dir_of(id)?;
        if !dir.is_dir() {
            return Err(SessionError::JobNotFound(dir));
        }
        if !self.end_marker_of(id).is_file() {
            return Err(SessionError::NotCompleted(dir));
        }

        let mut errors = Vec::new();

        match fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        if let Err(e) = fs::remove_dir_all(&path) {
                            errors.push(SessionError::io(
                                format!("failed to delete {}", path.display()),
                                e,
                            ));
                        }
                    }
                }
            }
            Err(e) => errors.push(SessionError::io(
                format!("failed to list {}", dir.display()),
                e,
            )),
        }

        if let Err(e) = fs::remove_dir_all(&dir) {
            errors.push(SessionError::io(format!("failed to delete {}", dir.display()), e));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(SessionError::Aggregate(errors)),
        }
    }

    /// Crea un zip dentro del directorio del job con `files`.
    ///
    /// Sin nombre se genera uno aleatorio.
    pub fn zip(&self, id: &A::Id, files: &[PathBuf], name: Option<&str>) -> Result<PathBuf> {
        let zip_name = match name {
            Some(name) => archive::with_zip_extension(name),
            None => archive::random_name(),
        };
        validate_file_name(&zip_name)?;
        let zip_path = self.checked_dir_of(id)?.join(zip_name);

        archive::write_zip(&zip_path, files)?;
        Ok(zip_path)
    }
}

/// Valida un nombre de resultado: archivo plano y no reservado
pub fn validate_result_name(name: &str) -> Result<()> {
    validate_file_name(name)?;
    if RESERVED_NAMES.contains(&name) {
        return Err(SessionError::InvalidResultName {
            name: name.to_string(),
            reason: "name is reserved for a marker file".to_string(),
        });
    }
    Ok(())
}

/// Valida que `name` sea un archivo directo dentro del directorio del job
pub fn validate_file_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| SessionError::InvalidResultName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(invalid("name must be a plain file name"));
    }

    Ok(())
}
