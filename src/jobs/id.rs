//! # Asignación de Ids de Jobs
//! src/jobs/id.rs
//!
//! Un `IdAllocator` genera ids nuevos, los convierte a nombre de directorio
//! y los recupera a partir de ese nombre.
//!
//! ## Allocators incluidos
//!
//! - `SequentialIds`: ids `String` decimales ("0", "1", "2", ...)
//! - `UuidIds`: tokens aleatorios de 128 bits (`uuid::Uuid` v4)

use crate::error::{Result, SessionError};
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt::{Debug, Display};
use std::fs;
use std::hash::Hash;
use std::path::{Component, Path};
use uuid::Uuid;

/// Candidatos extra que se prueban además de `existing.len()`
pub const EXTRA_ATTEMPTS: usize = 10;

/// Genera, parsea y formatea ids de jobs
pub trait IdAllocator: Send + Sync + 'static {
    /// Tipo del id
    type Id: Clone + Eq + Ord + Hash + Debug + Display + Serialize + Send + Sync + 'static;

    /// Parsea un nombre de directorio como id
    fn parse_id(&self, dir_name: &str) -> Result<Self::Id>;

    /// Nombre del directorio de un id
    fn to_dir_name(&self, id: &Self::Id) -> String;

    /// Genera un id que no esté en `existing`.
    ///
    /// Prueba a lo sumo `existing.len() + EXTRA_ATTEMPTS` candidatos y
    /// retorna `IdsExhausted` si ninguno está libre.
    fn new_id(&self, existing: &HashSet<Self::Id>) -> Result<Self::Id>;
}

/// Verifica que `name` sirva como un único componente de ruta bajo la raíz
pub fn validate_dir_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| SessionError::InvalidId {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("id is empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("id must not contain path separators"));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == OsStr::new(name) => Ok(()),
        _ => Err(invalid("id must be a plain directory name")),
    }
}

/// Lista los subdirectorios inmediatos de `root` parseados como ids.
///
/// Un nombre que no se puede parsear hace fallar todo el listado.
pub fn list_ids<A: IdAllocator + ?Sized>(allocator: &A, root: &Path) -> Result<HashSet<A::Id>> {
    let entries = fs::read_dir(root)
        .map_err(|e| SessionError::io(format!("failed to list {}", root.display()), e))?;

    let mut ids = HashSet::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| SessionError::io(format!("failed to list {}", root.display()), e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| SessionError::io(format!("failed to inspect {}", entry.path().display()), e))?
            .is_dir();
        if !is_dir {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_str().ok_or_else(|| SessionError::InvalidId {
            name: name.to_string_lossy().into_owned(),
            reason: "directory name is not valid UTF-8".to_string(),
        })?;
        ids.insert(allocator.parse_id(name)?);
    }

    Ok(ids)
}

/// Ids decimales secuenciales: el menor número que no esté en uso
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialIds;

impl IdAllocator for SequentialIds {
    type Id = String;

    /// Acepta cualquier nombre de directorio plano
    fn parse_id(&self, dir_name: &str) -> Result<String> {
        validate_dir_name(dir_name)?;
        Ok(dir_name.to_string())
    }

    fn to_dir_name(&self, id: &String) -> String {
        id.clone()
    }

    fn new_id(&self, existing: &HashSet<String>) -> Result<String> {
        let attempts = existing.len() + EXTRA_ATTEMPTS;
        (0..attempts)
            .map(|i| i.to_string())
            .find(|candidate| !existing.contains(candidate))
            .ok_or(SessionError::IdsExhausted { attempts })
    }
}

/// Ids aleatorios de 128 bits
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdAllocator for UuidIds {
    type Id = Uuid;

    fn parse_id(&self, dir_name: &str) -> Result<Uuid> {
        Uuid::parse_str(dir_name).map_err(|e| SessionError::InvalidId {
            name: dir_name.to_string(),
            reason: e.to_string(),
        })
    }

    fn to_dir_name(&self, id: &Uuid) -> String {
        id.hyphenated().to_string()
    }

    fn new_id(&self, existing: &HashSet<Uuid>) -> Result<Uuid> {
        let attempts = existing.len() + EXTRA_ATTEMPTS;
        (0..attempts)
            .map(|_| Uuid::new_v4())
            .find(|candidate| !existing.contains(candidate))
            .ok_or(SessionError::IdsExhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Allocator que siempre propone el mismo id
    struct StuckIds;

    impl IdAllocator for StuckIds {
        type Id = String;

        fn parse_id(&self, dir_name: &str) -> Result<String> {
            Ok(dir_name.to_string())
        }

        fn to_dir_name(&self, id: &String) -> String {
            id.clone()
        }

        fn new_id(&self, existing: &HashSet<String>) -> Result<String> {
            let attempts = existing.len() + EXTRA_ATTEMPTS;
            (0..attempts)
                .map(|_| "taken".to_string())
                .find(|candidate| !existing.contains(candidate))
                .ok_or(SessionError::IdsExhausted { attempts })
        }
    }

    // ==================== SequentialIds ====================

    #[test]
    fn test_sequential_starts_at_zero() {
        let id = SequentialIds.new_id(&HashSet::new()).unwrap();
        assert_eq!(id, "0");
    }

    #[test]
    fn test_sequential_fills_first_gap() {
        let existing: HashSet<String> = ["0", "1", "3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(SequentialIds.new_id(&existing).unwrap(), "2");
    }

    #[test]
    fn test_sequential_ignores_named_ids() {
        let existing: HashSet<String> =
            ["scenario-a", "scenario-b", "0"].iter().map(|s| s.to_string()).collect();
        assert_eq!(SequentialIds.new_id(&existing).unwrap(), "1");
    }

    #[test]
    fn test_sequential_round_trips_dir_name() {
        let id = SequentialIds.parse_id("my-run").unwrap();
        assert_eq!(SequentialIds.to_dir_name(&id), "my-run");
    }

    // ==================== UuidIds ====================

    #[test]
    fn test_uuid_avoids_existing() {
        let mut existing = HashSet::new();
        for _ in 0..5 {
            let id = UuidIds.new_id(&existing).unwrap();
            assert!(!existing.contains(&id));
            existing.insert(id);
        }
        assert_eq!(existing.len(), 5);
    }

    #[test]
    fn test_sequential_parse_rejects_paths() {
        for name in ["", " ", ".", "..", "a/b", "../evil", "/tmp/evil", "a\\b"] {
            let err = SequentialIds.parse_id(name).unwrap_err();
            assert!(matches!(err, SessionError::InvalidId { .. }), "accepted {:?}", name);
        }
        assert_eq!(SequentialIds.parse_id("run-7").unwrap(), "run-7");
    }

    #[test]
    fn test_uuid_parse_rejects_garbage() {
        let err = UuidIds.parse_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, SessionError::InvalidId { .. }));
    }

    // ==================== Exhaustion ====================

    #[test]
    fn test_exhausted_allocator_fails_fast() {
        let existing: HashSet<String> = ["taken".to_string()].into_iter().collect();
        match StuckIds.new_id(&existing) {
            Err(SessionError::IdsExhausted { attempts }) => assert_eq!(attempts, 1 + EXTRA_ATTEMPTS),
            other => panic!("expected IdsExhausted, got {:?}", other),
        }
    }

    // ==================== Listing ====================

    #[test]
    fn test_list_ids_ignores_plain_files() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("0")).unwrap();
        fs::create_dir(root.path().join("1")).unwrap();
        // Los archivos sueltos no cuentan como jobs
        fs::write(root.path().join("2"), b"not a job").unwrap();

        let ids = list_ids(&SequentialIds, root.path()).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains("2"));
    }

    #[test]
    fn test_list_ids_fails_on_unparsable_name() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join(Uuid::new_v4().to_string())).unwrap();
        fs::create_dir(root.path().join("stray")).unwrap();

        let err = list_ids(&UuidIds, root.path()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidId { ref name, .. } if name == "stray"));
    }
}
