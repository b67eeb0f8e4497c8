//! # Writers de Resultados
//! src/jobs/writers.rs
//!
//! Abre un archivo de salida por cada nombre de resultado configurado.
//! La apertura es todo-o-nada: si uno falla, los ya abiertos se cierran y
//! el job no arranca.

use crate::error::{JobError, Result, SessionError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Conjunto de writers abiertos dentro del directorio de un job
#[derive(Debug)]
pub struct ResultWriters {
    writers: BTreeMap<String, BufWriter<File>>,
}

impl ResultWriters {
    /// Abre un writer por nombre dentro de `dir`
    pub fn open<'a, I>(dir: &Path, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut writers = BTreeMap::new();

        for name in names {
            let path = dir.join(name);
            match File::create(&path) {
                Ok(file) => {
                    writers.insert(name.clone(), BufWriter::new(file));
                }
                Err(e) => {
                    // Los writers abiertos se cierran al salir de scope
                    drop(writers);
                    return Err(SessionError::io(
                        format!("failed to open result writer {}", path.display()),
                        e,
                    ));
                }
            }
        }

        Ok(Self { writers })
    }

    /// Writer de un resultado
    pub fn get(&mut self, name: &str) -> std::result::Result<&mut BufWriter<File>, JobError> {
        self.writers
            .get_mut(name)
            .ok_or_else(|| JobError::MissingWriter(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    /// Hace flush y cierra todos los writers.
    ///
    /// Intenta cerrar todos aunque alguno falle y reporta los fallos juntos.
    pub fn close(mut self) -> Result<()> {
        let mut errors = Vec::new();

        for (name, mut writer) in std::mem::take(&mut self.writers) {
            if let Err(e) = writer.flush() {
                errors.push(SessionError::io(format!("failed to flush result '{}'", name), e));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(SessionError::Aggregate(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_open_and_write_all() {
        let dir = TempDir::new().unwrap();
        let wanted = names(&["a.txt", "b.txt"]);

        let mut writers = ResultWriters::open(dir.path(), &wanted).unwrap();
        assert_eq!(writers.len(), 2);
        assert!(!writers.is_empty());

        writeln!(writers.get("a.txt").unwrap(), "alpha").unwrap();
        write!(writers.get("b.txt").unwrap(), "beta").unwrap();
        writers.close().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "alpha\n");
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "beta");
    }

    #[test]
    fn test_missing_writer_is_job_error() {
        let dir = TempDir::new().unwrap();
        let mut writers = ResultWriters::open(dir.path(), &names(&["a.txt"])).unwrap();
        assert!(matches!(writers.get("zzz.txt"), Err(JobError::MissingWriter(_))));
    }

    #[test]
    fn test_open_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        // Un directorio con el nombre del resultado impide abrirlo como archivo
        fs::create_dir(dir.path().join("b.txt")).unwrap();

        let result = ResultWriters::open(dir.path(), &names(&["a.txt", "b.txt", "c.txt"]));
        assert!(matches!(result, Err(SessionError::Io { .. })));
        // Nunca se llegó a abrir el tercero
        assert!(!dir.path().join("c.txt").exists());
    }

    #[test]
    fn test_dropping_flushes_buffered_output() {
        let dir = TempDir::new().unwrap();
        {
            let mut writers = ResultWriters::open(dir.path(), &names(&["out.txt"])).unwrap();
            write!(writers.get("out.txt").unwrap(), "buffered").unwrap();
        }
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "buffered");
    }
}
