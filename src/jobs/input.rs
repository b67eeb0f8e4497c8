//! # Entrada por Archivos
//! src/jobs/input.rs
//!
//! Conjunto de archivos del filesystem que un job copia a su directorio
//! durante `init`.

use crate::error::JobError;
use crate::jobs::job::JobContext;
use crate::jobs::paths::RESERVED_NAMES;
use std::fs;
use std::path::{Path, PathBuf};

/// Archivos de entrada de un job
#[derive(Debug, Clone, Default)]
pub struct FilesInput {
    paths: Vec<PathBuf>,
}

impl FilesInput {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Verifica que vengan exactamente los archivos esperados
    pub fn validate(&self, expected: &[&str]) -> Result<(), JobError> {
        if self.paths.len() != expected.len() {
            return Err(JobError::Input(format!(
                "{} files are provided. However, {} input files are expected: {}.",
                self.paths.len(),
                expected.len(),
                expected.join(", ")
            )));
        }

        for path in &self.paths {
            let name = base_name(path)?;
            if RESERVED_NAMES.contains(&name) {
                return Err(reserved(name));
            }
            if !expected.contains(&name) {
                return Err(JobError::Input(format!(
                    "Unexpected file '{}': {} input files are expected: {}.",
                    name,
                    expected.len(),
                    expected.join(", ")
                )));
            }
        }

        Ok(())
    }

    /// Copia los archivos al directorio del job con su nombre base.
    ///
    /// No copia nada si algún nombre es un marcador o un resultado del job.
    pub fn copy_into<Id>(&self, ctx: &JobContext<Id>) -> Result<(), JobError> {
        let mut names = Vec::with_capacity(self.paths.len());
        for source in &self.paths {
            let name = base_name(source)?;
            if RESERVED_NAMES.contains(&name) {
                return Err(reserved(name));
            }
            if ctx.result_names().any(|result| result == name) {
                return Err(JobError::Input(format!(
                    "input file '{}' has the name of a result file",
                    name
                )));
            }
            names.push(name);
        }

        for (source, name) in self.paths.iter().zip(names) {
            fs::copy(source, ctx.dir().join(name))?;
        }
        Ok(())
    }
}

fn base_name(path: &Path) -> Result<&str, JobError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| JobError::Input(format!("invalid input file name: {}", path.display())))
}

fn reserved(name: &str) -> JobError {
    JobError::Input(format!("input file '{}' uses a reserved marker name", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::paths::END_MARKER;
    use tempfile::TempDir;

    fn sources(dir: &TempDir, names: &[&str]) -> FilesInput {
        let paths: Vec<PathBuf> = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect();
        FilesInput::new(paths)
    }

    fn context(dir: &TempDir, results: &[&str]) -> JobContext<String> {
        JobContext::new("0".to_string(), dir.path().to_path_buf())
            .with_results(results.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_validate_count_and_names() {
        let src = TempDir::new().unwrap();
        let input = sources(&src, &["network.csv", "costs.csv"]);
        assert_eq!(input.len(), 2);

        assert!(input.validate(&["costs.csv", "network.csv"]).is_ok());

        let err = input.validate(&["network.csv"]).unwrap_err();
        assert!(err.to_string().contains("2 files are provided"));

        let err = input.validate(&["network.csv", "capacities.csv"]).unwrap_err();
        assert!(err.to_string().contains("Unexpected file 'costs.csv'"));
    }

    #[test]
    fn test_validate_rejects_marker_names() {
        let src = TempDir::new().unwrap();
        let input = sources(&src, &[END_MARKER]);

        let err = input.validate(&[END_MARKER]).unwrap_err();
        assert!(err.to_string().contains("reserved marker name"));
    }

    #[test]
    fn test_copy_into() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let input = sources(&src, &["a.txt", "b.txt"]);

        input.copy_into(&context(&dst, &["out.txt"])).unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("a.txt")).unwrap(), "a.txt");
        assert_eq!(fs::read_to_string(dst.path().join("b.txt")).unwrap(), "b.txt");
    }

    #[test]
    fn test_copy_into_rejects_markers_and_results() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let ctx = context(&dst, &["out.txt"]);

        let marker = sources(&src, &["a.txt", END_MARKER]);
        assert!(matches!(marker.copy_into(&ctx), Err(JobError::Input(_))));

        let result = sources(&src, &["out.txt"]);
        assert!(matches!(result.copy_into(&ctx), Err(JobError::Input(_))));

        // Nada se copia si algún nombre es inválido
        assert!(!dst.path().join("a.txt").exists());
        assert!(!dst.path().join(END_MARKER).exists());
        assert!(!dst.path().join("out.txt").exists());
    }

    #[test]
    fn test_empty_input() {
        let dst = TempDir::new().unwrap();
        let input = FilesInput::default();
        assert!(input.is_empty());
        input.copy_into(&context(&dst, &[])).unwrap();
    }
}
