//! # Errores del Motor de Jobs
//! src/error.rs
//!
//! Dos familias de errores:
//! - `SessionError`: fallos síncronos que ve quien llama a la sesión.
//! - `JobError`: fallos del cuerpo de un job (`init` / `run`). Los de `run`
//!   nunca llegan a quien hizo el submit; terminan en el archivo de error.

use std::path::PathBuf;
use thiserror::Error;

/// Error producido por el cuerpo de un job
#[derive(Error, Debug)]
pub enum JobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("no writer for result '{0}'")]
    MissingWriter(String),

    #[error("invalid input: {0}")]
    Input(String),
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed(message.into())
    }

    /// Convierte el payload de un panic capturado en un error
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        JobError::Panicked(message)
    }
}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        JobError::Failed(message)
    }
}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        JobError::Failed(message.to_string())
    }
}

/// Error de una operación de la sesión
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("duplicate job id: directory {0} already exists")]
    DuplicateId(PathBuf),

    #[error("job not found: {0}")]
    JobNotFound(PathBuf),

    #[error("result file '{name}' not found in {dir}")]
    ResultNotFound { dir: PathBuf, name: String },

    #[error("failed to parse '{name}' as a job id: {reason}")]
    InvalidId { name: String, reason: String },

    #[error("could not allocate a free job id after {attempts} attempts")]
    IdsExhausted { attempts: usize },

    #[error("job at {0} is not completed: end marker is missing")]
    NotCompleted(PathBuf),

    #[error("cannot find time-file: {0}")]
    MissingMarker(PathBuf),

    #[error("failed to parse '{text}' as time in {path}")]
    InvalidTimestamp { path: PathBuf, text: String },

    #[error("invalid result name '{name}': {reason}")]
    InvalidResultName { name: String, reason: String },

    #[error("job {id} failed to initialize: {source}")]
    Init {
        id: String,
        #[source]
        source: JobError,
    },

    #[error("archive error at {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out waiting for job at {0}")]
    Timeout(PathBuf),

    #[error("job at {dir} never started: {error}")]
    NotStarted { dir: PathBuf, error: String },

    #[error("{} operation(s) failed: {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<SessionError>),
}

impl SessionError {
    /// Envuelve un error de I/O con el contexto de la operación
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SessionError::Io {
            context: context.into(),
            source,
        }
    }
}

fn join_errors(errors: &[SessionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_lists_every_failure() {
        let err = SessionError::Aggregate(vec![
            SessionError::NotCompleted(PathBuf::from("/jobs/0")),
            SessionError::JobNotFound(PathBuf::from("/jobs/1")),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 operation(s) failed"));
        assert!(text.contains("/jobs/0"));
        assert!(text.contains("/jobs/1"));
    }

    #[test]
    fn test_panic_payload_conversion() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        match JobError::from_panic(payload) {
            JobError::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected error: {:?}", other),
        }

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(
            JobError::from_panic(payload).to_string(),
            "job panicked: owned boom"
        );
    }
}
