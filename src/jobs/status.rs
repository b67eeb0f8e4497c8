//! # Estado de un Job
//! src/jobs/status.rs
//!
//! El estado se reconstruye leyendo los archivos marcadores del directorio
//! del job. No hay estado en memoria.
//!
//! | begin | end | error | estado    |
//! |-------|-----|-------|-----------|
//! | sí    | no  | no    | Running   |
//! | sí    | sí  | no    | Completed |
//! | sí    | *   | sí    | Failed    |
//! | no    | *   | *     | (error)   |

use crate::error::{Result, SessionError};
use crate::jobs::id::IdAllocator;
use crate::jobs::paths::PathScheme;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fs;
use std::path::Path;

/// Formato fijo de los timestamps de los marcadores
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp actual con el formato de los marcadores
pub fn now_stamp() -> String {
    Local::now().naive_local().format(TIME_FORMAT).to_string()
}

/// Lee y parsea un archivo marcador de tiempo
pub fn parse_time_file(path: &Path) -> Result<NaiveDateTime> {
    if !path.is_file() {
        return Err(SessionError::MissingMarker(path.to_path_buf()));
    }

    let text = fs::read_to_string(path)
        .map_err(|e| SessionError::io(format!("failed to read {}", path.display()), e))?;

    NaiveDateTime::parse_from_str(text.trim(), TIME_FORMAT).map_err(|_| {
        SessionError::InvalidTimestamp {
            path: path.to_path_buf(),
            text,
        }
    })
}

/// Estado derivado de un job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

/// Snapshot del estado de un job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus<Id> {
    pub id: Id,

    #[serde(serialize_with = "serialize_time")]
    pub time_begin: NaiveDateTime,

    #[serde(serialize_with = "serialize_opt_time")]
    pub time_end: Option<NaiveDateTime>,

    /// Texto acumulado del archivo de error
    pub error: Option<String>,

    /// Estado derivado (solo para serialización)
    state: JobState,
}

impl<Id> JobStatus<Id> {
    pub fn new(
        id: Id,
        time_begin: NaiveDateTime,
        time_end: Option<NaiveDateTime>,
        error: Option<String>,
    ) -> Self {
        let state = match (&time_end, &error) {
            (_, Some(_)) => JobState::Failed,
            (Some(_), None) => JobState::Completed,
            (None, None) => JobState::Running,
        };

        Self {
            id,
            time_begin,
            time_end,
            error,
            state,
        }
    }

    /// Lee el estado desde los marcadores del directorio del job
    pub fn read<A>(paths: &PathScheme<A>, id: Id) -> Result<Self>
    where
        A: IdAllocator<Id = Id>,
    {
        let time_begin = parse_time_file(&paths.begin_marker_of(&id))?;

        let end_path = paths.end_marker_of(&id);
        let time_end = if end_path.is_file() {
            Some(parse_time_file(&end_path)?)
        } else {
            None
        };

        let err_path = paths.error_marker_of(&id);
        let error = if err_path.is_file() {
            let text = fs::read_to_string(&err_path)
                .map_err(|e| SessionError::io(format!("failed to read {}", err_path.display()), e))?;
            Some(text)
        } else {
            None
        };

        Ok(Self::new(id, time_begin, time_end, error))
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    /// Terminó sin errores
    pub fn is_completed(&self) -> bool {
        self.state == JobState::Completed
    }

    pub fn is_error(&self) -> bool {
        self.state == JobState::Failed
    }

    /// Existe el marcador de fin (con o sin error)
    pub fn is_finished(&self) -> bool {
        self.time_end.is_some()
    }
}

fn serialize_time<S: Serializer>(time: &NaiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
}

fn serialize_opt_time<S: Serializer>(
    time: &Option<NaiveDateTime>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match time {
        Some(t) => serialize_time(t, serializer),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn time(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, TIME_FORMAT).unwrap()
    }

    #[test]
    fn test_state_derivation() {
        let begin = time("2024-01-01 10:00:00");
        let end = time("2024-01-01 10:05:00");

        let running = JobStatus::new("0", begin, None, None);
        assert_eq!(running.state(), JobState::Running);
        assert!(running.is_running());
        assert!(!running.is_finished());

        let completed = JobStatus::new("0", begin, Some(end), None);
        assert_eq!(completed.state(), JobState::Completed);
        assert!(completed.is_completed());
        assert!(completed.is_finished());

        let failed_running = JobStatus::new("0", begin, None, Some("boom".to_string()));
        assert_eq!(failed_running.state(), JobState::Failed);
        assert!(failed_running.is_error());

        let failed_done = JobStatus::new("0", begin, Some(end), Some("boom".to_string()));
        assert_eq!(failed_done.state(), JobState::Failed);
        assert!(failed_done.is_finished());
    }

    #[test]
    fn test_now_stamp_parses_back() {
        let stamp = now_stamp();
        assert!(NaiveDateTime::parse_from_str(&stamp, TIME_FORMAT).is_ok());
        assert_eq!(stamp.len(), "yyyy-MM-dd HH:mm:ss".len());
    }

    #[test]
    fn test_parse_time_file_missing() {
        let dir = TempDir::new().unwrap();
        let err = parse_time_file(&dir.path().join("___beg___.txt")).unwrap_err();
        assert!(matches!(err, SessionError::MissingMarker(_)));
    }

    #[test]
    fn test_parse_time_file_trims_whitespace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("___beg___.txt");
        fs::write(&path, "2024-03-15 08:30:00\n").unwrap();
        assert_eq!(parse_time_file(&path).unwrap(), time("2024-03-15 08:30:00"));
    }

    #[test]
    fn test_parse_time_file_rejects_other_formats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("___beg___.txt");
        fs::write(&path, "15/03/2024 08:30").unwrap();
        let err = parse_time_file(&path).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_status_serialization() {
        let status = JobStatus::new(
            "7".to_string(),
            time("2024-01-01 10:00:00"),
            None,
            None,
        );
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["id"], "7");
        assert_eq!(json["time_begin"], "2024-01-01 10:00:00");
        assert!(json["time_end"].is_null());
        assert!(json["error"].is_null());
        assert_eq!(json["state"], "running");
    }
}
