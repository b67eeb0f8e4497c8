//! # Motor de Jobs
//!
//! Jobs largos y asíncronos cuyo único registro persistente es un árbol de
//! directorios: un directorio por job, con marcadores de inicio, fin y error
//! más los archivos de resultado.
//!
//! ## Piezas
//!
//! - `id`: asignación de ids (`SequentialIds`, `UuidIds`)
//! - `paths`: rutas de cada job y operaciones de filesystem asociadas
//! - `writers`: writers de resultados, todo-o-nada
//! - `status`: estado derivado de los marcadores
//! - `archive`: empaquetado zip de resultados
//! - `executor`: pasos de la ejecución en segundo plano
//! - `session`: orquestador (`JobSession`)

pub mod archive;
mod executor;
pub mod id;
pub mod input;
pub mod job;
pub mod limiter;
pub mod paths;
pub mod session;
pub mod status;
pub mod writers;

pub use id::{IdAllocator, SequentialIds, UuidIds};
pub use input::FilesInput;
pub use job::{Job, JobContext};
pub use paths::PathScheme;
pub use session::JobSession;
pub use status::{JobState, JobStatus};
pub use writers::ResultWriters;
