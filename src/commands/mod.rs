//! # Jobs Incluidos
//!
//! Cuerpos de job listos para usar con una `JobSession`.
//!
//! - **process**: `CommandJob`, corre un programa externo dentro del
//!   directorio del job y redirige su salida a archivos de resultado.

pub mod process;

pub use process::{CommandJob, ProcessGuard};
