//! # Jobs con Procesos Externos
//! src/commands/process.rs
//!
//! `CommandJob` corre un programa dentro del directorio del job. Los archivos
//! de entrada se copian en `init`; stdout y stderr van directo a los archivos
//! de resultado configurados.
//!
//! El proceso hijo vive dentro de un `ProcessGuard`: si `run` termina por
//! cualquier camino sin haber esperado al hijo (error, panic), el guard lo
//! mata y lo recoge.

use crate::error::JobError;
use crate::jobs::input::FilesInput;
use crate::jobs::job::{Job, JobContext};
use crate::jobs::writers::ResultWriters;
use std::fmt::Display;
use std::io::{self, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// Proceso hijo que se mata al hacer drop si sigue corriendo
#[derive(Debug)]
pub struct ProcessGuard {
    child: Option<Child>,
}

impl ProcessGuard {
    /// Lanza el comando
    pub fn spawn(command: &mut Command) -> io::Result<Self> {
        let child = command.spawn()?;
        debug!(pid = child.id(), "child process started");
        Ok(Self { child: Some(child) })
    }

    /// PID del hijo
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Espera a que el hijo termine
    pub fn wait(mut self) -> io::Result<ExitStatus> {
        match self.child.take() {
            Some(mut child) => child.wait(),
            None => Err(io::Error::new(io::ErrorKind::Other, "process already reaped")),
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        let pid = child.id();
        if let Err(e) = child.kill() {
            warn!(pid, error = %e, "failed to kill child process");
        }
        if let Err(e) = child.wait() {
            warn!(pid, error = %e, "failed to reap child process");
        } else {
            debug!(pid, "child process killed");
        }
    }
}

/// Job que ejecuta un programa externo
#[derive(Debug, Clone)]
pub struct CommandJob {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    stdout: Option<String>,
    stderr: Option<String>,
    expected_inputs: Option<Vec<String>>,
}

impl CommandJob {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdout: None,
            stderr: None,
            expected_inputs: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Resultado que recibe el stdout del proceso
    pub fn stdout_to(mut self, result: impl Into<String>) -> Self {
        self.stdout = Some(result.into());
        self
    }

    /// Resultado que recibe el stderr del proceso
    pub fn stderr_to(mut self, result: impl Into<String>) -> Self {
        self.stderr = Some(result.into());
        self
    }

    /// Nombres exactos de archivos de entrada que se aceptan
    pub fn expect_inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_inputs = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Stdio que escribe en el archivo del resultado `name`
    fn redirect(results: &mut ResultWriters, name: Option<&str>) -> Result<Stdio, JobError> {
        let Some(name) = name else {
            return Ok(Stdio::null());
        };

        let writer = results.get(name)?;
        // Lo que el job haya escrito antes va primero
        writer.flush()?;
        let file = writer.get_ref().try_clone()?;
        Ok(Stdio::from(file))
    }
}

impl<Id: Display + Send + 'static> Job<Id> for CommandJob {
    type Input = FilesInput;

    fn init(&mut self, ctx: &JobContext<Id>, input: FilesInput) -> Result<(), JobError> {
        if let Some(expected) = &self.expected_inputs {
            let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
            input.validate(&expected)?;
        }
        debug!(job = %ctx.id(), inputs = input.len(), "copying input files");
        input.copy_into(ctx)
    }

    fn run(&mut self, ctx: &JobContext<Id>, results: &mut ResultWriters) -> Result<(), JobError> {
        let stdout = Self::redirect(results, self.stdout.as_deref())?;
        let stderr = Self::redirect(results, self.stderr.as_deref())?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(ctx.dir())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        debug!(job = %ctx.id(), program = %self.program, args = ?self.args, "launching command");

        let guard = ProcessGuard::spawn(&mut command)
            .map_err(|e| JobError::failed(format!("failed to start '{}': {}", self.program, e)))?;
        let status = guard.wait()?;

        if status.success() {
            Ok(())
        } else {
            Err(JobError::failed(format!("'{}' exited with {}", self.program, status)))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> JobContext<String> {
        JobContext::new("0".to_string(), dir.path().to_path_buf())
    }

    fn writers(dir: &TempDir, names: &[&str]) -> ResultWriters {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        ResultWriters::open(dir.path(), &names).unwrap()
    }

    // ==================== CommandJob ====================

    #[test]
    fn test_stdout_and_stderr_go_to_results() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut results = writers(&dir, &["out.txt", "err.txt"]);
        let mut job = CommandJob::new("sh")
            .args(["-c", "echo hello; echo oops 1>&2"])
            .stdout_to("out.txt")
            .stderr_to("err.txt");

        job.run(&ctx, &mut results).unwrap();
        results.close().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hello\n");
        assert_eq!(fs::read_to_string(dir.path().join("err.txt")).unwrap(), "oops\n");
    }

    #[test]
    fn test_runs_inside_job_dir_with_inputs() {
        let src = TempDir::new().unwrap();
        let input_path = src.path().join("numbers.txt");
        fs::write(&input_path, "1\n2\n3\n").unwrap();

        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut job = CommandJob::new("sh")
            .args(["-c", "wc -l < numbers.txt | tr -d ' '"])
            .stdout_to("count.txt")
            .expect_inputs(["numbers.txt"]);

        job.init(&ctx, FilesInput::new([input_path])).unwrap();
        assert!(dir.path().join("numbers.txt").is_file());

        let mut results = writers(&dir, &["count.txt"]);
        job.run(&ctx, &mut results).unwrap();
        results.close().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("count.txt")).unwrap().trim(), "3");
    }

    #[test]
    fn test_init_rejects_unexpected_inputs() {
        let src = TempDir::new().unwrap();
        let path = src.path().join("other.txt");
        fs::write(&path, "x").unwrap();

        let dir = TempDir::new().unwrap();
        let mut job = CommandJob::new("true").expect_inputs(["numbers.txt"]);
        let err = job.init(&context(&dir), FilesInput::new([path])).unwrap_err();
        assert!(matches!(err, JobError::Input(_)));
    }

    #[test]
    fn test_env_is_passed() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut results = writers(&dir, &["out.txt"]);
        let mut job = CommandJob::new("sh")
            .args(["-c", "printf '%s' \"$SCENARIO\""])
            .env("SCENARIO", "peak-season")
            .stdout_to("out.txt");

        job.run(&ctx, &mut results).unwrap();
        results.close().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "peak-season");
    }

    #[test]
    fn test_non_zero_exit_is_failure() {
        let dir = TempDir::new().unwrap();
        let mut results = writers(&dir, &[]);
        let mut job = CommandJob::new("sh").args(["-c", "exit 3"]);

        let err = job.run(&context(&dir), &mut results).unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[test]
    fn test_missing_program_is_failure() {
        let dir = TempDir::new().unwrap();
        let mut results = writers(&dir, &[]);
        let mut job = CommandJob::new(PathBuf::from("/definitely/not/here").display().to_string());

        let err = job.run(&context(&dir), &mut results).unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[test]
    fn test_missing_stdout_writer_is_failure() {
        let dir = TempDir::new().unwrap();
        let mut results = writers(&dir, &[]);
        let mut job = CommandJob::new("true").stdout_to("out.txt");

        let err = job.run(&context(&dir), &mut results).unwrap_err();
        assert!(matches!(err, JobError::MissingWriter(_)));
    }

    // ==================== ProcessGuard ====================

    #[test]
    fn test_guard_kills_child_on_drop() {
        let start = Instant::now();
        let guard = ProcessGuard::spawn(Command::new("sleep").arg("30")).unwrap();
        let pid = guard.id().unwrap();
        drop(guard);

        assert!(start.elapsed() < Duration::from_secs(10));
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success());
    }

    #[test]
    fn test_guard_wait_returns_status() {
        let guard = ProcessGuard::spawn(&mut Command::new("true")).unwrap();
        assert!(guard.wait().unwrap().success());
    }
}
