//! # Límite de Concurrencia
//! src/jobs/limiter.rs
//!
//! Semáforo contador opcional. Por defecto la sesión no lo usa y cada job
//! corre apenas se hace submit; con un límite, el thread del job espera un
//! permiso antes de abrir sus writers.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

struct LimiterState {
    running: usize,
}

/// Semáforo contador thread-safe
#[derive(Clone)]
pub struct Limiter {
    state: Arc<Mutex<LimiterState>>,
    condvar: Arc<Condvar>,
    max_running: usize,
}

/// Permiso de ejecución; se libera al hacer drop
pub struct Permit {
    limiter: Limiter,
}

impl Limiter {
    /// Crea un limitador con al menos un permiso
    pub fn new(max_running: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LimiterState { running: 0 })),
            condvar: Arc::new(Condvar::new()),
            max_running: max_running.max(1),
        }
    }

    pub fn max_running(&self) -> usize {
        self.max_running
    }

    /// Jobs con permiso en este momento
    pub fn running(&self) -> usize {
        self.lock().running
    }

    /// Bloquea hasta obtener un permiso
    pub fn acquire(&self) -> Permit {
        let mut state = self.lock();
        while state.running >= self.max_running {
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        state.running += 1;

        Permit {
            limiter: self.clone(),
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        state.running = state.running.saturating_sub(1);
        self.condvar.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // Un panic con el lock tomado no invalida el contador
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

impl std::fmt::Debug for Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter")
            .field("max_running", &self.max_running)
            .field("running", &self.running())
            .finish()
    }
}
