//! Catalog worker
//!
//! Catalog queries can block, so the player never runs them under its lock or
//! from a pipeline callback. Jobs go to a dedicated thread, or, in inline
//! mode, to a queue drained by the caller once it has released the lock.

use crate::lock;
use crossbeam_channel::{bounded, unbounded, Sender};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;

/// Unit of deferred work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

enum Mode {
    Thread(Sender<Job>),
    Inline(Mutex<VecDeque<Job>>),
}

/// Executes catalog-bound jobs in submission order
pub struct CatalogWorker {
    mode: Mode,
}

impl CatalogWorker {
    /// Spawn a background worker thread
    ///
    /// The thread exits once the worker is dropped and the queue is drained.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                tracing::debug!("Catalog worker started");
                for job in rx {
                    job();
                }
                tracing::debug!("Catalog worker stopped");
            })?;
        Ok(Self {
            mode: Mode::Thread(tx),
        })
    }

    /// Worker whose jobs run on the thread calling [`run_pending`](Self::run_pending)
    pub fn inline() -> Self {
        Self {
            mode: Mode::Inline(Mutex::new(VecDeque::new())),
        }
    }

    /// Check if jobs run on a background thread
    pub fn is_background(&self) -> bool {
        matches!(self.mode, Mode::Thread(_))
    }

    /// Queue a job
    pub fn submit(&self, job: Job) {
        match &self.mode {
            Mode::Thread(tx) => {
                if tx.send(job).is_err() {
                    tracing::warn!("Catalog worker is gone, dropping job");
                }
            }
            Mode::Inline(queue) => lock(queue).push_back(job),
        }
    }

    /// Run queued inline jobs, including any they queue in turn
    ///
    /// No-op for a background worker. Must not be called with the player lock
    /// held.
    pub fn run_pending(&self) {
        let Mode::Inline(queue) = &self.mode else {
            return;
        };
        loop {
            let job = lock(queue).pop_front();
            match job {
                Some(job) => job(),
                None => break,
            }
        }
    }

    /// Block until every job submitted so far has run
    pub fn wait_idle(&self) {
        match &self.mode {
            Mode::Thread(tx) => {
                let (done_tx, done_rx) = bounded::<()>(1);
                let barrier: Job = Box::new(move || {
                    let _ = done_tx.send(());
                });
                if tx.send(barrier).is_ok() {
                    let _ = done_rx.recv();
                }
            }
            Mode::Inline(_) => self.run_pending(),
        }
    }
}

impl std::fmt::Debug for CatalogWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogWorker")
            .field("background", &self.is_background())
            .finish()
    }
}
