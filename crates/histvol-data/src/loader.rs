//! Timestep loading, synchronous and background
//!
//! [`DataLoader`] reads one histogram family of one timestep into a
//! [`HistVolume`], auto-detecting which of the two on-disk layouts the step
//! was written in. [`LoaderWorker`] runs a loader on a background thread fed
//! by a queue, reporting results over a channel so callers can prefetch
//! without blocking.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use histvol_core::{Error, Extent, Result};
use histvol_grid::{HistDomain, HistVolume};
use tracing::{debug, instrument};

use crate::config::PoolConfig;
use crate::format;

/// Reads histogram volumes for one dataset directory
#[derive(Debug, Clone)]
pub struct DataLoader {
    dir: PathBuf,
    config: PoolConfig,
}

impl DataLoader {
    pub fn new(dir: impl Into<PathBuf>, config: PoolConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Directory holding one timestep's files
    pub fn step_dir(&self, step_id: usize) -> PathBuf {
        self.dir.join(format!("{:06}", self.config.time.timestep(step_id)))
    }

    /// Load one histogram family of one timestep
    ///
    /// Probes for the Y-column packed layout first and falls back to the
    /// many-files layout under `<step>/<name>/`.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn load(&self, step_id: usize, name: &str) -> Result<HistVolume> {
        if step_id >= self.config.time.n_steps() {
            return Err(Error::not_found(format!(
                "step {step_id} (dataset has {})",
                self.config.time.n_steps()
            )));
        }
        let vars = &self.config.hist_config(name)?.vars;
        let step_dir = self.step_dir(step_id);
        if !step_dir.is_dir() {
            return Err(Error::not_found(format!(
                "step directory {}",
                step_dir.display()
            )));
        }

        let volume = if format::ycolumn_path(&step_dir, name, 0).is_file() {
            debug!(step_id, name, "loading ycolumn layout");
            self.load_ycolumn(&step_dir, name, vars)
        } else {
            debug!(step_id, name, "loading many-files layout");
            self.load_many_files(&step_dir.join(name), vars)
        }?;
        debug!(
            step_id,
            name,
            n_hists = volume.n_hists(),
            "volume loaded"
        );
        Ok(volume)
    }

    /// Assemble a volume from per-column packed files
    ///
    /// File `col` (`col = x + nx * z`) holds the `ny` domains of that
    /// (x, z) column in Y order; blocks scatter back into flat domain order.
    fn load_ycolumn(&self, step_dir: &Path, name: &str, vars: &[String]) -> Result<HistVolume> {
        let [nx, ny, nz] = self.config.grid.domain_grid;
        let mut slots: Vec<Option<HistDomain>> = Vec::new();
        slots.resize_with(nx * ny * nz, || None);

        for z in 0..nz {
            for x in 0..nx {
                let col = x + nx * z;
                let path = format::ycolumn_path(step_dir, name, col);
                let column = format::read_ycolumn_file(&path, vars)?;
                if column.len() != ny {
                    return Err(Error::inconsistent(format!(
                        "{} holds {} domains, decomposition expects {ny}",
                        path.display(),
                        column.len()
                    )));
                }
                for (y, domain) in column.into_iter().enumerate() {
                    slots[x + nx * (y + ny * z)] = Some(domain);
                }
            }
        }

        // Every slot was assigned exactly once by the loop above
        let domains = slots.into_iter().flatten().collect();
        HistVolume::new(Extent::new(self.config.grid.domain_grid.to_vec()), domains)
    }

    /// Assemble a volume from per-domain sparse file quads
    fn load_many_files(&self, family_dir: &Path, vars: &[String]) -> Result<HistVolume> {
        if !family_dir.is_dir() {
            return Err(Error::not_found(format!(
                "family directory {}",
                family_dir.display()
            )));
        }
        let n_domains = self.config.grid.n_domains();
        let mut domains = Vec::with_capacity(n_domains);
        for id in 0..n_domains {
            domains.push(format::read_sparse_domain(family_dir, id, vars)?);
        }
        HistVolume::new(Extent::new(self.config.grid.domain_grid.to_vec()), domains)
    }
}

/// Outcome of one background load
#[derive(Debug)]
pub struct LoadEvent {
    pub step_id: usize,
    pub name: String,
    pub result: Result<HistVolume>,
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<(usize, String)>,
    // Job currently loading on the worker thread
    current: Option<(usize, String)>,
    shutdown: bool,
}

/// Background loading thread with a replaceable work queue
///
/// Loads run one at a time in queue order; finished volumes arrive as
/// [`LoadEvent`]s on the receiver side. The queue can be cleared when the
/// viewpoint moves, abandoning stale prefetches without aborting the load
/// in flight.
#[derive(Debug)]
pub struct LoaderWorker {
    state: Arc<(Mutex<QueueInner>, Condvar)>,
    events: Receiver<LoadEvent>,
    handle: Option<JoinHandle<()>>,
}

impl LoaderWorker {
    pub fn spawn(loader: DataLoader) -> Self {
        let state = Arc::new((Mutex::new(QueueInner::default()), Condvar::new()));
        let (tx, rx) = mpsc::channel();
        let worker_state = Arc::clone(&state);
        let handle = thread::spawn(move || run_worker(loader, worker_state, tx));
        Self {
            state,
            events: rx,
            handle: Some(handle),
        }
    }

    /// Queue a load unless it is already pending or in flight
    pub fn enqueue(&self, step_id: usize, name: &str) {
        let (lock, cvar) = &*self.state;
        let mut inner = lock.lock().expect("loader queue poisoned");
        let key = (step_id, name.to_string());
        if !inner.pending.contains(&key) && inner.current.as_ref() != Some(&key) {
            inner.pending.push_back(key);
            cvar.notify_all();
        }
    }

    /// Pending queue as (step id, family) pairs
    pub fn pending(&self) -> Vec<(usize, String)> {
        let (lock, _) = &*self.state;
        lock.lock()
            .expect("loader queue poisoned")
            .pending
            .iter()
            .cloned()
            .collect()
    }

    /// Drop all queued loads; the load in flight still completes
    pub fn clear_pending(&self) {
        let (lock, _) = &*self.state;
        lock.lock().expect("loader queue poisoned").pending.clear();
    }

    /// Block until the queue is empty and no load is in flight
    pub fn wait_idle(&self) {
        let (lock, cvar) = &*self.state;
        let mut inner = lock.lock().expect("loader queue poisoned");
        while inner.current.is_some() || !inner.pending.is_empty() {
            inner = cvar.wait(inner).expect("loader queue poisoned");
        }
    }

    /// Next finished load, if any
    pub fn try_recv(&self) -> Option<LoadEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for LoaderWorker {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.state;
        if let Ok(mut inner) = lock.lock() {
            inner.shutdown = true;
            inner.pending.clear();
            cvar.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(loader: DataLoader, state: Arc<(Mutex<QueueInner>, Condvar)>, tx: Sender<LoadEvent>) {
    let (lock, cvar) = &*state;
    loop {
        let job = {
            let mut inner = match lock.lock() {
                Ok(g) => g,
                Err(_) => return,
            };
            loop {
                if inner.shutdown {
                    return;
                }
                if let Some(job) = inner.pending.pop_front() {
                    inner.current = Some(job.clone());
                    break job;
                }
                inner = match cvar.wait(inner) {
                    Ok(g) => g,
                    Err(_) => return,
                };
            }
        };

        let (step_id, name) = job;
        let result = loader.load(step_id, &name);
        let send_failed = tx
            .send(LoadEvent {
                step_id,
                name,
                result,
            })
            .is_err();

        if let Ok(mut inner) = lock.lock() {
            inner.current = None;
            cvar.notify_all();
        }
        if send_failed {
            // Receiver gone; nobody will consume further results
            return;
        }
    }
}
