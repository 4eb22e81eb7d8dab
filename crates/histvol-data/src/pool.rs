//! Sliding-window timestep cache
//!
//! [`DataPool`] is the top-level entry point: it keeps the timesteps near
//! the one being viewed resident, prefetches neighbors on a background
//! thread, and evicts steps that fall outside the window. Query rules are
//! held pool-wide; each cached step's selection mask is recomputed lazily
//! when it is observed with stale rules.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use histvol_core::{Error, Result};
use histvol_grid::HistVolume;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::loader::{DataLoader, LoaderWorker};
use crate::query::QueryRule;
use crate::step::DataStep;

/// Steps this far from the viewed one stay cached; farther ones are evicted
pub const DEFAULT_CACHE_RADIUS: usize = 5;

/// Window cache over all timesteps of one dataset
pub struct DataPool {
    dir: PathBuf,
    config: PoolConfig,
    loader: DataLoader,
    worker: LoaderWorker,
    steps: Vec<Option<DataStep>>,
    rules: Vec<QueryRule>,
    radius: usize,
}

impl DataPool {
    /// Open a dataset directory, reading its `pdf.config`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let config = PoolConfig::from_dir(&dir)?;
        Ok(Self::with_config(dir, config))
    }

    /// Open with an explicit configuration
    pub fn with_config(dir: impl Into<PathBuf>, config: PoolConfig) -> Self {
        let dir = dir.into();
        let loader = DataLoader::new(&dir, config.clone());
        let worker = LoaderWorker::spawn(DataLoader::new(&dir, config.clone()));
        let mut steps = Vec::new();
        steps.resize_with(config.time.n_steps(), || None);
        Self {
            dir,
            config,
            loader,
            worker,
            steps,
            rules: Vec::new(),
            radius: DEFAULT_CACHE_RADIUS,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn n_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn cache_radius(&self) -> usize {
        self.radius
    }

    pub fn set_cache_radius(&mut self, radius: usize) {
        self.radius = radius;
    }

    /// Active query rules
    pub fn rules(&self) -> &[QueryRule] {
        &self.rules
    }

    /// Replace the active rules and recompute every cached step's mask
    ///
    /// Masks of steps loaded later are computed on first observation.
    pub fn set_rules(&mut self, rules: Vec<QueryRule>) -> Result<()> {
        self.drain_events();
        self.rules = rules;
        let loader = &self.loader;
        for (step_id, slot) in self.steps.iter_mut().enumerate() {
            if let Some(step) = slot {
                step.apply_rules(&self.rules, |name| {
                    loader.load(step_id, name).map(Arc::new)
                })?;
            }
        }
        Ok(())
    }

    /// A family's volume at a step, loading synchronously if absent
    ///
    /// Marks `step_id` as the viewed step: evicts cached steps farther than
    /// the cache radius and queues background prefetches for the remaining
    /// window and for this step's other families.
    pub fn volume(&mut self, step_id: usize, name: &str) -> Result<Arc<HistVolume>> {
        self.drain_events();
        self.check_step(step_id)?;
        self.config.hist_config(name)?;

        let loader = &self.loader;
        let step = self.steps[step_id].get_or_insert_with(|| DataStep::new(step_id));
        if !step.has_volume(name) {
            let volume = Arc::new(loader.load(step_id, name)?);
            step.set_volume(name, volume);
        }
        if !step.mask_current(&self.rules) {
            step.apply_rules(&self.rules, |n| loader.load(step_id, n).map(Arc::new))?;
        }
        let volume = step
            .volume(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("volume '{name}' at step {step_id}")))?;

        self.apply_window(step_id, name);
        Ok(volume)
    }

    /// The cached step entry, recomputing its mask if the rules went stale
    pub fn step(&mut self, step_id: usize) -> Result<&DataStep> {
        self.drain_events();
        self.check_step(step_id)?;
        let loader = &self.loader;
        let rules = &self.rules;
        let step = self.steps[step_id].get_or_insert_with(|| DataStep::new(step_id));
        if !step.mask_current(rules) {
            step.apply_rules(rules, |n| loader.load(step_id, n).map(Arc::new))?;
        }
        Ok(step)
    }

    /// Whether a step is resident in the cache
    pub fn is_cached(&self, step_id: usize) -> bool {
        self.steps.get(step_id).is_some_and(Option::is_some)
    }

    /// Ids of all resident steps
    pub fn cached_steps(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(id, s)| s.as_ref().map(|_| id))
            .collect()
    }

    /// Queued background loads as (step id, family) pairs
    pub fn pending_loads(&self) -> Vec<(usize, String)> {
        self.worker.pending()
    }

    /// Block until the background loader has drained its queue, then fold
    /// its results into the cache. Intended for tests and batch pipelines.
    pub fn wait_idle(&mut self) {
        self.worker.wait_idle();
        self.drain_events();
    }

    /// Slide the window to `step_id`: evict far steps, prefetch near ones
    fn apply_window(&mut self, step_id: usize, name: &str) {
        for (id, slot) in self.steps.iter_mut().enumerate() {
            if slot.is_some() && id.abs_diff(step_id) > self.radius {
                debug!(evicted = id, viewed = step_id, "step left cache window");
                *slot = None;
            }
        }

        self.worker.clear_pending();
        let lo = step_id.saturating_sub(self.radius);
        let hi = (step_id + self.radius).min(self.steps.len().saturating_sub(1));
        for s in lo..=hi {
            if s == step_id {
                continue;
            }
            let resident = self.steps[s]
                .as_ref()
                .is_some_and(|step| step.has_volume(name));
            if !resident {
                self.worker.enqueue(s, name);
            }
        }
        // Other families of the viewed step, for cross-family rule queries
        for cfg in &self.config.hists {
            if cfg.name != name
                && !self.steps[step_id]
                    .as_ref()
                    .is_some_and(|step| step.has_volume(&cfg.name))
            {
                self.worker.enqueue(step_id, &cfg.name);
            }
        }
    }

    /// Fold finished background loads into the cache
    fn drain_events(&mut self) {
        while let Some(event) = self.worker.try_recv() {
            match event.result {
                Ok(volume) => {
                    if let Some(slot) = self.steps.get_mut(event.step_id) {
                        let step = slot.get_or_insert_with(|| DataStep::new(event.step_id));
                        step.set_volume(&event.name, Arc::new(volume));
                    }
                }
                Err(err) => {
                    warn!(
                        step_id = event.step_id,
                        name = %event.name,
                        %err,
                        "background load failed"
                    );
                }
            }
        }
    }

    fn check_step(&self, step_id: usize) -> Result<()> {
        if step_id >= self.steps.len() {
            return Err(Error::not_found(format!(
                "step {step_id} (dataset has {})",
                self.steps.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_requires_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(DataPool::open(dir.path()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_step_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let config = PoolConfig::parse(
            "domains 1 1 1\nvoxels 8 8 8\ntimesteps 0 3 1\nhist t t\n",
        )
        .unwrap();
        let mut pool = DataPool::with_config(dir.path(), config);
        assert_eq!(pool.n_steps(), 3);
        assert!(matches!(pool.volume(3, "t"), Err(Error::NotFound(_))));
        assert!(matches!(pool.volume(0, "missing"), Err(Error::NotFound(_))));
    }
}
