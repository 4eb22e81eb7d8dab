//! Per-timestep cache entry
//!
//! A [`DataStep`] holds the histogram volumes loaded for one timestep plus
//! the voxel-region selection mask evaluated from the active query rules.
//! Rules AND together, both within one histogram family and across
//! families: a grid cell stays selected only if every rule accepts it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use histvol_core::{Error, Result};
use histvol_grid::HistVolume;
use tracing::debug;

use crate::query::QueryRule;

/// One timestep's loaded volumes and its current selection
#[derive(Debug)]
pub struct DataStep {
    step_id: usize,
    volumes: HashMap<String, Arc<HistVolume>>,
    /// Selection per global histogram id; empty until rules are applied
    mask: Vec<bool>,
    /// Rules the mask was computed from
    rules: Vec<QueryRule>,
}

impl DataStep {
    pub fn new(step_id: usize) -> Self {
        Self {
            step_id,
            volumes: HashMap::new(),
            mask: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn step_id(&self) -> usize {
        self.step_id
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.volumes.contains_key(name)
    }

    pub fn volume(&self, name: &str) -> Option<&Arc<HistVolume>> {
        self.volumes.get(name)
    }

    pub fn volume_names(&self) -> impl Iterator<Item = &str> {
        self.volumes.keys().map(String::as_str)
    }

    /// Store a loaded volume; an already-cached family is kept as is
    pub fn set_volume(&mut self, name: &str, volume: Arc<HistVolume>) {
        self.volumes
            .entry(name.to_string())
            .or_insert(volume);
    }

    /// Whether `rules` match the rules the current mask was computed from
    pub fn rules_match(&self, rules: &[QueryRule]) -> bool {
        self.rules == rules
    }

    /// Whether the mask is up to date for `rules` and the loaded volumes
    ///
    /// False for a freshly constructed step once a volume is present: the
    /// mask starts empty and must be computed even when no rules are active,
    /// since zero rules select every cell rather than none.
    pub fn mask_current(&self, rules: &[QueryRule]) -> bool {
        if !self.rules_match(rules) {
            return false;
        }
        let n_hists = self.volumes.values().next().map_or(0, |v| v.n_hists());
        self.mask.len() == n_hists
    }

    /// Selection per global histogram id; empty before any rule application
    pub fn selection_mask(&self) -> &[bool] {
        &self.mask
    }

    /// Whether the grid cell at a global flat id passed the active rules
    pub fn is_selected(&self, flat: usize) -> bool {
        self.mask.get(flat).copied().unwrap_or(false)
    }

    /// Evaluate `rules` over this step, loading named families on demand
    ///
    /// `load` fetches a family's volume when it is not cached yet. The mask
    /// covers the global histogram grid; with no rules every cell is
    /// selected.
    pub fn apply_rules(
        &mut self,
        rules: &[QueryRule],
        mut load: impl FnMut(&str) -> Result<Arc<HistVolume>>,
    ) -> Result<()> {
        let mut by_name: BTreeMap<&str, Vec<&QueryRule>> = BTreeMap::new();
        for rule in rules {
            by_name.entry(rule.name.as_str()).or_default().push(rule);
        }

        for &name in by_name.keys() {
            if !self.has_volume(name) {
                let volume = load(name)?;
                self.set_volume(name, volume);
            }
        }

        let n_hists = match by_name
            .keys()
            .next()
            .and_then(|name| self.volumes.get(*name))
        {
            Some(v) => v.n_hists(),
            // No rules: everything selected, sized to any loaded volume
            None => self.volumes.values().next().map_or(0, |v| v.n_hists()),
        };
        for (&name, _) in &by_name {
            let v = &self.volumes[name];
            if v.n_hists() != n_hists {
                return Err(Error::inconsistent(format!(
                    "family '{name}' has {} histograms, expected {n_hists}",
                    v.n_hists()
                )));
            }
        }

        let mut mask = vec![true; n_hists];
        for (flat, selected) in mask.iter_mut().enumerate() {
            'rules: for (&name, group) in &by_name {
                let hist = self.volumes[name].hist(flat);
                for rule in group {
                    if !hist.check_range(&rule.intervals, rule.threshold_frac) {
                        *selected = false;
                        break 'rules;
                    }
                }
            }
        }

        debug!(
            step_id = self.step_id,
            n_rules = rules.len(),
            n_selected = mask.iter().filter(|&&s| s).count(),
            n_hists,
            "selection mask updated"
        );
        self.mask = mask;
        self.rules = rules.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histvol_core::Extent;
    use histvol_grid::HistDomain;
    use histvol_hist::{HistAxis, Histogram, Interval};

    /// 1x1x2 volume; histogram 0 has all mass in the lower half of the
    /// range, histogram 1 in the upper half.
    fn volume(name_bins: [(f64, f64); 2]) -> Arc<HistVolume> {
        let domains = name_bins
            .iter()
            .map(|&(lo, hi)| {
                let h = Histogram::from_dense_values(
                    vec![HistAxis::new("x", 2, 0.0, 1.0)],
                    vec![lo, hi],
                )
                .unwrap();
                HistDomain::from_hists(Extent::from([1, 1, 1]), vec![h], [4, 4, 4]).unwrap()
            })
            .collect();
        Arc::new(HistVolume::new(Extent::from([1, 1, 2]), domains).unwrap())
    }

    fn no_load(name: &str) -> Result<Arc<HistVolume>> {
        Err(Error::not_found(format!("family '{name}'")))
    }

    // Stops short of 0.5: an upper bound on the bin boundary would round
    // into bin 1 and select the whole histogram.
    fn lower_half_rule(name: &str) -> QueryRule {
        QueryRule::new(name, vec![Interval::new(0.0, 0.45).unwrap()], 0.9)
    }

    #[test]
    fn test_no_rules_selects_everything() {
        let mut step = DataStep::new(0);
        step.set_volume("t", volume([(10.0, 0.0), (0.0, 10.0)]));
        step.apply_rules(&[], no_load).unwrap();
        assert_eq!(step.selection_mask(), &[true, true]);
        assert!(step.rules_match(&[]));
    }

    #[test]
    fn test_mask_goes_stale_when_volume_arrives() {
        let mut step = DataStep::new(0);
        // Empty step: nothing loaded, nothing to mask
        assert!(step.mask_current(&[]));

        // A volume arrives; the empty mask no longer covers it, even with
        // zero rules active
        step.set_volume("t", volume([(10.0, 0.0), (0.0, 10.0)]));
        assert!(step.rules_match(&[]));
        assert!(!step.mask_current(&[]));
        assert!(!step.is_selected(0));

        step.apply_rules(&[], no_load).unwrap();
        assert!(step.mask_current(&[]));
        assert_eq!(step.selection_mask(), &[true, true]);
    }

    #[test]
    fn test_single_rule_masks() {
        let mut step = DataStep::new(0);
        step.set_volume("t", volume([(10.0, 0.0), (0.0, 10.0)]));
        step.apply_rules(&[lower_half_rule("t")], no_load).unwrap();
        assert_eq!(step.selection_mask(), &[true, false]);
        assert!(step.is_selected(0));
        assert!(!step.is_selected(1));
        assert!(!step.is_selected(99));
    }

    #[test]
    fn test_rules_and_across_families() {
        let mut step = DataStep::new(0);
        step.set_volume("t", volume([(10.0, 0.0), (10.0, 0.0)]));
        step.set_volume("p", volume([(10.0, 0.0), (0.0, 10.0)]));
        step.apply_rules(&[lower_half_rule("t"), lower_half_rule("p")], no_load)
            .unwrap();
        assert_eq!(step.selection_mask(), &[true, false]);
    }

    #[test]
    fn test_missing_family_is_loaded_on_demand() {
        let mut step = DataStep::new(0);
        let v = volume([(10.0, 0.0), (0.0, 10.0)]);
        step.apply_rules(&[lower_half_rule("t")], |name| {
            assert_eq!(name, "t");
            Ok(v.clone())
        })
        .unwrap();
        assert!(step.has_volume("t"));
        assert_eq!(step.selection_mask(), &[true, false]);
    }

    #[test]
    fn test_load_failure_propagates() {
        let mut step = DataStep::new(0);
        let err = step.apply_rules(&[lower_half_rule("t")], no_load).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_reapplying_same_rules_is_idempotent() {
        let mut step = DataStep::new(0);
        step.set_volume("t", volume([(10.0, 0.0), (0.0, 10.0)]));
        let rules = [lower_half_rule("t")];
        step.apply_rules(&rules, no_load).unwrap();
        let first = step.selection_mask().to_vec();
        step.apply_rules(&rules, no_load).unwrap();
        assert_eq!(step.selection_mask(), first.as_slice());
    }

    #[test]
    fn test_set_volume_keeps_first() {
        let mut step = DataStep::new(0);
        let a = volume([(1.0, 0.0), (0.0, 1.0)]);
        let b = volume([(2.0, 0.0), (0.0, 2.0)]);
        step.set_volume("t", a.clone());
        step.set_volume("t", b);
        assert!(Arc::ptr_eq(step.volume("t").unwrap(), &a));
    }

    #[test]
    fn test_rules_match_is_tolerant() {
        let mut step = DataStep::new(0);
        step.set_volume("t", volume([(10.0, 0.0), (0.0, 10.0)]));
        step.apply_rules(&[lower_half_rule("t")], no_load).unwrap();

        let mut wiggled = lower_half_rule("t");
        wiggled.threshold_frac += 5e-5;
        assert!(step.rules_match(&[wiggled]));

        let mut moved = lower_half_rule("t");
        moved.threshold_frac = 0.5;
        assert!(!step.rules_match(&[moved]));
    }
}
