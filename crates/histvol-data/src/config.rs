//! Dataset configuration
//!
//! A dataset directory carries a `pdf.config` text file describing the
//! domain decomposition, voxel grid, available timesteps, and the histogram
//! families written per step. Line format, `#` comments allowed:
//!
//! ```text
//! domains 4 4 4
//! voxels 256 256 256
//! timesteps 0 100 50
//! hist temperature temperature
//! hist velocity vx vy vz
//! ```

use std::fs;
use std::path::Path;

use histvol_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Spatial decomposition of the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Domains per spatial axis
    pub domain_grid: [usize; 3],
    /// Total voxels per spatial axis
    pub voxel_grid: [usize; 3],
}

impl GridConfig {
    pub fn n_domains(&self) -> usize {
        self.domain_grid.iter().product()
    }
}

/// Which simulation timesteps exist on disk
///
/// Step ids are contiguous `0..count`; the on-disk timestep number is
/// `start + id * stride`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpec {
    pub start: usize,
    pub count: usize,
    pub stride: usize,
}

impl TimeSpec {
    pub fn n_steps(&self) -> usize {
        self.count
    }

    /// On-disk timestep number for a step id
    pub fn timestep(&self, step_id: usize) -> usize {
        self.start + step_id * self.stride
    }
}

/// One histogram family: a name and the variables binned per axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistConfig {
    pub name: String,
    pub vars: Vec<String>,
}

/// Full dataset configuration parsed from `pdf.config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub grid: GridConfig,
    pub time: TimeSpec,
    pub hists: Vec<HistConfig>,
}

impl PoolConfig {
    /// Parse the `pdf.config` of a dataset directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("pdf.config");
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::NotFound(format!("config {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    /// Parse configuration text; see the module docs for the format
    pub fn parse(text: &str) -> Result<Self> {
        let mut domain_grid = None;
        let mut voxel_grid = None;
        let mut time = None;
        let mut hists = Vec::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let key = fields.next().unwrap_or("");
            let rest: Vec<&str> = fields.collect();
            let bad = |msg: &str| {
                Error::Corrupt(format!("pdf.config line {}: {msg}: '{line}'", lineno + 1))
            };
            match key {
                "domains" => domain_grid = Some(parse_triplet(&rest).ok_or_else(|| bad("expected three positive integers"))?),
                "voxels" => voxel_grid = Some(parse_triplet(&rest).ok_or_else(|| bad("expected three positive integers"))?),
                "timesteps" => {
                    let t = parse_triplet(&rest).ok_or_else(|| bad("expected start, count, stride"))?;
                    time = Some(TimeSpec {
                        start: t[0],
                        count: t[1],
                        stride: t[2],
                    });
                }
                "hist" => {
                    if rest.len() < 2 || rest.len() > 4 {
                        return Err(bad("expected a name and 1 to 3 variables"));
                    }
                    hists.push(HistConfig {
                        name: rest[0].to_string(),
                        vars: rest[1..].iter().map(|s| s.to_string()).collect(),
                    });
                }
                _ => return Err(bad("unknown directive")),
            }
        }

        let grid = GridConfig {
            domain_grid: domain_grid
                .ok_or_else(|| Error::Corrupt("pdf.config missing 'domains' line".to_string()))?,
            voxel_grid: voxel_grid
                .ok_or_else(|| Error::Corrupt("pdf.config missing 'voxels' line".to_string()))?,
        };
        let time =
            time.ok_or_else(|| Error::Corrupt("pdf.config missing 'timesteps' line".to_string()))?;
        if hists.is_empty() {
            return Err(Error::Corrupt(
                "pdf.config declares no histogram families".to_string(),
            ));
        }
        Ok(Self { grid, time, hists })
    }

    /// Config of a named histogram family
    pub fn hist_config(&self, name: &str) -> Result<&HistConfig> {
        self.hists
            .iter()
            .find(|h| h.name == name)
            .ok_or_else(|| Error::not_found(format!("histogram family '{name}'")))
    }
}

fn parse_triplet(fields: &[&str]) -> Option<[usize; 3]> {
    if fields.len() != 3 {
        return None;
    }
    let mut out = [0usize; 3];
    for (o, f) in out.iter_mut().zip(fields) {
        *o = f.parse().ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# jet dataset
domains 4 4 4
voxels 256 256 256
timesteps 0 100 50

hist temperature temperature
hist velocity vx vy vz
";

    #[test]
    fn test_parse_sample() {
        let cfg = PoolConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.grid.domain_grid, [4, 4, 4]);
        assert_eq!(cfg.grid.n_domains(), 64);
        assert_eq!(cfg.grid.voxel_grid, [256, 256, 256]);
        assert_eq!(cfg.time.n_steps(), 100);
        assert_eq!(cfg.time.timestep(0), 0);
        assert_eq!(cfg.time.timestep(3), 150);
        assert_eq!(cfg.hists.len(), 2);
        assert_eq!(cfg.hists[1].vars, vec!["vx", "vy", "vz"]);
    }

    #[test]
    fn test_family_lookup() {
        let cfg = PoolConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.hist_config("velocity").unwrap().vars.len(), 3);
        assert!(matches!(
            cfg.hist_config("pressure"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_missing_sections() {
        assert!(PoolConfig::parse("domains 2 2 2\nvoxels 8 8 8\n").is_err());
        assert!(PoolConfig::parse("voxels 8 8 8\ntimesteps 0 1 1\nhist t t\n").is_err());
    }

    #[test]
    fn test_rejects_bad_lines() {
        assert!(PoolConfig::parse("domains 2 2\n").is_err());
        assert!(PoolConfig::parse("unknown 1 2 3\n").is_err());
        assert!(PoolConfig::parse("hist lonely\n").is_err());
        assert!(PoolConfig::parse("hist too v1 v2 v3 v4\n").is_err());
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pdf.config"), SAMPLE).unwrap();
        let cfg = PoolConfig::from_dir(dir.path()).unwrap();
        assert_eq!(cfg.hists.len(), 2);

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            PoolConfig::from_dir(empty.path()),
            Err(Error::NotFound(_))
        ));
    }
}
