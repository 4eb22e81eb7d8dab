//! On-disk histogram and domain record formats
//!
//! All binary records are little-endian. Two domain layouts exist on disk:
//!
//! * **Y-column packed**: one file per (x, z) domain column,
//!   `pdfs-ycolumn-<name>.NNNNN`, holding a sequence of
//!   (meta record + histograms) blocks, one block per domain along the
//!   Y axis, terminated by EOF. `NNNNN` is the flat column index
//!   (x fastest).
//! * **Many-files**: four sibling files per domain, suffixed with the flat
//!   domain id: `pdfhelper.NNNNN` (text summary and per-dimension axis
//!   info), `pdfoffsets.NNNNN` (i32 end offsets per histogram),
//!   `pdfids.NNNNN` (i32 bin ids), `pdfvalues.NNNNN` (f64 values). Sparse
//!   by construction.
//!
//! Both layouts produce identical in-memory domains. Writers exist so the
//! test suites (and simulation-side tooling) can produce fixture files.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use histvol_core::{Error, Extent, Result};
use histvol_grid::{HistDomain, HistHelper};
use histvol_hist::{HistAxis, Histogram};

/// Per-domain metadata preceding each histogram block
#[derive(Debug, Clone, PartialEq)]
pub struct DomainMeta {
    pub n_dims: usize,
    /// Voxel grid shape of the domain
    pub ngrid: [usize; 3],
    /// Local histogram grid shape of the domain
    pub nhist: [usize; 3],
    /// Per-dimension log-scale base; non-positive means linear
    pub log_bases: Vec<f64>,
}

impl DomainMeta {
    pub fn n_hists(&self) -> usize {
        self.nhist.iter().product()
    }
}

fn log_base_option(base: f64) -> Option<f64> {
    (base > 0.0).then_some(base)
}

/// Axes from per-dimension fields plus the variable names of the family
pub fn build_axes(
    vars: &[String],
    n_bins: &[usize],
    mins: &[f64],
    maxs: &[f64],
    log_bases: &[f64],
) -> Vec<HistAxis> {
    vars.iter()
        .enumerate()
        .map(|(d, var)| {
            let mut axis = HistAxis::new(var.clone(), n_bins[d], mins[d], maxs[d]);
            axis.log_base = log_base_option(log_bases[d]);
            axis
        })
        .collect()
}

/// Read one packed histogram record
///
/// Record layout: `i32 is_sparse; f64 mins[n]; f64 maxs[n]; i32 n_bins[n];
/// f64 percent_in_range; i32 n_nonempty;` then either `n_nonempty`
/// interleaved `(i32 bin_id, i32 value)` pairs (sparse) or one i32 per bin
/// (dense).
pub fn read_histogram<R: Read>(r: &mut R, vars: &[String], log_bases: &[f64]) -> Result<Histogram> {
    let n_dims = vars.len();
    let is_sparse = r.read_i32::<LittleEndian>()?;
    let mut mins = vec![0.0; n_dims];
    let mut maxs = vec![0.0; n_dims];
    for m in mins.iter_mut() {
        *m = r.read_f64::<LittleEndian>()?;
    }
    for m in maxs.iter_mut() {
        *m = r.read_f64::<LittleEndian>()?;
    }
    let mut n_bins = vec![0usize; n_dims];
    for n in n_bins.iter_mut() {
        let v = r.read_i32::<LittleEndian>()?;
        if v <= 0 {
            return Err(Error::Corrupt(format!("histogram record has {v} bins")));
        }
        *n = v as usize;
    }
    let _percent_in_range = r.read_f64::<LittleEndian>()?;
    let n_nonempty = r.read_i32::<LittleEndian>()?;
    if n_nonempty < 0 {
        return Err(Error::Corrupt(format!(
            "histogram record has {n_nonempty} non-empty bins"
        )));
    }
    let n_total = n_bins
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| Error::Corrupt(format!("histogram bin grid {n_bins:?} overflows")))?;
    if n_nonempty as usize > n_total {
        return Err(Error::Corrupt(format!(
            "histogram record claims {n_nonempty} non-empty bins in a grid of {n_total}"
        )));
    }

    // Capacities are capped; an oversized count must fail at EOF, not
    // drive the allocation.
    let axes = build_axes(vars, &n_bins, &mins, &maxs, log_bases);
    if is_sparse != 0 {
        let cap = (n_nonempty as usize).min(4096);
        let mut ids = Vec::with_capacity(cap);
        let mut values = Vec::with_capacity(cap);
        for _ in 0..n_nonempty {
            ids.push(r.read_i32::<LittleEndian>()? as usize);
            values.push(r.read_i32::<LittleEndian>()? as f64);
        }
        Histogram::from_sparse_values(axes, ids, values)
    } else {
        let mut values = Vec::with_capacity(n_total.min(4096));
        for _ in 0..n_total {
            values.push(r.read_i32::<LittleEndian>()? as f64);
        }
        Histogram::from_dense_values(axes, values)
    }
}

/// Write one packed histogram record; see [`read_histogram`] for the layout
pub fn write_histogram<W: Write>(w: &mut W, hist: &Histogram) -> Result<()> {
    let axes = hist.axes();
    if axes.is_empty() {
        return Err(Error::InvalidInput(
            "cannot write a null histogram".to_string(),
        ));
    }
    let is_sparse = matches!(hist, Histogram::Sparse(_));
    w.write_i32::<LittleEndian>(is_sparse as i32)?;
    for ax in axes {
        w.write_f64::<LittleEndian>(ax.min)?;
    }
    for ax in axes {
        w.write_f64::<LittleEndian>(ax.max)?;
    }
    for ax in axes {
        w.write_i32::<LittleEndian>(ax.n_bins as i32)?;
    }
    w.write_f64::<LittleEndian>(1.0)?; // percent in range
    match hist {
        Histogram::Sparse(s) => {
            w.write_i32::<LittleEndian>(s.nnz() as i32)?;
            for &(id, v) in s.bins() {
                w.write_i32::<LittleEndian>(id as i32)?;
                w.write_i32::<LittleEndian>(v.round() as i32)?;
            }
        }
        Histogram::Dense(d) => {
            w.write_i32::<LittleEndian>(hist.n_nonempty_bins() as i32)?;
            for &v in d.values() {
                w.write_i32::<LittleEndian>(v.round() as i32)?;
            }
        }
        Histogram::Null => unreachable!(),
    }
    Ok(())
}

/// Read a domain meta record, or `None` at a clean EOF
///
/// Record layout: `i32 n_dim; i32 ngrid[3]; i32 nhist[3];
/// f64 log_bases[n_dim]`.
pub fn read_domain_meta<R: Read>(r: &mut R) -> Result<Option<DomainMeta>> {
    let n_dims = match r.read_i32::<LittleEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if !(1..=3).contains(&n_dims) {
        return Err(Error::Corrupt(format!(
            "domain meta record claims {n_dims} dimensions"
        )));
    }
    let mut ngrid = [0usize; 3];
    for g in ngrid.iter_mut() {
        *g = read_positive_i32(r, "voxel grid size")?;
    }
    let mut nhist = [0usize; 3];
    for h in nhist.iter_mut() {
        *h = read_positive_i32(r, "histogram grid size")?;
    }
    let mut log_bases = vec![0.0; n_dims as usize];
    for b in log_bases.iter_mut() {
        *b = r.read_f64::<LittleEndian>()?;
    }
    Ok(Some(DomainMeta {
        n_dims: n_dims as usize,
        ngrid,
        nhist,
        log_bases,
    }))
}

/// Write a domain meta record
pub fn write_domain_meta<W: Write>(w: &mut W, meta: &DomainMeta) -> Result<()> {
    w.write_i32::<LittleEndian>(meta.n_dims as i32)?;
    for &g in &meta.ngrid {
        w.write_i32::<LittleEndian>(g as i32)?;
    }
    for &h in &meta.nhist {
        w.write_i32::<LittleEndian>(h as i32)?;
    }
    for &b in &meta.log_bases {
        w.write_f64::<LittleEndian>(b)?;
    }
    Ok(())
}

fn read_positive_i32<R: Read>(r: &mut R, what: &str) -> Result<usize> {
    let v = r.read_i32::<LittleEndian>()?;
    if v <= 0 {
        return Err(Error::Corrupt(format!("{what} must be positive, got {v}")));
    }
    Ok(v as usize)
}

/// Read every domain block of a Y-column packed file
pub fn read_ycolumn_file(path: &Path, vars: &[String]) -> Result<Vec<HistDomain>> {
    let bytes = fs::read(path)?;
    let mut r = io::Cursor::new(bytes);
    let mut domains = Vec::new();
    while let Some(meta) = read_domain_meta(&mut r)? {
        if meta.n_dims != vars.len() {
            return Err(Error::inconsistent(format!(
                "file {} stores {}D histograms, family has {} variables",
                path.display(),
                meta.n_dims,
                vars.len()
            )));
        }
        let mut hists = Vec::with_capacity(meta.n_hists());
        for _ in 0..meta.n_hists() {
            hists.push(read_histogram(&mut r, vars, &meta.log_bases)?);
        }
        let extent = Extent::new(meta.nhist.to_vec());
        domains.push(HistDomain::from_hists(extent, hists, meta.ngrid)?);
    }
    if domains.is_empty() {
        return Err(Error::Corrupt(format!(
            "ycolumn file {} holds no domain blocks",
            path.display()
        )));
    }
    Ok(domains)
}

/// Write a Y-column packed file from (meta, histograms) blocks
pub fn write_ycolumn_file(path: &Path, blocks: &[(DomainMeta, Vec<Histogram>)]) -> Result<()> {
    let mut w = io::BufWriter::new(fs::File::create(path)?);
    for (meta, hists) in blocks {
        if hists.len() != meta.n_hists() {
            return Err(Error::size_mismatch(
                meta.n_hists(),
                hists.len(),
                "ycolumn block histograms",
            ));
        }
        write_domain_meta(&mut w, meta)?;
        for h in hists {
            write_histogram(&mut w, h)?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Text sidecar of the many-files layout
#[derive(Debug, Clone, PartialEq)]
pub struct HelperText {
    pub n_hists: usize,
    pub n_nonempty_bins: usize,
    pub voxels: [usize; 3],
    pub hist_grid: [usize; 3],
    pub n_bins: Vec<usize>,
    pub mins: Vec<f64>,
    pub maxs: Vec<f64>,
    pub log_bases: Vec<f64>,
}

impl HelperText {
    /// Parse the whitespace-separated token stream of a `pdfhelper` file
    ///
    /// Token order: `n_hists n_nonempty vx vy vz nhx nhy nhz n_dims`
    /// followed by `n_bins`, `mins`, `maxs`, `log_bases` blocks.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let mut next = |what: &str| -> Result<f64> {
            tokens
                .next()
                .ok_or_else(|| Error::Corrupt(format!("pdfhelper file truncated at {what}")))?
                .parse::<f64>()
                .map_err(|e| Error::Corrupt(format!("pdfhelper {what}: {e}")))
        };
        let n_hists = next("n_hists")? as usize;
        let n_nonempty_bins = next("n_nonempty_bins")? as usize;
        let voxels = [next("vx")? as usize, next("vy")? as usize, next("vz")? as usize];
        let hist_grid = [next("nhx")? as usize, next("nhy")? as usize, next("nhz")? as usize];
        let n_dims = next("n_dims")? as usize;
        if !(1..=3).contains(&n_dims) {
            return Err(Error::Corrupt(format!(
                "pdfhelper claims {n_dims} histogram dimensions"
            )));
        }
        let mut n_bins = Vec::with_capacity(n_dims);
        for _ in 0..n_dims {
            n_bins.push(next("n_bins")? as usize);
        }
        let mut mins = Vec::with_capacity(n_dims);
        for _ in 0..n_dims {
            mins.push(next("mins")?);
        }
        let mut maxs = Vec::with_capacity(n_dims);
        for _ in 0..n_dims {
            maxs.push(next("maxs")?);
        }
        let mut log_bases = Vec::with_capacity(n_dims);
        for _ in 0..n_dims {
            log_bases.push(next("log_bases")?);
        }
        Ok(Self {
            n_hists,
            n_nonempty_bins,
            voxels,
            hist_grid,
            n_bins,
            mins,
            maxs,
            log_bases,
        })
    }

    fn render(&self) -> String {
        let join = |v: &[f64]| {
            v.iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!(
            "{} {}\n{} {} {}\n{} {} {}\n{}\n{}\n{}\n{}\n{}\n",
            self.n_hists,
            self.n_nonempty_bins,
            self.voxels[0],
            self.voxels[1],
            self.voxels[2],
            self.hist_grid[0],
            self.hist_grid[1],
            self.hist_grid[2],
            self.n_bins.len(),
            self.n_bins
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            join(&self.mins),
            join(&self.maxs),
            join(&self.log_bases),
        )
    }
}

fn file_suffix(id: usize) -> String {
    format!("{id:05}")
}

/// Path of the Y-column file for a family and flat column index
pub fn ycolumn_path(step_dir: &Path, name: &str, column: usize) -> std::path::PathBuf {
    step_dir.join(format!("pdfs-ycolumn-{name}.{}", file_suffix(column)))
}

/// Read one domain of the many-files layout
pub fn read_sparse_domain(dir: &Path, domain_id: usize, vars: &[String]) -> Result<HistDomain> {
    let suffix = file_suffix(domain_id);
    let text = fs::read_to_string(dir.join(format!("pdfhelper.{suffix}")))?;
    let helper = HelperText::parse(&text)?;
    if helper.n_bins.len() != vars.len() {
        return Err(Error::inconsistent(format!(
            "domain {domain_id} stores {}D histograms, family has {} variables",
            helper.n_bins.len(),
            vars.len()
        )));
    }

    let offsets = read_i32_values(&dir.join(format!("pdfoffsets.{suffix}")))?;
    let ids = read_i32_values(&dir.join(format!("pdfids.{suffix}")))?;
    let values = read_f64_values(&dir.join(format!("pdfvalues.{suffix}")))?;
    if offsets.len() != helper.n_hists {
        return Err(Error::Corrupt(format!(
            "domain {domain_id} has {} offsets for {} histograms",
            offsets.len(),
            helper.n_hists
        )));
    }
    if ids.len() != values.len() {
        return Err(Error::size_mismatch(ids.len(), values.len(), "sparse values"));
    }

    let axes = build_axes(vars, &helper.n_bins, &helper.mins, &helper.maxs, &helper.log_bases);
    let mut hists = Vec::with_capacity(helper.n_hists);
    let mut start = 0usize;
    for &end in &offsets {
        if end < start || end > ids.len() {
            return Err(Error::Corrupt(format!(
                "domain {domain_id} offset {end} out of order"
            )));
        }
        hists.push(Histogram::from_sparse_values(
            axes.clone(),
            ids[start..end].to_vec(),
            values[start..end].to_vec(),
        )?);
        start = end;
    }

    let extent = Extent::new(helper.hist_grid.to_vec());
    let grid_helper = HistHelper {
        n_hists: helper.n_hists,
        n_nonempty_bins: helper.n_nonempty_bins,
        voxels: helper.voxels,
        hist_grid: helper.hist_grid,
    };
    HistDomain::new(extent, hists, grid_helper)
}

/// Write one domain in the many-files layout; inverse of [`read_sparse_domain`]
pub fn write_sparse_domain(dir: &Path, domain_id: usize, domain: &HistDomain) -> Result<()> {
    let suffix = file_suffix(domain_id);
    let first = domain.hist(0);
    let axes = first.axes();
    if axes.is_empty() {
        return Err(Error::InvalidInput(
            "cannot write a domain of null histograms".to_string(),
        ));
    }

    let helper = domain.helper();
    let text = HelperText {
        n_hists: helper.n_hists,
        n_nonempty_bins: helper.n_nonempty_bins,
        voxels: helper.voxels,
        hist_grid: helper.hist_grid,
        n_bins: axes.iter().map(|a| a.n_bins).collect(),
        mins: axes.iter().map(|a| a.min).collect(),
        maxs: axes.iter().map(|a| a.max).collect(),
        log_bases: axes.iter().map(|a| a.log_base.unwrap_or(0.0)).collect(),
    };
    fs::write(dir.join(format!("pdfhelper.{suffix}")), text.render())?;

    let mut offsets = io::BufWriter::new(fs::File::create(dir.join(format!("pdfoffsets.{suffix}")))?);
    let mut ids = io::BufWriter::new(fs::File::create(dir.join(format!("pdfids.{suffix}")))?);
    let mut values = io::BufWriter::new(fs::File::create(dir.join(format!("pdfvalues.{suffix}")))?);
    let mut end = 0usize;
    for flat in 0..domain.n_hists() {
        let sparse = domain.hist(flat).to_sparse();
        if let Histogram::Sparse(s) = &sparse {
            end += s.nnz();
            for &(id, v) in s.bins() {
                ids.write_i32::<LittleEndian>(id as i32)?;
                values.write_f64::<LittleEndian>(v)?;
            }
        }
        offsets.write_i32::<LittleEndian>(end as i32)?;
    }
    offsets.flush()?;
    ids.flush()?;
    values.flush()?;
    Ok(())
}

fn read_i32_values(path: &Path) -> Result<Vec<usize>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(Error::Corrupt(format!(
            "{} is not a whole number of i32 records",
            path.display()
        )));
    }
    let mut r = io::Cursor::new(bytes);
    let mut out = Vec::with_capacity(r.get_ref().len() / 4);
    for _ in 0..r.get_ref().len() / 4 {
        let v = r.read_i32::<LittleEndian>()?;
        if v < 0 {
            return Err(Error::Corrupt(format!(
                "{} holds a negative index {v}",
                path.display()
            )));
        }
        out.push(v as usize);
    }
    Ok(out)
}

fn read_f64_values(path: &Path) -> Result<Vec<f64>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 8 != 0 {
        return Err(Error::Corrupt(format!(
            "{} is not a whole number of f64 records",
            path.display()
        )));
    }
    let mut r = io::Cursor::new(bytes);
    let mut out = Vec::with_capacity(r.get_ref().len() / 8);
    for _ in 0..r.get_ref().len() / 8 {
        out.push(r.read_f64::<LittleEndian>()?);
    }
    Ok(out)
}
