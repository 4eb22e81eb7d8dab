//! Full-pipeline test: write a dataset to disk, open it through the pool,
//! select cells with query rules, and merge the selection into one
//! overview histogram.

use std::path::Path;
use std::sync::Once;

use approx::assert_relative_eq;
use histvol::data::format::{write_ycolumn_file, ycolumn_path, DomainMeta};
use histvol::{DataPool, HistAxis, HistMerger, Histogram, Interval, QueryRule};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

const CONFIG: &str = "\
domains 2 1 1
voxels 16 8 8
timesteps 100 3 10
hist temperature temperature
";

/// One family over a 2x1x1 decomposition, 2 histograms per domain.
/// Histograms in domain 0 are cold (mass in the low bins), domain 1 hot.
fn write_dataset(dir: &Path) {
    std::fs::write(dir.join("pdf.config"), CONFIG).unwrap();
    let meta = DomainMeta {
        n_dims: 1,
        ngrid: [8, 8, 8],
        nhist: [2, 1, 1],
        log_bases: vec![0.0],
    };
    let hist = |values: Vec<f64>| {
        Histogram::from_dense_values(
            vec![HistAxis::new("temperature", 4, 300.0, 1900.0)],
            values,
        )
        .unwrap()
    };
    for step in 0..3usize {
        let step_dir = dir.join(format!("{:06}", 100 + step * 10));
        std::fs::create_dir_all(&step_dir).unwrap();
        let cold = (meta.clone(), vec![hist(vec![6.0, 2.0, 0.0, 0.0]); 2]);
        let hot = (meta.clone(), vec![hist(vec![0.0, 0.0, 3.0, 5.0]); 2]);
        write_ycolumn_file(&ycolumn_path(&step_dir, "temperature", 0), &[cold]).unwrap();
        write_ycolumn_file(&ycolumn_path(&step_dir, "temperature", 1), &[hot]).unwrap();
    }
}

#[test]
fn test_select_and_merge_pipeline() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());

    let mut pool = DataPool::open(dir.path()).unwrap();
    assert_eq!(pool.n_steps(), 3);

    // Keep only cells with at least 90% of their mass in the upper half
    pool.set_rules(vec![QueryRule::new(
        "temperature",
        vec![Interval::new(0.5, 1.0).unwrap()],
        0.9,
    )])
    .unwrap();

    let volume = pool.volume(1, "temperature").unwrap();
    assert_eq!(volume.n_hists(), 4);
    assert_eq!(volume.helper().voxels, [16, 8, 8]);

    let step = pool.step(1).unwrap();
    let selected: Vec<&Histogram> = (0..volume.n_hists())
        .filter(|&i| step.is_selected(i))
        .map(|i| volume.hist(i))
        .collect();
    // The two hot histograms (domain 1) pass, the two cold ones do not
    assert_eq!(selected.len(), 2);

    let overview = HistMerger::fixed(vec![4]).merge(&selected).unwrap();
    assert_relative_eq!(overview.total_mass(), 16.0, epsilon = 1e-9);
    assert_relative_eq!(overview.bin_freq(3), 10.0, epsilon = 1e-9);
}
