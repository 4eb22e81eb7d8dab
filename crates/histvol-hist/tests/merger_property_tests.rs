//! Property tests for the histogram merger

use approx::assert_relative_eq;
use histvol_hist::{HistAxis, HistMerger, Histogram};
use proptest::prelude::*;

fn arb_hist_1d() -> impl Strategy<Value = Histogram> {
    (
        1usize..6,
        0.0f64..0.5,
        0.6f64..2.0,
        prop::collection::vec(0.0f64..10.0, 6),
    )
        .prop_map(|(n_bins, min, max, raw)| {
            let values = raw.into_iter().take(n_bins).collect();
            Histogram::from_dense_values(vec![HistAxis::new("x", n_bins, min, max)], values)
                .unwrap()
        })
}

proptest! {
    /// Merged output mass equals the sum of all input masses
    #[test]
    fn merge_conserves_mass(
        hists in prop::collection::vec(arb_hist_1d(), 1..5),
        n_out in 1usize..12,
    ) {
        let inputs: Vec<&Histogram> = hists.iter().collect();
        let expected: f64 = hists.iter().map(|h| h.total_mass()).sum();
        let merged = HistMerger::fixed(vec![n_out]).merge(&inputs).unwrap();
        prop_assert!((merged.total_mass() - expected).abs() < 1e-6 * (1.0 + expected));
    }

    /// Merging sparse copies gives the same result as merging dense ones
    #[test]
    fn merge_is_storage_agnostic(hists in prop::collection::vec(arb_hist_1d(), 1..4)) {
        let dense: Vec<&Histogram> = hists.iter().collect();
        let sparse_hists: Vec<Histogram> = hists.iter().map(|h| h.to_sparse()).collect();
        let sparse: Vec<&Histogram> = sparse_hists.iter().collect();

        let merger = HistMerger::fixed(vec![8]);
        let a = merger.merge(&dense).unwrap();
        let b = merger.merge(&sparse).unwrap();
        for i in 0..8 {
            // Sparse conversion drops values below 1e-4, so compare loosely
            prop_assert!((a.bin_freq(i) - b.bin_freq(i)).abs() < 1e-3);
        }
    }
}

#[test]
fn merge_union_range_covers_all_inputs() {
    let a = Histogram::from_dense_values(vec![HistAxis::new("x", 2, -1.0, 0.5)], vec![1.0, 2.0])
        .unwrap();
    let b = Histogram::from_dense_values(vec![HistAxis::new("x", 2, 0.0, 2.0)], vec![3.0, 4.0])
        .unwrap();
    let merged = HistMerger::fixed(vec![6]).merge(&[&a, &b]).unwrap();
    assert_relative_eq!(merged.axes()[0].min, -1.0);
    assert_relative_eq!(merged.axes()[0].max, 2.0);
    assert_relative_eq!(merged.total_mass(), 10.0, epsilon = 1e-9);
}
