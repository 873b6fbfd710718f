//! Property tests for the analyzer's histogram and sampling.

use proptest::prelude::*;
use xdset_core::parser::parse_puzzle;
use xdset_core::{FileKey, Puzzle};
use xdset_runner::{Analyzer, Histogram, SampleMode};

fn puzzle(i: usize) -> Puzzle {
    let mut p = parse_puzzle("AB\nCD\n\nA1. x ~ AB\nA3. y ~ CD\n").unwrap();
    p.key = FileKey::new(format!("p{i}.xd"));
    p.source = "xd".into();
    p
}

fn sample_mode() -> impl Strategy<Value = SampleMode> {
    prop_oneof![
        (0usize..12).prop_map(|n| SampleMode::First { n }),
        (0usize..12).prop_map(|n| SampleMode::EvenlySpaced { n }),
        (0usize..12, any::<u64>()).prop_map(|(n, seed)| SampleMode::Random { n, seed }),
    ]
}

proptest! {
    #[test]
    fn histogram_median_is_middle_of_sorted_values(values in prop::collection::vec(0usize..30, 1..200)) {
        let mut h = Histogram::default();
        for &v in &values {
            h.add(v);
        }
        let mut sorted = values.clone();
        sorted.sort_unstable();
        prop_assert_eq!(h.median(), Some(sorted[sorted.len() / 2]));
        prop_assert_eq!(h.min(), sorted.first().copied());
        prop_assert_eq!(h.max(), sorted.last().copied());
        prop_assert_eq!(h.total(), values.len() as u64);
    }

    #[test]
    fn samples_are_bounded_ordered_and_unique(mode in sample_mode(), records in 0usize..300) {
        let mut analyzer = Analyzer::new(Some(mode));
        for i in 0..records {
            analyzer.add(&puzzle(i));
        }
        let samples = analyzer.finish().samples;

        prop_assert_eq!(samples.len(), mode.size().min(records));
        prop_assert!(samples.windows(2).all(|w| w[0].position < w[1].position));
        prop_assert!(samples.iter().all(|s| s.position < records));
        for s in &samples {
            let expected = format!("p{}.xd", s.position);
            prop_assert_eq!(s.record.key.as_str(), expected.as_str());
        }
    }

    #[test]
    fn random_sampling_is_reproducible(n in 1usize..10, seed in any::<u64>(), records in 0usize..200) {
        let run = || {
            let mut analyzer = Analyzer::new(Some(SampleMode::Random { n, seed }));
            for i in 0..records {
                analyzer.add(&puzzle(i));
            }
            analyzer
                .finish()
                .samples
                .into_iter()
                .map(|s| s.position)
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(run(), run());
    }
}
