//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold across all valid inputs,
//! catching edge cases that might be missed by example-based tests.

use eventalign_collapse::{
    aggregate::{collapse_run, Layout},
    reader::Run,
    schema::Schema,
    stats::{mad, mean, median, std_dev, StatField},
};
use proptest::prelude::*;

const HEADER: &str = "contig\tread_name\tposition\treference_kmer\tmodel_kmer\tevent_length";

/// Strategy for a run's events as (position step, dwell) pairs. A step of
/// zero repeats the previous position.
fn events() -> impl Strategy<Value = Vec<(i64, u32)>> {
    proptest::collection::vec((0i64..4, 1u32..1000), 1..60)
}

fn build_run(start: i64, events: &[(i64, u32)]) -> (Run, Vec<i64>) {
    let mut pos = start;
    let mut positions = Vec::with_capacity(events.len());
    let lines = events
        .iter()
        .enumerate()
        .map(|(i, (step, dwell))| {
            if i > 0 {
                pos += step;
            }
            positions.push(pos);
            format!("chr1\tR1\t{pos}\tACGTA\tACGTA\t{}", f64::from(*dwell) / 1000.0)
        })
        .collect();
    let run = Run {
        read_id: "R1".to_string(),
        ref_id: "chr1".to_string(),
        first_line: 2,
        lines,
    };
    (run, positions)
}

fn samples() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(-1000.0f64..1000.0, 1..50)
}

proptest! {
    /// Every event lands in exactly one kmer row.
    #[test]
    fn num_events_sum_to_row_count(start in -100i64..100, events in events()) {
        let schema = Schema::from_header(HEADER).unwrap();
        let layout = Layout::new(&schema, &StatField::DEFAULT, false);
        let (run, _) = build_run(start, &events);
        let (read, block) = collapse_run(&run, &schema, &layout).unwrap();

        let rows: Vec<&str> = block.lines().skip(2).collect();
        prop_assert_eq!(rows.len() as u64, read.kmers);
        let total: u64 = rows
            .iter()
            .map(|row| row.split('\t').nth(2).unwrap().parse::<u64>().unwrap())
            .sum();
        prop_assert_eq!(total, events.len() as u64);
    }

    /// Read dwell time is the sum of every event length.
    #[test]
    fn dwell_time_is_conserved(start in -100i64..100, events in events()) {
        let schema = Schema::from_header(HEADER).unwrap();
        let layout = Layout::new(&schema, &[], false);
        let (run, _) = build_run(start, &events);
        let (read, _) = collapse_run(&run, &schema, &layout).unwrap();

        let expected: f64 = events.iter().map(|(_, d)| f64::from(*d) / 1000.0).sum();
        prop_assert!((read.dwell_time - expected).abs() < 1e-6);
    }

    /// For ascending positions, kmers plus missing kmers span the whole range.
    #[test]
    fn missing_kmers_fill_the_span(start in -100i64..100, events in events()) {
        let schema = Schema::from_header(HEADER).unwrap();
        let layout = Layout::new(&schema, &[], false);
        let (run, positions) = build_run(start, &events);
        let (read, _) = collapse_run(&run, &schema, &layout).unwrap();

        let first = positions[0];
        let last = *positions.last().unwrap();
        prop_assert_eq!(read.ref_start, first);
        prop_assert_eq!(read.ref_end, last + 1);
        prop_assert_eq!(read.kmers + read.missing_kmers, (last - first + 1) as u64);
    }

    /// Median and mean lie within the sample range.
    #[test]
    fn central_statistics_are_bounded(values in samples()) {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let m = median(&values);
        let avg = mean(&values);
        prop_assert!(min <= m && m <= max);
        prop_assert!(min - 1e-9 <= avg && avg <= max + 1e-9);
    }

    /// Spread statistics are non-negative and zero for constant samples.
    #[test]
    fn spread_statistics_are_non_negative(values in samples(), constant in -10.0f64..10.0) {
        prop_assert!(std_dev(&values) >= 0.0);
        prop_assert!(mad(&values) >= 0.0);

        let flat = vec![constant; values.len()];
        prop_assert!(std_dev(&flat).abs() < 1e-9);
        prop_assert!(mad(&flat).abs() < 1e-12);
    }

    /// Statistics do not depend on sample order.
    #[test]
    fn statistics_are_order_independent(values in samples()) {
        let mut reversed = values.clone();
        reversed.reverse();
        prop_assert_eq!(median(&values), median(&reversed));
        prop_assert_eq!(mad(&values), mad(&reversed));
        prop_assert!((mean(&values) - mean(&reversed)).abs() < 1e-9);
    }
}
