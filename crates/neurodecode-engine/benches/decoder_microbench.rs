// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decoder Microbenchmarks
//!
//! Purpose:
//! - Track the cost of the posterior computation as cells and bins grow.
//! - Compare sequential and parallel fold execution in the orchestrator.
//!
//! Notes:
//! - Inputs are deterministic synthetic place cells; no I/O.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array2;
use neurodecode_config::NeurodecodeConfig;
use neurodecode_engine::{
    BayesianDecoder, BehaviorSeries, DecoderSettings, DecodingOrchestrator, DecodingSession,
    RateMaps,
};

/// Gaussian place fields evenly tiling a `[0, 1)` track
fn place_field_maps(cells: usize, bins: usize) -> RateMaps {
    let rates = Array2::from_shape_fn((cells, bins), |(cell, bin)| {
        let center = (cell as f64 + 0.5) / cells as f64;
        let x = (bin as f64 + 0.5) / bins as f64;
        let d = (x - center) / 0.08;
        0.5 + 15.0 * (-0.5 * d * d).exp()
    });
    RateMaps::from_rates(rates).unwrap_or_else(|_| RateMaps::empty(bins))
}

/// Counts drawn deterministically from the maps along a back-and-forth run
fn synthetic_counts(maps: &RateMaps, samples: usize, window: f64) -> (Array2<f64>, Vec<f64>) {
    let bins = maps.bin_count();
    let positions: Vec<f64> = (0..samples)
        .map(|t| {
            let phase = (t % 200) as f64 / 200.0;
            if phase < 0.5 { 2.0 * phase } else { 2.0 - 2.0 * phase }.min(0.999)
        })
        .collect();
    let counts = Array2::from_shape_fn((samples, maps.cell_count()), |(t, cell)| {
        let bin = ((positions[t] * bins as f64) as usize).min(bins - 1);
        (maps.rates()[[cell, bin]] * window).round()
    });
    (counts, positions)
}

fn bench_posterior(c: &mut Criterion) {
    let mut group = c.benchmark_group("posterior");
    group.sample_size(20);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let decoder = BayesianDecoder::new(DecoderSettings::new(0.25));
    for &(cells, bins) in &[(20usize, 50usize), (100, 100), (200, 400)] {
        let maps = place_field_maps(cells, bins);
        let (counts, _) = synthetic_counts(&maps, 2_000, 0.25);
        group.throughput(Throughput::Elements((2_000 * bins) as u64));
        group.bench_with_input(
            BenchmarkId::new("cells_x_bins", format!("{}x{}", cells, bins)),
            &cells,
            |b, _| {
                b.iter(|| {
                    let _ = decoder.posterior(black_box(&maps), black_box(counts.view()));
                });
            },
        );
    }

    group.finish();
}

fn bench_cross_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_validation");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(3));

    let maps = place_field_maps(60, 100);
    let (counts, positions) = synthetic_counts(&maps, 5_000, 0.25);
    let variables = Array2::from_shape_vec((positions.len(), 1), positions)
        .unwrap_or_else(|_| Array2::zeros((0, 1)));
    let behavior = BehaviorSeries::from_variables(variables);

    for parallel in [false, true] {
        let mut config = NeurodecodeConfig::default();
        config.decoding.bin_edges = vec![(0..=50).map(|i| i as f64 / 50.0).collect()];
        config.decoding.folds = 10;
        config.decoding.parallel_folds = parallel;
        config.selection.min_spikes = 1.0;
        let Ok(orchestrator) = DecodingOrchestrator::new(config) else {
            continue;
        };

        group.bench_function(
            BenchmarkId::new("folds_10", if parallel { "parallel" } else { "sequential" }),
            |b| {
                b.iter(|| {
                    let session = DecodingSession {
                        behavior: &behavior,
                        spike_counts: counts.view(),
                        training_range: 0..4_000,
                    };
                    let _ = orchestrator.run(black_box(&session));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_posterior, bench_cross_validation);
criterion_main!(benches);
