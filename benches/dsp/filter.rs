//! Benchmarks for biquad filtering and coefficient design.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use underbeats_dsp::dsp::filter::{Biquad, BiquadCoefficients, FilterType};
use underbeats_dsp::graph::{FilterNode, ProcessSpec, ProcessingNode, StereoBlock};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    // Coefficient design happens at most once per block
    group.bench_function("design_peak", |b| {
        b.iter(|| {
            BiquadCoefficients::design(
                FilterType::Peak,
                black_box(1_000.0),
                black_box(2.0),
                black_box(6.0),
                SAMPLE_RATE,
            )
        })
    });

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut buffer = input.clone();

        let coeffs = BiquadCoefficients::design(FilterType::LowPass, 1_000.0, 0.707, 0.0, SAMPLE_RATE);
        let mut biquad = Biquad::new();
        group.bench_with_input(BenchmarkId::new("biquad_lowpass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                biquad.render(&coeffs, black_box(&mut buffer));
            })
        });

        // Static cutoff: the node skips redesign
        let mut node = FilterNode::lowpass(1_000.0);
        node.prepare(&ProcessSpec::new(SAMPLE_RATE, size)).unwrap();
        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_with_input(BenchmarkId::new("node_static", size), &size, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                node.process(&mut StereoBlock::new(black_box(&mut left), &mut right), &[]);
            })
        });

        // Sweeping cutoff: redesign every block
        let mut node = FilterNode::lowpass(1_000.0);
        node.prepare(&ProcessSpec::new(SAMPLE_RATE, size)).unwrap();
        let cutoff = node.frequency();
        let mut toggle = false;
        group.bench_with_input(BenchmarkId::new("node_sweeping", size), &size, |b, _| {
            b.iter(|| {
                toggle = !toggle;
                cutoff.set_target(if toggle { 300.0 } else { 5_000.0 });
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                node.process(&mut StereoBlock::new(black_box(&mut left), &mut right), &[]);
            })
        });
    }

    group.finish();
}
