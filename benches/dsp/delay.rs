//! Benchmarks for delay line operations.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use underbeats_dsp::dsp::delay::DelayLine;
use underbeats_dsp::graph::{DelayNode, ProcessSpec, ProcessingNode, StereoBlock};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    let delay_times_ms: &[f32] = &[10.0, 100.0, 1_000.0];

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        // Fractional read/write on a bare line
        let mut line = DelayLine::new();
        line.allocate(SAMPLE_RATE as usize * 2).unwrap();
        group.bench_with_input(BenchmarkId::new("line_interpolated", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for (i, &x) in input.iter().enumerate() {
                    // modulated delay time
                    let delay = 480.0 + (i as f64 * 0.1).sin() * 48.0;
                    let y = line.read(black_box(delay));
                    line.write(x + y * 0.5);
                    sum += y;
                }
                sum
            })
        });

        for &ms in delay_times_ms {
            let mut node = DelayNode::with_settings(ms, 0.5, 0.3);
            node.prepare(&ProcessSpec::new(SAMPLE_RATE, size)).unwrap();
            let mut left = input.clone();
            let mut right = input.clone();
            group.bench_with_input(
                BenchmarkId::new(format!("node_{}ms", ms as u32), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        left.copy_from_slice(&input);
                        right.copy_from_slice(&input);
                        node.process(&mut StereoBlock::new(black_box(&mut left), &mut right), &[]);
                    })
                },
            );
        }
    }

    group.finish();
}
