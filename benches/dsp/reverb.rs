//! Benchmarks for the stereo reverb.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use underbeats_dsp::dsp::reverb::{ReverbSettings, StereoReverb};
use underbeats_dsp::graph::{ProcessSpec, ProcessingNode, ReverbNode, StereoBlock};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_reverb(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/reverb");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        let mut reverb = StereoReverb::new(SAMPLE_RATE).unwrap();
        reverb.apply(ReverbSettings::default());
        group.bench_with_input(BenchmarkId::new("network", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for &x in &input {
                    let (l, r) = reverb.process(black_box(x), black_box(x));
                    sum += l + r;
                }
                sum
            })
        });

        // Node while the room size ramps: coefficient updates every block
        let mut node = ReverbNode::new();
        node.prepare(&ProcessSpec::new(SAMPLE_RATE, size)).unwrap();
        let room = node.room_size();
        let mut toggle = false;
        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_with_input(BenchmarkId::new("node_ramping", size), &size, |b, _| {
            b.iter(|| {
                toggle = !toggle;
                room.set_target(if toggle { 0.2 } else { 0.9 });
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                node.process(&mut StereoBlock::new(black_box(&mut left), &mut right), &[]);
            })
        });
    }

    group.finish();
}
