//! Benchmarks for waveform generation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use underbeats_dsp::dsp::oscillator::{Oscillator, Waveform};
use underbeats_dsp::graph::{OscillatorNode, ProcessSpec, ProcessingNode, StereoBlock};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");

    let waveforms = [
        ("sine", Waveform::Sine),
        ("triangle", Waveform::Triangle),
        ("sawtooth", Waveform::Sawtooth),
        ("square", Waveform::Square),
        ("noise", Waveform::Noise),
    ];

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Raw generator, no parameter smoothing
        for (name, waveform) in waveforms {
            let mut osc = Oscillator::new();
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    for sample in buffer.iter_mut() {
                        *sample = osc.next_sample(black_box(waveform), 440.0, 0.5, SAMPLE_RATE);
                    }
                })
            });
        }

        // Node: four smoothed parameters read per sample, stereo write
        let mut node = OscillatorNode::sawtooth();
        node.prepare(&ProcessSpec::new(SAMPLE_RATE, size)).unwrap();
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        let frequency = node.frequency();
        let mut toggle = false;
        group.bench_with_input(BenchmarkId::new("node_gliding", size), &size, |b, _| {
            b.iter(|| {
                // keep the frequency ramp busy
                toggle = !toggle;
                frequency.set_target(if toggle { 220.0 } else { 880.0 });
                node.process(&mut StereoBlock::new(black_box(&mut left), &mut right), &[]);
            })
        });
    }

    group.finish();
}
