//! Benchmarks for ADSR envelope generation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use underbeats_dsp::dsp::envelope::Envelope;
use underbeats_dsp::graph::{EnvelopeNode, ProcessSpec, ProcessingNode, StereoBlock};
use underbeats_dsp::io::TimedEvent;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Sustain stage: the cheapest steady state
        let mut env = Envelope::adsr(SAMPLE_RATE, 1.0, 1.0, 0.7, 200.0);
        env.note_on();
        for _ in 0..1_000 {
            env.next_sample();
        }
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| env.render(black_box(&mut buffer)))
        });

        // Retriggered every block so attack and decay keep running
        let mut env = Envelope::adsr(SAMPLE_RATE, 5.0, 50.0, 0.5, 100.0);
        group.bench_with_input(BenchmarkId::new("retrigger", size), &size, |b, _| {
            b.iter(|| {
                env.note_on();
                env.render(black_box(&mut buffer));
                env.note_off();
            })
        });

        // Node with note events at the block edges
        let mut node = EnvelopeNode::adsr(5.0, 50.0, 0.5, 100.0);
        node.prepare(&ProcessSpec::new(SAMPLE_RATE, size)).unwrap();
        let events = [
            TimedEvent::note_on(0, 60, 100),
            TimedEvent::note_off(size - 1, 60),
        ];
        let mut left = vec![1.0f32; size];
        let mut right = vec![1.0f32; size];
        group.bench_with_input(BenchmarkId::new("node_events", size), &size, |b, _| {
            b.iter(|| {
                left.fill(1.0);
                right.fill(1.0);
                node.process(&mut StereoBlock::new(&mut left, &mut right), black_box(&events));
            })
        });
    }

    group.finish();
}
