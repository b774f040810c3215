//! Benchmarks for sequencer event generation alone.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use underbeats_dsp::io::EventBuffer;
use underbeats_dsp::sequencing::{ParamId, Pattern, Sequencer};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_sequencer(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/sequencer");

    // dense: a chord on every 32nd note plus four automation lanes
    let mut pattern = Pattern::new();
    for step in 0..128 {
        let beat = step as f64 * 0.125;
        for pitch in [48, 55, 60, 64] {
            pattern = pattern.note(pitch + (step % 5) as u8, 100, beat, 0.1);
        }
    }
    for lane in 0..4 {
        pattern = pattern
            .automation(ParamId(lane), 0.0, 0.0)
            .automation(ParamId(lane), 16.0, 1.0);
    }
    let pattern = Arc::new(pattern);

    for &size in BLOCK_SIZES {
        let mut seq = Sequencer::new();
        seq.prepare(SAMPLE_RATE, size).unwrap();
        seq.set_timeline(Some(pattern.clone()));
        seq.set_loop_region(0.0, 16.0).unwrap();
        seq.set_looping(true);
        seq.play();

        let mut out = EventBuffer::with_capacity(512);
        group.bench_with_input(BenchmarkId::new("dense_loop", size), &size, |b, _| {
            b.iter(|| {
                seq.process_midi(&[], black_box(&mut out), size);
            })
        });
    }

    group.finish();
}
