//! Benchmarks for the default chain driven by a sequencer.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use underbeats_dsp::graph::filter;
use underbeats_dsp::sequencing::{ParamId, Pattern};
use underbeats_dsp::{EffectSlot, EngineContext};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn busy_pattern() -> Pattern {
    // sixteenth notes with a cutoff sweep
    let steps: Vec<Option<u8>> = (0..16).map(|i| Some(48 + (i * 7 % 24) as u8)).collect();
    Pattern::from_steps(&steps, 0.25, 0.8, 100)
        .automation(ParamId(1), 0.0, 300.0)
        .automation(ParamId(1), 4.0, 6_000.0)
}

pub fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/chain");

    for &size in BLOCK_SIZES {
        for (name, slot) in [
            ("dry", EffectSlot::None),
            ("delay", EffectSlot::Delay),
            ("reverb", EffectSlot::Reverb),
        ] {
            let mut ctx = EngineContext::default();
            let chain = ctx.build_default_chain().unwrap();
            ctx.select_effect(slot).unwrap();
            ctx.prepare(SAMPLE_RATE, size).unwrap();

            let cutoff = ctx.graph().param(chain.filter, filter::FREQUENCY).unwrap();
            ctx.bind_automation(ParamId(1), cutoff);

            let seq = ctx.sequencer_mut();
            seq.set_timeline(Some(Arc::new(busy_pattern())));
            seq.set_loop_region(0.0, 4.0).unwrap();
            seq.set_looping(true);
            seq.play();
            ctx.graph().start().unwrap();

            let mut left = vec![0.0f32; size];
            let mut right = vec![0.0f32; size];
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    left.fill(0.0);
                    right.fill(0.0);
                    ctx.process_block(black_box(&mut left), black_box(&mut right));
                })
            });
        }
    }

    group.finish();
}
