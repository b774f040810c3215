use std::sync::Arc;

use underbeats_dsp::graph::{delay, filter, reverb, Graph, ProcessingNode};
use underbeats_dsp::graph::{DelayNode, EnvelopeNode, FilterNode, OscillatorNode};
use underbeats_dsp::sequencing::{ParamId, Pattern};
use underbeats_dsp::{EffectSlot, EngineContext, GraphError};

const SR: f32 = 48_000.0;
const BLOCK: usize = 256;

fn render(ctx: &mut EngineContext, blocks: usize) -> (Vec<f32>, Vec<f32>) {
    let mut all_left = Vec::new();
    let mut all_right = Vec::new();
    let mut left = vec![0.0; BLOCK];
    let mut right = vec![0.0; BLOCK];
    for _ in 0..blocks {
        left.fill(0.0);
        right.fill(0.0);
        ctx.process_block(&mut left, &mut right);
        all_left.extend_from_slice(&left);
        all_right.extend_from_slice(&right);
    }
    (all_left, all_right)
}

fn energy(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum()
}

fn sequenced_chain(slot: EffectSlot, pattern: Pattern) -> EngineContext {
    let mut ctx = EngineContext::default();
    ctx.build_default_chain().unwrap();
    ctx.select_effect(slot).unwrap();
    ctx.prepare(SR, BLOCK).unwrap();
    ctx.graph().start().unwrap();

    let seq = ctx.sequencer_mut();
    seq.set_timeline(Some(Arc::new(pattern)));
    seq.play();
    ctx
}

#[test]
fn sequenced_note_sounds_then_decays() {
    // 120 BPM: a quarter beat is 6000 samples, so the note-off lands in block 23
    let mut ctx = sequenced_chain(EffectSlot::None, Pattern::new().note(57, 127, 0.0, 0.25));
    let (left, right) = render(&mut ctx, 120);

    assert!(energy(&left[..BLOCK * 20]) > 1.0);
    assert!(left.iter().chain(&right).all(|s| s.is_finite() && s.abs() <= 1.0));

    // the 200 ms release is over by block 62
    let tail = &left[left.len() - BLOCK * 4..];
    assert!(energy(tail) < 1e-6, "tail energy {}", energy(tail));
}

#[test]
fn effects_extend_the_tail() {
    // note-off at 2400 samples, envelope idle by about block 47
    let pattern = || Pattern::new().note(60, 127, 0.0, 0.1);

    let mut dry = sequenced_chain(EffectSlot::None, pattern());
    let mut wet = sequenced_chain(EffectSlot::Reverb, pattern());
    let mut echo = sequenced_chain(EffectSlot::Delay, pattern());

    let (dry_left, _) = render(&mut dry, 110);
    let (wet_left, _) = render(&mut wet, 110);
    let (echo_left, _) = render(&mut echo, 110);

    // blocks 60.. cover 0.32 s to 0.59 s, including the first 500 ms echo
    let tail = |s: &[f32]| energy(&s[BLOCK * 60..]);
    assert!(tail(&dry_left) < 1e-6, "dry {}", tail(&dry_left));
    assert!(tail(&wet_left) > 1e-3, "reverb {}", tail(&wet_left));
    assert!(tail(&echo_left) > 1e-3, "delay {}", tail(&echo_left));
}

#[test]
fn stopped_graph_leaves_buffers_alone() {
    let mut ctx = sequenced_chain(EffectSlot::Reverb, Pattern::new().note(60, 127, 0.0, 1.0));
    ctx.graph().stop();

    let mut left = vec![0.25; BLOCK];
    let mut right = vec![-0.25; BLOCK];
    ctx.process_block(&mut left, &mut right);
    assert!(left.iter().all(|&s| s == 0.25));
    assert!(right.iter().all(|&s| s == -0.25));

    // the sequencer still runs, so the transport keeps time
    assert!(ctx.sequencer().position() > 0.0);
}

#[test]
fn automation_lane_moves_filter_cutoff() {
    let mut ctx = sequenced_chain(
        EffectSlot::None,
        Pattern::new()
            .automation(ParamId(9), 0.0, 200.0)
            .automation(ParamId(9), 1.0, 8_000.0),
    );
    let chain = ctx.chain().unwrap();
    let cutoff = ctx.graph().param(chain.filter, filter::FREQUENCY).unwrap();
    ctx.bind_automation(ParamId(9), cutoff.clone());

    render(&mut ctx, 1);
    let early = cutoff.target();
    // past beat 1 the lane holds its last value
    render(&mut ctx, 100);
    let late = cutoff.target();

    assert!(early < 400.0, "{early}");
    assert_eq!(late, 8_000.0);
}

#[test]
fn parameters_are_reachable_by_name() {
    let mut ctx = EngineContext::default();
    let chain = ctx.build_default_chain().unwrap();
    let graph = ctx.graph();

    assert!(graph.param(chain.delay, delay::FEEDBACK).is_some());
    assert!(graph.param(chain.reverb, reverb::ROOM_SIZE).is_some());
    assert!(graph.param(chain.filter, "no_such_param").is_none());

    let feedback = graph.param(chain.delay, delay::FEEDBACK).unwrap();
    feedback.set_target(3.0);
    assert_eq!(feedback.target(), delay::MAX_FEEDBACK);
}

#[test]
fn topology_errors_surface_at_edit_time() {
    let mut graph = Graph::new();
    let osc = graph.add_node(Box::new(OscillatorNode::sine())).unwrap();
    let env = graph.add_node(Box::new(EnvelopeNode::new())).unwrap();
    let filt = graph.add_node(Box::new(FilterNode::lowpass(800.0))).unwrap();

    graph.connect(osc, 0, env, 0).unwrap();
    graph.connect(env, 0, filt, 0).unwrap();
    assert!(matches!(
        graph.connect(filt, 0, osc, 0),
        Err(GraphError::CycleDetected { .. })
    ));
    assert!(matches!(
        graph.connect(osc, 0, env, 7),
        Err(GraphError::InvalidPort { port: 7, .. })
    ));

    let removed = graph.remove_node(filt).unwrap();
    assert_eq!(removed.kind().as_str(), "filter");
    assert_eq!(graph.connect(env, 0, filt, 0), Err(GraphError::UnknownNode(filt)));

    // the freed slot gets a new generation
    let delay = graph.add_node(Box::new(DelayNode::new())).unwrap();
    assert_eq!(delay.index(), filt.index());
    assert_ne!(delay, filt);
    assert!(!graph.contains(filt));
}

#[test]
fn prepare_runs_before_start() {
    let mut graph = Graph::new();
    graph.add_node(Box::new(DelayNode::new())).unwrap();
    assert_eq!(graph.start(), Err(GraphError::NotPrepared));

    graph.prepare(SR, BLOCK).unwrap();
    graph.start().unwrap();
    assert!(graph.is_running());

    graph.release();
    assert!(!graph.is_running());
    assert!(!graph.is_prepared());
}
