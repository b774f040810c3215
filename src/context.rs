//! The engine as one explicit object.
//!
//! [`EngineContext`] owns the graph, the sequencer and the per-block event
//! buffers. Whoever drives audio (a cpal callback, a test, an offline
//! render) owns the context and calls [`EngineContext::process_block`];
//! everything else talks to it through cloneable handles taken beforehand:
//! [`ParamHandle`]s, a [`SequencerHandle`](crate::sequencing::SequencerHandle),
//! the graph's [`RunSwitch`](crate::graph::RunSwitch).
//!
//! Per block:
//!
//! ```text
//!   queued input ──▶ sequencer.process_midi ──▶ block events
//!                                                 │
//!                        automation ──set_target──┤
//!                                                 ▼
//!   left/right ──────────────▶ graph.process_audio (in max-block chunks)
//! ```

use tracing::info;

use crate::config::EngineConfig;
use crate::dsp::param::ParamHandle;
use crate::error::GraphError;
use crate::graph::delay::DelayNode;
use crate::graph::engine::{Graph, NodeId};
use crate::graph::envelope::EnvelopeNode;
use crate::graph::filter::FilterNode;
use crate::graph::oscillator::OscillatorNode;
use crate::graph::reverb::ReverbNode;
use crate::io::midi::{EventBuffer, MidiMessage, TimedEvent};
use crate::sequencing::sequencer::Sequencer;
use crate::sequencing::timeline::ParamId;

/// Effect at the end of the default chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectSlot {
    #[default]
    None,
    Delay,
    Reverb,
}

/// Node ids of the chain built by [`EngineContext::build_default_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultChain {
    pub oscillator: NodeId,
    pub envelope: NodeId,
    pub filter: NodeId,
    pub delay: NodeId,
    pub reverb: NodeId,
    pub effect: EffectSlot,
}

impl DefaultChain {
    fn effect_node(&self, slot: EffectSlot) -> Option<NodeId> {
        match slot {
            EffectSlot::None => None,
            EffectSlot::Delay => Some(self.delay),
            EffectSlot::Reverb => Some(self.reverb),
        }
    }
}

pub struct EngineContext {
    graph: Graph,
    sequencer: Sequencer,
    input: EventBuffer,
    block_events: EventBuffer,
    chunk_events: EventBuffer,
    automation: Vec<(ParamId, ParamHandle)>,
    chain: Option<DefaultChain>,
}

impl EngineContext {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            graph: Graph::new(),
            sequencer: Sequencer::with_state(config.transport),
            input: EventBuffer::with_capacity(config.event_capacity),
            block_events: EventBuffer::with_capacity(config.event_capacity),
            chunk_events: EventBuffer::with_capacity(config.event_capacity),
            automation: Vec::new(),
            chain: None,
        }
    }

    /// Prepare graph and sequencer. Must succeed before the first block.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> Result<(), GraphError> {
        self.graph.prepare(sample_rate, max_block_size)?;
        self.sequencer.prepare(sample_rate, max_block_size)?;
        Ok(())
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut Sequencer {
        &mut self.sequencer
    }

    /// Add an externally received event (e.g. live MIDI) to the next block.
    /// An offset past that block's end plays on its last sample. Returns
    /// `false` if this block's input is already full.
    pub fn queue_input(&mut self, event: TimedEvent) -> bool {
        self.input.push(event)
    }

    /// Route a timeline automation lane to a node parameter. A lane may drive
    /// several parameters.
    pub fn bind_automation(&mut self, id: ParamId, handle: ParamHandle) {
        info!(%id, param = handle.name(), "automation bound");
        self.automation.push((id, handle));
    }

    /// Drop every binding of `id`. Returns how many were removed.
    pub fn unbind_automation(&mut self, id: ParamId) -> usize {
        let before = self.automation.len();
        self.automation.retain(|(bound, _)| *bound != id);
        before - self.automation.len()
    }

    /// Events handed to the graph for the most recent block.
    pub fn last_block_events(&self) -> &[TimedEvent] {
        self.block_events.as_slice()
    }

    /// Render one block in place. Realtime-safe.
    ///
    /// The sequencer always advances by the full block; the graph runs in
    /// chunks of at most the prepared block size with event offsets rebased
    /// to each chunk. An empty block does nothing: queued input and pending
    /// note-offs wait for the next block with samples.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let n = left.len().min(right.len());
        if n == 0 {
            return;
        }

        self.sequencer
            .process_midi(self.input.as_slice(), &mut self.block_events, n);
        self.input.clear();

        for event in &self.block_events {
            if let MidiMessage::Automation { param, value } = event.message {
                for (id, handle) in &self.automation {
                    if *id == param {
                        handle.set_target(value);
                    }
                }
            }
        }

        let Some(spec) = self.graph.spec() else {
            return;
        };
        let mut start = 0;
        while start < n {
            let end = (start + spec.max_block_size).min(n);

            self.chunk_events.clear();
            for event in &self.block_events {
                if (start..end).contains(&event.offset) {
                    self.chunk_events
                        .push(TimedEvent::new(event.offset - start, event.message));
                }
            }

            self.graph.process_audio(
                &mut left[start..end],
                &mut right[start..end],
                self.chunk_events.as_slice(),
            );
            start = end;
        }
    }

    /// Oscillator → envelope → filter, plus a delay and a reverb that start
    /// disconnected. Use [`EngineContext::select_effect`] to put one of
    /// them after the filter.
    pub fn build_default_chain(&mut self) -> Result<DefaultChain, GraphError> {
        let oscillator = self.graph.add_node(Box::new(OscillatorNode::sawtooth()))?;
        let envelope = self.graph.add_node(Box::new(EnvelopeNode::new()))?;
        let filter = self.graph.add_node(Box::new(FilterNode::lowpass(1_200.0)))?;
        let delay = self.graph.add_node(Box::new(DelayNode::new()))?;
        let reverb = self.graph.add_node(Box::new(ReverbNode::new()))?;

        self.connect_stereo(oscillator, envelope)?;
        self.connect_stereo(envelope, filter)?;

        let chain = DefaultChain {
            oscillator,
            envelope,
            filter,
            delay,
            reverb,
            effect: EffectSlot::None,
        };
        self.chain = Some(chain);
        info!("default chain built");
        Ok(chain)
    }

    pub fn chain(&self) -> Option<DefaultChain> {
        self.chain
    }

    /// Rewire the filter output to `slot`. Control thread only, with the
    /// graph stopped or otherwise kept off the audio thread meanwhile.
    pub fn select_effect(&mut self, slot: EffectSlot) -> Result<(), GraphError> {
        let mut chain = self.chain.ok_or(GraphError::NoDefaultChain)?;

        self.graph.disconnect_outputs(chain.filter)?;
        if let Some(effect) = chain.effect_node(slot) {
            self.connect_stereo(chain.filter, effect)?;
        }

        chain.effect = slot;
        self.chain = Some(chain);
        info!(?slot, "effect selected");
        Ok(())
    }

    fn connect_stereo(&mut self, src: NodeId, dst: NodeId) -> Result<(), GraphError> {
        self.graph.connect(src, 0, dst, 0)?;
        self.graph.connect(src, 1, dst, 1)
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::pattern::Pattern;
    use std::sync::Arc;

    fn prepared_chain(block: usize) -> (EngineContext, DefaultChain) {
        let mut ctx = EngineContext::default();
        let chain = ctx.build_default_chain().unwrap();
        ctx.prepare(48_000.0, block).unwrap();
        ctx.graph().start().unwrap();
        (ctx, chain)
    }

    #[test]
    fn effect_selection_rewires_the_tail() {
        let (mut ctx, chain) = prepared_chain(128);
        assert_eq!(
            ctx.graph().execution_order(),
            vec![chain.oscillator, chain.envelope, chain.filter]
        );

        ctx.select_effect(EffectSlot::Delay).unwrap();
        assert_eq!(ctx.graph().execution_order().last(), Some(&chain.delay));

        ctx.select_effect(EffectSlot::Reverb).unwrap();
        let order = ctx.graph().execution_order();
        assert_eq!(order.last(), Some(&chain.reverb));
        assert!(!order.contains(&chain.delay));

        ctx.select_effect(EffectSlot::None).unwrap();
        assert_eq!(ctx.graph().execution_order().len(), 3);
        assert_eq!(ctx.chain().unwrap().effect, EffectSlot::None);
    }

    #[test]
    fn select_effect_needs_a_chain() {
        let mut ctx = EngineContext::default();
        assert_eq!(ctx.select_effect(EffectSlot::Delay), Err(GraphError::NoDefaultChain));
    }

    #[test]
    fn live_input_plays_through_the_chain() {
        let (mut ctx, _) = prepared_chain(128);
        ctx.queue_input(TimedEvent::note_on(0, 69, 127));

        let mut left = vec![0.0; 128];
        let mut right = vec![0.0; 128];
        ctx.process_block(&mut left, &mut right);
        assert!(left.iter().any(|s| s.abs() > 1e-4));

        // input is consumed by the block it was queued for
        ctx.process_block(&mut left, &mut right);
        assert!(ctx.last_block_events().is_empty());
    }

    #[test]
    fn long_blocks_are_chunked_with_rebased_offsets() {
        let (mut ctx, _) = prepared_chain(64);
        ctx.queue_input(TimedEvent::note_on(100, 69, 127));

        let mut left = vec![0.0; 256];
        let mut right = vec![0.0; 256];
        ctx.process_block(&mut left, &mut right);

        // silent until the note arrives in the second chunk
        assert!(left[..100].iter().all(|&s| s == 0.0));
        assert!(left[100..].iter().any(|s| s.abs() > 1e-4));
    }

    fn peak(ctx: &mut EngineContext, blocks: usize) -> f32 {
        let mut left = vec![0.0; 128];
        let mut right = vec![0.0; 128];
        let mut peak = 0.0f32;
        for _ in 0..blocks {
            ctx.process_block(&mut left, &mut right);
            peak = left.iter().fold(peak, |p, s| p.max(s.abs()));
        }
        peak
    }

    #[test]
    fn stop_releases_notes_across_an_empty_block() {
        let (mut ctx, _) = prepared_chain(128);
        let seq = ctx.sequencer_mut();
        seq.set_timeline(Some(Arc::new(Pattern::new().note(69, 127, 0.0, 8.0))));
        seq.play();
        assert!(peak(&mut ctx, 4) > 0.1);

        ctx.sequencer_mut().stop();
        ctx.process_block(&mut [], &mut []);
        assert!(ctx.last_block_events().is_empty());

        // 200 ms release at 48 kHz is 75 blocks
        peak(&mut ctx, 1);
        assert_eq!(
            ctx.last_block_events(),
            &[TimedEvent::new(0, MidiMessage::NoteOff { pitch: 69 })]
        );
        peak(&mut ctx, 100);
        assert!(peak(&mut ctx, 10) < 1e-6);
    }

    #[test]
    fn late_live_note_off_still_releases() {
        let (mut ctx, _) = prepared_chain(128);
        ctx.queue_input(TimedEvent::note_on(0, 69, 127));
        assert!(peak(&mut ctx, 4) > 0.1);

        ctx.queue_input(TimedEvent::note_off(5_000, 69));
        peak(&mut ctx, 1);
        assert_eq!(
            ctx.last_block_events(),
            &[TimedEvent::new(127, MidiMessage::NoteOff { pitch: 69 })]
        );
        peak(&mut ctx, 100);
        assert!(peak(&mut ctx, 10) < 1e-6);
    }

    #[test]
    fn automation_drives_bound_parameters() {
        let (mut ctx, chain) = prepared_chain(128);
        let cutoff = ctx
            .graph()
            .param(chain.filter, crate::graph::filter::FREQUENCY)
            .unwrap();
        let lane = ParamId(1);
        ctx.bind_automation(lane, cutoff.clone());

        let pattern = Pattern::new().automation(lane, 0.0, 300.0);
        let seq = ctx.sequencer_mut();
        seq.set_timeline(Some(Arc::new(pattern)));
        seq.play();

        let mut left = vec![0.0; 128];
        let mut right = vec![0.0; 128];
        ctx.process_block(&mut left, &mut right);
        assert_eq!(cutoff.target(), 300.0);

        assert_eq!(ctx.unbind_automation(lane), 1);
        cutoff.set_target(900.0);
        ctx.process_block(&mut left, &mut right);
        assert_eq!(cutoff.target(), 900.0);
    }
}
