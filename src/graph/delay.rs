use crate::dsp::delay::{buffer_len_for, DelayLine};
use crate::dsp::param::{ParamHandle, ParamRange, SmoothedAtomicParameter};
use crate::error::PrepareError;
use crate::graph::node::{NodeKind, ProcessSpec, ProcessingNode, StereoBlock};
use crate::io::midi::TimedEvent;
use crate::{DELAY_SAFETY_MARGIN, MAX_DELAY_MS};

pub const TIME: &str = "time";
pub const FEEDBACK: &str = "feedback";
pub const MIX: &str = "mix";

/// Highest accepted feedback. Anything at or above 1 grows without bound.
pub const MAX_FEEDBACK: f32 = 0.95;

/*
Feedback Delay
==============

  in ──┬──────────────────────────────── × (1 - mix) ──┐
       │                                               (+)──→ out
       └─→ (+) ──→ [ delay line ] ──┬─── × mix ────────┘
            ↑                       │
            └────── × feedback ─────┘

Per sample and channel: read the line `time` behind the write cursor
(linearly interpolated), write `input + delayed * feedback` at the cursor,
output the dry/wet blend, advance the cursor. The line holds MAX_DELAY_MS
plus a safety margin and is reserved in `prepare`.

Time glides over 100 ms (audible as a pitch bend rather than a click);
feedback and mix over 50 ms.
*/

pub struct DelayNode {
    lines: [DelayLine; 2],
    time_ms: SmoothedAtomicParameter,
    feedback: SmoothedAtomicParameter,
    mix: SmoothedAtomicParameter,
    samples_per_ms: f64,
    prepared: bool,
}

impl DelayNode {
    pub fn new() -> Self {
        Self {
            lines: [DelayLine::new(), DelayLine::new()],
            time_ms: SmoothedAtomicParameter::new(
                TIME,
                ParamRange::new(10.0, MAX_DELAY_MS as f64, 500.0),
                100.0,
            ),
            feedback: SmoothedAtomicParameter::new(
                FEEDBACK,
                ParamRange::new(0.0, MAX_FEEDBACK as f64, 0.5),
                50.0,
            ),
            mix: SmoothedAtomicParameter::new(MIX, ParamRange::new(0.0, 1.0, 0.3), 50.0),
            samples_per_ms: 0.0,
            prepared: false,
        }
    }

    pub fn with_settings(time_ms: f32, feedback: f32, mix: f32) -> Self {
        let node = Self::new();
        node.time_ms.set_target(time_ms);
        node.feedback.set_target(feedback);
        node.mix.set_target(mix);
        node
    }

    pub fn time(&self) -> ParamHandle {
        self.time_ms.handle()
    }

    pub fn feedback(&self) -> ParamHandle {
        self.feedback.handle()
    }

    pub fn mix(&self) -> ParamHandle {
        self.mix.handle()
    }

    /// Length of each channel's line, zero until prepared.
    pub fn buffer_len(&self) -> usize {
        self.lines[0].len()
    }
}

impl Default for DelayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingNode for DelayNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Delay
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<(), PrepareError> {
        spec.validate()?;
        self.prepared = false;

        let samples = buffer_len_for(MAX_DELAY_MS, spec.sample_rate, DELAY_SAFETY_MARGIN);
        for line in &mut self.lines {
            line.allocate(samples)
                .map_err(|_| PrepareError::Allocation {
                    node: "delay",
                    samples,
                })?;
        }

        self.samples_per_ms = spec.sample_rate as f64 * 0.001;
        for param in [&mut self.time_ms, &mut self.feedback, &mut self.mix] {
            param.prepare(spec.sample_rate);
        }

        self.prepared = true;
        Ok(())
    }

    fn process(&mut self, block: &mut StereoBlock<'_>, _events: &[TimedEvent]) {
        if !self.prepared {
            return;
        }

        let [left_line, right_line] = &mut self.lines;
        for i in 0..block.len() {
            let delay_samples = self.time_ms.next_smoothed_value() as f64 * self.samples_per_ms;
            let feedback = self.feedback.next_smoothed_value().min(MAX_FEEDBACK);
            let mix = self.mix.next_smoothed_value();

            for (line, sample) in [
                (&mut *left_line, &mut block.left[i]),
                (&mut *right_line, &mut block.right[i]),
            ] {
                let input = *sample;
                let delayed = line.read(delay_samples);
                line.write(input + delayed * feedback);
                *sample = input * (1.0 - mix) + delayed * mix;
            }
        }
    }

    fn release(&mut self) {
        for line in &mut self.lines {
            line.release();
        }
        self.prepared = false;
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn param_count(&self) -> usize {
        3
    }

    fn param(&self, index: usize) -> Option<ParamHandle> {
        match index {
            0 => Some(self.time_ms.handle()),
            1 => Some(self.feedback.handle()),
            2 => Some(self.mix.handle()),
            _ => None,
        }
    }
}
