use crate::dsp::param::{ParamHandle, ParamRange, SmoothedAtomicParameter};
use crate::dsp::reverb::{ReverbSettings, StereoReverb};
use crate::error::PrepareError;
use crate::graph::node::{NodeKind, ProcessSpec, ProcessingNode, StereoBlock};
use crate::io::midi::TimedEvent;

pub const ROOM_SIZE: &str = "room_size";
pub const DAMPING: &str = "damping";
pub const WIDTH: &str = "width";
pub const MIX: &str = "mix";

const SMOOTHING_MS: f64 = 50.0;
/// Smallest control change that triggers a coefficient update.
const UPDATE_EPSILON: f32 = 1e-3;

/// Stereo reverb with block-rate parameter polling.
///
/// Each block the four controls are advanced by the block length. If any of
/// them moved by more than [`UPDATE_EPSILON`] since the last update, the
/// network's coefficients are recomputed before the block is rendered.
pub struct ReverbNode {
    reverb: Option<StereoReverb>,
    room_size: SmoothedAtomicParameter,
    damping: SmoothedAtomicParameter,
    width: SmoothedAtomicParameter,
    mix: SmoothedAtomicParameter,
}

impl ReverbNode {
    pub fn new() -> Self {
        let defaults = ReverbSettings::default();
        let unit = |name, default: f32| {
            SmoothedAtomicParameter::new(name, ParamRange::new(0.0, 1.0, default as f64), SMOOTHING_MS)
        };

        Self {
            reverb: None,
            room_size: unit(ROOM_SIZE, defaults.room_size),
            damping: unit(DAMPING, defaults.damping),
            width: unit(WIDTH, defaults.width),
            mix: unit(MIX, defaults.mix),
        }
    }

    pub fn room_size(&self) -> ParamHandle {
        self.room_size.handle()
    }

    pub fn damping(&self) -> ParamHandle {
        self.damping.handle()
    }

    pub fn width(&self) -> ParamHandle {
        self.width.handle()
    }

    pub fn mix(&self) -> ParamHandle {
        self.mix.handle()
    }

    /// Settings the network is currently running with.
    pub fn applied_settings(&self) -> Option<ReverbSettings> {
        self.reverb.as_ref().map(StereoReverb::settings)
    }

    fn poll_settings(&mut self, block_len: usize) -> ReverbSettings {
        ReverbSettings {
            room_size: self.room_size.skip(block_len),
            damping: self.damping.skip(block_len),
            width: self.width.skip(block_len),
            mix: self.mix.skip(block_len),
        }
    }
}

impl Default for ReverbNode {
    fn default() -> Self {
        Self::new()
    }
}

fn moved(a: ReverbSettings, b: ReverbSettings) -> bool {
    (a.room_size - b.room_size).abs() > UPDATE_EPSILON
        || (a.damping - b.damping).abs() > UPDATE_EPSILON
        || (a.width - b.width).abs() > UPDATE_EPSILON
        || (a.mix - b.mix).abs() > UPDATE_EPSILON
}

impl ProcessingNode for ReverbNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Reverb
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<(), PrepareError> {
        spec.validate()?;
        self.reverb = None;

        for param in [
            &mut self.room_size,
            &mut self.damping,
            &mut self.width,
            &mut self.mix,
        ] {
            param.prepare(spec.sample_rate);
        }

        let mut reverb = StereoReverb::new(spec.sample_rate).map_err(|_| PrepareError::Allocation {
            node: "reverb",
            samples: (spec.sample_rate * 0.1) as usize,
        })?;
        reverb.apply(self.poll_settings(0));
        self.reverb = Some(reverb);
        Ok(())
    }

    fn process(&mut self, block: &mut StereoBlock<'_>, _events: &[TimedEvent]) {
        let settings = self.poll_settings(block.len());
        let Some(reverb) = self.reverb.as_mut() else {
            return;
        };

        if moved(settings, reverb.settings()) {
            reverb.apply(settings);
        }

        for (left, right) in block.left.iter_mut().zip(block.right.iter_mut()) {
            (*left, *right) = reverb.process(*left, *right);
        }
    }

    fn release(&mut self) {
        self.reverb = None;
    }

    fn is_prepared(&self) -> bool {
        self.reverb.is_some()
    }

    fn param_count(&self) -> usize {
        4
    }

    fn param(&self, index: usize) -> Option<ParamHandle> {
        match index {
            0 => Some(self.room_size.handle()),
            1 => Some(self.damping.handle()),
            2 => Some(self.width.handle()),
            3 => Some(self.mix.handle()),
            _ => None,
        }
    }
}
