use crate::dsp::filter::{Biquad, BiquadCoefficients, FilterType};
use crate::dsp::param::{ChoiceHandle, ChoiceParameter, ParamHandle, ParamRange, SmoothedAtomicParameter};
use crate::error::PrepareError;
use crate::graph::node::{NodeKind, ProcessSpec, ProcessingNode, StereoBlock};
use crate::io::midi::TimedEvent;

pub const FREQUENCY: &str = "frequency";
pub const RESONANCE: &str = "resonance";
pub const GAIN_DB: &str = "gain_db";

const SMOOTHING_MS: f64 = 50.0;

/// Stereo biquad.
///
/// Parameters are sampled once per block. Coefficients are only redesigned
/// when frequency, resonance, gain or response differ from the last block.
pub struct FilterNode {
    filter_type: ChoiceParameter<FilterType>,
    frequency: SmoothedAtomicParameter,
    resonance: SmoothedAtomicParameter,
    gain_db: SmoothedAtomicParameter,
    coeffs: BiquadCoefficients,
    designed_for: Option<(FilterType, f32, f32, f32)>,
    left: Biquad,
    right: Biquad,
    sample_rate: f32,
    prepared: bool,
}

impl FilterNode {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            filter_type: ChoiceParameter::new(filter_type),
            frequency: SmoothedAtomicParameter::new(
                FREQUENCY,
                ParamRange::new(20.0, 20_000.0, 1_000.0),
                SMOOTHING_MS,
            ),
            resonance: SmoothedAtomicParameter::new(
                RESONANCE,
                ParamRange::new(0.1, 10.0, std::f64::consts::FRAC_1_SQRT_2),
                SMOOTHING_MS,
            ),
            gain_db: SmoothedAtomicParameter::new(
                GAIN_DB,
                ParamRange::new(-24.0, 24.0, 0.0),
                SMOOTHING_MS,
            ),
            coeffs: BiquadCoefficients::PASSTHROUGH,
            designed_for: None,
            left: Biquad::new(),
            right: Biquad::new(),
            sample_rate: 0.0,
            prepared: false,
        }
    }

    pub fn lowpass(cutoff_hz: f32) -> Self {
        let node = Self::new(FilterType::LowPass);
        node.frequency.set_target(cutoff_hz);
        node
    }

    pub fn highpass(cutoff_hz: f32) -> Self {
        let node = Self::new(FilterType::HighPass);
        node.frequency.set_target(cutoff_hz);
        node
    }

    pub fn filter_type_handle(&self) -> ChoiceHandle<FilterType> {
        self.filter_type.handle()
    }

    pub fn frequency(&self) -> ParamHandle {
        self.frequency.handle()
    }

    pub fn resonance(&self) -> ParamHandle {
        self.resonance.handle()
    }

    pub fn gain_db(&self) -> ParamHandle {
        self.gain_db.handle()
    }

    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    fn update_coefficients(&mut self, block_len: usize) {
        let settings = (
            self.filter_type.get(),
            self.frequency.skip(block_len),
            self.resonance.skip(block_len),
            self.gain_db.skip(block_len),
        );

        if self.designed_for != Some(settings) {
            let (filter_type, frequency, q, gain_db) = settings;
            self.coeffs = BiquadCoefficients::design(filter_type, frequency, q, gain_db, self.sample_rate);
            self.designed_for = Some(settings);
        }
    }
}

impl ProcessingNode for FilterNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Filter
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<(), PrepareError> {
        spec.validate()?;
        self.sample_rate = spec.sample_rate;
        for param in [&mut self.frequency, &mut self.resonance, &mut self.gain_db] {
            param.prepare(spec.sample_rate);
        }
        self.left.reset();
        self.right.reset();
        self.designed_for = None;
        self.update_coefficients(0);
        self.prepared = true;
        Ok(())
    }

    fn process(&mut self, block: &mut StereoBlock<'_>, _events: &[TimedEvent]) {
        if !self.prepared {
            return;
        }

        self.update_coefficients(block.len());
        self.left.render(&self.coeffs, block.left);
        self.right.render(&self.coeffs, block.right);
    }

    fn release(&mut self) {
        self.left.reset();
        self.right.reset();
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
            0 => Some(self.frequency.handle()),
            1 => Some(self.resonance.handle()),
            2 => Some(self.gain_db.handle()),
            _ => None,
        }
    }
}
