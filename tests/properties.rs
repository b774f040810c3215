//! Property tests for the DSP primitives and transport math.

use proptest::prelude::*;
use underbeats_dsp::dsp::delay::read_position;
use underbeats_dsp::dsp::filter::{Biquad, BiquadCoefficients, FilterType};
use underbeats_dsp::dsp::param::{Choice, ParamRange, SmoothedAtomicParameter};
use underbeats_dsp::graph::delay::MAX_FEEDBACK;
use underbeats_dsp::graph::{DelayNode, ProcessSpec, ProcessingNode, StereoBlock};
use underbeats_dsp::sequencing::TransportState;

const SR: f32 = 48_000.0;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// With feedback below one the line is a decaying sum: output never
    /// exceeds the input peak times 1 / (1 - feedback).
    #[test]
    fn delay_output_is_bounded(
        feedback in 0.0f32..=MAX_FEEDBACK,
        time_ms in 10.0f32..40.0,
        mix in 0.0f32..=1.0,
        input in prop::collection::vec(-1.0f32..=1.0, 256),
    ) {
        let mut node = DelayNode::with_settings(time_ms, feedback, mix);
        node.prepare(&ProcessSpec::new(SR, 256)).unwrap();

        let bound = 1.0 / (1.0 - feedback) + 1e-3;
        // 24 passes of the same block, several trips round the line
        for _ in 0..24 {
            let mut left = input.clone();
            let mut right = input.clone();
            node.process(&mut StereoBlock::new(&mut left, &mut right), &[]);

            for &s in left.iter().chain(&right) {
                prop_assert!(s.is_finite());
                prop_assert!(s.abs() <= bound, "{} > {} (feedback {})", s.abs(), bound, feedback);
            }
        }
    }

    #[test]
    fn read_position_stays_inside_the_line(
        len in 1usize..200_000,
        write in 0usize..200_000,
        delay in 0.0f64..200_000.0,
    ) {
        let write = write % len;
        let delay = delay % len as f64;
        let pos = read_position(write, delay, len);
        prop_assert!((0.0..len as f64).contains(&pos), "pos {} len {}", pos, len);
    }

    #[test]
    fn beats_and_seconds_are_inverse(tempo in 1.0f64..999.0, beats in 0.0f64..10_000.0) {
        let mut t = TransportState::default();
        t.set_tempo(tempo).unwrap();

        let back = t.seconds_to_beats(t.beats_to_seconds(beats));
        prop_assert!((back - beats).abs() <= 1e-9 * beats.max(1.0));
    }

    #[test]
    fn quantize_lands_on_nearest_grid_line(grid in 0.01f64..4.0, beats in 0.0f64..1_000.0) {
        let mut t = TransportState::default();
        t.set_quantization_grid(grid).unwrap();

        let q = t.quantize_time(beats);
        let steps = q / grid;
        prop_assert!((steps - steps.round()).abs() < 1e-6);
        prop_assert!((q - beats).abs() <= grid / 2.0 + 1e-9);
    }

    /// The ramp moves monotonically toward the target and lands on it
    /// exactly after `ramp_samples` steps.
    #[test]
    fn smoothed_parameter_converges_monotonically(
        start in -100.0f32..100.0,
        target in -100.0f32..100.0,
        ramp_ms in 0.0f64..200.0,
    ) {
        let mut param: SmoothedAtomicParameter =
            SmoothedAtomicParameter::new("value", ParamRange::new(-100.0, 100.0, 0.0), ramp_ms);
        param.set_target(start);
        param.prepare(SR);
        prop_assert_eq!(param.current(), start);

        param.set_target(target);
        let rising = target >= start;
        let mut previous = start;
        for _ in 0..param.ramp_samples().max(1) {
            let value = param.next_smoothed_value();
            if rising {
                prop_assert!(value >= previous && value <= target);
            } else {
                prop_assert!(value <= previous && value >= target);
            }
            previous = value;
        }

        prop_assert_eq!(param.current(), target);
        prop_assert!(!param.is_smoothing());
        prop_assert_eq!(param.next_smoothed_value(), target);
    }

    #[test]
    fn biquad_designs_are_stable(
        index in 0u8..7,
        frequency in 20.0f32..20_000.0,
        q in 0.1f32..10.0,
        gain_db in -24.0f32..24.0,
        input in prop::array::uniform32(-1.0f32..=1.0),
    ) {
        let filter_type = FilterType::from_index(index);
        let coeffs = BiquadCoefficients::design(filter_type, frequency, q, gain_db, SR);
        let mut biquad = Biquad::new();

        for _ in 0..32 {
            for &sample in &input {
                let out = biquad.process(&coeffs, sample);
                prop_assert!(
                    out.is_finite() && out.abs() < 1e3,
                    "{:?} ({} Hz, q {}, {} dB) produced {}",
                    filter_type, frequency, q, gain_db, out
                );
            }
        }
    }
}
