//! Lock-free parameters with audio-rate linear smoothing.
//!
//! A parameter is split in two halves:
//!
//! - an `Arc`-shared atomic slot holding the published target, written from
//!   any thread through a [`ParamHandle`]
//! - a ramp owned by the audio thread inside [`SmoothedAtomicParameter`],
//!   which notices a new target and walks towards it linearly
//!
//! ```text
//!   control thread                     audio thread
//!   ──────────────                     ────────────
//!   handle.set_target(0.8) ──atomic──▶ param.next_smoothed_value()
//!                                        0.20 0.21 0.22 ... 0.80 0.80
//!                                        └──── ramp_ms ────┘
//! ```
//!
//! Out-of-range targets are clamped, never rejected, so the audio path stays
//! branch-free and infallible.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF64;

/// Numeric types a parameter can carry. Ramps are computed in `f64`.
pub trait ParamValue: Copy + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl ParamValue for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl ParamValue for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Declared valid range of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamRange {
    pub const fn new(min: f64, max: f64, default: f64) -> Self {
        Self { min, max, default }
    }

    /// Clamp into the range. NaN collapses to the default.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

#[derive(Debug)]
struct SharedSlot {
    name: &'static str,
    range: ParamRange,
    target: AtomicF64,
}

impl SharedSlot {
    #[inline]
    fn load(&self) -> f64 {
        self.target.load(Ordering::Acquire)
    }

    #[inline]
    fn store(&self, value: f64) {
        self.target.store(self.range.clamp(value), Ordering::Release);
    }
}

/// Control-side view of a parameter. Cheap to clone, usable from any thread.
pub struct ParamHandle<T: ParamValue = f32> {
    slot: Arc<SharedSlot>,
    _value: PhantomData<fn() -> T>,
}

impl<T: ParamValue> Clone for ParamHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            _value: PhantomData,
        }
    }
}

impl<T: ParamValue> std::fmt::Debug for ParamHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamHandle")
            .field("name", &self.slot.name)
            .field("target", &self.slot.load())
            .finish()
    }
}

impl<T: ParamValue> ParamHandle<T> {
    /// Publish a new target, clamped to the declared range.
    #[inline]
    pub fn set_target(&self, value: T) {
        self.slot.store(value.to_f64());
    }

    #[inline]
    pub fn target(&self) -> T {
        T::from_f64(self.slot.load())
    }

    pub fn name(&self) -> &'static str {
        self.slot.name
    }

    pub fn range(&self) -> ParamRange {
        self.slot.range
    }
}

/// Atomic target plus an audio-thread linear ramp.
///
/// `set_target` may be called from any thread (or through a
/// [`ParamHandle`]); every other method belongs to the audio thread.
pub struct SmoothedAtomicParameter<T: ParamValue = f32> {
    slot: Arc<SharedSlot>,
    current: f64,
    /// Last target observed from the atomic slot.
    target: f64,
    step: f64,
    remaining: u32,
    ramp_ms: f64,
    ramp_samples: u32,
    sample_rate: f64,
    _value: PhantomData<fn() -> T>,
}

impl<T: ParamValue> SmoothedAtomicParameter<T> {
    pub fn new(name: &'static str, range: ParamRange, ramp_ms: f64) -> Self {
        let default = range.clamp(range.default);
        let slot = Arc::new(SharedSlot {
            name,
            range,
            target: AtomicF64::new(default),
        });

        Self {
            slot,
            current: default,
            target: default,
            step: 0.0,
            remaining: 0,
            ramp_ms: ramp_ms.max(0.0),
            ramp_samples: 0,
            sample_rate: 0.0,
            _value: PhantomData,
        }
    }

    pub fn handle(&self) -> ParamHandle<T> {
        ParamHandle {
            slot: Arc::clone(&self.slot),
            _value: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.slot.name
    }

    pub fn range(&self) -> ParamRange {
        self.slot.range
    }

    /// Publish a new target, clamped to the declared range.
    #[inline]
    pub fn set_target(&self, value: T) {
        self.slot.store(value.to_f64());
    }

    /// The published (unsmoothed) target.
    #[inline]
    pub fn target(&self) -> T {
        T::from_f64(self.slot.load())
    }

    /// Value most recently returned by the ramp.
    #[inline]
    pub fn current(&self) -> T {
        T::from_f64(self.current)
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }

    /// Bind the ramp to a sample rate and settle on the published target.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate as f64;
        self.recompute_ramp_samples();
        self.snap_to_target();
    }

    /// Change the ramp length. Takes effect on the next target change.
    pub fn set_ramp_duration_ms(&mut self, ramp_ms: f64) {
        self.ramp_ms = ramp_ms.max(0.0);
        self.recompute_ramp_samples();
    }

    pub fn ramp_samples(&self) -> u32 {
        self.ramp_samples
    }

    /// Publish `value` and jump straight to it, bypassing the ramp.
    ///
    /// Audio thread only; used for note-driven changes such as key tracking.
    pub fn jump_to(&mut self, value: T) {
        self.set_target(value);
        self.snap_to_target();
    }

    /// Finish any ramp immediately.
    pub fn snap_to_target(&mut self) {
        self.target = self.slot.load();
        self.current = self.target;
        self.remaining = 0;
        self.step = 0.0;
    }

    /// Advance one sample and return the smoothed value.
    ///
    /// Reaches the target exactly after `ramp_samples` calls and holds there.
    #[inline]
    pub fn next_smoothed_value(&mut self) -> T {
        self.poll_target();

        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }

        T::from_f64(self.current)
    }

    /// Advance `samples` at once and return the value reached.
    ///
    /// Used by nodes that only need a block-rate view of the ramp.
    #[inline]
    pub fn skip(&mut self, samples: usize) -> T {
        self.poll_target();

        if samples > 0 && self.remaining > 0 {
            let samples = samples.min(u32::MAX as usize) as u32;
            if samples >= self.remaining {
                self.remaining = 0;
                self.current = self.target;
            } else {
                self.remaining -= samples;
                self.current += self.step * samples as f64;
            }
        }

        T::from_f64(self.current)
    }

    #[inline]
    fn poll_target(&mut self) {
        let published = self.slot.load();
        if published == self.target {
            return;
        }

        self.target = published;
        if self.ramp_samples == 0 {
            self.current = published;
            self.remaining = 0;
            self.step = 0.0;
        } else {
            self.step = (published - self.current) / self.ramp_samples as f64;
            self.remaining = self.ramp_samples;
        }
    }

    fn recompute_ramp_samples(&mut self) {
        let samples = (self.ramp_ms * 0.001 * self.sample_rate).round();
        self.ramp_samples = samples.clamp(0.0, u32::MAX as f64) as u32;
    }
}

/// A discrete setting (waveform, filter response) stored as an index.
///
/// `from_index` must map every index, falling back to a default variant for
/// indices it does not know.
pub trait Choice: Copy + Send + Sync + 'static {
    fn to_index(self) -> u8;
    fn from_index(index: u8) -> Self;
}

/// Control-side view of a [`ChoiceParameter`].
pub struct ChoiceHandle<T: Choice> {
    slot: Arc<AtomicU8>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Choice> Clone for ChoiceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            _value: PhantomData,
        }
    }
}

impl<T: Choice> ChoiceHandle<T> {
    #[inline]
    pub fn set(&self, value: T) {
        self.slot.store(value.to_index(), Ordering::Release);
    }

    #[inline]
    pub fn get(&self) -> T {
        load_choice(&self.slot)
    }
}

/// Atomically published discrete setting. No smoothing: the audio thread
/// picks up a new value on the next sample (or block) it reads it.
pub struct ChoiceParameter<T: Choice> {
    slot: Arc<AtomicU8>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Choice> ChoiceParameter<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slot: Arc::new(AtomicU8::new(initial.to_index())),
            _value: PhantomData,
        }
    }

    pub fn handle(&self) -> ChoiceHandle<T> {
        ChoiceHandle {
            slot: Arc::clone(&self.slot),
            _value: PhantomData,
        }
    }

    #[inline]
    pub fn set(&self, value: T) {
        self.slot.store(value.to_index(), Ordering::Release);
    }

    #[inline]
    pub fn get(&self) -> T {
        load_choice(&self.slot)
    }
}

#[inline]
fn load_choice<T: Choice>(slot: &AtomicU8) -> T {
    T::from_index(slot.load(Ordering::Acquire))
}
