use crate::dsp::param::ParamHandle;
use crate::error::PrepareError;
use crate::io::midi::TimedEvent;
use crate::MAX_BLOCK_SIZE;

/// Playback configuration handed to every node before it may process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f32,
    pub max_block_size: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f32, max_block_size: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
        }
    }

    pub fn validate(&self) -> Result<(), PrepareError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(PrepareError::InvalidSampleRate(self.sample_rate));
        }
        if self.max_block_size == 0 || self.max_block_size > MAX_BLOCK_SIZE {
            return Err(PrepareError::InvalidBlockSize(self.max_block_size));
        }
        Ok(())
    }
}

/// The running stereo buffer passed from node to node.
pub struct StereoBlock<'a> {
    pub left: &'a mut [f32],
    pub right: &'a mut [f32],
}

impl<'a> StereoBlock<'a> {
    /// Both channels are truncated to the shorter of the two.
    pub fn new(left: &'a mut [f32], right: &'a mut [f32]) -> Self {
        let n = left.len().min(right.len());
        Self {
            left: &mut left[..n],
            right: &mut right[..n],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn fill(&mut self, value: f32) {
        self.left.fill(value);
        self.right.fill(value);
    }
}

/// The closed set of node kinds the engine knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Oscillator,
    Envelope,
    Filter,
    Delay,
    Reverb,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Oscillator => "oscillator",
            NodeKind::Envelope => "envelope",
            NodeKind::Filter => "filter",
            NodeKind::Delay => "delay",
            NodeKind::Reverb => "reverb",
        }
    }
}

/// Core trait for audio processing graph nodes.
///
/// Lifecycle: `prepare` (control thread, may allocate) → any number of
/// `process` calls (audio thread, never allocates) → `release`.
pub trait ProcessingNode: Send {
    fn kind(&self) -> NodeKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<(), PrepareError>;

    /// Render one block in place. `events` are sorted by offset.
    fn process(&mut self, block: &mut StereoBlock<'_>, events: &[TimedEvent]);

    /// Free what `prepare` allocated. The node must be prepared again before
    /// it may process.
    fn release(&mut self) {}

    fn is_prepared(&self) -> bool;

    fn param_count(&self) -> usize;

    /// Control handle for the parameter at `index`, in declaration order.
    fn param(&self, index: usize) -> Option<ParamHandle>;

    fn param_by_name(&self, name: &str) -> Option<ParamHandle> {
        (0..self.param_count())
            .filter_map(|index| self.param(index))
            .find(|handle| handle.name() == name)
    }
}

/// Walks a sorted event slice alongside a per-sample loop.
pub struct EventCursor<'a> {
    events: &'a [TimedEvent],
    next: usize,
}

impl<'a> EventCursor<'a> {
    pub fn new(events: &'a [TimedEvent]) -> Self {
        Self { events, next: 0 }
    }

    /// Next event due at or before `sample`, if any.
    #[inline]
    pub fn pop_due(&mut self, sample: usize) -> Option<&'a TimedEvent> {
        let event = self.events.get(self.next)?;
        if event.offset <= sample {
            self.next += 1;
            Some(event)
        } else {
            None
        }
    }

    /// Offset of the next pending event, or `block_len` if none remain.
    #[inline]
    pub fn next_offset(&self, block_len: usize) -> usize {
        self.events
            .get(self.next)
            .map_or(block_len, |event| event.offset.min(block_len))
    }
}
