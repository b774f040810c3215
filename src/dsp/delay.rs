use std::collections::TryReserveError;

/// Circular buffer with fractional, linearly interpolated reads.
///
/// Storage is reserved once in [`allocate`](Self::allocate) and never grows
/// afterwards; reads and writes are allocation-free.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// An empty line. Call [`allocate`](Self::allocate) before use.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            write_pos: 0,
        }
    }

    /// Resize to exactly `len` zeroed samples.
    ///
    /// Reuses the existing storage when it is already large enough.
    pub fn allocate(&mut self, len: usize) -> Result<(), TryReserveError> {
        self.buffer.clear();
        self.buffer.try_reserve_exact(len)?;
        self.buffer.resize(len, 0.0);
        self.write_pos = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Longest delay a read may ask for. The slot under the write cursor is
    /// about to be overwritten, so it is never interpolated against.
    #[inline]
    pub fn max_delay_samples(&self) -> f64 {
        self.buffer.len().saturating_sub(2) as f64
    }

    /// Sample `delay_samples` behind the write cursor.
    #[inline]
    pub fn read(&self, delay_samples: f64) -> f32 {
        let len = self.buffer.len();
        if len < 2 {
            return 0.0;
        }

        let delay = delay_samples.clamp(1.0, self.max_delay_samples().max(1.0));
        let position = read_position(self.write_pos, delay, len);

        let i0 = position.floor() as usize;
        let i1 = if i0 + 1 == len { 0 } else { i0 + 1 };
        let frac = (position - i0 as f64) as f32;

        let a = self.buffer[i0];
        let b = self.buffer[i1];
        a + (b - a) * frac
    }

    /// Store `value` at the write cursor and advance it by one sample.
    #[inline]
    pub fn write(&mut self, value: f32) {
        if self.buffer.is_empty() {
            return;
        }

        self.buffer[self.write_pos] = value;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Drop the storage.
    pub fn release(&mut self) {
        self.buffer = Vec::new();
        self.write_pos = 0;
    }
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new()
    }
}

/// `(write_pos - delay_samples) mod len`, always in `[0, len)`.
#[inline]
pub fn read_position(write_pos: usize, delay_samples: f64, len: usize) -> f64 {
    let len_f = len as f64;
    let position = (write_pos as f64 - delay_samples).rem_euclid(len_f);
    // rem_euclid can round up to `len` for tiny negative inputs
    if position >= len_f {
        0.0
    } else {
        position
    }
}

/// Buffer length for a maximum delay in milliseconds plus a safety margin.
pub fn buffer_len_for(max_delay_ms: f32, sample_rate: f32, margin: usize) -> usize {
    (max_delay_ms as f64 * 0.001 * sample_rate as f64).ceil() as usize + margin
}
