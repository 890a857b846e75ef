//! Current-loop test samples.

use std::ops::Deref;

/// Number of samples captured by one current-loop test.
pub const SAMPLE_COUNT: u16 = 200;

/// Reinterpret a raw register word as a signed two's-complement value.
pub fn decode_sample(raw: u16) -> i16 {
    raw as i16
}

/// Signed current samples (mA) from one current-loop test, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Vec<i16>,
}

impl SampleBuffer {
    /// Decode raw register words.
    pub fn from_raw(raw: &[u16]) -> Self {
        Self {
            samples: raw.iter().copied().map(decode_sample).collect(),
        }
    }

    /// Smallest and largest sample, if any.
    pub fn range(&self) -> Option<(i16, i16)> {
        let min = self.samples.iter().min()?;
        let max = self.samples.iter().max()?;
        Some((*min, *max))
    }
}

impl Deref for SampleBuffer {
    type Target = [i16];

    fn deref(&self) -> &Self::Target {
        &self.samples
    }
}
