/// One completed capture frame handed to the consumer.
///
/// The payload is an owned deep copy of the producer's buffer, so the
/// producer clearing and reusing its internal storage after emission can
/// never alter a frame that has already been sent. The timestamp is in
/// seconds, monotonic and relative to the start of the capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    timestamp: f64,
}

impl AudioFrame {
    pub(crate) fn from_buffer(buffer: &[f32], timestamp: f64) -> Self {
        Self {
            samples: buffer.to_vec(),
            timestamp,
        }
    }

    /// Normalized samples in [-1.0, 1.0]. Always exactly the configured
    /// frame size (80 by default).
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Capture timestamp in seconds since the session started.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
