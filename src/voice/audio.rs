//! Synthesized audio containers

use crate::{Error, Result};

/// Audio for one sentence, tagged with its position in the reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    pub bytes: Vec<u8>,
    pub order_index: usize,
}

/// Concatenation of a reply's segments, in order, ready for playback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffer {
    bytes: Vec<u8>,
    segments: usize,
}

impl AudioBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            segments: 0,
        }
    }

    /// Append the next segment
    ///
    /// # Errors
    ///
    /// Returns error if the segment is not the next one in order
    pub fn append(&mut self, segment: AudioSegment) -> Result<()> {
        if segment.order_index != self.segments {
            return Err(Error::Audio(format!(
                "segment {} appended out of order, expected {}",
                segment.order_index, self.segments
            )));
        }
        self.bytes.extend_from_slice(&segment.bytes);
        self.segments += 1;
        Ok(())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of segments appended so far
    #[must_use]
    pub const fn segment_count(&self) -> usize {
        self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_in_call_order() {
        let mut buffer = AudioBuffer::new();
        buffer
            .append(AudioSegment { bytes: vec![1, 2], order_index: 0 })
            .unwrap();
        buffer
            .append(AudioSegment { bytes: vec![3], order_index: 1 })
            .unwrap();

        assert_eq!(buffer.as_bytes(), &[1, 2, 3]);
        assert_eq!(buffer.segment_count(), 2);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn rejects_out_of_order_segment() {
        let mut buffer = AudioBuffer::new();
        let err = buffer
            .append(AudioSegment { bytes: vec![9], order_index: 1 })
            .unwrap_err();

        assert!(matches!(err, Error::Audio(_)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn empty_buffer_has_no_segments() {
        let buffer = AudioBuffer::default();
        assert!(buffer.is_empty());
        assert_eq!(buffer.segment_count(), 0);
    }
}
