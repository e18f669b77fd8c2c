//! packet sink writer: appends produced batches to the destination file

use log::trace;

use crate::error::ConvertError;
use crate::file::AudioFileSink;
use crate::format::{PacketDescription, StreamFormat};

/// appends output batches at the running destination packet offset
///
/// Accumulates the total output frame count needed for priming finalization:
/// constant-frames-per-packet formats multiply, variable formats sum each
/// packet's own frame count from its description.
pub struct SinkWriter<'a> {
    sink: &'a mut dyn AudioFileSink,
    format: StreamFormat,
    /// absolute packet position in the destination file
    position: u64,
    total_frames: u64,
    total_bytes: u64,
}

impl<'a> SinkWriter<'a> {
    pub fn new(sink: &'a mut dyn AudioFileSink, format: StreamFormat) -> Self {
        SinkWriter {
            sink,
            format,
            position: 0,
            total_frames: 0,
            total_bytes: 0,
        }
    }

    /// write one produced batch; advances the sink cursor by `packets`
    pub fn write_batch(
        &mut self,
        bytes: &[u8],
        descriptions: &[PacketDescription],
        packets: u32,
    ) -> Result<(), ConvertError> {
        self.sink
            .write_packets(self.position, bytes, descriptions, packets)
            .map_err(|e| ConvertError::Write(e.to_string()))?;

        trace!(
            "output: wrote {} packets at position {}, size {}",
            packets,
            self.position,
            bytes.len()
        );

        self.position += packets as u64;
        self.total_bytes += bytes.len() as u64;

        if self.format.frames_per_packet != 0 {
            self.total_frames += packets as u64 * self.format.frames_per_packet as u64;
        } else {
            for desc in descriptions {
                self.total_frames += desc.variable_frames_in_packet as u64;
            }
        }

        Ok(())
    }

    /// packets written so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// frames written so far
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// bytes written so far
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
