//! packet source reader: the converter's input pull callback

use log::{debug, trace};

use crate::converter::{InputBatch, PacketPull};
use crate::error::ConvertStatus;
use crate::file::AudioFileSource;
use crate::format::{PacketDescription, StreamFormat};

/// pulls fixed-size batches of encoded packets from the source file
///
/// Owns the read scratch buffer and the file-relative packet cursor; the
/// cursor only ever advances, by however many packets the last read actually
/// returned. End-of-file is a zero-or-partial result, never an error.
pub struct SourceReader<'a> {
    source: &'a mut dyn AudioFileSource,
    format: StreamFormat,
    /// absolute packet position in the source file
    position: u64,
    buffer: Vec<u8>,
    /// largest packet the buffer must hold; `bytes_per_packet` for CBR,
    /// the file's upper bound for VBR
    size_per_packet: u32,
    descriptions: Vec<PacketDescription>,
}

impl<'a> SourceReader<'a> {
    /// set up a reader with a fixed-capacity scratch buffer
    ///
    /// `size_per_packet` must already account for VBR (packet size upper
    /// bound) vs CBR (`bytes_per_packet`).
    pub fn new(
        source: &'a mut dyn AudioFileSource,
        format: StreamFormat,
        buffer_capacity: u32,
        size_per_packet: u32,
    ) -> Self {
        let packets_per_read = buffer_capacity / size_per_packet;
        SourceReader {
            source,
            format,
            position: 0,
            buffer: vec![0u8; buffer_capacity as usize],
            size_per_packet,
            descriptions: Vec::with_capacity(if format.is_vbr() {
                packets_per_read as usize
            } else {
                0
            }),
        }
    }

    /// packets the scratch buffer can hold per read
    pub fn packets_per_read(&self) -> u32 {
        self.buffer.len() as u32 / self.size_per_packet
    }

    /// current absolute packet position
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl PacketPull for SourceReader<'_> {
    fn pull(&mut self, want: u32) -> Result<InputBatch<'_>, ConvertStatus> {
        // clamp the request to what the scratch buffer can hold
        let max_packets = self.packets_per_read();
        let ask = want.min(max_packets);

        self.descriptions.clear();
        let read = self
            .source
            .read_packets(self.position, ask, &mut self.buffer, &mut self.descriptions)
            .map_err(|e| ConvertStatus::InputFailed(e.to_string()))?;

        trace!(
            "input pull: read {} packets at position {}, size {}",
            read.packets,
            self.position,
            read.bytes
        );
        if read.packets == 0 {
            debug!("input pull: source exhausted at packet {}", self.position);
        }

        // advance input file packet position
        self.position += read.packets as u64;

        Ok(InputBatch {
            bytes: &self.buffer[..read.bytes as usize],
            packets: read.packets,
            channels: self.format.channels_per_frame,
            descriptions: if self.format.is_vbr() {
                Some(&self.descriptions[..read.packets as usize])
            } else {
                None
            },
        })
    }
}
