//! CAF destination file writing
//!
//! Audio data streams straight to disk; the data chunk is opened with the
//! "extends to end-of-file" size marker and patched at finalize, after which
//! the side-information chunks (`kuki`, `chan`, `pakt`) are appended from
//! the metadata accumulated during the conversion.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use super::chunk::write_vlq;
use super::{CAF_MAGIC, CAF_VERSION, CHUNK_CHAN, CHUNK_DATA, CHUNK_DESC, CHUNK_KUKI, CHUNK_PAKT};
use crate::error::{ConvertError, PropertyError};
use crate::file::AudioFileSink;
use crate::format::{ChannelLayout, PacketDescription, PacketTableInfo, StreamFormat};

/// byte position of the data chunk's size field:
/// 8 (magic/version/flags) + 12 (desc header) + 32 (desc body) + 4 (type)
const DATA_SIZE_FIELD_POS: u64 = 8 + 12 + 32 + 4;

/// a CAF file being written packet by packet
pub struct CafSink {
    file: File,
    format: StreamFormat,
    cookie: Option<Vec<u8>>,
    layout: Option<ChannelLayout>,
    /// per-packet byte sizes, tracked for VBR formats
    packet_sizes: Vec<u32>,
    /// per-packet frame counts, tracked for variable-frames formats
    packet_frames: Vec<u32>,
    packets_written: u64,
    frames_written: u64,
    data_bytes: u64,
    table_override: Option<PacketTableInfo>,
    finalized: bool,
}

impl CafSink {
    /// create the destination file and write the container preamble
    pub fn create(path: &Path, format: &StreamFormat) -> Result<Self, ConvertError> {
        let mut file = File::create(path).map_err(|source| ConvertError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let mut preamble = Vec::with_capacity(72);
        preamble.extend_from_slice(&CAF_MAGIC);
        preamble.extend_from_slice(&CAF_VERSION.to_be_bytes());
        preamble.extend_from_slice(&0u16.to_be_bytes()); // file flags

        // desc chunk
        preamble.extend_from_slice(&CHUNK_DESC);
        preamble.extend_from_slice(&32i64.to_be_bytes());
        preamble.extend_from_slice(&format.sample_rate.to_be_bytes());
        preamble.extend_from_slice(&format.format_id.bytes());
        preamble.extend_from_slice(&format.format_flags.to_be_bytes());
        preamble.extend_from_slice(&format.bytes_per_packet.to_be_bytes());
        preamble.extend_from_slice(&format.frames_per_packet.to_be_bytes());
        preamble.extend_from_slice(&format.channels_per_frame.to_be_bytes());
        preamble.extend_from_slice(&format.bits_per_channel.to_be_bytes());

        // data chunk, size patched at finalize; only the last chunk may
        // carry the to-end-of-file marker, so side chunks wait until then
        preamble.extend_from_slice(&CHUNK_DATA);
        preamble.extend_from_slice(&(-1i64).to_be_bytes());
        preamble.extend_from_slice(&0u32.to_be_bytes()); // edit count

        file.write_all(&preamble)
            .map_err(|e| ConvertError::Write(e.to_string()))?;

        Ok(CafSink {
            file,
            format: *format,
            cookie: None,
            layout: None,
            packet_sizes: Vec::new(),
            packet_frames: Vec::new(),
            packets_written: 0,
            frames_written: 0,
            data_bytes: 0,
            table_override: None,
            finalized: false,
        })
    }

    /// does this format need a packet table chunk at all?
    fn has_packet_table(&self) -> bool {
        self.format.is_vbr() || self.format.frames_per_packet == 0 || self.format.is_compressed()
    }

    fn build_pakt_chunk(&self) -> Vec<u8> {
        let info = self.table_override.unwrap_or(PacketTableInfo {
            valid_frames: self.frames_written as i64,
            priming_frames: 0,
            remainder_frames: 0,
        });

        let mut body = Vec::new();
        body.extend_from_slice(&(self.packets_written as i64).to_be_bytes());
        body.extend_from_slice(&info.valid_frames.to_be_bytes());
        body.extend_from_slice(&info.priming_frames.to_be_bytes());
        body.extend_from_slice(&info.remainder_frames.to_be_bytes());
        for i in 0..self.packets_written as usize {
            if self.format.is_vbr() {
                write_vlq(&mut body, self.packet_sizes[i] as u64);
            }
            if self.format.frames_per_packet == 0 {
                write_vlq(&mut body, self.packet_frames[i] as u64);
            }
        }
        body
    }
}

impl AudioFileSink for CafSink {
    fn data_format(&self) -> Result<StreamFormat, PropertyError> {
        Ok(self.format)
    }

    fn write_packets(
        &mut self,
        position: u64,
        bytes: &[u8],
        descriptions: &[PacketDescription],
        packets: u32,
    ) -> Result<(), PropertyError> {
        if self.finalized {
            return Err(PropertyError::Failed("file already finalized".to_string()));
        }
        // the data chunk streams; only append-at-cursor writes are possible
        if position != self.packets_written {
            return Err(PropertyError::Failed(format!(
                "non-sequential write at packet {} (expected {})",
                position, self.packets_written
            )));
        }
        if self.format.is_vbr() && descriptions.len() != packets as usize {
            return Err(PropertyError::InvalidValue(
                "VBR write without matching packet descriptions".to_string(),
            ));
        }

        self.file
            .write_all(bytes)
            .map_err(|e| PropertyError::Failed(e.to_string()))?;

        if self.format.is_vbr() {
            for desc in descriptions {
                self.packet_sizes.push(desc.data_byte_size);
            }
        }
        if self.format.frames_per_packet == 0 {
            for desc in descriptions {
                self.packet_frames.push(desc.variable_frames_in_packet);
                self.frames_written += desc.variable_frames_in_packet as u64;
            }
        } else {
            self.frames_written += packets as u64 * self.format.frames_per_packet as u64;
        }

        self.packets_written += packets as u64;
        self.data_bytes += bytes.len() as u64;
        Ok(())
    }

    fn set_magic_cookie(&mut self, cookie: &[u8]) -> Result<(), PropertyError> {
        self.cookie = Some(cookie.to_vec());
        Ok(())
    }

    fn set_channel_layout(&mut self, layout: &ChannelLayout) -> Result<(), PropertyError> {
        self.layout = Some(layout.clone());
        Ok(())
    }

    fn packet_table_info(&self) -> Result<PacketTableInfo, PropertyError> {
        if !self.has_packet_table() {
            return Err(PropertyError::NotSupported);
        }
        Ok(self.table_override.unwrap_or(PacketTableInfo {
            valid_frames: self.frames_written as i64,
            priming_frames: 0,
            remainder_frames: 0,
        }))
    }

    fn set_packet_table_info(&mut self, info: PacketTableInfo) -> Result<(), PropertyError> {
        if !self.has_packet_table() {
            return Err(PropertyError::NotSupported);
        }
        self.table_override = Some(info);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), PropertyError> {
        if self.finalized {
            return Ok(());
        }

        let io = |e: std::io::Error| PropertyError::Failed(e.to_string());

        // patch the data chunk size now that it is known
        let data_size = 4 + self.data_bytes as i64; // edit count + audio data
        self.file.seek(SeekFrom::Start(DATA_SIZE_FIELD_POS)).map_err(io)?;
        self.file.write_all(&data_size.to_be_bytes()).map_err(io)?;
        self.file.seek(SeekFrom::End(0)).map_err(io)?;

        // trailing side-information chunks
        if let Some(cookie) = &self.cookie {
            let mut chunk = Vec::with_capacity(12 + cookie.len());
            chunk.extend_from_slice(&CHUNK_KUKI);
            chunk.extend_from_slice(&(cookie.len() as i64).to_be_bytes());
            chunk.extend_from_slice(cookie);
            self.file.write_all(&chunk).map_err(io)?;
        }

        if let Some(layout) = &self.layout {
            let mut chunk = Vec::with_capacity(24);
            chunk.extend_from_slice(&CHUNK_CHAN);
            chunk.extend_from_slice(&12i64.to_be_bytes());
            chunk.extend_from_slice(&layout.layout_tag.to_be_bytes());
            chunk.extend_from_slice(&layout.channel_bitmap.to_be_bytes());
            chunk.extend_from_slice(&0u32.to_be_bytes()); // no descriptions
            self.file.write_all(&chunk).map_err(io)?;
        }

        if self.has_packet_table() {
            let body = self.build_pakt_chunk();
            let mut chunk = Vec::with_capacity(12 + body.len());
            chunk.extend_from_slice(&CHUNK_PAKT);
            chunk.extend_from_slice(&(body.len() as i64).to_be_bytes());
            chunk.extend_from_slice(&body);
            self.file.write_all(&chunk).map_err(io)?;
        }

        self.file.flush().map_err(io)?;
        self.finalized = true;

        debug!(
            "finalized CAF destination: {} packets, {} frames, {} data bytes",
            self.packets_written, self.frames_written, self.data_bytes
        );
        Ok(())
    }
}
