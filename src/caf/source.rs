//! CAF source file reading

use std::io;
use std::path::Path;

use log::debug;

use super::chunk::Cursor;
use super::{CAF_MAGIC, CAF_VERSION, CHUNK_CHAN, CHUNK_DATA, CHUNK_DESC, CHUNK_KUKI, CHUNK_PAKT};
use crate::error::{ConvertError, PropertyError};
use crate::file::{AudioFileSource, ReadPackets};
use crate::format::{ChannelLayout, PacketDescription, StreamFormat};
use crate::fourcc::FourCc;

/// one packet's placement in the data section
#[derive(Debug, Clone, Copy)]
struct PacketEntry {
    offset: u64,
    size: u32,
    frames: u32,
}

/// a parsed CAF file open for packet reads
pub struct CafSource {
    format: StreamFormat,
    cookie: Option<Vec<u8>>,
    layout: Option<ChannelLayout>,
    data: Vec<u8>,
    /// per-packet table, present iff the format is VBR in bytes or frames
    packet_table: Option<Vec<PacketEntry>>,
    max_packet_size: u32,
}

impl CafSource {
    /// open and parse a CAF file
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        let bytes = std::fs::read(path).map_err(|source| ConvertError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&bytes).map_err(|msg| ConvertError::FileOpen {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, msg),
        })
    }

    fn parse(bytes: &[u8]) -> Result<Self, String> {
        let mut cursor = Cursor::new(bytes);

        if cursor.read_bytes(4)? != CAF_MAGIC {
            return Err("not a CAF file: bad magic".to_string());
        }
        if cursor.read_u16_be()? != CAF_VERSION {
            return Err("unsupported CAF version".to_string());
        }
        cursor.read_u16_be()?; // file flags

        let mut format: Option<StreamFormat> = None;
        let mut cookie: Option<Vec<u8>> = None;
        let mut layout: Option<ChannelLayout> = None;
        let mut data: Option<Vec<u8>> = None;
        let mut pakt_chunk: Option<Vec<u8>> = None;

        while cursor.remaining() >= 12 {
            let chunk_type: [u8; 4] = cursor.read_bytes(4)?.try_into().unwrap();
            let declared = cursor.read_i64_be()?;

            // only the last chunk may run to end-of-file
            let size = if declared < 0 {
                cursor.remaining()
            } else {
                declared as usize
            };

            match chunk_type {
                CHUNK_DESC => format = Some(read_desc(cursor.read_bytes(size)?)?),
                CHUNK_KUKI => cookie = Some(cursor.read_bytes(size)?.to_vec()),
                CHUNK_CHAN => {
                    let mut chan = Cursor::new(cursor.read_bytes(size)?);
                    layout = Some(ChannelLayout {
                        layout_tag: chan.read_u32_be()?,
                        channel_bitmap: chan.read_u32_be()?,
                    });
                }
                CHUNK_PAKT => pakt_chunk = Some(cursor.read_bytes(size)?.to_vec()),
                CHUNK_DATA => {
                    let mut body = Cursor::new(cursor.read_bytes(size)?);
                    body.read_u32_be()?; // edit count
                    data = Some(body.read_bytes(body.remaining())?.to_vec());
                }
                _ => cursor.skip(size)?,
            }
        }

        let format = format.ok_or("CAF file has no desc chunk")?;
        let data = data.ok_or("CAF file has no data chunk")?;

        // only formats with variable packet sizes or frame counts need the
        // table; for fully constant-rate data a pakt chunk carries nothing
        let table_needed = format.is_vbr() || format.frames_per_packet == 0;
        let packet_table = match pakt_chunk {
            Some(chunk) if table_needed => {
                Some(read_packet_table(&chunk, &format, data.len())?)
            }
            None if format.is_vbr() => {
                return Err("VBR CAF file has no packet table".to_string());
            }
            _ => None,
        };

        let max_packet_size = packet_table
            .as_ref()
            .map(|table| table.iter().map(|p| p.size).max().unwrap_or(0))
            .unwrap_or(format.bytes_per_packet);

        debug!(
            "opened CAF source: {}, {} data bytes, packet table: {}",
            format,
            data.len(),
            packet_table.is_some()
        );

        Ok(CafSource {
            format,
            cookie,
            layout,
            data,
            packet_table,
            max_packet_size,
        })
    }

    fn cbr_packet_count(&self) -> u64 {
        self.data.len() as u64 / self.format.bytes_per_packet as u64
    }
}

fn read_desc(bytes: &[u8]) -> Result<StreamFormat, String> {
    let mut cursor = Cursor::new(bytes);
    let sample_rate = cursor.read_f64_be()?;
    let format_id = FourCc(cursor.read_bytes(4)?.try_into().unwrap());
    let format_flags = cursor.read_u32_be()?;
    let bytes_per_packet = cursor.read_u32_be()?;
    let frames_per_packet = cursor.read_u32_be()?;
    let channels_per_frame = cursor.read_u32_be()?;
    let bits_per_channel = cursor.read_u32_be()?;

    if channels_per_frame == 0 {
        return Err("desc chunk declares zero channels".to_string());
    }

    // the container stores no bytes-per-frame; derive it for CBR formats
    let bytes_per_frame = if bytes_per_packet > 0 && frames_per_packet > 0 {
        bytes_per_packet / frames_per_packet
    } else {
        0
    };

    Ok(StreamFormat {
        sample_rate,
        format_id,
        format_flags,
        bytes_per_packet,
        frames_per_packet,
        bytes_per_frame,
        channels_per_frame,
        bits_per_channel,
    })
}

fn read_packet_table(
    chunk: &[u8],
    format: &StreamFormat,
    data_len: usize,
) -> Result<Vec<PacketEntry>, String> {
    let mut cursor = Cursor::new(chunk);
    let packet_count = cursor.read_i64_be()?;
    cursor.read_i64_be()?; // valid frames
    cursor.read_i32_be()?; // priming frames
    cursor.read_i32_be()?; // remainder frames

    if packet_count < 0 {
        return Err("packet table declares negative packet count".to_string());
    }
    // every entry encodes at least one table byte, so a count beyond the
    // chunk's remaining bytes cannot be real; checked before allocating
    if packet_count as u64 > cursor.remaining() as u64 {
        return Err("packet table declares more packets than it holds".to_string());
    }

    let mut entries = Vec::with_capacity(packet_count as usize);
    let mut offset: u64 = 0;
    for _ in 0..packet_count {
        let size = if format.bytes_per_packet == 0 {
            cursor.read_vlq()? as u32
        } else {
            format.bytes_per_packet
        };
        let frames = if format.frames_per_packet == 0 {
            cursor.read_vlq()? as u32
        } else {
            format.frames_per_packet
        };
        // each packet must lie inside the data section
        let end = offset
            .checked_add(size as u64)
            .filter(|&end| end <= data_len as u64)
            .ok_or_else(|| "packet table entry extends past the data section".to_string())?;
        entries.push(PacketEntry {
            offset,
            size,
            frames,
        });
        offset = end;
    }

    Ok(entries)
}

impl AudioFileSource for CafSource {
    fn data_format(&self) -> Result<StreamFormat, PropertyError> {
        Ok(self.format)
    }

    fn magic_cookie(&self) -> Result<Vec<u8>, PropertyError> {
        self.cookie.clone().ok_or(PropertyError::NotSupported)
    }

    fn channel_layout(&self) -> Result<ChannelLayout, PropertyError> {
        self.layout.clone().ok_or(PropertyError::NotSupported)
    }

    fn packet_size_upper_bound(&self) -> Result<u32, PropertyError> {
        if self.max_packet_size == 0 {
            return Err(PropertyError::NotSupported);
        }
        Ok(self.max_packet_size)
    }

    fn packet_count(&self) -> Result<u64, PropertyError> {
        match &self.packet_table {
            Some(table) => Ok(table.len() as u64),
            None => Ok(self.cbr_packet_count()),
        }
    }

    fn read_packets(
        &mut self,
        position: u64,
        max_packets: u32,
        buf: &mut [u8],
        descriptions: &mut Vec<PacketDescription>,
    ) -> Result<ReadPackets, PropertyError> {
        match &self.packet_table {
            None => {
                // CBR: plain arithmetic on the data section
                let bpp = self.format.bytes_per_packet as u64;
                let total = self.cbr_packet_count();
                if position >= total {
                    return Ok(ReadPackets::default()); // end of file
                }
                let available = (total - position).min(max_packets as u64);
                let fit = (buf.len() as u64 / bpp).min(available);
                let start = (position * bpp) as usize;
                let bytes = (fit * bpp) as usize;
                buf[..bytes].copy_from_slice(&self.data[start..start + bytes]);
                Ok(ReadPackets {
                    packets: fit as u32,
                    bytes: bytes as u32,
                })
            }
            Some(table) => {
                // VBR: walk the packet table, stop when the buffer is full
                let mut packets = 0u32;
                let mut filled = 0usize;
                for entry in table.iter().skip(position as usize) {
                    if packets >= max_packets {
                        break;
                    }
                    let size = entry.size as usize;
                    if filled + size > buf.len() {
                        break;
                    }
                    let start = entry.offset as usize;
                    buf[filled..filled + size].copy_from_slice(&self.data[start..start + size]);
                    descriptions.push(PacketDescription {
                        start_offset: filled as u64,
                        data_byte_size: entry.size,
                        variable_frames_in_packet: if self.format.frames_per_packet == 0 {
                            entry.frames
                        } else {
                            0
                        },
                    });
                    filled += size;
                    packets += 1;
                }
                Ok(ReadPackets {
                    packets,
                    bytes: filled as u32,
                })
            }
        }
    }
}
