//! stream formats, packet descriptions and packet-table metadata

use crate::fourcc::FourCc;

// format identifiers

/// linear PCM
pub const FORMAT_LPCM: FourCc = FourCc::new(b"lpcm");
/// MPEG-4 AAC
pub const FORMAT_AAC: FourCc = FourCc::new(b"aac ");
/// Apple Lossless
pub const FORMAT_ALAC: FourCc = FourCc::new(b"alac");
/// iLBC narrowband speech, always mono
pub const FORMAT_ILBC: FourCc = FourCc::new(b"ilbc");
/// IMA 4:1 ADPCM
pub const FORMAT_IMA4: FourCc = FourCc::new(b"ima4");

// lpcm format flags

pub const LPCM_FLAG_IS_FLOAT: u32 = 1 << 0;
pub const LPCM_FLAG_IS_BIG_ENDIAN: u32 = 1 << 1;
pub const LPCM_FLAG_IS_SIGNED_INTEGER: u32 = 1 << 2;
pub const LPCM_FLAG_IS_PACKED: u32 = 1 << 3;

/// description of one stream of encoded or linear audio
///
/// `bytes_per_packet == 0` marks a variable-bit-rate stream; VBR packets
/// carry their sizes in explicit [`PacketDescription`]s instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub format_id: FourCc,
    pub format_flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl StreamFormat {
    /// a 16-bit signed packed little-endian PCM description
    ///
    /// This is the shape the orchestrator synthesizes whenever the requested
    /// output format is uncompressed.
    pub fn pcm_int16(sample_rate: f64, channels: u32) -> Self {
        StreamFormat {
            sample_rate,
            format_id: FORMAT_LPCM,
            format_flags: LPCM_FLAG_IS_SIGNED_INTEGER | LPCM_FLAG_IS_PACKED,
            bytes_per_packet: 2 * channels,
            frames_per_packet: 1,
            bytes_per_frame: 2 * channels,
            channels_per_frame: channels,
            bits_per_channel: 16,
        }
    }

    /// is this variable-bit-rate? (packet sizes carried out-of-band)
    pub fn is_vbr(&self) -> bool {
        self.bytes_per_packet == 0
    }

    /// is this uncompressed linear PCM?
    pub fn is_pcm(&self) -> bool {
        self.format_id == FORMAT_LPCM
    }

    /// is this a compressed format? (mirrors `mBitsPerChannel == 0`)
    pub fn is_compressed(&self) -> bool {
        self.bits_per_channel == 0
    }
}

impl std::fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} Hz, {} ch, {} bits, {} bytes/packet, {} frames/packet",
            self.format_id,
            self.sample_rate,
            self.channels_per_frame,
            self.bits_per_channel,
            self.bytes_per_packet,
            self.frames_per_packet,
        )
    }
}

/// placement of one encoded packet inside a buffer
///
/// Produced by the source reader per read call, consumed by the converter
/// for the duration of one fill, discarded once the batch is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketDescription {
    /// byte offset of the packet within its buffer
    pub start_offset: u64,
    /// packet length in bytes
    pub data_byte_size: u32,
    /// frames in this packet, only set for variable-frames-per-packet formats
    pub variable_frames_in_packet: u32,
}

/// leading/trailing frame counts introduced by an encoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimingInfo {
    pub leading_frames: u32,
    pub trailing_frames: u32,
}

/// packet-table metadata of a destination file
///
/// `valid_frames + priming_frames + remainder_frames` equals the total frame
/// count of all packets in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketTableInfo {
    pub valid_frames: i64,
    pub priming_frames: i32,
    pub remainder_frames: i32,
}

/// speaker layout, written to the destination for more-than-stereo streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    /// layout tag (a format-defined code; `(channels << 16) | 0xFFFF` style
    /// tags pass through untouched)
    pub layout_tag: u32,
    pub channel_bitmap: u32,
}
