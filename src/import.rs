//! non-CAF source import via symphonia
//!
//! Any container and codec symphonia can probe (WAV, MP3, FLAC, Ogg Vorbis,
//! AAC in MP4) is decoded up front into interleaved f32 frames and then
//! served through the packet-read interface as linear PCM. The magic cookie,
//! channel layout and packet-size upper bound are all properties of the
//! original encoded stream and are gone after decode, so they report
//! unsupported.

use std::io;
use std::path::Path;

use log::debug;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{ConvertError, PropertyError};
use crate::file::{AudioFileSource, ReadPackets};
use crate::format::{
    ChannelLayout, PacketDescription, StreamFormat, FORMAT_LPCM, LPCM_FLAG_IS_FLOAT,
    LPCM_FLAG_IS_PACKED,
};

/// a decoded non-CAF source, served as linear PCM
pub struct ImportSource {
    format: StreamFormat,
    /// interleaved samples in [-1.0, 1.0]
    samples: Vec<f32>,
}

impl ImportSource {
    /// probe, decode and buffer an audio file
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        let file = std::fs::File::open(path).map_err(|source| ConvertError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        Self::decode(mss, path.extension().and_then(|e| e.to_str())).map_err(|msg| {
            ConvertError::FileOpen {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidData, msg),
            }
        })
    }

    fn decode(mss: MediaSourceStream, extension: Option<&str>) -> Result<Self, String> {
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| format!("unsupported audio format: {}", e))?;
        let mut container = probed.format;

        let track = container
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or("no audio track found")?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or("unknown sample rate")?;
        let channels = track
            .codec_params
            .channels
            .ok_or("unknown channel count")?
            .count();

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| format!("failed to create decoder: {}", e))?;

        let mut samples = Vec::new();
        loop {
            let packet = match container.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(format!("error reading packet: {}", e)),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // corrupt packets are skippable, the decoder resynchronizes
                Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                Err(e) => return Err(format!("error decoding packet: {}", e)),
            };
            append_samples(&decoded, &mut samples, channels);
        }

        let channels = channels as u32;
        let format = StreamFormat {
            sample_rate: sample_rate as f64,
            format_id: FORMAT_LPCM,
            format_flags: LPCM_FLAG_IS_FLOAT | LPCM_FLAG_IS_PACKED,
            bytes_per_packet: 4 * channels,
            frames_per_packet: 1,
            bytes_per_frame: 4 * channels,
            channels_per_frame: channels,
            bits_per_channel: 32,
        };

        debug!(
            "imported source: {}, {} frames",
            format,
            samples.len() as u64 / channels as u64
        );

        Ok(ImportSource { format, samples })
    }

    fn frame_count(&self) -> u64 {
        self.samples.len() as u64 / self.format.channels_per_frame as u64
    }
}

fn append_samples(buffer: &AudioBufferRef, samples: &mut Vec<f32>, channels: usize) {
    match buffer {
        AudioBufferRef::F32(buf) => {
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    samples.push(buf.chan(ch)[frame]);
                }
            }
        }
        AudioBufferRef::S16(buf) => {
            let scale = 1.0 / 32768.0;
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    samples.push(buf.chan(ch)[frame] as f32 * scale);
                }
            }
        }
        AudioBufferRef::S32(buf) => {
            let scale = 1.0 / 2147483648.0;
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    samples.push(buf.chan(ch)[frame] as f32 * scale);
                }
            }
        }
        AudioBufferRef::U8(buf) => {
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    samples.push((buf.chan(ch)[frame] as f32 - 128.0) / 128.0);
                }
            }
        }
        _ => {}
    }
}

impl AudioFileSource for ImportSource {
    fn data_format(&self) -> Result<StreamFormat, PropertyError> {
        Ok(self.format)
    }

    fn magic_cookie(&self) -> Result<Vec<u8>, PropertyError> {
        Err(PropertyError::NotSupported)
    }

    fn channel_layout(&self) -> Result<ChannelLayout, PropertyError> {
        Err(PropertyError::NotSupported)
    }

    fn packet_size_upper_bound(&self) -> Result<u32, PropertyError> {
        Ok(self.format.bytes_per_packet)
    }

    fn packet_count(&self) -> Result<u64, PropertyError> {
        Ok(self.frame_count())
    }

    fn read_packets(
        &mut self,
        position: u64,
        max_packets: u32,
        buf: &mut [u8],
        _descriptions: &mut Vec<PacketDescription>,
    ) -> Result<ReadPackets, PropertyError> {
        let bpp = self.format.bytes_per_packet as u64;
        let total = self.frame_count();
        if position >= total {
            return Ok(ReadPackets::default()); // end of file
        }
        let available = (total - position).min(max_packets as u64);
        let fit = (buf.len() as u64 / bpp).min(available);

        let channels = self.format.channels_per_frame as usize;
        let start = position as usize * channels;
        let count = fit as usize * channels;
        let mut filled = 0usize;
        for sample in &self.samples[start..start + count] {
            buf[filled..filled + 4].copy_from_slice(&sample.to_le_bytes());
            filled += 4;
        }

        Ok(ReadPackets {
            packets: fit as u32,
            bytes: filled as u32,
        })
    }
}
