//! built-in linear PCM converter
//!
//! Converts any supported LPCM sample layout to the synthesized 16-bit
//! signed packed little-endian output, resampling by linear interpolation
//! when the rates differ. Channel counts must match; mixing is out of
//! scope. A software codec through and through: the resumability property
//! is unsupported, which callers read as "always resumable".

use crate::converter::{AudioConverter, ConverterFactory, FillResult, PacketPull};
use crate::error::{ConvertStatus, PropertyError};
use crate::format::{
    PacketDescription, StreamFormat, LPCM_FLAG_IS_BIG_ENDIAN, LPCM_FLAG_IS_FLOAT,
    LPCM_FLAG_IS_SIGNED_INTEGER,
};

/// input packets requested per internal pull; the reader clamps this to its
/// own buffer capacity
const PULL_PACKETS: u32 = 8192;

/// factory for LPCM destinations
pub struct PcmConverterFactory;

impl ConverterFactory for PcmConverterFactory {
    fn resolve_format(&self, partial: &StreamFormat) -> Option<StreamFormat> {
        if partial.sample_rate <= 0.0 || partial.channels_per_frame == 0 {
            return None;
        }
        Some(StreamFormat::pcm_int16(
            partial.sample_rate,
            partial.channels_per_frame,
        ))
    }

    fn make(
        &self,
        input: &StreamFormat,
        output: &StreamFormat,
    ) -> Result<Box<dyn AudioConverter>, String> {
        PcmConverter::new(input, output).map(|c| Box::new(c) as Box<dyn AudioConverter>)
    }
}

/// how to decode one input sample to f32
#[derive(Debug, Clone, Copy)]
enum SampleCodec {
    U8,
    I16 { big_endian: bool },
    I24 { big_endian: bool },
    I32 { big_endian: bool },
    F32 { big_endian: bool },
}

impl SampleCodec {
    fn for_format(format: &StreamFormat) -> Result<Self, String> {
        let big_endian = format.format_flags & LPCM_FLAG_IS_BIG_ENDIAN != 0;
        let is_float = format.format_flags & LPCM_FLAG_IS_FLOAT != 0;
        let is_signed = format.format_flags & LPCM_FLAG_IS_SIGNED_INTEGER != 0;

        match (is_float, is_signed, format.bits_per_channel) {
            (true, _, 32) => Ok(SampleCodec::F32 { big_endian }),
            (false, true, 16) => Ok(SampleCodec::I16 { big_endian }),
            (false, true, 24) => Ok(SampleCodec::I24 { big_endian }),
            (false, true, 32) => Ok(SampleCodec::I32 { big_endian }),
            (false, false, 8) => Ok(SampleCodec::U8),
            _ => Err(format!(
                "unsupported PCM sample layout: {} bits, flags {:#x}",
                format.bits_per_channel, format.format_flags
            )),
        }
    }

    fn bytes_per_sample(self) -> usize {
        match self {
            SampleCodec::U8 => 1,
            SampleCodec::I16 { .. } => 2,
            SampleCodec::I24 { .. } => 3,
            SampleCodec::I32 { .. } | SampleCodec::F32 { .. } => 4,
        }
    }

    fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            SampleCodec::U8 => (bytes[0] as f32 - 128.0) / 128.0,
            SampleCodec::I16 { big_endian } => {
                let v = if big_endian {
                    i16::from_be_bytes([bytes[0], bytes[1]])
                } else {
                    i16::from_le_bytes([bytes[0], bytes[1]])
                };
                v as f32 / 32768.0
            }
            SampleCodec::I24 { big_endian } => {
                let v = if big_endian {
                    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], 0]) >> 8
                } else {
                    i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8
                };
                v as f32 / 8_388_608.0
            }
            SampleCodec::I32 { big_endian } => {
                let v = if big_endian {
                    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                } else {
                    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                };
                v as f32 / 2_147_483_648.0
            }
            SampleCodec::F32 { big_endian } => {
                if big_endian {
                    f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                } else {
                    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                }
            }
        }
    }
}

/// encode one f32 sample as 16-bit signed little-endian
///
/// The scale matches the decoder (divide by 32768), so a 16-bit round trip
/// is value-preserving.
fn encode_i16(sample: f32) -> [u8; 2] {
    let v = (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
    v.to_le_bytes()
}

/// LPCM to 16-bit LPCM converter with linear-interpolation resampling
pub struct PcmConverter {
    input: StreamFormat,
    output: StreamFormat,
    codec: SampleCodec,
    /// input frames consumed per output frame
    ratio: f64,
    /// interleaved input samples, decoded to f32
    fifo: Vec<f32>,
    /// absolute input frame index of `fifo[0]`
    fifo_start: u64,
    /// absolute fractional input position of the next output frame
    next_pos: f64,
    input_done: bool,
}

impl PcmConverter {
    pub fn new(input: &StreamFormat, output: &StreamFormat) -> Result<Self, String> {
        if !input.is_pcm() {
            return Err(format!("input format {} is not linear PCM", input.format_id));
        }
        if !output.is_pcm() || output.bits_per_channel != 16 {
            return Err("only 16-bit signed PCM output is supported".to_string());
        }
        if output.format_flags & (LPCM_FLAG_IS_FLOAT | LPCM_FLAG_IS_BIG_ENDIAN) != 0 {
            return Err("only packed little-endian integer output is supported".to_string());
        }
        if input.channels_per_frame != output.channels_per_frame {
            return Err(format!(
                "channel count mismatch: {} in, {} out",
                input.channels_per_frame, output.channels_per_frame
            ));
        }
        if input.sample_rate <= 0.0 || output.sample_rate <= 0.0 {
            return Err("sample rates must be positive".to_string());
        }

        let codec = SampleCodec::for_format(input)?;
        let expected_frame = codec.bytes_per_sample() as u32 * input.channels_per_frame;
        if input.bytes_per_frame != expected_frame {
            return Err(format!(
                "input bytes per frame {} does not match sample layout ({} expected)",
                input.bytes_per_frame, expected_frame
            ));
        }

        Ok(PcmConverter {
            input: *input,
            output: *output,
            codec,
            ratio: input.sample_rate / output.sample_rate,
            fifo: Vec::new(),
            fifo_start: 0,
            next_pos: 0.0,
            input_done: false,
        })
    }

    fn channels(&self) -> usize {
        self.output.channels_per_frame as usize
    }

    fn fifo_frames(&self) -> u64 {
        (self.fifo.len() / self.channels()) as u64
    }

    /// decode one pulled batch into the fifo
    fn ingest(&mut self, bytes: &[u8]) {
        let step = self.codec.bytes_per_sample();
        for sample in bytes.chunks_exact(step) {
            self.fifo.push(self.codec.decode(sample));
        }
    }

    /// drop fifo frames that the resampler can no longer reference
    fn trim(&mut self) {
        let keep_from = self.next_pos.floor() as u64;
        if keep_from > self.fifo_start {
            let drop_frames = (keep_from - self.fifo_start) as usize;
            let drop_samples = (drop_frames * self.channels()).min(self.fifo.len());
            self.fifo.drain(..drop_samples);
            self.fifo_start += (drop_samples / self.channels()) as u64;
        }
    }

    /// sample for channel `ch` at absolute input frame `frame`, clamped to
    /// the last available frame at end of input
    fn sample_at(&self, frame: u64, ch: usize) -> f32 {
        let last = self.fifo_start + self.fifo_frames().saturating_sub(1);
        let frame = frame.min(last);
        let index = ((frame - self.fifo_start) as usize) * self.channels() + ch;
        self.fifo[index]
    }
}

impl AudioConverter for PcmConverter {
    fn current_input_format(&self) -> StreamFormat {
        self.input
    }

    fn current_output_format(&self) -> StreamFormat {
        self.output
    }

    fn max_output_packet_size(&self) -> Result<u32, PropertyError> {
        Ok(self.output.bytes_per_packet)
    }

    fn fill_output(
        &mut self,
        max_packets: u32,
        out: &mut [u8],
        _descriptions: &mut Vec<PacketDescription>,
        input: &mut dyn PacketPull,
    ) -> Result<FillResult, ConvertStatus> {
        let frame_bytes = self.output.bytes_per_frame as usize;
        let capacity = (out.len() / frame_bytes).min(max_packets as usize) as u32;
        let channels = self.channels();

        let mut produced: u32 = 0;
        let mut filled = 0usize;

        while produced < capacity {
            let base = self.next_pos.floor() as u64;
            let frac = (self.next_pos - base as f64) as f32;

            // make sure the interpolation pair is buffered
            while !self.input_done && self.fifo_start + self.fifo_frames() <= base + 1 {
                let batch = input.pull(PULL_PACKETS)?;
                if batch.packets == 0 {
                    self.input_done = true;
                } else {
                    let bytes = batch.bytes.to_vec();
                    self.ingest(&bytes);
                }
            }

            if self.input_done {
                let total_frames = self.fifo_start + self.fifo_frames();
                if base >= total_frames {
                    break; // input exhausted
                }
            }

            for ch in 0..channels {
                let s0 = self.sample_at(base, ch);
                let s1 = self.sample_at(base + 1, ch);
                let sample = s0 + frac * (s1 - s0);
                out[filled..filled + 2].copy_from_slice(&encode_i16(sample));
                filled += 2;
            }

            produced += 1;
            self.next_pos += self.ratio;
            self.trim();
        }

        if produced == 0 {
            return Ok(FillResult::EndOfStream);
        }
        Ok(FillResult::Produced {
            packets: produced,
            bytes: filled as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::InputBatch;

    struct SlicePull {
        data: Vec<u8>,
        bytes_per_frame: u32,
        channels: u32,
        position: usize,
    }

    impl PacketPull for SlicePull {
        fn pull(&mut self, want: u32) -> Result<InputBatch<'_>, ConvertStatus> {
            let remaining = (self.data.len() - self.position) / self.bytes_per_frame as usize;
            let take = remaining.min(want as usize);
            let start = self.position;
            self.position += take * self.bytes_per_frame as usize;
            Ok(InputBatch {
                bytes: &self.data[start..self.position],
                packets: take as u32,
                channels: self.channels,
                descriptions: None,
            })
        }
    }

    fn i16_format(rate: f64, channels: u32) -> StreamFormat {
        StreamFormat::pcm_int16(rate, channels)
    }

    #[test]
    fn same_rate_16_bit_is_identity() {
        let fmt = i16_format(44100.0, 2);
        let mut converter = PcmConverter::new(&fmt, &fmt).unwrap();

        let frames: Vec<i16> = vec![0, 100, -100, 32767, -32768, 5, -5, 12345];
        let mut data = Vec::new();
        for v in &frames {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let mut pull = SlicePull {
            data: data.clone(),
            bytes_per_frame: 4,
            channels: 2,
            position: 0,
        };
        let mut out = vec![0u8; 1024];
        let mut descs = Vec::new();
        let result = converter
            .fill_output(256, &mut out, &mut descs, &mut pull)
            .unwrap();

        match result {
            FillResult::Produced { packets, bytes } => {
                assert_eq!(packets, 4);
                assert_eq!(&out[..bytes as usize], &data[..]);
            }
            FillResult::EndOfStream => panic!("expected output"),
        }

        // next fill sees the end of stream
        let result = converter
            .fill_output(256, &mut out, &mut descs, &mut pull)
            .unwrap();
        assert_eq!(result, FillResult::EndOfStream);
    }

    #[test]
    fn downsampling_halves_frame_count() {
        let input = i16_format(48000.0, 1);
        let output = i16_format(24000.0, 1);
        let mut converter = PcmConverter::new(&input, &output).unwrap();

        let mut data = Vec::new();
        for i in 0..480i16 {
            data.extend_from_slice(&i.to_le_bytes());
        }
        let mut pull = SlicePull {
            data,
            bytes_per_frame: 2,
            channels: 1,
            position: 0,
        };

        let mut out = vec![0u8; 4096];
        let mut descs = Vec::new();
        let mut total = 0u32;
        loop {
            match converter
                .fill_output(2048, &mut out, &mut descs, &mut pull)
                .unwrap()
            {
                FillResult::Produced { packets, .. } => total += packets,
                FillResult::EndOfStream => break,
            }
        }
        assert_eq!(total, 240);
    }

    #[test]
    fn rejects_channel_mismatch() {
        let input = i16_format(44100.0, 2);
        let output = i16_format(44100.0, 1);
        assert!(PcmConverter::new(&input, &output).is_err());
    }
}
