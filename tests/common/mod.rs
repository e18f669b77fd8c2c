//! shared fixtures: sample generators, file builders and mock converters
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use recaf::caf::{CafSink, CafSource};
use recaf::converter::{AudioConverter, ConverterFactory, FillResult, PacketPull};
use recaf::error::{ConvertStatus, PropertyError};
use recaf::file::{AudioFileSink, AudioFileSource};
use recaf::format::{PacketDescription, PrimingInfo, StreamFormat};
use recaf::state::SharedThreadState;

/// interleaved 16-bit sine frames, a different frequency per channel
pub fn sine_frames(frames: usize, channels: usize) -> Vec<i16> {
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        for ch in 0..channels {
            let phase = i as f32 * 0.01 * (ch + 1) as f32;
            samples.push((phase.sin() * 12000.0) as i16);
        }
    }
    samples
}

pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for v in samples {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// build a 16-bit PCM CAF file from interleaved samples
pub fn write_pcm_caf(path: &Path, sample_rate: f64, channels: u32, samples: &[i16]) {
    let format = StreamFormat::pcm_int16(sample_rate, channels);
    let mut sink = CafSink::create(path, &format).unwrap();
    let bytes = pcm_bytes(samples);
    let packets = (samples.len() / channels as usize) as u32;
    sink.write_packets(0, &bytes, &[], packets).unwrap();
    sink.finalize().unwrap();
}

/// build a minimal 16-bit PCM WAV file from interleaved samples
pub fn write_wav_i16(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
    let data = pcm_bytes(samples);
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;

    let mut bytes = Vec::with_capacity(44 + data.len());
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&data);

    std::fs::write(path, bytes).unwrap();
}

/// read a CAF file's format and full data section through the packet API
pub fn read_caf_data(path: &Path) -> (StreamFormat, Vec<u8>) {
    let mut source = CafSource::open(path).unwrap();
    let format = source.data_format().unwrap();
    let total = source.packet_count().unwrap();

    let mut data = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut descs = Vec::new();
    let mut position = 0u64;
    while position < total {
        descs.clear();
        let read = source
            .read_packets(position, 4096, &mut buf, &mut descs)
            .unwrap();
        if read.packets == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read.bytes as usize]);
        position += read.packets as u64;
    }
    (format, data)
}

/// locate the `pakt` chunk in a raw CAF file and return its header:
/// (packet count, valid frames, priming frames, remainder frames)
pub fn read_pakt_header(bytes: &[u8]) -> Option<(i64, i64, i32, i32)> {
    let mut pos = 8; // magic + version + flags
    while pos + 12 <= bytes.len() {
        let chunk_type = &bytes[pos..pos + 4];
        let declared = i64::from_be_bytes(bytes[pos + 4..pos + 12].try_into().unwrap());
        let size = if declared < 0 {
            bytes.len() - (pos + 12)
        } else {
            declared as usize
        };
        if chunk_type == b"pakt" {
            let body = &bytes[pos + 12..pos + 12 + size];
            return Some((
                i64::from_be_bytes(body[0..8].try_into().unwrap()),
                i64::from_be_bytes(body[8..16].try_into().unwrap()),
                i32::from_be_bytes(body[16..20].try_into().unwrap()),
                i32::from_be_bytes(body[20..24].try_into().unwrap()),
            ));
        }
        pos += 12 + size;
    }
    None
}

// mock converters

/// behavior knobs for [`PassthroughConverter`]
#[derive(Clone, Default)]
pub struct PassthroughConfig {
    /// `None` reports the resumability property as unsupported
    pub resumable: Option<bool>,
    /// return a transient hardware-busy status on this fill call (1-based)
    pub busy_at_fill: Option<u32>,
    /// pause the job during the busy fill and schedule the matching resume
    pub interrupt_state: Option<SharedThreadState>,
}

/// PCM pass-through converter with injectable interruption behavior
///
/// Copies input batches straight to the output buffer; a busy fill consumes
/// no input, so a resumed job produces output identical to an uninterrupted
/// one.
pub struct PassthroughConverter {
    format: StreamFormat,
    config: PassthroughConfig,
    fill_count: u32,
}

impl AudioConverter for PassthroughConverter {
    fn current_input_format(&self) -> StreamFormat {
        self.format
    }

    fn current_output_format(&self) -> StreamFormat {
        self.format
    }

    fn max_output_packet_size(&self) -> Result<u32, PropertyError> {
        Ok(self.format.bytes_per_packet)
    }

    fn can_resume_from_interruption(&self) -> Result<bool, PropertyError> {
        self.config.resumable.ok_or(PropertyError::NotSupported)
    }

    fn fill_output(
        &mut self,
        max_packets: u32,
        out: &mut [u8],
        _descriptions: &mut Vec<PacketDescription>,
        input: &mut dyn PacketPull,
    ) -> Result<FillResult, ConvertStatus> {
        self.fill_count += 1;
        if self.config.busy_at_fill == Some(self.fill_count) {
            if let Some(state) = &self.config.interrupt_state {
                state.begin_interruption();
                let resume = state.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(50));
                    resume.end_interruption();
                });
            }
            return Err(ConvertStatus::HardwareBusy);
        }

        let bpf = self.format.bytes_per_frame as usize;
        let cap = ((out.len() / bpf) as u32).min(max_packets);
        let batch = input.pull(cap)?;
        if batch.packets == 0 {
            return Ok(FillResult::EndOfStream);
        }
        out[..batch.bytes.len()].copy_from_slice(batch.bytes);
        Ok(FillResult::Produced {
            packets: batch.packets,
            bytes: batch.bytes.len() as u32,
        })
    }
}

pub struct PassthroughFactory {
    pub config: PassthroughConfig,
}

impl ConverterFactory for PassthroughFactory {
    fn resolve_format(&self, partial: &StreamFormat) -> Option<StreamFormat> {
        Some(StreamFormat::pcm_int16(
            partial.sample_rate,
            partial.channels_per_frame,
        ))
    }

    fn make(
        &self,
        input: &StreamFormat,
        _output: &StreamFormat,
    ) -> Result<Box<dyn AudioConverter>, String> {
        Ok(Box::new(PassthroughConverter {
            format: *input,
            config: self.config.clone(),
            fill_count: 0,
        }))
    }
}

/// frames per mock-encoded packet
pub const BLOCK_FRAMES: u32 = 1024;

/// mock VBR block encoder standing in for a compressed codec
///
/// Consumes [`BLOCK_FRAMES`] input frames per output packet and emits each
/// packet as its frame count in four big-endian bytes. Carries a cookie and
/// prime info so the side-information paths get exercised, and records the
/// bitrate it was given.
pub struct BlockEncoder {
    input: StreamFormat,
    output: StreamFormat,
    input_done: bool,
    reported_packet_size: u32,
    bitrate: Arc<Mutex<Option<u32>>>,
}

impl AudioConverter for BlockEncoder {
    fn current_input_format(&self) -> StreamFormat {
        self.input
    }

    fn current_output_format(&self) -> StreamFormat {
        self.output
    }

    fn compression_cookie(&self) -> Result<Vec<u8>, PropertyError> {
        Ok(vec![0xAB, 0xCD, 0xEF])
    }

    fn prime_info(&self) -> Result<PrimingInfo, PropertyError> {
        Ok(PrimingInfo {
            leading_frames: 100,
            trailing_frames: 0,
        })
    }

    fn max_output_packet_size(&self) -> Result<u32, PropertyError> {
        Ok(self.reported_packet_size)
    }

    fn set_bitrate(&mut self, bits_per_second: u32) -> Result<(), PropertyError> {
        *self.bitrate.lock().unwrap() = Some(bits_per_second);
        Ok(())
    }

    fn fill_output(
        &mut self,
        max_packets: u32,
        out: &mut [u8],
        descriptions: &mut Vec<PacketDescription>,
        input: &mut dyn PacketPull,
    ) -> Result<FillResult, ConvertStatus> {
        let capacity = ((out.len() / 4) as u32).min(max_packets);
        let mut produced = 0u32;

        while produced < capacity && !self.input_done {
            // gather one block of input frames
            let mut frames = 0u32;
            while frames < BLOCK_FRAMES {
                let batch = input.pull(BLOCK_FRAMES - frames)?;
                if batch.packets == 0 {
                    self.input_done = true;
                    break;
                }
                frames += batch.packets;
            }
            if frames == 0 {
                break;
            }

            let offset = produced as usize * 4;
            out[offset..offset + 4].copy_from_slice(&frames.to_be_bytes());
            descriptions.push(PacketDescription {
                start_offset: offset as u64,
                data_byte_size: 4,
                variable_frames_in_packet: 0,
            });
            produced += 1;
        }

        if produced == 0 {
            return Ok(FillResult::EndOfStream);
        }
        Ok(FillResult::Produced {
            packets: produced,
            bytes: produced * 4,
        })
    }
}

pub struct BlockEncoderFactory {
    /// bitrate the orchestrator handed the converter, if any
    pub bitrate: Arc<Mutex<Option<u32>>>,
    /// maximum output packet size the converter reports
    pub reported_packet_size: u32,
}

impl BlockEncoderFactory {
    pub fn new() -> Self {
        BlockEncoderFactory {
            bitrate: Arc::new(Mutex::new(None)),
            reported_packet_size: 4,
        }
    }

    /// a factory whose converter misreports its maximum packet size
    pub fn with_reported_packet_size(size: u32) -> Self {
        BlockEncoderFactory {
            reported_packet_size: size,
            ..Self::new()
        }
    }
}

impl ConverterFactory for BlockEncoderFactory {
    fn resolve_format(&self, partial: &StreamFormat) -> Option<StreamFormat> {
        Some(StreamFormat {
            sample_rate: partial.sample_rate,
            format_id: partial.format_id,
            format_flags: 0,
            bytes_per_packet: 0, // VBR
            frames_per_packet: BLOCK_FRAMES,
            bytes_per_frame: 0,
            channels_per_frame: partial.channels_per_frame,
            bits_per_channel: 0, // compressed
        })
    }

    fn make(
        &self,
        input: &StreamFormat,
        output: &StreamFormat,
    ) -> Result<Box<dyn AudioConverter>, String> {
        Ok(Box::new(BlockEncoder {
            input: *input,
            output: *output,
            input_done: false,
            reported_packet_size: self.reported_packet_size,
            bitrate: self.bitrate.clone(),
        }))
    }
}
