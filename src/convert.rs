//! end-to-end conversion orchestration
//!
//! Owns the whole job lifecycle: open files, negotiate formats, wire up the
//! converter, run the pull loop, finalize side information and clean up on
//! every exit path. All buffers and handles are plain owned values, so early
//! returns release everything exactly once.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::caf::{CafSink, CafSource, CAF_MAGIC};
use crate::converter::CodecRegistry;
use crate::engine::ConversionEngine;
use crate::error::{ConvertError, PropertyError};
use crate::file::{AudioFileSink, AudioFileSource};
use crate::format::{StreamFormat, FORMAT_AAC, FORMAT_ILBC, FORMAT_LPCM};
use crate::fourcc::FourCc;
use crate::import::ImportSource;
use crate::reader::SourceReader;
use crate::side_info;
use crate::state::SharedThreadState;
use crate::writer::SinkWriter;

/// capacity of the source and destination scratch buffers
///
/// Both buffers are allocated once per job and reused across every
/// iteration.
pub const IO_BUFFER_CAPACITY: u32 = 32 * 1024;

/// one conversion job
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// output format identifier
    pub output_format: FourCc,
    /// output sample rate in Hz; 0 inherits the source rate
    pub output_sample_rate: f64,
}

/// totals reported on success
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ConvertStats {
    pub output_packets: u64,
    pub output_frames: u64,
    pub output_bytes: u64,
    pub output_sample_rate: f64,
}

/// convert one file, start to finish
///
/// Runs on the caller's thread, which acts as the conversion worker; pass
/// the same `state` handle to the interruption-notification context. On any
/// failure the partially written destination file is deleted. The state
/// machine is marked `Done` on every exit path.
pub fn convert(
    request: &ConvertRequest,
    registry: &CodecRegistry,
    state: &SharedThreadState,
) -> Result<ConvertStats, ConvertError> {
    // transition thread state to Running before anything can fail
    state.set_running();

    let result = run_job(request, registry, state);

    if result.is_err() {
        // failure never leaves a partial destination file behind
        let _ = std::fs::remove_file(&request.destination);
    }

    state.set_done();
    result
}

fn run_job(
    request: &ConvertRequest,
    registry: &CodecRegistry,
    state: &SharedThreadState,
) -> Result<ConvertStats, ConvertError> {
    // get the source file and its data format
    let mut source = open_source(&request.source)?;
    let src_format = source.data_format().map_err(ConvertError::Property)?;

    // set up the output file format
    let sample_rate = if request.output_sample_rate == 0.0 {
        src_format.sample_rate
    } else {
        request.output_sample_rate
    };

    let dst_format = if request.output_format == FORMAT_LPCM {
        // uncompressed destination: a 16-bit signed packed little-endian
        // description with the source's channel count
        StreamFormat::pcm_int16(sample_rate, src_format.channels_per_frame)
    } else {
        // compressed destination: format, sample rate and channels are
        // enough for the factory to fill out the rest; iLBC is mono only
        let channels = if request.output_format == FORMAT_ILBC {
            1
        } else {
            src_format.channels_per_frame
        };
        let partial = StreamFormat {
            sample_rate,
            format_id: request.output_format,
            format_flags: 0,
            bytes_per_packet: 0,
            frames_per_packet: 0,
            bytes_per_frame: 0,
            channels_per_frame: channels,
            bits_per_channel: 0,
        };
        resolve_format(registry, &partial)?
    };

    info!("source file format: {}", src_format);
    info!("destination format: {}", dst_format);

    // create the converter
    let factory = registry
        .factory(dst_format.format_id)
        .ok_or(ConvertError::FormatResolution {
            format: dst_format.format_id,
            sample_rate: dst_format.sample_rate,
            channels: dst_format.channels_per_frame,
        })?;
    let mut converter =
        factory
            .make(&src_format, &dst_format)
            .map_err(|reason| ConvertError::ConverterCreation {
                input: src_format.format_id,
                output: dst_format.format_id,
                reason,
            })?;

    // if the source has a cookie, get it and set it on the converter
    side_info::read_cookie(source.as_ref(), converter.as_mut());

    // get the actual formats back from the converter
    let src_format = converter.current_input_format();
    let dst_format = converter.current_output_format();
    debug!("formats returned from the converter:");
    debug!("         source format: {}", src_format);
    debug!("    destination format: {}", dst_format);

    // AAC requires an explicit bitrate, tiered by sample rate; the tiers are
    // a heuristic, one bitrate per rate works for mono and scales with the
    // channel count
    if dst_format.format_id == FORMAT_AAC {
        let bitrate: u32 = if dst_format.sample_rate >= 44100.0 {
            192_000
        } else if dst_format.sample_rate < 22000.0 {
            32_000
        } else {
            64_000
        };
        converter
            .set_bitrate(bitrate)
            .map_err(ConvertError::Property)?;
        info!("AAC encode bitrate: {}", bitrate);
    }

    // can the converter resume after an interruption? if the property is
    // unsupported the codec is a software codec and we can always resume
    let can_resume = match converter.can_resume_from_interruption() {
        Ok(can) => {
            info!(
                "converter {} continue after interruption",
                if can { "CAN" } else { "CANNOT" }
            );
            can
        }
        Err(PropertyError::NotSupported) => true,
        Err(e) => {
            warn!("resumability query failed ({}), assuming resumable", e);
            true
        }
    };

    // create the destination file; the container is always CAF regardless of
    // the target codec
    let mut sink = CafSink::create(&request.destination, &dst_format)?;

    // if the destination format has a cookie, write it to the output file
    side_info::write_cookie(converter.as_ref(), &mut sink);

    // explicit channel layout for more-than-stereo streams
    if src_format.channels_per_frame > 2 {
        side_info::write_channel_layout(converter.as_ref(), source.as_ref(), &mut sink);
    }

    // source scratch buffer sizing: CBR packets have a fixed size, VBR needs
    // the file's packet-size upper bound
    let src_size_per_packet = if src_format.is_vbr() {
        source
            .packet_size_upper_bound()
            .map_err(ConvertError::Property)?
    } else {
        src_format.bytes_per_packet
    };
    let mut reader = SourceReader::new(
        source.as_mut(),
        src_format,
        IO_BUFFER_CAPACITY,
        src_size_per_packet,
    );

    // destination scratch buffer sizing, same idea on the converter side
    let output_size_per_packet = if dst_format.bytes_per_packet != 0 {
        dst_format.bytes_per_packet
    } else {
        converter
            .max_output_packet_size()
            .map_err(ConvertError::Property)?
    };
    // the fixed scratch buffer must hold at least one output packet
    if output_size_per_packet == 0 || output_size_per_packet > IO_BUFFER_CAPACITY {
        return Err(ConvertError::ConverterCreation {
            input: src_format.format_id,
            output: dst_format.format_id,
            reason: format!(
                "unusable maximum output packet size: {} bytes",
                output_size_per_packet
            ),
        });
    }
    let packets_per_fill = IO_BUFFER_CAPACITY / output_size_per_packet;
    let mut out_buffer = vec![0u8; IO_BUFFER_CAPACITY as usize];

    // loop to convert data
    info!("converting...");
    let totals = {
        let mut writer = SinkWriter::new(&mut sink, dst_format);
        let mut engine =
            ConversionEngine::new(converter.as_mut(), state, can_resume, packets_per_fill);
        engine.run(&mut reader, &mut writer, &mut out_buffer)?
    };

    // trailing metadata: priming/remainder for compressed destinations only
    if dst_format.is_compressed() {
        debug!("total number of output frames counted: {}", totals.output_frames);
        side_info::write_packet_table_info(converter.as_ref(), &mut sink);
    }

    // write the cookie again; some codecs update it at the end
    side_info::write_cookie(converter.as_ref(), &mut sink);

    sink.finalize()
        .map_err(|e| ConvertError::Write(e.to_string()))?;

    Ok(ConvertStats {
        output_packets: totals.output_packets,
        output_frames: totals.output_frames,
        output_bytes: totals.output_bytes,
        output_sample_rate: dst_format.sample_rate,
    })
}

/// fill out a partially specified compressed format via the registry
fn resolve_format(
    registry: &CodecRegistry,
    partial: &StreamFormat,
) -> Result<StreamFormat, ConvertError> {
    let unresolved = || ConvertError::FormatResolution {
        format: partial.format_id,
        sample_rate: partial.sample_rate,
        channels: partial.channels_per_frame,
    };
    registry
        .factory(partial.format_id)
        .ok_or_else(unresolved)?
        .resolve_format(partial)
        .ok_or_else(unresolved)
}

/// open a source file, sniffing the container from its magic
pub fn open_source(path: &Path) -> Result<Box<dyn AudioFileSource>, ConvertError> {
    let mut file = File::open(path).map_err(|source| ConvertError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut magic = [0u8; 4];
    let n = file.read(&mut magic).map_err(|source| ConvertError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    drop(file);

    if n == 4 && magic == CAF_MAGIC {
        Ok(Box::new(CafSource::open(path)?))
    } else {
        Ok(Box::new(ImportSource::open(path)?))
    }
}
