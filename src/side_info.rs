//! out-of-band metadata transfer between source, converter and destination
//!
//! All transfers are best-effort: not every format pair carries a cookie, a
//! layout or a packet table, and `NotSupported` from either side is a
//! normal no-op. Only genuinely broken property access gets logged.

use log::{debug, info, warn};

use crate::converter::AudioConverter;
use crate::error::PropertyError;
use crate::file::{AudioFileSink, AudioFileSource};
use crate::format::PacketTableInfo;

/// copy the source file's decoder cookie into the converter, pre-conversion
///
/// Some compressed formats cannot be decoded without it; absence is fine.
pub fn read_cookie(source: &dyn AudioFileSource, converter: &mut dyn AudioConverter) {
    let cookie = match source.magic_cookie() {
        Ok(cookie) if !cookie.is_empty() => cookie,
        Ok(_) | Err(PropertyError::NotSupported) => return,
        Err(e) => {
            warn!("could not get magic cookie from source file: {}", e);
            return;
        }
    };

    match converter.set_decompression_cookie(&cookie) {
        Ok(()) | Err(PropertyError::NotSupported) => {}
        Err(e) => warn!("could not set decompression cookie on the converter: {}", e),
    }
}

/// copy the converter's encoder cookie to the destination file
///
/// Called before the conversion and again after the final flush, since some
/// codecs revise the cookie at the end.
pub fn write_cookie(converter: &dyn AudioConverter, sink: &mut dyn AudioFileSink) {
    let cookie = match converter.compression_cookie() {
        Ok(cookie) if !cookie.is_empty() => cookie,
        Ok(_) | Err(PropertyError::NotSupported) => return,
        Err(e) => {
            warn!("could not get compression cookie from the converter: {}", e);
            return;
        }
    };

    match sink.set_magic_cookie(&cookie) {
        Ok(()) => debug!("wrote magic cookie to destination file: {} bytes", cookie.len()),
        // some files don't take cookies even when the format has one
        Err(PropertyError::NotSupported) => {}
        Err(e) => warn!("could not set magic cookie on destination file: {}", e),
    }
}

/// write an explicit channel layout to the destination
///
/// Prefers the converter's output layout, falls back to the source file's.
/// Only called for more-than-stereo streams; mono and stereo need none.
pub fn write_channel_layout(
    converter: &dyn AudioConverter,
    source: &dyn AudioFileSource,
    sink: &mut dyn AudioFileSink,
) {
    let layout = match converter.output_channel_layout() {
        Ok(layout) => layout,
        // the converter has no layout; see if the input file does
        Err(_) => match source.channel_layout() {
            Ok(layout) => layout,
            Err(PropertyError::NotSupported) => return,
            Err(e) => {
                warn!("could not get channel layout from source file: {}", e);
                return;
            }
        },
    };

    match sink.set_channel_layout(&layout) {
        Ok(()) => debug!("wrote channel layout to destination file: tag {}", layout.layout_tag),
        // some files don't take layouts and that's OK
        Err(PropertyError::NotSupported) => {}
        Err(e) => warn!("could not set channel layout on destination file: {}", e),
    }
}

/// finalize priming/remainder metadata in the destination's packet table
///
/// The total frame count read back from the just-written file equals
/// `valid + priming + remainder`; this rewrites the split using the
/// converter's prime info. Skipped when the converter has no prime info or
/// the container has no writable packet table.
pub fn write_packet_table_info(converter: &dyn AudioConverter, sink: &mut dyn AudioFileSink) {
    let prime = match converter.prime_info() {
        Ok(prime) => prime,
        // no prime info available and that's OK
        Err(PropertyError::NotSupported) => return,
        Err(e) => {
            warn!("could not get prime info from the converter: {}", e);
            return;
        }
    };

    let current = match sink.packet_table_info() {
        Ok(info) => info,
        Err(PropertyError::NotSupported) => return,
        Err(e) => {
            warn!("could not get packet table info from destination file: {}", e);
            return;
        }
    };

    let total_frames = current.valid_frames
        + current.priming_frames as i64
        + current.remainder_frames as i64;
    debug!("total number of frames from output file: {}", total_frames);

    let corrected = PacketTableInfo {
        priming_frames: prime.leading_frames as i32,
        remainder_frames: prime.trailing_frames as i32,
        valid_frames: total_frames
            - prime.leading_frames as i64
            - prime.trailing_frames as i64,
    };

    match sink.set_packet_table_info(corrected) {
        Ok(()) => {
            info!(
                "packet table: {} valid frames, {} priming, {} remainder",
                corrected.valid_frames, corrected.priming_frames, corrected.remainder_frames
            );
        }
        // some audio files can't contain packet table information
        Err(PropertyError::NotSupported) => {}
        Err(e) => warn!("could not set packet table info on destination file: {}", e),
    }
}
