//! converter service interface and codec registry
//!
//! A converter is constructed between two stream formats and driven by
//! repeated [`fill_output`](AudioConverter::fill_output) calls. Each fill
//! pulls however much input it needs (zero, one or many source reads,
//! depending on the compression ratio) through the [`PacketPull`] callback
//! and produces one batch of output packets.

use std::collections::HashMap;

use crate::error::{ConvertStatus, PropertyError};
use crate::format::{ChannelLayout, PacketDescription, PrimingInfo, StreamFormat};
use crate::fourcc::FourCc;

/// one batch of input packets handed to the converter by the pull callback
///
/// Borrowed from the reader's scratch buffer for the duration of the fill
/// call.
pub struct InputBatch<'a> {
    pub bytes: &'a [u8],
    pub packets: u32,
    pub channels: u32,
    /// per-packet sizes, present iff the source format is VBR
    pub descriptions: Option<&'a [PacketDescription]>,
}

impl InputBatch<'_> {
    /// an end-of-stream batch
    pub fn empty(channels: u32) -> InputBatch<'static> {
        InputBatch {
            bytes: &[],
            packets: 0,
            channels,
            descriptions: None,
        }
    }
}

/// pull interface the converter drains input through
///
/// Implementations own their cursor and buffers; the converter only sees
/// typed batches.
pub trait PacketPull {
    /// produce up to `want` packets; zero packets signals end-of-stream
    fn pull(&mut self, want: u32) -> Result<InputBatch<'_>, ConvertStatus>;
}

/// outcome of one fill call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillResult {
    /// produced this many packets and bytes into the output buffer
    Produced { packets: u32, bytes: u32 },
    /// no more output will be produced
    EndOfStream,
}

/// an instantiated format converter
pub trait AudioConverter {
    /// the converter's authoritative input format (may differ from the
    /// requested one in filled-in default fields)
    fn current_input_format(&self) -> StreamFormat;

    /// the converter's authoritative output format
    fn current_output_format(&self) -> StreamFormat;

    /// hand the source file's decoder cookie to the converter
    fn set_decompression_cookie(&mut self, _cookie: &[u8]) -> Result<(), PropertyError> {
        Err(PropertyError::NotSupported)
    }

    /// the encoder's cookie for the destination file; some codecs revise it
    /// after the final flush
    fn compression_cookie(&self) -> Result<Vec<u8>, PropertyError> {
        Err(PropertyError::NotSupported)
    }

    /// output channel layout, if the converter imposes one
    fn output_channel_layout(&self) -> Result<ChannelLayout, PropertyError> {
        Err(PropertyError::NotSupported)
    }

    /// leading/trailing frames the encoder introduces
    fn prime_info(&self) -> Result<PrimingInfo, PropertyError> {
        Err(PropertyError::NotSupported)
    }

    /// largest packet the converter can produce; required to size VBR
    /// output buffers
    fn max_output_packet_size(&self) -> Result<u32, PropertyError> {
        Err(PropertyError::NotSupported)
    }

    /// whether in-progress codec state survives a hardware interruption
    ///
    /// `NotSupported` means a software codec: always resumable.
    fn can_resume_from_interruption(&self) -> Result<bool, PropertyError> {
        Err(PropertyError::NotSupported)
    }

    /// target bitrate in bits per second, for codecs that take one
    fn set_bitrate(&mut self, _bits_per_second: u32) -> Result<(), PropertyError> {
        Err(PropertyError::NotSupported)
    }

    /// produce up to `max_packets` output packets into `out`
    ///
    /// Pulls input through `input` as needed. For VBR output formats
    /// `descriptions` is filled with one entry per produced packet.
    fn fill_output(
        &mut self,
        max_packets: u32,
        out: &mut [u8],
        descriptions: &mut Vec<PacketDescription>,
        input: &mut dyn PacketPull,
    ) -> Result<FillResult, ConvertStatus>;
}

/// builds converters for one output format family
pub trait ConverterFactory: Send + Sync {
    /// fill in the remaining fields of a partially specified destination
    /// format (sample rate, format id and channel count are set by the
    /// caller); `None` if the combination is unsupported
    fn resolve_format(&self, partial: &StreamFormat) -> Option<StreamFormat>;

    /// construct a converter between the two formats
    fn make(
        &self,
        input: &StreamFormat,
        output: &StreamFormat,
    ) -> Result<Box<dyn AudioConverter>, String>;
}

/// registry of converter factories keyed by output format id
///
/// Stand-in for the platform's format-info resolution and converter
/// construction services. The default registry knows linear PCM; compressed
/// codecs are external and register their own factories.
pub struct CodecRegistry {
    factories: HashMap<FourCc, Box<dyn ConverterFactory>>,
}

impl CodecRegistry {
    /// an empty registry
    pub fn empty() -> Self {
        CodecRegistry {
            factories: HashMap::new(),
        }
    }

    /// register a factory for an output format, replacing any existing one
    pub fn register(&mut self, format_id: FourCc, factory: Box<dyn ConverterFactory>) {
        self.factories.insert(format_id, factory);
    }

    /// look up the factory for an output format
    pub fn factory(&self, format_id: FourCc) -> Option<&dyn ConverterFactory> {
        self.factories.get(&format_id).map(|f| f.as_ref())
    }
}

impl Default for CodecRegistry {
    /// registry with the built-in software codecs
    fn default() -> Self {
        let mut registry = CodecRegistry::empty();
        registry.register(
            crate::format::FORMAT_LPCM,
            Box::new(crate::pcm::PcmConverterFactory),
        );
        registry
    }
}
