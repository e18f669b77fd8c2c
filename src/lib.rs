//! Interruptible streaming audio file conversion.
//!
//! Converts an audio file to a Core Audio Format (CAF) destination through a
//! pull-based pipeline: a [`SourceReader`] feeds packets to an
//! [`AudioConverter`](converter::AudioConverter), whose output a
//! [`SinkWriter`] appends to the destination. The whole loop runs on a worker
//! thread whose lifecycle is driven through a shared [`ThreadState`], so a
//! caller can pause the conversion from another thread (a playback
//! interruption, say) and resume it if the codec allows.
//!
//! ```no_run
//! use recaf::{convert, CodecRegistry, ConvertRequest, ThreadState, FORMAT_LPCM};
//!
//! let state = ThreadState::new();
//! let request = ConvertRequest {
//!     source: "input.wav".into(),
//!     destination: "output.caf".into(),
//!     output_format: FORMAT_LPCM,
//!     output_sample_rate: 0.0, // inherit the source rate
//! };
//! let stats = convert(&request, &CodecRegistry::default(), &state)?;
//! println!("wrote {} frames", stats.output_frames);
//! # Ok::<(), recaf::ConvertError>(())
//! ```

pub mod caf;
pub mod convert;
pub mod converter;
pub mod engine;
pub mod error;
pub mod file;
pub mod format;
pub mod fourcc;
pub mod import;
pub mod pcm;
pub mod reader;
pub mod side_info;
pub mod state;
pub mod writer;

pub use convert::{convert, open_source, ConvertRequest, ConvertStats, IO_BUFFER_CAPACITY};
pub use converter::{AudioConverter, CodecRegistry, ConverterFactory, FillResult, PacketPull};
pub use error::{ConvertError, ConvertStatus, PropertyError};
pub use file::{AudioFileSink, AudioFileSource, ReadPackets};
pub use format::{
    ChannelLayout, PacketDescription, PacketTableInfo, PrimingInfo, StreamFormat, FORMAT_AAC,
    FORMAT_ALAC, FORMAT_ILBC, FORMAT_IMA4, FORMAT_LPCM,
};
pub use fourcc::FourCc;
pub use reader::SourceReader;
pub use state::{ConversionState, SharedThreadState, ThreadState};
pub use writer::SinkWriter;
