//! error types for the conversion pipeline

use crate::fourcc::FourCc;

/// outcome of a typed property get/set on a file or converter
///
/// `NotSupported` is a valid, silently-ignorable outcome for the properties
/// that may legitimately be absent (magic cookie, channel layout,
/// resumability, packet-table support). Everything else is a real failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("property not supported")]
    NotSupported,
    #[error("invalid property value: {0}")]
    InvalidValue(String),
    #[error("property access failed: {0}")]
    Failed(String),
}

/// status returned by a converter fill call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertStatus {
    /// the underlying hardware codec is unavailable, typically because an
    /// interruption has been signaled or is about to be; transient
    #[error("hardware codec in use")]
    HardwareBusy,
    /// the input pull failed
    #[error("input read failed: {0}")]
    InputFailed(String),
    /// anything else the codec reports; fatal
    #[error("converter error: {0}")]
    Codec(String),
}

/// errors surfaced by [`convert`](crate::convert::convert)
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("could not open {path}: {source}")]
    FileOpen {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("required property failed: {0}")]
    Property(#[from] PropertyError),

    #[error("no format description for {format} at {sample_rate} Hz, {channels} ch")]
    FormatResolution {
        format: FourCc,
        sample_rate: f64,
        channels: u32,
    },

    #[error("could not create converter from {input} to {output}: {reason}")]
    ConverterCreation {
        input: FourCc,
        output: FourCc,
        reason: String,
    },

    #[error("conversion failed: {0}")]
    ConversionFailed(ConvertStatus),

    /// the designed termination path for an unresumable hardware interruption
    #[error("interrupted and the converter cannot resume")]
    CannotResumeFromInterruption,

    #[error("write to destination failed: {0}")]
    Write(String),
}
