//! Core Audio Format container support
//!
//! The destination side of every conversion is a CAF file regardless of the
//! target codec; the source side accepts CAF alongside the symphonia import
//! path. Only the chunks the pipeline needs are implemented: `desc` (stream
//! format), `kuki` (magic cookie), `chan` (channel layout), `pakt` (packet
//! table) and `data`. All integers are big-endian per the container spec.

mod chunk;
mod sink;
mod source;

pub use sink::CafSink;
pub use source::CafSource;

/// file magic, "caff"
pub const CAF_MAGIC: [u8; 4] = *b"caff";

/// file version we read and write
pub const CAF_VERSION: u16 = 1;

pub(crate) const CHUNK_DESC: [u8; 4] = *b"desc";
pub(crate) const CHUNK_KUKI: [u8; 4] = *b"kuki";
pub(crate) const CHUNK_CHAN: [u8; 4] = *b"chan";
pub(crate) const CHUNK_PAKT: [u8; 4] = *b"pakt";
pub(crate) const CHUNK_DATA: [u8; 4] = *b"data";
