//! file access service interface
//!
//! Sources and sinks are packet-oriented: a read or write addresses an
//! absolute packet position, not a byte offset, and the container's packet
//! table (if any) is the implementation's concern. Properties that may
//! legitimately be absent (magic cookie, channel layout, writable packet
//! table) answer with [`PropertyError::NotSupported`], which callers treat
//! as a normal, skippable outcome.

use crate::error::PropertyError;
use crate::format::{ChannelLayout, PacketDescription, PacketTableInfo, StreamFormat};

/// outcome of a packet read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadPackets {
    /// packets actually read; zero at end-of-file
    pub packets: u32,
    /// bytes filled into the buffer
    pub bytes: u32,
}

/// a readable packet-oriented audio file
pub trait AudioFileSource {
    /// stream format of the file's data
    fn data_format(&self) -> Result<StreamFormat, PropertyError>;

    /// opaque decoder configuration blob, if the format carries one
    fn magic_cookie(&self) -> Result<Vec<u8>, PropertyError>;

    /// channel layout, if the file declares one
    fn channel_layout(&self) -> Result<ChannelLayout, PropertyError>;

    /// theoretical maximum packet byte size; consulted for VBR sources to
    /// size read buffers without scanning the whole file
    fn packet_size_upper_bound(&self) -> Result<u32, PropertyError>;

    /// total packets in the file, if known
    fn packet_count(&self) -> Result<u64, PropertyError>;

    /// read up to `max_packets` packets starting at absolute packet
    /// `position` into `buf`
    ///
    /// End-of-file is not an error: the result simply reports fewer (or
    /// zero) packets. For VBR sources `descriptions` is filled with one
    /// entry per packet read; CBR sources leave it empty.
    fn read_packets(
        &mut self,
        position: u64,
        max_packets: u32,
        buf: &mut [u8],
        descriptions: &mut Vec<PacketDescription>,
    ) -> Result<ReadPackets, PropertyError>;
}

/// a writable packet-oriented audio file
pub trait AudioFileSink {
    /// negotiated stream format the file was created with
    fn data_format(&self) -> Result<StreamFormat, PropertyError>;

    /// append `packets` packets at absolute packet `position`
    ///
    /// `descriptions` carries per-packet sizes for VBR data and is empty for
    /// CBR data.
    fn write_packets(
        &mut self,
        position: u64,
        bytes: &[u8],
        descriptions: &[PacketDescription],
        packets: u32,
    ) -> Result<(), PropertyError>;

    /// store the encoder's magic cookie
    fn set_magic_cookie(&mut self, cookie: &[u8]) -> Result<(), PropertyError>;

    /// store an explicit channel layout
    fn set_channel_layout(&mut self, layout: &ChannelLayout) -> Result<(), PropertyError>;

    /// current packet-table metadata; `NotSupported` when the container has
    /// no packet table
    fn packet_table_info(&self) -> Result<PacketTableInfo, PropertyError>;

    /// rewrite the packet-table metadata; `NotSupported` when the table is
    /// not writable
    fn set_packet_table_info(&mut self, info: PacketTableInfo) -> Result<(), PropertyError>;

    /// flush trailing metadata and close the file
    fn finalize(&mut self) -> Result<(), PropertyError>;
}
