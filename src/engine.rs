//! the pull-based conversion loop

use log::{debug, warn};

use crate::converter::{AudioConverter, FillResult, PacketPull};
use crate::error::{ConvertError, ConvertStatus};
use crate::format::PacketDescription;
use crate::state::SharedThreadState;
use crate::writer::SinkWriter;

/// totals reported by a finished engine run
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineTotals {
    pub output_packets: u64,
    pub output_frames: u64,
    pub output_bytes: u64,
}

/// drives the converter until end-of-stream or a fatal error
///
/// Each iteration gates on the thread-state machine, requests one batch of
/// output packets (the converter pulls input through `reader` as needed) and
/// hands the batch to the writer. A transient hardware-busy status is logged
/// and left pending; the next `paused_check` decides whether the job can
/// continue, based on the converter's resumability.
pub struct ConversionEngine<'a> {
    converter: &'a mut dyn AudioConverter,
    state: &'a SharedThreadState,
    can_resume: bool,
    /// output packets requested per fill call
    packets_per_fill: u32,
}

impl<'a> ConversionEngine<'a> {
    pub fn new(
        converter: &'a mut dyn AudioConverter,
        state: &'a SharedThreadState,
        can_resume: bool,
        packets_per_fill: u32,
    ) -> Self {
        ConversionEngine {
            converter,
            state,
            can_resume,
            packets_per_fill,
        }
    }

    /// run the fill loop to completion
    ///
    /// `out_buffer` is the reused destination scratch buffer; it is never
    /// reallocated across iterations.
    pub fn run(
        &mut self,
        reader: &mut dyn PacketPull,
        writer: &mut SinkWriter<'_>,
        out_buffer: &mut [u8],
    ) -> Result<EngineTotals, ConvertError> {
        let mut descriptions: Vec<PacketDescription> =
            Vec::with_capacity(self.packets_per_fill as usize);
        let mut pending_error = false;

        loop {
            // this blocks for the whole paused interval if we're interrupted
            let was_interrupted = self.state.paused_check();

            if (pending_error || was_interrupted) && !self.can_resume {
                // an interruption has occurred but the converter cannot
                // continue; this is the job's designed termination path
                return Err(ConvertError::CannotResumeFromInterruption);
            }

            descriptions.clear();
            match self.converter.fill_output(
                self.packets_per_fill,
                out_buffer,
                &mut descriptions,
                reader,
            ) {
                Ok(FillResult::EndOfStream) => {
                    debug!(
                        "end of stream after {} output packets",
                        writer.position()
                    );
                    break;
                }
                Ok(FillResult::Produced { packets, bytes }) => {
                    pending_error = false;
                    writer.write_batch(
                        &out_buffer[..bytes as usize],
                        &descriptions,
                        packets,
                    )?;
                }
                Err(ConvertStatus::HardwareBusy) => {
                    // transient: typically coincides with an interruption
                    // that is already signaled or about to be; the next
                    // paused_check handles it, we do not retry here
                    warn!("converter reported hardware codec in use");
                    pending_error = true;
                }
                Err(status) => {
                    return Err(ConvertError::ConversionFailed(status));
                }
            }
        }

        Ok(EngineTotals {
            output_packets: writer.position(),
            output_frames: writer.total_frames(),
            output_bytes: writer.total_bytes(),
        })
    }
}
