use std::io::Read;

use crate::{
    parameters::{FrameFormat, Parameters},
    result::{truncated_on_eof, Result, SaneError},
};

const END_OF_RECORDS: u32 = 0xFFFF_FFFF;

/// One raster component delivered by the daemon: a complete GRAY/RGB
/// image or a single RED/GREEN/BLUE plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    parameters: Parameters,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(parameters: Parameters, data: Vec<u8>) -> Result<Self> {
        if data.len() != parameters.frame_len()? {
            return Err(SaneError::InvalidArgument(
                "frame payload does not match its parameters",
            ));
        }

        Ok(Self { parameters, data })
    }

    pub fn format(&self) -> FrameFormat {
        self.parameters.format
    }

    pub fn width(&self) -> usize {
        self.parameters.pixels_per_line
    }

    pub fn height(&self) -> usize {
        self.parameters.lines
    }

    pub fn depth(&self) -> usize {
        self.parameters.depth
    }

    pub fn bytes_per_line(&self) -> usize {
        self.parameters.bytes_per_line
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    // 16-bit samples arrive in the daemon's byte order; the assembled
    // image always stores them big endian.
    pub(crate) fn swap_sample_bytes(&mut self) {
        for pair in self.data.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
    }
}

/// Reads one frame off the data connection. The stream is a sequence
/// of records, each prefixed with a 4-byte big-endian length, closed
/// by the `0xFFFFFFFF` sentinel. Record boundaries carry no pixel
/// meaning; payloads concatenate into the frame buffer.
pub struct FrameReader<R> {
    stream: R,
    parameters: Parameters,
}

impl<R: Read> FrameReader<R> {
    pub fn new(stream: R, parameters: Parameters) -> Self {
        Self { stream, parameters }
    }

    pub fn read_frame(mut self) -> Result<Frame> {
        let expected = self.parameters.frame_len()?;
        let mut data = vec![0u8; expected];
        let mut offset = 0;

        loop {
            let length = self.read_record_length()?;

            if length == END_OF_RECORDS {
                log::trace!("Reached end of records at {offset}/{expected} bytes");
                break;
            }

            if length > i32::MAX as u32 {
                return Err(SaneError::ProtocolOverflow);
            }

            let length = length as usize;
            if length > expected - offset {
                return Err(SaneError::ProtocolOverflow);
            }

            self.stream
                .read_exact(&mut data[offset..offset + length])
                .map_err(truncated_on_eof)?;
            offset += length;

            log::trace!("Read a record of {length} bytes ({offset}/{expected})");
        }

        if offset != expected {
            return Err(SaneError::TruncatedStream);
        }

        Frame::new(self.parameters, data)
    }

    fn read_record_length(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.stream.read_exact(&mut bytes).map_err(truncated_on_eof)?;
        Ok(u32::from_be_bytes(bytes))
    }
}
