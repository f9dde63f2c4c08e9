//! NetBIOS session service framing, RFC 1002 4.3, as used on port 445.
//!
//! Every SMB message travels in a session message: a type byte followed by
//! a 24-bit big-endian length.

use smb_core::SMBResult;

mod stream_sync;

pub const NETBIOS_HEADER_LENGTH: usize = 4;
pub const SESSION_MESSAGE: u8 = 0x00;
pub const SESSION_KEEP_ALIVE: u8 = 0x85;
pub const MAX_FRAME_LENGTH: usize = 0x00FF_FFFF;

/// A received frame whose ReadAndX payload, if any, was read straight into
/// the caller's buffer instead of `head`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitFrame {
    /// The message bytes that precede the payload.
    pub head: Vec<u8>,
    /// How many payload bytes landed in the caller's buffer.
    pub payload_length: Option<usize>,
}

pub trait SMBReadStream {
    /// Reads the next session message, skipping keep-alives.
    fn read_frame(&mut self) -> SMBResult<Vec<u8>>;

    /// Like [`SMBReadStream::read_frame`], except that the data of a
    /// successful ReadAndX response ending the frame goes into `payload`.
    fn read_split_frame(&mut self, payload: &mut [u8]) -> SMBResult<SplitFrame>;
}

pub trait SMBWriteStream {
    /// Writes `frame` as one session message and returns the bytes sent.
    fn write_frame(&mut self, frame: &[u8]) -> SMBResult<usize>;
}

pub struct SMBFrameIterator<'a, R: SMBReadStream> {
    pub(crate) reader: &'a mut R,
}

impl<'a, R: SMBReadStream> SMBFrameIterator<'a, R> {
    pub fn new(reader: &'a mut R) -> Self {
        Self { reader }
    }
}

#[derive(Debug)]
pub struct SMBSocketConnection<R: SMBReadStream, W: SMBWriteStream> {
    name: String,
    read_stream: R,
    write_stream: W,
}

impl<R: SMBReadStream, W: SMBWriteStream> SMBSocketConnection<R, W> {
    pub fn new(name: String, read_stream: R, write_stream: W) -> Self {
        Self {
            name,
            read_stream,
            write_stream,
        }
    }

    pub fn frames(&mut self) -> SMBFrameIterator<'_, R> {
        SMBFrameIterator::new(self.read())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&mut self) -> &mut R {
        &mut self.read_stream
    }

    pub fn write(&mut self) -> &mut W {
        &mut self.write_stream
    }

    pub fn streams(&mut self) -> (&mut R, &mut W) {
        (&mut self.read_stream, &mut self.write_stream)
    }

    pub fn into_streams(self) -> (R, W) {
        (self.read_stream, self.write_stream)
    }
}
