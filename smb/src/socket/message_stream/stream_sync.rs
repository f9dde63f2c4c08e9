use std::io::{Read, Write};

use smb_core::error::SMBError;
use smb_core::logging::{debug, trace};
use smb_core::SMBResult;

use crate::protocol::body::read::{
    READ_ANDX_DATA_LENGTH_HIGH_OFFSET, READ_ANDX_DATA_LENGTH_OFFSET, READ_ANDX_DATA_OFFSET_OFFSET,
    READ_ANDX_RESPONSE_HEAD_LENGTH, READ_ANDX_RESPONSE_WORD_COUNT,
};
use crate::protocol::header::{SMBCommandCode, SMB_HEADER_LENGTH};
use crate::socket::message_stream::{
    SMBFrameIterator, SMBReadStream, SMBSocketConnection, SMBWriteStream, SplitFrame, MAX_FRAME_LENGTH,
    NETBIOS_HEADER_LENGTH, SESSION_KEEP_ALIVE, SESSION_MESSAGE,
};

fn read_exact<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> SMBResult<()> {
    reader.read_exact(buffer).map_err(SMBError::io_error)
}

/// Length of the next session message, keep-alives skipped.
fn read_session_header<R: Read + ?Sized>(reader: &mut R) -> SMBResult<usize> {
    loop {
        let mut header = [0_u8; NETBIOS_HEADER_LENGTH];
        read_exact(reader, &mut header)?;
        let length = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
        match header[0] {
            SESSION_MESSAGE => return Ok(length),
            SESSION_KEEP_ALIVE => {
                trace!("session keep-alive");
                let mut discard = vec![0; length];
                read_exact(reader, &mut discard)?;
            }
            kind => {
                return Err(SMBError::protocol_error(format!("unexpected NetBIOS session packet type {:#04x}", kind)));
            }
        }
    }
}

fn u16_at(buffer: &[u8], offset: usize) -> usize {
    u16::from_le_bytes([buffer[offset], buffer[offset + 1]]) as usize
}

/// Where the data of a successful ReadAndX response starts and how long it
/// is, read from the fixed part of the message.
fn read_andx_payload(head: &[u8]) -> Option<(usize, usize)> {
    if head.len() < READ_ANDX_RESPONSE_HEAD_LENGTH
        || head[4] != SMBCommandCode::ReadAndX as u8
        || head[5..9] != [0; 4]
        || head[SMB_HEADER_LENGTH] != READ_ANDX_RESPONSE_WORD_COUNT
    {
        return None;
    }
    let length = u16_at(head, READ_ANDX_DATA_LENGTH_OFFSET) | u16_at(head, READ_ANDX_DATA_LENGTH_HIGH_OFFSET) << 16;
    Some((u16_at(head, READ_ANDX_DATA_OFFSET_OFFSET), length))
}

impl<Reader> SMBReadStream for Reader where Reader: Read {
    fn read_frame(&mut self) -> SMBResult<Vec<u8>> {
        let length = read_session_header(self)?;
        let mut frame = vec![0; length];
        read_exact(self, &mut frame)?;
        trace!(length, "read frame");
        Ok(frame)
    }

    fn read_split_frame(&mut self, payload: &mut [u8]) -> SMBResult<SplitFrame> {
        let length = read_session_header(self)?;
        let mut head = vec![0; READ_ANDX_RESPONSE_HEAD_LENGTH.min(length)];
        read_exact(self, &mut head)?;

        let split = read_andx_payload(&head).filter(|(offset, data_length)| {
            *offset >= head.len() && offset + data_length == length && *data_length <= payload.len()
        });
        let Some((offset, data_length)) = split else {
            let read = head.len();
            head.resize(length, 0);
            read_exact(self, &mut head[read..])?;
            return Ok(SplitFrame {
                head,
                payload_length: None,
            });
        };

        let read = head.len();
        head.resize(offset, 0);
        read_exact(self, &mut head[read..])?;
        read_exact(self, &mut payload[..data_length])?;
        debug!(data_length, "read ReadAndX payload into caller buffer");
        Ok(SplitFrame {
            head,
            payload_length: Some(data_length),
        })
    }
}

impl<Writer> SMBWriteStream for Writer where Writer: Write {
    fn write_frame(&mut self, frame: &[u8]) -> SMBResult<usize> {
        if frame.len() > MAX_FRAME_LENGTH {
            return Err(SMBError::precondition_failed(format!(
                "{} byte message exceeds the NetBIOS session limit",
                frame.len()
            )));
        }
        let length = (frame.len() as u32).to_be_bytes();
        let header = [SESSION_MESSAGE, length[1], length[2], length[3]];
        self.write_all(&header).map_err(SMBError::io_error)?;
        self.write_all(frame).map_err(SMBError::io_error)?;
        self.flush().map_err(SMBError::io_error)?;
        Ok(NETBIOS_HEADER_LENGTH + frame.len())
    }
}

impl<R: SMBReadStream, W: SMBWriteStream> SMBSocketConnection<R, W> {
    pub fn send_frame(&mut self, frame: &[u8]) -> SMBResult<usize> {
        self.write().write_frame(frame)
    }

    pub fn receive_frame(&mut self) -> SMBResult<Vec<u8>> {
        self.read().read_frame()
    }

    pub fn receive_split_frame(&mut self, payload: &mut [u8]) -> SMBResult<SplitFrame> {
        self.read().read_split_frame(payload)
    }
}

impl<R: SMBReadStream> Iterator for SMBFrameIterator<'_, R> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_frame().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::config::SMBClientConfig;
    use crate::protocol::body::read::SMBReadAndXResponse;
    use crate::protocol::body::{SMBBody, SMBEmpty};
    use crate::protocol::header::SMBHeader;
    use crate::protocol::message::SMBMessage;

    use super::*;

    fn framed(frames: &[&[u8]]) -> Vec<u8> {
        let mut stream = Vec::new();
        for frame in frames {
            stream.write_frame(frame).unwrap();
        }
        stream
    }

    fn read_response(data: &[u8]) -> Vec<u8> {
        let header = SMBHeader::new(SMBCommandCode::ReadAndX, 1, 2, 3, 4).create_response_header(0);
        SMBMessage::new(header, SMBBody::ReadAndXResponse(SMBReadAndXResponse::new(data.to_vec())))
            .encode(&SMBClientConfig::default(), 1024)
            .unwrap()
    }

    #[test]
    fn frames_carry_a_big_endian_length() {
        let stream = framed(&[b"\xFFSMBabc"]);
        assert_eq!(&stream[..4], &[0, 0, 0, 7]);
        assert_eq!(Cursor::new(stream).read_frame().unwrap(), b"\xFFSMBabc");
    }

    #[test]
    fn keep_alives_are_skipped() {
        let mut stream = vec![SESSION_KEEP_ALIVE, 0, 0, 0];
        stream.extend(framed(&[b"one"]));
        let mut reader = Cursor::new(stream);
        let frames: Vec<_> = SMBFrameIterator::new(&mut reader).collect();
        assert_eq!(frames, vec![b"one".to_vec()]);
    }

    #[test]
    fn unknown_packet_type_is_protocol_error() {
        let mut reader = Cursor::new(vec![0x82, 0, 0, 0]);
        assert!(matches!(reader.read_frame(), Err(SMBError::ProtocolError(_))));
    }

    #[test]
    fn truncated_frame_is_io_error() {
        let mut reader = Cursor::new(vec![0, 0, 0, 9, 1, 2]);
        assert!(matches!(reader.read_frame(), Err(SMBError::IOError(_))));
    }

    #[test]
    fn read_payload_lands_in_caller_buffer() {
        let message = read_response(b"file contents");
        let mut reader = Cursor::new(framed(&[&message]));
        let mut buffer = [0_u8; 64];
        let split = reader.read_split_frame(&mut buffer).unwrap();
        assert_eq!(split.payload_length, Some(13));
        assert_eq!(&buffer[..13], b"file contents");
        assert_eq!(split.head, &message[..message.len() - 13]);
    }

    #[test]
    fn small_buffer_falls_back_to_whole_frame() {
        let message = read_response(b"file contents");
        let mut reader = Cursor::new(framed(&[&message]));
        let split = reader.read_split_frame(&mut [0_u8; 4]).unwrap();
        assert_eq!(split.payload_length, None);
        assert_eq!(split.head, message);
    }

    #[test]
    fn other_commands_are_read_whole() {
        let header = SMBHeader::new(SMBCommandCode::Close, 1, 2, 3, 4).create_response_header(0);
        let message = SMBMessage::new(header, SMBBody::Empty(SMBEmpty::new(SMBCommandCode::Close)))
            .encode(&SMBClientConfig::default(), 1024)
            .unwrap();
        let mut reader = Cursor::new(framed(&[&message]));
        let split = reader.read_split_frame(&mut [0_u8; 64]).unwrap();
        assert_eq!(split.head, message);
    }

    #[test]
    fn connection_sends_and_receives() {
        let mut connection = SMBSocketConnection::new("test".into(), Cursor::new(framed(&[b"reply"])), Vec::new());
        assert_eq!(connection.send_frame(b"request").unwrap(), 11);
        assert_eq!(connection.receive_frame().unwrap(), b"reply");
        assert_eq!(connection.name(), "test");
        let (_, written) = connection.into_streams();
        assert_eq!(&written[4..], b"request");
    }
}
