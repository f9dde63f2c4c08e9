use smb_core::error::SMBError;
use smb_core::{SMBFromBytes, SMBResult, SMBToBytes};

use crate::config::SMBClientConfig;
use crate::protocol::andx::{decode_chain, encode_chain};
use crate::protocol::body::SMBBody;
use crate::protocol::header::{SMB_HEADER_LENGTH, SMBHeader};
use crate::protocol::wire::{WireReader, WireWriter};

/// Outcome of checking a received message's signature.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    #[default]
    Unchecked,
    Passed,
    Failed,
}

/// One header and the chain of bodies that share it.
///
/// Requests are encoded from `bodies`; responses are decoded into bodies the
/// caller prepared, one per link it expects back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SMBMessage {
    pub header: SMBHeader,
    pub bodies: Vec<SMBBody>,
    /// Encoded length of the frame, header included.
    pub length: usize,
    pub sign_seq: u32,
    pub verification: Verification,
    /// Links the last encode or decode actually carried.
    pub links: usize,
}

impl SMBMessage {
    pub fn new(header: SMBHeader, body: SMBBody) -> Self {
        Self {
            header,
            bodies: vec![body],
            length: 0,
            sign_seq: 0,
            verification: Verification::Unchecked,
            links: 0,
        }
    }

    /// A template to decode a response into.
    pub fn expecting(body: SMBBody) -> Self {
        Self::new(SMBHeader::default(), body)
    }

    pub fn chain(mut self, body: SMBBody) -> Self {
        self.bodies.push(body);
        self
    }

    pub fn head(&self) -> Option<&SMBBody> {
        self.bodies.first()
    }

    /// The header fields as seen by link `index` of the chain.
    pub fn link_header(&self, index: usize) -> Option<SMBHeader> {
        self.bodies.get(index).map(|body| self.header.for_link(body.command_code()))
    }

    /// Bodies the chain engine declined to put in the last encoded frame.
    pub fn unsent(&self) -> &[SMBBody] {
        &self.bodies[self.links.min(self.bodies.len())..]
    }

    pub fn encode(&mut self, config: &SMBClientConfig, max_size: usize) -> SMBResult<Vec<u8>> {
        let Some(head) = self.bodies.first() else {
            return Err(SMBError::precondition_failed("message has no body"));
        };
        self.header.command = head.command_code();
        let mut writer = WireWriter::new(max_size, self.header.is_unicode());
        writer.write_bytes(&self.header.smb_to_bytes())?;
        self.links = encode_chain(&mut writer, config, &self.bodies, self.header.is_response())?;
        self.length = writer.position();
        Ok(writer.into_bytes())
    }

    pub fn decode(&mut self, buffer: &[u8]) -> SMBResult<()> {
        let (_, header) = SMBHeader::smb_from_bytes(buffer)?;
        let Some(head) = self.bodies.first() else {
            return Err(SMBError::precondition_failed("message has no body"));
        };
        if head.command_code() != header.command {
            return Err(SMBError::protocol_error(format!(
                "received {:?} while expecting {:?}",
                header.command,
                head.command_code()
            )));
        }
        let mut reader = WireReader::new(buffer, header.is_unicode());
        reader.seek(SMB_HEADER_LENGTH);
        self.links = decode_chain(&mut reader, &header, &mut self.bodies)?;
        self.length = reader.position();
        self.header = header;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use smb_core::nt_status::NTStatus;

    use crate::protocol::body::close::SMBCloseRequest;
    use crate::protocol::body::read::{SMBReadAndXRequest, SMBReadAndXResponse};
    use crate::protocol::body::SMBEmpty;
    use crate::protocol::header::{SMBCommandCode, SMBFlags2};

    use super::*;

    fn header() -> SMBHeader {
        let mut header = SMBHeader::new(SMBCommandCode::ReadAndX, 3, 4, 5, 6);
        header.flags2 |= SMBFlags2::UNICODE_STRINGS;
        header
    }

    #[test]
    fn encode_stamps_head_command_and_length() {
        let mut message = SMBMessage::new(header(), SMBBody::CloseRequest(SMBCloseRequest::new(9)));
        let bytes = message.encode(&SMBClientConfig::default(), 1024).unwrap();
        assert_eq!(message.header.command, SMBCommandCode::Close);
        assert_eq!(bytes[4], SMBCommandCode::Close as u8);
        assert_eq!(message.length, bytes.len());
        assert_eq!(message.links, 1);
    }

    #[test]
    fn every_link_sees_the_head_identifiers() {
        let mut response = SMBMessage::new(
            header().create_response_header(0),
            SMBBody::ReadAndXResponse(SMBReadAndXResponse::new(b"abc".to_vec())),
        ).chain(SMBBody::Empty(SMBEmpty::new(SMBCommandCode::Close)));
        let bytes = response.encode(&SMBClientConfig::default(), 1024).unwrap();
        assert_eq!(response.links, 2);

        let mut received = SMBMessage::expecting(SMBBody::ReadAndXResponse(SMBReadAndXResponse::default()))
            .chain(SMBBody::Empty(SMBEmpty::new(SMBCommandCode::Close)));
        received.decode(&bytes).unwrap();
        assert_eq!(received.links, 2);
        assert_eq!(received.length, bytes.len());
        let close = received.link_header(1).unwrap();
        assert_eq!(close.command, SMBCommandCode::Close);
        assert_eq!((close.tid, close.pid, close.uid, close.mid), (3, 4, 5, 6));
        assert!(matches!(&received.bodies[0], SMBBody::ReadAndXResponse(r) if r.data == b"abc"));
    }

    #[test]
    fn unexpected_head_command_is_protocol_error() {
        let mut response = SMBMessage::new(header().create_response_header(0), SMBBody::Empty(SMBEmpty::new(SMBCommandCode::Close)));
        let bytes = response.encode(&SMBClientConfig::default(), 1024).unwrap();
        let mut received = SMBMessage::expecting(SMBBody::ReadAndXResponse(SMBReadAndXResponse::default()));
        assert!(matches!(received.decode(&bytes), Err(SMBError::ProtocolError(_))));
    }

    #[test]
    fn unbatched_links_remain_unsent() {
        let config = SMBClientConfig { use_batching: false, ..Default::default() };
        let mut message = SMBMessage::new(header(), SMBBody::ReadAndXRequest(SMBReadAndXRequest::new(1, 0, 64)))
            .chain(SMBBody::CloseRequest(SMBCloseRequest::new(1)));
        message.encode(&config, 1024).unwrap();
        assert_eq!(message.unsent().len(), 1);
        assert_eq!(message.unsent()[0].command_code(), SMBCommandCode::Close);
    }

    #[test]
    fn error_response_decodes_without_words() {
        let mut response = SMBMessage::new(
            header().create_response_header(NTStatus::AccessDenied as u32),
            SMBBody::Empty(SMBEmpty::new(SMBCommandCode::ReadAndX)),
        );
        let bytes = response.encode(&SMBClientConfig::default(), 1024).unwrap();
        let mut received = SMBMessage::expecting(SMBBody::ReadAndXResponse(SMBReadAndXResponse::default()));
        received.decode(&bytes).unwrap();
        assert_eq!(received.header.nt_status(), NTStatus::AccessDenied);
        assert_eq!(received.length, SMB_HEADER_LENGTH + 3);
    }
}
