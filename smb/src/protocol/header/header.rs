use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::tuple;
use serde::{Deserialize, Serialize};

use smb_core::{SMBByteSize, SMBFromBytes, SMBParseResult, SMBToBytes};
use smb_core::error::SMBError;
use smb_core::nt_status::NTStatus;

use crate::byte_helper::{u16_to_bytes, u32_to_bytes};
use crate::protocol::header::{SMBCommandCode, SMBFlags, SMBFlags2};

pub const SMB_HEADER_LENGTH: usize = 32;
pub const SIGNATURE_OFFSET: usize = 14;
pub const SIGNATURE_LENGTH: usize = 8;

const PROTOCOL: &[u8; 4] = b"\xFFSMB";

/// The fixed 32-byte SMB1 header. Only the head of an AndX chain carries one;
/// every chained link shares it.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBHeader {
    pub command: SMBCommandCode,
    pub status: u32,
    pub flags: SMBFlags,
    pub flags2: SMBFlags2,
    pub pid_high: u16,
    pub signature: [u8; 8],
    pub tid: u16,
    pub pid: u16,
    pub uid: u16,
    pub mid: u16,
}

impl SMBHeader {
    pub fn new(command: SMBCommandCode, tid: u16, pid: u16, uid: u16, mid: u16) -> Self {
        Self {
            command,
            tid,
            pid,
            uid,
            mid,
            ..Default::default()
        }
    }

    pub fn nt_status(&self) -> NTStatus {
        NTStatus::from_u32(self.status)
    }

    pub fn is_unicode(&self) -> bool {
        self.flags2.contains(SMBFlags2::UNICODE_STRINGS)
    }

    pub fn is_response(&self) -> bool {
        self.flags.contains(SMBFlags::SERVER_TO_REDIR)
    }

    /// A copy of this header describing a chained link.
    pub fn for_link(&self, command: SMBCommandCode) -> Self {
        Self {
            command,
            ..self.clone()
        }
    }

    pub fn create_response_header(&self, status: u32) -> Self {
        Self {
            status,
            flags: self.flags | SMBFlags::SERVER_TO_REDIR,
            signature: [0; 8],
            ..self.clone()
        }
    }
}

impl Default for SMBHeader {
    fn default() -> Self {
        Self {
            command: SMBCommandCode::Negotiate,
            status: 0,
            flags: SMBFlags::default(),
            flags2: SMBFlags2::default(),
            pid_high: 0,
            signature: [0; 8],
            tid: 0,
            pid: 0,
            uid: 0,
            mid: 0,
        }
    }
}

impl SMBByteSize for SMBHeader {
    fn smb_byte_size(&self) -> usize {
        SMB_HEADER_LENGTH
    }
}

impl SMBFromBytes for SMBHeader {
    fn smb_from_bytes(input: &[u8]) -> SMBParseResult<&[u8], Self> {
        if input.len() < SMB_HEADER_LENGTH {
            return Err(SMBError::payload_too_small(SMB_HEADER_LENGTH, input.len()));
        }
        let (remaining, (_, command, status, flags, flags2, pid_high, signature, _, tid, pid, uid, mid)) = tuple((
            tag(&PROTOCOL[..]),
            le_u8,
            le_u32,
            le_u8,
            le_u16,
            le_u16,
            take(SIGNATURE_LENGTH),
            take(2_usize),
            le_u16,
            le_u16,
            le_u16,
            le_u16,
        ))(input)
            .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| SMBError::parse_error("Missing SMB1 protocol identifier"))?;
        let (_, command) = SMBCommandCode::smb_from_bytes(&[command])?;
        let signature = <[u8; 8]>::try_from(signature).map_err(SMBError::parse_error)?;
        Ok((remaining, Self {
            command,
            status,
            flags: SMBFlags::from_bits_truncate(flags),
            flags2: SMBFlags2::from_bits_truncate(flags2),
            pid_high,
            signature,
            tid,
            pid,
            uid,
            mid,
        }))
    }
}

impl SMBToBytes for SMBHeader {
    fn smb_to_bytes(&self) -> Vec<u8> {
        [
            &PROTOCOL[..],
            &[self.command as u8],
            &u32_to_bytes(self.status),
            &[self.flags.bits()],
            &u16_to_bytes(self.flags2.bits()),
            &u16_to_bytes(self.pid_high),
            &self.signature,
            &[0, 0], // Reserved
            &u16_to_bytes(self.tid),
            &u16_to_bytes(self.pid),
            &u16_to_bytes(self.uid),
            &u16_to_bytes(self.mid),
        ]
        .concat()
    }
}
