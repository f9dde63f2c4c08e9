use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::byte_helper::{filetime_to_millis, millis_to_filetime, timezone_from_raw};
use crate::protocol::body::{Capabilities, SMBCommand};
use crate::protocol::body::negotiate::SecurityMode;
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{WireReader, WireWriter};

pub const NT_LM_DIALECT: &str = "NT LM 0.12";

const DIALECT_BUFFER_FORMAT: u8 = 0x02;

/// MS-CIFS 2.2.4.52.1
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBNegotiateRequest {
    pub dialects: Vec<String>,
}

impl Default for SMBNegotiateRequest {
    fn default() -> Self {
        Self {
            dialects: vec![NT_LM_DIALECT.into()],
        }
    }
}

impl SMBCommand for SMBNegotiateRequest {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::Negotiate
    }

    fn write_parameter_words(&self, _writer: &mut WireWriter) -> SMBResult<()> {
        Ok(())
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        for dialect in &self.dialects {
            writer.write_u8(DIALECT_BUFFER_FORMAT)?;
            writer.write_oem_string(dialect)?;
        }
        Ok(())
    }

    fn read_parameter_words(&mut self, _reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        let limit = reader.position() + byte_count;
        self.dialects.clear();
        while reader.position() < limit {
            let format = reader.read_u8()?;
            if format != DIALECT_BUFFER_FORMAT {
                return Err(SMBError::parse_error(format!("Invalid dialect buffer format 0x{:02X}", format)));
            }
            self.dialects.push(reader.read_oem_string(limit)?);
        }
        Ok(())
    }
}

/// MS-CIFS 2.2.4.52.2, NT LM 0.12 form, with the MS-SMB extended security
/// variant selected by [`Capabilities::EXTENDED_SECURITY`].
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBNegotiateResponse {
    pub dialect_index: u16,
    pub security_mode: SecurityMode,
    pub max_mpx_count: u16,
    pub max_number_vcs: u16,
    pub max_buffer_size: u32,
    pub max_raw_size: u32,
    pub session_key: u32,
    pub capabilities: Capabilities,
    /// Unix milliseconds.
    pub system_time: i64,
    /// Minutes from UTC.
    pub server_time_zone: i16,
    pub challenge: Vec<u8>,
    pub domain_name: String,
    pub server_name: String,
    pub server_guid: [u8; 16],
    pub security_blob: Vec<u8>,
    challenge_length: u8,
}

impl SMBNegotiateResponse {
    pub fn new(dialect_index: u16, security_mode: SecurityMode, capabilities: Capabilities, max_buffer_size: u32, challenge: Vec<u8>) -> Self {
        Self {
            dialect_index,
            security_mode,
            max_mpx_count: 50,
            max_number_vcs: 1,
            max_buffer_size,
            max_raw_size: 65536,
            session_key: 0,
            capabilities,
            system_time: 0,
            server_time_zone: 0,
            challenge_length: challenge.len() as u8,
            challenge,
            domain_name: String::new(),
            server_name: String::new(),
            server_guid: [0; 16],
            security_blob: Vec::new(),
        }
    }

    pub fn is_extended_security(&self) -> bool {
        self.capabilities.contains(Capabilities::EXTENDED_SECURITY)
    }

    pub fn signing_enabled(&self) -> bool {
        self.security_mode.intersects(SecurityMode::SIGNATURES_ENABLED | SecurityMode::SIGNATURES_REQUIRED)
    }
}

impl Default for SMBNegotiateResponse {
    fn default() -> Self {
        Self::new(0, SecurityMode::empty(), Capabilities::empty(), 0, Vec::new())
    }
}

impl SMBCommand for SMBNegotiateResponse {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::Negotiate
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u16(self.dialect_index)?;
        writer.write_u8(self.security_mode.bits())?;
        writer.write_u16(self.max_mpx_count)?;
        writer.write_u16(self.max_number_vcs)?;
        writer.write_u32(self.max_buffer_size)?;
        writer.write_u32(self.max_raw_size)?;
        writer.write_u32(self.session_key)?;
        writer.write_u32(self.capabilities.bits())?;
        writer.write_u64(millis_to_filetime(self.system_time))?;
        writer.write_u16(self.server_time_zone as u16)?;
        let challenge_length = if self.is_extended_security() { 0 } else { self.challenge.len() as u8 };
        writer.write_u8(challenge_length)
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        if self.is_extended_security() {
            writer.write_bytes(&self.server_guid)?;
            return writer.write_bytes(&self.security_blob);
        }
        writer.write_bytes(&self.challenge)?;
        writer.write_string_unaligned(&self.domain_name)?;
        writer.write_string_unaligned(&self.server_name)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        self.dialect_index = reader.read_u16()?;
        self.security_mode = SecurityMode::from_bits_truncate(reader.read_u8()?);
        self.max_mpx_count = reader.read_u16()?;
        self.max_number_vcs = reader.read_u16()?;
        self.max_buffer_size = reader.read_u32()?;
        self.max_raw_size = reader.read_u32()?;
        self.session_key = reader.read_u32()?;
        self.capabilities = Capabilities::from_bits_truncate(reader.read_u32()?);
        self.system_time = filetime_to_millis(reader.read_u64()?);
        self.server_time_zone = timezone_from_raw(reader.read_u16()?);
        self.challenge_length = reader.read_u8()?;
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        let limit = reader.position() + byte_count;
        if self.is_extended_security() {
            let guid = reader.read_bytes(16)?;
            self.server_guid.copy_from_slice(guid);
            self.security_blob = reader.read_bytes(byte_count.saturating_sub(16))?.to_vec();
            return Ok(());
        }
        self.challenge = reader.read_bytes(self.challenge_length as usize)?.to_vec();
        self.domain_name = reader.read_string_unaligned(limit)?;
        if reader.position() < limit {
            self.server_name = reader.read_string_unaligned(limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MS-CIFS 2.2.4.52.1: each dialect is 0x02 followed by a null terminated string.
    #[test]
    fn request_dialect_encoding() {
        let mut writer = WireWriter::new(64, true);
        SMBNegotiateRequest::default().write_bytes(&mut writer).unwrap();
        assert_eq!(writer.as_slice(), b"\x02NT LM 0.12\x00");

        let bytes = writer.into_bytes();
        let mut request = SMBNegotiateRequest { dialects: Vec::new() };
        request.read_bytes(&mut WireReader::new(&bytes, true), bytes.len()).unwrap();
        assert_eq!(request.dialects, vec![NT_LM_DIALECT.to_string()]);
    }

    /// MS-CIFS 2.2.4.52.2: 17 parameter words.
    #[test]
    fn response_words_are_seventeen() {
        let response = SMBNegotiateResponse::new(0, SecurityMode::USER_SECURITY, Capabilities::UNICODE, 16644, vec![1; 8]);
        let mut writer = WireWriter::new(128, true);
        response.write_parameter_words(&mut writer).unwrap();
        assert_eq!(writer.position(), 34);
        assert_eq!(writer.as_slice()[33], 8);
    }

    #[test]
    fn response_reads_challenge_and_unaligned_domain() {
        let mut response = SMBNegotiateResponse::new(0, SecurityMode::ENCRYPT_PASSWORDS, Capabilities::UNICODE, 4356, vec![9; 8]);
        response.server_time_zone = -60;
        response.domain_name = "CORP".into();
        response.server_name = "FS1".into();

        // An odd starting position proves the domain name is not aligned.
        let mut writer = WireWriter::new(256, true);
        writer.write_u8(0).unwrap();
        response.write_parameter_words(&mut writer).unwrap();
        let bytes_start = writer.position();
        response.write_bytes(&mut writer).unwrap();
        let byte_count = writer.position() - bytes_start;
        let bytes = writer.into_bytes();
        assert_eq!(bytes[bytes_start + 8], b'C');

        let mut parsed = SMBNegotiateResponse::default();
        let mut reader = WireReader::new(&bytes, true);
        reader.seek(1);
        parsed.read_parameter_words(&mut reader, 17).unwrap();
        parsed.read_bytes(&mut reader, byte_count).unwrap();
        assert_eq!(parsed, response);
        assert_eq!(parsed.server_time_zone, -60);
    }

    #[test]
    fn extended_security_carries_guid_and_blob() {
        let mut response = SMBNegotiateResponse::new(0, SecurityMode::USER_SECURITY, Capabilities::EXTENDED_SECURITY, 4356, Vec::new());
        response.server_guid = [7; 16];
        response.security_blob = vec![0x60, 0x28, 0x06];
        let mut writer = WireWriter::new(256, false);
        response.write_parameter_words(&mut writer).unwrap();
        response.write_bytes(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut parsed = SMBNegotiateResponse::default();
        let mut reader = WireReader::new(&bytes, false);
        parsed.read_parameter_words(&mut reader, 17).unwrap();
        parsed.read_bytes(&mut reader, 19).unwrap();
        assert_eq!(parsed.server_guid, [7; 16]);
        assert_eq!(parsed.security_blob, vec![0x60, 0x28, 0x06]);
        assert!(parsed.is_extended_security());
    }
}
