use serde::{Deserialize, Serialize};

use smb_core::SMBResult;

use crate::config::SMBClientConfig;
use crate::protocol::body::{declared_batch_limit, SMBCommand};
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{WireReader, WireWriter};

/// Any service type; the server answers with the real one.
pub const ANY_SERVICE: &str = "?????";

/// MS-CIFS 2.2.4.55.1
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBTreeConnectAndXRequest {
    pub flags: u16,
    pub password: Vec<u8>,
    /// UNC form, `\\server\share`.
    pub path: String,
    pub service: String,
}

impl SMBTreeConnectAndXRequest {
    pub fn new(path: &str) -> Self {
        Self {
            flags: 0,
            // A single null byte: user level security carries no share password.
            password: vec![0],
            path: path.into(),
            service: ANY_SERVICE.into(),
        }
    }
}

impl SMBCommand for SMBTreeConnectAndXRequest {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::TreeConnectAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u16(self.flags)?;
        writer.write_u16(self.password.len() as u16)
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_bytes(&self.password)?;
        writer.write_string(&self.path)?;
        writer.write_oem_string(&self.service)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        self.flags = reader.read_u16()?;
        let password_length = reader.read_u16()?;
        self.password = vec![0; password_length as usize];
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        let limit = reader.position() + byte_count;
        self.password = reader.read_bytes(self.password.len())?.to_vec();
        self.path = reader.read_string(limit)?;
        self.service = reader.read_oem_string(limit)?;
        Ok(())
    }

    fn batch_limit(&self, config: &SMBClientConfig, successor: SMBCommandCode) -> u8 {
        use SMBCommandCode::*;
        declared_batch_limit(config, self.command_code(), successor, &[
            CheckDirectory,
            CreateDirectory,
            Delete,
            DeleteDirectory,
            OpenAndX,
            Rename,
            Transaction,
            QueryInformation,
        ])
    }
}

/// MS-CIFS 2.2.4.55.2, plus the MS-SMB 2.2.4.7.2 extended form (7 words).
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBTreeConnectAndXResponse {
    pub optional_support: u16,
    /// Maximal and guest maximal share access rights.
    pub access_rights: Option<(u32, u32)>,
    pub service: String,
    pub native_file_system: String,
}

impl SMBTreeConnectAndXResponse {
    pub fn new(service: &str, native_file_system: &str) -> Self {
        Self {
            service: service.into(),
            native_file_system: native_file_system.into(),
            ..Default::default()
        }
    }

    pub fn is_dfs(&self) -> bool {
        self.optional_support & 0x0002 != 0
    }
}

impl SMBCommand for SMBTreeConnectAndXResponse {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::TreeConnectAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u16(self.optional_support)?;
        if let Some((maximal, guest)) = self.access_rights {
            writer.write_u32(maximal)?;
            writer.write_u32(guest)?;
        }
        Ok(())
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_oem_string(&self.service)?;
        writer.write_string(&self.native_file_system)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, word_count: u8) -> SMBResult<()> {
        self.optional_support = reader.read_u16()?;
        if word_count >= 7 {
            self.access_rights = Some((reader.read_u32()?, reader.read_u32()?));
        }
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        let limit = reader.position() + byte_count;
        self.service = reader.read_oem_string(limit)?;
        if reader.position() < limit {
            self.native_file_system = reader.read_string(limit).unwrap_or_default();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_bytes_layout() {
        let request = SMBTreeConnectAndXRequest::new("\\\\SRV\\IPC$");
        let mut writer = WireWriter::new(128, false);
        request.write_parameter_words(&mut writer).unwrap();
        request.write_bytes(&mut writer).unwrap();
        assert_eq!(writer.as_slice(), b"\x00\x00\x01\x00\x00\\\\SRV\\IPC$\x00?????\x00");
    }

    #[test]
    fn tree_connect_declares_its_successors() {
        let config = SMBClientConfig::default();
        let request = SMBTreeConnectAndXRequest::new("\\\\SRV\\share");
        assert_eq!(request.batch_limit(&config, SMBCommandCode::CheckDirectory), 1);
        assert_eq!(request.batch_limit(&config, SMBCommandCode::Transaction), 1);
        assert_eq!(request.batch_limit(&config, SMBCommandCode::QueryInformation), 0);
        assert_eq!(request.batch_limit(&config, SMBCommandCode::Transaction2), 0);
        assert_eq!(request.batch_limit(&config, SMBCommandCode::NtCreateAndX), 0);
    }

    #[test]
    fn extended_response_reads_access_rights() {
        let mut response = SMBTreeConnectAndXResponse::new("IPC", "");
        response.optional_support = 0x0003;
        response.access_rights = Some((0x001F01FF, 0x00120089));
        let mut writer = WireWriter::new(128, true);
        response.write_parameter_words(&mut writer).unwrap();
        let bytes_start = writer.position();
        response.write_bytes(&mut writer).unwrap();
        let byte_count = writer.position() - bytes_start;
        let bytes = writer.into_bytes();

        let mut parsed = SMBTreeConnectAndXResponse::default();
        let mut reader = WireReader::new(&bytes, true);
        parsed.read_parameter_words(&mut reader, 7).unwrap();
        parsed.read_bytes(&mut reader, byte_count).unwrap();
        assert_eq!(parsed, response);
        assert!(parsed.is_dfs());
    }
}
