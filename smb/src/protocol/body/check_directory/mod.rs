use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::protocol::body::SMBCommand;
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{WireReader, WireWriter};

const BUFFER_FORMAT_ASCII: u8 = 0x04;

/// MS-CIFS 2.2.4.17.1. The response is an [`crate::protocol::body::SMBEmpty`].
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBCheckDirectoryRequest {
    pub directory_name: String,
}

impl SMBCheckDirectoryRequest {
    pub fn new(directory_name: &str) -> Self {
        Self {
            directory_name: directory_name.into(),
        }
    }
}

impl SMBCommand for SMBCheckDirectoryRequest {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::CheckDirectory
    }

    fn write_parameter_words(&self, _writer: &mut WireWriter) -> SMBResult<()> {
        Ok(())
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u8(BUFFER_FORMAT_ASCII)?;
        writer.write_string(&self.directory_name)
    }

    fn read_parameter_words(&mut self, _reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        let limit = reader.position() + byte_count;
        let format = reader.read_u8()?;
        if format != BUFFER_FORMAT_ASCII {
            return Err(SMBError::parse_error(format!("Invalid buffer format 0x{:02X}", format)));
        }
        self.directory_name = reader.read_string(limit)?;
        Ok(())
    }
}
